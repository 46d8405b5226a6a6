use serde::Serialize;

use crate::db_types::Order;

/// The result of a conditional status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransitionOutcome {
    /// The order was in one of the allowed source states and has been moved. Carries the updated order.
    Applied(Order),
    /// The order was not in an allowed source state (usually because it is terminal, or the event is stale). Nothing
    /// was written. Carries the order as it currently stands.
    Ignored(Order),
}

impl TransitionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            TransitionOutcome::Applied(o) | TransitionOutcome::Ignored(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            TransitionOutcome::Applied(o) | TransitionOutcome::Ignored(o) => o,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}
