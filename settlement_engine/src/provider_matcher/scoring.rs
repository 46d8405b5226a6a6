use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tunable constants of the provider score.
///
/// `score = min(balance / required, ratio_cap) * ratio_weight`
/// `      + verified_bonus` if the provider is verified
/// `      + headroom_bonus` if `balance >= headroom_multiple * required`
/// `      - thin_margin_penalty` if `balance < thin_margin_multiple * required`
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub ratio_cap: Decimal,
    pub ratio_weight: Decimal,
    pub verified_bonus: Decimal,
    pub headroom_multiple: Decimal,
    pub headroom_bonus: Decimal,
    pub thin_margin_multiple: Decimal,
    pub thin_margin_penalty: Decimal,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ratio_cap: dec!(5),
            ratio_weight: dec!(10),
            verified_bonus: dec!(20),
            headroom_multiple: dec!(2),
            headroom_bonus: dec!(10),
            thin_margin_multiple: dec!(1.2),
            thin_margin_penalty: dec!(5),
        }
    }
}

impl ScoringConfig {
    /// Scores a provider holding `balance` against a `required` amount. `required` must be positive.
    pub fn score(&self, balance: Decimal, required: Decimal, verified: bool) -> Decimal {
        let ratio = (balance / required).min(self.ratio_cap);
        let mut score = ratio * self.ratio_weight;
        if verified {
            score += self.verified_bonus;
        }
        if balance >= self.headroom_multiple * required {
            score += self.headroom_bonus;
        }
        if balance < self.thin_margin_multiple * required {
            score -= self.thin_margin_penalty;
        }
        score
    }
}
