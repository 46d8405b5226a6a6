mod order_id;
mod signature;

pub use order_id::new_order_id;
pub use signature::{sign_payload, verify_signature, SignatureError, SignedPayload, SIGNATURE_HEADER};
