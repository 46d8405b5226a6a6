//! # Payload signatures
//!
//! Every payload that crosses the trust boundary of the engine (settlement requests, settlement confirmations and
//! business webhooks) is signed with HMAC-SHA256 over the exact JSON bytes of the body. The signature is base64
//! encoded and sent in the [`SIGNATURE_HEADER`] header.
//!
//! Verification uses the constant-time comparison provided by [`Mac::verify_slice`].
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use log::*;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Settlement-Signature";

#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("No signing key has been configured")]
    MissingKey,
    #[error("The signature is not valid base64")]
    MalformedSignature,
    #[error("The signature does not match the payload")]
    InvalidSignature,
    #[error("Could not serialize payload: {0}")]
    SerializationError(String),
}

/// A JSON body and the signature over its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub body: String,
    pub signature: String,
}

impl SignedPayload {
    /// Serializes `value` to JSON and signs the result.
    pub fn create<T: Serialize>(value: &T, key: &str) -> Result<Self, SignatureError> {
        let body = serde_json::to_string(value).map_err(|e| SignatureError::SerializationError(e.to_string()))?;
        let signature = sign_payload(key, body.as_bytes())?;
        Ok(Self { body, signature })
    }

    pub fn verify(&self, key: &str) -> Result<(), SignatureError> {
        verify_signature(key, self.body.as_bytes(), &self.signature)
    }
}

fn mac_for(key: &str) -> Result<HmacSha256, SignatureError> {
    if key.is_empty() {
        return Err(SignatureError::MissingKey);
    }
    // HMAC accepts keys of any length, so this cannot fail for a non-empty key
    HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| SignatureError::MissingKey)
}

/// Returns the base64-encoded HMAC-SHA256 of `data` under `key`.
pub fn sign_payload(key: &str, data: &[u8]) -> Result<String, SignatureError> {
    let mut mac = mac_for(key)?;
    mac.update(data);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(key: &str, data: &[u8], signature: &str) -> Result<(), SignatureError> {
    let expected = BASE64.decode(signature.trim()).map_err(|_| {
        warn!("🔐️ Received a signature that is not valid base64");
        SignatureError::MalformedSignature
    })?;
    let mut mac = mac_for(key)?;
    mac.update(data);
    mac.verify_slice(&expected).map_err(|_| {
        warn!("🔐️ Signature mismatch on incoming payload");
        SignatureError::InvalidSignature
    })
}
