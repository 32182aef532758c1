use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signer trait for WebSocket login authentication
///
/// Implementations own the secret and produce the `sign` field of the login
/// request for a given timestamp and nonce.
pub trait Signer: Send + Sync {
    /// Sign a login request
    ///
    /// # Arguments
    /// * `timestamp` - Milliseconds since epoch, as sent on the wire
    /// * `nonce` - Request nonce, as sent on the wire
    fn sign_login(&self, timestamp: &str, nonce: &str) -> Result<String, ExchangeError>;
}

/// HMAC-SHA256 over `payload`, lowercase hex encoded
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;

    mac.update(payload.as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}
