use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{hmac_sha256_hex, Signer};
use base64::{engine::general_purpose, Engine as _};
use secrecy::{ExposeSecret, Secret};
use zeroize::Zeroizing;

const LOGIN_PATH: &str = "/users/self/verify";
const LOGIN_METHOD: &str = "GET";

pub struct BlofinSigner {
    secret_key: Secret<String>,
}

impl BlofinSigner {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key: Secret::new(secret_key),
        }
    }

    /// Generate the login signature
    /// The prehash string format is: path + method + timestamp + nonce + body (empty)
    fn generate_signature(&self, timestamp: &str, nonce: &str) -> Result<String, ExchangeError> {
        let prehash = format!("{}{}{}{}", LOGIN_PATH, LOGIN_METHOD, timestamp, nonce);
        let digest = Zeroizing::new(hmac_sha256_hex(self.secret_key.expose_secret(), &prehash)?);

        // BloFin base64-encodes the hex digest text, not the raw digest bytes
        Ok(general_purpose::STANDARD.encode(digest.as_bytes()))
    }
}

impl Signer for BlofinSigner {
    fn sign_login(&self, timestamp: &str, nonce: &str) -> Result<String, ExchangeError> {
        self.generate_signature(timestamp, nonce)
    }
}
