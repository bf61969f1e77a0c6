//! GitHub-style `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Holds the shared secret. Can only exist when a secret is configured.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Returns `sha256=<hex HMAC>` of `payload` under this secret.
    pub fn sign(&self, payload: &[u8]) -> Option<String> {
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(e) => {
                error!("Could not key HMAC with the webhook secret: {}", e);
                return None;
            }
        };
        mac.update(payload);
        Some(format!(
            "{}{}",
            SIGNATURE_PREFIX,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Compares the supplied digest against the expected one in constant time.
    /// Digests of a different length never match.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> bool {
        let Some(expected) = self.sign(payload) else {
            return false;
        };
        expected.as_bytes().ct_eq(signature_header.as_bytes()).into()
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}
