//! HMAC-SHA-256 token signatures
//!
//! Signatures travel as lowercase hex. Verification decodes the hex and lets
//! ring compare tags in constant time.

use ring::hmac;

/// Keyed digest bound to one secret
#[derive(Debug, Clone)]
pub struct Signer {
    key: hmac::Key,
}

impl Signer {
    /// The whole secret is the HMAC key, no truncation
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Sign `message`, returning 64 lowercase hex characters
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(hmac::sign(&self.key, message).as_ref())
    }

    /// Check a hex signature produced by `sign_hex`.
    ///
    /// Uppercase hex is rejected: the signature is compared as rendered.
    pub fn verify_hex(&self, message: &[u8], signature: &str) -> bool {
        if !signature
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return false;
        }
        match hex::decode(signature) {
            Ok(tag) => hmac::verify(&self.key, message, &tag).is_ok(),
            Err(_) => false,
        }
    }
}
