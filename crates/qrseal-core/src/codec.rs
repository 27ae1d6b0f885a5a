//! Token codec
//!
//! encode: payload → envelope → (signature) → JSON → (AES-256-CBC) → base64
//! decode: the reverse, folded into a single [`Outcome`]. Decode is a boundary
//! over untrusted input (whatever the camera scanned) and never fails outward.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use qrseal_crypto::{CipherError, Signer, TokenCipher};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::canonical;
use crate::config::Config;
use crate::envelope::{Envelope, FORMAT_VERSION};
use crate::outcome::Outcome;
use crate::time::{SystemTimeSource, TimeSource};

const SIGNATURE_FIELD: &str = "signature";
const VERSION_FIELD: &str = "version";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Encryption failed: {0}")]
    Cipher(#[from] CipherError),
}

/// Decode failures. `Display` is the `Invalid` reason handed to callers.
#[derive(Error, Debug)]
enum DecodeError {
    #[error("base64 decode error")]
    Base64,

    #[error("decryption error")]
    Decryption,

    #[error("malformed payload")]
    Malformed,

    #[error("unsupported version")]
    UnsupportedVersion,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Encodes payloads into sealed tokens and decodes them back.
///
/// Key material is derived once in [`Codec::new`] and never changes, so one
/// codec can be shared across threads without locking.
#[derive(Debug)]
pub struct Codec {
    config: Arc<Config>,
    cipher: Option<TokenCipher>,
    signer: Option<Signer>,
    clock: Arc<dyn TimeSource>,
}

impl Codec {
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(config: impl Into<Arc<Config>>, clock: Arc<dyn TimeSource>) -> Self {
        let config = config.into();
        let secret = config.secret().expose_secret().as_bytes();

        let cipher = config
            .encryption_enabled()
            .then(|| TokenCipher::new(secret, config.iv_policy()));
        let signer = config.signature_enabled().then(|| Signer::new(secret));

        debug!(
            encryption = config.encryption_enabled(),
            signature = config.signature_enabled(),
            iv_policy = ?config.iv_policy(),
            validity_ms = config.validity().num_milliseconds(),
            "codec ready"
        );

        Self {
            config,
            cipher,
            signer,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Seal `payload` into a base64 token stamped with the current time
    pub fn encode(&self, payload: &Value) -> Result<String, GenerationError> {
        let mut envelope = Envelope::new(payload.clone(), self.clock.now_millis());

        if let Some(signer) = &self.signer {
            let unsigned = serde_json::to_value(&envelope)?;
            let canonical = canonical::to_canonical_string(&unsigned);
            envelope.signature = Some(signer.sign_hex(canonical.as_bytes()));
        }

        let serialized = serde_json::to_vec(&envelope)?;
        let sealed = match &self.cipher {
            Some(cipher) => cipher.encrypt(&serialized)?,
            None => serialized,
        };

        trace!(
            id = %envelope.id,
            timestamp = envelope.timestamp,
            bytes = sealed.len(),
            "token encoded"
        );
        Ok(BASE64.encode(sealed))
    }

    /// [`encode`](Self::encode) for any serializable record
    pub fn encode_as<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, GenerationError> {
        self.encode(&serde_json::to_value(payload)?)
    }

    /// Open a token. Total: every input yields exactly one [`Outcome`].
    pub fn decode(&self, token: &str) -> Outcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.open(token))) {
            Ok(Ok(outcome)) => {
                if outcome.is_expired() {
                    debug!("token expired");
                }
                outcome
            }
            Ok(Err(err)) => {
                debug!(reason = %err, "token rejected");
                Outcome::invalid(err.to_string())
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                warn!(%cause, "decode panicked");
                Outcome::invalid(DecodeError::Unexpected(cause).to_string())
            }
        }
    }

    fn open(&self, token: &str) -> Result<Outcome, DecodeError> {
        let raw = BASE64
            .decode(token.trim())
            .map_err(|_| DecodeError::Base64)?;

        let mut fields = match &self.cipher {
            Some(cipher) => {
                let plaintext = cipher.decrypt(&raw).map_err(|_| DecodeError::Decryption)?;
                parse_object(&plaintext)?
            }
            None => parse_object(&raw)?,
        };

        match fields.get(VERSION_FIELD).and_then(Value::as_u64) {
            Some(FORMAT_VERSION) => {}
            _ => return Err(DecodeError::UnsupportedVersion),
        }

        let signature = fields.remove(SIGNATURE_FIELD);
        let unsigned = Value::Object(fields);

        if let Some(signer) = &self.signer {
            let canonical = canonical::to_canonical_string(&unsigned);
            let verified = matches!(
                &signature,
                Some(Value::String(hex)) if signer.verify_hex(canonical.as_bytes(), hex)
            );
            if !verified {
                return Err(DecodeError::SignatureMismatch);
            }
        }

        let envelope: Envelope = serde_json::from_value(unsigned)
            .map_err(|e| DecodeError::Unexpected(e.to_string()))?;

        if self.is_expired(envelope.timestamp) {
            return Ok(Outcome::Expired);
        }

        Ok(Outcome::Valid {
            data: envelope.data,
        })
    }

    /// A non-positive window expires everything, even within the same millisecond
    fn is_expired(&self, issued_at: i64) -> bool {
        let window = self.config.validity().num_milliseconds();
        let elapsed = self.clock.now_millis().saturating_sub(issued_at);
        window <= 0 || elapsed > window
    }
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(DecodeError::Malformed),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
