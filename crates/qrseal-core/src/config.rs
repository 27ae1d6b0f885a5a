//! Codec configuration
//!
//! Validated once at construction, immutable afterwards. Share it between
//! codecs with `Arc<Config>`.

use chrono::Duration;
use qrseal_crypto::IvPolicy;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use thiserror::Error;

/// Minimum secret length in bytes when encryption is enabled
pub const MIN_SECRET_LEN: usize = 32;

/// Default validity window (5 minutes)
pub const DEFAULT_VALIDITY_SECS: i64 = 5 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Secret too short for encryption: {len} bytes, need at least {min}")]
    SecretTooShort { len: usize, min: usize },
}

/// Security parameters for a [`Codec`](crate::Codec)
pub struct Config {
    secret: SecretString,
    validity: Duration,
    encryption: bool,
    signature: bool,
    iv_policy: IvPolicy,
}

impl Config {
    /// Defaults: 5 minute window, encryption and signature on, static IV
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder(secret).build()
    }

    pub fn builder(secret: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            secret: SecretString::new(secret.into()),
            validity: Duration::seconds(DEFAULT_VALIDITY_SECS),
            encryption: true,
            signature: true,
            iv_policy: IvPolicy::default(),
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn encryption_enabled(&self) -> bool {
        self.encryption
    }

    pub fn signature_enabled(&self) -> bool {
        self.signature
    }

    pub fn iv_policy(&self) -> IvPolicy {
        self.iv_policy
    }

    /// Suggested re-encode cadence: 80% of the validity window.
    ///
    /// Zero for non-positive windows, where every token is already stale.
    pub fn refresh_interval(&self) -> std::time::Duration {
        let window = self.validity.num_milliseconds();
        if window <= 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_millis(window as u64 / 5 * 4)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret", &"[REDACTED]")
            .field("validity", &self.validity)
            .field("encryption", &self.encryption)
            .field("signature", &self.signature)
            .field("iv_policy", &self.iv_policy)
            .finish()
    }
}

/// Builder for [`Config`]; validation happens in [`build`](Self::build)
pub struct ConfigBuilder {
    secret: SecretString,
    validity: Duration,
    encryption: bool,
    signature: bool,
    iv_policy: IvPolicy,
}

impl ConfigBuilder {
    /// Zero and negative windows are accepted; such tokens decode as expired
    pub fn validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn encryption(mut self, enabled: bool) -> Self {
        self.encryption = enabled;
        self
    }

    pub fn signature(mut self, enabled: bool) -> Self {
        self.signature = enabled;
        self
    }

    pub fn iv_policy(mut self, policy: IvPolicy) -> Self {
        self.iv_policy = policy;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let len = self.secret.expose_secret().len();
        if self.encryption && len < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort {
                len,
                min: MIN_SECRET_LEN,
            });
        }

        Ok(Config {
            secret: self.secret,
            validity: self.validity,
            encryption: self.encryption,
            signature: self.signature,
            iv_policy: self.iv_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = Config::new(SECRET).unwrap();
        assert_eq!(config.validity(), Duration::minutes(5));
        assert!(config.encryption_enabled());
        assert!(config.signature_enabled());
        assert_eq!(config.iv_policy(), IvPolicy::Static);
    }

    #[test]
    fn test_short_secret_rejected_only_with_encryption() {
        let err = Config::new("short-key!").unwrap_err();
        assert_eq!(err, ConfigError::SecretTooShort { len: 10, min: 32 });

        let config = Config::builder("short-key!").encryption(false).build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_secret_length_is_measured_in_bytes() {
        // 16 two-byte characters = 32 bytes
        let secret = "é".repeat(16);
        assert!(Config::new(secret).is_ok());
        assert!(Config::new("é".repeat(15)).is_err());
    }

    #[test]
    fn test_non_positive_validity_accepted() {
        let zero = Config::builder(SECRET).validity(Duration::zero()).build().unwrap();
        assert_eq!(zero.refresh_interval(), std::time::Duration::ZERO);

        let negative = Config::builder(SECRET)
            .validity(Duration::seconds(-5))
            .build()
            .unwrap();
        assert_eq!(negative.validity(), Duration::seconds(-5));
    }

    #[test]
    fn test_refresh_interval() {
        let config = Config::new(SECRET).unwrap();
        assert_eq!(config.refresh_interval(), std::time::Duration::from_secs(240));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let rendered = format!("{:?}", Config::new(SECRET).unwrap());
        assert!(!rendered.contains(SECRET));
    }
}
