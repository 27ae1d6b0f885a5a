//! Layered CLI settings
//!
//! Precedence, lowest first: TOML file, environment, command-line flags.

use anyhow::{bail, Context};
use chrono::Duration;
use qrseal_core::{Config, IvPolicy};
use serde::Deserialize;
use std::path::Path;

pub const ENV_SECRET: &str = "QRSEAL_SECRET";
pub const ENV_VALIDITY_SECS: &str = "QRSEAL_VALIDITY_SECS";

/// Every field optional so layers can be merged
#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub secret: Option<String>,
    pub validity_secs: Option<i64>,
    pub encryption: Option<bool>,
    pub signature: Option<bool>,
    pub per_token_iv: Option<bool>,
}

impl Settings {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Invalid settings file")
    }

    /// File (if any) plus process environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(secret) = lookup(ENV_SECRET) {
            self.secret = Some(secret);
        }
        if let Some(raw) = lookup(ENV_VALIDITY_SECS) {
            let secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_VALIDITY_SECS} is not an integer: {raw:?}"))?;
            self.validity_secs = Some(secs);
        }
        Ok(())
    }

    /// Fields set in `overrides` win
    pub fn merge(&mut self, overrides: Settings) {
        self.secret = overrides.secret.or(self.secret.take());
        self.validity_secs = overrides.validity_secs.or(self.validity_secs);
        self.encryption = overrides.encryption.or(self.encryption);
        self.signature = overrides.signature.or(self.signature);
        self.per_token_iv = overrides.per_token_iv.or(self.per_token_iv);
    }

    pub fn into_config(self) -> anyhow::Result<Config> {
        let Some(secret) = self.secret else {
            bail!(
                "No secret configured: pass --secret, set {ENV_SECRET} \
                 or add `secret` to the settings file"
            );
        };

        let mut builder = Config::builder(secret)
            .encryption(self.encryption.unwrap_or(true))
            .signature(self.signature.unwrap_or(true));
        if let Some(secs) = self.validity_secs {
            let validity = Duration::try_seconds(secs)
                .with_context(|| format!("validity_secs out of range: {secs}"))?;
            builder = builder.validity(validity);
        }
        if self.per_token_iv.unwrap_or(false) {
            builder = builder.iv_policy(IvPolicy::PerToken);
        }
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_toml() {
        let settings = Settings::from_toml(&format!(
            "secret = \"{SECRET}\"\nvalidity_secs = 60\nsignature = false\nper_token_iv = true\n"
        ))
        .unwrap();

        assert_eq!(settings.secret.as_deref(), Some(SECRET));
        assert_eq!(settings.validity_secs, Some(60));
        assert_eq!(settings.encryption, None);

        let config = settings.into_config().unwrap();
        assert_eq!(config.validity(), Duration::seconds(60));
        assert!(config.encryption_enabled());
        assert!(!config.signature_enabled());
        assert_eq!(config.iv_policy(), IvPolicy::PerToken);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Settings::from_toml("secrett = \"typo\"").is_err());
    }

    #[test]
    fn test_env_then_flags_precedence() {
        let mut settings =
            Settings::from_toml("secret = \"from-file\"\nvalidity_secs = 10").unwrap();
        settings
            .apply_env(|key| match key {
                ENV_SECRET => Some("from-env".to_string()),
                ENV_VALIDITY_SECS => Some(" 30 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.secret.as_deref(), Some("from-env"));
        assert_eq!(settings.validity_secs, Some(30));

        settings.merge(Settings {
            validity_secs: Some(90),
            encryption: Some(false),
            ..Settings::default()
        });
        assert_eq!(settings.secret.as_deref(), Some("from-env"));
        assert_eq!(settings.validity_secs, Some(90));
        assert_eq!(settings.encryption, Some(false));
    }

    #[test]
    fn test_bad_env_validity() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(|key| (key == ENV_VALIDITY_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_VALIDITY_SECS));
    }

    #[test]
    fn test_validity_out_of_range() {
        for secs in [i64::MAX, i64::MIN] {
            let settings = Settings {
                secret: Some(SECRET.to_string()),
                validity_secs: Some(secs),
                ..Settings::default()
            };
            let err = settings.into_config().unwrap_err();
            assert!(err.to_string().contains("out of range"), "{err}");
        }

        let mut settings = Settings::from_toml(&format!("secret = \"{SECRET}\"")).unwrap();
        settings
            .apply_env(|key| (key == ENV_VALIDITY_SECS).then(|| i64::MAX.to_string()))
            .unwrap();
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn test_missing_or_short_secret() {
        assert!(Settings::default().into_config().is_err());

        let short = Settings {
            secret: Some("short".into()),
            ..Settings::default()
        };
        assert!(short.into_config().is_err());

        let short_plain = Settings {
            secret: Some("short".into()),
            encryption: Some(false),
            ..Settings::default()
        };
        assert!(short_plain.into_config().is_ok());
    }
}
