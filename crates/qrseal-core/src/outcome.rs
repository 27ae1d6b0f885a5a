//! Decode result

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::rules::Rule;

/// Result of [`Codec::decode`](crate::Codec::decode). Every token maps to
/// exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Authentic and fresh
    Valid { data: Value },
    /// Corrupt, forged, unsupported or malformed
    Invalid { reason: String },
    /// Authentic but older than the validity window
    Expired,
}

impl Outcome {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Outcome::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid { .. })
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Outcome::Expired)
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Outcome::Valid { data } => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Outcome::Valid { data } => Some(data),
            _ => None,
        }
    }

    /// Re-type a valid payload. `None` unless the outcome is `Valid`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.data().map(|data| T::deserialize(data))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Invalid { reason } => Some(reason),
            _ => None,
        }
    }

    /// Apply a business rule: a failing rule turns `Valid` into `Invalid`.
    /// `Invalid` and `Expired` pass through untouched.
    pub fn enforce<R: Rule + ?Sized>(self, rule: &R) -> Self {
        match self {
            Outcome::Valid { data } => match rule.check(&data) {
                Ok(()) => Outcome::Valid { data },
                Err(reason) => Outcome::Invalid { reason },
            },
            other => other,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Valid { .. } => write!(f, "valid"),
            Outcome::Invalid { reason } => write!(f, "invalid: {reason}"),
            Outcome::Expired => write!(f, "expired"),
        }
    }
}
