//! qrseal Core - sealed, self-expiring payload tokens
//!
//! A [`Codec`] turns any JSON value into an opaque base64 token and back,
//! enforcing authenticity (HMAC-SHA-256), optional confidentiality
//! (AES-256-CBC) and freshness (issue timestamp plus validity window).
//!
//! ```no_run
//! use qrseal_core::{Codec, Config, Outcome};
//! use serde_json::json;
//!
//! let config = Config::new("a-secret-that-is-at-least-32-bytes-long")?;
//! let codec = Codec::new(config);
//!
//! let token = codec.encode(&json!({ "ticket": 42 }))?;
//! match codec.decode(&token) {
//!     Outcome::Valid { data } => println!("ok: {data}"),
//!     Outcome::Expired => println!("stale, rescan"),
//!     Outcome::Invalid { reason } => println!("rejected: {reason}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod canonical;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod outcome;
pub mod rules;
pub mod time;

pub use codec::{Codec, GenerationError};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use envelope::{Envelope, FORMAT_VERSION};
pub use outcome::Outcome;
pub use qrseal_crypto::IvPolicy;
pub use rules::{from_fn, NumericRange, RequiredFields, Rule};
pub use time::{SimulatedTimeSource, SystemTimeSource, TimeSource};
