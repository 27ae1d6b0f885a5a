//! qrseal Crypto - symmetric primitives for sealed tokens
//!
//! This crate provides:
//! - AES-256-CBC encryption with a fixed or per-token IV
//! - HMAC-SHA-256 signing rendered as hex
//! - Random secret generation

pub mod cipher;
pub mod mac;

pub use cipher::{generate_secret, CipherError, IvPolicy, TokenCipher, IV_SIZE, KEY_SIZE};
pub use mac::Signer;
