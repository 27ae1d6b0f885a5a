//! AES-256-CBC token encryption
//!
//! The secret is stretched or cut to a 32-byte key once, at construction.
//! Two IV policies exist:
//! - `Static`: 16 zero bytes for every token. This is the default wire
//!   format. Identical plaintexts under one key give identical ciphertexts.
//! - `PerToken`: a fresh random IV per call, prepended to the ciphertext.
//!   Not wire-compatible with `Static`.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;
/// 128-bit IV (one AES block)
pub const IV_SIZE: usize = 16;

/// Byte used to pad secrets shorter than `KEY_SIZE`
const KEY_PAD: u8 = b' ';

const SECRET_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Invalid key or IV length")]
    InvalidLength,

    #[error("System random source unavailable")]
    RandomSource,

    #[error("Decryption failed - data may be corrupted, truncated or encrypted under another key")]
    DecryptionFailed,

    #[error("Ciphertext too short to carry a {IV_SIZE}-byte IV")]
    MissingIv,
}

/// How the CBC initialization vector is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvPolicy {
    /// Fixed all-zero IV shared by every token
    #[default]
    Static,
    /// Random IV per token, carried as the first block of the ciphertext
    PerToken,
}

/// Derive the AES key from a secret: first 32 bytes, space-padded if short.
pub fn derive_key(secret: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([KEY_PAD; KEY_SIZE]);
    let len = secret.len().min(KEY_SIZE);
    key[..len].copy_from_slice(&secret[..len]);
    key
}

/// Generate a cryptographically secure random IV
pub fn generate_iv() -> Result<[u8; IV_SIZE], CipherError> {
    let mut iv = [0u8; IV_SIZE];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| CipherError::RandomSource)?;
    Ok(iv)
}

/// Generate a random alphanumeric secret of `len` characters.
///
/// Bytes are drawn by rejection sampling so every character is equally likely.
pub fn generate_secret(len: usize) -> Result<String, CipherError> {
    // Largest multiple of the alphabet size that fits in a byte
    let limit = (256 / SECRET_ALPHABET.len() * SECRET_ALPHABET.len()) as u8;
    let rng = SystemRandom::new();
    let mut secret = String::with_capacity(len);
    let mut buf = Zeroizing::new([0u8; 64]);

    while secret.len() < len {
        rng.fill(&mut buf[..]).map_err(|_| CipherError::RandomSource)?;
        for &b in buf.iter().filter(|&&b| b < limit) {
            if secret.len() == len {
                break;
            }
            secret.push(SECRET_ALPHABET[b as usize % SECRET_ALPHABET.len()] as char);
        }
    }
    Ok(secret)
}

/// Symmetric cipher bound to one derived key.
///
/// Each call builds its own CBC context, so a shared `TokenCipher` is safe to
/// use from many threads at once.
pub struct TokenCipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
    policy: IvPolicy,
}

impl TokenCipher {
    pub fn new(secret: &[u8], policy: IvPolicy) -> Self {
        Self {
            key: derive_key(secret),
            policy,
        }
    }

    pub fn policy(&self) -> IvPolicy {
        self.policy
    }

    /// Encrypt with PKCS#7 padding.
    ///
    /// Returns: ciphertext (`Static`) or iv || ciphertext (`PerToken`)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let iv = match self.policy {
            IvPolicy::Static => [0u8; IV_SIZE],
            IvPolicy::PerToken => generate_iv()?,
        };

        let ciphertext = Aes256CbcEnc::new_from_slices(&self.key[..], &iv)
            .map_err(|_| CipherError::InvalidLength)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        match self.policy {
            IvPolicy::Static => Ok(ciphertext),
            IvPolicy::PerToken => {
                let mut result = Vec::with_capacity(IV_SIZE + ciphertext.len());
                result.extend_from_slice(&iv);
                result.extend_from_slice(&ciphertext);
                Ok(result)
            }
        }
    }

    /// Decrypt output of `encrypt()` under the same policy
    pub fn decrypt(&self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        let (iv, ciphertext) = match self.policy {
            IvPolicy::Static => ([0u8; IV_SIZE], data),
            IvPolicy::PerToken => {
                if data.len() < IV_SIZE {
                    return Err(CipherError::MissingIv);
                }
                let (iv, rest) = data.split_at(IV_SIZE);
                let mut block = [0u8; IV_SIZE];
                block.copy_from_slice(iv);
                (block, rest)
            }
        };

        let plaintext = Aes256CbcDec::new_from_slices(&self.key[..], &iv)
            .map_err(|_| CipherError::InvalidLength)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)?;

        Ok(Zeroizing::new(plaintext))
    }
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher")
            .field("key", &"[REDACTED]")
            .field("policy", &self.policy)
            .finish()
    }
}
