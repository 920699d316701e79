//! Self-describing Argon2id password credentials.
//!
//! A credential is stored as a single string:
//!
//! ```text
//! $argon2id$v=19$m=65536,t=3,p=2$<salt>$<key>
//! ```
//!
//! Salt and key are unpadded standard base64. Verification reads every
//! parameter back out of the string, so changing the defaults never breaks
//! existing credentials.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use rand::Rng;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::error::ErrorKind;

pub const ALGORITHM: &str = "argon2id";

/// Argon2 version understood by this build (0x13).
pub const VERSION: u32 = 0x13;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("password does not match credential")]
    InvalidPassword,

    #[error("credential version {found} does not match supported version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("unsupported credential algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),
}

impl CredentialError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPassword => ErrorKind::NotAuthenticated,
            _ => ErrorKind::Internal,
        }
    }
}

/// Cost parameters used when minting a new credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub salt_length: usize,
    pub key_length: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_cost: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            salt_length: 16,
            key_length: 32,
        }
    }
}

impl From<&SecurityConfig> for HashParams {
    fn from(cfg: &SecurityConfig) -> Self {
        Self {
            memory_cost: cfg.argon2_memory_cost_kib,
            iterations: cfg.argon2_time_cost,
            parallelism: cfg.argon2_parallelism,
            salt_length: cfg.salt_length,
            key_length: cfg.key_length,
        }
    }
}

/// Parsed form of an encoded credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    version: u32,
    memory_cost: u32,
    iterations: u32,
    parallelism: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

impl Credential {
    /// Derives a credential for `password` using `salt` and the cost parameters
    /// of `params`. The output key length is `params.key_length`.
    pub fn derive(
        password: &str,
        salt: Vec<u8>,
        params: &HashParams,
    ) -> Result<Self, CredentialError> {
        let argon_params = Params::new(
            params.memory_cost,
            params.iterations,
            params.parallelism,
            Some(params.key_length),
        )
        .map_err(|e| CredentialError::Kdf(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
        let mut key = vec![0u8; params.key_length];
        argon2
            .hash_password_into(password.as_bytes(), &salt, &mut key)
            .map_err(|e| CredentialError::Kdf(e.to_string()))?;

        Ok(Self {
            version: VERSION,
            memory_cost: params.memory_cost,
            iterations: params.iterations,
            parallelism: params.parallelism,
            salt,
            key,
        })
    }

    /// Cost parameters recovered from this credential.
    #[must_use]
    pub const fn params(&self) -> HashParams {
        HashParams {
            memory_cost: self.memory_cost,
            iterations: self.iterations,
            parallelism: self.parallelism,
            salt_length: self.salt.len(),
            key_length: self.key.len(),
        }
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${ALGORITHM}$v={}$m={},t={},p={}${}${}",
            self.version,
            self.memory_cost,
            self.iterations,
            self.parallelism,
            STANDARD_NO_PAD.encode(&self.salt),
            STANDARD_NO_PAD.encode(&self.key),
        )
    }
}

impl FromStr for Credential {
    type Err = CredentialError;

    fn from_str(encoded: &str) -> Result<Self, Self::Err> {
        let sections: Vec<&str> = encoded.split('$').collect();
        let [leading, algorithm, version, costs, salt, key] = sections.as_slice() else {
            return Err(CredentialError::Malformed(format!(
                "expected 6 '$'-separated sections, found {}",
                sections.len()
            )));
        };

        if !leading.is_empty() {
            return Err(CredentialError::Malformed(
                "credential must start with '$'".to_string(),
            ));
        }
        if *algorithm != ALGORITHM {
            return Err(CredentialError::UnsupportedAlgorithm((*algorithm).to_string()));
        }

        let version = parse_field(version, "v")?;
        if version != VERSION {
            return Err(CredentialError::VersionMismatch {
                found: version,
                expected: VERSION,
            });
        }

        let cost_fields: Vec<&str> = costs.split(',').collect();
        let [memory, iterations, parallelism] = cost_fields.as_slice() else {
            return Err(CredentialError::Malformed(format!(
                "expected m=,t=,p= cost section, found '{costs}'"
            )));
        };

        Ok(Self {
            version,
            memory_cost: parse_field(memory, "m")?,
            iterations: parse_field(iterations, "t")?,
            parallelism: parse_field(parallelism, "p")?,
            salt: decode_section(salt, "salt")?,
            key: decode_section(key, "key")?,
        })
    }
}

fn parse_field(section: &str, name: &str) -> Result<u32, CredentialError> {
    section
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('='))
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| CredentialError::Malformed(format!("invalid '{name}' field: '{section}'")))
}

fn decode_section(section: &str, name: &str) -> Result<Vec<u8>, CredentialError> {
    STANDARD_NO_PAD
        .decode(section)
        .map_err(|e| CredentialError::Malformed(format!("invalid {name} encoding: {e}")))
}

/// Fills a fresh buffer of `length` bytes from the thread-local CSPRNG.
pub(crate) fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    rand::rng().fill(bytes.as_mut_slice());
    bytes
}

/// Hashes `password` with a freshly generated salt.
///
/// CPU and memory heavy; async callers should run it on a blocking thread.
pub fn hash_password(password: &str, params: &HashParams) -> Result<String, CredentialError> {
    let salt = random_bytes(params.salt_length);
    Credential::derive(password, salt, params).map(|c| c.to_string())
}

/// Verifies `password` against an encoded credential.
///
/// The key is always fully re-derived with the parsed salt and parameters and
/// the complete re-encoded string is compared, so a corrupted encoding fails
/// the same way a wrong password does.
pub fn verify_password(password: &str, encoded: &str) -> Result<(), CredentialError> {
    let stored: Credential = encoded.parse()?;
    let candidate = Credential::derive(password, stored.salt.clone(), &stored.params())?;

    if full_length_eq(candidate.to_string().as_bytes(), encoded.as_bytes()) {
        Ok(())
    } else {
        Err(CredentialError::InvalidPassword)
    }
}

// Visits every byte; does not stop at the first difference.
fn full_length_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for (x, y) in a.iter().zip(b) {
        diff |= usize::from(x ^ y);
    }
    diff == 0
}
