//! Iterated SHA-512 password hasher.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::random::RandomSource;

const SALT_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("password hash rounds must be greater than zero")]
    ZeroRounds,
}

/// Computes stored password hashes.
pub trait PasswordHasher: Send + Sync {
    fn compute_hash(&self, password: &str, salt: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct Sha512Hasher {
    rounds: u32,
}

impl Sha512Hasher {
    /// Prepare the hasher. Called once at startup.
    pub fn initialize(rounds: u32) -> Result<Self, HashError> {
        if rounds == 0 {
            return Err(HashError::ZeroRounds);
        }
        Ok(Self { rounds })
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

impl PasswordHasher for Sha512Hasher {
    fn compute_hash(&self, password: &str, salt: &str) -> String {
        let mut digest = Sha512::digest(format!("{salt}{password}").as_bytes());
        for _ in 1..self.rounds {
            digest = Sha512::digest(digest);
        }
        format!("{salt}{}", STANDARD.encode(digest))
    }
}

/// Random alphanumeric salt of `len` characters.
pub fn generate_salt<R: RandomSource + ?Sized>(rng: &R, len: usize) -> String {
    let last = SALT_ALPHABET.len() as i32 - 1;
    rng.draw_batch(len, 0, last)
        .into_iter()
        .map(|index| SALT_ALPHABET[index.clamp(0, last) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RngEngine;

    #[test]
    fn single_round_is_plain_sha512() {
        let hasher = Sha512Hasher::initialize(1).unwrap();
        let expected = format!("salt{}", STANDARD.encode(Sha512::digest(b"saltsecret")));
        assert_eq!(hasher.compute_hash("secret", "salt"), expected);
    }

    #[test]
    fn rounds_change_the_digest() {
        let one = Sha512Hasher::initialize(1).unwrap().compute_hash("pw", "s");
        let many = Sha512Hasher::initialize(1_000).unwrap().compute_hash("pw", "s");
        assert_ne!(one, many);
        assert!(many.starts_with('s'));
        assert_eq!(many, Sha512Hasher::initialize(1_000).unwrap().compute_hash("pw", "s"));
    }

    #[test]
    fn zero_rounds_rejected() {
        assert_eq!(Sha512Hasher::initialize(0).unwrap_err(), HashError::ZeroRounds);
    }

    #[test]
    fn salt_uses_alphabet() {
        let salt = generate_salt(&RngEngine::seeded(3), 16);
        assert_eq!(salt.len(), 16);
        assert!(salt.bytes().all(|b| SALT_ALPHABET.contains(&b)));
    }
}
