//! Password hashing.
//!
//! The server stores `salt + base64(digest)` where the digest is SHA-512
//! applied repeatedly to `salt + password`.

pub mod hasher;

pub use hasher::{generate_salt, HashError, PasswordHasher, Sha512Hasher};
