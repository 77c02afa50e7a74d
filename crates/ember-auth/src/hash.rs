//! Salted password/token hashing. spec.md leaves the exact algorithm a
//! policy knob but is explicit about two properties: salts are never
//! reused across users, and comparison is constant-time. SHA-512 is the
//! normative choice named in §4.G.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as base64_standard;
use rand::RngCore;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// 128 bits, the minimum spec.md requires for a per-user salt.
const SALT_BYTES: usize = 16;

/// A fresh random salt. Never reused — callers must generate one per user
/// (or, for tokens, effectively per token, since the token's own entropy
/// plays the salt's role).
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// `base64(SHA-512(secret || salt))`.
pub fn hash_with_salt(secret: &str, salt: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(secret.as_bytes());
    hasher.update(salt);
    base64_standard.encode(hasher.finalize())
}

/// `base64(SHA-512(secret))` — used for tokens, which carry their own
/// entropy and so need no separate salt.
pub fn hash_unsalted(secret: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(secret.as_bytes());
    base64_standard.encode(hasher.finalize())
}

/// Constant-time comparison of two base64 hash strings. Never short-circuit
/// on length first in a way that leaks timing — `ct_eq` handles equal-length
/// inputs in constant time; differing lengths are rejected immediately
/// (this alone leaks no secret-dependent information, only the hash's own
/// fixed output length, which is public).
pub fn hashes_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_same_salt_hashes_equal() {
        let salt = generate_salt();
        let a = hash_with_salt("hunter2", &salt);
        let b = hash_with_salt("hunter2", &salt);
        assert!(hashes_equal(&a, &b));
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = hash_with_salt("hunter2", &generate_salt());
        let b = hash_with_salt("hunter2", &generate_salt());
        assert!(!hashes_equal(&a, &b));
    }

    #[test]
    fn salts_are_not_reused() {
        let a = generate_salt();
        let b = generate_salt();
        assert_ne!(a, b);
    }

    #[test]
    fn different_length_hashes_are_never_equal() {
        assert!(!hashes_equal("abc", "abcd"));
    }
}
