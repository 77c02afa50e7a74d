//! Bearer tokens: opaque, printable, base64url-safe on the wire; stored
//! only as a hash, never in plaintext (spec.md §4.G's open question is
//! resolved in favor of always hashing — see DESIGN.md).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as base64_url;
use chrono::{DateTime, Utc};
use ember_types::TokenId;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// 256 bits of entropy before base64url encoding — comfortably under
/// the wire format's 256-ASCII-char cap (§6) once encoded.
const TOKEN_ENTROPY_BYTES: usize = 32;

/// Generate a fresh opaque bearer token. The returned string is what the
/// client sees and must present on every subsequent call; the server
/// never stores it, only [`crate::hash::hash_unsalted`] of it.
pub fn generate_token() -> String {
    let mut bytes = vec![0u8; TOKEN_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64_url.encode(bytes)
}

/// A persisted token record: everything needed to verify a presented
/// token and to list/revoke it, but never the token itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub id: TokenId,
    /// Lookup key into the user table; case as originally registered.
    pub username: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub device_name: String,
}
