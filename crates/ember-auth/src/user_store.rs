//! Users and bearer tokens: `users(username PK, salt, passwordHash)` plus
//! `tokens(id PK, username, tokenHash, createdAt, deviceName)` from
//! spec.md §4.G, built on the same one-group-per-entity [`GroupStore`]
//! layout the rule store uses.
//!
//! Usernames are case-insensitive on lookup but the originally-registered
//! case is retained for display — the users table is keyed by the
//! lowercased username, with the record itself carrying the original.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as base64_standard;
use chrono::Utc;
use ember_storage::GroupStore;
use ember_types::{EmberError, TokenId};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::credentials::{validate_password, validate_username};
use crate::hash::{generate_salt, hash_unsalted, hash_with_salt, hashes_equal};
use crate::token::{StoredToken, generate_token};

const USERS_TABLE: &str = "users";
const TOKENS_TABLE: &str = "tokens";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Original case as registered; the table key is the lowercased form.
    pub username: String,
    pub salt: String,
    pub password_hash: String,
    pub created_at: chrono::DateTime<Utc>,
}

pub struct UserStore {
    users: GroupStore,
    tokens: GroupStore,
    audit: Arc<dyn AuditSink>,
}

impl UserStore {
    pub fn new(backend: Arc<dyn ember_storage::KeyValueStore>) -> Self {
        Self {
            users: GroupStore::new(backend.clone(), USERS_TABLE),
            tokens: GroupStore::new(backend, TOKENS_TABLE),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Swap in a different [`AuditSink`] — tests use [`crate::NoOpAuditSink`]
    /// to avoid asserting against log output.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Whether any user has ever been created — drives the JSON-RPC core's
    /// "initial setup required" exemption list (spec.md §4.H).
    pub fn has_any_user(&self) -> Result<bool, EmberError> {
        Ok(!self.users.ids().map_err(EmberError::from)?.is_empty())
    }

    pub fn create_user(&self, username: &str, password: &str) -> Result<(), EmberError> {
        if !validate_username(username) {
            return Err(EmberError::InvalidParameter("username must be shaped like local@domain.tld".into()));
        }
        if !validate_password(password) {
            return Err(EmberError::InvalidParameter(
                "password must be at least 8 characters and contain a letter, a digit, and a symbol".into(),
            ));
        }
        let key = username.to_lowercase();
        if self.users.get::<UserRecord>(&key).map_err(EmberError::from)?.is_some() {
            return Err(EmberError::DuplicateId(username.to_string()));
        }

        let salt = generate_salt();
        let record = UserRecord {
            username: username.to_string(),
            salt: base64_standard.encode(&salt),
            password_hash: hash_with_salt(password, &salt),
            created_at: Utc::now(),
        };
        self.users.put(&key, &record).map_err(EmberError::from)
    }

    /// Verify `username`/`password` and, on success, mint and persist a
    /// fresh bearer token for `device_name`. Returns the *plaintext* token
    /// — the only time it is ever visible outside the caller's memory.
    pub fn authenticate(&self, username: &str, password: &str, device_name: &str) -> Result<(TokenId, String), EmberError> {
        let key = username.to_lowercase();
        let record = match self.users.get::<UserRecord>(&key).map_err(EmberError::from)? {
            Some(record) => record,
            None => {
                self.audit.record(AuditEvent::AuthenticationFailed { username });
                return Err(EmberError::BadPassword);
            }
        };

        let salt = base64_standard
            .decode(&record.salt)
            .map_err(|_| EmberError::BackendError("corrupt salt".into()))?;
        let candidate = hash_with_salt(password, &salt);
        if !hashes_equal(&candidate, &record.password_hash) {
            self.audit.record(AuditEvent::AuthenticationFailed { username: &record.username });
            return Err(EmberError::BadPassword);
        }

        let result = self.issue_token(&record.username, device_name);
        if result.is_ok() {
            self.audit.record(AuditEvent::AuthenticationSucceeded { username: &record.username, device_name });
        }
        result
    }

    /// Mint a token for an already-authenticated identity, bypassing the
    /// password check — used by push-button auth, which authenticates out
    /// of band via the physical button press instead of a password.
    pub fn issue_token(&self, username: &str, device_name: &str) -> Result<(TokenId, String), EmberError> {
        let plaintext = generate_token();
        let id = TokenId::new();
        let stored = StoredToken {
            id,
            username: username.to_string(),
            token_hash: hash_unsalted(&plaintext),
            created_at: Utc::now(),
            device_name: device_name.to_string(),
        };
        self.tokens.put(&id.to_string(), &stored).map_err(EmberError::from)?;
        Ok((id, plaintext))
    }

    /// Verify a presented bearer token. Returns the owning username iff
    /// the token hash matches a non-revoked record for a user that still
    /// exists. Linear in the token count — acceptable at the scale a
    /// single-household automation server operates at.
    pub fn verify_token(&self, presented: &str) -> Result<Option<String>, EmberError> {
        let candidate_hash = hash_unsalted(presented);
        for (_, stored) in self.tokens.load_all::<StoredToken>().map_err(EmberError::from)? {
            if hashes_equal(&stored.token_hash, &candidate_hash) {
                let key = stored.username.to_lowercase();
                if self.users.get::<UserRecord>(&key).map_err(EmberError::from)?.is_some() {
                    return Ok(Some(stored.username));
                }
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// The username that owns `id`, or `None` if no such token exists.
    /// Used by callers that need to check ownership before revoking.
    pub fn token_owner(&self, id: TokenId) -> Result<Option<String>, EmberError> {
        Ok(self.tokens.get::<StoredToken>(&id.to_string()).map_err(EmberError::from)?.map(|t| t.username))
    }

    pub fn list_tokens(&self, username: &str) -> Result<Vec<StoredToken>, EmberError> {
        let key = username.to_lowercase();
        Ok(self
            .tokens
            .load_all::<StoredToken>()
            .map_err(EmberError::from)?
            .into_iter()
            .map(|(_, t)| t)
            .filter(|t| t.username.to_lowercase() == key)
            .collect())
    }

    pub fn remove_token(&self, id: TokenId) -> Result<(), EmberError> {
        let owner = self.token_owner(id)?;
        if !self.tokens.remove(&id.to_string()).map_err(EmberError::from)? {
            return Err(EmberError::NotFound(id.to_string()));
        }
        if let Some(username) = &owner {
            self.audit.record(AuditEvent::TokenRevoked { username });
        }
        Ok(())
    }

    /// Every registered user, for the `emberd user list` CLI subcommand —
    /// there is no RPC-surfaced equivalent, since no spec.md method lists
    /// other users' accounts.
    pub fn list_users(&self) -> Result<Vec<UserRecord>, EmberError> {
        Ok(self.users.load_all::<UserRecord>().map_err(EmberError::from)?.into_iter().map(|(_, record)| record).collect())
    }

    /// Remove a user and, per spec.md §3, revoke every token it owns.
    pub fn remove_user(&self, username: &str) -> Result<(), EmberError> {
        let key = username.to_lowercase();
        if !self.users.remove(&key).map_err(EmberError::from)? {
            return Err(EmberError::InvalidUserId);
        }
        for stored in self.list_tokens(username)? {
            let _ = self.tokens.remove(&stored.id.to_string());
        }
        self.audit.record(AuditEvent::UserRemoved { username });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_storage::RedbStore;

    fn store() -> UserStore {
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(RedbStore::open(":memory:").unwrap());
        UserStore::new(backend)
    }

    #[test]
    fn create_user_then_authenticate_succeeds() {
        let store = store();
        store.create_user("alice@example.com", "Abcdef1!").unwrap();
        let (_, token) = store.authenticate("alice@example.com", "Abcdef1!", "phone").unwrap();
        assert!(!token.is_empty());
    }

    #[test]
    fn username_lookup_is_case_insensitive() {
        let store = store();
        store.create_user("Alice@Example.com", "Abcdef1!").unwrap();
        assert!(store.authenticate("alice@example.com", "Abcdef1!", "phone").is_ok());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let store = store();
        store.create_user("alice@example.com", "Abcdef1!").unwrap();
        assert!(matches!(store.authenticate("alice@example.com", "wrong", "phone"), Err(EmberError::BadPassword)));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let store = store();
        store.create_user("alice@example.com", "Abcdef1!").unwrap();
        assert!(matches!(store.create_user("alice@example.com", "Abcdef1!"), Err(EmberError::DuplicateId(_))));
    }

    #[test]
    fn invalid_username_is_rejected() {
        let store = store();
        assert!(matches!(store.create_user("not-an-email", "Abcdef1!"), Err(EmberError::InvalidParameter(_))));
    }

    #[test]
    fn weak_password_is_rejected() {
        let store = store();
        assert!(matches!(store.create_user("alice@example.com", "weak"), Err(EmberError::InvalidParameter(_))));
    }

    #[test]
    fn verify_token_succeeds_for_issued_token_and_fails_after_revoke() {
        let store = store();
        store.create_user("alice@example.com", "Abcdef1!").unwrap();
        let (id, token) = store.authenticate("alice@example.com", "Abcdef1!", "phone").unwrap();
        assert_eq!(store.verify_token(&token).unwrap(), Some("alice@example.com".to_string()));

        store.remove_token(id).unwrap();
        assert_eq!(store.verify_token(&token).unwrap(), None);
    }

    #[test]
    fn removing_user_revokes_all_their_tokens() {
        let store = store();
        store.create_user("alice@example.com", "Abcdef1!").unwrap();
        let (_, token_a) = store.authenticate("alice@example.com", "Abcdef1!", "phone").unwrap();
        let (_, token_b) = store.authenticate("alice@example.com", "Abcdef1!", "laptop").unwrap();

        store.remove_user("alice@example.com").unwrap();

        assert_eq!(store.verify_token(&token_a).unwrap(), None);
        assert_eq!(store.verify_token(&token_b).unwrap(), None);
    }

    #[test]
    fn has_any_user_reflects_creation() {
        let store = store();
        assert!(!store.has_any_user().unwrap());
        store.create_user("alice@example.com", "Abcdef1!").unwrap();
        assert!(store.has_any_user().unwrap());
    }
}
