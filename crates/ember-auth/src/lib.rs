//! Authentication & Session Core: username/password users, opaque bearer
//! tokens, and the push-button out-of-band pairing flow.

pub mod audit;
pub mod credentials;
pub mod hash;
pub mod pushbutton;
pub mod token;
pub mod user_store;

pub use audit::{AuditEvent, AuditSink, NoOpAuditSink, TracingAuditSink};
pub use credentials::{validate_password, validate_username};
pub use hash::{generate_salt, hash_unsalted, hash_with_salt, hashes_equal};
pub use pushbutton::{PushButtonAuth, PushButtonOutcome};
pub use token::{generate_token, StoredToken};
pub use user_store::{UserRecord, UserStore};
