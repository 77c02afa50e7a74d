//! Security-relevant events — `authenticate`, push-button transactions,
//! token revocation — recorded independently of whatever JSON-RPC
//! notification bus a caller wires up. Grounded in `neomind-api::audit`'s
//! `AuditLog` abstraction, trimmed to the events this crate actually
//! produces (no HTTP method/path/status fields — there is no HTTP layer
//! here) and made synchronous, since every `UserStore`/`PushButtonAuth`
//! method already is.

use chrono::Utc;

/// A security-relevant event, as it happened — never includes the
/// password or token itself, only identifying metadata.
#[derive(Debug, Clone)]
pub enum AuditEvent<'a> {
    AuthenticationSucceeded { username: &'a str, device_name: &'a str },
    AuthenticationFailed { username: &'a str },
    PushButtonRequested { device_name: &'a str, requester_client_id: &'a str },
    PushButtonGranted { username: &'a str, device_name: &'a str },
    PushButtonDenied,
    TokenRevoked { username: &'a str },
    UserRemoved { username: &'a str },
}

impl AuditEvent<'_> {
    fn action(&self) -> &'static str {
        match self {
            Self::AuthenticationSucceeded { .. } => "authentication succeeded",
            Self::AuthenticationFailed { .. } => "authentication failed",
            Self::PushButtonRequested { .. } => "push-button transaction requested",
            Self::PushButtonGranted { .. } => "push-button transaction granted",
            Self::PushButtonDenied => "push-button transaction denied or preempted",
            Self::TokenRevoked { .. } => "token revoked",
            Self::UserRemoved { .. } => "user removed",
        }
    }
}

/// Where audit events go. A trait object rather than a concrete logger so
/// tests can swap in [`NoOpAuditSink`] without pulling `tracing`'s
/// subscriber machinery into the test harness.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent<'_>);
}

/// Default sink: one structured `tracing` event per audit event, never the
/// password or token text.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent<'_>) {
        let action = event.action();
        let at = Utc::now();
        match event {
            AuditEvent::AuthenticationSucceeded { username, device_name } => {
                tracing::info!(username, device_name, %at, action, "audit event");
            }
            AuditEvent::AuthenticationFailed { username } => {
                tracing::warn!(username, %at, action, "audit event");
            }
            AuditEvent::PushButtonRequested { device_name, requester_client_id } => {
                tracing::info!(device_name, requester_client_id, %at, action, "audit event");
            }
            AuditEvent::PushButtonGranted { username, device_name } => {
                tracing::info!(username, device_name, %at, action, "audit event");
            }
            AuditEvent::PushButtonDenied => {
                tracing::warn!(%at, action, "audit event");
            }
            AuditEvent::TokenRevoked { username } => {
                tracing::info!(username, %at, action, "audit event");
            }
            AuditEvent::UserRemoved { username } => {
                tracing::warn!(username, %at, action, "audit event");
            }
        }
    }
}

/// Discards every event — for tests that don't want to assert on logging.
pub struct NoOpAuditSink;

impl AuditSink for NoOpAuditSink {
    fn record(&self, _event: AuditEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_sink_does_not_panic_on_every_variant() {
        let sink = TracingAuditSink;
        sink.record(AuditEvent::AuthenticationSucceeded { username: "alice@example.com", device_name: "phone" });
        sink.record(AuditEvent::AuthenticationFailed { username: "alice@example.com" });
        sink.record(AuditEvent::PushButtonRequested { device_name: "kitchen-panel", requester_client_id: "client-1" });
        sink.record(AuditEvent::PushButtonGranted { username: "alice@example.com", device_name: "kitchen-panel" });
        sink.record(AuditEvent::PushButtonDenied);
        sink.record(AuditEvent::TokenRevoked { username: "alice@example.com" });
        sink.record(AuditEvent::UserRemoved { username: "alice@example.com" });
    }

    #[test]
    fn noop_sink_discards_everything() {
        NoOpAuditSink.record(AuditEvent::PushButtonDenied);
    }
}
