//! Push-button out-of-band pairing: a physical button press stands in for
//! a password, authorizing a new token for a client that already knows
//! which account it wants to pair under (the "owner" account — policy for
//! *which* username that is belongs to the RPC layer, not here).
//!
//! One transaction outstanding at a time, per spec.md §4.G. A second
//! `request` while one is already `Pending` does not queue — it fails the
//! first transaction outright and starts a new one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ember_types::{EmberError, PairingTransactionId, TokenId};
use parking_lot::Mutex;

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::user_store::UserStore;

#[derive(Debug, Clone)]
enum State {
    Idle,
    Pending { transaction_id: PairingTransactionId, device_name: String, requester_client_id: String, started_at: DateTime<Utc> },
}

/// What happened to a transaction — handed back to the RPC layer so it can
/// be turned into a `PushButtonAuthFinished` notification. Delivered only
/// to `requester_client_id`, bypassing that client's notification-enable
/// flag (spec.md §4.G).
#[derive(Debug, Clone)]
pub struct PushButtonOutcome {
    pub transaction_id: PairingTransactionId,
    pub requester_client_id: String,
    pub success: bool,
    pub token: Option<(TokenId, String)>,
}

fn failure(transaction_id: PairingTransactionId, requester_client_id: String) -> PushButtonOutcome {
    PushButtonOutcome { transaction_id, requester_client_id, success: false, token: None }
}

pub struct PushButtonAuth {
    state: Mutex<State>,
    audit: Arc<dyn AuditSink>,
}

impl Default for PushButtonAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl PushButtonAuth {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::Idle), audit: Arc::new(TracingAuditSink) }
    }

    /// Swap in a different [`AuditSink`] — tests use [`crate::NoOpAuditSink`].
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Start a new transaction. If one was already `Pending`, it is
    /// preempted — the return value's first element is the new
    /// transaction's id; the second, if present, is the failure outcome
    /// for the preempted transaction.
    pub fn request(&self, device_name: &str, requester_client_id: &str) -> (PairingTransactionId, Option<PushButtonOutcome>) {
        let mut state = self.state.lock();
        let preempted = match &*state {
            State::Pending { transaction_id, requester_client_id: prev_requester, .. } => {
                Some(failure(*transaction_id, prev_requester.clone()))
            }
            State::Idle => None,
        };
        if preempted.is_some() {
            self.audit.record(AuditEvent::PushButtonDenied);
        }

        let transaction_id = PairingTransactionId::new();
        *state = State::Pending {
            transaction_id,
            device_name: device_name.to_string(),
            requester_client_id: requester_client_id.to_string(),
            started_at: Utc::now(),
        };
        self.audit.record(AuditEvent::PushButtonRequested { device_name, requester_client_id });
        (transaction_id, preempted)
    }

    /// The physical button was pressed. Mints and persists a token for
    /// `username` under the pending transaction's device name, returns
    /// `Idle`.
    pub fn press(&self, user_store: &UserStore, username: &str) -> Result<PushButtonOutcome, EmberError> {
        let mut state = self.state.lock();
        let State::Pending { transaction_id, device_name, requester_client_id, .. } = state.clone() else {
            return Err(EmberError::InvalidParameter("no push-button transaction is pending".into()));
        };

        let (token_id, plaintext) = user_store.issue_token(username, &device_name)?;
        *state = State::Idle;
        self.audit.record(AuditEvent::PushButtonGranted { username, device_name: &device_name });
        Ok(PushButtonOutcome {
            transaction_id,
            requester_client_id,
            success: true,
            token: Some((token_id, plaintext)),
        })
    }

    /// Cancel the pending transaction — invoked either by an explicit
    /// `cancel` call or by the requesting client disconnecting.
    pub fn cancel(&self, transaction_id: PairingTransactionId) -> Option<PushButtonOutcome> {
        let mut state = self.state.lock();
        match &*state {
            State::Pending { transaction_id: pending_id, requester_client_id, .. } if *pending_id == transaction_id => {
                let outcome = failure(*pending_id, requester_client_id.clone());
                *state = State::Idle;
                self.audit.record(AuditEvent::PushButtonDenied);
                Some(outcome)
            }
            _ => None,
        }
    }

    /// Cancel whatever transaction is currently pending, regardless of its
    /// id — used when the requesting client disconnects and the caller
    /// doesn't otherwise track the transaction id.
    pub fn cancel_pending(&self) -> Option<PushButtonOutcome> {
        let mut state = self.state.lock();
        match &*state {
            State::Pending { transaction_id, requester_client_id, .. } => {
                let outcome = failure(*transaction_id, requester_client_id.clone());
                *state = State::Idle;
                self.audit.record(AuditEvent::PushButtonDenied);
                Some(outcome)
            }
            State::Idle => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), State::Pending { .. })
    }

    /// The client that should receive this transaction's eventual
    /// notification, if one is pending.
    pub fn pending_requester(&self) -> Option<String> {
        match &*self.state.lock() {
            State::Pending { requester_client_id, .. } => Some(requester_client_id.clone()),
            State::Idle => None,
        }
    }
}
