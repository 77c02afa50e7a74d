//! A handler either answers synchronously or hands back a deferred
//! reply the core waits on with a timeout — grounded in the teacher's
//! `neomind-commands::ack` pending-with-timeout pattern, generalized from
//! device-command acknowledgment to generic RPC completion. Unlike that
//! module's shared sweep loop over a `HashMap` of pending acks, each
//! deferred reply here is independent, so the core simply wraps the
//! individual `await` in `tokio::time::timeout` rather than polling a
//! table on an interval — same 30s deadline, fewer moving parts.

use std::time::Duration;

use ember_types::{EmberError, Result};
use serde_json::Value as Json;
use tokio::sync::oneshot;

pub const ASYNC_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

pub enum RpcOutcome {
    Ready(Result<Json>),
    Deferred(AsyncReply),
}

impl RpcOutcome {
    pub fn ok(params: Json) -> Self {
        RpcOutcome::Ready(Ok(params))
    }

    pub fn err(e: EmberError) -> Self {
        RpcOutcome::Ready(Err(e))
    }
}

/// What became of a deferred reply once the core stopped waiting on it.
/// `TimedOut` is kept distinct from `Business(EmberError)` because the
/// wire text it produces — the literal string `"Command timed out"` — is
/// not one of `EmberError`'s variant names (spec.md §4.H calls it out as
/// its own case, not a taxonomy member).
pub enum ReplyOutcome {
    Success(Json),
    Business(EmberError),
    TimedOut,
}

/// The receiving half of a deferred reply. The handler keeps the paired
/// `oneshot::Sender` and completes it whenever its asynchronous work
/// finishes (or never, if it crashes — the core's timeout covers that).
pub struct AsyncReply {
    pub receiver: oneshot::Receiver<Result<Json>>,
}

impl AsyncReply {
    /// Create a deferred reply pair; the sender half is handed to whatever
    /// task will eventually complete the call.
    pub fn pending() -> (oneshot::Sender<Result<Json>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, AsyncReply { receiver: rx })
    }

    /// Wait for completion, applying the standard async-reply deadline.
    pub async fn resolve(self) -> ReplyOutcome {
        match tokio::time::timeout(ASYNC_REPLY_TIMEOUT, self.receiver).await {
            Ok(Ok(Ok(result))) => ReplyOutcome::Success(result),
            Ok(Ok(Err(e))) => ReplyOutcome::Business(e),
            Ok(Err(_)) => ReplyOutcome::Business(EmberError::BackendError("async reply sender dropped".into())),
            Err(_) => ReplyOutcome::TimedOut,
        }
    }
}
