//! The error taxonomy shared by every crate in the workspace.
//!
//! Clients branch on the variant name, never on the `Display` text — the
//! text is diagnostic only. The RPC layer (`ember-rpc`) maps every variant
//! to either `status:"error"` or `status:"unauthorized"`; nothing here
//! leaks internal detail (file paths, redb errors, etc.) across that
//! boundary.

use thiserror::Error;

/// The single error enum threaded through rule validation, the RPC core,
/// and authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmberError {
    #[error("no error")]
    NoError,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid rule format: {0}")]
    InvalidRuleFormat(String),

    #[error("invalid state evaluator: {0}")]
    InvalidStateEvaluatorValue(String),

    #[error("invalid time descriptor: {0}")]
    InvalidTimeDescriptor(String),

    #[error("invalid time event item: {0}")]
    InvalidTimeEventItem(String),

    #[error("invalid calendar item: {0}")]
    InvalidCalendarItem(String),

    #[error("invalid repeating option: {0}")]
    InvalidRepeatingOption(String),

    #[error("types not matching: {0}")]
    TypesNotMatching(String),

    #[error("rule is not executable")]
    NotExecutable,

    #[error("rule has no exit actions")]
    NoExitActions,

    #[error("action set contains an event-based action")]
    ContainsEventBasedAction,

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("bad password")]
    BadPassword,

    #[error("invalid user id")]
    InvalidUserId,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("permission denied")]
    PermissionDenied,
}

impl EmberError {
    /// The bare variant name, exactly as it travels in the `error` field
    /// of a JSON-RPC error/unauthorized reply.
    pub fn variant_name(&self) -> &'static str {
        match self {
            EmberError::NoError => "NoError",
            EmberError::InvalidParameter(_) => "InvalidParameter",
            EmberError::MissingParameter(_) => "MissingParameter",
            EmberError::DuplicateId(_) => "DuplicateId",
            EmberError::NotFound(_) => "NotFound",
            EmberError::InvalidRuleFormat(_) => "InvalidRuleFormat",
            EmberError::InvalidStateEvaluatorValue(_) => "InvalidStateEvaluatorValue",
            EmberError::InvalidTimeDescriptor(_) => "InvalidTimeDescriptor",
            EmberError::InvalidTimeEventItem(_) => "InvalidTimeEventItem",
            EmberError::InvalidCalendarItem(_) => "InvalidCalendarItem",
            EmberError::InvalidRepeatingOption(_) => "InvalidRepeatingOption",
            EmberError::TypesNotMatching(_) => "TypesNotMatching",
            EmberError::NotExecutable => "NotExecutable",
            EmberError::NoExitActions => "NoExitActions",
            EmberError::ContainsEventBasedAction => "ContainsEventBasedAction",
            EmberError::BackendError(_) => "BackendError",
            EmberError::BadPassword => "BadPassword",
            EmberError::InvalidUserId => "InvalidUserId",
            EmberError::Unauthorized(_) => "Unauthorized",
            EmberError::PermissionDenied => "PermissionDenied",
        }
    }

    /// True for the two auth-specific variants the RPC core maps to
    /// `status:"unauthorized"` instead of `status:"error"`.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, EmberError::Unauthorized(_) | EmberError::PermissionDenied)
    }
}

pub type Result<T> = std::result::Result<T, EmberError>;
