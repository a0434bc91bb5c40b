use thiserror::Error;

/// Engine error taxonomy.
///
/// Every failure crossing the dispatcher boundary is flattened into the
/// `{ok: false, errorKind, message}` wire shape; nothing is thrown past it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or missing payload field. Recoverable client-side.
    #[error("{0}")]
    Validation(String),

    /// The caller is not entitled to act on this entity. Never retried.
    #[error("{0}")]
    Authorization(String),

    /// The referenced task, invitation or employee is absent.
    #[error("{0}")]
    NotFound(String),

    /// A state-machine guard failed because of a race or stale state.
    /// Callers should re-fetch status rather than blindly retry: on a
    /// mutating action this can mean "possibly already applied".
    #[error("{0}")]
    Conflict(String),

    /// The persistence or delivery collaborator failed. Surfaced for the
    /// caller's own retry policy; the engine performs no automatic retries.
    #[error("{0}")]
    Upstream(String),
}

impl EngineError {
    /// Wire-level kind for the `errorKind` response field.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "ValidationError",
            EngineError::Authorization(_) => "AuthorizationError",
            EngineError::NotFound(_) => "NotFoundError",
            EngineError::Conflict(_) => "ConflictError",
            EngineError::Upstream(_) => "UpstreamError",
        }
    }
}

/// HTTP status the API layer maps an `errorKind` onto.
pub fn http_status_for_kind(kind: &str) -> u16 {
    match kind {
        "ValidationError" => 400,
        "AuthorizationError" => 403,
        "NotFoundError" => 404,
        "ConflictError" => 409,
        _ => 502,
    }
}
