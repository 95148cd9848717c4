use crate::parser::ParseError;

/// Everything that can go wrong in this crate.
///
/// Parse failures keep their own type so callers can match on the exact
/// reason; everything else is wrapped here. Errors are always returned to
/// the caller, never logged or swallowed by the core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Structurally fine but semantically invalid input, like
    /// `iterations == 0`. Nothing is evaluated when this is returned.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The requested evaluation would exceed the draw budget or overflow
    /// totals.
    #[error("evaluation too large: {0}")]
    ResourceLimit(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}
