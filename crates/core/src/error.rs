use thiserror::Error;

/// Error taxonomy shared by every tool and handler. The HTTP-style status
/// lives here so boundaries map errors uniformly.
#[derive(Debug, Error)]
pub enum RentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RentError {
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            // Upstream failures are recovered where possible; when they do
            // surface, the caller sees an internal failure, not a stack.
            Self::Upstream(_) | Self::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}
