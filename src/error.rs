//! Error types for claimgate operations

use crate::auth::DenialReason;

/// Crate-wide error type
///
/// Claim extraction and policy evaluation never produce errors; this type covers
/// configuration loading and the client side of the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum ClaimgateError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server enforcement point refused the request
    #[error("Request rejected: {0}")]
    Rejected(DenialReason),

    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(u16),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ClaimgateError>;

impl ClaimgateError {
    /// Denial reason when the server rejected the request, `None` otherwise
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            ClaimgateError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let err = ClaimgateError::Rejected(DenialReason::Forbidden);
        assert_eq!(err.to_string(), "Request rejected: forbidden");
        assert_eq!(err.denial(), Some(DenialReason::Forbidden));
    }

    #[test]
    fn test_config_error_has_no_denial() {
        let err = ClaimgateError::Config("missing client_id".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing client_id");
        assert!(err.denial().is_none());
    }
}
