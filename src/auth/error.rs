use std::fmt;

use serde::{Deserialize, Serialize};

use super::policy::Policy;

/// Why an enforcement point refused an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// No validated identity was presented
    Unauthenticated,
    /// Identity present, required policy not satisfied
    Forbidden,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Unauthenticated => f.write_str("unauthenticated"),
            DenialReason::Forbidden => f.write_str("forbidden"),
        }
    }
}

/// Enforcement failures at the server boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// No identity assertion reached the enforcement point
    #[error("Authentication required")]
    Unauthenticated,

    /// The identity's roles do not satisfy the route's policy
    #[error("Access denied: policy '{policy}' not satisfied")]
    Forbidden { policy: Policy },
}

impl AuthorizationError {
    pub fn reason(&self) -> DenialReason {
        match self {
            AuthorizationError::Unauthenticated => DenialReason::Unauthenticated,
            AuthorizationError::Forbidden { .. } => DenialReason::Forbidden,
        }
    }
}

/// JSON body of a rejection response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionBody {
    pub error: DenialReason,
    pub message: String,
}

impl From<&AuthorizationError> for RejectionBody {
    fn from(err: &AuthorizationError) -> Self {
        Self {
            error: err.reason(),
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "server")]
mod response {
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::Json;

    use super::{AuthorizationError, DenialReason, RejectionBody};

    impl DenialReason {
        pub fn status_code(&self) -> StatusCode {
            match self {
                DenialReason::Unauthenticated => StatusCode::UNAUTHORIZED,
                DenialReason::Forbidden => StatusCode::FORBIDDEN,
            }
        }
    }

    impl IntoResponse for AuthorizationError {
        fn into_response(self) -> Response {
            let status = self.reason().status_code();
            (status, Json(RejectionBody::from(&self))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_error() {
        let err = AuthorizationError::Unauthenticated;
        assert_eq!(err.to_string(), "Authentication required");
        assert_eq!(err.reason(), DenialReason::Unauthenticated);
    }

    #[test]
    fn test_forbidden_error() {
        let err = AuthorizationError::Forbidden {
            policy: Policy::Write,
        };
        assert_eq!(err.to_string(), "Access denied: policy 'write' not satisfied");
        assert_eq!(err.reason(), DenialReason::Forbidden);
    }

    #[test]
    fn test_reason_serialization() {
        assert_eq!(
            serde_json::to_value(DenialReason::Unauthenticated).unwrap(),
            serde_json::json!("unauthenticated")
        );
        let body = RejectionBody::from(&AuthorizationError::Forbidden {
            policy: Policy::Read,
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "error": "forbidden",
                "message": "Access denied: policy 'read' not satisfied"
            })
        );
    }

    #[cfg(feature = "server")]
    mod status {
        use super::*;
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        #[test]
        fn test_unauthorized_status() {
            let response = AuthorizationError::Unauthenticated.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        #[test]
        fn test_forbidden_status() {
            let response = AuthorizationError::Forbidden {
                policy: Policy::Write,
            }
            .into_response();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }
}
