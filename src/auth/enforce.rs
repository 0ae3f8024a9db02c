//! Server-side enforcement decision
//!
//! Per request: no identity is `Unauthenticated`; identity whose freshly derived
//! profile fails the route's policy is `Forbidden`; otherwise the request is
//! allowed and the profile is handed on.

use super::claims::IdentityClaims;
use super::error::AuthorizationError;
use super::policy::{Policy, PolicyEvaluator};
use crate::roles::{RoleExtractor, RoleProfile};

/// Authoritative enforcement point: extractor plus evaluator
#[derive(Debug, Clone)]
pub struct Enforcer {
    extractor: RoleExtractor,
    evaluator: PolicyEvaluator,
}

impl Enforcer {
    pub fn new(extractor: RoleExtractor, evaluator: PolicyEvaluator) -> Self {
        Self {
            extractor,
            evaluator,
        }
    }

    pub fn extractor(&self) -> &RoleExtractor {
        &self.extractor
    }

    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    /// Require an identity, without any policy
    pub fn authenticate(
        &self,
        identity: Option<&IdentityClaims>,
    ) -> Result<RoleProfile, AuthorizationError> {
        let claims = identity.ok_or(AuthorizationError::Unauthenticated)?;
        Ok(claims.role_profile(&self.extractor))
    }

    /// Require an identity whose roles satisfy `policy`
    pub fn enforce(
        &self,
        identity: Option<&IdentityClaims>,
        policy: &Policy,
    ) -> Result<RoleProfile, AuthorizationError> {
        let profile = self.authenticate(identity)?;
        if self.evaluator.evaluate(policy, &profile) {
            Ok(profile)
        } else {
            Err(AuthorizationError::Forbidden {
                policy: policy.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enforcer() -> Enforcer {
        Enforcer::new(RoleExtractor::new("app1"), PolicyEvaluator::default())
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        let result = enforcer().enforce(None, &Policy::Read);
        assert_eq!(result, Err(AuthorizationError::Unauthenticated));
    }

    #[test]
    fn test_identity_without_roles_is_forbidden() {
        let claims = IdentityClaims::from_value(json!({ "sub": "user123" }));
        let result = enforcer().enforce(Some(&claims), &Policy::Read);
        assert_eq!(
            result,
            Err(AuthorizationError::Forbidden {
                policy: Policy::Read
            })
        );
    }

    #[test]
    fn test_reader_allowed_to_read_not_write() {
        let claims = IdentityClaims::from_value(json!({
            "groups": ["role:customer", "role:app1:protected-data-read"]
        }));
        let profile = enforcer().enforce(Some(&claims), &Policy::Read).unwrap();
        assert_eq!(profile.application_roles(), ["protected-data-read"]);

        let denied = enforcer().enforce(Some(&claims), &Policy::Write).unwrap_err();
        assert_eq!(denied.reason(), crate::auth::DenialReason::Forbidden);
    }

    #[test]
    fn test_admin_allowed_to_write() {
        let claims = IdentityClaims::from_value(json!({ "realm_access": { "roles": ["admin"] } }));
        assert!(enforcer().enforce(Some(&claims), &Policy::Write).is_ok());
    }

    #[test]
    fn test_authenticate_without_policy() {
        let claims = IdentityClaims::from_value(json!({ "sub": "user123" }));
        let profile = enforcer().authenticate(Some(&claims)).unwrap();
        assert!(profile.is_empty());
        assert_eq!(
            enforcer().authenticate(None),
            Err(AuthorizationError::Unauthenticated)
        );
    }
}
