//! Fixed policy table and its evaluator
//!
//! | Policy | Allowed when |
//! |---|---|
//! | `read` | realm `admin`, application `read` role or application `write` role |
//! | `write` | realm `admin` or application `write` role |
//! | `is-admin` | realm `admin` |
//! | `has-any-role:<a>,<b>` | any listed role in either namespace |
//!
//! Policies are parsed once from configuration. Request data never names a
//! policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::roles::RoleProfile;

const HAS_ANY_ROLE_PREFIX: &str = "has-any-role:";

/// A named predicate over a [`RoleProfile`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Policy {
    Read,
    Write,
    IsAdmin,
    HasAnyRole(Vec<String>),
}

/// Policy name that is not in the fixed table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown policy '{0}' (expected read, write, is-admin or has-any-role:<role>,...)")]
pub struct UnknownPolicy(pub String);

impl FromStr for Policy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "read" => Ok(Policy::Read),
            "write" => Ok(Policy::Write),
            "is-admin" => Ok(Policy::IsAdmin),
            other => {
                let roles: Vec<String> = other
                    .strip_prefix(HAS_ANY_ROLE_PREFIX)
                    .ok_or_else(|| UnknownPolicy(s.to_string()))?
                    .split(',')
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(str::to_string)
                    .collect();
                if roles.is_empty() {
                    return Err(UnknownPolicy(s.to_string()));
                }
                Ok(Policy::HasAnyRole(roles))
            }
        }
    }
}

impl TryFrom<String> for Policy {
    type Error = UnknownPolicy;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Policy> for String {
    fn from(policy: Policy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Read => f.write_str("read"),
            Policy::Write => f.write_str("write"),
            Policy::IsAdmin => f.write_str("is-admin"),
            Policy::HasAnyRole(roles) => write!(f, "{}{}", HAS_ANY_ROLE_PREFIX, roles.join(",")),
        }
    }
}

/// Role names the fixed policies refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleNames {
    /// Realm role granting everything
    pub admin: String,
    /// Application role granting read access
    pub read: String,
    /// Application role granting write access (and therefore read)
    pub write: String,
}

impl Default for RoleNames {
    fn default() -> Self {
        Self {
            admin: "admin".to_string(),
            read: "protected-data-read".to_string(),
            write: "protected-data-write".to_string(),
        }
    }
}

/// Evaluates policies against role profiles
///
/// Pure: no I/O, no caching. The same evaluator backs the server enforcement
/// point and the client-side affordances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyEvaluator {
    roles: RoleNames,
}

impl PolicyEvaluator {
    pub fn new(roles: RoleNames) -> Self {
        Self { roles }
    }

    pub fn role_names(&self) -> &RoleNames {
        &self.roles
    }

    pub fn evaluate(&self, policy: &Policy, profile: &RoleProfile) -> bool {
        match policy {
            Policy::Read => self.can_read(profile),
            Policy::Write => self.can_write(profile),
            Policy::IsAdmin => self.is_admin(profile),
            Policy::HasAnyRole(roles) => profile.has_any_role(roles),
        }
    }

    pub fn is_admin(&self, profile: &RoleProfile) -> bool {
        profile.has_realm_role(&self.roles.admin)
    }

    pub fn can_read(&self, profile: &RoleProfile) -> bool {
        self.is_admin(profile)
            || profile.has_application_role(&self.roles.read)
            || profile.has_application_role(&self.roles.write)
    }

    pub fn can_write(&self, profile: &RoleProfile) -> bool {
        self.is_admin(profile) || profile.has_application_role(&self.roles.write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::derive;
    use proptest::prelude::*;
    use serde_json::json;

    fn evaluator() -> PolicyEvaluator {
        PolicyEvaluator::default()
    }

    fn realm(roles: &[&str]) -> RoleProfile {
        RoleProfile::new(roles.iter().copied(), Vec::<String>::new())
    }

    fn app(roles: &[&str]) -> RoleProfile {
        RoleProfile::new(Vec::<String>::new(), roles.iter().copied())
    }

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("read".parse::<Policy>().unwrap(), Policy::Read);
        assert_eq!("write".parse::<Policy>().unwrap(), Policy::Write);
        assert_eq!(" is-admin ".parse::<Policy>().unwrap(), Policy::IsAdmin);
        assert_eq!(
            "has-any-role:admin, customer".parse::<Policy>().unwrap(),
            Policy::HasAnyRole(vec!["admin".to_string(), "customer".to_string()])
        );
    }

    #[test]
    fn test_parse_unknown_policy() {
        let err = "delete".parse::<Policy>().unwrap_err();
        assert_eq!(err, UnknownPolicy("delete".to_string()));
        assert!(err.to_string().contains("unknown policy 'delete'"));
        assert!("has-any-role:".parse::<Policy>().is_err());
        assert!("has-any-role: , ".parse::<Policy>().is_err());
        assert!("Read".parse::<Policy>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for name in ["read", "write", "is-admin", "has-any-role:a,b"] {
            assert_eq!(name.parse::<Policy>().unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_read_policy() {
        let e = evaluator();
        assert!(e.evaluate(&Policy::Read, &realm(&["admin"])));
        assert!(e.evaluate(&Policy::Read, &app(&["protected-data-read"])));
        assert!(e.evaluate(&Policy::Read, &app(&["protected-data-write"])));
        assert!(!e.evaluate(&Policy::Read, &realm(&["customer"])));
    }

    #[test]
    fn test_write_policy() {
        let e = evaluator();
        assert!(e.evaluate(&Policy::Write, &realm(&["admin"])));
        assert!(e.evaluate(&Policy::Write, &app(&["protected-data-write"])));
        assert!(!e.evaluate(&Policy::Write, &app(&["protected-data-read"])));
    }

    #[test]
    fn test_roles_checked_in_their_own_namespace() {
        let e = evaluator();
        // Application role named like the admin realm role is not admin.
        let app_admin = app(&["admin"]);
        assert!(!e.evaluate(&Policy::IsAdmin, &app_admin));
        assert!(!e.evaluate(&Policy::Write, &app_admin));

        // Realm role named like an application role grants nothing.
        let realm_read = realm(&["protected-data-read"]);
        assert!(!e.evaluate(&Policy::Read, &realm_read));
    }

    #[test]
    fn test_has_any_role_searches_both_namespaces() {
        let e = evaluator();
        let policy: Policy = "has-any-role:customer,protected-data-read".parse().unwrap();
        assert!(e.evaluate(&policy, &realm(&["customer"])));
        assert!(e.evaluate(&policy, &app(&["protected-data-read"])));
        assert!(!e.evaluate(&policy, &realm(&["admin"])));
    }

    #[test]
    fn test_custom_role_names() {
        let e = PolicyEvaluator::new(RoleNames {
            admin: "superuser".to_string(),
            read: "viewer".to_string(),
            write: "editor".to_string(),
        });
        assert!(e.evaluate(&Policy::Write, &realm(&["superuser"])));
        assert!(e.evaluate(&Policy::Read, &app(&["editor"])));
        assert!(!e.evaluate(&Policy::Read, &realm(&["admin"])));
    }

    #[test]
    fn test_scenario_admin_from_nested_claims() {
        let profile = derive(&json!({ "realm_access": { "roles": ["admin"] } }), "app1");
        assert_eq!(profile, realm(&["admin"]));
        assert!(evaluator().evaluate(&Policy::Write, &profile));
    }

    #[test]
    fn test_scenario_reader_from_groups() {
        let profile = derive(
            &json!({ "groups": ["role:customer", "role:app1:protected-data-read"] }),
            "app1",
        );
        assert_eq!(profile, RoleProfile::new(["customer"], ["protected-data-read"]));
        assert!(evaluator().evaluate(&Policy::Read, &profile));
        assert!(!evaluator().evaluate(&Policy::Write, &profile));
    }

    #[test]
    fn test_scenario_other_audience() {
        let profile = derive(&json!({ "groups": ["role:app2:protected-data-write"] }), "app1");
        assert!(profile.is_empty());
        assert!(!evaluator().evaluate(&Policy::Read, &profile));
    }

    #[test]
    fn test_scenario_empty_claims() {
        let profile = derive(&json!({}), "app1");
        assert!(profile.is_empty());
        let e = evaluator();
        for policy in [
            Policy::Read,
            Policy::Write,
            Policy::IsAdmin,
            Policy::HasAnyRole(vec!["admin".to_string(), "customer".to_string()]),
        ] {
            assert!(!e.evaluate(&policy, &profile), "{policy} should deny");
        }
    }

    fn role_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("admin".to_string()),
            Just("customer".to_string()),
            Just("protected-data-read".to_string()),
            Just("protected-data-write".to_string()),
            "[a-z]{1,8}",
        ]
    }

    fn any_profile() -> impl Strategy<Value = RoleProfile> {
        (
            prop::collection::vec(role_name(), 0..5),
            prop::collection::vec(role_name(), 0..5),
        )
            .prop_map(|(realm, application)| RoleProfile::new(realm, application))
    }

    proptest! {
        #[test]
        fn prop_write_implies_read(profile in any_profile()) {
            let e = evaluator();
            if e.evaluate(&Policy::Write, &profile) {
                prop_assert!(e.evaluate(&Policy::Read, &profile));
            }
        }

        #[test]
        fn prop_admin_is_allowed_everything(
            realm in prop::collection::vec(role_name(), 0..5),
            application in prop::collection::vec(role_name(), 0..5),
        ) {
            let mut realm = realm;
            realm.push("admin".to_string());
            let profile = RoleProfile::new(realm, application);
            let e = evaluator();
            prop_assert!(e.evaluate(&Policy::Read, &profile));
            prop_assert!(e.evaluate(&Policy::Write, &profile));
            prop_assert!(e.evaluate(&Policy::IsAdmin, &profile));
        }
    }
}
