//! Normalized role profile and its client-facing projection

use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::IdentityClaims;

/// Roles held by an identity, split into two namespaces
///
/// Realm roles are provider-wide (`admin`), application roles are scoped to the
/// configured audience (`protected-data-read`). Both sequences keep first-seen
/// order and never contain duplicates. There is no mutating API: deriving again
/// produces a new profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleProfile {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    realm_roles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    application_roles: Vec<String>,
}

impl RoleProfile {
    /// Build a profile, collapsing duplicates within each namespace
    pub fn new<R, A>(realm_roles: R, application_roles: A) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let mut builder = RoleProfileBuilder::default();
        for role in realm_roles {
            builder.add_realm(role.into());
        }
        for role in application_roles {
            builder.add_application(role.into());
        }
        builder.build()
    }

    pub fn realm_roles(&self) -> &[String] {
        &self.realm_roles
    }

    pub fn application_roles(&self) -> &[String] {
        &self.application_roles
    }

    pub fn is_empty(&self) -> bool {
        self.realm_roles.is_empty() && self.application_roles.is_empty()
    }

    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_roles.iter().any(|r| r == role)
    }

    pub fn has_application_role(&self, role: &str) -> bool {
        self.application_roles.iter().any(|r| r == role)
    }

    /// Bare-name lookup: realm namespace first, then application
    pub fn has_role(&self, role: &str) -> bool {
        self.has_realm_role(role) || self.has_application_role(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }
}

/// Deduplicating accumulator used while scanning claims
#[derive(Debug, Default)]
pub(crate) struct RoleProfileBuilder {
    realm_roles: Vec<String>,
    application_roles: Vec<String>,
}

impl RoleProfileBuilder {
    pub(crate) fn add_realm(&mut self, role: impl Into<String>) {
        push_unique(&mut self.realm_roles, role.into());
    }

    pub(crate) fn add_application(&mut self, role: impl Into<String>) {
        push_unique(&mut self.application_roles, role.into());
    }

    pub(crate) fn build(self) -> RoleProfile {
        RoleProfile {
            realm_roles: self.realm_roles,
            application_roles: self.application_roles,
        }
    }
}

fn push_unique(roles: &mut Vec<String>, role: String) {
    if !role.is_empty() && !roles.contains(&role) {
        roles.push(role);
    }
}

/// User profile as exposed to the client side
///
/// Serializes to `{"email": .., "preferredUsername": .., "realmRoles": [..],
/// "applicationRoles": [..], ...}` with empty role arrays omitted. Claims that
/// carried roles (`groups`, `realm_access`, `resource_access`) are not passed
/// through; everything else is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(flatten)]
    pub roles: RoleProfile,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claim keys consumed by role extraction and therefore not passed through
const ROLE_BEARING_CLAIMS: [&str; 5] = [
    "groups",
    "realm_access",
    "resource_access",
    "realmRoles",
    "applicationRoles",
];

impl UserProfile {
    pub fn from_claims(claims: &IdentityClaims, roles: RoleProfile) -> Self {
        let extra = claims
            .extra
            .iter()
            .filter(|(key, _)| !ROLE_BEARING_CLAIMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            sub: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            preferred_username: claims.preferred_username.clone(),
            roles,
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_deduplicates_per_namespace() {
        let profile = RoleProfile::new(
            ["admin", "customer", "admin"],
            ["protected-data-read", "protected-data-read"],
        );
        assert_eq!(profile.realm_roles(), ["admin", "customer"]);
        assert_eq!(profile.application_roles(), ["protected-data-read"]);
    }

    #[test]
    fn test_same_name_kept_in_both_namespaces() {
        let profile = RoleProfile::new(["shared"], ["shared"]);
        assert!(profile.has_realm_role("shared"));
        assert!(profile.has_application_role("shared"));
        assert_eq!(profile.realm_roles().len(), 1);
        assert_eq!(profile.application_roles().len(), 1);
    }

    #[test]
    fn test_empty_role_strings_dropped() {
        let profile = RoleProfile::new(["", "admin"], [""]);
        assert_eq!(profile.realm_roles(), ["admin"]);
        assert!(profile.application_roles().is_empty());
    }

    #[test]
    fn test_namespace_lookups() {
        let profile = RoleProfile::new(["admin"], ["protected-data-read"]);

        assert!(profile.has_realm_role("admin"));
        assert!(!profile.has_application_role("admin"));
        assert!(profile.has_application_role("protected-data-read"));
        assert!(!profile.has_realm_role("protected-data-read"));
        assert!(profile.has_role("admin"));
        assert!(profile.has_role("protected-data-read"));
        assert!(!profile.has_role("customer"));
    }

    #[test]
    fn test_has_any_role() {
        let profile = RoleProfile::new(["customer"], ["protected-data-read"]);
        assert!(profile.has_any_role(&["admin", "customer"]));
        assert!(profile.has_any_role(&["protected-data-read"]));
        assert!(!profile.has_any_role(&["admin", "protected-data-write"]));
        assert!(!profile.has_any_role::<&str>(&[]));
    }

    #[test]
    fn test_serialize_omits_empty_arrays() {
        let empty = serde_json::to_value(RoleProfile::default()).unwrap();
        assert_eq!(empty, json!({}));

        let profile = RoleProfile::new(["admin"], Vec::<String>::new());
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value, json!({ "realmRoles": ["admin"] }));
    }

    #[test]
    fn test_user_profile_passthrough() {
        let claims = IdentityClaims::from_value(json!({
            "sub": "u-1",
            "email": "alice@example.com",
            "preferred_username": "alice",
            "groups": ["role:admin"],
            "realm_access": { "roles": ["admin"] },
            "locale": "fr"
        }));
        let roles = RoleProfile::new(["admin"], Vec::<String>::new());
        let profile = UserProfile::from_claims(&claims, roles);

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            json!({
                "sub": "u-1",
                "email": "alice@example.com",
                "preferredUsername": "alice",
                "realmRoles": ["admin"],
                "locale": "fr"
            })
        );
    }
}
