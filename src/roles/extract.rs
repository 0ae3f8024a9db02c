//! Claim extraction: provider claim encodings to a [`RoleProfile`]
//!
//! Three shapes are recognised in a claims object:
//!
//! - Keycloak nested claims: `realm_access.roles` and
//!   `resource_access.<audience>.roles`
//! - oauth2-proxy flat groups: `role:<name>` and `role:<audience>:<name>`
//! - an already normalized profile: `realmRoles` and `applicationRoles`
//!
//! Extraction is total. Anything that does not match a known shape is skipped
//! and the scan continues.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::profile::{RoleProfile, RoleProfileBuilder};

const REALM_ROLES: &str = "realmRoles";
const APPLICATION_ROLES: &str = "applicationRoles";
const GROUPS: &str = "groups";
const REALM_ACCESS: &str = "realm_access";
const RESOURCE_ACCESS: &str = "resource_access";
const ROLES: &str = "roles";
const GROUP_ROLE_PREFIX: &str = "role:";

/// A role carried by an oauth2-proxy group string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole<'a> {
    /// `role:<name>`
    Realm(&'a str),
    /// `role:<client_id>:<name>`
    Application { client_id: &'a str, role: &'a str },
}

impl<'a> GroupRole<'a> {
    /// Parse a group string, `None` when it carries no role
    ///
    /// Everything after the client id belongs to the role name, so
    /// `role:app:a:b` is application role `a:b` for client `app`.
    pub fn parse(group: &'a str) -> Option<Self> {
        let rest = group.strip_prefix(GROUP_ROLE_PREFIX)?;
        match rest.split_once(':') {
            None if rest.is_empty() => None,
            None => Some(GroupRole::Realm(rest)),
            Some((client_id, role)) if !client_id.is_empty() && !role.is_empty() => {
                Some(GroupRole::Application { client_id, role })
            }
            Some(_) => None,
        }
    }
}

/// Derives role profiles for one configured audience
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleExtractor {
    audience: String,
}

impl RoleExtractor {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
        }
    }

    /// Client identifier whose application roles are honoured
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Derive from any JSON value; non-objects yield an empty profile
    pub fn derive_value(&self, claims: &Value) -> RoleProfile {
        match claims {
            Value::Object(map) => self.derive(map),
            other => {
                tracing::trace!(kind = json_kind(other), "claims bundle is not an object");
                RoleProfile::default()
            }
        }
    }

    /// Derive a profile from a claims object
    pub fn derive(&self, claims: &Map<String, Value>) -> RoleProfile {
        if let Some(profile) = normalized_profile(claims) {
            return profile;
        }

        let mut builder = RoleProfileBuilder::default();

        // Partially normalized input still contributes what it has.
        if let Some(roles) = claims.get(REALM_ROLES) {
            for role in lenient_strings(REALM_ROLES, roles) {
                builder.add_realm(role);
            }
        }
        if let Some(roles) = claims.get(APPLICATION_ROLES) {
            for role in lenient_strings(APPLICATION_ROLES, roles) {
                builder.add_application(role);
            }
        }

        if let Some(groups) = claims.get(GROUPS) {
            self.scan_groups(groups, &mut builder);
        }
        if let Some(realm_access) = claims.get(REALM_ACCESS) {
            scan_realm_access(realm_access, &mut builder);
        }
        if let Some(resource_access) = claims.get(RESOURCE_ACCESS) {
            self.scan_resource_access(resource_access, &mut builder);
        }

        builder.build()
    }

    fn scan_groups(&self, groups: &Value, builder: &mut RoleProfileBuilder) {
        for group in lenient_strings(GROUPS, groups) {
            match GroupRole::parse(group) {
                Some(GroupRole::Realm(role)) => builder.add_realm(role),
                Some(GroupRole::Application { client_id, role }) if client_id == self.audience => {
                    builder.add_application(role)
                }
                Some(GroupRole::Application { client_id, .. }) => {
                    tracing::trace!(group, client_id, "group role for another audience ignored");
                }
                None => tracing::trace!(group, "group carries no role"),
            }
        }
    }

    fn scan_resource_access(&self, resource_access: &Value, builder: &mut RoleProfileBuilder) {
        let Some(resource_access) = nested_object(RESOURCE_ACCESS, resource_access) else {
            return;
        };
        let Some(client) = resource_access.get(self.audience.as_str()) else {
            return;
        };
        if let Some(roles) = client.get(ROLES) {
            for role in lenient_strings(RESOURCE_ACCESS, roles) {
                builder.add_application(role);
            }
        }
    }
}

/// Derive a profile for `audience`
pub fn derive(claims: &Value, audience: &str) -> RoleProfile {
    RoleExtractor::new(audience).derive_value(claims)
}

fn scan_realm_access(realm_access: &Value, builder: &mut RoleProfileBuilder) {
    let Some(realm_access) = nested_object(REALM_ACCESS, realm_access) else {
        return;
    };
    if let Some(roles) = realm_access.get(ROLES) {
        for role in lenient_strings(REALM_ACCESS, roles) {
            builder.add_realm(role);
        }
    }
}

/// Passthrough when both normalized arrays are present and contain only strings
fn normalized_profile(claims: &Map<String, Value>) -> Option<RoleProfile> {
    let realm = strict_strings(claims.get(REALM_ROLES)?)?;
    let application = strict_strings(claims.get(APPLICATION_ROLES)?)?;
    Some(RoleProfile::new(realm, application))
}

fn strict_strings(value: &Value) -> Option<Vec<&str>> {
    value.as_array()?.iter().map(Value::as_str).collect()
}

fn lenient_strings<'a>(
    claim: &'static str,
    value: &'a Value,
) -> impl Iterator<Item = &'a str> + 'a {
    let entries: &'a [Value] = match value {
        Value::Array(entries) => entries.as_slice(),
        other => {
            tracing::trace!(claim, kind = json_kind(other), "expected an array of roles");
            &[]
        }
    };
    entries.iter().filter_map(move |entry| match entry.as_str() {
        Some(role) => Some(role),
        None => {
            tracing::trace!(claim, kind = json_kind(entry), "skipping non-string role");
            None
        }
    })
}

/// Nested claims arrive either as objects or, from some token mappers, as
/// JSON-encoded strings
fn nested_object<'a>(claim: &'static str, value: &'a Value) -> Option<Cow<'a, Value>> {
    match value {
        Value::Object(_) => Some(Cow::Borrowed(value)),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(decoded) if decoded.is_object() => Some(Cow::Owned(decoded)),
            Ok(decoded) => {
                let kind = json_kind(&decoded);
                tracing::trace!(claim, kind, "encoded claim is not an object");
                None
            }
            Err(e) => {
                tracing::trace!(claim, error = %e, "encoded claim is not valid JSON");
                None
            }
        },
        other => {
            tracing::trace!(claim, kind = json_kind(other), "expected an object");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
