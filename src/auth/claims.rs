use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::roles::{RoleExtractor, RoleProfile};

/// Claims of an identity already validated upstream
///
/// Well-known identity fields are lifted out when they are strings; every other
/// claim, including the role-bearing ones, stays in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Full name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Preferred username
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "preferredUsername")]
    pub preferred_username: Option<String>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityClaims {
    /// Build from a claims object. Non-objects produce empty claims.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from(map),
            _ => Self::default(),
        }
    }

    /// Derive the role profile for this identity
    pub fn role_profile(&self, extractor: &RoleExtractor) -> RoleProfile {
        extractor.derive(&self.extra)
    }

    /// Raw value of a claim that is not one of the lifted identity fields
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

impl From<Map<String, Value>> for IdentityClaims {
    fn from(mut map: Map<String, Value>) -> Self {
        let sub = take_string(&mut map, "sub");
        let email = take_string(&mut map, "email");
        let name = take_string(&mut map, "name");
        let preferred_username = take_string(&mut map, "preferred_username")
            .or_else(|| take_string(&mut map, "preferredUsername"));

        Self {
            sub,
            email,
            name,
            preferred_username,
            extra: map,
        }
    }
}

/// Remove `key` only when it holds a string, leaving ill-typed claims in place
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(_)) => match map.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}
