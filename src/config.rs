//! Configuration parsing module for claimgate
//!
//! Configuration is loaded from TOML and validated eagerly: an unknown policy
//! name or an empty audience fails here, at startup, never at request time.
//!
//! # Example
//!
//! ```rust,ignore
//! use claimgate::config::ClaimgateConfig;
//!
//! let config = ClaimgateConfig::load("claimgate.toml")?;
//! let enforcer = config.enforcer();
//! ```

use crate::auth::{Enforcer, IdentityClaims, Policy, PolicyEvaluator, RoleNames};
use crate::roles::RoleExtractor;
use crate::{ClaimgateError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimgateConfig {
    /// Identity provider client settings
    pub oidc: OidcConfig,

    /// Role names referenced by the policy table
    #[serde(default)]
    pub roles: RoleNames,

    /// Static route to policy mapping
    #[serde(default)]
    pub routes: RoutePolicies,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Development mode configuration section
    #[serde(default)]
    pub dev: Option<DevConfig>,
}

impl ClaimgateConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_config(path)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClaimgateError::Config(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.oidc.audience().trim().is_empty() {
            return Err(ClaimgateError::Config("oidc audience must not be empty".to_string()));
        }
        for (field, name) in [
            ("admin", &self.roles.admin),
            ("read", &self.roles.read),
            ("write", &self.roles.write),
        ] {
            if name.trim().is_empty() {
                return Err(ClaimgateError::Config(format!("roles.{} must not be empty", field)));
            }
        }
        Ok(())
    }

    /// Build the server enforcement point described by this configuration
    pub fn enforcer(&self) -> Enforcer {
        Enforcer::new(self.extractor(), self.evaluator())
    }

    pub fn extractor(&self) -> RoleExtractor {
        RoleExtractor::new(self.oidc.audience())
    }

    pub fn evaluator(&self) -> PolicyEvaluator {
        PolicyEvaluator::new(self.roles.clone())
    }

    /// Mock identity when development mode is enabled
    pub fn dev_claims(&self) -> Option<IdentityClaims> {
        self.dev
            .as_ref()
            .filter(|dev| dev.is_enabled())
            .map(DevConfig::create_dev_claims)
    }
}

/// OIDC configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Client ID registered with the identity provider
    pub client_id: String,

    /// Audience whose application roles are honoured (if different from client_id)
    #[serde(default)]
    pub audience: Option<String>,
}

impl OidcConfig {
    pub fn audience(&self) -> &str {
        self.audience.as_deref().unwrap_or(&self.client_id)
    }
}

/// Policy required by each protected route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePolicies {
    pub list: Policy,
    pub get: Policy,
    pub create: Policy,
    pub update: Policy,
    pub delete: Policy,
}

impl Default for RoutePolicies {
    fn default() -> Self {
        Self {
            list: Policy::Read,
            get: Policy::Read,
            create: Policy::Write,
            update: Policy::Write,
            delete: Policy::Write,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Development mode configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DevConfig {
    /// Enable local development mode (requests without identity get the mock one)
    #[serde(default)]
    pub local_dev_mode: bool,

    /// Mock email for development
    #[serde(default)]
    pub local_dev_email: Option<String>,

    /// Mock name for development
    #[serde(default)]
    pub local_dev_name: Option<String>,

    /// Mock username for development
    #[serde(default)]
    pub local_dev_username: Option<String>,

    /// Mock oauth2-proxy groups, e.g. `role:admin`
    #[serde(default)]
    pub local_dev_groups: Vec<String>,
}

impl DevConfig {
    /// Check if dev mode is enabled
    pub fn is_enabled(&self) -> bool {
        self.local_dev_mode
    }

    /// Create mock identity claims for development mode
    ///
    /// # Example
    ///
    /// ```rust
    /// use claimgate::config::DevConfig;
    ///
    /// let dev_config = DevConfig {
    ///     local_dev_mode: true,
    ///     local_dev_email: Some("test@example.com".to_string()),
    ///     local_dev_name: Some("Test User".to_string()),
    ///     local_dev_username: Some("testuser".to_string()),
    ///     local_dev_groups: vec!["role:admin".to_string()],
    /// };
    ///
    /// let claims = dev_config.create_dev_claims();
    /// assert_eq!(claims.email, Some("test@example.com".to_string()));
    /// assert_eq!(claims.preferred_username, Some("testuser".to_string()));
    /// ```
    pub fn create_dev_claims(&self) -> IdentityClaims {
        let mut extra = Map::new();
        if !self.local_dev_groups.is_empty() {
            extra.insert(
                "groups".to_string(),
                Value::Array(
                    self.local_dev_groups
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                ),
            );
        }

        IdentityClaims {
            sub: Some(
                self.local_dev_username
                    .clone()
                    .unwrap_or_else(|| "dev-user".to_string()),
            ),
            email: self.local_dev_email.clone(),
            name: self.local_dev_name.clone(),
            preferred_username: self.local_dev_username.clone(),
            extra,
        }
    }
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Example
///
/// ```rust,ignore
/// let config = claimgate::config::load_config("claimgate.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClaimgateConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| {
            ClaimgateError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

    ClaimgateConfig::from_toml_str(&content)
}
