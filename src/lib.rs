//! # claimgate
//!
//! Role-based authorization for services that sit behind Keycloak and
//! oauth2-proxy.
//!
//! Claims arrive in several encodings: Keycloak's nested `realm_access` /
//! `resource_access` claims, oauth2-proxy's flat `role:` groups, or a profile
//! that was already normalized upstream. [`roles`] turns any of them into one
//! [`RoleProfile`]; [`auth`] evaluates named policies over it and enforces them
//! on the server; [`client`] makes the same decisions on the client side to
//! drive UI affordances.
//!
//! ## Features
//!
//! - `server`: Axum enforcement layer, trusted-proxy identity and the
//!   protected record API
//! - `client`: `reqwest` client for the record API

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod roles;
pub mod store;

#[cfg(feature = "server")]
pub mod axum_integration;
#[cfg(feature = "server")]
pub mod server;

pub use auth::{
    AuthorizationError, DenialReason, Enforcer, IdentityClaims, Policy, PolicyEvaluator, RoleNames,
};
pub use config::{load_config, ClaimgateConfig};
pub use error::{ClaimgateError, Result};
pub use roles::{RoleExtractor, RoleProfile, UserProfile};
