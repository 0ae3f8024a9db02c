//! Policy evaluation and server-side enforcement
//!
//! This module holds the fixed policy table, the evaluator shared by both
//! enforcement points, and the authoritative server enforcement point.
//!
//! # Features
//!
//! - [`Policy`] / [`PolicyEvaluator`]: `read`, `write`, `is-admin`,
//!   `has-any-role:<roles>` over a [`RoleProfile`](crate::roles::RoleProfile)
//! - [`Enforcer`]: unauthenticated / forbidden / allowed decision per request
//! - `RequirePolicy` tower layer (feature `server`)
//!
//! # Example
//!
//! ```ignore
//! use axum::{routing::get, Router};
//! use claimgate::auth::{Policy, RequirePolicy};
//!
//! let app = Router::new()
//!     .route("/reports", get(list_reports).layer(RequirePolicy::new(Policy::Read, enforcer)));
//! ```

pub mod claims;
pub mod enforce;
pub mod error;
#[cfg(feature = "server")]
pub mod middleware;
pub mod policy;

pub use claims::IdentityClaims;
pub use enforce::Enforcer;
pub use error::{AuthorizationError, DenialReason, RejectionBody};
#[cfg(feature = "server")]
pub use middleware::RequirePolicy;
pub use policy::{Policy, PolicyEvaluator, RoleNames, UnknownPolicy};
