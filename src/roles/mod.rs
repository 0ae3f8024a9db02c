//! Role derivation
//!
//! Turns a validated claims bundle into a [`RoleProfile`] with separate realm and
//! application namespaces. Both enforcement points consume the result.

pub mod extract;
pub mod profile;

pub use extract::{derive, GroupRole, RoleExtractor};
pub use profile::{RoleProfile, UserProfile};
