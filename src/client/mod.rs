//! Client-side enforcement point
//!
//! Advisory only: [`ClientSession`] decides what the UI offers, the server
//! decides what happens.

pub mod session;

#[cfg(feature = "client")]
pub mod api;

pub use session::{Affordances, ClientSession, ProfileSource};

#[cfg(feature = "client")]
pub use api::ApiClient;
