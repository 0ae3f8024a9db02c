//! Axum integration for claimgate
//!
//! This module bridges what oauth2-proxy forwards into [`IdentityClaims`]:
//! - Bearer token extraction from `Authorization` or `X-Forwarded-Access-Token`
//! - oauth2-proxy user headers (`X-Forwarded-User`, `X-Forwarded-Groups`, ...)
//! - `FromRequestParts` extractors for the identity and the derived profile
//!
//! # Trust model
//!
//! [`TrustedProxyIdentity`] does not verify token signatures. The proxy in front
//! of the service has already validated the session and the token; the service
//! must not be reachable except through it.
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{routing::get, Router};
//! use claimgate::axum_integration::{Identity, TrustedProxyIdentity};
//!
//! async fn whoami(Identity(claims): Identity) -> String {
//!     claims.sub.unwrap_or_default()
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(TrustedProxyIdentity::new(None));
//! ```

use std::ops::Deref;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    response::Response,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};
use tower::{Layer, Service};

use crate::auth::{AuthorizationError, IdentityClaims};
use crate::roles::RoleProfile;

pub const FORWARDED_ACCESS_TOKEN: &str = "X-Forwarded-Access-Token";
pub const FORWARDED_USER: &str = "X-Forwarded-User";
pub const FORWARDED_EMAIL: &str = "X-Forwarded-Email";
pub const FORWARDED_PREFERRED_USERNAME: &str = "X-Forwarded-Preferred-Username";
pub const FORWARDED_GROUPS: &str = "X-Forwarded-Groups";

/// Extract Bearer token from Authorization header
///
/// # Example
///
/// ```rust
/// use axum::http::HeaderMap;
/// use claimgate::axum_integration::extract_bearer_token;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("Authorization", "Bearer my-token".parse().unwrap());
///
/// let token = extract_bearer_token(&headers);
/// assert_eq!(token, Some("my-token".to_string()));
/// ```
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

/// Extract the access token oauth2-proxy forwards with `pass_access_token`
///
/// The header may or may not carry a `Bearer ` prefix.
pub fn extract_forwarded_token(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get(FORWARDED_ACCESS_TOKEN)
        .and_then(|value| value.to_str().ok())?
        .trim_start();
    let token = strip_bearer_prefix(value).unwrap_or(value).trim();
    // A bare scheme with its trailing space stripped in transit carries no token.
    let empty = token.is_empty() || token.eq_ignore_ascii_case("bearer");
    (!empty).then(|| token.to_string())
}

/// Case-insensitive `Bearer ` prefix, matched before any trimming
fn strip_bearer_prefix(value: &str) -> Option<&str> {
    const PREFIX: &str = "bearer ";
    match value.get(..PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => Some(&value[PREFIX.len()..]),
        _ => None,
    }
}

/// Whether the request presents a non-empty access token in either header
pub fn carries_token(headers: &HeaderMap) -> bool {
    presented_token(headers).is_some()
}

fn presented_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_forwarded_token(headers))
}

/// Decode the payload segment of a JWT without verifying it
pub fn decode_token_claims(token: &str) -> Option<IdentityClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            tracing::debug!("access token is not a three-segment JWT");
            return None;
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| tracing::debug!(error = %e, "access token payload is not base64url"))
        .ok()?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(IdentityClaims::from(map)),
        Ok(_) => {
            tracing::debug!("access token payload is not a JSON object");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "access token payload is not JSON");
            None
        }
    }
}

/// Build claims from oauth2-proxy's user headers
///
/// Requires at least `X-Forwarded-User` or `X-Forwarded-Email`.
/// `X-Forwarded-Groups` is comma-separated.
pub fn forwarded_header_claims(headers: &HeaderMap) -> Option<IdentityClaims> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let sub = header(FORWARDED_USER);
    let email = header(FORWARDED_EMAIL);
    if sub.is_none() && email.is_none() {
        return None;
    }

    let mut extra = Map::new();
    if let Some(groups) = header(FORWARDED_GROUPS) {
        let groups = groups
            .split(',')
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .map(|group| Value::String(group.to_string()))
            .collect();
        extra.insert("groups".to_string(), Value::Array(groups));
    }

    Some(IdentityClaims {
        sub,
        email,
        name: None,
        preferred_username: header(FORWARDED_PREFERRED_USERNAME),
        extra,
    })
}

/// Resolve the caller's identity from proxy-forwarded request headers
///
/// Order: `Authorization: Bearer`, `X-Forwarded-Access-Token`, user headers.
/// A token that is present but undecodable yields no identity rather than
/// falling through to the user headers.
pub fn resolve_identity(headers: &HeaderMap) -> Option<IdentityClaims> {
    if let Some(token) = presented_token(headers) {
        return decode_token_claims(&token);
    }
    forwarded_header_claims(headers)
}

/// Layer that inserts [`IdentityClaims`] resolved from proxy headers
///
/// When no identity is present and development claims are configured, the
/// development identity is used instead.
#[derive(Clone)]
pub struct TrustedProxyIdentity {
    dev_claims: Option<Arc<IdentityClaims>>,
}

impl TrustedProxyIdentity {
    pub fn new(dev_claims: Option<IdentityClaims>) -> Self {
        Self {
            dev_claims: dev_claims.map(Arc::new),
        }
    }
}

impl<S> Layer<S> for TrustedProxyIdentity {
    type Service = TrustedProxyIdentityMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TrustedProxyIdentityMiddleware {
            inner,
            dev_claims: self.dev_claims.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TrustedProxyIdentityMiddleware<S> {
    inner: S,
    dev_claims: Option<Arc<IdentityClaims>>,
}

impl<S> Service<Request> for TrustedProxyIdentityMiddleware<S>
where
    S: Service<Request, Response = Response>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let headers = request.headers();
        let identity = match resolve_identity(headers) {
            Some(claims) => Some(claims),
            // An undecodable token never falls back to the development identity.
            None if carries_token(headers) => None,
            None => self.dev_claims.as_deref().cloned().inspect(|_| {
                tracing::debug!("no forwarded identity, using development identity");
            }),
        };

        match identity {
            Some(claims) => {
                let subject = claims.sub.as_deref().unwrap_or("-");
                tracing::debug!(subject, "identity resolved");
                request.extensions_mut().insert(claims);
            }
            None => tracing::debug!(path = %request.uri().path(), "request carries no identity"),
        }

        self.inner.call(request)
    }
}

/// Axum extractor for the caller's identity claims
///
/// Rejects with `401` when no identity was resolved.
#[derive(Debug, Clone)]
pub struct Identity(pub IdentityClaims);

impl Deref for Identity {
    type Target = IdentityClaims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthorizationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityClaims>()
            .cloned()
            .map(Identity)
            .ok_or(AuthorizationError::Unauthenticated)
    }
}

/// Axum extractor for the profile derived by [`RequirePolicy`](crate::auth::RequirePolicy)
#[derive(Debug, Clone)]
pub struct Profile(pub RoleProfile);

impl Deref for Profile {
    type Target = RoleProfile;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Profile
where
    S: Send + Sync,
{
    type Rejection = AuthorizationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RoleProfile>()
            .cloned()
            .map(Profile)
            .ok_or(AuthorizationError::Unauthenticated)
    }
}
