//! Advisory client-side gating
//!
//! A [`ClientSession`] fetches the caller's claims once, derives a
//! [`UserProfile`] with the same extractor and evaluator the server uses, and
//! caches it until logout or until the server rejects a call. The decisions it
//! makes only drive UI affordances. Every state-changing action still goes to
//! the server through [`ClientSession::mutate`], which surfaces the server's
//! verdict instead of the cached one.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::auth::{IdentityClaims, Policy, PolicyEvaluator};
use crate::roles::{RoleExtractor, UserProfile};
use crate::{ClaimgateError, Result};

/// Where the session obtains the caller's claims (e.g. `/oauth2/userinfo`)
pub trait ProfileSource: Send + Sync {
    fn fetch_claims(&self) -> impl Future<Output = Result<Value>> + Send;
}

/// What the UI may offer, from the cached profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Affordances {
    pub can_read: bool,
    pub can_write: bool,
    pub is_admin: bool,
}

impl Affordances {
    pub fn from_profile(evaluator: &PolicyEvaluator, profile: &UserProfile) -> Self {
        Self {
            can_read: evaluator.evaluate(&Policy::Read, &profile.roles),
            can_write: evaluator.evaluate(&Policy::Write, &profile.roles),
            is_admin: evaluator.evaluate(&Policy::IsAdmin, &profile.roles),
        }
    }
}

pub struct ClientSession<S> {
    source: S,
    extractor: RoleExtractor,
    evaluator: PolicyEvaluator,
    cached: RwLock<Option<Arc<UserProfile>>>,
}

impl<S: ProfileSource> ClientSession<S> {
    pub fn new(source: S, extractor: RoleExtractor, evaluator: PolicyEvaluator) -> Self {
        Self {
            source,
            extractor,
            evaluator,
            cached: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The session profile, fetched on first use and cached afterwards
    pub async fn profile(&self) -> Result<Arc<UserProfile>> {
        if let Some(profile) = self.cached.read().await.as_ref() {
            return Ok(profile.clone());
        }

        let mut cached = self.cached.write().await;
        // Another task may have filled the cache while we waited.
        if let Some(profile) = cached.as_ref() {
            return Ok(profile.clone());
        }

        let claims = IdentityClaims::from_value(self.source.fetch_claims().await?);
        let roles = claims.role_profile(&self.extractor);
        let profile = Arc::new(UserProfile::from_claims(&claims, roles));
        tracing::debug!(
            realm_roles = ?profile.roles.realm_roles(),
            application_roles = ?profile.roles.application_roles(),
            "session profile fetched"
        );
        *cached = Some(profile.clone());
        Ok(profile)
    }

    pub async fn cached_profile(&self) -> Option<Arc<UserProfile>> {
        self.cached.read().await.clone()
    }

    /// Local verdict for `policy`; `false` when no profile can be obtained
    pub async fn can(&self, policy: &Policy) -> bool {
        match self.profile().await {
            Ok(profile) => self.evaluator.evaluate(policy, &profile.roles),
            Err(e) => {
                tracing::debug!(error = %e, "no session profile, denying affordance");
                false
            }
        }
    }

    pub async fn affordances(&self) -> Affordances {
        match self.profile().await {
            Ok(profile) => Affordances::from_profile(&self.evaluator, &profile),
            Err(e) => {
                tracing::debug!(error = %e, "no session profile, no affordances");
                Affordances::default()
            }
        }
    }

    /// Run a server call for a state-changing action
    ///
    /// The call is always made, whatever the cached profile says. When the
    /// server rejects it the cached profile is dropped, so the next read
    /// reflects the server's current view, and the rejection is returned.
    pub async fn mutate<T, F>(&self, action: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = action.await;
        if let Err(ClaimgateError::Rejected(reason)) = &result {
            tracing::warn!(
                reason = %reason,
                "server rejected action, invalidating session profile"
            );
            self.invalidate().await;
        }
        result
    }

    /// Drop the cached profile; the next use fetches it again
    pub async fn invalidate(&self) {
        self.cached.write().await.take();
    }

    pub async fn logout(&self) {
        self.invalidate().await;
        tracing::debug!("session profile cleared on logout");
    }
}
