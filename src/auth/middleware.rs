use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::Layer;
use tower::Service;

use super::claims::IdentityClaims;
use super::enforce::Enforcer;
use super::policy::Policy;

/// Middleware layer that requires the route's policy to allow the caller
///
/// Reads [`IdentityClaims`] from request extensions (inserted by
/// [`TrustedProxyIdentity`](crate::axum_integration::TrustedProxyIdentity) or
/// any other authentication layer), derives a fresh
/// [`RoleProfile`](crate::roles::RoleProfile) and inserts it into the request
/// extensions for the handler.
#[derive(Clone)]
pub struct RequirePolicy {
    policy: Arc<Policy>,
    enforcer: Arc<Enforcer>,
}

impl RequirePolicy {
    pub fn new(policy: Policy, enforcer: Arc<Enforcer>) -> Self {
        Self {
            policy: Arc::new(policy),
            enforcer,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}

impl<S> Layer<S> for RequirePolicy {
    type Service = RequirePolicyMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePolicyMiddleware {
            inner,
            policy: self.policy.clone(),
            enforcer: self.enforcer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequirePolicyMiddleware<S> {
    inner: S,
    policy: Arc<Policy>,
    enforcer: Arc<Enforcer>,
}

impl<S> Service<Request> for RequirePolicyMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        // Take the readied service and leave a fresh clone in its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let policy = self.policy.clone();
        let enforcer = self.enforcer.clone();

        Box::pin(async move {
            let identity = request.extensions().get::<IdentityClaims>();
            let subject = identity.and_then(|claims| claims.sub.clone());

            match enforcer.enforce(identity, &policy) {
                Ok(profile) => {
                    tracing::info!(
                        policy = %policy,
                        subject = subject.as_deref().unwrap_or("-"),
                        path = %request.uri().path(),
                        "access granted"
                    );
                    request.extensions_mut().insert(profile);
                }
                Err(err) => {
                    tracing::warn!(
                        policy = %policy,
                        subject = subject.as_deref().unwrap_or("-"),
                        path = %request.uri().path(),
                        reason = %err.reason(),
                        "access denied"
                    );
                    return Ok(err.into_response());
                }
            }

            inner.call(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PolicyEvaluator;
    use crate::roles::{RoleExtractor, RoleProfile};
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde_json::json;

    fn enforcer() -> Arc<Enforcer> {
        Arc::new(Enforcer::new(
            RoleExtractor::new("app1"),
            PolicyEvaluator::default(),
        ))
    }

    fn request_with_claims(claims: serde_json::Value) -> Request {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(IdentityClaims::from_value(claims));
        request
    }

    async fn call(policy: Policy, request: Request) -> Response {
        // Echoes the application roles the middleware handed on.
        let echo_service = tower::service_fn(|req: Request| async move {
            let roles = req
                .extensions()
                .get::<RoleProfile>()
                .map(|p| p.application_roles().join(","))
                .unwrap_or_default();
            Ok::<Response, std::convert::Infallible>(roles.into_response())
        });

        let mut service = tower::ServiceBuilder::new()
            .layer(RequirePolicy::new(policy, enforcer()))
            .service(echo_service);

        service.call(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_require_policy_allows_and_inserts_profile() {
        let request = request_with_claims(json!({
            "groups": ["role:app1:protected-data-read"]
        }));
        let response = call(Policy::Read, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"protected-data-read");
    }

    /// Records the level and message of every event
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<std::sync::Mutex<Vec<(tracing::Level, String)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CapturedEvents {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            struct Message(String);
            impl tracing::field::Visit for Message {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    if field.name() == "message" {
                        self.0 = format!("{:?}", value);
                    }
                }
            }

            let mut message = Message(String::new());
            event.record(&mut message);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), message.0));
        }
    }

    #[tokio::test]
    async fn test_decisions_logged_at_info_and_warn() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let reader = json!({ "groups": ["role:app1:protected-data-read"] });
        call(Policy::Read, request_with_claims(reader.clone())).await;
        call(Policy::Write, request_with_claims(reader)).await;

        let events = events.0.lock().unwrap();
        assert!(events.contains(&(tracing::Level::INFO, "access granted".to_string())));
        assert!(events.contains(&(tracing::Level::WARN, "access denied".to_string())));
    }

    #[tokio::test]
    async fn test_require_policy_forbidden() {
        let request = request_with_claims(json!({
            "groups": ["role:app1:protected-data-read"]
        }));
        let response = call(Policy::Write, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_require_policy_no_claims() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = call(Policy::Read, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_policy_other_audience_forbidden() {
        let request = request_with_claims(json!({
            "resource_access": { "app2": { "roles": ["protected-data-write"] } }
        }));
        let response = call(Policy::Read, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_require_policy_admin_passes_is_admin() {
        let request = request_with_claims(json!({ "realm_access": { "roles": ["admin"] } }));
        let response = call(Policy::IsAdmin, request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
