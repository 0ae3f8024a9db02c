//! Protected record API
//!
//! | Method | Path | Policy |
//! |---|---|---|
//! | GET | `/health` | none |
//! | GET | `/api/me` | authenticated |
//! | GET | `/api/protected-data` | `routes.list` |
//! | GET | `/api/protected-data/{id}` | `routes.get` |
//! | POST | `/api/protected-data` | `routes.create` |
//! | PUT | `/api/protected-data/{id}` | `routes.update` |
//! | DELETE | `/api/protected-data/{id}` | `routes.delete` |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::auth::{Enforcer, IdentityClaims, Policy, RequirePolicy};
use crate::axum_integration::{Identity, TrustedProxyIdentity};
use crate::config::{ClaimgateConfig, RoutePolicies};
use crate::roles::UserProfile;
use crate::store::{ProtectedData, RecordInput, RecordStore};

pub const COLLECTION_PATH: &str = "/api/protected-data";
pub const ITEM_PATH: &str = "/api/protected-data/{id}";
pub const PROFILE_PATH: &str = "/api/me";
pub const HEALTH_PATH: &str = "/health";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub enforcer: Arc<Enforcer>,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(enforcer: Enforcer, store: Arc<dyn RecordStore>) -> Self {
        Self {
            enforcer: Arc::new(enforcer),
            store,
        }
    }
}

/// Build the full router from configuration and an injected store
pub fn app(config: &ClaimgateConfig, store: Arc<dyn RecordStore>) -> Router {
    router(
        AppState::new(config.enforcer(), store),
        &config.routes,
        config.dev_claims(),
    )
}

pub fn router(
    state: AppState,
    routes: &RoutePolicies,
    dev_claims: Option<IdentityClaims>,
) -> Router {
    let gate = |policy: &Policy| RequirePolicy::new(policy.clone(), state.enforcer.clone());

    let api = Router::new()
        .route(PROFILE_PATH, get(current_user))
        .route(
            COLLECTION_PATH,
            get(list_records)
                .layer(gate(&routes.list))
                .merge(post(create_record).layer(gate(&routes.create))),
        )
        .route(
            ITEM_PATH,
            get(get_record)
                .layer(gate(&routes.get))
                .merge(put(update_record).layer(gate(&routes.update)))
                .merge(delete(delete_record).layer(gate(&routes.delete))),
        )
        .layer(TrustedProxyIdentity::new(dev_claims));

    Router::new()
        .route(HEALTH_PATH, get(health))
        .merge(api)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Normalized profile of the caller, as the client side consumes it
async fn current_user(
    State(state): State<AppState>,
    Identity(claims): Identity,
) -> Json<UserProfile> {
    let roles = claims.role_profile(state.enforcer.extractor());
    Json(UserProfile::from_claims(&claims, roles))
}

async fn list_records(State(state): State<AppState>) -> Json<Vec<ProtectedData>> {
    Json(state.store.list())
}

async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProtectedData>, StatusCode> {
    state.store.get(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn create_record(
    State(state): State<AppState>,
    Json(input): Json<RecordInput>,
) -> impl IntoResponse {
    let record = state.store.insert(input.description);
    tracing::info!(id = %record.id, "record created");
    let location = format!("{}/{}", COLLECTION_PATH, record.id);
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(record))
}

async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<RecordInput>,
) -> Result<Json<ProtectedData>, StatusCode> {
    let record = state
        .store
        .update(&id, input.description)
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!(id = %record.id, "record updated");
    Ok(Json(record))
}

async fn delete_record(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.store.remove(&id) {
        tracing::info!(id = %id, "record deleted");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
