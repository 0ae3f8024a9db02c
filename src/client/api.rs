//! HTTP client for the protected record API

use std::future::Future;
use std::sync::RwLock;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use super::session::ProfileSource;
use crate::auth::DenialReason;
use crate::store::{ProtectedData, RecordInput};
use crate::{ClaimgateError, Result};

/// oauth2-proxy's user info endpoint
pub const DEFAULT_PROFILE_PATH: &str = "/oauth2/userinfo";
const COLLECTION_PATH: &str = "/api/protected-data";

/// Client for the record API and the profile endpoint
///
/// Behind oauth2-proxy the session cookie authenticates the calls; a bearer
/// token can be set for direct access.
pub struct ApiClient {
    http_client: Client,
    base_url: String,
    profile_path: String,
    bearer_token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            profile_path: DEFAULT_PROFILE_PATH.to_string(),
            bearer_token: RwLock::new(None),
        }
    }

    /// Fetch the profile from another path, e.g. the service's own `/api/me`
    pub fn with_profile_path(mut self, path: impl Into<String>) -> Self {
        self.profile_path = path.into();
        self
    }

    /// Replace the bearer token sent with every request
    pub fn set_bearer_token(&self, token: Option<String>) {
        *self
            .bearer_token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn item_url(&self, id: &str) -> String {
        self.url(&format!("{}/{}", COLLECTION_PATH, id))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .bearer_token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .await?;
        Ok(response)
    }

    /// All records
    pub async fn list(&self) -> Result<Vec<ProtectedData>> {
        let response = self.send(self.http_client.get(self.url(COLLECTION_PATH))).await?;
        Ok(check_status(response)?.json().await?)
    }

    /// One record, `None` when it does not exist
    pub async fn get(&self, id: &str) -> Result<Option<ProtectedData>> {
        let response = self.send(self.http_client.get(self.item_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response)?.json().await?))
    }

    pub async fn create(&self, description: &str) -> Result<ProtectedData> {
        let body = RecordInput {
            description: description.to_string(),
        };
        let response = self
            .send(self.http_client.post(self.url(COLLECTION_PATH)).json(&body))
            .await?;
        Ok(check_status(response)?.json().await?)
    }

    /// Updated record, `None` when it does not exist
    pub async fn update(&self, id: &str, description: &str) -> Result<Option<ProtectedData>> {
        let body = RecordInput {
            description: description.to_string(),
        };
        let response = self
            .send(self.http_client.put(self.item_url(id)).json(&body))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response)?.json().await?))
    }

    /// `true` when deleted, `false` when it did not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let response = self.send(self.http_client.delete(self.item_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response)?;
        Ok(true)
    }

    /// Raw claims from the profile endpoint
    pub async fn fetch_claims(&self) -> Result<Value> {
        let response = self.send(self.http_client.get(self.url(&self.profile_path))).await?;
        Ok(check_status(response)?.json().await?)
    }
}

impl ProfileSource for ApiClient {
    fn fetch_claims(&self) -> impl Future<Output = Result<Value>> + Send {
        ApiClient::fetch_claims(self)
    }
}

/// Map enforcement rejections and other failures to [`ClaimgateError`]
fn check_status(response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(ClaimgateError::Rejected(DenialReason::Unauthenticated)),
        StatusCode::FORBIDDEN => Err(ClaimgateError::Rejected(DenialReason::Forbidden)),
        status if !status.is_success() => {
            tracing::debug!(status = %status, url = %response.url(), "unexpected response status");
            Err(ClaimgateError::UnexpectedStatus(status.as_u16()))
        }
        _ => Ok(response),
    }
}
