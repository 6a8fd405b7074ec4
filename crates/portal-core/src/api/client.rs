//! Authenticated HTTP client for the portal backend.
//!
//! Every call reads the current access token from the injected
//! `SessionProvider` and sends it as a bearer token. Responses outside
//! 200-299 become typed `ApiError`s carrying the backend's `detail` message.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::SessionProvider;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// What to do when the backend answers 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedPolicy {
    /// Fail with `AuthenticationFailed`; the request cache decides whether to retry
    #[default]
    FailFast,
    /// Refresh the session once and replay the request once
    RefreshAndRetry,
}

/// Method, query, body and extra headers for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// API client for the portal backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
    unauthorized_policy: UnauthorizedPolicy,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<dyn SessionProvider>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            unauthorized_policy: UnauthorizedPolicy::default(),
        })
    }

    pub fn with_unauthorized_policy(mut self, policy: UnauthorizedPolicy) -> Self {
        self.unauthorized_policy = policy;
        self
    }

    pub fn unauthorized_policy(&self) -> UnauthorizedPolicy {
        self.unauthorized_policy
    }

    pub fn session(&self) -> &Arc<dyn SessionProvider> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, endpoint);
        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::Config(format!("Invalid API URL {}: {}", raw, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.url(endpoint, &options.query)?;

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Session("Access token is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        // Caller-supplied headers win
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(ref body) = options.body {
            request = request.json(body);
        }

        debug!(method = %options.method, endpoint, "Sending request");
        Ok(request.send().await?)
    }

    /// Check if response is successful, returning an error with the
    /// backend's message if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, body = %ApiError::body_excerpt(&body), "Request failed");
        Err(ApiError::from_status(status, &body))
    }

    pub(crate) async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ApiError> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Send with the current access token, applying the 401 policy.
    async fn send_authenticated(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<Response, ApiError> {
        let token = self
            .session
            .access_token()
            .await
            .ok_or(ApiError::Unauthenticated)?;

        let response = self.send(endpoint, options, Some(&token)).await?;
        if response.status() != StatusCode::UNAUTHORIZED
            || self.unauthorized_policy == UnauthorizedPolicy::FailFast
        {
            return Self::check_response(response).await;
        }

        warn!(endpoint, "Unauthorized, refreshing session and retrying once");
        let refreshed = match self.session.refresh().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                return Err(ApiError::AuthenticationFailed);
            }
        };
        let retry = self
            .send(endpoint, options, Some(&refreshed.access_token))
            .await?;
        Self::check_response(retry).await
    }

    /// Authenticated fetch: returns the parsed JSON body, or `None` for 204.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        let response = self.send_authenticated(endpoint, &options).await?;
        Self::parse_json(response).await
    }

    /// Authenticated fetch that returns the raw body (CSV exports)
    pub async fn fetch_text(&self, endpoint: &str, options: RequestOptions) -> Result<String, ApiError> {
        let response = self.send_authenticated(endpoint, &options).await?;
        Ok(response.text().await?)
    }

    /// Unauthenticated send; the caller interprets the status
    pub(crate) async fn send_public(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<Response, ApiError> {
        self.send(endpoint, options, None).await
    }

    /// Unauthenticated call for the sign-in and password recovery endpoints
    pub async fn fetch_public<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        let response = self.send(endpoint, &options, None).await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    async fn expect_body<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.fetch(endpoint, options)
            .await?
            .ok_or_else(|| ApiError::InvalidResponse(format!("Empty response from {}", endpoint)))
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.expect_body(endpoint, RequestOptions::get()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.expect_body(endpoint, options).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.expect_body(endpoint, RequestOptions::new(Method::POST).json(body)?)
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.expect_body(endpoint, RequestOptions::new(Method::PATCH).json(body)?)
            .await
    }

    /// DELETE, returning the body if the backend sent one
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, ApiError> {
        self.fetch(endpoint, RequestOptions::new(Method::DELETE)).await
    }
}

/// Generic `{success, message}` acknowledgement
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
