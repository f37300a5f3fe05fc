//! # API Client
//!
//! Every call to the backend goes through [`ApiClient::request`], which joins
//! the endpoint onto the configured origin, adds the JSON content type and,
//! when a token is set, the `Authorization: Bearer` header.
//!
//! No retries, no timeouts, no cancellation. Dropping the returned future is
//! the only way to abandon a call.

use parking_lot::RwLock;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::client::config::ClientConfig;
use crate::client::error::ApiError;
use crate::types::Envelope;

/// Method, body and extra headers for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Default::default()
        }
    }

    pub fn put(body: Value) -> Self {
        Self {
            method: Method::PUT,
            body: Some(body),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Validates `base_url` and builds a client bound to it.
    pub fn configure(base_url: &str) -> Result<Self, ApiError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        tracing::debug!("API client configured for {}", trimmed);
        Ok(Self {
            http: Client::new(),
            base_url: trimmed.to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::configure(&config.api_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sets or clears the bearer token used by later requests.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn url_for(&self, endpoint: &str) -> Result<Url, ApiError> {
        let joined = format!("{}{}", self.base_url, endpoint);
        Url::parse(&joined).map_err(|e| ApiError::InvalidUrl {
            url: joined,
            reason: e.to_string(),
        })
    }

    /// Performs one call and returns the JSON body of a 2xx response as is.
    ///
    /// Non-2xx responses become [`ApiError::HttpStatus`] carrying the server's
    /// `error` string, or `API Error: {status}` when there is none.
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(endpoint)?;
        let mut headers = options.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = self.token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ApiError::Decode(format!("token is not a valid header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self.http.request(options.method.clone(), url).headers(headers);
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        tracing::debug!("➡️  {} {}", options.method, endpoint);
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let parsed: Option<Value> = serde_json::from_str(&text).ok();
            let field = |name: &str| {
                parsed
                    .as_ref()
                    .and_then(|v| v.get(name))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            let message = field("error").unwrap_or_else(|| ApiError::fallback_message(status));
            tracing::debug!("⬅️  {} {} failed: {}", status.as_u16(), endpoint, message);
            return Err(ApiError::HttpStatus {
                status,
                message,
                code: field("code"),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Performs a call and unwraps the response envelope into `T`.
    ///
    /// `success: false` on a 2xx response is an [`ApiError::Application`].
    pub async fn request_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let body = self.request(endpoint, options).await?;
        unwrap_envelope(body)
    }
}

/// Reads `data` out of a response envelope.
pub fn unwrap_envelope<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    let envelope: Envelope<Value> = serde_json::from_value(body)?;
    if !envelope.success {
        let message = envelope
            .error
            .or(envelope.message)
            .unwrap_or_else(|| "Request failed".to_string());
        return Err(ApiError::Application {
            code: envelope.code,
            message,
        });
    }
    Ok(serde_json::from_value(envelope.data.unwrap_or(Value::Null))?)
}
