//! Shared HTTP layer for every upstream API.
//!
//! Provides an async HTTP client with:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff (transient failures only)
//! - Per-upstream pacing via [`Pacer`]
//! - Response caching keyed by an MD5 digest of the request

mod pacer;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use pacer::Pacer;

use crate::config::{Config, api};
use crate::error::{ClientError, ClientResult};

/// HTTP client shared by the source clients, the registry lookup and the judge.
#[derive(Clone)]
pub struct HttpClient {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// Response cache for GET bodies; `None` when caching is off.
    cache: Option<Cache<String, Arc<str>>>,
}

impl HttpClient {
    /// Create a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> ClientResult<Self> {
        let client = Client::builder()
            .user_agent(api::USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(api::MAX_KEEPALIVE)
            .pool_idle_timeout(api::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_secs(1), Duration::from_secs(30))
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let cache = (config.cache_max_size > 0 && !config.cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(config.cache_max_size)
                .time_to_live(config.cache_ttl)
                .build()
        });

        Ok(Self { client, cache })
    }

    /// GET a body as text, paced and cached.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status.
    pub async fn get_text(
        &self,
        url: &str,
        params: &[(String, String)],
        pacer: &Pacer,
    ) -> ClientResult<String> {
        let cache_key = cache_key("GET", url, params);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key).await {
                tracing::trace!(url, "cache hit");
                return Ok(cached.to_string());
            }
        }

        pacer.wait().await;
        tracing::debug!(url, params = params.len(), "GET");

        let response = self.client.get(url).query(params).send().await?;
        let response = handle_response(response).await?;
        let body = response.text().await?;

        if let Some(cache) = &self.cache {
            cache.insert(cache_key, Arc::from(body.as_str())).await;
        }

        Ok(body)
    }

    /// GET and decode a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status or a body
    /// that does not decode as `T`.
    pub async fn get_json<T>(
        &self,
        url: &str,
        params: &[(String, String)],
        pacer: &Pacer,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self.get_text(url, params, pacer).await?;
        serde_json::from_str(&body).map_err(ClientError::from)
    }

    /// POST a JSON body and decode the JSON response. Never cached.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status or a body
    /// that does not decode as `T`.
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> ClientResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body_str = serde_json::to_string(body)?;

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body_str);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let response = handle_response(response).await?;
        let value: serde_json::Value = response.json().await?;

        serde_json::from_value(value).map_err(ClientError::from)
    }
}

/// Handle API response status codes.
async fn handle_response(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);

            Err(ClientError::rate_limited(retry_after))
        }
        404 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::not_found(text))
        }
        400 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::bad_request(text))
        }
        500..=599 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::server(status.as_u16(), text))
        }
        _ => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text })
        }
    }
}

/// Generate cache key.
fn cache_key(method: &str, url: &str, params: &[(String, String)]) -> String {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    hasher.update(b"|");

    for (k, v) in params {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(b"&");
    }

    format!("{:x}", hasher.finalize())
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").field("cached", &self.cache.is_some()).finish()
    }
}
