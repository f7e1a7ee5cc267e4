//! Low-level HTTP client — `ApiHttp`.
//!
//! The web login and document downloads live on HTTP; everything else is on
//! the WebSocket. Login responses are returned as wire types together with
//! the cookies they set, since the session is delivered as a cookie.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::HttpError;
use crate::http::retry::{RetryConfig, RetryPolicy};

/// A decoded response plus the cookies it set.
#[derive(Debug, Clone)]
pub struct HttpResponse<T> {
    pub body: T,
    pub cookies: Vec<(String, String)>,
}

impl<T> HttpResponse<T> {
    /// Value of the cookie named `name`, if the response set it.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client for the broker's REST endpoints and document links.
#[derive(Clone)]
pub struct ApiHttp {
    base_url: String,
    client: Client,
}

impl ApiHttp {
    pub fn new(base_url: &str) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path` (relative to the base URL).
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        retry: RetryPolicy,
    ) -> Result<HttpResponse<T>, HttpError> {
        let url = format!("{}{}", self.base_url, path);
        self.with_retry(&url, retry, || self.do_post(&url, body))
            .await
    }

    /// GET an absolute `url` and return the raw body.
    pub async fn get_bytes(&self, url: &str, retry: RetryPolicy) -> Result<Vec<u8>, HttpError> {
        self.with_retry(url, retry, || self.do_get_bytes(url)).await
    }

    async fn with_retry<R, F, Fut>(
        &self,
        url: &str,
        retry: RetryPolicy,
        op: F,
    ) -> Result<R, HttpError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R, HttpError>>,
    {
        let config = match &retry {
            RetryPolicy::None => return op().await,
            RetryPolicy::Idempotent => RetryConfig::idempotent(),
            RetryPolicy::Custom(c) => c.clone(),
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match op().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let should_retry = match &e {
                        HttpError::ServerError { status, .. } => {
                            config.is_retryable_status(*status)
                        }
                        HttpError::RateLimited { retry_after_ms } => {
                            if let Some(ms) = retry_after_ms {
                                futures_timer::Delay::new(Duration::from_millis(*ms)).await;
                            }
                            true
                        }
                        HttpError::Reqwest(re) => re.is_connect() || re.is_timeout(),
                        _ => false,
                    };

                    if !should_retry {
                        return Err(e);
                    }
                    if attempt < config.max_retries {
                        let delay = config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying request to {}",
                            url
                        );
                        futures_timer::Delay::new(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(HttpError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<HttpResponse<T>, HttpError> {
        let resp = check_status(self.client.post(url).json(body).send().await?).await?;
        let cookies = resp
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let body = resp.json::<T>().await?;
        Ok(HttpResponse { body, cookies })
    }

    async fn do_get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let resp = check_status(self.client.get(url).send().await?).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, HttpError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after_ms = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| secs * 1000);
    let body_text = resp.text().await.unwrap_or_default();

    Err(status_error(status.as_u16(), body_text, retry_after_ms))
}

fn status_error(status: u16, body: String, retry_after_ms: Option<u64>) -> HttpError {
    match status {
        401 | 403 => HttpError::Unauthorized,
        404 => HttpError::NotFound(body),
        429 => HttpError::RateLimited { retry_after_ms },
        400..=499 => HttpError::BadRequest(body),
        _ => HttpError::ServerError { status, body },
    }
}
