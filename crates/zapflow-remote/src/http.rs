//! HTTP implementation of [`RemotePlatform`] with retry and backoff.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::RequestAuth;
use crate::error::{Error, Result};
use crate::models::{ExportRequest, RemoteTaskStatus, SceneQuery, TaskHandle};
use crate::platform::RemotePlatform;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`HttpPlatform`].
pub struct HttpPlatformOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
}

impl Default for HttpPlatformOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the platform's REST surface.
pub struct HttpPlatform {
    base_url: String,
    client: reqwest::Client,
    auth: Box<dyn RequestAuth>,
    options: HttpPlatformOptions,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task: TaskHandle,
}

impl HttpPlatform {
    /// Create a new platform client for `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        auth: Box<dyn RequestAuth>,
        options: HttpPlatformOptions,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            auth,
            options,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one JSON request with exponential-backoff retry.
    ///
    /// 4xx responses are returned immediately as [`Error::Rejected`];
    /// timeouts, connection failures and 5xx responses are retried, then
    /// surfaced as [`Error::Transient`].
    async fn request_json<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<R> {
        let url = self.endpoint(path);
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                // Exponential backoff: 500ms, 1s, 2s, ...
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                tokio::time::sleep(delay).await;
            }

            let mut headers = Vec::new();
            self.auth
                .sign_request(&url, method.as_str(), &mut headers)?;

            let mut request = self.client.request(method.clone(), &url);
            for (key, value) in &headers {
                request = request.header(key.as_str(), value.as_str());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%url, method = %method, attempt, "platform request");

            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let text = resp
                        .text()
                        .await
                        .map_err(|e| Error::Protocol(format!("reading response body: {e}")))?;
                    return serde_json::from_str(&text)
                        .map_err(|e| Error::Protocol(format!("decoding response: {e}")));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    let message = text.chars().take(500).collect::<String>();
                    if status.is_client_error() {
                        return Err(Error::Rejected {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    last_err = Some(Error::Transient(format!("HTTP {status}: {message}")));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = Some(Error::Transient(format!("request failed: {e}")));
                }
                Err(e) => return Err(Error::Http(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Transient("request failed".to_string())))
    }
}

impl RemotePlatform for HttpPlatform {
    async fn scene_count(&self, query: &SceneQuery) -> Result<u64> {
        let body = to_body(query)?;
        let resp: CountResponse = self
            .request_json(Method::POST, "/v1/scenes/count", Some(&body))
            .await?;
        Ok(resp.count)
    }

    async fn submit_export(&self, request: &ExportRequest) -> Result<TaskHandle> {
        let body = to_body(request)?;
        let resp: SubmitResponse = self
            .request_json(Method::POST, "/v1/exports", Some(&body))
            .await?;
        Ok(resp.task)
    }

    async fn task_status(&self, handle: &TaskHandle) -> Result<RemoteTaskStatus> {
        let path = format!("/v1/exports/{}", handle.as_str());
        self.request_json(Method::GET, &path, None).await
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::Protocol(format!("encoding request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;

    #[test]
    fn endpoint_joins_cleanly() {
        let platform = HttpPlatform::new(
            "https://compute.example.com/api/",
            Box::new(NoAuth),
            HttpPlatformOptions::default(),
        )
        .unwrap();
        assert_eq!(
            platform.endpoint("/v1/exports"),
            "https://compute.example.com/api/v1/exports"
        );
        assert_eq!(
            platform.endpoint("v1/scenes/count"),
            "https://compute.example.com/api/v1/scenes/count"
        );
    }

    #[test]
    fn default_options() {
        let options = HttpPlatformOptions::default();
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert_eq!(options.max_retries, 3);
    }
}
