//! The single HTTP access point to the REST backend.
//!
//! Every call is fire-once: there are no retries and no backoff here.

use std::time::Duration;

use agrochoco_config::Config;
use anyhow::Context;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    error::{CONNECTION_FAILED, GENERIC_FAILURE, GatewayError, MALFORMED_RESPONSE, NOT_FOUND},
    session::Session,
};

#[derive(Clone)]
pub struct Gateway {
    base_url: String,
    http_client: Client,
    session: Session,
}

impl Gateway {
    pub fn new(base_url: &str, timeout: Duration, session: Session) -> anyhow::Result<Self> {
        url::Url::parse(base_url).with_context(|| format!("Invalid API base url '{base_url}'"))?;
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            session,
        })
    }

    pub fn from_config(config: &Config, session: Session) -> anyhow::Result<Self> {
        Self::new(
            &config.api.base_url,
            Duration::from_secs(config.api.timeout_secs),
            session,
        )
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, GatewayError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Issues one request and normalizes the outcome.
    ///
    /// A 401 or 403 clears the persisted session before the error is
    /// returned. Redirecting to login is left to the caller.
    #[tracing::instrument(level = "debug", skip(self, body))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.url(path);
        debug!("{method} {url}");
        let mut req = self.http_client.request(method, &url);
        match self.session.token().await {
            Ok(Some(token)) => req = req.bearer_auth(token),
            Ok(None) => {}
            Err(e) => warn!("Failed to read session token, sending without it: {e}"),
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("Request to {url} failed: {e}");
                return Err(GatewayError::Transport {
                    message: CONNECTION_FAILED.to_string(),
                });
            }
        };
        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to read response body from {url}: {e}");
                return Err(GatewayError::Transport {
                    message: MALFORMED_RESPONSE.to_string(),
                });
            }
        };

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| {
                error!("Unparseable response body from {url}: {e}");
                GatewayError::Transport {
                    message: MALFORMED_RESPONSE.to_string(),
                }
            });
        }

        let data: Option<Value> = serde_json::from_str(&text).ok();
        let server_message = data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);
        let status = status.as_u16();
        warn!("{url} answered {status}");
        match status {
            401 | 403 => {
                if let Err(e) = self.session.invalidate().await {
                    error!("Failed to clear session: {e}");
                }
                Err(GatewayError::Auth {
                    status,
                    message: server_message.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
                    data,
                })
            }
            404 => Err(GatewayError::NotFound {
                message: server_message.unwrap_or_else(|| NOT_FOUND.to_string()),
                data,
            }),
            _ => Err(GatewayError::Server {
                status,
                message: server_message.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
                data,
            }),
        }
    }
}
