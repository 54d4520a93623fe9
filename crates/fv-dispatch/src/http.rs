//! HTTP execution seam.

use crate::error::HttpCallError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// What to execute: method, path, and optional parameters.
///
/// For GET/DELETE the parameters become the query string; otherwise they
/// are sent as a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            params: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new("POST", path).with_params(body)
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Executes one request against the exchange.
pub trait HttpCall: Send + Sync {
    fn call<'a>(&'a self, request: &'a RequestDescriptor) -> BoxFuture<'a, Result<Value, HttpCallError>>;
}

/// `reqwest`-backed [`HttpCall`].
pub struct ReqwestHttpCall {
    client: reqwest::Client,
    base_url: String,
    closed: AtomicBool,
}

impl ReqwestHttpCall {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HttpCallError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpCallError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            closed: AtomicBool::new(false),
        }
    }

    /// Stop accepting calls. In-flight failures after this point are
    /// reported as [`HttpCallError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn map_error(&self, e: reqwest::Error) -> HttpCallError {
        if self.is_closed() && (e.is_connect() || e.is_request() || e.is_body()) {
            HttpCallError::Closed
        } else {
            HttpCallError::Transport(e.to_string())
        }
    }

    async fn execute(&self, request: &RequestDescriptor) -> Result<Value, HttpCallError> {
        if self.is_closed() {
            return Err(HttpCallError::Closed);
        }

        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| HttpCallError::Transport(format!("invalid method {:?}: {e}", request.method)))?;
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self.client.request(method.clone(), &url);
        if let Some(params) = &request.params {
            builder = if method == reqwest::Method::GET || method == reqwest::Method::DELETE {
                builder.query(params)
            } else {
                builder.json(params)
            };
        }

        debug!(method = %method, url = %url, "Sending request");
        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        if !status.is_success() {
            return Err(HttpCallError::Status {
                code: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| HttpCallError::Transport(format!("invalid JSON response: {e}")))
    }
}

impl HttpCall for ReqwestHttpCall {
    fn call<'a>(&'a self, request: &'a RequestDescriptor) -> BoxFuture<'a, Result<Value, HttpCallError>> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_client_reports_closed() {
        let http = ReqwestHttpCall::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
        http.close();

        let err = http
            .call(&RequestDescriptor::get("/markets"))
            .await
            .unwrap_err();

        assert_eq!(err, HttpCallError::Closed);
        assert!(err.is_shutdown_related());
    }

    #[test]
    fn test_descriptor_builders() {
        let req = RequestDescriptor::post("/portfolio/orders", serde_json::json!({"count": 1}));
        assert_eq!(req.method, "POST");
        assert!(req.params.is_some());
        assert!(RequestDescriptor::get("/markets").params.is_none());
    }
}
