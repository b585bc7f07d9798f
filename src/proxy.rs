//! Chat completion proxy handler
//!
//! Forwards a client's chat-completion payload to the upstream API with the
//! server-held key attached as a bearer token, and relays the answer.
//! Each call is independent; the handler keeps nothing between calls besides
//! its configuration and the pooled HTTP client.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

/// Proxy handler
#[derive(Debug, Clone)]
pub struct ProxyHandler {
    client: Client,
    config: ProxyConfig,
}

impl ProxyHandler {
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Handle one inbound request.
    ///
    /// Only POST is accepted. The body must parse as JSON; it is forwarded
    /// without further validation.
    /// Buffer an inbound body, failing once it exceeds the configured cap
    pub async fn read_body(&self, body: Body) -> Result<Bytes, ProxyError> {
        to_bytes(body, self.config.max_body_bytes)
            .await
            .map_err(ProxyError::BodyRead)
    }

    pub async fn handle(&self, method: &Method, body: &[u8]) -> Result<Value, ProxyError> {
        if *method != Method::POST {
            return Err(ProxyError::MethodNotAllowed);
        }

        let payload: Value = serde_json::from_slice(body).map_err(ProxyError::InvalidBody)?;
        let api_key = self.config.api_key().ok_or(ProxyError::MissingApiKey)?;

        self.forward(api_key, &payload).await
    }

    async fn forward(&self, api_key: &str, payload: &Value) -> Result<Value, ProxyError> {
        debug!("Forwarding chat completion to {}", self.config.upstream_url);

        let resp = self
            .client
            .post(&self.config.upstream_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(payload).map_err(ProxyError::InvalidBody)?)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await?;
            error!("Upstream API error {}: {}", status, details);
            return Err(ProxyError::Upstream {
                status: StatusCode::from_u16(status.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                details,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(ProxyError::InvalidUpstreamResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn handler_for(server: &MockServer, api_key: Option<&str>) -> ProxyHandler {
        let mut config =
            ProxyConfig::default().with_upstream_url(server.url("/v1/chat/completions"));
        config.api_key = api_key.map(str::to_string);
        ProxyHandler::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_non_post_is_rejected_without_upstream_call() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.path("/v1/chat/completions");
                then.status(200).body("{}");
            })
            .await;

        let handler = handler_for(&server, Some("sk-test"));
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            for body in [&br#"{"model":"gpt-x"}"#[..], b"not json", b""] {
                let result = handler.handle(&method, body).await;
                assert!(matches!(result, Err(ProxyError::MethodNotAllowed)));
            }
        }

        upstream.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_success_relays_upstream_json() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .header("content-type", "application/json")
                    .json_body(json!({"model": "gpt-x", "messages": []}));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"id":"abc","choices":[]}"#);
            })
            .await;

        let handler = handler_for(&server, Some("sk-test"));
        let result = handler
            .handle(&Method::POST, br#"{"model":"gpt-x","messages":[]}"#)
            .await
            .unwrap();

        upstream.assert_async().await;
        assert_eq!(result, json!({"id": "abc", "choices": []}));
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"id":"abc","choices":[]}"#
        );
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).body("{}");
            })
            .await;

        let handler = handler_for(&server, None);
        let result = handler.handle(&Method::POST, br#"{"messages":[]}"#).await;

        assert!(matches!(result, Err(ProxyError::MissingApiKey)));
        upstream.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let server = MockServer::start_async().await;
        let handler = handler_for(&server, Some("sk-test"));

        let result = handler.handle(&Method::POST, b"not json").await;
        let err = result.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidBody(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429).body("rate limit exceeded");
            })
            .await;

        let handler = handler_for(&server, Some("sk-test"));
        let err = handler
            .handle(&Method::POST, br#"{"messages":[]}"#)
            .await
            .unwrap_err();

        match err {
            ProxyError::Upstream { status, details } => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(details, "rate limit exceeded");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_upstream_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).body("not valid json");
            })
            .await;

        let handler = handler_for(&server, Some("sk-test"));
        let err = handler
            .handle(&Method::POST, br#"{"messages":[]}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::InvalidUpstreamResponse(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_connection_error() {
        let config = ProxyConfig::default()
            .with_upstream_url("http://127.0.0.1:65534/v1/chat/completions")
            .with_api_key("sk-test");
        let handler = ProxyHandler::new(config).unwrap();

        let err = handler
            .handle(&Method::POST, br#"{"messages":[]}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Network(_)));
        assert_eq!(err.kind(), "network");
    }

    #[tokio::test]
    async fn test_repeated_calls_are_identical() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).body(r#"{"id":"abc","choices":[{"index":0}]}"#);
            })
            .await;

        let handler = handler_for(&server, Some("sk-test"));
        let body = br#"{"model":"gpt-x","messages":[{"role":"user","content":"hi"}]}"#;

        let first = handler.handle(&Method::POST, body).await.unwrap();
        let second = handler.handle(&Method::POST, body).await.unwrap();

        assert_eq!(first, second);
        upstream.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_read_body_respects_cap() {
        let mut config = ProxyConfig::default();
        config.max_body_bytes = 8;
        let handler = ProxyHandler::new(config).unwrap();

        let bytes = handler.read_body(Body::from("{}")).await.unwrap();
        assert_eq!(&bytes[..], b"{}");

        let err = handler
            .read_body(Body::from(r#"{"messages":[]}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::BodyRead(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_truncated_upstream_error_body_is_internal_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Upstream announces more error body than it sends, then hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 100\r\n\r\npartial")
                .await;
        });

        let config = ProxyConfig::default()
            .with_upstream_url(format!("http://{}/v1/chat/completions", addr))
            .with_api_key("sk-test");
        let handler = ProxyHandler::new(config).unwrap();

        let err = handler
            .handle(&Method::POST, br#"{"messages":[]}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Network(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
