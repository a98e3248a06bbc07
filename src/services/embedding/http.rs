//! Remote feature-extraction endpoint.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingBackend, ProbeStatus};
use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Request body: `{"inputs": ...}`.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a, T: Serialize + ?Sized> {
    inputs: &'a T,
}

/// The endpoint answers with one vector per input, or a bare vector for a
/// single input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Batch(Vec<Vec<f32>>),
    Single(Vec<f32>),
}

impl EmbedResponse {
    fn into_batch(self) -> Vec<Vec<f32>> {
        match self {
            EmbedResponse::Batch(vectors) => vectors,
            EmbedResponse::Single(vector) => vec![vector],
        }
    }
}

/// HTTP client for the embedding endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingBackend {
    client: Client,
    endpoint: String,
    dimension: usize,
    probe_timeout: Duration,
    api_token: Option<String>,
}

impl HttpEmbeddingBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}",
                config.url.trim_end_matches('/'),
                config.model.trim_start_matches('/')
            ),
            dimension: config.dimension,
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            api_token: config.api_token.clone(),
        })
    }

    /// Full URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post(&self) -> RequestBuilder {
        let request = self.client.post(&self.endpoint);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check_shape(&self, vectors: &[Vec<f32>], expected: usize) -> Result<(), EmbeddingError> {
        if vectors.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                expected,
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected dimension {}, got {}",
                self.dimension,
                bad.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .post()
            .json(&EmbedRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Unavailable(body));
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let vectors = response
            .json::<EmbedResponse>()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?
            .into_batch();

        self.check_shape(&vectors, texts.len())?;
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "http"
    }

    async fn probe(&self) -> ProbeStatus {
        let result = self
            .post()
            .timeout(self.probe_timeout)
            .json(&EmbedRequest { inputs: "test" })
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => ProbeStatus::Reachable,
            Ok(response) => ProbeStatus::Status(response.status().as_u16()),
            Err(e) => ProbeStatus::Unreachable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn config(url: &str, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            url: url.to_string(),
            model: "test-model".to_string(),
            dimension,
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_joins_url_and_model() {
        let backend = HttpEmbeddingBackend::new(&config("http://localhost:9000/models/", 3)).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:9000/models/test-model");
    }

    #[tokio::test]
    async fn test_embed_batch() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/test-model")
                    .json_body(json!({"inputs": ["one", "two"]}));
                then.status(200).json_body(json!([[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]));
            })
            .await;

        let backend = HttpEmbeddingBackend::new(&config(&server.base_url(), 3)).unwrap();
        let vectors = backend
            .embed(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    }

    #[tokio::test]
    async fn test_single_vector_response_is_normalized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/test-model");
                then.status(200).json_body(json!([1.0, 2.0]));
            })
            .await;

        let backend = HttpEmbeddingBackend::new(&config(&server.base_url(), 2)).unwrap();
        let vectors = backend.embed(&["solo".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/busy");
                then.status(503).body("loading");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/broken");
                then.status(500).body("boom");
            })
            .await;

        let mut busy = config(&server.base_url(), 2);
        busy.model = "busy".to_string();
        let err = HttpEmbeddingBackend::new(&busy)
            .unwrap()
            .embed(&["x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(ref body) if body == "loading"));

        let mut broken = config(&server.base_url(), 2);
        broken.model = "broken".to_string();
        let err = HttpEmbeddingBackend::new(&broken)
            .unwrap()
            .embed(&["x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::ServerError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/test-model");
                then.status(200).json_body(json!([[0.1, 0.2]]));
            })
            .await;

        let backend = HttpEmbeddingBackend::new(&config(&server.base_url(), 3)).unwrap();
        let err = backend.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/test-model")
                    .header("authorization", "Bearer secret");
                then.status(200).json_body(json!([[1.0]]));
            })
            .await;

        let mut cfg = config(&server.base_url(), 1);
        cfg.api_token = Some("secret".to_string());
        HttpEmbeddingBackend::new(&cfg)
            .unwrap()
            .embed(&["x".to_string()])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/test-model")
                    .json_body(json!({"inputs": "test"}));
                then.status(200).json_body(json!([0.0]));
            })
            .await;

        let backend = HttpEmbeddingBackend::new(&config(&server.base_url(), 1)).unwrap();
        assert_eq!(backend.probe().await, ProbeStatus::Reachable);

        let mut missing = config(&server.base_url(), 1);
        missing.model = "missing".to_string();
        let status = HttpEmbeddingBackend::new(&missing).unwrap().probe().await;
        assert_eq!(status, ProbeStatus::Status(404));

        let offline = HttpEmbeddingBackend::new(&config("http://127.0.0.1:1", 1)).unwrap();
        assert!(matches!(offline.probe().await, ProbeStatus::Unreachable(_)));
    }
}
