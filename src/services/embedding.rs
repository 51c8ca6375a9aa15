//! Embedding client for generating text embeddings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Something that turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed many texts; the result is in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    fn model(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Request body for the `/embeddings` endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

/// Response from the `/embeddings` endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    index: usize,
}

/// Client for OpenAI-compatible embedding endpoints.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl EmbeddingClient {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(EmbeddingError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| EmbeddingError::Unauthorized("malformed API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimension: config.dimension as usize,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check that the API accepts our key and model by embedding a probe string.
    pub async fn health_check(&self) -> Result<(), EmbeddingError> {
        self.embed("connection test").await.map(|_| ())
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    /// One request per call; callers decide how texts are batched.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimension,
        };

        tracing::debug!(
            "POST {} ({} inputs, model {})",
            self.endpoint,
            texts.len(),
            self.model
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
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
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        parse_embeddings(&body, texts.len(), self.dimension)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn status_error(status: StatusCode, body: String) -> EmbeddingError {
    let detail = body.trim().to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EmbeddingError::Unauthorized(format!("status {}: {}", status.as_u16(), detail))
        }
        StatusCode::TOO_MANY_REQUESTS => EmbeddingError::RateLimited(detail),
        s if s.is_server_error() => EmbeddingError::ServerError {
            status: s.as_u16(),
            detail,
        },
        s => EmbeddingError::ClientError {
            status: s.as_u16(),
            detail,
        },
    }
}

/// Decode an `/embeddings` response, restoring input order and checking
/// both the count and the length of every vector.
fn parse_embeddings(
    body: &str,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut parsed: EmbedResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

    if parsed.data.len() != expected_count {
        return Err(EmbeddingError::InvalidResponse(format!(
            "received {} embeddings for {} inputs",
            parsed.data.len(),
            expected_count
        )));
    }

    parsed.data.sort_by_key(|entry| entry.index);
    check_dimensions(
        parsed.data.into_iter().map(|entry| entry.embedding).collect(),
        dimension,
    )
}

/// Every vector must have exactly `dimension` components.
pub fn check_dimensions(
    vectors: Vec<Vec<f32>>,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if let Some((index, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension) {
        return Err(EmbeddingError::DimensionMismatch {
            index,
            expected: dimension,
            actual: v.len(),
        });
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Retryable;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_creation() {
        let client = EmbeddingClient::new(&config()).unwrap();
        assert_eq!(client.model(), "text-embedding-3-small");
        assert_eq!(client.dimension(), 512);
    }

    #[test]
    fn test_missing_api_key() {
        let err = EmbeddingClient::new(&EmbeddingConfig::default()).unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingApiKey));

        let blank = EmbeddingConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            EmbeddingClient::new(&blank),
            Err(EmbeddingError::MissingApiKey)
        ));
    }

    #[test]
    fn test_endpoint_trimming() {
        let config = EmbeddingConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..config()
        };
        let client = EmbeddingClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn test_request_wire_format() {
        let input = vec!["a".to_string(), "b".to_string()];
        let request = EmbedRequest {
            model: "text-embedding-3-small",
            input: &input,
            dimensions: 512,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["a", "b"],
                "dimensions": 512
            })
        );
    }

    #[test]
    fn test_parse_restores_input_order() {
        let body = r#"{"object":"list","data":[
            {"object":"embedding","index":1,"embedding":[1.0,1.0]},
            {"object":"embedding","index":0,"embedding":[0.0,0.5]}
        ],"model":"m","usage":{"prompt_tokens":2,"total_tokens":2}}"#;
        let vectors = parse_embeddings(body, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.0, 0.5], vec![1.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_wrong_dimension() {
        let body = r#"{"data":[{"index":0,"embedding":[0.1,0.2,0.3]}]}"#;
        let err = parse_embeddings(body, 1, 512).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                index: 0,
                expected: 512,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_parse_rejects_count_mismatch() {
        let body = r#"{"data":[{"index":0,"embedding":[0.1]}]}"#;
        assert!(matches!(
            parse_embeddings(body, 2, 1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_embeddings("not json", 1, 1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad key".into()),
            EmbeddingError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            EmbeddingError::RateLimited(_)
        ));
        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "busy".into());
        assert!(matches!(err, EmbeddingError::ServerError { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            "This model's maximum context length is 8192 tokens, however you requested 15000 tokens"
                .into(),
        );
        assert!(matches!(err, EmbeddingError::ClientError { status: 400, .. }));
        assert!(!err.is_retryable());

        let err = status_error(
            StatusCode::BAD_REQUEST,
            "Input batch of 2500 items exceeds the limit of 2048".into(),
        );
        assert!(matches!(err, EmbeddingError::ClientError { status: 400, .. }));
        assert!(!err.is_retryable());

        let err = status_error(StatusCode::NOT_FOUND, "model not found".into());
        assert!(matches!(err, EmbeddingError::ClientError { status: 404, .. }));
        assert!(err.to_string().contains("model not found"));
    }
}
