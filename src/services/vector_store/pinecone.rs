//! Pinecone vector store backend (REST API).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::{VectorStore, check_record_dimensions};
use crate::error::StoreError;
use crate::models::{IndexStats, QueryMatch, RecordMetadata, StoredRecord, VectorStoreConfig};

const API_VERSION: &str = "2024-07";

/// Index description from the control plane.
#[derive(Debug, Clone, Deserialize)]
struct IndexDescription {
    host: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [StoredRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: BTreeMap<String, NamespaceSummary>,
    #[serde(default)]
    dimension: u64,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: u64,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Pinecone vector store backend.
pub struct PineconeBackend {
    client: Client,
    index_name: String,
    controller_url: String,
    configured_host: Option<String>,
    description: OnceCell<IndexDescription>,
}

impl PineconeBackend {
    pub fn new(config: &VectorStoreConfig) -> Result<Self, StoreError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(StoreError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| StoreError::Unauthorized("malformed API key".to_string()))?,
        );
        headers.insert(
            "x-pinecone-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            index_name: config.index_name.clone(),
            controller_url: config.controller_url.trim_end_matches('/').to_string(),
            configured_host: config.host.clone(),
            description: OnceCell::new(),
        })
    }

    /// Resolve the data-plane host and dimension once per process.
    async fn describe(&self) -> Result<&IndexDescription, StoreError> {
        self.description
            .get_or_try_init(|| async {
                let url = format!("{}/indexes/{}", self.controller_url, self.index_name);
                tracing::debug!("GET {url}");
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(transport_error)?;
                let mut description: IndexDescription =
                    read_json(response, &self.index_name).await?;

                if let Some(host) = &self.configured_host {
                    description.host = host.clone();
                }
                description.host = data_plane_url(&description.host);
                tracing::info!(
                    "index '{}' at {} ({} dimensions)",
                    self.index_name,
                    description.host,
                    description.dimension
                );
                Ok::<_, StoreError>(description)
            })
            .await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, StoreError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let host = &self.describe().await?.host;
        let url = format!("{host}{path}");
        tracing::debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response, &self.index_name).await
    }
}

/// Prefix `https://` onto bare hosts as returned by the control plane.
fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::ConnectionError(e.to_string())
}

async fn read_json<R: DeserializeOwned>(
    response: reqwest::Response,
    index_name: &str,
) -> Result<R, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

    if !status.is_success() {
        return Err(status_error(status, &body, index_name));
    }

    serde_json::from_str(&body).map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

fn status_error(status: StatusCode, body: &str, index_name: &str) -> StoreError {
    let detail = format!("status {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(detail),
        StatusCode::NOT_FOUND => StoreError::IndexNotFound(index_name.to_string()),
        StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited(detail),
        s if s.is_server_error() => StoreError::ServerError {
            status: s.as_u16(),
            detail: body.trim().to_string(),
        },
        s => StoreError::InvalidRequest {
            status: s.as_u16(),
            detail: body.trim().to_string(),
        },
    }
}

fn into_stats(index_name: &str, response: StatsResponse) -> IndexStats {
    IndexStats {
        index_name: index_name.to_string(),
        total_vector_count: response.total_vector_count,
        dimension: response.dimension,
        namespaces: response
            .namespaces
            .into_iter()
            .map(|(name, summary)| (name, summary.vector_count))
            .collect(),
    }
}

fn into_match(m: PineconeMatch) -> QueryMatch {
    QueryMatch {
        id: m.id,
        score: m.score,
        metadata: m
            .metadata
            .and_then(|v| serde_json::from_value::<RecordMetadata>(v).ok()),
    }
}

#[async_trait]
impl VectorStore for PineconeBackend {
    async fn health_check(&self) -> Result<bool, StoreError> {
        self.describe().await.map(|_| true)
    }

    async fn upsert(
        &self,
        records: Vec<StoredRecord>,
        namespace: Option<&str>,
    ) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let dimension = self.describe().await?.dimension;
        check_record_dimensions(&records, dimension)?;

        let request = UpsertRequest {
            vectors: &records,
            namespace,
        };
        let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
        Ok(response.upserted_count)
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        let response: StatsResponse = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?;
        Ok(into_stats(&self.index_name, response))
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        let dimension = self.describe().await?.dimension;
        if vector.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                id: "<query>".to_string(),
                expected: dimension,
                actual: vector.len(),
            });
        }

        let request = QueryRequest {
            vector: &vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace,
        };
        let response: QueryResponse = self.post("/query", &request).await?;
        Ok(response.matches.into_iter().map(into_match).collect())
    }

    async fn dimension(&self) -> Result<usize, StoreError> {
        Ok(self.describe().await?.dimension)
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }
}
