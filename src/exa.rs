use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::data_models::{LiveCrawl, SearchMetadata, SearchResult};

pub const DEFAULT_BASE_URL: &str = "https://api.exa.ai";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

// upstream error bodies can be whole HTML pages
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ExaError {
    #[error("request to search provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    pub max_characters: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentsOptions {
    pub text: TextOptions,
    pub livecrawl: LiveCrawl,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(rename = "type")]
    pub search_type: String,
    pub num_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_domains: Vec<String>,
    pub contents: ContentsOptions,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentsRequest {
    pub ids: Vec<String>,
    pub text: TextOptions,
    pub livecrawl: LiveCrawl,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub resolved_search_type: Option<String>,
    #[serde(default)]
    pub autoprompt_string: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

impl SearchResponse {
    pub fn into_parts(self) -> (Vec<SearchResult>, SearchMetadata) {
        let metadata = SearchMetadata {
            request_id: self.request_id,
            resolved_search_type: self.resolved_search_type,
            autoprompt_string: self.autoprompt_string,
        };
        (self.results, metadata)
    }
}

/// The upstream search service as seen by the adapter.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ExaError>;

    async fn contents(&self, request: &ContentsRequest) -> Result<SearchResponse, ExaError>;
}

/// HTTP client for the Exa REST API.
///
/// Holds one `reqwest::Client` so repeated calls reuse pooled connections.
pub struct ExaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExaClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExaError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("exa-lens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<SearchResponse, ExaError> {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let res = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!(%status, path, "search provider returned an error");
            return Err(ExaError::Status { status, body });
        }

        let parsed: SearchResponse = res.json().await?;
        tracing::info!(
            path,
            results = parsed.results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search provider call finished"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl SearchProvider for ExaClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ExaError> {
        tracing::debug!(query = %request.query, num_results = request.num_results, "searching");
        self.post("/search", request).await
    }

    async fn contents(&self, request: &ContentsRequest) -> Result<SearchResponse, ExaError> {
        tracing::debug!(ids = ?request.ids, "fetching contents");
        self.post("/contents", request).await
    }
}

#[test]
fn test_search_request_wire_shape() {
    let req = SearchRequest {
        query: "rust async".to_string(),
        search_type: "auto".to_string(),
        num_results: 3,
        category: None,
        include_domains: vec!["github.com".to_string()],
        exclude_domains: vec![],
        contents: ContentsOptions {
            text: TextOptions {
                max_characters: 2000,
            },
            livecrawl: LiveCrawl::Fallback,
        },
    };
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "query": "rust async",
            "type": "auto",
            "numResults": 3,
            "includeDomains": ["github.com"],
            "contents": {
                "text": { "maxCharacters": 2000 },
                "livecrawl": "fallback"
            }
        })
    );
}
