//! The agent-facing operations: search a domain, crawl a URL, and pull
//! cached results back out by id.
//!
//! Every failure is turned into a well-formed [`ToolResponse`] with
//! `is_error` set; nothing here returns an error to the transport layer.

use std::sync::Arc;

use reqwest::Url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, ResultCache, clamp_range};
use crate::data_models::{ContentTier, LiveCrawl, OutputFormat, ResponseMetadata};
use crate::exa::{
    ContentsOptions, ContentsRequest, ExaError, SearchProvider, SearchRequest, TextOptions,
};
use crate::formatter::{
    DEFAULT_MAX_TOTAL_TOKENS, RenderOptions, RenderedResponse, ResponseFormatter,
    chars_per_result,
};
use crate::profiles::DomainProfile;
use crate::tokens::DEFAULT_PRICE_PER_MILLION;

pub const DEFAULT_SUMMARY_RESULTS: usize = 5;
pub const DEFAULT_DETAILED_RESULTS: usize = 3;
pub const MAX_RESULTS: usize = 50;
/// Upstream text cap per result when the caller asks for `full`.
pub const FULL_TIER_MAX_CHARACTERS: usize = 20_000;
const MIN_CHARS_OVERRIDE: usize = 100;
const MAX_CHARS_OVERRIDE: usize = 50_000;

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// What to search for.
    pub query: String,
    /// Number of results (1-50). Defaults to 5 for `summary`, 3 otherwise.
    #[serde(default)]
    pub num_results: Option<usize>,
    /// `summary` (~150 tokens/result), `standard` (~500) or `full` (~1500, untruncated).
    #[serde(default)]
    pub content_level: Option<ContentTier>,
    /// `markdown` (default) or `json`.
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    /// Page freshness: `always`, `fallback` (default), `never` or `auto`.
    #[serde(default)]
    pub live_crawl: Option<LiveCrawl>,
    /// Override the per-result character allowance.
    #[serde(default)]
    pub max_chars_per_result: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrawlParams {
    /// The http(s) URL to fetch.
    pub url: String,
    /// Defaults to `full`.
    #[serde(default)]
    pub content_level: Option<ContentTier>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub live_crawl: Option<LiveCrawl>,
    #[serde(default)]
    pub max_chars_per_result: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveParams {
    /// Cache id returned by a previous search, e.g. `exa-1700000000000-a1b2c3d`.
    pub cache_id: String,
    /// Zero-based position of the result.
    pub index: i64,
    /// Exclusive end index; when set, every result in `[index, endIndex)` is returned.
    #[serde(default)]
    pub end_index: Option<i64>,
}

// =============================================================================
// Responses and errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidRequest,
    Upstream,
    InvalidIdentifier,
    NotFound,
    IndexOutOfRange,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Upstream(#[from] ExaError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::InvalidRequest(_) => ToolErrorKind::InvalidRequest,
            ToolError::Upstream(_) => ToolErrorKind::Upstream,
            ToolError::Cache(CacheError::InvalidIdentifier(_)) => ToolErrorKind::InvalidIdentifier,
            ToolError::Cache(CacheError::NotFound(_)) => ToolErrorKind::NotFound,
            ToolError::Cache(CacheError::IndexOutOfRange { .. }) => ToolErrorKind::IndexOutOfRange,
            ToolError::Cache(CacheError::Storage(_)) => ToolErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_id: Option<String>,
}

impl ToolResponse {
    fn plain(text: String) -> Self {
        Self {
            text,
            is_error: false,
            error_kind: None,
            metadata: None,
            cache_id: None,
        }
    }
}

impl From<RenderedResponse> for ToolResponse {
    fn from(rendered: RenderedResponse) -> Self {
        Self {
            text: rendered.text,
            is_error: false,
            error_kind: None,
            metadata: Some(rendered.metadata),
            cache_id: rendered.cache_id,
        }
    }
}

// =============================================================================
// Adapter
// =============================================================================

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub max_total_tokens: usize,
    pub price_per_million: f64,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            max_total_tokens: DEFAULT_MAX_TOTAL_TOKENS,
            price_per_million: DEFAULT_PRICE_PER_MILLION,
        }
    }
}

pub struct SearchAdapter {
    provider: Arc<dyn SearchProvider>,
    cache: Arc<ResultCache>,
    formatter: ResponseFormatter,
    settings: AdapterSettings,
}

impl SearchAdapter {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        cache: Arc<ResultCache>,
        settings: AdapterSettings,
    ) -> Self {
        let formatter = ResponseFormatter::new(cache.clone(), settings.price_per_million);
        Self {
            provider,
            cache,
            formatter,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn default_num_results(tier: ContentTier) -> usize {
        match tier {
            ContentTier::Summary => DEFAULT_SUMMARY_RESULTS,
            ContentTier::Standard | ContentTier::Full => DEFAULT_DETAILED_RESULTS,
        }
    }

    /// Character cap asked of the upstream per result.
    fn upstream_chars(&self, tier: ContentTier, num_results: usize, requested: Option<usize>) -> usize {
        if let Some(n) = requested {
            return n.clamp(MIN_CHARS_OVERRIDE, MAX_CHARS_OVERRIDE);
        }
        match tier {
            ContentTier::Full => FULL_TIER_MAX_CHARACTERS,
            _ => chars_per_result(self.settings.max_total_tokens, num_results),
        }
    }

    fn render_options(
        &self,
        tier: ContentTier,
        format: Option<OutputFormat>,
        max_chars_per_result: Option<usize>,
        max_results: usize,
    ) -> RenderOptions {
        RenderOptions {
            tier,
            max_total_tokens: self.settings.max_total_tokens,
            format: format.unwrap_or_default(),
            max_chars_per_result: max_chars_per_result
                .map(|n| n.clamp(MIN_CHARS_OVERRIDE, MAX_CHARS_OVERRIDE)),
            max_results: Some(max_results),
        }
    }

    pub async fn search(&self, profile: &DomainProfile, params: SearchParams) -> ToolResponse {
        let query = params.query.trim();
        if query.is_empty() {
            return self.failure(
                ToolError::InvalidRequest("query must not be empty".to_string()),
                None,
            );
        }

        let tier = params.content_level.unwrap_or(profile.default_tier);
        let num_results = params
            .num_results
            .unwrap_or_else(|| Self::default_num_results(tier))
            .clamp(1, MAX_RESULTS);

        let request = SearchRequest {
            query: profile.build_query(query),
            search_type: profile.mode.as_str().to_string(),
            num_results,
            category: profile.category.map(str::to_string),
            include_domains: profile.include_domains.iter().map(|d| d.to_string()).collect(),
            exclude_domains: profile.exclude_domains.iter().map(|d| d.to_string()).collect(),
            contents: ContentsOptions {
                text: TextOptions {
                    max_characters: self.upstream_chars(
                        tier,
                        num_results,
                        params.max_chars_per_result,
                    ),
                },
                livecrawl: params.live_crawl.unwrap_or_default(),
            },
        };

        tracing::info!(
            tool = profile.tool_name,
            query,
            num_results,
            tier = %tier,
            "search"
        );

        let response = match self.provider.search(&request).await {
            Ok(r) => r,
            Err(e) => return self.failure(e.into(), Some(query)),
        };
        let (results, metadata) = response.into_parts();

        let opts = self.render_options(
            tier,
            params.output_format,
            params.max_chars_per_result,
            num_results,
        );
        self.formatter
            .render(results, metadata, query, &opts)
            .await
            .into()
    }

    pub async fn crawl(&self, params: CrawlParams) -> ToolResponse {
        let url = params.url.trim();
        let valid = Url::parse(url)
            .map(|u| u.scheme() == "http" || u.scheme() == "https")
            .unwrap_or(false);
        if !valid {
            return self.failure(
                ToolError::InvalidRequest(format!("not a valid http(s) URL: {url:?}")),
                Some(url),
            );
        }

        let tier = params.content_level.unwrap_or(ContentTier::Full);
        let request = ContentsRequest {
            ids: vec![url.to_string()],
            text: TextOptions {
                max_characters: self.upstream_chars(tier, 1, params.max_chars_per_result),
            },
            livecrawl: params.live_crawl.unwrap_or_default(),
        };

        tracing::info!(url, tier = %tier, "crawl");

        let response = match self.provider.contents(&request).await {
            Ok(r) => r,
            Err(e) => return self.failure(e.into(), Some(url)),
        };
        let (results, metadata) = response.into_parts();

        let opts = self.render_options(tier, params.output_format, params.max_chars_per_result, 1);
        self.formatter
            .render(results, metadata, url, &opts)
            .await
            .into()
    }

    /// Full detail on one cached result. Never touches the upstream.
    pub async fn retrieve(&self, cache_id: &str, index: i64) -> ToolResponse {
        let record = match self.cache.lookup(cache_id).await {
            Ok(r) => r,
            Err(e) => return self.failure(e.into(), None),
        };
        let position = usize::try_from(index).ok().filter(|&i| i < record.len());
        match position {
            Some(i) => {
                let mut response = ToolResponse::plain(self.formatter.render_single(
                    &record.results[i],
                    i,
                    record.len(),
                    cache_id,
                ));
                response.cache_id = Some(record.id.clone());
                response
            }
            None => self.failure(
                CacheError::IndexOutOfRange {
                    cache_id: cache_id.to_string(),
                    index,
                    len: record.len(),
                }
                .into(),
                None,
            ),
        }
    }

    /// Full detail on the clamped slice `[start, end)` of a cached set.
    /// Negative bounds clamp to 0.
    pub async fn retrieve_range(&self, cache_id: &str, start: i64, end: i64) -> ToolResponse {
        let record = match self.cache.lookup(cache_id).await {
            Ok(r) => r,
            Err(e) => return self.failure(e.into(), None),
        };
        let range = clamp_range(
            record.len(),
            usize::try_from(start.max(0)).unwrap_or(usize::MAX),
            usize::try_from(end.max(0)).unwrap_or(usize::MAX),
        );
        let first = range.start;
        let text =
            self.formatter
                .render_range(&record.results[range], first, record.len(), cache_id);
        let mut response = ToolResponse::plain(text);
        response.cache_id = Some(record.id.clone());
        response
    }

    /// Entry point for the retrieval tool: one index, or a range with `end_index`.
    pub async fn retrieve_with(&self, params: RetrieveParams) -> ToolResponse {
        let cache_id = params.cache_id.as_str();
        match params.end_index {
            Some(end) => self.retrieve_range(cache_id, params.index, end).await,
            None => self.retrieve(cache_id, params.index).await,
        }
    }

    fn failure(&self, error: ToolError, query: Option<&str>) -> ToolResponse {
        let kind = error.kind();
        tracing::warn!(?kind, error = %error, "tool call failed");

        let ttl_hint = format!(
            "Cached results expire after {} minutes; re-run the original search to get a fresh cacheId.",
            (self.cache.config().ttl.as_secs() / 60).max(1)
        );
        let suggestions: Vec<&str> = match kind {
            ToolErrorKind::InvalidRequest => vec![
                "Check the tool parameters and try again.",
                "Queries must be non-empty; URLs must start with http:// or https://.",
            ],
            ToolErrorKind::Upstream => vec![
                "Retry the request; the search provider may be temporarily unavailable.",
                "Check that EXA_API_KEY is set and valid.",
                "Try a simpler query or fewer results.",
            ],
            ToolErrorKind::InvalidIdentifier => vec![
                "Pass the cacheId exactly as returned by a search, e.g. exa-1700000000000-a1b2c3d.",
            ],
            ToolErrorKind::NotFound => vec![ttl_hint.as_str()],
            ToolErrorKind::IndexOutOfRange => {
                vec!["Use an index inside the stated range; indices start at 0."]
            }
            ToolErrorKind::Internal => vec!["Re-run the original search."],
        };

        ToolResponse {
            text: self
                .formatter
                .render_error(&error.to_string(), query, &suggestions),
            is_error: true,
            error_kind: Some(kind),
            metadata: None,
            cache_id: None,
        }
    }
}
