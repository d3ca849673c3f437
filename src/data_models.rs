use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One ranked item returned by the search provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

/// Upstream bookkeeping kept alongside a cached result set.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_search_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoprompt_string: Option<String>,
}

/// Snapshot of one search, persisted by the result cache.
///
/// Never mutated after creation; a new search always produces a new record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedResultSet {
    pub id: String,
    pub query: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub ttl_ms: u64,
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub metadata: SearchMetadata,
}

impl CachedResultSet {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Expired once strictly more than `ttl` has passed since creation.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        let ttl = i64::try_from(self.ttl_ms).unwrap_or(i64::MAX);
        now_millis.saturating_sub(self.created_at) > ttl
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Rendering depth requested by the caller.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentTier {
    #[default]
    Summary,
    Standard,
    Full,
}

impl ContentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentTier::Summary => "summary",
            ContentTier::Standard => "standard",
            ContentTier::Full => "full",
        }
    }

    /// Rough per-result token target, shown to the caller only.
    pub fn target_tokens_per_result(&self) -> usize {
        match self {
            ContentTier::Summary => 150,
            ContentTier::Standard => 500,
            ContentTier::Full => 1500,
        }
    }
}

impl fmt::Display for ContentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(ContentTier::Summary),
            "standard" => Ok(ContentTier::Standard),
            "full" => Ok(ContentTier::Full),
            other => Err(format!("unknown content level: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Upstream freshness policy for page contents.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LiveCrawl {
    Always,
    #[default]
    Fallback,
    Never,
    Auto,
}

/// Per-response view model. Computed for every render, never persisted.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_results: usize,
    pub returned_results: usize,
    pub character_count: usize,
    pub word_count: usize,
    pub estimated_tokens: usize,
    pub estimated_cost_usd: f64,
    pub truncated: bool,
    pub has_more: bool,
    pub content_level: ContentTier,
}
