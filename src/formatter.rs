//! Tiered rendering of search results under a token budget.
//!
//! ```text
//! results ──► ResultCache::store ──► cache id
//!    │
//!    └──► per-result render (summary | standard | full)
//!             │
//!             └──► header (counts, estimate, cache hint) + body ──► caller
//! ```
//!
//! The `standard` tier scales its per-result character allowance with the
//! number of results so the total stays near the caller's budget. `full`
//! never truncates and may exceed the budget; callers opt into that.

use std::fmt::Write;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::ResultCache;
use crate::data_models::{
    ContentTier, OutputFormat, ResponseMetadata, SearchMetadata, SearchResult,
};
use crate::tokens::{self, TokenEstimate};

pub const NO_RESULTS_MESSAGE: &str =
    "No results found. Try broadening the query or using different keywords.";

pub const DEFAULT_MAX_TOTAL_TOKENS: usize = 20_000;
/// Tokens held back for the header and cache hint.
pub const METADATA_OVERHEAD_TOKENS: usize = 1_000;
pub const MIN_CHARS_PER_RESULT: usize = 500;
pub const MAX_CHARS_PER_RESULT: usize = 5_000;
pub const SUMMARY_PREVIEW_CHARS: usize = 200;

const MAX_ERROR_MESSAGE_CHARS: usize = 600;
// the embedded estimate only grows with digit count, so this settles in 2-3
const MAX_ESTIMATE_PASSES: usize = 8;
const MAX_ERROR_QUERY_CHARS: usize = 200;

/// Per-result character allowance for the `standard` tier.
///
/// `clamp(floor((budget - overhead) / count * 4), 500, 5000)`
pub fn chars_per_result(max_total_tokens: usize, result_count: usize) -> usize {
    let available = max_total_tokens.saturating_sub(METADATA_OVERHEAD_TOKENS) as f64;
    let per_result = available / result_count.max(1) as f64;
    let chars = (per_result * tokens::CHARS_PER_TOKEN).floor() as usize;
    chars.clamp(MIN_CHARS_PER_RESULT, MAX_CHARS_PER_RESULT)
}

/// First `max` characters of `text`, and whether anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub tier: ContentTier,
    pub max_total_tokens: usize,
    pub format: OutputFormat,
    /// Overrides the computed `standard` allowance when set.
    pub max_chars_per_result: Option<usize>,
    /// Cap on rendered results; the full set is cached regardless.
    pub max_results: Option<usize>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tier: ContentTier::Summary,
            max_total_tokens: DEFAULT_MAX_TOTAL_TOKENS,
            format: OutputFormat::Markdown,
            max_chars_per_result: None,
            max_results: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedResponse {
    pub text: String,
    pub metadata: ResponseMetadata,
    pub cache_id: Option<String>,
}

// =============================================================================
// Structured (JSON) view
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredMetadata<'a> {
    cache_id: Option<&'a str>,
    query: &'a str,
    total_results: usize,
    returned_results: usize,
    content_level: ContentTier,
    token_estimate: usize,
    truncated: bool,
    has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredResult<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    title: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    text: &'a str,
    text_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    favicon: Option<&'a str>,
}

#[derive(Serialize)]
struct StructuredResponse<'a> {
    metadata: StructuredMetadata<'a>,
    results: Vec<StructuredResult<'a>>,
}

// =============================================================================
// Formatter
// =============================================================================

pub struct ResponseFormatter {
    cache: Arc<ResultCache>,
    price_per_million: f64,
}

impl ResponseFormatter {
    pub fn new(cache: Arc<ResultCache>, price_per_million: f64) -> Self {
        Self {
            cache,
            price_per_million,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Renders a result set and caches it for later retrieval.
    ///
    /// An empty set is not cached. A cache write failure is logged and the
    /// response goes out without a cache hint.
    pub async fn render(
        &self,
        results: Vec<SearchResult>,
        search_metadata: SearchMetadata,
        query: &str,
        opts: &RenderOptions,
    ) -> RenderedResponse {
        if results.is_empty() {
            return self.render_empty(query, opts);
        }

        let cache_id = match self
            .cache
            .store(query, results.clone(), search_metadata)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("failed to cache results for {query:?}: {e}");
                None
            }
        };

        let total = results.len();
        let returned = opts.max_results.map_or(total, |n| n.min(total));
        let shown = &results[..returned];
        let cap = self.char_cap(opts, returned);

        let (text, truncated) = match opts.format {
            OutputFormat::Markdown => {
                self.render_markdown(shown, total, query, opts.tier, cap, cache_id.as_deref())
            }
            OutputFormat::Json => {
                self.render_json(shown, total, query, opts.tier, cap, cache_id.as_deref())
            }
        };

        let metadata = self.metadata_for(&text, total, returned, truncated, opts.tier);
        RenderedResponse {
            text,
            metadata,
            cache_id,
        }
    }

    fn render_empty(&self, query: &str, opts: &RenderOptions) -> RenderedResponse {
        let text = match opts.format {
            OutputFormat::Markdown => NO_RESULTS_MESSAGE.to_string(),
            OutputFormat::Json => {
                let response = StructuredResponse {
                    metadata: StructuredMetadata {
                        cache_id: None,
                        query,
                        total_results: 0,
                        returned_results: 0,
                        content_level: opts.tier,
                        token_estimate: 0,
                        truncated: false,
                        has_more: false,
                        ttl_seconds: None,
                        message: Some(NO_RESULTS_MESSAGE),
                    },
                    results: Vec::new(),
                };
                serde_json::to_string_pretty(&response).unwrap_or_default()
            }
        };
        let metadata = self.metadata_for(&text, 0, 0, false, opts.tier);
        RenderedResponse {
            text,
            metadata,
            cache_id: None,
        }
    }

    /// Body character cap for one result, `None` meaning uncapped.
    fn char_cap(&self, opts: &RenderOptions, result_count: usize) -> Option<usize> {
        match opts.tier {
            ContentTier::Summary => Some(SUMMARY_PREVIEW_CHARS),
            ContentTier::Standard => Some(
                opts.max_chars_per_result
                    .unwrap_or_else(|| chars_per_result(opts.max_total_tokens, result_count)),
            ),
            ContentTier::Full => None,
        }
    }

    fn metadata_for(
        &self,
        text: &str,
        total: usize,
        returned: usize,
        truncated: bool,
        tier: ContentTier,
    ) -> ResponseMetadata {
        let est = tokens::estimate(text);
        ResponseMetadata {
            total_results: total,
            returned_results: returned,
            character_count: est.character_count,
            word_count: est.word_count,
            estimated_tokens: est.estimated_tokens,
            estimated_cost_usd: tokens::estimate_cost(est.estimated_tokens, self.price_per_million),
            truncated,
            has_more: total > returned,
            content_level: tier,
        }
    }

    fn ttl_minutes(&self) -> u64 {
        (self.cache.config().ttl.as_secs() / 60).max(1)
    }

    // -------------------------------------------------------------------------
    // Markdown
    // -------------------------------------------------------------------------

    fn render_markdown(
        &self,
        shown: &[SearchResult],
        total: usize,
        query: &str,
        tier: ContentTier,
        cap: Option<usize>,
        cache_id: Option<&str>,
    ) -> (String, bool) {
        let mut body = String::new();
        let mut truncated = false;
        for (index, result) in shown.iter().enumerate() {
            truncated |= render_result(&mut body, index, result, tier, cap);
        }

        // the header reports an estimate over header + body; re-render until
        // the embedded figures describe the text they sit in
        let mut est = TokenEstimate::default();
        let mut text = String::new();
        for _ in 0..MAX_ESTIMATE_PASSES {
            let header =
                self.markdown_header(query, shown.len(), total, tier, &est, truncated, cache_id);
            text = format!("{header}{body}");
            let next = tokens::estimate(&text);
            if next == est {
                break;
            }
            est = next;
        }

        (text, truncated)
    }

    #[allow(clippy::too_many_arguments)]
    fn markdown_header(
        &self,
        query: &str,
        returned: usize,
        total: usize,
        tier: ContentTier,
        est: &TokenEstimate,
        truncated: bool,
        cache_id: Option<&str>,
    ) -> String {
        let cost = tokens::estimate_cost(est.estimated_tokens, self.price_per_million);
        let mut out = String::new();
        let _ = writeln!(out, "## Search results for \"{query}\"\n");
        let _ = writeln!(
            out,
            "**Results:** {returned} of {total} | **Content level:** {tier} (~{} tokens/result) | **Estimated tokens:** ~{} ({} chars, {} words, ~${cost:.4})",
            tier.target_tokens_per_result(),
            est.estimated_tokens,
            est.character_count,
            est.word_count
        );
        let _ = writeln!(
            out,
            "**Truncated:** {} | **More available:** {}\n",
            yes_no(truncated),
            yes_no(total > returned)
        );
        if let Some(id) = cache_id {
            let _ = writeln!(
                out,
                "> Cached as `{id}` for {} minutes. Call `get_cached_result` with this cacheId and an index from 0 to {} for full detail on a single result.\n",
                self.ttl_minutes(),
                total - 1
            );
        }
        out.push_str("---\n\n");
        out
    }

    // -------------------------------------------------------------------------
    // JSON
    // -------------------------------------------------------------------------

    fn render_json(
        &self,
        shown: &[SearchResult],
        total: usize,
        query: &str,
        tier: ContentTier,
        cap: Option<usize>,
        cache_id: Option<&str>,
    ) -> (String, bool) {
        let results: Vec<StructuredResult> = shown
            .iter()
            .enumerate()
            .map(|(index, r)| structured_result(index, r, tier, cap))
            .collect();
        let truncated = results.iter().any(|r| r.text_truncated);

        let mut response = StructuredResponse {
            metadata: StructuredMetadata {
                cache_id,
                query,
                total_results: total,
                returned_results: shown.len(),
                content_level: tier,
                token_estimate: 0,
                truncated,
                has_more: total > shown.len(),
                ttl_seconds: cache_id.map(|_| self.cache.config().ttl.as_secs()),
                message: None,
            },
            results,
        };

        let mut text = String::new();
        for _ in 0..MAX_ESTIMATE_PASSES {
            text = serde_json::to_string_pretty(&response).unwrap_or_default();
            let next = tokens::estimate(&text).estimated_tokens;
            if next == response.metadata.token_estimate {
                break;
            }
            response.metadata.token_estimate = next;
        }
        (text, truncated)
    }

    // -------------------------------------------------------------------------
    // Retrieval and errors
    // -------------------------------------------------------------------------

    /// Full-detail view of one cached result.
    pub fn render_single(
        &self,
        result: &SearchResult,
        index: usize,
        total: usize,
        cache_id: &str,
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "## Cached result {index} (result {} of {total})\n",
            index + 1
        );
        let _ = writeln!(out, "**Cache id:** `{cache_id}`\n");
        out.push_str("---\n\n");
        render_result(&mut out, index, result, ContentTier::Full, None);
        out
    }

    /// Full-detail view of a contiguous slice, `results[0]` sitting at `start`.
    pub fn render_range(
        &self,
        results: &[SearchResult],
        start: usize,
        total: usize,
        cache_id: &str,
    ) -> String {
        let mut out = String::new();
        if results.is_empty() {
            let _ = writeln!(
                out,
                "No cached results in the requested range. Cache entry `{cache_id}` holds {total} results (indices 0 to {}).",
                total.saturating_sub(1)
            );
            return out;
        }
        let _ = writeln!(
            out,
            "## Cached results {start} to {} of {total}\n",
            start + results.len() - 1
        );
        let _ = writeln!(out, "**Cache id:** `{cache_id}`\n");
        out.push_str("---\n\n");
        for (offset, result) in results.iter().enumerate() {
            render_result(&mut out, start + offset, result, ContentTier::Full, None);
        }
        out
    }

    /// Fixed-shape error payload, kept small regardless of the input size.
    pub fn render_error(&self, message: &str, query: Option<&str>, suggestions: &[&str]) -> String {
        let (message, cut) = truncate_chars(message.trim(), MAX_ERROR_MESSAGE_CHARS);
        let mut out = String::from("## Error\n\n");
        out.push_str(message);
        if cut {
            out.push_str(" [...]");
        }
        out.push_str("\n\n");
        if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
            let (query, _) = truncate_chars(query, MAX_ERROR_QUERY_CHARS);
            let _ = writeln!(out, "**Query:** \"{query}\"\n");
        }
        out.push_str("**Suggestions:**\n");
        for s in suggestions {
            let _ = writeln!(out, "- {s}");
        }
        out
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

/// Appends one result in markdown. Returns whether the body was truncated.
fn render_result(
    out: &mut String,
    index: usize,
    result: &SearchResult,
    tier: ContentTier,
    cap: Option<usize>,
) -> bool {
    let title = if result.title.trim().is_empty() {
        "(untitled)"
    } else {
        result.title.trim()
    };
    let _ = writeln!(out, "### [{index}] {title}");
    let _ = writeln!(out, "**URL:** {}", result.url);
    if let Some(date) = &result.published_date {
        let _ = writeln!(out, "**Published:** {date}");
    }
    if tier != ContentTier::Summary {
        if let Some(author) = &result.author {
            let _ = writeln!(out, "**Author:** {author}");
        }
    }
    if let Some(score) = result.score {
        let _ = writeln!(out, "**Score:** {score:.3}");
    }
    if tier == ContentTier::Full {
        let _ = writeln!(out, "**ID:** {}", result.id);
        if let Some(image) = &result.image {
            let _ = writeln!(out, "**Image:** {image}");
        }
        if let Some(favicon) = &result.favicon {
            let _ = writeln!(out, "**Favicon:** {favicon}");
        }
    }

    let (text, truncated) = match cap {
        Some(max) => truncate_chars(&result.text, max),
        None => (result.text.as_str(), false),
    };
    if !text.is_empty() {
        out.push('\n');
        out.push_str(text);
        if truncated {
            out.push_str(" [...]");
        }
        out.push('\n');
    }
    out.push_str("\n---\n\n");
    truncated
}

fn structured_result<'a>(
    index: usize,
    result: &'a SearchResult,
    tier: ContentTier,
    cap: Option<usize>,
) -> StructuredResult<'a> {
    let (text, text_truncated) = match cap {
        Some(max) => truncate_chars(&result.text, max),
        None => (result.text.as_str(), false),
    };
    let full = tier == ContentTier::Full;
    StructuredResult {
        index,
        id: full.then_some(result.id.as_str()),
        title: &result.title,
        url: &result.url,
        published_date: result.published_date.as_deref(),
        author: if tier == ContentTier::Summary {
            None
        } else {
            result.author.as_deref()
        },
        score: result.score,
        text,
        text_truncated,
        image: if full { result.image.as_deref() } else { None },
        favicon: if full { result.favicon.as_deref() } else { None },
    }
}

#[test]
fn test_chars_per_result_budget() {
    // (20000 - 1000) / 10 * 4 = 7600, clamped
    assert_eq!(chars_per_result(20_000, 10), 5_000);
    // (5000 - 1000) / 5 * 4 = 3200
    assert_eq!(chars_per_result(5_000, 5), 3_200);
    // (3000 - 1000) / 7 * 4 = 1142.86
    assert_eq!(chars_per_result(3_000, 7), 1_142);
    assert_eq!(chars_per_result(1_500, 50), 500);
    assert_eq!(chars_per_result(500, 3), 500);
    assert_eq!(chars_per_result(20_000, 0), 5_000);
}

#[test]
fn test_chars_per_result_shrinks_with_count() {
    let mut last = usize::MAX;
    for n in 1..=40 {
        let c = chars_per_result(10_000, n);
        assert!(c <= last);
        last = c;
    }
}

#[test]
fn test_truncate_chars_respects_char_boundaries() {
    assert_eq!(truncate_chars("hello", 10), ("hello", false));
    assert_eq!(truncate_chars("hello", 5), ("hello", false));
    assert_eq!(truncate_chars("hello", 2), ("he", true));
    assert_eq!(truncate_chars("日本語テキスト", 3), ("日本語", true));
    assert_eq!(truncate_chars("", 0), ("", false));
}
