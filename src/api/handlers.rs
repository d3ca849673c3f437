use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::Instant;

use crate::adapter::{CrawlParams, SearchAdapter, ToolErrorKind, ToolResponse};
use crate::profiles;

use super::models::{ProfileInfo, RangeQuery, SearchRequest};

fn status_for(response: &ToolResponse) -> StatusCode {
    match response.error_kind {
        None => StatusCode::OK,
        Some(ToolErrorKind::InvalidRequest)
        | Some(ToolErrorKind::InvalidIdentifier)
        | Some(ToolErrorKind::IndexOutOfRange) => StatusCode::BAD_REQUEST,
        Some(ToolErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ToolErrorKind::Upstream) => StatusCode::BAD_GATEWAY,
        Some(ToolErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply(response: ToolResponse) -> (StatusCode, Json<ToolResponse>) {
    (status_for(&response), Json(response))
}

pub async fn search_handler(
    State(adapter): State<Arc<SearchAdapter>>,
    Json(request): Json<SearchRequest>,
) -> Result<(StatusCode, Json<ToolResponse>), (StatusCode, String)> {
    let start = Instant::now();

    let profile = profiles::by_name(&request.profile).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown profile: {}", request.profile),
        )
    })?;

    let response = adapter.search(profile, request.params).await;
    tracing::debug!(
        profile = profile.tool_name,
        elapsed_ms = start.elapsed().as_millis() as u64,
        is_error = response.is_error,
        "http search handled"
    );
    Ok(reply(response))
}

pub async fn crawl_handler(
    State(adapter): State<Arc<SearchAdapter>>,
    Json(params): Json<CrawlParams>,
) -> (StatusCode, Json<ToolResponse>) {
    reply(adapter.crawl(params).await)
}

pub async fn cache_item_handler(
    State(adapter): State<Arc<SearchAdapter>>,
    Path((cache_id, index)): Path<(String, i64)>,
) -> (StatusCode, Json<ToolResponse>) {
    reply(adapter.retrieve(&cache_id, index).await)
}

pub async fn cache_range_handler(
    State(adapter): State<Arc<SearchAdapter>>,
    Path(cache_id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> (StatusCode, Json<ToolResponse>) {
    let end = range.end.unwrap_or(i64::MAX);
    reply(adapter.retrieve_range(&cache_id, range.start, end).await)
}

pub async fn profiles_handler() -> Json<Vec<ProfileInfo>> {
    let profiles = profiles::ALL
        .iter()
        .map(|p| ProfileInfo {
            name: p.tool_name,
            description: p.description,
            category: p.category,
            include_domains: p.include_domains,
            default_content_level: p.default_tier.as_str(),
        })
        .collect();
    Json(profiles)
}
