use anyhow::Result;
use std::sync::Arc;

use exa_lens::adapter::{
    AdapterSettings, CrawlParams, DEFAULT_DETAILED_RESULTS, DEFAULT_SUMMARY_RESULTS,
    FULL_TIER_MAX_CHARACTERS, MAX_RESULTS, RetrieveParams, SearchAdapter, SearchParams,
    ToolErrorKind,
};
use exa_lens::cache::{CacheConfig, ResultCache};
use exa_lens::data_models::{ContentTier, LiveCrawl, OutputFormat, SearchResult};
use exa_lens::profiles;

mod test_helpers {
    use super::*;
    use async_trait::async_trait;
    use exa_lens::exa::{ContentsRequest, ExaError, SearchProvider, SearchRequest, SearchResponse};
    use std::sync::Mutex;

    pub fn create_result(n: usize) -> SearchResult {
        SearchResult {
            id: format!("https://example.com/{n}"),
            title: format!("Result {n}"),
            url: format!("https://example.com/{n}"),
            published_date: None,
            author: Some(format!("Author {n}")),
            text: format!("Paragraph {n}. ").repeat(300),
            score: Some(0.9),
            image: None,
            favicon: None,
        }
    }

    /// Canned provider that records what it was asked.
    pub struct MockProvider {
        results: Vec<SearchResult>,
        fail: bool,
        pub searches: Mutex<Vec<SearchRequest>>,
        pub crawls: Mutex<Vec<ContentsRequest>>,
    }

    impl MockProvider {
        pub fn with_results(count: usize) -> Self {
            Self {
                results: (0..count).map(create_result).collect(),
                fail: false,
                searches: Mutex::new(Vec::new()),
                crawls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::with_results(0)
            }
        }

        pub fn last_search(&self) -> SearchRequest {
            self.searches.lock().unwrap().last().cloned().expect("no search recorded")
        }

        pub fn search_count(&self) -> usize {
            self.searches.lock().unwrap().len()
        }

        fn respond(&self, limit: usize) -> Result<SearchResponse, ExaError> {
            if self.fail {
                return Err(ExaError::Status {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    body: "upstream unavailable".to_string(),
                });
            }
            Ok(SearchResponse {
                request_id: Some("req-1".to_string()),
                resolved_search_type: Some("neural".to_string()),
                autoprompt_string: None,
                results: self.results.iter().take(limit).cloned().collect(),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for MockProvider {
        async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ExaError> {
            self.searches.lock().unwrap().push(request.clone());
            self.respond(request.num_results)
        }

        async fn contents(&self, request: &ContentsRequest) -> Result<SearchResponse, ExaError> {
            self.crawls.lock().unwrap().push(request.clone());
            self.respond(1)
        }
    }

    pub fn create_adapter(provider: Arc<MockProvider>) -> SearchAdapter {
        let cache = Arc::new(ResultCache::in_memory(CacheConfig::default()));
        SearchAdapter::new(provider, cache, AdapterSettings::default())
    }

    pub fn query(q: &str) -> SearchParams {
        SearchParams {
            query: q.to_string(),
            ..SearchParams::default()
        }
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_search_then_retrieve_every_index() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(10));
    let adapter = create_adapter(provider.clone());

    let response = adapter
        .search(
            &profiles::WEB,
            SearchParams {
                num_results: Some(10),
                ..query("rust async")
            },
        )
        .await;
    assert!(!response.is_error, "{}", response.text);
    let cache_id = response.cache_id.clone().expect("cache id");

    for index in 0..10usize {
        let detail = adapter.retrieve(&cache_id, index as i64).await;
        assert!(!detail.is_error, "{}", detail.text);
        let expected = create_result(index);
        assert!(detail.text.contains(&expected.title));
        // full detail carries the whole body, not the summary preview
        assert!(detail.text.contains(&expected.text));
    }

    // retrieval never goes back upstream
    assert_eq!(provider.search_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_search_defaults_by_tier() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(20));
    let adapter = create_adapter(provider.clone());

    adapter.search(&profiles::WEB, query("rust")).await;
    assert_eq!(provider.last_search().num_results, DEFAULT_SUMMARY_RESULTS);

    adapter
        .search(
            &profiles::WEB,
            SearchParams {
                content_level: Some(ContentTier::Standard),
                ..query("rust")
            },
        )
        .await;
    assert_eq!(provider.last_search().num_results, DEFAULT_DETAILED_RESULTS);

    adapter
        .search(
            &profiles::WEB,
            SearchParams {
                content_level: Some(ContentTier::Full),
                ..query("rust")
            },
        )
        .await;
    let request = provider.last_search();
    assert_eq!(request.num_results, DEFAULT_DETAILED_RESULTS);
    assert_eq!(request.contents.text.max_characters, FULL_TIER_MAX_CHARACTERS);
    assert_eq!(request.contents.livecrawl, LiveCrawl::Fallback);
    Ok(())
}

#[tokio::test]
async fn test_num_results_is_clamped() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(5));
    let adapter = create_adapter(provider.clone());

    adapter
        .search(
            &profiles::WEB,
            SearchParams {
                num_results: Some(500),
                ..query("rust")
            },
        )
        .await;
    assert_eq!(provider.last_search().num_results, MAX_RESULTS);

    adapter
        .search(
            &profiles::WEB,
            SearchParams {
                num_results: Some(0),
                ..query("rust")
            },
        )
        .await;
    assert_eq!(provider.last_search().num_results, 1);
    Ok(())
}

#[tokio::test]
async fn test_profile_shapes_request() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(1));
    let adapter = create_adapter(provider.clone());

    adapter.search(&profiles::GITHUB, query("tokio")).await;
    let request = provider.last_search();
    assert_eq!(request.include_domains, vec!["github.com".to_string()]);
    assert_eq!(request.query, "tokio");

    adapter.search(&profiles::COMPETITOR, query("Acme")).await;
    let request = provider.last_search();
    assert_eq!(request.query, "competitors of Acme");
    assert_eq!(request.category.as_deref(), Some("company"));
    Ok(())
}

#[tokio::test]
async fn test_empty_query_is_rejected_without_upstream_call() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(3));
    let adapter = create_adapter(provider.clone());

    let response = adapter.search(&profiles::WEB, query("   ")).await;
    assert!(response.is_error);
    assert_eq!(response.error_kind, Some(ToolErrorKind::InvalidRequest));
    assert_eq!(provider.search_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_upstream_failure_is_well_formed() -> Result<()> {
    let provider = Arc::new(MockProvider::failing());
    let adapter = create_adapter(provider.clone());

    let response = adapter.search(&profiles::WEB, query("rust")).await;
    assert!(response.is_error);
    assert_eq!(response.error_kind, Some(ToolErrorKind::Upstream));
    assert!(response.text.starts_with("## Error"));
    assert!(response.text.contains("**Query:** \"rust\""));
    assert!(response.cache_id.is_none());
    assert_eq!(adapter.cache().entry_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_no_results_is_not_an_error() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(0));
    let adapter = create_adapter(provider);

    let response = adapter.search(&profiles::WEB, query("nothing")).await;
    assert!(!response.is_error);
    assert_eq!(response.text, exa_lens::formatter::NO_RESULTS_MESSAGE);
    assert!(response.cache_id.is_none());
    Ok(())
}

#[tokio::test]
async fn test_json_output_carries_cache_id() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(3));
    let adapter = create_adapter(provider);

    let response = adapter
        .search(
            &profiles::WEB,
            SearchParams {
                output_format: Some(OutputFormat::Json),
                ..query("rust")
            },
        )
        .await;
    let value: serde_json::Value = serde_json::from_str(&response.text)?;
    assert_eq!(
        value["metadata"]["cacheId"],
        response.cache_id.clone().unwrap_or_default()
    );
    assert_eq!(value["results"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn test_retrieve_rejects_path_traversal() -> Result<()> {
    let adapter = create_adapter(Arc::new(MockProvider::with_results(1)));

    let response = adapter.retrieve("../../etc/passwd", 0).await;
    assert!(response.is_error);
    assert_eq!(response.error_kind, Some(ToolErrorKind::InvalidIdentifier));
    Ok(())
}

#[tokio::test]
async fn test_retrieve_unknown_id_is_not_found() -> Result<()> {
    let adapter = create_adapter(Arc::new(MockProvider::with_results(1)));

    let response = adapter.retrieve("exa-1700000000000-abc1234", 0).await;
    assert!(response.is_error);
    assert_eq!(response.error_kind, Some(ToolErrorKind::NotFound));
    assert!(response.text.contains("expire"));
    Ok(())
}

#[tokio::test]
async fn test_retrieve_out_of_range_names_valid_range() -> Result<()> {
    let adapter = create_adapter(Arc::new(MockProvider::with_results(5)));
    let response = adapter.search(&profiles::WEB, query("rust")).await;
    let cache_id = response.cache_id.expect("cache id");

    let response = adapter.retrieve(&cache_id, 5).await;
    assert!(response.is_error);
    assert_eq!(response.error_kind, Some(ToolErrorKind::IndexOutOfRange));
    assert!(response.text.contains("0 to 4"));
    Ok(())
}

#[tokio::test]
async fn test_retrieve_range_via_end_index() -> Result<()> {
    let adapter = create_adapter(Arc::new(MockProvider::with_results(5)));
    let response = adapter.search(&profiles::WEB, query("rust")).await;
    let cache_id = response.cache_id.expect("cache id");

    let response = adapter
        .retrieve_with(RetrieveParams {
            cache_id: cache_id.clone(),
            index: 3,
            end_index: Some(99),
        })
        .await;
    assert!(!response.is_error);
    assert!(response.text.contains("### [3] Result 3"));
    assert!(response.text.contains("### [4] Result 4"));
    assert!(!response.text.contains("### [2]"));
    Ok(())
}

#[tokio::test]
async fn test_crawl_validates_url() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(1));
    let adapter = create_adapter(provider.clone());

    for bad in ["", "not a url", "ftp://example.com/file"] {
        let response = adapter
            .crawl(CrawlParams {
                url: bad.to_string(),
                ..CrawlParams::default()
            })
            .await;
        assert!(response.is_error, "{bad:?}");
        assert_eq!(response.error_kind, Some(ToolErrorKind::InvalidRequest));
    }
    assert!(provider.crawls.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_crawl_defaults_to_full_and_caches() -> Result<()> {
    let provider = Arc::new(MockProvider::with_results(1));
    let adapter = create_adapter(provider.clone());

    let response = adapter
        .crawl(CrawlParams {
            url: "https://example.com/0".to_string(),
            ..CrawlParams::default()
        })
        .await;
    assert!(!response.is_error, "{}", response.text);
    assert_eq!(
        response.metadata.as_ref().map(|m| m.content_level),
        Some(ContentTier::Full)
    );

    let request = provider.crawls.lock().unwrap()[0].clone();
    assert_eq!(request.ids, vec!["https://example.com/0".to_string()]);
    assert_eq!(request.text.max_characters, FULL_TIER_MAX_CHARACTERS);

    let cache_id = response.cache_id.expect("cache id");
    assert!(!adapter.retrieve(&cache_id, 0).await.is_error);
    Ok(())
}

#[tokio::test]
async fn test_negative_index_states_valid_range() -> Result<()> {
    let adapter = create_adapter(Arc::new(MockProvider::with_results(5)));
    let response = adapter.search(&profiles::WEB, query("rust")).await;
    let cache_id = response.cache_id.expect("cache id");

    let params: RetrieveParams = serde_json::from_value(serde_json::json!({
        "cacheId": cache_id,
        "index": -1
    }))?;
    let response = adapter.retrieve_with(params).await;
    assert!(response.is_error);
    assert_eq!(response.error_kind, Some(ToolErrorKind::IndexOutOfRange));
    assert!(response.text.contains("index -1"));
    assert!(response.text.contains("0 to 4"));
    Ok(())
}

#[tokio::test]
async fn test_negative_range_start_clamps_to_zero() -> Result<()> {
    let adapter = create_adapter(Arc::new(MockProvider::with_results(5)));
    let response = adapter.search(&profiles::WEB, query("rust")).await;
    let cache_id = response.cache_id.expect("cache id");

    let response = adapter
        .retrieve_with(RetrieveParams {
            cache_id: cache_id.clone(),
            index: -3,
            end_index: Some(2),
        })
        .await;
    assert!(!response.is_error, "{}", response.text);
    assert!(response.text.contains("### [0] Result 0"));
    assert!(response.text.contains("### [1] Result 1"));
    assert!(!response.text.contains("### [2]"));

    // a negative end yields an empty slice, not an error
    let response = adapter.retrieve_range(&cache_id, 0, -1).await;
    assert!(!response.is_error);
    assert!(response.text.contains("0 to 4"));
    Ok(())
}

#[tokio::test]
async fn test_cache_id_is_validated_as_received() -> Result<()> {
    let adapter = create_adapter(Arc::new(MockProvider::with_results(2)));
    let response = adapter.search(&profiles::WEB, query("rust")).await;
    let cache_id = response.cache_id.expect("cache id");

    for padded in [format!(" {cache_id}"), format!("{cache_id}\n")] {
        let response = adapter
            .retrieve_with(RetrieveParams {
                cache_id: padded,
                index: 0,
                end_index: None,
            })
            .await;
        assert_eq!(response.error_kind, Some(ToolErrorKind::InvalidIdentifier));
    }
    Ok(())
}
