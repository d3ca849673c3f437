use anyhow::Result;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use exa_lens::data_models::LiveCrawl;
use exa_lens::exa::{
    ContentsOptions, ContentsRequest, ExaClient, ExaError, SearchProvider, SearchRequest,
    TextOptions,
};

mod test_helpers {
    use super::*;

    pub fn create_client(server: &MockServer) -> Result<ExaClient> {
        Ok(ExaClient::new(
            "test-key",
            server.uri(),
            Duration::from_secs(5),
        )?)
    }

    pub fn search_request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            search_type: "auto".to_string(),
            num_results: 2,
            category: Some("research paper".to_string()),
            include_domains: vec![],
            exclude_domains: vec![],
            contents: ContentsOptions {
                text: TextOptions {
                    max_characters: 1_000,
                },
                livecrawl: LiveCrawl::Fallback,
            },
        }
    }

    pub fn search_body() -> serde_json::Value {
        json!({
            "requestId": "req-42",
            "resolvedSearchType": "neural",
            "results": [
                {
                    "id": "https://example.com/a",
                    "title": "A",
                    "url": "https://example.com/a",
                    "publishedDate": "2024-01-02",
                    "author": null,
                    "text": "alpha",
                    "score": 0.91
                },
                {
                    "id": "https://example.com/b",
                    "title": null,
                    "url": "https://example.com/b",
                    "text": null
                }
            ]
        })
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_search_sends_key_and_parses_results() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({
            "query": "transformers",
            "type": "auto",
            "numResults": 2,
            "category": "research paper",
            "contents": { "text": { "maxCharacters": 1000 }, "livecrawl": "fallback" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server)?;
    let response = client.search(&search_request("transformers")).await?;
    let (results, metadata) = response.into_parts();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "A");
    assert_eq!(results[0].score, Some(0.91));
    assert_eq!(results[1].title, "");
    assert_eq!(results[1].text, "");
    assert_eq!(metadata.request_id.as_deref(), Some("req-42"));
    assert_eq!(metadata.resolved_search_type.as_deref(), Some("neural"));
    Ok(())
}

#[tokio::test]
async fn test_error_status_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = create_client(&server)?;
    let err = client.search(&search_request("q")).await.unwrap_err();
    match err {
        ExaError::Status { status, body } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_long_error_body_is_truncated() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>".repeat(1_000)))
        .mount(&server)
        .await;

    let client = create_client(&server)?;
    let err = client.search(&search_request("q")).await.unwrap_err();
    assert!(err.to_string().chars().count() < 600);
    Ok(())
}

#[tokio::test]
async fn test_contents_endpoint() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contents"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({
            "ids": ["https://example.com/a"],
            "livecrawl": "always"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "https://example.com/a",
                "title": "A",
                "url": "https://example.com/a",
                "text": "page body"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server)?;
    let response = client
        .contents(&ContentsRequest {
            ids: vec!["https://example.com/a".to_string()],
            text: TextOptions {
                max_characters: 20_000,
            },
            livecrawl: LiveCrawl::Always,
        })
        .await?;

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].text, "page body");
    Ok(())
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ExaClient::new(
        "test-key",
        format!("{}/", server.uri()),
        Duration::from_secs(5),
    )?;
    let response = client.search(&search_request("q")).await?;
    assert!(response.results.is_empty());
    Ok(())
}
