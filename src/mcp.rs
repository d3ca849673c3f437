//! MCP tool surface over [`SearchAdapter`].
//!
//! One tool per domain profile plus crawl and cache retrieval. The handlers
//! are thin: all parameter defaults, budgeting and error shaping happen in
//! the adapter.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::adapter::{CrawlParams, RetrieveParams, SearchAdapter, SearchParams, ToolResponse};
use crate::profiles::{self, DomainProfile};

const INSTRUCTIONS: &str = "Search tools with progressive disclosure. Start with contentLevel \
`summary` for a cheap overview; every response carries a cacheId. Call `get_cached_result` \
with that cacheId and a result index for full detail instead of searching again. Cached \
results expire after a few minutes.";

pub fn into_call_result(response: ToolResponse) -> CallToolResult {
    let content = vec![Content::text(response.text)];
    if response.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

#[derive(Clone)]
pub struct ExaLensServer {
    adapter: Arc<SearchAdapter>,
    tool_router: ToolRouter<Self>,
}

impl ExaLensServer {
    pub fn new(adapter: Arc<SearchAdapter>) -> Self {
        Self {
            adapter,
            tool_router: Self::tool_router(),
        }
    }

    async fn run_search(&self, profile: &DomainProfile, params: SearchParams) -> CallToolResult {
        into_call_result(self.adapter.search(profile, params).await)
    }
}

#[tool_router]
impl ExaLensServer {
    #[tool(
        name = "web_search_exa",
        description = "Search the web. Returns ranked pages at the requested contentLevel (summary, standard, full) plus a cacheId for follow-up retrieval."
    )]
    async fn web_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_search(&profiles::WEB, params).await)
    }

    #[tool(
        name = "research_paper_search_exa",
        description = "Search academic papers and research publications. Supports contentLevel and a cacheId for follow-up retrieval."
    )]
    async fn research_paper_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_search(&profiles::RESEARCH_PAPER, params).await)
    }

    #[tool(
        name = "company_research_exa",
        description = "Research a company by name or website: official pages, news and business information."
    )]
    async fn company_research(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_search(&profiles::COMPANY, params).await)
    }

    #[tool(
        name = "competitor_finder_exa",
        description = "Find competitors of a company or product. Pass the company or product name as the query."
    )]
    async fn competitor_finder(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_search(&profiles::COMPETITOR, params).await)
    }

    #[tool(
        name = "linkedin_search_exa",
        description = "Search LinkedIn profiles and company pages."
    )]
    async fn linkedin_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_search(&profiles::LINKEDIN, params).await)
    }

    #[tool(name = "wikipedia_search_exa", description = "Search Wikipedia articles.")]
    async fn wikipedia_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_search(&profiles::WIKIPEDIA, params).await)
    }

    #[tool(
        name = "github_search_exa",
        description = "Search GitHub repositories, issues and code."
    )]
    async fn github_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_search(&profiles::GITHUB, params).await)
    }

    #[tool(
        name = "crawling_exa",
        description = "Fetch the content of one URL. Defaults to contentLevel full; the result is cached like a search."
    )]
    async fn crawling(
        &self,
        Parameters(params): Parameters<CrawlParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(self.adapter.crawl(params).await))
    }

    #[tool(
        name = "get_cached_result",
        description = "Return full detail for a result from an earlier search, by cacheId and zero-based index. Pass endIndex to get a range. Does not query the search provider."
    )]
    async fn get_cached_result(
        &self,
        Parameters(params): Parameters<RetrieveParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(self.adapter.retrieve_with(params).await))
    }
}

#[tool_handler]
impl ServerHandler for ExaLensServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(is_error: bool) -> ToolResponse {
        ToolResponse {
            text: "body".to_string(),
            is_error,
            error_kind: None,
            metadata: None,
            cache_id: None,
        }
    }

    #[test]
    fn test_error_flag_carries_over() {
        assert_eq!(into_call_result(response(true)).is_error, Some(true));
        assert_eq!(into_call_result(response(false)).is_error, Some(false));
    }

    // the macro takes literals, so keep them in step with the profile table
    #[test]
    fn test_tool_descriptions_match_profiles() {
        let tools = ExaLensServer::tool_router().list_all();
        for profile in profiles::ALL {
            let tool = tools
                .iter()
                .find(|t| t.name == profile.tool_name)
                .unwrap_or_else(|| panic!("no tool named {}", profile.tool_name));
            assert_eq!(tool.description.as_deref(), Some(profile.description));
        }
        assert_eq!(tools.len(), profiles::ALL.len() + 2);
    }

    #[test]
    fn test_single_text_block() {
        let result = into_call_result(response(false));
        assert_eq!(result.content.len(), 1);
    }
}
