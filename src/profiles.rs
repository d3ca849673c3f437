//! Search domains exposed as separate tools.
//!
//! Every domain goes through the same adapter; a profile only decides how the
//! upstream request is shaped.

use crate::data_models::ContentTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Auto,
    Neural,
    Keyword,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Auto => "auto",
            SearchMode::Neural => "neural",
            SearchMode::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomainProfile {
    pub tool_name: &'static str,
    pub description: &'static str,
    pub mode: SearchMode,
    pub category: Option<&'static str>,
    pub include_domains: &'static [&'static str],
    pub exclude_domains: &'static [&'static str],
    /// `{query}` is replaced with the caller's query.
    pub query_template: &'static str,
    pub default_tier: ContentTier,
}

impl DomainProfile {
    pub fn build_query(&self, query: &str) -> String {
        self.query_template.replace("{query}", query.trim())
    }
}

pub const WEB: DomainProfile = DomainProfile {
    tool_name: "web_search_exa",
    description: "Search the web. Returns ranked pages at the requested contentLevel (summary, standard, full) plus a cacheId for follow-up retrieval.",
    mode: SearchMode::Auto,
    category: None,
    include_domains: &[],
    exclude_domains: &[],
    query_template: "{query}",
    default_tier: ContentTier::Summary,
};

pub const RESEARCH_PAPER: DomainProfile = DomainProfile {
    tool_name: "research_paper_search_exa",
    description: "Search academic papers and research publications. Supports contentLevel and a cacheId for follow-up retrieval.",
    mode: SearchMode::Auto,
    category: Some("research paper"),
    include_domains: &[],
    exclude_domains: &[],
    query_template: "{query}",
    default_tier: ContentTier::Summary,
};

pub const COMPANY: DomainProfile = DomainProfile {
    tool_name: "company_research_exa",
    description: "Research a company by name or website: official pages, news and business information.",
    mode: SearchMode::Auto,
    category: Some("company"),
    include_domains: &[],
    exclude_domains: &[],
    query_template: "{query} company",
    default_tier: ContentTier::Summary,
};

pub const COMPETITOR: DomainProfile = DomainProfile {
    tool_name: "competitor_finder_exa",
    description: "Find competitors of a company or product. Pass the company or product name as the query.",
    mode: SearchMode::Auto,
    category: Some("company"),
    include_domains: &[],
    exclude_domains: &[],
    query_template: "competitors of {query}",
    default_tier: ContentTier::Summary,
};

pub const LINKEDIN: DomainProfile = DomainProfile {
    tool_name: "linkedin_search_exa",
    description: "Search LinkedIn profiles and company pages.",
    mode: SearchMode::Auto,
    category: None,
    include_domains: &["linkedin.com"],
    exclude_domains: &[],
    query_template: "{query}",
    default_tier: ContentTier::Summary,
};

pub const WIKIPEDIA: DomainProfile = DomainProfile {
    tool_name: "wikipedia_search_exa",
    description: "Search Wikipedia articles.",
    mode: SearchMode::Auto,
    category: None,
    include_domains: &["wikipedia.org"],
    exclude_domains: &[],
    query_template: "{query}",
    default_tier: ContentTier::Summary,
};

pub const GITHUB: DomainProfile = DomainProfile {
    tool_name: "github_search_exa",
    description: "Search GitHub repositories, issues and code.",
    mode: SearchMode::Auto,
    category: None,
    include_domains: &["github.com"],
    exclude_domains: &[],
    query_template: "{query}",
    default_tier: ContentTier::Summary,
};

pub const ALL: [&DomainProfile; 7] = [
    &WEB,
    &RESEARCH_PAPER,
    &COMPANY,
    &COMPETITOR,
    &LINKEDIN,
    &WIKIPEDIA,
    &GITHUB,
];

pub fn by_name(tool_name: &str) -> Option<&'static DomainProfile> {
    ALL.into_iter().find(|p| p.tool_name == tool_name)
}

#[test]
fn test_build_query() {
    assert_eq!(WEB.build_query("  rust  "), "rust");
    assert_eq!(COMPANY.build_query("Acme"), "Acme company");
    assert_eq!(COMPETITOR.build_query("Acme"), "competitors of Acme");
}

#[test]
fn test_by_name() {
    assert_eq!(by_name("github_search_exa"), Some(&GITHUB));
    assert_eq!(by_name("nope"), None);

    let mut names: Vec<_> = ALL.iter().map(|p| p.tool_name).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), ALL.len());
}
