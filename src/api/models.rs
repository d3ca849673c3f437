use serde::{Deserialize, Serialize};

use crate::adapter::SearchParams;

fn default_profile() -> String {
    crate::profiles::WEB.tool_name.to_string()
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Tool name of the domain profile, e.g. `github_search_exa`.
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(flatten)]
    pub params: SearchParams,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub start: i64,
    pub end: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProfileInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub category: Option<&'static str>,
    pub include_domains: &'static [&'static str],
    pub default_content_level: &'static str,
}
