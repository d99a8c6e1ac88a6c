//! Resource search tool — GitHub repository search plus hands-on ranking.
//!
//! Queries the repository search endpoint with the learning topic, maps the
//! raw items to candidates, scores them with the hands-on heuristic, and
//! returns the top-K. An empty result set is a valid success, not an error.
//!
//! GitHub signals search rate limiting with 403 + a "rate limit" body, not
//! only 429 — both map to the retryable class here.

use crate::scorer::{self, ScoringWeights};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use studyclaw_core::error::ToolError;
use studyclaw_core::plan::{CandidateResource, ScoredResource, SearchReport};
use studyclaw_core::tool::{Tool, ToolResult};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("studyclaw/", env!("CARGO_PKG_VERSION"));

/// How many raw candidates one search pulls before ranking.
const SEARCH_PAGE_SIZE: u8 = 30;

/// Search adapter configuration.
#[derive(Clone)]
pub struct SearchToolConfig {
    /// Optional token; unauthenticated search works at a lower rate limit.
    pub token: Option<String>,
    /// API base URL override (testing/proxies).
    pub api_url: Option<String>,
    /// How many ranked resources to return by default.
    pub top_k: usize,
    /// Scoring weights.
    pub weights: ScoringWeights,
}

impl std::fmt::Debug for SearchToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchToolConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("top_k", &self.top_k)
            .field("weights", &self.weights)
            .finish()
    }
}

/// The `search_resources` tool.
pub struct SearchTool {
    config: SearchToolConfig,
    client: reqwest::Client,
}

impl SearchTool {
    pub fn new(config: SearchToolConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    fn base_url(&self) -> &str {
        self.config.api_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Search, score, and rank resources for a topic. Shared by the tool
    /// execution path and the recommendation gateway.
    pub async fn recommend(
        &self,
        topic: &str,
        max_results: usize,
    ) -> Result<Vec<ScoredResource>, ToolError> {
        let url = format!("{}/search/repositories", self.base_url());
        let query = format!("{topic} in:name,description");
        let per_page = SEARCH_PAGE_SIZE.to_string();

        debug!(%topic, "Searching repositories");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .query(&[
                ("q", query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("token {token}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: "search_resources".into(),
                    timeout_secs: 30,
                }
            } else {
                ToolError::Network {
                    tool_name: "search_resources".into(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        match status {
            200 => {}
            401 => {
                return Err(ToolError::AuthFailed {
                    tool_name: "search_resources".into(),
                    reason: "invalid GitHub token".into(),
                });
            }
            403 | 429 => {
                let body = response.text().await.unwrap_or_default();
                if status == 429 || body.to_lowercase().contains("rate limit") {
                    return Err(ToolError::RateLimited {
                        tool_name: "search_resources".into(),
                        retry_after_secs: 60,
                    });
                }
                return Err(ToolError::AuthFailed {
                    tool_name: "search_resources".into(),
                    reason: body,
                });
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(ToolError::Upstream {
                    tool_name: "search_resources".into(),
                    status_code: status,
                    message: body,
                });
            }
        }

        let listing: SearchListing = response.json().await.map_err(|e| ToolError::Upstream {
            tool_name: "search_resources".into(),
            status_code: 200,
            message: format!("failed to parse search response: {e}"),
        })?;

        let candidates: Vec<CandidateResource> = listing
            .items
            .into_iter()
            .map(RawRepository::into_candidate)
            .collect();

        Ok(scorer::rank(
            candidates,
            &self.config.weights,
            Utc::now(),
            max_results,
        ))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search_resources"
    }

    fn description(&self) -> &str {
        "Search for hands-on learning resources (repositories with tutorials, examples, \
         and guides) for a topic, ranked by practical quality rather than raw popularity."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The learning topic, e.g. the calendar event title"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of resources to return (1-10)"
                }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let topic = arguments["topic"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("missing 'topic' argument".into()))?;

        let max_results = arguments["max_results"]
            .as_u64()
            .map(|n| n.clamp(1, 10) as usize)
            .unwrap_or(self.config.top_k);

        let resources = self.recommend(topic, max_results).await?;
        let report = SearchReport {
            topic: topic.to_string(),
            resources,
        };

        let output = if report.resources.is_empty() {
            format!("No resources found for '{topic}'.")
        } else {
            serde_json::to_string_pretty(&report).unwrap_or_default()
        };

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: Some(serde_json::to_value(&report).unwrap_or_default()),
        })
    }
}

// --- Wire format structs ---

#[derive(Debug, Deserialize)]
struct SearchListing {
    #[serde(default)]
    items: Vec<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    has_wiki: bool,
    language: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl RawRepository {
    fn into_candidate(self) -> CandidateResource {
        CandidateResource {
            id: self.full_name,
            title: self.name,
            url: self.html_url,
            description: self.description,
            stars: self.stargazers_count,
            forks: self.forks_count,
            has_wiki: self.has_wiki,
            language: self.language,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> SearchToolConfig {
        SearchToolConfig {
            token: Some("ghp_test".into()),
            api_url: Some(server.uri()),
            top_k: 5,
            weights: ScoringWeights::default(),
        }
    }

    fn repo(full_name: &str, stars: u64, description: &str) -> serde_json::Value {
        serde_json::json!({
            "full_name": full_name,
            "name": full_name.rsplit('/').next().unwrap(),
            "html_url": format!("https://github.com/{full_name}"),
            "description": description,
            "stargazers_count": stars,
            "forks_count": stars / 10,
            "has_wiki": false,
            "language": "Rust",
            "updated_at": "2025-05-20T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn searches_scores_and_ranks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "rust async in:name,description"))
            .and(query_param("sort", "stars"))
            .and(query_param("order", "desc"))
            .and(header("authorization", "token ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 3,
                "items": [
                    repo("big/plain-lib", 90_000, "A fast runtime"),
                    repo("mid/async-tutorial", 2_000, "Step-by-step async tutorial"),
                    repo("tiny/notes", 3, "Personal notes")
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = SearchTool::new(config(&server));
        let result = tool
            .execute(serde_json::json!({ "topic": "rust async" }))
            .await
            .unwrap();

        assert!(result.success);
        let report: SearchReport = serde_json::from_value(result.data.unwrap()).unwrap();
        assert_eq!(report.topic, "rust async");
        assert_eq!(report.resources.len(), 3);
        // The tutorial outranks the much more popular plain library
        assert_eq!(report.resources[0].resource.id, "mid/async-tutorial");
    }

    #[tokio::test]
    async fn empty_result_set_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 0,
                "items": []
            })))
            .mount(&server)
            .await;

        let tool = SearchTool::new(config(&server));
        let result = tool
            .execute(serde_json::json!({ "topic": "obscure topic xyz" }))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("No resources found"));
        let report: SearchReport = serde_json::from_value(result.data.unwrap()).unwrap();
        assert!(report.resources.is_empty());
    }

    #[tokio::test]
    async fn max_results_is_clamped() {
        let server = MockServer::start().await;
        let items: Vec<serde_json::Value> = (0..20)
            .map(|i| repo(&format!("u/repo{i}"), 100 + i, "example project"))
            .collect();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 20,
                "items": items
            })))
            .mount(&server)
            .await;

        let tool = SearchTool::new(config(&server));
        let result = tool
            .execute(serde_json::json!({ "topic": "rust", "max_results": 50 }))
            .await
            .unwrap();
        let report: SearchReport = serde_json::from_value(result.data.unwrap()).unwrap();
        assert_eq!(report.resources.len(), 10);
    }

    #[tokio::test]
    async fn missing_topic_rejected() {
        let server = MockServer::start().await;
        let tool = SearchTool::new(config(&server));
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn blank_topic_rejected() {
        let server = MockServer::start().await;
        let tool = SearchTool::new(config(&server));
        let err = tool
            .execute(serde_json::json!({ "topic": "   " }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn rate_limited_403_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "API rate limit exceeded for 1.2.3.4"
            })))
            .mount(&server)
            .await;

        let tool = SearchTool::new(config(&server));
        let err = tool
            .execute(serde_json::json!({ "topic": "rust" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let tool = SearchTool::new(config(&server));
        let err = tool
            .execute(serde_json::json!({ "topic": "rust" }))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_items_still_rank() {
        // Items with missing counts deserialize to zeros and rank low.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 2,
                "items": [
                    { "full_name": "u/sparse", "name": "sparse", "html_url": "https://github.com/u/sparse" },
                    repo("u/rich-examples", 500, "worked examples")
                ]
            })))
            .mount(&server)
            .await;

        let tool = SearchTool::new(config(&server));
        let result = tool
            .execute(serde_json::json!({ "topic": "rust" }))
            .await
            .unwrap();
        let report: SearchReport = serde_json::from_value(result.data.unwrap()).unwrap();
        assert_eq!(report.resources.len(), 2);
        assert_eq!(report.resources[0].resource.id, "u/rich-examples");
        assert_eq!(report.resources[1].resource.stars, 0);
    }
}
