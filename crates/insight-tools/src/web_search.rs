use async_trait::async_trait;
use insight_core::{InsightError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use tracing::debug;

use crate::Tool;

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// The Custom Search API caps a single page at 10 results.
const MAX_RESULTS_PER_QUERY: usize = 10;

/// Web search backed by the Google Custom Search JSON API.
///
/// Credentials come from the `GOOGLE_API_KEY` and `GOOGLE_CSE_ID` environment
/// variables at call time; they are never baked into the tool or its schema.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    http: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            max_results: 5,
        }
    }

    /// Default result count when the caller does not pass `max_results`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS_PER_QUERY);
        self
    }

    fn credentials(&self) -> Result<(String, String)> {
        let api_key = env::var("GOOGLE_API_KEY").map_err(|_| {
            InsightError::tool(self.name(), "GOOGLE_API_KEY environment variable is not set")
        })?;
        let cse_id = env::var("GOOGLE_CSE_ID").map_err(|_| {
            InsightError::tool(self.name(), "GOOGLE_CSE_ID environment variable is not set")
        })?;
        Ok((api_key, cse_id))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return titles, links, and snippets for the top results"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5, max: 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let args: WebSearchArgs = serde_json::from_value(args).map_err(|e| {
            InsightError::tool(self.name(), format!("Invalid arguments: {e}"))
        })?;

        if args.query.trim().is_empty() {
            return Err(InsightError::tool(self.name(), "Query cannot be empty"));
        }

        let (api_key, cse_id) = self.credentials()?;
        let num = args
            .max_results
            .unwrap_or(self.max_results)
            .clamp(1, MAX_RESULTS_PER_QUERY)
            .to_string();

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("key", api_key.as_str()),
                ("cx", cse_id.as_str()),
                ("q", args.query.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| InsightError::tool(self.name(), format!("Search request failed: {e}")))?
            .error_for_status()
            .map_err(|e| InsightError::tool(self.name(), format!("Search API error: {e}")))?;

        let results: SearchResponse = response.json().await.map_err(|e| {
            InsightError::tool(self.name(), format!("Invalid search response: {e}"))
        })?;

        debug!("Web search for '{}' returned {} items", args.query, results.items.len());

        Ok(json!({
            "query": args.query,
            "count": results.items.len(),
            "results": results.items,
        }))
    }
}
