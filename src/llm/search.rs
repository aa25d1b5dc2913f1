//! Web search for the company-research stage.
//!
//! Uses the Serper Google Search API (`POST {search_url}/search` with an
//! `X-API-KEY` header).  Search is optional: without `search_api_key` the
//! research call relies on what the model already knows.

use serde::Deserialize;

use crate::config::LlmConfig;
use crate::llm::client::PipelineError;
use crate::session::Difficulty;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Deserialize)]
struct SerperReply {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

/// Query sent for the opening question of an interview.
pub fn research_query(company_name: &str, role: &str, difficulty: Difficulty) -> String {
    format!("{company_name} {role} {difficulty} technical interview questions process tech stack")
}

/// Serper search client.
#[derive(Debug, Clone)]
pub struct WebSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
}

impl WebSearch {
    /// Build from config.  `None` when no search key is configured.
    pub fn from_config(config: &LlmConfig, client: reqwest::Client) -> Option<Self> {
        let api_key = config.search_api_key.as_deref()?.trim();
        if api_key.is_empty() {
            return None;
        }
        Some(Self {
            client,
            endpoint: format!("{}/search", config.search_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            max_results: config.search_results.max(1),
        })
    }

    /// Run `query` and return at most `search_results` non-empty hits.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, PipelineError> {
        let body = serde_json::json!({ "q": query, "num": self.max_results });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineError::Status {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let reply: SerperReply = response
            .json()
            .await
            .map_err(|e| PipelineError::Malformed(e.to_string()))?;

        Ok(reply
            .organic
            .into_iter()
            .filter(|hit| !hit.snippet.trim().is_empty() || !hit.title.trim().is_empty())
            .take(self.max_results)
            .collect())
    }
}
