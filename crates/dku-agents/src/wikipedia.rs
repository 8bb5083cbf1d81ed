//! Wikipedia miner: REST page summary → one submission.

use std::time::Duration;

use dku_core::ProducerInput;
use serde_json::Value;

use crate::{fetch_text, http_client, Producer, ProducerError};

pub const WIKIPEDIA_SUMMARY_API: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";
const AGENT: &str = "miner";
/// Article mined when the caller has no preference.
pub const DEFAULT_ARTICLE: &str = "Quantum_entanglement";

pub struct WikipediaMiner {
    client: reqwest::Client,
    api_base: String,
    article: String,
}

impl WikipediaMiner {
    pub fn new(article: impl Into<String>, timeout: Duration) -> Result<Self, ProducerError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_base: WIKIPEDIA_SUMMARY_API.to_string(),
            article: article.into(),
        })
    }

    /// Points the miner at another summary endpoint (mirror or other language).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn article(&self) -> &str {
        &self.article
    }

    fn summary_url(&self) -> String {
        format!("{}{}", self.api_base, self.article)
    }
}

#[async_trait::async_trait]
impl Producer for WikipediaMiner {
    fn name(&self) -> &str {
        AGENT
    }

    async fn produce(&self) -> Result<Option<ProducerInput>, ProducerError> {
        let url = self.summary_url();
        let body = fetch_text(&self.client, &url).await?;
        let summary: Value = serde_json::from_str(&body).map_err(|e| ProducerError::Parse {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let input = summary_to_input(&self.article, &url, &summary);
        if input.is_none() {
            tracing::info!(target: "dku::agents", article = %self.article, "no extract available");
        }
        Ok(input)
    }
}

/// Maps a summary document to a submission. `None` when there is no extract.
///
/// The desktop page URL is the source when present; otherwise `fallback_url`.
pub fn summary_to_input(article: &str, fallback_url: &str, summary: &Value) -> Option<ProducerInput> {
    let content = summary.get("extract").and_then(Value::as_str).unwrap_or("");
    if content.is_empty() {
        return None;
    }
    let source_url = summary
        .pointer("/content_urls/desktop/page")
        .and_then(Value::as_str)
        .unwrap_or(fallback_url);
    Some(ProducerInput {
        content: content.to_string(),
        tags: vec![article.to_lowercase(), "wikipedia".to_string()],
        source_url: source_url.to_string(),
        agent: AGENT.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const API: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/Rust";

    #[test]
    fn summary_maps_extract_tags_and_page_url() {
        let summary = json!({
            "title": "Rust (programming language)",
            "extract": "Rust is a general-purpose programming language.",
            "content_urls": {
                "desktop": { "page": "https://en.wikipedia.org/wiki/Rust" }
            }
        });
        let input = summary_to_input("Rust", API, &summary).unwrap();
        assert_eq!(input.content, "Rust is a general-purpose programming language.");
        assert_eq!(input.tags, vec!["rust", "wikipedia"]);
        assert_eq!(input.source_url, "https://en.wikipedia.org/wiki/Rust");
        assert_eq!(input.agent, "miner");
    }

    #[test]
    fn missing_page_url_falls_back_to_api_url() {
        let summary = json!({ "extract": "text" });
        let input = summary_to_input("Rust", API, &summary).unwrap();
        assert_eq!(input.source_url, API);
    }

    #[test]
    fn empty_or_missing_extract_yields_nothing() {
        assert!(summary_to_input("Rust", API, &json!({ "extract": "" })).is_none());
        assert!(summary_to_input("Rust", API, &json!({ "title": "Rust" })).is_none());
    }

    #[test]
    fn summary_url_joins_base_and_article() {
        let miner = WikipediaMiner::new("Quantum_entanglement", Duration::from_secs(5))
            .unwrap()
            .with_api_base("http://localhost:8080/summary/");
        assert_eq!(miner.summary_url(), "http://localhost:8080/summary/Quantum_entanglement");
        let default = WikipediaMiner::new(DEFAULT_ARTICLE, Duration::from_secs(5)).unwrap();
        assert_eq!(default.article(), "Quantum_entanglement");
        assert_eq!(
            default.summary_url(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Quantum_entanglement"
        );
    }
}
