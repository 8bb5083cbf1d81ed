//! Generic web page producer: `<title>` plus paragraph text.

use std::time::Duration;

use dku_core::ProducerInput;
use scraper::{Html, Selector};

use crate::{fetch_text, http_client, Producer, ProducerError};

const AGENT: &str = "scraper";

pub struct HtmlPageProducer {
    client: reqwest::Client,
    url: String,
}

impl HtmlPageProducer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProducerError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Producer for HtmlPageProducer {
    fn name(&self) -> &str {
        AGENT
    }

    async fn produce(&self) -> Result<Option<ProducerInput>, ProducerError> {
        let html = fetch_text(&self.client, &self.url).await?;
        html_to_input(&self.url, &html)
    }
}

/// Extracts paragraph text from `html`, joined by blank lines. `None` when the page
/// has no non-empty paragraphs.
pub fn html_to_input(url: &str, html: &str) -> Result<Option<ProducerInput>, ProducerError> {
    let document = Html::parse_document(html);
    let title_sel = selector("title", url)?;
    let para_sel = selector("p", url)?;

    let title = document
        .select(&title_sel)
        .next()
        .map(|t| collapse(&t.text().collect::<String>()))
        .unwrap_or_default();

    let paragraphs: Vec<String> = document
        .select(&para_sel)
        .map(|p| collapse(&p.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.is_empty() {
        return Ok(None);
    }

    let mut tags = Vec::with_capacity(2);
    if !title.is_empty() {
        tags.push(title.to_lowercase());
    }
    tags.push("web".to_string());

    Ok(Some(ProducerInput {
        content: paragraphs.join("\n\n"),
        tags,
        source_url: url.to_string(),
        agent: AGENT.to_string(),
    }))
}

fn selector(css: &str, url: &str) -> Result<Selector, ProducerError> {
    Selector::parse(css).map_err(|e| ProducerError::Parse {
        url: url.to_string(),
        reason: format!("selector {}: {:?}", css, e),
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
