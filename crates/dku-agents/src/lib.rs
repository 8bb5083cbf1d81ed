//! Reference producers that feed the store: fetch something, turn it into a
//! [`ProducerInput`], submit it.

mod html_page;
mod wikipedia;

pub use html_page::{html_to_input, HtmlPageProducer};
pub use wikipedia::{summary_to_input, WikipediaMiner, DEFAULT_ARTICLE, WIKIPEDIA_SUMMARY_API};

use std::time::Duration;

use dku_core::{Location, ProducerInput, Store};

/// Failure while producing input. Store failures are passed through untouched.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error(transparent)]
    Store(#[from] dku_core::DkuError),
}

/// Anything that can hand text to the store.
#[async_trait::async_trait]
pub trait Producer: Send + Sync {
    fn name(&self) -> &str;

    /// One submission, or `None` when the source had nothing usable.
    async fn produce(&self) -> Result<Option<ProducerInput>, ProducerError>;
}

/// Single produce → submit pass. Returns the published location, or `None` when the
/// producer had nothing to submit.
pub async fn run_once(
    producer: &dyn Producer,
    store: &Store,
) -> Result<Option<Location>, ProducerError> {
    let input = match producer.produce().await? {
        Some(input) => input,
        None => {
            tracing::info!(target: "dku::agents", producer = producer.name(), "nothing to submit");
            return Ok(None);
        }
    };
    let (aku, location) = store.submit(input).await?;
    tracing::info!(
        target: "dku::agents",
        producer = producer.name(),
        identity = %aku.identity(),
        location = %location,
        "AKU submitted"
    );
    Ok(Some(location))
}

/// Shortest poll period; shorter intervals (including zero) are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Repeats [`run_once`] every `interval`. Failures are logged and the loop keeps going;
/// `max_runs` bounds the number of passes (`None` runs forever).
pub async fn run_polling(
    producer: &dyn Producer,
    store: &Store,
    interval: Duration,
    max_runs: Option<usize>,
) -> Vec<Location> {
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    let mut published = Vec::new();
    let mut runs = 0usize;
    while max_runs.map_or(true, |max| runs < max) {
        ticker.tick().await;
        runs += 1;
        match run_once(producer, store).await {
            Ok(Some(location)) => published.push(location),
            Ok(None) => {}
            Err(e) => tracing::warn!(
                target: "dku::agents",
                producer = producer.name(),
                error = %e,
                "producer pass failed"
            ),
        }
    }
    published
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProducerError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("dku-agents/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GETs `url` and returns the body, mapping non-2xx to [`ProducerError::Status`].
pub(crate) async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, ProducerError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProducerError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dku_core::Codec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        content: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(content: Option<&'static str>) -> Self {
            Self {
                content,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Producer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn produce(&self) -> Result<Option<ProducerInput>, ProducerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.content.map(|c| ProducerInput {
                content: format!("{} #{}", c, n),
                tags: vec!["stub".into()],
                source_url: "https://example.org".into(),
                agent: "stub".into(),
            }))
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Producer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn produce(&self) -> Result<Option<ProducerInput>, ProducerError> {
            Err(ProducerError::Status {
                url: "https://example.org".into(),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn run_once_publishes_fetchable_unit() {
        let store = Store::in_memory(Codec::default());
        let location = run_once(&Fixed::new(Some("hello")), &store)
            .await
            .unwrap()
            .unwrap();
        let aku = store.fetch(&location).await.unwrap();
        assert_eq!(aku.decompress_content().unwrap(), "hello #0");
        assert_eq!(aku.metadata().agent, "stub");
        assert_eq!(aku.metadata().sources[0].url, "https://example.org");
    }

    #[tokio::test]
    async fn run_once_without_input_publishes_nothing() {
        let store = Store::in_memory(Codec::default());
        assert!(run_once(&Fixed::new(None), &store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn run_once_surfaces_producer_errors() {
        let store = Store::in_memory(Codec::default());
        let err = run_once(&Failing, &store).await.unwrap_err();
        assert!(matches!(err, ProducerError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn polling_stops_after_max_runs_and_survives_failures() {
        let store = Store::in_memory(Codec::default());
        let producer = Fixed::new(Some("tick"));
        let published = run_polling(&producer, &store, Duration::from_millis(1), Some(3)).await;
        assert_eq!(published.len(), 3);
        assert_eq!(producer.calls.load(Ordering::SeqCst), 3);

        let none = run_polling(&Failing, &store, Duration::from_millis(1), Some(2)).await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn zero_interval_is_clamped() {
        let store = Store::in_memory(Codec::default());
        let producer = Fixed::new(Some("fast"));
        let published = run_polling(&producer, &store, Duration::ZERO, Some(2)).await;
        assert_eq!(published.len(), 2);
    }
}
