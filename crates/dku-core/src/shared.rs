//! Shared types: producer submissions and store configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{IpfsBackend, LocalBackend};
use crate::error::{DkuError, Result};
use crate::store::Store;
use crate::unit::Codec;

/// Default agent id when a producer does not name itself.
pub const DEFAULT_AGENT_ID: &str = "default";

/// What a producer hands to the core. `source_url` and `agent` are stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerInput {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default = "default_agent")]
    pub agent: String,
}

fn default_agent() -> String {
    DEFAULT_AGENT_ID.to_string()
}

/// Which backend adapter [`DkuConfig::open_store`] wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    /// Sled database under `storage_path`.
    Local,
    /// IPFS HTTP API for blobs; lineage heads in sled under `storage_path`.
    Ipfs,
}

/// Store configuration. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkuConfig {
    pub backend: BackendKind,
    /// Base directory for sled databases.
    pub storage_path: String,
    pub ipfs_api_url: String,
    /// Per-request timeout for network backends.
    pub request_timeout_secs: u64,
    /// zstd level; pinned so identical text yields identical identities.
    pub compression_level: i32,
}

impl DkuConfig {
    /// Load config from file and environment. Precedence: env `DKU__*` > file at
    /// `DKU_CONFIG` (default `config/dku.toml`) > defaults.
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("DKU_CONFIG").unwrap_or_else(|_| "config/dku.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Same as [`DkuConfig::load`] with an explicit file path. A missing file is skipped.
    pub fn load_from(path: &Path) -> std::result::Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("backend", "memory")?
            .set_default("storage_path", "./data")?
            .set_default("ipfs_api_url", crate::backend::DEFAULT_IPFS_API_URL)?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("compression_level", crate::unit::codec::DEFAULT_LEVEL as i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("DKU").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    pub fn codec(&self) -> Codec {
        Codec::new(self.compression_level)
    }

    /// Builds a store over the configured backend.
    pub fn open_store(&self) -> Result<Store> {
        let codec = self.codec();
        let store = match self.backend {
            BackendKind::Memory => Store::in_memory(codec),
            BackendKind::Local => {
                let local = Arc::new(self.open_local("dku_store")?);
                Store::new(local.clone(), local, codec)
            }
            BackendKind::Ipfs => {
                let ipfs = IpfsBackend::new(
                    &self.ipfs_api_url,
                    Duration::from_secs(self.request_timeout_secs),
                )
                .map_err(|e| DkuError::BackendUnavailable {
                    backend: "ipfs".to_string(),
                    reason: e.to_string(),
                })?;
                let heads = Arc::new(self.open_local("dku_heads")?);
                Store::new(Arc::new(ipfs), heads, codec)
            }
        };
        tracing::info!(
            target: "dku::store",
            backend = store.backend_name(),
            level = codec.level(),
            "store opened"
        );
        Ok(store)
    }

    fn open_local(&self, name: &str) -> Result<LocalBackend> {
        let path = Path::new(&self.storage_path).join(name);
        LocalBackend::open_path(&path).map_err(|e| DkuError::BackendUnavailable {
            backend: "local".to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DkuConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.backend, BackendKind::Memory);
        assert_eq!(cfg.storage_path, "./data");
        assert_eq!(cfg.ipfs_api_url, "http://127.0.0.1:5001");
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.compression_level, 3);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dku.toml");
        std::fs::write(
            &path,
            "backend = \"local\"\nstorage_path = \"/tmp/dku\"\ncompression_level = 9\n",
        )
        .unwrap();
        let cfg = DkuConfig::load_from(&path).unwrap();
        assert_eq!(cfg.backend, BackendKind::Local);
        assert_eq!(cfg.storage_path, "/tmp/dku");
        assert_eq!(cfg.codec().level(), 9);
        assert_eq!(cfg.request_timeout_secs, 30);
    }

    #[tokio::test]
    async fn open_local_store_under_storage_path() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DkuConfig {
            backend: BackendKind::Local,
            storage_path: dir.path().to_string_lossy().to_string(),
            ipfs_api_url: crate::backend::DEFAULT_IPFS_API_URL.to_string(),
            request_timeout_secs: 5,
            compression_level: 3,
        };
        let store = cfg.open_store().unwrap();
        assert_eq!(store.backend_name(), "local");
        let input = ProducerInput {
            content: "configured".into(),
            tags: vec![],
            source_url: String::new(),
            agent: DEFAULT_AGENT_ID.into(),
        };
        let (aku, location) = store.submit(input).await.unwrap();
        assert_eq!(store.fetch(&location).await.unwrap().identity(), aku.identity());
        assert!(dir.path().join("dku_store").exists());
    }

    #[test]
    fn producer_input_defaults() {
        let input: ProducerInput = serde_json::from_str(r#"{"content":"x"}"#).unwrap();
        assert!(input.tags.is_empty());
        assert_eq!(input.source_url, "");
        assert_eq!(input.agent, DEFAULT_AGENT_ID);
    }
}
