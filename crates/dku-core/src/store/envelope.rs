//! JSON wire envelope for a published AKU.

use serde::{Deserialize, Serialize};

use crate::error::{DkuError, Result};
use crate::unit::{Aku, Identity, Metadata, Metrics};

/// Owned, field-by-field copy of an [`Aku`] in wire form. Built explicitly so the
/// serialized value never shares state with the live unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AkuEnvelope {
    pub identity: Identity,
    pub version: u64,
    /// Lowercase hex of the compressed content.
    pub content_compressed: String,
    pub metadata: Metadata,
    pub metrics: Metrics,
    pub history: Vec<Identity>,
}

impl AkuEnvelope {
    pub fn from_aku(aku: &Aku) -> Self {
        Self {
            identity: aku.identity(),
            version: aku.version(),
            content_compressed: hex::encode(aku.content_compressed()),
            metadata: aku.metadata().clone(),
            metrics: *aku.metrics(),
            history: aku.history().to_vec(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DkuError::Serialization(format!("envelope: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| DkuError::corrupt(format!("unreadable envelope: {}", e)))
    }

    /// Rebuilds the unit with the stored identity; callers verify it separately.
    pub fn into_aku(self) -> Result<Aku> {
        let content = hex::decode(&self.content_compressed)
            .map_err(|e| DkuError::corrupt(format!("content_compressed is not hex: {}", e)))?;
        if self.version == 0 {
            return Err(DkuError::corrupt("version must be at least 1"));
        }
        if self.history.len() as u64 != self.version - 1 {
            return Err(DkuError::corrupt(format!(
                "version {} carries {} history entries",
                self.version,
                self.history.len()
            )));
        }
        Ok(Aku::from_parts(
            self.identity,
            self.version,
            content,
            self.metadata,
            self.metrics,
            self.history,
        ))
    }
}
