//! Store facade: codec + identity + backend.
//!
//! The store holds no state of its own between calls. Lineage heads live behind the
//! injected [`LineageHeads`] capability and are advanced with compare-and-swap, so racing
//! writers of the same lineage get [`DkuError::VersionConflict`] instead of a lock.

mod envelope;

pub use envelope::AkuEnvelope;

use std::sync::Arc;

use crate::backend::{Advance, Backend, BackendError, HeadRecord, LineageHeads, Location, MemoryBackend};
use crate::error::{DkuError, Result};
use crate::shared::ProducerInput;
use crate::unit::{codec, Aku, AkuDraft, Codec, Identity};

pub struct Store {
    backend: Arc<dyn Backend>,
    heads: Arc<dyn LineageHeads>,
    codec: Codec,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>, heads: Arc<dyn LineageHeads>, codec: Codec) -> Self {
        Self {
            backend,
            heads,
            codec,
        }
    }

    /// Store over a fresh [`MemoryBackend`] serving both blobs and heads.
    pub fn in_memory(codec: Codec) -> Self {
        let memory = Arc::new(MemoryBackend::new());
        Self::new(memory.clone(), memory, codec)
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Builds version 1 of a unit without publishing it.
    pub fn create(&self, draft: AkuDraft) -> Result<Aku> {
        Aku::create(&self.codec, draft)
    }

    /// Creates and publishes a unit from a producer submission.
    pub async fn submit(&self, input: ProducerInput) -> Result<(Aku, Location)> {
        let aku = self.create(input.into())?;
        let location = self.publish(&aku).await?;
        Ok((aku, location))
    }

    /// Serializes `aku`, stores it, and advances its lineage head.
    ///
    /// Version 1 expects an empty lineage; version N expects the head to be its parent.
    /// Re-publishing the current head or one of its ancestors is a no-op for the head.
    pub async fn publish(&self, aku: &Aku) -> Result<Location> {
        let bytes = AkuEnvelope::from_aku(aku).to_bytes()?;
        let size = bytes.len();
        let location = self
            .backend
            .put(bytes)
            .await
            .map_err(|e| self.put_error(e))?;

        let lineage = aku.lineage();
        let expected = aku.history().last();
        let next = HeadRecord {
            identity: aku.identity(),
            version: aku.version(),
            location: location.clone(),
        };
        let outcome = self
            .heads
            .advance(&lineage, expected, next)
            .await
            .map_err(|e| self.heads_error(e))?;

        if let Advance::Conflict { current } = outcome {
            let ancestor = match &current {
                Some(head) if head.version > aku.version() => self.is_ancestor(aku, head).await?,
                _ => false,
            };
            if ancestor {
                tracing::debug!(
                    target: "dku::store",
                    identity = %aku.identity(),
                    "re-published ancestor of current head"
                );
            } else {
                tracing::warn!(
                    target: "dku::store",
                    lineage = %lineage,
                    identity = %aku.identity(),
                    version = aku.version(),
                    "publish lost lineage race"
                );
                return Err(DkuError::VersionConflict {
                    lineage,
                    expected: expected.copied(),
                    current: current.map(|h| h.identity),
                });
            }
        }

        tracing::info!(
            target: "dku::store",
            backend = self.backend.name(),
            identity = %aku.identity(),
            version = aku.version(),
            location = %location,
            bytes = size,
            "AKU v{} published at {} ({} bytes)",
            aku.version(),
            location,
            size
        );
        Ok(location)
    }

    /// Retrieves and verifies the unit at `location`. Content stays compressed; call
    /// [`Aku::decompress_content`] when the text is needed.
    pub async fn fetch(&self, location: &str) -> Result<Aku> {
        let bytes = self
            .backend
            .get(location)
            .await
            .map_err(|e| self.get_error(e, location))?;

        let aku = AkuEnvelope::from_bytes(&bytes)
            .and_then(AkuEnvelope::into_aku)
            .map_err(|e| e.at_location(location))?;

        let computed = aku.recompute_identity();
        if computed != aku.identity() {
            tracing::warn!(
                target: "dku::store",
                location = %location,
                stored = %aku.identity(),
                computed = %computed,
                "identity mismatch on fetch"
            );
            return Err(DkuError::Integrity {
                location: location.to_string(),
                stored: aku.identity(),
                computed,
            });
        }
        codec::check_frame(aku.content_compressed()).map_err(|e| e.at_location(location))?;

        tracing::debug!(
            target: "dku::store",
            location = %location,
            identity = %aku.identity(),
            version = aku.version(),
            "AKU fetched"
        );
        Ok(aku)
    }

    /// Builds the successor of `previous`, which must be the published head of its lineage
    /// (same identity and version).
    /// The result still has to be published; a concurrent writer can win in between, in
    /// which case [`Store::publish`] reports the conflict.
    pub async fn new_version(&self, previous: &Aku, draft: AkuDraft) -> Result<Aku> {
        let lineage = previous.lineage();
        let head = self.head(&lineage).await?;
        match head {
            // a successor can share its parent's identity; the version tells them apart
            Some(h) if h.identity == previous.identity() && h.version == previous.version() => {
                Aku::new_version(previous, &self.codec, draft)
            }
            other => Err(DkuError::VersionConflict {
                lineage,
                expected: Some(previous.identity()),
                current: other.map(|h| h.identity),
            }),
        }
    }

    pub async fn head(&self, lineage: &Identity) -> Result<Option<HeadRecord>> {
        self.heads
            .head(lineage)
            .await
            .map_err(|e| self.heads_error(e))
    }

    /// Fetches the latest published version of `lineage`, if any.
    pub async fn fetch_latest(&self, lineage: &Identity) -> Result<Option<Aku>> {
        match self.head(lineage).await? {
            Some(head) => self.fetch(&head.location).await.map(Some),
            None => Ok(None),
        }
    }

    async fn is_ancestor(&self, aku: &Aku, head: &HeadRecord) -> Result<bool> {
        let head_aku = self.fetch(&head.location).await?;
        let slot = usize::try_from(aku.version() - 1).unwrap_or(usize::MAX);
        Ok(head_aku.history().get(slot) == Some(&aku.identity()))
    }

    fn put_error(&self, err: BackendError) -> DkuError {
        let backend = self.backend.name().to_string();
        match err {
            BackendError::Unavailable(reason) => DkuError::BackendUnavailable { backend, reason },
            BackendError::Rejected(reason) => DkuError::BackendWrite { backend, reason },
            BackendError::NotFound => DkuError::BackendWrite {
                backend,
                reason: "backend reported not found on write".to_string(),
            },
        }
    }

    fn get_error(&self, err: BackendError, location: &str) -> DkuError {
        match err {
            BackendError::NotFound => DkuError::NotFound {
                location: location.to_string(),
            },
            BackendError::Unavailable(reason) => DkuError::BackendUnavailable {
                backend: self.backend.name().to_string(),
                reason,
            },
            BackendError::Rejected(reason) => DkuError::BackendRead {
                backend: self.backend.name().to_string(),
                location: location.to_string(),
                reason,
            },
        }
    }

    fn heads_error(&self, err: BackendError) -> DkuError {
        let backend = self.heads.name().to_string();
        match err {
            BackendError::Rejected(reason) => DkuError::BackendWrite { backend, reason },
            other => DkuError::BackendUnavailable {
                backend,
                reason: other.to_string(),
            },
        }
    }
}
