//! In-process backend. Contents vanish with the process.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{content_id_for, decide, Advance, Backend, BackendError, ContentId, HeadRecord, LineageHeads};
use crate::unit::Identity;

#[derive(Default)]
pub struct MemoryBackend {
    blobs: DashMap<ContentId, Vec<u8>>,
    heads: DashMap<Identity, HeadRecord>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, BackendError> {
        let id = content_id_for(&bytes);
        self.blobs.entry(id.clone()).or_insert(bytes);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, BackendError> {
        self.blobs
            .get(id)
            .map(|v| v.value().clone())
            .ok_or(BackendError::NotFound)
    }
}

#[async_trait::async_trait]
impl LineageHeads for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn head(&self, lineage: &Identity) -> Result<Option<HeadRecord>, BackendError> {
        Ok(self.heads.get(lineage).map(|h| h.value().clone()))
    }

    async fn advance(
        &self,
        lineage: &Identity,
        expected: Option<&Identity>,
        next: HeadRecord,
    ) -> Result<Advance, BackendError> {
        // The entry guard holds the shard lock for the whole compare-and-swap.
        match self.heads.entry(*lineage) {
            Entry::Vacant(slot) => {
                let outcome = decide(None, expected, &next);
                if outcome == Advance::Advanced {
                    slot.insert(next);
                }
                Ok(outcome)
            }
            Entry::Occupied(mut slot) => {
                let outcome = decide(Some(slot.get()), expected, &next);
                if outcome == Advance::Advanced {
                    slot.insert(next);
                }
                Ok(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_is_idempotent_and_content_addressed() {
        let backend = MemoryBackend::new();
        let a = backend.put(b"envelope".to_vec()).await.unwrap();
        let b = backend.put(b"envelope".to_vec()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get(&a).await.unwrap(), b"envelope");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("nope").await, Err(BackendError::NotFound));
    }

    #[tokio::test]
    async fn advance_is_compare_and_swap() {
        let backend = MemoryBackend::new();
        let lineage = Identity::from_bytes([1; 32]);
        let v1 = HeadRecord {
            identity: lineage,
            version: 1,
            location: "l1".into(),
        };
        let v2 = HeadRecord {
            identity: Identity::from_bytes([2; 32]),
            version: 2,
            location: "l2".into(),
        };
        assert_eq!(
            backend.advance(&lineage, None, v1.clone()).await.unwrap(),
            Advance::Advanced
        );
        assert_eq!(
            backend.advance(&lineage, None, v2.clone()).await.unwrap(),
            Advance::Conflict {
                current: Some(v1.clone())
            }
        );
        assert_eq!(
            backend
                .advance(&lineage, Some(&lineage), v2.clone())
                .await
                .unwrap(),
            Advance::Advanced
        );
        assert_eq!(backend.head(&lineage).await.unwrap(), Some(v2));
    }
}
