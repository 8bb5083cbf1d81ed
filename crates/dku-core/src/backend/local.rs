//! Sled-backed local backend: one tree for envelope blobs, one for lineage heads.

use sled::{Db, IVec, Tree};
use std::path::Path;

use super::{content_id_for, decide, Advance, Backend, BackendError, ContentId, HeadRecord, LineageHeads};
use crate::unit::Identity;

const DEFAULT_PATH: &str = "./data/dku_store";
const BLOBS_TREE: &str = "blobs";
const HEADS_TREE: &str = "heads";

pub struct LocalBackend {
    db: Db,
    blobs: Tree,
    heads: Tree,
}

impl LocalBackend {
    /// Opens or creates the store at `./data/dku_store`.
    pub fn new() -> Result<Self, sled::Error> {
        Self::open_path(DEFAULT_PATH)
    }

    /// Opens or creates the store at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        let blobs = db.open_tree(BLOBS_TREE)?;
        let heads = db.open_tree(HEADS_TREE)?;
        Ok(Self { db, blobs, heads })
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    fn parse_head(bytes: &[u8]) -> Result<HeadRecord, BackendError> {
        serde_json::from_slice(bytes)
            .map_err(|e| BackendError::Rejected(format!("unreadable head record: {}", e)))
    }
}

fn read_err(e: sled::Error) -> BackendError {
    BackendError::Unavailable(e.to_string())
}

fn write_err(e: sled::Error) -> BackendError {
    match e {
        sled::Error::Io(io) => BackendError::Unavailable(io.to_string()),
        other => BackendError::Rejected(other.to_string()),
    }
}

/// Runs a sled write (and its fsync) on the blocking pool instead of the runtime thread.
/// Point reads stay inline; sled serves them from its page cache.
async fn blocking<T, F>(work: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BackendError::Unavailable(format!("sled task: {}", e)))?
}

/// Writes `next` under `key` iff the stored bytes are still `seen`. Losing the swap yields
/// `Conflict` with whatever head won.
fn swap_head(
    db: &Db,
    heads: &Tree,
    key: &[u8],
    seen: Option<&IVec>,
    next: &HeadRecord,
) -> Result<Advance, BackendError> {
    let encoded = serde_json::to_vec(next)
        .map_err(|e| BackendError::Rejected(format!("head record encode: {}", e)))?;
    match heads.compare_and_swap(key, seen, Some(encoded)).map_err(write_err)? {
        Ok(()) => {
            db.flush().map_err(write_err)?;
            Ok(Advance::Advanced)
        }
        Err(cas) => Ok(Advance::Conflict {
            current: cas.current.as_deref().map(LocalBackend::parse_head).transpose()?,
        }),
    }
}

#[async_trait::async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, BackendError> {
        let id = content_id_for(&bytes);
        let size = bytes.len();
        let (db, blobs, key) = (self.db.clone(), self.blobs.clone(), id.clone());
        // Same id means same bytes; an existing entry is left as-is.
        let fresh = blocking(move || {
            let fresh = blobs
                .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))
                .map_err(write_err)?
                .is_ok();
            db.flush().map_err(write_err)?;
            Ok(fresh)
        })
        .await?;
        tracing::debug!(
            target: "dku::backend",
            backend = "local",
            content_id = %id,
            bytes = size,
            fresh,
            "stored blob"
        );
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, BackendError> {
        self.blobs
            .get(id.as_bytes())
            .map_err(read_err)?
            .map(|iv| iv.to_vec())
            .ok_or(BackendError::NotFound)
    }
}

#[async_trait::async_trait]
impl LineageHeads for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn head(&self, lineage: &Identity) -> Result<Option<HeadRecord>, BackendError> {
        self.heads
            .get(lineage.to_hex().as_bytes())
            .map_err(read_err)?
            .map(|iv| Self::parse_head(&iv))
            .transpose()
    }

    async fn advance(
        &self,
        lineage: &Identity,
        expected: Option<&Identity>,
        next: HeadRecord,
    ) -> Result<Advance, BackendError> {
        let key = lineage.to_hex();
        let expected = expected.copied();
        let (db, heads) = (self.db.clone(), self.heads.clone());
        blocking(move || {
            let raw = heads.get(key.as_bytes()).map_err(read_err)?;
            let current = raw.as_deref().map(LocalBackend::parse_head).transpose()?;
            match decide(current.as_ref(), expected.as_ref(), &next) {
                Advance::Advanced => swap_head(&db, &heads, key.as_bytes(), raw.as_ref(), &next),
                outcome => Ok(outcome),
            }
        })
        .await
    }
}
