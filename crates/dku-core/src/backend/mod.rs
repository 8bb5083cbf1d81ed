//! Backend capability: content-addressed put/get over opaque bytes, plus lineage heads.
//!
//! | Adapter          | Blobs              | Lineage heads          |
//! |------------------|--------------------|------------------------|
//! | `MemoryBackend`  | DashMap            | DashMap                |
//! | `LocalBackend`   | sled tree `blobs`  | sled tree `heads` (CAS)|
//! | `IpfsBackend`    | IPFS HTTP API      | pair with LocalBackend |

mod ipfs;
mod local;
mod memory;

pub use ipfs::{IpfsBackend, DEFAULT_API_URL as DEFAULT_IPFS_API_URL};
pub use local::LocalBackend;
pub use memory::MemoryBackend;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::unit::Identity;

/// Opaque identifier returned by a backend for stored bytes.
pub type ContentId = String;

/// Where a published envelope lives. May differ from the unit's identity.
pub type Location = ContentId;

/// Failure reported by a backend adapter. The store adds backend name and location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Unreachable, timed out, or cancelled.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Reachable, but the operation was refused.
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("not found")]
    NotFound,
}

/// Byte storage consumed by [`crate::Store`].
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in errors and logs.
    fn name(&self) -> &str;

    /// Stores `bytes`. Putting identical bytes twice is legal.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, BackendError>;

    /// Returns the bytes stored under `id`, or [`BackendError::NotFound`].
    async fn get(&self, id: &str) -> Result<Vec<u8>, BackendError>;
}

/// Latest published version of a lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRecord {
    pub identity: Identity,
    pub version: u64,
    pub location: Location,
}

/// Outcome of [`LineageHeads::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Head now holds the proposed record: a successor, or the same version at a new location.
    Advanced,
    /// Head already held the proposed record.
    Unchanged,
    /// Head did not match the expected parent.
    Conflict { current: Option<HeadRecord> },
}

/// Optimistic head tracking per lineage. Implementations compare-and-swap; they never lock
/// across calls.
#[async_trait::async_trait]
pub trait LineageHeads: Send + Sync {
    fn name(&self) -> &str;

    async fn head(&self, lineage: &Identity) -> Result<Option<HeadRecord>, BackendError>;

    /// Moves the head of `lineage` to `next` iff its current identity equals `expected`
    /// (`None` meaning the lineage has no head yet).
    async fn advance(
        &self,
        lineage: &Identity,
        expected: Option<&Identity>,
        next: HeadRecord,
    ) -> Result<Advance, BackendError>;
}

/// Content id used by the local adapters: SHA-256 of the stored bytes, lowercase hex.
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    hex::encode(Sha256::digest(bytes))
}

/// Shared decision for compare-and-swap adapters, given the current head.
///
/// A head is `(identity, version)`: a successor may share its parent's identity, so the
/// identity alone never decides. `next` advances the head when it is the same version at a
/// different location (a metrics re-publish), or when `expected` names the current head
/// and `next` is exactly one version ahead of it.
pub(crate) fn decide(
    current: Option<&HeadRecord>,
    expected: Option<&Identity>,
    next: &HeadRecord,
) -> Advance {
    match current {
        Some(cur) if cur.identity == next.identity && cur.version == next.version => {
            if cur.location == next.location {
                Advance::Unchanged
            } else {
                Advance::Advanced
            }
        }
        None if expected.is_none() && next.version == 1 => Advance::Advanced,
        Some(cur) if Some(&cur.identity) == expected && cur.version + 1 == next.version => {
            Advance::Advanced
        }
        cur => Advance::Conflict {
            current: cur.cloned(),
        },
    }
}
