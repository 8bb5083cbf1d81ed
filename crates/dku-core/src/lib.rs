//! dku-core: atomic knowledge units (AKUs) with content-derived identity.
//!
//! An AKU holds zstd-compressed text, metadata, quality metrics, and a version lineage.
//! The [`Store`] creates, publishes, fetches, and versions units over any [`Backend`]
//! (in-memory, sled, or an IPFS HTTP node). Identity is recomputed on every fetch.

mod backend;
mod error;
mod shared;
mod store;
mod unit;

// Shared
pub use shared::{BackendKind, DkuConfig, ProducerInput, DEFAULT_AGENT_ID};

// Errors
pub use error::{DkuError, Result};

// Unit model, codec, identity
pub use unit::codec::{check_frame, decompress, DEFAULT_LEVEL};
pub use unit::identity::{canonical_metadata, derive, derive_digests};
pub use unit::{
    Aku, AkuDraft, Codec, Derivation, Identity, IdentityError, Metadata, Metrics, Source,
    DEFAULT_SOURCE_TYPE, EMBEDDING_DIMS,
};

// Backends
pub use backend::{
    content_id_for, Advance, Backend, BackendError, ContentId, HeadRecord, IpfsBackend,
    LineageHeads, LocalBackend, Location, MemoryBackend, DEFAULT_IPFS_API_URL,
};

// Store
pub use store::{AkuEnvelope, Store};
