//! Identity derivation: `SHA256(hex(SHA256(content)) + ":" + hex(SHA256(canonical metadata)))`.
//!
//! The two intermediate digests are kept separate so content and metadata can be
//! inspected independently when two identities unexpectedly differ.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::{Metadata, Source};

/// A 256-bit identity, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; 32]);

impl Identity {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hex string. Upper-case input is accepted.
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(s).map_err(|_| IdentityError::InvalidHex)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_hex()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// All three stages of a derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub content_digest: [u8; 32],
    pub metadata_digest: [u8; 32],
    pub identity: Identity,
}

impl Derivation {
    pub fn content_hex(&self) -> String {
        hex::encode(self.content_digest)
    }

    pub fn metadata_hex(&self) -> String {
        hex::encode(self.metadata_digest)
    }
}

/// Derives the identity of `content_compressed` + `metadata`.
///
/// Pure: only the compressed bytes and the canonical metadata participate. `created_at`
/// is not part of the canonical form, so resubmitting the same text deduplicates.
pub fn derive(content_compressed: &[u8], metadata: &Metadata) -> Identity {
    derive_digests(content_compressed, metadata).identity
}

pub fn derive_digests(content_compressed: &[u8], metadata: &Metadata) -> Derivation {
    let content_digest: [u8; 32] = Sha256::digest(content_compressed).into();
    let metadata_digest: [u8; 32] = Sha256::digest(canonical_metadata(metadata)).into();

    let combined = format!(
        "{}:{}",
        hex::encode(content_digest),
        hex::encode(metadata_digest)
    );
    let identity = Identity(Sha256::digest(combined.as_bytes()).into());

    Derivation {
        content_digest,
        metadata_digest,
        identity,
    }
}

// Field declaration order is the serialization order: keep it lexicographic.
#[derive(Serialize)]
struct CanonicalMetadata<'a> {
    agent: &'a str,
    embeddings: Vec<f32>,
    sources: Vec<CanonicalSource<'a>>,
    tags: &'a [String],
}

#[derive(Serialize)]
struct CanonicalSource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    url: &'a str,
}

/// Canonical byte form of `metadata` used for hashing: compact JSON, keys in lexicographic
/// order, floats normalized (NaN and -0.0 become 0.0), `created_at` omitted.
pub fn canonical_metadata(metadata: &Metadata) -> Vec<u8> {
    let canonical = CanonicalMetadata {
        agent: &metadata.agent,
        embeddings: metadata
            .embeddings
            .iter()
            .map(|&v| if v.is_nan() || v == 0.0 { 0.0 } else { v })
            .collect(),
        sources: metadata
            .sources
            .iter()
            .map(|Source { kind, url }| CanonicalSource { kind, url })
            .collect(),
        tags: &metadata.tags,
    };
    // Borrowed strings and f32 values have infallible JSON encodings.
    serde_json::to_vec(&canonical).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::EMBEDDING_DIMS;
    use chrono::{Duration, Utc};

    fn metadata(tags: &[&str]) -> Metadata {
        Metadata {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            embeddings: vec![0.0; EMBEDDING_DIMS],
            sources: vec![Source::general("https://example.com")],
            created_at: Utc::now(),
            agent: "test-agent".to_string(),
        }
    }

    #[test]
    fn derive_is_deterministic() {
        let meta = metadata(&["test", "phase1"]);
        let a = derive(b"compressed", &meta);
        let b = derive(b"compressed", &meta.clone());
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
        assert!(a.to_hex().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn created_at_does_not_change_identity() {
        let meta = metadata(&["test"]);
        let mut later = meta.clone();
        later.created_at = meta.created_at + Duration::seconds(1);
        assert_eq!(derive(b"x", &meta), derive(b"x", &later));
    }

    #[test]
    fn tag_order_is_significant() {
        let a = derive(b"x", &metadata(&["a", "b"]));
        let b = derive(b"x", &metadata(&["b", "a"]));
        assert_ne!(a, b);
    }

    #[test]
    fn content_and_metadata_both_participate() {
        let meta = metadata(&["a"]);
        assert_ne!(derive(b"x", &meta), derive(b"y", &meta));
        let mut other_agent = meta.clone();
        other_agent.agent = "miner".to_string();
        assert_ne!(derive(b"x", &meta), derive(b"x", &other_agent));
    }

    #[test]
    fn canonical_form_orders_keys_lexicographically() {
        let mut meta = metadata(&["t"]);
        meta.embeddings = vec![0.0, -0.0, f32::NAN, 1.5];
        let json = String::from_utf8(canonical_metadata(&meta)).unwrap();
        assert_eq!(
            json,
            r#"{"agent":"test-agent","embeddings":[0.0,0.0,0.0,1.5],"sources":[{"type":"general","url":"https://example.com"}],"tags":["t"]}"#
        );
    }

    #[test]
    fn combined_stage_hashes_hex_digests_joined_by_colon() {
        let meta = metadata(&["t"]);
        let d = derive_digests(b"payload", &meta);
        let expected: [u8; 32] =
            Sha256::digest(format!("{}:{}", d.content_hex(), d.metadata_hex()).as_bytes()).into();
        assert_eq!(d.identity.as_bytes(), &expected);
        let content: [u8; 32] = Sha256::digest(b"payload").into();
        assert_eq!(d.content_digest, content);
    }

    #[test]
    fn identity_hex_roundtrip_and_rejects_bad_input() {
        let id = derive(b"x", &metadata(&[]));
        assert_eq!(Identity::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(Identity::from_hex("zz"), Err(IdentityError::InvalidHex));
        assert_eq!(Identity::from_hex("abcd"), Err(IdentityError::InvalidLength(2)));
    }

    #[test]
    fn identity_serializes_as_hex_string() {
        let id = derive(b"x", &metadata(&[]));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
