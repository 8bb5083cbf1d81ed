//! Atomic Knowledge Unit (AKU) model.
//!
//! An AKU wraps compressed text plus provenance metadata. The identity covers only the
//! compressed content and metadata; metrics, version, and history are extension points
//! that can change without moving the unit's address.

pub mod codec;
pub mod identity;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::shared::ProducerInput;

pub use codec::Codec;
pub use identity::{Derivation, Identity, IdentityError};

/// Dimensionality of the placeholder embedding vector.
pub const EMBEDDING_DIMS: usize = 384;

/// Source type recorded for producer submissions.
pub const DEFAULT_SOURCE_TYPE: &str = "general";

/// Provenance of a unit's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl Source {
    pub fn new(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: url.into(),
        }
    }

    pub fn general(url: impl Into<String>) -> Self {
        Self::new(DEFAULT_SOURCE_TYPE, url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub tags: Vec<String>,
    /// Reserved for a future embedding subsystem; zero-filled.
    #[serde(with = "lossless_float::vec_f32")]
    pub embeddings: Vec<f32>,
    pub sources: Vec<Source>,
    /// Set once at creation; not part of the identity.
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    pub agent: String,
}

/// Scoring fields owned by a future analysis subsystem. The core only zeroes them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(with = "lossless_float")]
    pub richness: f64,
    #[serde(with = "lossless_float")]
    pub truthfulness: f64,
    #[serde(with = "lossless_float")]
    pub stability: f64,
}

/// Caller input for a new unit or a new version of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkuDraft {
    pub content: String,
    pub tags: Vec<String>,
    pub sources: Vec<Source>,
    pub agent: String,
}

impl AkuDraft {
    pub fn new(content: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
            sources: Vec::new(),
            agent: agent.into(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }
}

impl From<ProducerInput> for AkuDraft {
    /// `source_url` and `agent` are stored verbatim; an empty URL still records a source.
    fn from(input: ProducerInput) -> Self {
        AkuDraft::new(input.content, input.agent)
            .with_tags(input.tags)
            .with_source(Source::general(input.source_url))
    }
}

/// One version of an Atomic Knowledge Unit.
///
/// Fields are private: identity, content, and metadata never change after construction.
/// Only [`Metrics`] are writable, through [`Aku::metrics_mut`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aku {
    identity: Identity,
    version: u64,
    content_compressed: Vec<u8>,
    metadata: Metadata,
    metrics: Metrics,
    history: Vec<Identity>,
}

impl Aku {
    /// Builds version 1 of a new unit.
    pub fn create(codec: &Codec, draft: AkuDraft) -> Result<Self> {
        let content_compressed = codec.compress(&draft.content)?;
        let metadata = Metadata {
            tags: normalize_tags(draft.tags),
            embeddings: vec![0.0; EMBEDDING_DIMS],
            sources: draft.sources,
            created_at: Utc::now().trunc_subsecs(6),
            agent: draft.agent,
        };
        let identity = identity::derive(&content_compressed, &metadata);
        Ok(Self {
            identity,
            version: 1,
            content_compressed,
            metadata,
            metrics: Metrics::default(),
            history: Vec::new(),
        })
    }

    /// Builds the successor of `previous`. Does not check that `previous` is the latest
    /// version of its lineage; [`crate::Store::new_version`] does.
    pub fn new_version(previous: &Aku, codec: &Codec, draft: AkuDraft) -> Result<Self> {
        let mut next = Self::create(codec, draft)?;
        next.version = previous.version + 1;
        next.history = previous.history.clone();
        next.history.push(previous.identity);
        Ok(next)
    }

    /// Reassembles a unit from stored parts without recomputing its identity.
    pub(crate) fn from_parts(
        identity: Identity,
        version: u64,
        content_compressed: Vec<u8>,
        metadata: Metadata,
        metrics: Metrics,
        history: Vec<Identity>,
    ) -> Self {
        Self {
            identity,
            version,
            content_compressed,
            metadata,
            metrics,
            history,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn content_compressed(&self) -> &[u8] {
        &self.content_compressed
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    pub fn history(&self) -> &[Identity] {
        &self.history
    }

    /// Identity of version 1 of this unit's lineage.
    pub fn lineage(&self) -> Identity {
        self.history.first().copied().unwrap_or(self.identity)
    }

    /// Decompresses the content. Explicit so metadata-only readers skip the cost.
    pub fn decompress_content(&self) -> Result<String> {
        codec::decompress(&self.content_compressed)
    }

    pub fn recompute_identity(&self) -> Identity {
        identity::derive(&self.content_compressed, &self.metadata)
    }

    pub fn verify_identity(&self) -> bool {
        self.recompute_identity() == self.identity
    }
}

/// Trims tags, drops empty ones, and removes duplicates keeping the first occurrence.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// ISO-8601 UTC with microseconds and a trailing `Z`.
mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Floats with the non-finite values written as the strings `"NaN"`, `"inf"` and `"-inf"`.
/// JSON numbers cannot carry them and serde_json would emit `null`.
mod lossless_float {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    fn tag(v: f64) -> Option<&'static str> {
        if v.is_nan() {
            Some("NaN")
        } else if v == f64::INFINITY {
            Some("inf")
        } else if v == f64::NEG_INFINITY {
            Some("-inf")
        } else {
            None
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Tag(String),
    }

    impl Repr {
        fn value<E: serde::de::Error>(self) -> Result<f64, E> {
            match self {
                Repr::Number(v) => Ok(v),
                Repr::Tag(t) => match t.as_str() {
                    "NaN" => Ok(f64::NAN),
                    "inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    other => Err(E::custom(format!("invalid float {:?}", other))),
                },
            }
        }
    }

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        match tag(*v) {
            Some(t) => s.serialize_str(t),
            None => s.serialize_f64(*v),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Repr::deserialize(d)?.value()
    }

    pub mod vec_f32 {
        use super::*;

        struct Item(f32);

        impl Serialize for Item {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                match tag(f64::from(self.0)) {
                    Some(t) => s.serialize_str(t),
                    None => s.serialize_f32(self.0),
                }
            }
        }

        pub fn serialize<S: Serializer>(v: &[f32], s: S) -> Result<S::Ok, S::Error> {
            s.collect_seq(v.iter().map(|&x| Item(x)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f32>, D::Error> {
            Vec::<Repr>::deserialize(d)?
                .into_iter()
                .map(|r| r.value::<D::Error>().map(|v| v as f32))
                .collect()
        }
    }
}
