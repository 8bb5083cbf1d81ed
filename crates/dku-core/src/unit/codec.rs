//! zstd codec for AKU content.

use std::io::Write;

use crate::error::{DkuError, Result};

/// Default zstd level (good balance of speed and ratio).
pub const DEFAULT_LEVEL: i32 = 3;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Compresses text into a single checksummed zstd frame.
///
/// Only reversibility is guaranteed. The level is pinned per codec so one build produces
/// the same bytes for the same text, which keeps identities stable across resubmissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    level: i32,
}

impl Codec {
    /// Level is clamped to zstd's standard range 1..=22.
    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(1, 22),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn compress(&self, text: &str) -> Result<Vec<u8>> {
        let encode_err = |e: std::io::Error| DkuError::Serialization(format!("zstd encode: {}", e));
        let mut encoder =
            zstd::stream::write::Encoder::new(Vec::new(), self.level).map_err(encode_err)?;
        encoder.include_checksum(true).map_err(encode_err)?;
        encoder.write_all(text.as_bytes()).map_err(encode_err)?;
        encoder.finish().map_err(encode_err)
    }

    pub fn decompress(&self, bytes: &[u8]) -> Result<String> {
        decompress(bytes)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

/// Decompresses a frame produced by [`Codec::compress`]. Any level decodes.
///
/// Fails with `CorruptData` on a bad header, truncated stream, checksum mismatch, or
/// non-UTF-8 payload.
pub fn decompress(bytes: &[u8]) -> Result<String> {
    check_frame(bytes)?;
    let raw = zstd::stream::decode_all(bytes)
        .map_err(|e| DkuError::corrupt(format!("invalid zstd frame: {}", e)))?;
    String::from_utf8(raw).map_err(|e| DkuError::corrupt(format!("content is not UTF-8: {}", e)))
}

/// Cheap header check: the bytes start with the zstd frame magic number.
pub fn check_frame(bytes: &[u8]) -> Result<()> {
    if bytes.starts_with(&ZSTD_MAGIC) {
        Ok(())
    } else {
        Err(DkuError::corrupt("missing zstd frame header"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_text() {
        let codec = Codec::default();
        for text in [
            "",
            "hello world",
            "Quantum entanglement is a physical phenomenon.",
            "ünïcødé — 量子もつれ 🧠",
        ] {
            let compressed = codec.compress(text).unwrap();
            assert_eq!(decompress(&compressed).unwrap(), text);
        }
    }

    #[test]
    fn roundtrip_large_repetitive_text_compresses() {
        let codec = Codec::new(9);
        let text = "knowledge ".repeat(10_000);
        let compressed = codec.compress(&text).unwrap();
        assert!(compressed.len() < text.len() / 10);
        assert_eq!(codec.decompress(&compressed).unwrap(), text);
    }

    #[test]
    fn same_level_is_reproducible() {
        let codec = Codec::default();
        assert_eq!(codec.compress("abc").unwrap(), codec.compress("abc").unwrap());
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(Codec::new(0).level(), 1);
        assert_eq!(Codec::new(99).level(), 22);
    }

    #[test]
    fn rejects_garbage() {
        let err = decompress(b"definitely not zstd").unwrap_err();
        assert!(matches!(err, DkuError::CorruptData { .. }));
        assert!(decompress(b"").is_err());
    }

    #[test]
    fn rejects_truncated_frame() {
        let compressed = Codec::default().compress("hello world").unwrap();
        let truncated = &compressed[..compressed.len() - 4];
        assert!(matches!(
            decompress(truncated),
            Err(DkuError::CorruptData { .. })
        ));
    }

    #[test]
    fn rejects_flipped_payload_byte() {
        let mut compressed = Codec::default().compress("hello world").unwrap();
        let mid = compressed.len() / 2;
        compressed[mid] ^= 0xFF;
        assert!(matches!(
            decompress(&compressed),
            Err(DkuError::CorruptData { .. })
        ));
    }

    #[test]
    fn rejects_non_utf8_payload() {
        let mut encoder = zstd::stream::write::Encoder::new(Vec::new(), 3).unwrap();
        encoder.write_all(&[0xFF, 0xFE, 0xFD]).unwrap();
        let frame = encoder.finish().unwrap();
        let err = decompress(&frame).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }
}
