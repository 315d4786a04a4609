// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Wire form for tiers that persist strings.
//!
//! Items are JSON-encoded; with encoding enabled the JSON text is additionally
//! base64-encoded so the stored value is plain ASCII. This is a reversible
//! text-safe pass, not compression.
//!
//! Decoding detects plain JSON by its leading `{` (base64 never produces that
//! byte), so entries written while encoding was disabled stay readable after
//! it is switched on, and vice versa.
//!
//! # Example
//!
//! ```
//! use tiered_cache::{CacheItem, codec::ItemCodec};
//! use serde_json::json;
//!
//! let codec = ItemCodec::new(true);
//! let item = CacheItem::new(json!({"x": 1}), 1_000, 0);
//!
//! let blob = codec.serialize(&item).unwrap();
//! assert!(!blob.starts_with('{'));
//! assert_eq!(codec.deserialize(&blob).unwrap(), item);
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::cache_item::CacheItem;

/// Codec error types
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode the item
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Stored blob is not a readable item
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Serializer for [`CacheItem`]s stored as strings.
#[derive(Debug, Clone, Copy)]
pub struct ItemCodec {
    encode: bool,
}

impl ItemCodec {
    #[must_use]
    pub fn new(encode: bool) -> Self {
        Self { encode }
    }

    /// Whether the base64 pass is applied on write.
    #[must_use]
    pub fn is_encoding(&self) -> bool {
        self.encode
    }

    pub fn serialize(&self, item: &CacheItem) -> Result<String, CodecError> {
        let json = serde_json::to_string(item)?;
        if self.encode {
            Ok(STANDARD.encode(json.as_bytes()))
        } else {
            Ok(json)
        }
    }

    pub fn deserialize(&self, blob: &str) -> Result<CacheItem, CodecError> {
        let trimmed = blob.trim_start();
        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed)
                .map_err(|e| CodecError::Decode(e.to_string()));
        }

        let bytes = STANDARD
            .decode(trimmed.as_bytes())
            .map_err(|e| CodecError::Decode(format!("invalid base64: {}", e)))?;

        serde_json::from_slice(&bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

impl Default for ItemCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item() -> CacheItem {
        let mut item = CacheItem::new(
            json!({"student": "S-1024", "scores": [88, 92], "notes": "第一次考试"}),
            60_000,
            1_700_000_000_000,
        );
        item.touch(1_700_000_000_500);
        item
    }

    #[test]
    fn test_roundtrip_plain() {
        let codec = ItemCodec::new(false);
        let item = sample_item();

        let blob = codec.serialize(&item).unwrap();
        assert!(blob.starts_with('{'));
        assert_eq!(codec.deserialize(&blob).unwrap(), item);
    }

    #[test]
    fn test_roundtrip_encoded() {
        let codec = ItemCodec::new(true);
        let item = sample_item();

        let blob = codec.serialize(&item).unwrap();
        assert!(blob.is_ascii());
        assert_eq!(codec.deserialize(&blob).unwrap(), item);
    }

    #[test]
    fn test_blob_roundtrip_is_stable() {
        for encode in [false, true] {
            let codec = ItemCodec::new(encode);
            let blob = codec.serialize(&sample_item()).unwrap();
            let again = codec.serialize(&codec.deserialize(&blob).unwrap()).unwrap();
            assert_eq!(blob, again);
        }
    }

    #[test]
    fn test_encoded_codec_reads_plain_json() {
        let plain = ItemCodec::new(false).serialize(&sample_item()).unwrap();
        let item = ItemCodec::new(true).deserialize(&plain).unwrap();
        assert_eq!(item, sample_item());
    }

    #[test]
    fn test_plain_codec_reads_encoded() {
        let encoded = ItemCodec::new(true).serialize(&sample_item()).unwrap();
        let item = ItemCodec::new(false).deserialize(&encoded).unwrap();
        assert_eq!(item, sample_item());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let codec = ItemCodec::new(true);

        assert!(matches!(codec.deserialize("%%% not base64"), Err(CodecError::Decode(_))));
        assert!(matches!(codec.deserialize("{truncated"), Err(CodecError::Decode(_))));
        // Valid base64 of something that is not an item
        let not_item = STANDARD.encode(b"[1,2,3]");
        assert!(matches!(codec.deserialize(&not_item), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_empty_blob_is_decode_error() {
        assert!(ItemCodec::new(true).deserialize("").is_err());
        assert!(ItemCodec::new(false).deserialize("").is_err());
    }
}
