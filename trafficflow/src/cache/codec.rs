//! Value serialization and optional gzip compression.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::traits::TierError;

/// Bytes ready to be stored in a tier.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub compressed: bool,
    /// Serialized size before compression.
    pub original_len: usize,
}

impl Encoded {
    /// Bytes saved by compression (zero when compression did not help).
    pub fn savings(&self) -> u64 {
        self.original_len.saturating_sub(self.bytes.len()) as u64
    }
}

/// JSON codec with gzip above a size threshold.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    compression: bool,
    threshold: usize,
}

impl Codec {
    pub fn new(compression: bool, threshold: usize) -> Self {
        Self {
            compression,
            threshold,
        }
    }

    /// Serializes `value`, compressing it when it exceeds the threshold.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Encoded, TierError> {
        let raw = serde_json::to_vec(value).map_err(|e| TierError::Codec(e.to_string()))?;
        let original_len = raw.len();

        if self.compression && original_len > self.threshold {
            let mut encoder = GzEncoder::new(Vec::with_capacity(original_len / 2), Compression::default());
            encoder
                .write_all(&raw)
                .map_err(|e| TierError::Codec(e.to_string()))?;
            let bytes = encoder
                .finish()
                .map_err(|e| TierError::Codec(e.to_string()))?;
            return Ok(Encoded {
                bytes,
                compressed: true,
                original_len,
            });
        }

        Ok(Encoded {
            bytes: raw,
            compressed: false,
            original_len,
        })
    }

    /// Decodes bytes produced by [`Codec::encode`].
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8], compressed: bool) -> Result<T, TierError> {
        if compressed {
            let mut raw = Vec::with_capacity(bytes.len() * 2);
            GzDecoder::new(bytes)
                .read_to_end(&mut raw)
                .map_err(|e| TierError::Codec(e.to_string()))?;
            serde_json::from_slice(&raw).map_err(|e| TierError::Codec(e.to_string()))
        } else {
            serde_json::from_slice(bytes).map_err(|e| TierError::Codec(e.to_string()))
        }
    }
}
