use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One photograph of a batch: its identifier (usually the file name) and raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    pub source_id: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(source_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source_id: source_id.into(),
            bytes,
        }
    }

    /// SHA-256 of the image bytes, hex encoded
    pub fn content_digest(&self) -> String {
        content_digest(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Whether a file name carries one of the supported image extensions.
pub fn is_supported_image(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}
