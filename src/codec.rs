//! Artifact codec
//!
//! Turns the recorded container into a `data:` URI that can travel inside a
//! structured message, and back.

use crate::utils::error::{CaptureError, CaptureResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Recorded container bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Blob {
    /// Concatenate encoded chunks in arrival order
    pub fn from_chunks(chunks: &[Vec<u8>], mime_type: impl Into<String>) -> Self {
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(chunk);
        }
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Final recording, transferred by value between contexts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// `data:<mime>;base64,<payload>`
    pub encoded_data: String,

    pub mime_type: String,
}

/// Encode a blob as a self-describing data URI
pub fn encode(blob: &Blob) -> Artifact {
    let payload = STANDARD.encode(&blob.bytes);
    Artifact {
        encoded_data: format!("data:{};base64,{}", blob.mime_type, payload),
        mime_type: blob.mime_type.clone(),
    }
}

/// Encode off the async scheduler; artifacts are materialized whole in memory
pub async fn encode_blocking(blob: Blob) -> CaptureResult<Artifact> {
    tokio::task::spawn_blocking(move || encode(&blob))
        .await
        .map_err(|e| CaptureError::Platform(format!("Artifact encoding task failed: {}", e)))
}

/// Reconstruct the original bytes from an artifact
pub fn decode(artifact: &Artifact) -> CaptureResult<Vec<u8>> {
    let rest = artifact
        .encoded_data
        .strip_prefix("data:")
        .ok_or_else(|| CaptureError::Decode("missing data: scheme".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CaptureError::Decode("missing payload separator".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(CaptureError::Decode(format!(
            "unsupported encoding in header '{}'",
            header
        )));
    }

    STANDARD
        .decode(payload)
        .map_err(|e| CaptureError::Decode(e.to_string()))
}
