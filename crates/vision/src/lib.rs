pub mod cache;
pub mod llm;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use cache::{CacheStats, CachedVision, ResponseCache};
pub use llm::{GeminiVision, VisionModel};
pub use retry::RetryPolicy;
pub use schema::{Landmark, Recognition, parse_response, strip_code_fences};

use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// The model answered but could not name a landmark
    #[error("no landmark identified: {0}")]
    Unidentified(String),

    /// The answer did not match the expected JSON shape
    #[error("unparseable model response: {0}")]
    Unparseable(String),

    #[error("vision request failed: {0:#}")]
    Request(anyhow::Error),
}

/// Resolves an image to a landmark through an injected vision model.
#[derive(Clone)]
pub struct VisionResolver {
    model: Arc<dyn VisionModel>,
    prompt: String,
}

impl VisionResolver {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            prompt: prompt::build_landmark_prompt(),
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// One outbound call, one strictly parsed answer
    pub async fn resolve(&self, image: &[u8]) -> Result<Landmark, VisionError> {
        let raw = self
            .model
            .describe(&self.prompt, image)
            .await
            .map_err(VisionError::Request)?;

        tracing::debug!(model = self.model.model_id(), raw = %raw, "Vision model answered");

        match parse_response(&raw) {
            Recognition::Recognized(landmark) => Ok(landmark),
            Recognition::Unidentified(reason) => Err(VisionError::Unidentified(reason)),
            Recognition::Unparseable(reason) => Err(VisionError::Unparseable(reason)),
        }
    }
}
