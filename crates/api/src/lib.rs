pub mod config;
pub mod metrics;
pub mod routes;
pub mod telemetry;

use anyhow::{Result, bail};
use ingest::{BatchInputError, ImageInput};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trail::{Orchestrator, TrailReport};
use vision::{CacheStats, CachedVision, GeminiVision, ResponseCache, RetryPolicy, VisionModel, VisionResolver};

use config::AppConfig;
use metrics::{MeteredVision, Metrics, MetricsSnapshot, TimedOperation};

/// The configured trail builder shared by the server and the CLI.
pub struct Pipeline {
    orchestrator: Orchestrator,
    cache: Option<ResponseCache>,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    /// Connect to the hosted vision model described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if config.vision.api_key.trim().is_empty() {
            bail!("GEMINI_API_KEY is not set");
        }

        let retry = RetryPolicy::new(
            config.retry.max_retries,
            config.retry.initial_backoff_ms,
            config.retry.max_backoff_ms,
        );
        let model = GeminiVision::new(
            config.vision.base_url.clone(),
            config.vision.model.clone(),
            config.vision.api_key.clone(),
            Duration::from_secs(config.vision.request_timeout_secs),
            retry,
        )?;

        Ok(Self::with_model(model, config))
    }

    /// Build around any model. Cache hits never reach the metered model.
    pub fn with_model<M: VisionModel + 'static>(model: M, config: &AppConfig) -> Self {
        let metrics = Metrics::new();
        let metered = MeteredVision::new(model, metrics.clone());

        let (model, cache): (Arc<dyn VisionModel>, Option<ResponseCache>) = if config.cache.enabled {
            let cache = ResponseCache::new(config.cache.max_entries);
            (Arc::new(CachedVision::new(metered, cache.clone())), Some(cache))
        } else {
            (Arc::new(metered), None)
        };

        let orchestrator = Orchestrator::new(
            VisionResolver::new(model),
            config.concurrency.max_concurrent_vision_calls,
        );

        Self {
            orchestrator,
            cache,
            metrics,
        }
    }

    pub async fn run(
        &self,
        images: Vec<ImageInput>,
        cancel: CancellationToken,
    ) -> Result<TrailReport, BatchInputError> {
        let timer = TimedOperation::start();
        let result = trail::build_trail_with_cancel(&self.orchestrator, images, cancel).await;
        self.record(&timer, &result);
        result
    }

    pub async fn run_dir(
        &self,
        dir: &Path,
        cancel: CancellationToken,
    ) -> Result<TrailReport, BatchInputError> {
        let images = match ingest::ingest_directory(dir).await {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!(dir = ?dir, error = %e, "Rejected image batch");
                self.metrics.record_request(false);
                return Err(e);
            }
        };
        self.run(images, cancel).await
    }

    fn record(&self, timer: &TimedOperation, result: &Result<TrailReport, BatchInputError>) {
        match result {
            Ok(report) => {
                self.metrics.record_request(true);
                self.metrics.record_batch(timer.elapsed(), report);
            }
            Err(_) => self.metrics.record_request(false),
        }
    }

    pub fn model_id(&self) -> &str {
        self.orchestrator.model_id()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ResponseCache::stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Eiffel;

    #[async_trait]
    impl VisionModel for Eiffel {
        fn model_id(&self) -> &str {
            "eiffel"
        }

        async fn describe(&self, _prompt: &str, _image: &[u8]) -> Result<String> {
            Ok(r#"{"name":"Eiffel Tower","lat":48.8584,"lng":2.2945,"desc":"Iron tower"}"#.to_string())
        }
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let err = Pipeline::from_config(&AppConfig::default()).err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_repeated_image_served_from_cache() {
        let pipeline = Pipeline::with_model(Eiffel, &AppConfig::default());
        let images = vec![
            ImageInput::new("one.jpg".to_string(), b"same".to_vec()),
            ImageInput::new("two.jpg".to_string(), b"same".to_vec()),
        ];

        let report = pipeline.run(images, CancellationToken::new()).await.unwrap();

        assert_eq!(report.counts.vision, 2);
        let metrics = pipeline.metrics();
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.images_processed, 2);
        // The second lookup may race the first call, so only bound it
        assert!(metrics.vision_calls >= 1 && metrics.vision_calls <= 2);
        assert_eq!(pipeline.cache_stats().unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_cache_disabled_in_accurate_mode() {
        let pipeline = Pipeline::with_model(Eiffel, &AppConfig::accurate_mode());
        let images = vec![
            ImageInput::new("one.jpg".to_string(), b"same".to_vec()),
            ImageInput::new("two.jpg".to_string(), b"same".to_vec()),
        ];

        pipeline.run(images, CancellationToken::new()).await.unwrap();

        assert!(pipeline.cache_stats().is_none());
        assert_eq!(pipeline.metrics().vision_calls, 2);
    }

    #[tokio::test]
    async fn test_bad_folder_counted_as_failure() {
        let pipeline = Pipeline::with_model(Eiffel, &AppConfig::default());
        let dir = tempfile::tempdir().unwrap();

        let err = pipeline
            .run_dir(dir.path(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BatchInputError::Empty));
        assert_eq!(pipeline.metrics().failed_requests, 1);
    }
}
