use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use trail::TrailReport;
use vision::VisionModel;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_batch_time_us: AtomicU64,
    total_vision_time_us: AtomicU64,

    // Counts
    images_processed: AtomicUsize,
    metadata_points: AtomicUsize,
    vision_points: AtomicUsize,
    unresolved_images: AtomicUsize,
    cancelled_images: AtomicUsize,
    vision_calls: AtomicUsize,
    failed_vision_calls: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_batch_time_us: AtomicU64::new(0),
            total_vision_time_us: AtomicU64::new(0),
            images_processed: AtomicUsize::new(0),
            metadata_points: AtomicUsize::new(0),
            vision_points: AtomicUsize::new(0),
            unresolved_images: AtomicUsize::new(0),
            cancelled_images: AtomicUsize::new(0),
            vision_calls: AtomicUsize::new(0),
            failed_vision_calls: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_batch(&self, duration: Duration, report: &TrailReport) {
        self.total_batch_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        let counts = report.counts;
        let images = counts.metadata + counts.vision + counts.unresolved + report.cancelled.len();
        self.images_processed.fetch_add(images, Ordering::Relaxed);
        self.metadata_points.fetch_add(counts.metadata, Ordering::Relaxed);
        self.vision_points.fetch_add(counts.vision, Ordering::Relaxed);
        self.unresolved_images.fetch_add(counts.unresolved, Ordering::Relaxed);
        self.cancelled_images
            .fetch_add(report.cancelled.len(), Ordering::Relaxed);
    }

    pub fn record_vision_call(&self, duration: Duration, success: bool) {
        self.total_vision_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.vision_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_vision_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_batch_time_ms: avg_time_ms(&self.total_batch_time_us, &self.successful_requests),
            avg_vision_time_ms: avg_time_ms(&self.total_vision_time_us, &self.vision_calls),
            images_processed: self.images_processed.load(Ordering::Relaxed),
            metadata_points: self.metadata_points.load(Ordering::Relaxed),
            vision_points: self.vision_points.load(Ordering::Relaxed),
            unresolved_images: self.unresolved_images.load(Ordering::Relaxed),
            cancelled_images: self.cancelled_images.load(Ordering::Relaxed),
            vision_calls: self.vision_calls.load(Ordering::Relaxed),
            failed_vision_calls: self.failed_vision_calls.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = count.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 {
        total / cnt / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_batch_time_ms: f64,
    pub avg_vision_time_ms: f64,
    pub images_processed: usize,
    pub metadata_points: usize,
    pub vision_points: usize,
    pub unresolved_images: usize,
    pub cancelled_images: usize,
    pub vision_calls: usize,
    pub failed_vision_calls: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Records latency and failures of every call that reaches the wrapped model.
pub struct MeteredVision<M> {
    inner: M,
    metrics: Arc<Metrics>,
}

impl<M: VisionModel> MeteredVision<M> {
    pub fn new(inner: M, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<M: VisionModel> VisionModel for MeteredVision<M> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn describe(&self, prompt: &str, image: &[u8]) -> Result<String> {
        let timer = TimedOperation::start();
        let result = self.inner.describe(prompt, image).await;
        self.metrics
            .record_vision_call(timer.elapsed(), result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky;

    #[async_trait]
    impl VisionModel for Flaky {
        fn model_id(&self) -> &str {
            "flaky"
        }

        async fn describe(&self, _prompt: &str, image: &[u8]) -> Result<String> {
            if image.is_empty() {
                anyhow::bail!("no image");
            }
            Ok("{}".to_string())
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();

        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.avg_batch_time_ms, 0.0);
        assert_eq!(snapshot.avg_vision_time_ms, 0.0);
    }

    #[test]
    fn test_request_and_batch_counters() {
        let metrics = Metrics::new();
        let report: TrailReport = serde_json::from_value(serde_json::json!({
            "run_id": "6f1c2a3e-8d4b-4c1a-9e2f-0a1b2c3d4e5f",
            "points": [],
            "total_distance_km": 0.0,
            "ordering": "input_order",
            "counts": { "metadata": 2, "vision": 1, "unresolved": 3 },
            "unresolved": [],
            "cancelled": ["late.jpg"]
        }))
        .unwrap();

        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_batch(Duration::from_millis(40), &report);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.images_processed, 7);
        assert_eq!(snapshot.metadata_points, 2);
        assert_eq!(snapshot.unresolved_images, 3);
        assert_eq!(snapshot.cancelled_images, 1);
        assert!((snapshot.avg_batch_time_ms - 40.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_metered_vision_counts_calls() {
        let metrics = Metrics::new();
        let model = MeteredVision::new(Flaky, metrics.clone());

        assert!(model.describe("p", b"img").await.is_ok());
        assert!(model.describe("p", b"").await.is_err());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.vision_calls, 2);
        assert_eq!(snapshot.failed_vision_calls, 1);
        assert_eq!(model.model_id(), "flaky");
    }
}
