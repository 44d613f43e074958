use futures::FutureExt;
use ingest::{BatchInputError, ImageInput};
use locate::LocateError;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vision::{VisionError, VisionResolver};

use crate::point::{Provenance, ResolvedPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The vision model could not name a landmark
    Unidentified,
    /// The vision call failed or its answer was unusable
    ResolverError,
    /// The vision answer had out-of-range coordinates
    InvalidCoordinates,
    /// Resolution panicked
    Crashed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedImage {
    pub source_id: String,
    pub reason: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Resolved(ResolvedPoint),
    Unresolved(UnresolvedImage),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionCounts {
    pub metadata: usize,
    pub vision: usize,
    pub unresolved: usize,
}

/// Per-image results of one batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub points: Vec<ResolvedPoint>,
    pub unresolved: Vec<UnresolvedImage>,
    /// Images abandoned by cancellation
    pub cancelled: Vec<String>,
}

impl BatchReport {
    pub fn counts(&self) -> ResolutionCounts {
        let metadata = self
            .points
            .iter()
            .filter(|p| p.provenance == Provenance::Metadata)
            .count();
        ResolutionCounts {
            metadata,
            vision: self.points.len() - metadata,
            unresolved: self.unresolved.len(),
        }
    }
}

/// Metadata first, vision second, for every image of a batch.
///
/// Clones share one pool of vision-call permits.
#[derive(Clone)]
pub struct Orchestrator {
    vision: VisionResolver,
    max_concurrency: usize,
    vision_permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(vision: VisionResolver, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            vision,
            max_concurrency,
            vision_permits: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    pub fn model_id(&self) -> &str {
        self.vision.model_id()
    }

    /// Resolve one image. Never fails: an image that cannot be located is
    /// reported as unresolved.
    pub async fn resolve_image(&self, image: &ImageInput) -> ImageOutcome {
        let source_id = image.source_id.as_str();
        let reading = locate::locate(&image.bytes);
        let captured_at = reading.captured_at;

        match reading.position {
            Ok(fix) => match ResolvedPoint::from_metadata(source_id, fix, captured_at) {
                Ok(point) => {
                    tracing::info!(
                        source_id,
                        latitude = point.latitude,
                        longitude = point.longitude,
                        "Resolved from GPS metadata"
                    );
                    return ImageOutcome::Resolved(point);
                }
                Err(e) => {
                    tracing::warn!(source_id, error = %e, "Unusable GPS metadata, trying vision")
                }
            },
            Err(LocateError::NotPresent) => {
                tracing::debug!(source_id, "No GPS metadata, trying vision");
            }
            Err(LocateError::Malformed(e)) => {
                tracing::warn!(source_id, error = %e, "Malformed GPS metadata, trying vision");
            }
        }

        let answer = {
            let Ok(_permit) = self.vision_permits.acquire().await else {
                return crashed(source_id, "vision pool closed");
            };
            self.vision.resolve(&image.bytes).await
        };

        let landmark = match answer {
            Ok(landmark) => landmark,
            Err(e) => {
                let reason = match e {
                    VisionError::Unidentified(_) => FailureKind::Unidentified,
                    VisionError::Unparseable(_) | VisionError::Request(_) => {
                        FailureKind::ResolverError
                    }
                };
                return unresolved(source_id, reason, e.to_string());
            }
        };

        match ResolvedPoint::from_vision(source_id, landmark, captured_at) {
            Ok(point) => {
                tracing::info!(
                    source_id,
                    name = %point.name,
                    latitude = point.latitude,
                    longitude = point.longitude,
                    "Resolved by vision model"
                );
                ImageOutcome::Resolved(point)
            }
            Err(e) => unresolved(source_id, FailureKind::InvalidCoordinates, e.to_string()),
        }
    }

    pub async fn resolve_batch(
        &self,
        images: Vec<ImageInput>,
    ) -> Result<BatchReport, BatchInputError> {
        self.resolve_batch_with_cancel(images, CancellationToken::new())
            .await
    }

    /// Resolve every image independently with bounded parallelism.
    ///
    /// Cancelling abandons in-flight and unscheduled images; whatever already
    /// resolved is still returned.
    pub async fn resolve_batch_with_cancel(
        &self,
        images: Vec<ImageInput>,
        cancel: CancellationToken,
    ) -> Result<BatchReport, BatchInputError> {
        if images.is_empty() {
            return Err(BatchInputError::Empty);
        }

        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            images = images.len(),
            max_concurrency = self.max_concurrency,
            "Starting batch resolution"
        );

        let source_ids: Vec<String> = images.iter().map(|i| i.source_id.clone()).collect();
        let mut outcomes: Vec<Option<ImageOutcome>> = vec![None; images.len()];

        let mut tasks = JoinSet::new();

        for (index, image) in images.into_iter().enumerate() {
            let this = self.clone();
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(this.resolve_image(&image))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| crashed(&image.source_id, "resolution panicked"));
                (index, outcome)
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(%run_id, "Batch cancelled, abandoning remaining images");
                    tasks.abort_all();
                    // Tasks that finished before the abort still count
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok((index, outcome)) = joined {
                            outcomes[index] = Some(outcome);
                        }
                    }
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, outcome))) => outcomes[index] = Some(outcome),
                    Some(Err(e)) => tracing::error!(%run_id, error = %e, "Resolution task failed"),
                    None => break,
                },
            }
        }

        let mut report = BatchReport {
            run_id,
            points: Vec::new(),
            unresolved: Vec::new(),
            cancelled: Vec::new(),
        };

        for (source_id, outcome) in source_ids.into_iter().zip(outcomes) {
            match outcome {
                Some(ImageOutcome::Resolved(point)) => report.points.push(point),
                Some(ImageOutcome::Unresolved(failure)) => report.unresolved.push(failure),
                None if cancel.is_cancelled() => report.cancelled.push(source_id),
                None => report.unresolved.push(UnresolvedImage {
                    source_id,
                    reason: FailureKind::Crashed,
                    detail: "resolution task did not complete".to_string(),
                }),
            }
        }

        let counts = report.counts();
        tracing::info!(
            %run_id,
            metadata = counts.metadata,
            vision = counts.vision,
            unresolved = counts.unresolved,
            cancelled = report.cancelled.len(),
            "Batch resolution finished"
        );

        Ok(report)
    }
}

fn unresolved(source_id: &str, reason: FailureKind, detail: String) -> ImageOutcome {
    tracing::warn!(source_id, reason = ?reason, detail = %detail, "Image left unresolved");
    ImageOutcome::Unresolved(UnresolvedImage {
        source_id: source_id.to_string(),
        reason,
        detail,
    })
}

fn crashed(source_id: &str, detail: &str) -> ImageOutcome {
    unresolved(source_id, FailureKind::Crashed, detail.to_string())
}
