pub mod orchestrator;
pub mod path;
pub mod point;
pub mod report;

pub use orchestrator::{
    BatchReport, FailureKind, ImageOutcome, Orchestrator, ResolutionCounts, UnresolvedImage,
};
pub use path::{PathOrdering, PathSegment, PathSummary, assemble};
pub use point::{METADATA_LABEL, Provenance, ResolveError, ResolvedPoint};
pub use report::TrailReport;

use ingest::{BatchInputError, ImageInput};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Resolve a batch and assemble its movement path
pub async fn build_trail(
    orchestrator: &Orchestrator,
    images: Vec<ImageInput>,
) -> Result<TrailReport, BatchInputError> {
    build_trail_with_cancel(orchestrator, images, CancellationToken::new()).await
}

pub async fn build_trail_with_cancel(
    orchestrator: &Orchestrator,
    images: Vec<ImageInput>,
    cancel: CancellationToken,
) -> Result<TrailReport, BatchInputError> {
    let batch = orchestrator.resolve_batch_with_cancel(images, cancel).await?;
    Ok(TrailReport::from_batch(batch))
}

/// Load a folder of images and build its trail
pub async fn build_trail_from_dir(
    orchestrator: &Orchestrator,
    dir: &Path,
) -> Result<TrailReport, BatchInputError> {
    let images = ingest::ingest_directory(dir).await?;
    build_trail(orchestrator, images).await
}
