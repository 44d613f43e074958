use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::{BatchReport, ResolutionCounts, UnresolvedImage};
use crate::path::{self, PathOrdering, PathSegment, PathSummary};
use crate::point::ResolvedPoint;

/// Everything a rendering or export layer needs about one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailReport {
    pub run_id: Uuid,
    pub points: Vec<ResolvedPoint>,
    pub total_distance_km: f64,
    pub ordering: PathOrdering,
    pub counts: ResolutionCounts,
    pub unresolved: Vec<UnresolvedImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cancelled: Vec<String>,
}

impl TrailReport {
    /// Assemble the path once every image of the batch has finished
    pub fn from_batch(batch: BatchReport) -> Self {
        let counts = batch.counts();
        let summary = path::assemble(batch.points);

        tracing::info!(
            run_id = %batch.run_id,
            points = summary.len(),
            total_distance_km = summary.total_distance_km,
            ordering = ?summary.ordering,
            "Assembled movement path"
        );

        Self {
            run_id: batch.run_id,
            points: summary.ordered_points,
            total_distance_km: summary.total_distance_km,
            ordering: summary.ordering,
            counts,
            unresolved: batch.unresolved,
            cancelled: batch.cancelled,
        }
    }

    pub fn summary(&self) -> PathSummary {
        PathSummary {
            ordered_points: self.points.clone(),
            total_distance_km: self.total_distance_km,
            ordering: self.ordering,
        }
    }

    pub fn segments(&self) -> Vec<PathSegment> {
        self.summary().segments()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
