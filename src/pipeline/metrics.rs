// src/pipeline/metrics.rs
//
// Run-level bookkeeping. Workers record their outcome as they finish; the
// summary is exported once the whole folder is done.

use crate::error::ErrorKind;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VideoOutcome {
    /// Features and task columns written
    Merged { trials: usize },
    /// Features written without task columns
    FeaturesOnly { reason: String },
    /// Not processed (unparsable name)
    Skipped { reason: String },
    Failed { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoReport {
    pub file: String,
    pub frames: usize,
    pub output: Option<String>,
    #[serde(flatten)]
    pub outcome: VideoOutcome,
}

impl VideoReport {
    /// Report for a video whose worker died before producing one
    pub fn crashed(file: String, reason: String) -> Self {
        Self {
            file,
            frames: 0,
            output: None,
            outcome: VideoOutcome::Failed {
                kind: ErrorKind::Internal,
                reason,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub merged: Arc<AtomicU64>,
    pub features_only: Arc<AtomicU64>,
    pub skipped: Arc<AtomicU64>,
    pub failed: Arc<AtomicU64>,
    pub total_frames: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            merged: Arc::new(AtomicU64::new(0)),
            features_only: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            total_frames: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn record(&self, report: &VideoReport) {
        let counter = match report.outcome {
            VideoOutcome::Merged { .. } => &self.merged,
            VideoOutcome::FeaturesOnly { .. } => &self.features_only,
            VideoOutcome::Skipped { .. } => &self.skipped,
            VideoOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_frames
            .fetch_add(report.frames as u64, Ordering::Relaxed);
    }

    pub fn summary(&self, mut videos: Vec<VideoReport>) -> RunSummary {
        videos.sort_by(|a, b| a.file.cmp(&b.file));
        RunSummary {
            total: videos.len(),
            merged: self.merged.load(Ordering::Relaxed),
            features_only: self.features_only.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            total_frames: self.total_frames.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            videos,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub merged: u64,
    pub features_only: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total_frames: u64,
    pub elapsed_secs: f64,
    pub videos: Vec<VideoReport>,
}

impl RunSummary {
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
