// src/pipeline/orchestrator.rs
//
// One video, start to finish:
//   name -> raw table -> statistics -> refine -> standardize -> features
//        -> event alignment (optional) -> csv
// Synchronous; the binary fans videos out over a worker pool.

use super::metrics::{VideoOutcome, VideoReport};
use super::video_context::{MergeStatus, VideoContext, VideoInfo};
use crate::alignment::{EventAligner, EventSources, TaskTable};
use crate::error::PipelineError;
use crate::export::write_feature_csv;
use crate::pose_table::RawPoseTable;
use crate::postprocess::{FeatureEngine, FeatureTable, PoseStatistics, Refiner, Standardizer};
use crate::types::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Event data shared by every video of a run
#[derive(Debug, Clone)]
pub enum EventInput {
    /// No event log configured
    Disabled,
    Loaded(Arc<EventSources>),
    /// The configured log could not be read; every video that needs it fails
    Unreadable(String),
}

pub struct PipelineOrchestrator {
    config: Config,
    events: EventInput,
}

impl PipelineOrchestrator {
    pub fn new(config: Config, events: EventInput) -> Self {
        Self { config, events }
    }

    /// Run one video and classify how it ended. Never fails: every error is
    /// folded into the returned report.
    pub fn process(&self, path: &Path) -> (VideoReport, VideoContext) {
        let mut ctx = VideoContext::new(path, self.config.io.fps);

        let outcome = match self.run(&mut ctx) {
            Ok(outcome) => outcome,
            Err(e) if e.is_recoverable() => {
                warn!("Skipping {}: {}", ctx.file_name, e);
                VideoOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                error!("✗ {} failed: {}", ctx.file_name, e);
                VideoOutcome::Failed {
                    kind: e.kind(),
                    reason: e.to_string(),
                }
            }
        };

        let report = VideoReport {
            file: path.display().to_string(),
            frames: ctx.frame_count,
            output: ctx.output.as_ref().map(|p| p.display().to_string()),
            outcome,
        };
        (report, ctx)
    }

    fn run(&self, ctx: &mut VideoContext) -> Result<VideoOutcome, PipelineError> {
        ctx.info = Some(VideoInfo::from_path(&ctx.path)?);

        let raw = RawPoseTable::read_csv(&ctx.path, self.config.io.header_rows)?;
        ctx.frame_count = raw.len();
        ctx.statistics = Some(PoseStatistics::compute(&raw, self.config.refine.confidence_cutoff));

        let features = self.postprocess(&raw)?;
        let task = self.merge_events(ctx, &features)?;

        let output = self.output_path(&ctx.path);
        write_feature_csv(&output, &features, task.as_ref())?;
        ctx.output = Some(output);

        let outcome = match &ctx.merge {
            MergeStatus::Merged { trials } => VideoOutcome::Merged { trials: *trials },
            MergeStatus::Unaligned { reason } => VideoOutcome::FeaturesOnly {
                reason: reason.clone(),
            },
            MergeStatus::Disabled | MergeStatus::Pending => VideoOutcome::FeaturesOnly {
                reason: "no event log configured".to_string(),
            },
        };
        info!("✓ {}: {} frames, {:?}", ctx.file_name, ctx.frame_count, ctx.merge);
        Ok(outcome)
    }

    /// Refine, standardize and derive features from a raw table
    pub fn postprocess(&self, raw: &RawPoseTable) -> Result<FeatureTable, PipelineError> {
        let refined = Refiner::new(self.config.refine.clone()).refine(raw)?;
        debug!("Refined {} frames", refined.len());
        let standardized = Standardizer::new(self.config.standardize.clone()).standardize(&refined)?;
        FeatureEngine::new(self.config.features.clone()).compute(&standardized)
    }

    /// Alignment misses leave the video unmerged; other errors abort it.
    fn merge_events(
        &self,
        ctx: &mut VideoContext,
        features: &FeatureTable,
    ) -> Result<Option<TaskTable>, PipelineError> {
        let sources = match &self.events {
            EventInput::Disabled => {
                ctx.merge = MergeStatus::Disabled;
                return Ok(None);
            }
            EventInput::Unreadable(reason) => {
                return Err(PipelineError::EventLogUnreadable(reason.clone()));
            }
            EventInput::Loaded(sources) => sources,
        };
        let info = ctx.info()?.clone();
        let aligner = EventAligner::new(self.config.alignment.clone(), self.config.io.fps);

        match aligner.align_video(sources, &info.mouse_id, &info.exp_date, &features.frames) {
            Ok(task) => {
                ctx.offset = Some(task.offset);
                ctx.merge = MergeStatus::Merged {
                    trials: task.trials.trials.len(),
                };
                Ok(Some(task))
            }
            Err(e @ PipelineError::AlignmentMiss { .. }) => {
                warn!("{}: {}; writing features without task columns", ctx.file_name, e);
                ctx.merge = MergeStatus::Unaligned {
                    reason: e.to_string(),
                };
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Mirror the input's location below `input_dir` under `output_dir`, so
    /// same-named tables in different folders never share an output file.
    fn output_path(&self, input: &Path) -> PathBuf {
        let relative = input
            .strip_prefix(&self.config.io.input_dir)
            .ok()
            .filter(|r| r.file_name().is_some())
            .or_else(|| input.file_name().map(Path::new))
            .unwrap_or(input);
        Path::new(&self.config.io.output_dir).join(relative.with_extension("csv"))
    }
}
