// src/pipeline/video_context.rs
//
// Typed per-video record. Each stage fills in its part; later stages read
// from here instead of re-deriving anything from the file name or tables.

use crate::error::PipelineError;
use crate::postprocess::PoseStatistics;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// `<mouse> - <chamber> - <yy-mm-dd> <hh-mm>[ suffix]`
static VIDEO_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+) - (\S+) - (\d{2}-\d{2}-\d{2}) (\d{2}-\d{2})\s?(\S*)").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub mouse_id: String,
    pub chamber: String,
    /// Date with separators removed, e.g. `210301`
    pub exp_date: String,
    /// Start time with separators removed, e.g. `1030`
    pub time: String,
    pub suffix: String,
}

impl VideoInfo {
    pub fn from_name(name: &str) -> Result<Self, PipelineError> {
        let caps = VIDEO_NAME_RE
            .captures(name)
            .ok_or_else(|| PipelineError::NameParse(name.to_string()))?;
        let group = |i: usize| {
            caps.get(i)
                .map(|m| m.as_str().replace('-', ""))
                .unwrap_or_default()
        };
        Ok(Self {
            mouse_id: group(1),
            chamber: group(2),
            exp_date: group(3),
            time: group(4),
            suffix: group(5),
        })
    }

    /// Parse the file stem of a pose table path
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PipelineError::NameParse(path.display().to_string()))?;
        Self::from_name(stem)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeStatus {
    Pending,
    /// No event log configured for this run
    Disabled,
    Merged { trials: usize },
    Unaligned { reason: String },
}

#[derive(Debug, Clone)]
pub struct VideoContext {
    pub path: PathBuf,
    pub file_name: String,
    pub info: Option<VideoInfo>,
    pub fps: f64,
    pub statistics: Option<PoseStatistics>,
    pub frame_count: usize,
    pub offset: Option<f64>,
    pub merge: MergeStatus,
    pub output: Option<PathBuf>,
}

impl VideoContext {
    pub fn new(path: &Path, fps: f64) -> Self {
        let file_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            file_name,
            info: None,
            fps,
            statistics: None,
            frame_count: 0,
            offset: None,
            merge: MergeStatus::Pending,
            output: None,
        }
    }

    pub fn info(&self) -> Result<&VideoInfo, PipelineError> {
        self.info
            .as_ref()
            .ok_or_else(|| PipelineError::Stage(format!("{}: name not parsed yet", self.file_name)))
    }
}
