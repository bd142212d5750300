// src/error.rs

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Column {column} has no valid samples to interpolate from")]
    EmptyColumn { column: String },

    #[error("Reference points {origin} and {reference} coincide; cannot build reference frame")]
    DegenerateReference {
        origin: &'static str,
        reference: &'static str,
    },

    #[error("No event log entry for subject {subject} on {date}")]
    AlignmentMiss { subject: String, date: String },

    #[error("File name does not match the naming convention: {0}")]
    NameParse(String),

    #[error("Event log session {subject}/{date}: {reason}")]
    EventLogFormat {
        subject: String,
        date: String,
        reason: String,
    },

    #[error("Event log unavailable: {0}")]
    EventLogUnreadable(String),

    #[error("Malformed pose table {path}: {reason}")]
    PoseTableFormat { path: String, reason: String },

    #[error("Stage boundary violated: {0}")]
    Stage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataQuality,
    AlignmentMiss,
    Parse,
    Format,
    Io,
    /// The worker processing the video panicked
    Internal,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyColumn { .. } | Self::DegenerateReference { .. } => ErrorKind::DataQuality,
            Self::AlignmentMiss { .. } => ErrorKind::AlignmentMiss,
            Self::NameParse(_) => ErrorKind::Parse,
            Self::EventLogFormat { .. }
            | Self::EventLogUnreadable(_)
            | Self::PoseTableFormat { .. }
            | Self::Stage(_) => ErrorKind::Format,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Recoverable errors skip part of a video's work; the rest continue
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::AlignmentMiss | ErrorKind::Parse)
    }
}
