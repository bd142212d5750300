// src/pipeline/mod.rs

pub mod metrics;
pub mod orchestrator;
pub mod video_context;

pub use metrics::{RunMetrics, VideoReport};
pub use orchestrator::{EventInput, PipelineOrchestrator};
pub use video_context::VideoContext;
