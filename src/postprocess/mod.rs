// src/postprocess/mod.rs

pub mod features;
pub mod geometry;
pub mod refiner;
pub mod standardizer;
pub mod statistics;

pub use features::{FeatureEngine, FeatureTable};
pub use refiner::Refiner;
pub use standardizer::Standardizer;
pub use statistics::PoseStatistics;
