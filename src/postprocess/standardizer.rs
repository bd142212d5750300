// src/postprocess/standardizer.rs
//
// Maps refined pixel coordinates into the chamber frame:
//   1. flip y so it increases upward
//   2. pin each reference point to its whole-video median
//   3. translate so the origin corner sits at (0,0)
//   4. rotate + scale so the scale-reference corner lands on
//      (scale_length, 0)
// One similarity transform per video, applied to every keypoint.

use super::geometry::round_all;
use crate::error::PipelineError;
use crate::pose_table::{CoordinateSpace, PoseTable};
use crate::types::{Keypoint, StandardizeConfig};
use tracing::debug;

/// Rotation + uniform scale about the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub cos: f64,
    pub sin: f64,
    pub scale: f64,
}

impl SimilarityTransform {
    /// Transform taking `reference` onto (`length`, 0)
    pub fn aligning(reference: (f64, f64), length: f64) -> Option<Self> {
        let (adj, y) = reference;
        let hyp = adj.hypot(y);
        if !(hyp > f64::EPSILON) {
            return None;
        }
        Some(Self {
            cos: adj / hyp,
            sin: -y / hyp,
            scale: length / hyp,
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.scale * (self.cos * x - self.sin * y),
            self.scale * (self.sin * x + self.cos * y),
        )
    }

    /// Rotation angle in degrees, for logging
    pub fn angle_degrees(&self) -> f64 {
        self.sin.atan2(self.cos).to_degrees()
    }
}

pub struct Standardizer {
    config: StandardizeConfig,
}

impl Standardizer {
    pub fn new(config: StandardizeConfig) -> Self {
        Self { config }
    }

    pub fn standardize(&self, refined: &PoseTable) -> Result<PoseTable, PipelineError> {
        refined.require(CoordinateSpace::Pixels)?;
        let mut table = refined.clone();

        for track in &mut table.tracks {
            for y in &mut track.y {
                *y = -*y;
            }
        }

        for kp in Keypoint::ALL.iter().filter(|k| k.is_reference()) {
            let track = table.track_mut(*kp);
            let (mx, my) = (median_of(&track.x), median_of(&track.y));
            track.x.iter_mut().for_each(|v| *v = mx);
            track.y.iter_mut().for_each(|v| *v = my);
        }

        let (ox, oy) = if table.is_empty() {
            (0.0, 0.0)
        } else {
            table.track(self.config.origin).point(0)
        };
        for track in &mut table.tracks {
            track.x.iter_mut().for_each(|v| *v -= ox);
            track.y.iter_mut().for_each(|v| *v -= oy);
        }

        let reference = if table.is_empty() {
            (0.0, 0.0)
        } else {
            table.track(self.config.scale_reference).point(0)
        };
        let transform = SimilarityTransform::aligning(reference, self.config.scale_length)
            .ok_or(PipelineError::DegenerateReference {
                origin: self.config.origin.as_str(),
                reference: self.config.scale_reference.as_str(),
            })?;
        debug!(
            "Reference frame: rotation {:.2} deg, scale {:.5} per px",
            transform.angle_degrees(),
            transform.scale
        );

        for track in &mut table.tracks {
            for (x, y) in track.x.iter_mut().zip(track.y.iter_mut()) {
                let (tx, ty) = transform.apply(*x, *y);
                *x = tx;
                *y = ty;
            }
            round_all(&mut track.x, self.config.decimals);
            round_all(&mut track.y, self.config.decimals);
        }

        table.space = CoordinateSpace::Physical;
        Ok(table)
    }
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        _ => sorted[n / 2],
    }
}
