// src/postprocess/statistics.rs
//
// Pose-estimation quality audit, computed on the raw table before any
// refinement. A sample counts as dropped when its confidence is missing or
// below the refinement cutoff.

use super::geometry::round_to;
use crate::pose_table::{RawPoseTable, RawTrack};
use crate::types::Keypoint;

/// Column labels written under each keypoint in the statistics file
pub const STAT_LABELS: [&str; 5] = ["#of0", "%of0", "cons", "1stQ", "10thQ"];

#[derive(Debug, Clone, PartialEq)]
pub struct KeypointStats {
    pub keypoint: Keypoint,
    pub dropped: usize,
    pub dropped_pct: f64,
    pub longest_run: usize,
    pub p1: f64,
    pub p10: f64,
}

impl KeypointStats {
    pub fn values(&self) -> [f64; 5] {
        [
            self.dropped as f64,
            self.dropped_pct,
            self.longest_run as f64,
            self.p1,
            self.p10,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseStatistics {
    pub frames: usize,
    pub keypoints: Vec<KeypointStats>,
}

impl PoseStatistics {
    pub fn compute(raw: &RawPoseTable, cutoff: f64) -> Self {
        Self {
            frames: raw.len(),
            keypoints: raw.tracks.iter().map(|t| track_stats(t, cutoff)).collect(),
        }
    }
}

fn track_stats(track: &RawTrack, cutoff: f64) -> KeypointStats {
    let n = track.confidence.len();
    let mut dropped = 0;
    let mut run = 0;
    let mut longest_run = 0;

    for c in &track.confidence {
        if matches!(c, Some(c) if *c >= cutoff) {
            run = 0;
        } else {
            dropped += 1;
            run += 1;
            longest_run = longest_run.max(run);
        }
    }

    let mut sorted: Vec<f64> = track.confidence.iter().map(|c| c.unwrap_or(0.0)).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let dropped_pct = if n == 0 {
        0.0
    } else {
        round_to(dropped as f64 / n as f64 * 100.0, 2)
    };

    KeypointStats {
        keypoint: track.keypoint,
        dropped,
        dropped_pct,
        longest_run,
        p1: round_to(percentile(&sorted, 0.01), 2),
        p10: round_to(percentile(&sorted, 0.10), 2),
    }
}

/// Linear-interpolated quantile of an ascending slice
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose_table::testing::raw_table;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_percentile_interpolates() {
        let values: Vec<f64> = (0..=10).map(|v| v as f64).collect();
        assert!(approx_eq(percentile(&values, 0.1), 1.0));
        assert!(approx_eq(percentile(&values, 0.01), 0.1));
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_dropped_counts_and_runs() {
        let mut raw = raw_table(10, |_, _| (1.0, 1.0));
        let conf = &mut raw.tracks[Keypoint::Snout.index()].confidence;
        conf[1] = Some(0.05);
        conf[4] = None;
        conf[5] = Some(0.0);
        conf[6] = Some(0.09);

        let stats = PoseStatistics::compute(&raw, 0.1);
        assert_eq!(stats.frames, 10);
        let snout = &stats.keypoints[Keypoint::Snout.index()];
        assert_eq!(snout.dropped, 4);
        assert_eq!(snout.dropped_pct, 40.0);
        assert_eq!(snout.longest_run, 3);
        // missing confidence counts as 0 for percentiles
        assert!(approx_eq(snout.p1, 0.0));

        let tail = &stats.keypoints[Keypoint::Tail3.index()];
        assert_eq!(tail.dropped, 0);
        assert_eq!(tail.longest_run, 0);
        assert!(approx_eq(tail.p10, 0.99));
    }

    #[test]
    fn test_percentiles_rounded_to_two_decimals() {
        let mut raw = raw_table(11, |_, _| (1.0, 1.0));
        let conf = &mut raw.tracks[Keypoint::Spine1.index()].confidence;
        for (i, c) in conf.iter_mut().enumerate() {
            *c = Some(0.5 + i as f64 * 0.0123);
        }

        let stats = PoseStatistics::compute(&raw, 0.1);
        let spine = &stats.keypoints[Keypoint::Spine1.index()];
        // unrounded: 0.50123 and 0.5123
        assert_eq!(spine.p1, 0.5);
        assert_eq!(spine.p10, 0.51);
    }
}
