// src/postprocess/refiner.rs
//
// Prediction refinement: low-confidence samples are dropped, every
// coordinate column gets a centred sliding median, and the remaining gaps
// are filled by linear steps between the bounding valid samples. Gaps that
// touch either end of the table take the nearest valid value instead.

use crate::error::PipelineError;
use crate::pose_table::{CoordinateSpace, PoseTable, RawPoseTable, Track};
use crate::types::{column_name, Axis, RefineConfig};
use tracing::debug;

/// Coordinate column where `None` marks a missing sample
pub type Series = Vec<Option<f64>>;

pub struct Refiner {
    config: RefineConfig,
}

impl Refiner {
    pub fn new(config: RefineConfig) -> Self {
        Self { config }
    }

    pub fn refine(&self, raw: &RawPoseTable) -> Result<PoseTable, PipelineError> {
        let mut tracks = Vec::with_capacity(raw.tracks.len());

        for track in &raw.tracks {
            let kp = track.keypoint;
            let x = self.refine_column(
                &track.x,
                &track.confidence,
                &column_name(kp, Axis::X),
            )?;
            let y = self.refine_column(
                &track.y,
                &track.confidence,
                &column_name(kp, Axis::Y),
            )?;
            tracks.push(Track { keypoint: kp, x, y });
        }

        Ok(PoseTable {
            frames: raw.frames.clone(),
            space: CoordinateSpace::Pixels,
            tracks,
        })
    }

    fn refine_column(
        &self,
        values: &[Option<f64>],
        confidence: &[Option<f64>],
        column: &str,
    ) -> Result<Vec<f64>, PipelineError> {
        let kept = apply_cutoff(values, confidence, self.config.confidence_cutoff);
        let smoothed = median_filter(&kept, self.config.median_window);
        let filled = fill_gaps(&smoothed, column)?;

        Ok(match self.config.savgol_window {
            Some(window) => savgol_linear(&filled, window),
            None => filled,
        })
    }
}

/// Drop samples whose confidence is missing or below `cutoff`
pub fn apply_cutoff(values: &[Option<f64>], confidence: &[Option<f64>], cutoff: f64) -> Series {
    values
        .iter()
        .zip(confidence)
        .map(|(v, c)| match c {
            Some(c) if *c >= cutoff => *v,
            _ => None,
        })
        .collect()
}

/// Centred rolling median over the available samples of each window.
///
/// Positions that were missing on input stay missing; the median only ever
/// smooths existing samples, it never fabricates one inside a gap.
pub fn median_filter(series: &[Option<f64>], window: usize) -> Series {
    let n = series.len();
    let window = window.max(1);
    let before = window / 2;
    let after = (window - 1) / 2;
    let mut buf: Vec<f64> = Vec::with_capacity(window);

    (0..n)
        .map(|i| {
            series[i]?;
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n - 1);
            buf.clear();
            buf.extend(series[lo..=hi].iter().flatten());
            median(&mut buf)
        })
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Maximal runs of consecutive missing indices, as inclusive (start, end)
fn missing_runs(series: &[Option<f64>]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;

    for (i, v) in series.iter().enumerate() {
        match (v, start) {
            (None, None) => start = Some(i),
            (Some(_), Some(s)) => {
                runs.push((s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, series.len() - 1));
    }
    runs
}

/// Resolve every missing sample of a column.
///
/// Interior runs of length k between valid `a` and `b` become
/// `a + i*(b-a)/(k+1)` for i = 1..k. Runs touching the start or end are
/// filled afterwards with the nearest valid value.
pub fn fill_gaps(series: &[Option<f64>], column: &str) -> Result<Vec<f64>, PipelineError> {
    let n = series.len();
    let runs = missing_runs(series);
    if runs.is_empty() {
        return Ok(series.iter().flatten().copied().collect());
    }
    if runs.len() == 1 && runs[0] == (0, n.saturating_sub(1)) {
        return Err(PipelineError::EmptyColumn {
            column: column.to_string(),
        });
    }

    let mut out: Series = series.to_vec();
    let mut boundary: Vec<(usize, usize)> = Vec::new();

    for &(start, end) in &runs {
        let prev = start.checked_sub(1).and_then(|i| series[i]);
        let next = series.get(end + 1).copied().flatten();

        match (prev, next) {
            (Some(a), Some(b)) => {
                let steps = (end - start + 2) as f64;
                let step = (b - a) / steps;
                for (k, i) in (start..=end).enumerate() {
                    out[i] = Some(a + (k + 1) as f64 * step);
                }
            }
            _ => boundary.push((start, end)),
        }
    }

    for (start, end) in boundary {
        let fill = if start == 0 { out[end + 1] } else { out[start - 1] };
        debug!(
            "{}: boundary gap of {} frame(s) at {}..={} filled with nearest value",
            column,
            end - start + 1,
            start,
            end
        );
        for v in &mut out[start..=end] {
            *v = fill;
        }
    }

    // every run had a valid neighbour, so nothing is left unresolved
    out.into_iter()
        .map(|v| {
            v.ok_or_else(|| PipelineError::EmptyColumn {
                column: column.to_string(),
            })
        })
        .collect()
}

/// First-order Savitzky-Golay smoothing: a least-squares line over a centred
/// window, with the edge windows evaluated off-centre for the first and last
/// half-window. Tables shorter than the window are returned unchanged.
pub fn savgol_linear(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if window < 3 || n < window {
        return values.to_vec();
    }
    let half = window / 2;
    let mut out = values.to_vec();

    for i in half..n - half {
        let sum: f64 = values[i - half..=i + half].iter().sum();
        out[i] = sum / window as f64;
    }

    let (slope, intercept) = fit_line(&values[..window]);
    for (i, v) in out.iter_mut().enumerate().take(half) {
        *v = intercept + slope * i as f64;
    }

    let tail_start = n - window;
    let (slope, intercept) = fit_line(&values[tail_start..]);
    for i in n - half..n {
        out[i] = intercept + slope * (i - tail_start) as f64;
    }

    out
}

/// Least-squares line through (0, y0), (1, y1), ...
fn fit_line(ys: &[f64]) -> (f64, f64) {
    let n = ys.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = ys.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (slope, y_mean - slope * x_mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose_table::testing::raw_table;
    use crate::types::Keypoint;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_cutoff_drops_low_confidence() {
        let v = [Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let c = [Some(0.9), Some(0.05), None, Some(0.1)];
        assert_eq!(apply_cutoff(&v, &c, 0.1), vec![Some(1.0), None, None, Some(4.0)]);
    }

    #[test]
    fn test_median_filter_removes_spike() {
        let s: Series = vec![Some(1.0), Some(1.0), Some(50.0), Some(1.0), Some(1.0)];
        let out = median_filter(&s, 5);
        assert_eq!(out[2], Some(1.0));
    }

    #[test]
    fn test_median_filter_boundary_min_period() {
        let s: Series = vec![Some(1.0), Some(3.0), Some(8.0)];
        let out = median_filter(&s, 5);
        // window at 0 covers [0, 2]
        assert_eq!(out[0], Some(3.0));
        // even count in window at index 2 of a 4-sample series
        let s: Series = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let out = median_filter(&s, 5);
        assert_eq!(out[3], Some(3.0));
    }

    #[test]
    fn test_median_filter_keeps_gaps() {
        let s: Series = vec![Some(1.0), None, None, Some(4.0), Some(5.0)];
        let out = median_filter(&s, 5);
        assert_eq!(out[1], None);
        assert_eq!(out[2], None);
        assert!(out[0].is_some() && out[3].is_some());
    }

    #[test]
    fn test_median_filter_idempotent_on_constant() {
        let s: Series = vec![Some(7.5); 12];
        let once = median_filter(&s, 5);
        let twice = median_filter(&once, 5);
        assert_eq!(once, s);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_fill_interior_gap_exact_steps() {
        let a = 2.0;
        let b = 10.0;
        let k = 3;
        let mut s: Series = vec![Some(0.0), Some(a)];
        s.extend(std::iter::repeat(None).take(k));
        s.push(Some(b));
        let out = fill_gaps(&s, "col").unwrap();
        for i in 1..=k {
            let expected = a + i as f64 * (b - a) / (k as f64 + 1.0);
            assert!(approx_eq(out[1 + i], expected), "i={} got {}", i, out[1 + i]);
        }
        assert_eq!(out[5], b);
    }

    #[test]
    fn test_fill_boundary_gaps() {
        let s: Series = vec![None, None, Some(3.0), None, Some(5.0), None];
        let out = fill_gaps(&s, "col").unwrap();
        assert_eq!(out, vec![3.0, 3.0, 3.0, 4.0, 5.0, 5.0]);
    }

    #[test]
    fn test_fill_all_missing_is_error() {
        let s: Series = vec![None; 4];
        let err = fill_gaps(&s, "snout_x").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyColumn { ref column } if column == "snout_x"));
    }

    #[test]
    fn test_savgol_preserves_line() {
        let values: Vec<f64> = (0..10).map(|i| 2.0 * i as f64 + 1.0).collect();
        let out = savgol_linear(&values, 5);
        for (a, b) in out.iter().zip(&values) {
            assert!(approx_eq(*a, *b));
        }
    }

    #[test]
    fn test_savgol_short_series_unchanged() {
        let values = vec![1.0, 5.0, 2.0];
        assert_eq!(savgol_linear(&values, 5), values);
    }

    #[test]
    fn test_refine_table_resolves_low_confidence() {
        let mut raw = raw_table(10, |_, i| (i as f64, 2.0 * i as f64));
        raw.tracks[Keypoint::Snout.index()].confidence[4] = Some(0.01);
        let refined = Refiner::new(RefineConfig::default()).refine(&raw).unwrap();
        assert_eq!(refined.space, CoordinateSpace::Pixels);
        let snout = refined.track(Keypoint::Snout);
        assert!(approx_eq(snout.x[4], 4.0));
        assert!(approx_eq(snout.y[4], 8.0));
    }

    #[test]
    fn test_refine_table_empty_column_fails() {
        let mut raw = raw_table(5, |_, i| (i as f64, 0.0));
        raw.tracks[Keypoint::Tail3.index()].confidence = vec![Some(0.0); 5];
        let err = Refiner::new(RefineConfig::default()).refine(&raw).unwrap_err();
        assert!(err.to_string().contains("tail3_x"));
    }
}
