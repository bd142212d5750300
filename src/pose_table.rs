// src/pose_table.rs
//
// Per-frame keypoint tables. The raw table mirrors the pose-estimation
// output (x, y, confidence per keypoint, cells may be missing); the refined
// table has every cell resolved and is tagged with its coordinate space so
// each stage can check it was handed the right input.

use crate::error::PipelineError;
use crate::types::Keypoint;
use std::fs;
use std::path::Path;

/// Columns per keypoint in the input file: x, y, confidence
const FIELDS_PER_KEYPOINT: usize = 3;

#[derive(Debug, Clone)]
pub struct RawTrack {
    pub keypoint: Keypoint,
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
    pub confidence: Vec<Option<f64>>,
}

impl RawTrack {
    fn with_capacity(keypoint: Keypoint, n: usize) -> Self {
        Self {
            keypoint,
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            confidence: Vec::with_capacity(n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawPoseTable {
    pub frames: Vec<i64>,
    /// One track per keypoint, in `Keypoint::ALL` order
    pub tracks: Vec<RawTrack>,
}

impl RawPoseTable {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[cfg(test)]
    pub fn track(&self, keypoint: Keypoint) -> &RawTrack {
        &self.tracks[keypoint.index()]
    }

    /// Read a pose-estimation csv: `header_rows` lines are skipped, then
    /// each row is `frame, {kp}_x, {kp}_y, {kp}_cfd, ...` in keypoint order.
    pub fn read_csv(path: &Path, header_rows: usize) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents, header_rows).map_err(|reason| PipelineError::PoseTableFormat {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn parse(contents: &str, header_rows: usize) -> Result<Self, String> {
        let expected_fields = 1 + Keypoint::COUNT * FIELDS_PER_KEYPOINT;
        let mut frames: Vec<i64> = Vec::new();
        let mut tracks: Vec<RawTrack> = Keypoint::ALL
            .iter()
            .map(|&kp| RawTrack::with_capacity(kp, 0))
            .collect();

        for (line_no, line) in contents.lines().enumerate().skip(header_rows) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < expected_fields {
                return Err(format!(
                    "line {}: expected {} fields, found {}",
                    line_no + 1,
                    expected_fields,
                    fields.len()
                ));
            }

            let frame = parse_frame(fields[0])
                .ok_or_else(|| format!("line {}: bad frame index {:?}", line_no + 1, fields[0]))?;
            if let Some(&prev) = frames.last() {
                if frame <= prev {
                    return Err(format!(
                        "line {}: frame index {} does not follow {}",
                        line_no + 1,
                        frame,
                        prev
                    ));
                }
            }
            frames.push(frame);

            for (k, track) in tracks.iter_mut().enumerate() {
                let base = 1 + k * FIELDS_PER_KEYPOINT;
                track.x.push(parse_cell(fields[base]));
                track.y.push(parse_cell(fields[base + 1]));
                track.confidence.push(parse_cell(fields[base + 2]));
            }
        }

        if frames.is_empty() {
            return Err("no data rows".to_string());
        }

        Ok(Self { frames, tracks })
    }
}

fn parse_frame(field: &str) -> Option<i64> {
    field
        .parse::<i64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as i64))
        .filter(|v| *v >= 0)
}

fn parse_cell(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// RESOLVED TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSpace {
    /// Camera pixels, y increasing downward
    Pixels,
    /// Chamber frame: origin corner at (0,0), physical units, y upward
    Physical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub keypoint: Keypoint,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Track {
    pub fn point(&self, i: usize) -> (f64, f64) {
        (self.x[i], self.y[i])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseTable {
    pub frames: Vec<i64>,
    pub space: CoordinateSpace,
    /// One track per keypoint, in `Keypoint::ALL` order
    pub tracks: Vec<Track>,
}

impl PoseTable {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn track(&self, keypoint: Keypoint) -> &Track {
        &self.tracks[keypoint.index()]
    }

    pub fn track_mut(&mut self, keypoint: Keypoint) -> &mut Track {
        &mut self.tracks[keypoint.index()]
    }

    pub fn require(&self, space: CoordinateSpace) -> Result<(), PipelineError> {
        if self.space != space {
            return Err(PipelineError::Stage(format!(
                "expected {:?} coordinates, got {:?}",
                space, self.space
            )));
        }
        let n = self.frames.len();
        if let Some(t) = self.tracks.iter().find(|t| t.x.len() != n || t.y.len() != n) {
            return Err(PipelineError::Stage(format!(
                "track {} has {} rows, table has {}",
                t.keypoint,
                t.x.len(),
                n
            )));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn csv_row(frame: i64, value: &str) -> String {
        let mut fields = vec![frame.to_string()];
        for _ in 0..Keypoint::COUNT {
            fields.push(value.to_string());
            fields.push(value.to_string());
            fields.push("0.9".to_string());
        }
        fields.join(",")
    }

    fn header() -> String {
        "scorer,...\nbodyparts,...\ncoords,...\n".to_string()
    }

    #[test]
    fn test_parse_skips_header_rows() {
        let text = format!("{}{}\n{}\n", header(), csv_row(0, "1.5"), csv_row(1, "2.5"));
        let table = RawPoseTable::parse(&text, 3).unwrap();
        assert_eq!(table.frames, vec![0, 1]);
        assert_eq!(table.track(Keypoint::Tail3).x, vec![Some(1.5), Some(2.5)]);
        assert_eq!(table.track(Keypoint::RightScreen).confidence[1], Some(0.9));
    }

    #[test]
    fn test_parse_missing_cells() {
        let text = format!("{}{}\n{}\n", header(), csv_row(0, ""), csv_row(1, "nan"));
        let table = RawPoseTable::parse(&text, 3).unwrap();
        assert_eq!(table.track(Keypoint::Snout).x, vec![None, None]);
    }

    #[test]
    fn test_parse_rejects_duplicate_frames() {
        let text = format!("{}{}\n{}\n", header(), csv_row(3, "1"), csv_row(3, "1"));
        assert!(RawPoseTable::parse(&text, 3).is_err());
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        let text = format!("{}0,1,2,3\n", header());
        assert!(RawPoseTable::parse(&text, 3).is_err());
    }

    #[test]
    fn test_require_space() {
        let raw = testing::raw_table(3, |_, i| (i as f64, 0.0));
        let table = PoseTable {
            frames: raw.frames.clone(),
            space: CoordinateSpace::Pixels,
            tracks: Keypoint::ALL
                .iter()
                .map(|&kp| Track {
                    keypoint: kp,
                    x: vec![0.0; 3],
                    y: vec![0.0; 3],
                })
                .collect(),
        };
        assert!(table.require(CoordinateSpace::Pixels).is_ok());
        assert!(table.require(CoordinateSpace::Physical).is_err());
    }
}
