// src/postprocess/features.rs
//
// Kinematic and geometric features from standardized coordinates.
//
// Column naming:
//   d-*    distance          v-*    velocity (first difference)
//   a-*    acceleration      ang-*  angle       angv-* angular velocity
//
// "internal" features describe the body itself (lengths, bends, speeds);
// "external" features describe the head relative to the task stimuli.

use super::geometry::{angle_at, angular_velocity, diff, distance, orientation, round_all, speed};
use crate::error::PipelineError;
use crate::pose_table::{CoordinateSpace, PoseTable};
use crate::types::{FeatureConfig, Keypoint};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureGroup {
    pub columns: Vec<FeatureColumn>,
}

impl FeatureGroup {
    fn push(&mut self, name: String, values: Vec<f64>) {
        self.columns.push(FeatureColumn { name, values });
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    fn round(&mut self, decimals: u32) {
        for col in &mut self.columns {
            round_all(&mut col.values, decimals);
        }
    }
}

/// Output of the feature stage: standardized coordinates plus both derived
/// groups, all aligned on `frames`.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub frames: Vec<i64>,
    pub coordinate: PoseTable,
    pub internal: FeatureGroup,
    pub external: FeatureGroup,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

pub struct FeatureEngine {
    config: FeatureConfig,
}

impl FeatureEngine {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn compute(&self, table: &PoseTable) -> Result<FeatureTable, PipelineError> {
        table.require(CoordinateSpace::Physical)?;

        let mut internal = self.internal_features(table);
        let mut external = self.external_features(table);
        internal.round(self.config.decimals);
        external.round(self.config.decimals);

        let mut coordinate = table.clone();
        for track in &mut coordinate.tracks {
            round_all(&mut track.x, self.config.decimals);
            round_all(&mut track.y, self.config.decimals);
        }

        Ok(FeatureTable {
            frames: table.frames.clone(),
            coordinate,
            internal,
            external,
        })
    }

    fn internal_features(&self, table: &PoseTable) -> FeatureGroup {
        let unit = self.config.angle_unit;
        let kps = &self.config.body_keypoints;
        let mut group = FeatureGroup::default();

        for (i, &a) in kps.iter().enumerate() {
            for &b in &kps[i + 1..] {
                let name = format!("{}-{}", a, b);
                let d = pairwise(table, a, b, distance);
                let v = diff(&d);
                group.push(format!("d-{}", name), d);
                group.push(format!("v-{}", name), v);
            }
        }

        for (i, &a) in kps.iter().enumerate() {
            for (j, &b) in kps.iter().enumerate().skip(i + 1) {
                for &c in &kps[j + 1..] {
                    let name = format!("{}-{}-{}", a, b, c);
                    let (ta, tb, tc) = (table.track(a), table.track(b), table.track(c));
                    let ang: Vec<f64> = (0..table.len())
                        .map(|f| angle_at(ta.point(f), tb.point(f), tc.point(f), unit))
                        .collect();
                    let angv = angular_velocity(&ang, unit);
                    group.push(format!("ang-{}", name), ang);
                    group.push(format!("angv-{}", name), angv);
                }
            }
        }

        for &p in kps {
            let track = table.track(p);
            let v = speed(&track.x, &track.y);
            let a = diff(&v);
            group.push(format!("v-{}", p), v);
            group.push(format!("a-{}", p), a);
        }

        group
    }

    fn external_features(&self, table: &PoseTable) -> FeatureGroup {
        let unit = self.config.angle_unit;
        let half_turn = unit.full_turn() / 2.0;
        let snout = table.track(Keypoint::Snout);
        let neck = neck_positions(table);
        let mut group = FeatureGroup::default();

        let head: Vec<f64> = (0..table.len())
            .map(|f| orientation(snout.point(f), neck[f], unit))
            .collect();
        let head_v = angular_velocity(&head, unit);
        group.push("head_ang".to_string(), head);
        group.push("head_angv".to_string(), head_v);

        for &target in &self.config.targets {
            let name = format!("{}-{}", Keypoint::Snout, target);
            let t = table.track(target);

            let d = pairwise(table, Keypoint::Snout, target, distance);
            let v = diff(&d);

            let ang: Vec<f64> = (0..table.len())
                .map(|f| angle_at(snout.point(f), neck[f], t.point(f), unit))
                .collect();
            // positive = turning toward the target (angle moving toward 0/full turn)
            let angv: Vec<f64> = angular_velocity(&ang, unit)
                .into_iter()
                .zip(&ang)
                .map(|(w, &a)| {
                    if a > half_turn {
                        w
                    } else if a < half_turn {
                        -w
                    } else {
                        0.0
                    }
                })
                .collect();

            group.push(format!("d-{}", name), d);
            group.push(format!("v-{}", name), v);
            group.push(format!("ang-{}", name), ang);
            group.push(format!("angv-{}", name), angv);
        }

        group
    }
}

fn pairwise<F>(table: &PoseTable, a: Keypoint, b: Keypoint, f: F) -> Vec<f64>
where
    F: Fn((f64, f64), (f64, f64)) -> f64,
{
    let (ta, tb) = (table.track(a), table.track(b));
    (0..table.len()).map(|i| f(ta.point(i), tb.point(i))).collect()
}

/// Neck estimate: centroid of spine1 and both ears
fn neck_positions(table: &PoseTable) -> Vec<(f64, f64)> {
    let parts = [Keypoint::Spine1, Keypoint::LeftEar, Keypoint::RightEar];
    (0..table.len())
        .map(|i| {
            let (sx, sy) = parts
                .iter()
                .map(|&k| table.track(k).point(i))
                .fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
            (sx / 3.0, sy / 3.0)
        })
        .collect()
}
