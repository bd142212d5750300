// src/postprocess/geometry.rs
//
// Column-wise arithmetic shared by the standardizer and feature engine.
// Angles are computed in radians via atan2 and converted to the configured
// unit, always normalized into [0, full turn).

use crate::types::AngleUnit;
use std::f64::consts::TAU;

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    // avoid "-0" in the output
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn round_all(values: &mut [f64], decimals: u32) {
    for v in values.iter_mut() {
        *v = round_to(*v, decimals);
    }
}

/// First difference with the first sample prepended, so the output has the
/// same length and starts at zero.
pub fn diff(values: &[f64]) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let mut prev = first;
    values
        .iter()
        .map(|&v| {
            let d = v - prev;
            prev = v;
            d
        })
        .collect()
}

pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Frame-to-frame displacement magnitude of a 2-D trajectory
pub fn speed(x: &[f64], y: &[f64]) -> Vec<f64> {
    diff(x)
        .into_iter()
        .zip(diff(y))
        .map(|(dx, dy)| dx.hypot(dy))
        .collect()
}

fn normalize(radians: f64, unit: AngleUnit) -> f64 {
    let wrapped = radians.rem_euclid(TAU);
    // rem_euclid can land exactly on TAU for tiny negative inputs
    let wrapped = if wrapped >= TAU { 0.0 } else { wrapped };
    unit.from_radians(wrapped)
}

/// Orientation of the vector from `tail` to `head` against the x axis
pub fn orientation(head: (f64, f64), tail: (f64, f64), unit: AngleUnit) -> f64 {
    normalize((head.1 - tail.1).atan2(head.0 - tail.0), unit)
}

/// Signed angle at `vertex` sweeping from `a` to `b`
pub fn angle_at(a: (f64, f64), vertex: (f64, f64), b: (f64, f64), unit: AngleUnit) -> f64 {
    let va = (a.1 - vertex.1).atan2(a.0 - vertex.0);
    let vb = (b.1 - vertex.1).atan2(b.0 - vertex.0);
    normalize(vb - va, unit)
}

/// Angular velocity free of wrap-around jumps.
///
/// The difference is taken twice: once on the angle as given and once on the
/// angle rotated by half a turn. A step across the wrap boundary shows up as a
/// near-full-turn jump in exactly one of the two, so the smaller magnitude is
/// the true per-frame change.
pub fn angular_velocity(angles: &[f64], unit: AngleUnit) -> Vec<f64> {
    let full = unit.full_turn();
    let half = full / 2.0;
    let shifted: Vec<f64> = angles.iter().map(|a| (a + half).rem_euclid(full)).collect();

    diff(angles)
        .into_iter()
        .zip(diff(&shifted))
        .map(|(d1, d2)| if d1.abs() <= d2.abs() { d1 } else { d2 })
        .collect()
}
