// src/export.rs
//
// CSV writers. Both files carry two header rows: a group row and a column
// row, so downstream tools can rebuild the nested column layout.

use crate::alignment::TaskTable;
use crate::error::PipelineError;
use crate::pipeline::video_context::VideoInfo;
use crate::postprocess::statistics::{PoseStatistics, STAT_LABELS};
use crate::postprocess::FeatureTable;
use crate::types::{column_name, Axis};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

const INFO_COLUMNS: [&str; 7] = ["file_name", "mouse_id", "chamber", "exp_date", "time", "fps", "frame"];

fn write_row<W: Write>(out: &mut W, cells: &[String]) -> std::io::Result<()> {
    let line: Vec<Cow<str>> = cells.iter().map(|c| quote(c)).collect();
    writeln!(out, "{}", line.join(","))
}

/// Quote a cell that would otherwise break the row apart
fn quote(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

// ============================================================================
// FEATURE TABLE
// ============================================================================

pub fn write_feature_csv(
    path: &Path,
    features: &FeatureTable,
    task: Option<&TaskTable>,
) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_features(&mut out, features, task)?;
    out.flush()?;
    Ok(())
}

pub fn write_features<W: Write>(
    out: &mut W,
    features: &FeatureTable,
    task: Option<&TaskTable>,
) -> Result<(), PipelineError> {
    if let Some(task) = task {
        if task.len() != features.len() {
            return Err(PipelineError::Stage(format!(
                "task table has {} rows, feature table has {}",
                task.len(),
                features.len()
            )));
        }
    }

    let mut groups = vec![String::new()];
    let mut names = vec!["frame".to_string()];

    for track in &features.coordinate.tracks {
        for axis in [Axis::X, Axis::Y] {
            groups.push("coordinate".to_string());
            names.push(column_name(track.keypoint, axis));
        }
    }
    for (label, group) in [("internal", &features.internal), ("external", &features.external)] {
        for name in group.names() {
            groups.push(label.to_string());
            names.push(name.to_string());
        }
    }
    if let Some(task) = task {
        for name in task.column_names() {
            groups.push("task".to_string());
            names.push(name);
        }
    }

    write_row(out, &groups)?;
    write_row(out, &names)?;

    for (i, frame) in features.frames.iter().enumerate() {
        let mut cells = Vec::with_capacity(names.len());
        cells.push(frame.to_string());
        for track in &features.coordinate.tracks {
            cells.push(track.x[i].to_string());
            cells.push(track.y[i].to_string());
        }
        for group in [&features.internal, &features.external] {
            cells.extend(group.columns.iter().map(|c| c.values[i].to_string()));
        }
        if let Some(task) = task {
            cells.extend(task.row(i));
        }
        write_row(out, &cells)?;
    }
    Ok(())
}

// ============================================================================
// STATISTICS
// ============================================================================

pub struct StatisticsRow<'a> {
    pub file_name: &'a str,
    pub info: &'a VideoInfo,
    pub fps: f64,
    pub stats: &'a PoseStatistics,
}

pub fn write_statistics_csv(path: &Path, rows: &[StatisticsRow]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_statistics(&mut out, rows)?;
    out.flush()?;
    Ok(())
}

pub fn write_statistics<W: Write>(out: &mut W, rows: &[StatisticsRow]) -> std::io::Result<()> {
    let keypoints = rows
        .first()
        .map(|r| r.stats.keypoints.iter().map(|k| k.keypoint).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut top: Vec<String> = INFO_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut sub: Vec<String> = vec!["-".to_string(); INFO_COLUMNS.len()];
    for kp in &keypoints {
        for label in STAT_LABELS {
            top.push(kp.to_string());
            sub.push(label.to_string());
        }
    }
    write_row(out, &top)?;
    write_row(out, &sub)?;

    for row in rows {
        let info = row.info;
        let mut cells = vec![
            row.file_name.to_string(),
            info.mouse_id.clone(),
            info.chamber.clone(),
            info.exp_date.clone(),
            info.time.clone(),
            row.fps.to_string(),
            row.stats.frames.to_string(),
        ];
        for kp in &row.stats.keypoints {
            cells.extend(kp.values().iter().map(|v| v.to_string()));
        }
        write_row(out, &cells)?;
    }
    Ok(())
}
