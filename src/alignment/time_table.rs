// src/alignment/time_table.rs
//
// Recording-window table: when each subject/date video starts and ends
// relative to the event-log clock. Columns: id, date, vid_start, vid_end.

use crate::error::PipelineError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingWindow {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TimeTable {
    windows: HashMap<(String, String), RecordingWindow>,
}

impl TimeTable {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading time table {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing time table {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<&str> = lines
            .next()
            .context("time table is empty")?
            .split(',')
            .map(str::trim)
            .collect();
        let col = |name: &str| {
            header
                .iter()
                .position(|h| *h == name)
                .with_context(|| format!("time table has no '{}' column", name))
        };
        let (id, date, start, end) = (col("id")?, col("date")?, col("vid_start")?, col("vid_end")?);

        let mut windows = HashMap::new();
        for (i, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let get = |idx: usize| {
                fields
                    .get(idx)
                    .copied()
                    .with_context(|| format!("time table row {} is short", i + 1))
            };
            let number = |idx: usize| -> Result<f64> {
                let raw = get(idx)?;
                raw.parse::<f64>()
                    .with_context(|| format!("time table row {}: bad number {:?}", i + 1, raw))
            };
            windows.insert(
                (normalize_key(get(id)?), normalize_key(get(date)?)),
                RecordingWindow {
                    start: number(start)?,
                    end: number(end)?,
                },
            );
        }

        Ok(Self { windows })
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self, subject: &str, date: &str) -> Option<RecordingWindow> {
        self.windows
            .get(&(normalize_key(subject), normalize_key(date)))
            .copied()
    }

    /// Offset added to event-log timestamps to land on the video clock.
    ///
    /// The video was clipped `buffer` seconds before the recorded start, but
    /// never before 0.
    pub fn offset(&self, subject: &str, date: &str, buffer: f64) -> Result<f64, PipelineError> {
        let window = self
            .window(subject, date)
            .ok_or_else(|| PipelineError::AlignmentMiss {
                subject: subject.to_string(),
                date: date.to_string(),
            })?;
        Ok((window.start + buffer).max(0.0) - buffer)
    }
}

/// Ids and dates compare as integers when they are numeric, so `010203`
/// and `10203` name the same session
fn normalize_key(raw: &str) -> String {
    let raw = raw.trim();
    raw.parse::<u64>()
        .map(|v| v.to_string())
        .unwrap_or_else(|_| raw.to_string())
}
