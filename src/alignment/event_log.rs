// src/alignment/event_log.rs
//
// Behavioral event store. One JSON document keyed by subject, then by
// session date; each session holds a state-event dataset and a
// trial-parameter dataset whose column names travel with the data:
//
//   { "<subject>": { "attrs": {...},
//                    "sessions": { "<date>": { "states": {"headers": [...], "data": [[...]]},
//                                              "trials": {"headers": [...], "data": [[...]]} } } } }
//
// Reading only checks that the document maps subjects to values. Each
// session is decoded on lookup, so a malformed session fails only the
// videos recorded in it.

use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<Option<f64>>>,
}

impl Dataset {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SessionRecord {
    states: Dataset,
    trials: Dataset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateEvent {
    pub time: f64,
    pub code: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialParams {
    /// Session-wide trial ordinal, 1-based
    pub ordinal: usize,
    pub time: f64,
    pub choice: Option<i64>,
    pub reward: bool,
    pub probability_left: f64,
    pub probability_right: f64,
}

/// Everything the aligner needs from one subject/date session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvents {
    /// Subject-level attributes, rendered as text
    pub attrs: Vec<(String, String)>,
    pub states: Vec<StateEvent>,
    pub trials: Vec<TrialParams>,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    subjects: BTreeMap<String, Value>,
}

impl EventLog {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading event log {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("parsing event log {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let subjects: BTreeMap<String, Value> = serde_json::from_str(contents)?;
        Ok(Self { subjects })
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn session(&self, subject: &str, date: &str) -> Result<SessionEvents, PipelineError> {
        let miss = || PipelineError::AlignmentMiss {
            subject: subject.to_string(),
            date: date.to_string(),
        };
        let record = self.subjects.get(subject).ok_or_else(miss)?;
        let session = record
            .get("sessions")
            .and_then(|sessions| sessions.get(date))
            .ok_or_else(miss)?;
        let format_err = |reason: String| PipelineError::EventLogFormat {
            subject: subject.to_string(),
            date: date.to_string(),
            reason,
        };

        let attrs = match record.get("attrs") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), attr_text(v)))
                .collect(),
            None | Some(Value::Null) => Vec::new(),
            _ => return Err(format_err("subject attrs are not an object".to_string())),
        };
        let session =
            SessionRecord::deserialize(session).map_err(|e| format_err(e.to_string()))?;
        let states = parse_states(&session.states).map_err(format_err)?;
        let trials = parse_trials(&session.trials).map_err(format_err)?;

        Ok(SessionEvents {
            attrs,
            states,
            trials,
        })
    }
}

fn attr_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn require_columns<const N: usize>(
    dataset: &Dataset,
    label: &str,
    names: [&str; N],
) -> Result<[usize; N], String> {
    let mut out = [0; N];
    for (slot, name) in out.iter_mut().zip(names) {
        *slot = dataset
            .column(name)
            .ok_or_else(|| format!("{} dataset has no '{}' header", label, name))?;
    }
    Ok(out)
}

fn cell(row: &[Option<f64>], idx: usize, label: &str, line: usize) -> Result<Option<f64>, String> {
    row.get(idx)
        .copied()
        .ok_or_else(|| format!("{} row {} is shorter than its headers", label, line))
}

fn parse_states(dataset: &Dataset) -> Result<Vec<StateEvent>, String> {
    let [time, state] = require_columns(dataset, "states", ["time", "state"])?;
    let mut events = Vec::with_capacity(dataset.data.len());

    for (i, row) in dataset.data.iter().enumerate() {
        let t = cell(row, time, "states", i)?;
        let code = cell(row, state, "states", i)?;
        match (t, code) {
            (Some(t), Some(code)) => events.push(StateEvent {
                time: t,
                code: code as i64,
            }),
            _ => return Err(format!("states row {} has an empty time or state", i)),
        }
    }
    Ok(events)
}

fn parse_trials(dataset: &Dataset) -> Result<Vec<TrialParams>, String> {
    let [time, choice, reward, p_left, p_right] = require_columns(
        dataset,
        "trials",
        ["time", "choice", "reward", "probability_left", "probability_right"],
    )?;
    let ordinal_col = dataset.column("trial");
    let mut trials: Vec<TrialParams> = Vec::with_capacity(dataset.data.len());

    for (i, row) in dataset.data.iter().enumerate() {
        let ordinal = match ordinal_col {
            Some(col) => match cell(row, col, "trials", i)? {
                Some(v) if v >= 1.0 => v as usize,
                _ => return Err(format!("trials row {} has an invalid trial ordinal", i)),
            },
            None => i + 1,
        };
        let prob = |col: usize| -> Result<f64, String> {
            cell(row, col, "trials", i)?
                .ok_or_else(|| format!("trials row {} has an empty reward probability", i))
        };

        trials.push(TrialParams {
            ordinal,
            time: cell(row, time, "trials", i)?.unwrap_or(f64::NAN),
            choice: cell(row, choice, "trials", i)?.map(|c| c as i64),
            reward: cell(row, reward, "trials", i)?.is_some_and(|r| r != 0.0),
            probability_left: prob(p_left)?,
            probability_right: prob(p_right)?,
        });
    }

    trials.sort_by_key(|t| t.ordinal);
    if trials.windows(2).any(|w| w[0].ordinal == w[1].ordinal) {
        return Err("trials dataset repeats a trial ordinal".to_string());
    }
    Ok(trials)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_session_lookup() {
        let log = EventLog::from_json(&testing::sample_json()).unwrap();
        assert_eq!(log.subject_count(), 1);
        let session = log.session("101", "210301").unwrap();
        assert_eq!(session.states.len(), 4);
        assert_eq!(session.states[1], StateEvent { time: 0.4, code: 7 });
        assert_eq!(session.trials[1].ordinal, 2);
        assert_eq!(session.trials[1].choice, Some(1));
        assert!(session.trials[0].reward);
        assert_eq!(
            session.attrs,
            vec![
                ("genotype".to_string(), "wt".to_string()),
                ("sex".to_string(), "F".to_string())
            ]
        );
    }

    #[test]
    fn test_missing_session_is_alignment_miss() {
        let log = EventLog::from_json(&testing::sample_json()).unwrap();
        let err = log.session("101", "991231").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlignmentMiss);
        let err = log.session("999", "210301").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlignmentMiss);
    }

    #[test]
    fn test_missing_header_is_format_error() {
        let json = r#"{"7": {"sessions": {"d": {
            "states": {"headers": ["time"], "data": [[0.0]]},
            "trials": {"headers": ["time", "choice", "reward", "probability_left", "probability_right"], "data": []}
        }}}}"#;
        let log = EventLog::from_json(json).unwrap();
        let err = log.session("7", "d").unwrap_err();
        assert!(matches!(err, PipelineError::EventLogFormat { .. }));
        assert!(err.to_string().contains("'state'"));
    }

    #[test]
    fn test_malformed_session_fails_only_itself() {
        let json = r#"{
            "101": {"sessions": {"210301": {
                "states": {"headers": ["time", "state"], "data": [[0.0, 1]]},
                "trials": {"headers": ["time", "choice", "reward", "probability_left", "probability_right"], "data": []}
            }}},
            "303": 5,
            "202": {"sessions": {
                "210301": {"states": {"data": [[0.0, 1]]}},
                "210302": {"states": {"headers": ["time", "state"], "data": [["x", 1]]},
                           "trials": {"headers": [], "data": []}}
            }}
        }"#;
        let log = EventLog::from_json(json).unwrap();
        assert_eq!(log.subject_count(), 3);
        assert_eq!(log.session("101", "210301").unwrap().states.len(), 1);

        for date in ["210301", "210302"] {
            let err = log.session("202", date).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
            assert!(!err.is_recoverable());
        }
        // a subject that is not an object has no sessions to find
        assert_eq!(log.session("303", "210301").unwrap_err().kind(), ErrorKind::AlignmentMiss);
    }

    #[test]
    fn test_explicit_trial_column_orders_rows() {
        let json = r#"{"7": {"sessions": {"d": {
            "states": {"headers": ["time", "state"], "data": []},
            "trials": {"headers": ["trial", "time", "choice", "reward", "probability_left", "probability_right"],
                       "data": [[2, 1.0, 1, 0, 0.5, 0.5], [1, 0.0, null, 0, 0.5, 0.5]]}
        }}}}"#;
        let log = EventLog::from_json(json).unwrap();
        let session = log.session("7", "d").unwrap();
        assert_eq!(session.trials[0].ordinal, 1);
        assert_eq!(session.trials[0].choice, None);
        assert_eq!(session.trials[1].ordinal, 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, testing::sample_json()).unwrap();
        assert!(EventLog::load(&path).is_ok());
        std::fs::write(&path, "not json").unwrap();
        assert!(EventLog::load(&path).is_err());
    }
}
