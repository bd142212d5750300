// src/alignment/mod.rs
//
// Fuses the behavioral event log onto the video frame timeline:
//   1. shift event times onto the video clock and quantize to frames
//   2. break frame collisions so the sequence is strictly increasing
//   3. walk every frame, holding the last state and counting trials
//   4. attach each trial's parameters and classifications to its frames

pub mod event_log;
pub mod state_machine;
pub mod time_table;
pub mod trials;

pub use event_log::{EventLog, SessionEvents};
pub use time_table::TimeTable;
pub use trials::{SessionTrials, TrialSummary};

use crate::error::PipelineError;
use crate::types::AlignmentConfig;
use state_machine::{dedup_frames, propagate, quantize, FrameState};
use tracing::debug;
use trials::TrialClassifier;

/// Fixed task columns, after any subject attribute columns
pub const TASK_COLUMNS: [&str; 17] = [
    "state",
    "state_",
    "trial",
    "choice",
    "reward",
    "probability_left",
    "probability_right",
    "contrast",
    "optimal",
    "rare",
    "streak",
    "unexpectation",
    "strategy",
    "block",
    "block_trial",
    "session_trial",
    "session_type",
];

/// Event sources shared by every video of a run
#[derive(Debug, Clone, Default)]
pub struct EventSources {
    pub log: EventLog,
    pub time_table: Option<TimeTable>,
}

/// Per-frame task columns for one video
#[derive(Debug, Clone)]
pub struct TaskTable {
    pub attrs: Vec<(String, String)>,
    pub offset: f64,
    pub frames: Vec<FrameState>,
    pub trials: SessionTrials,
    /// Index into `trials.trials` for each frame, forward-filled
    frame_trials: Vec<Option<usize>>,
}

impl TaskTable {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.attrs
            .iter()
            .map(|(k, _)| k.clone())
            .chain(TASK_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }

    pub fn trial_at(&self, row: usize) -> Option<&TrialSummary> {
        self.frame_trials[row].map(|i| &self.trials.trials[i])
    }

    /// Rendered cells of one frame, empty where undefined
    pub fn row(&self, row: usize) -> Vec<String> {
        let frame = &self.frames[row];
        let trial = self.trial_at(row);
        let opt = |v: Option<String>| v.unwrap_or_default();
        let flag = |b: bool| (if b { "1" } else { "0" }).to_string();

        let mut cells: Vec<String> = self.attrs.iter().map(|(_, v)| v.clone()).collect();
        cells.push(opt(frame.event.map(|c| c.to_string())));
        cells.push(frame.simplified.to_string());
        cells.push(opt(frame.trial.map(|t| t.to_string())));
        cells.push(opt(trial.and_then(|t| t.params.choice).map(|c| c.to_string())));
        cells.push(opt(trial.map(|t| flag(t.params.reward))));
        cells.push(opt(trial.map(|t| t.params.probability_left.to_string())));
        cells.push(opt(trial.map(|t| t.params.probability_right.to_string())));
        cells.push(opt(trial.map(|t| format!("{:.2}", t.contrast))));
        cells.push(opt(trial.and_then(|t| t.optimal).map(flag)));
        cells.push(opt(trial.and_then(|t| t.rare).map(flag)));
        cells.push(opt(trial.map(|t| t.streak.to_string())));
        cells.push(opt(trial.map(|t| t.unexpectation.to_string())));
        cells.push(opt(trial.map(|t| t.strategy.as_str().to_string())));
        cells.push(opt(trial.map(|t| t.block.to_string())));
        cells.push(opt(trial.map(|t| t.block_trial.to_string())));
        cells.push(opt(trial.map(|t| t.session_trial.to_string())));
        cells.push(self.trials.session_type.clone());
        cells
    }
}

pub struct EventAligner {
    config: AlignmentConfig,
    fps: f64,
}

impl EventAligner {
    pub fn new(config: AlignmentConfig, fps: f64) -> Self {
        Self { config, fps }
    }

    /// Look up the subject/date session and align it onto `video_frames`.
    pub fn align_video(
        &self,
        sources: &EventSources,
        subject: &str,
        date: &str,
        video_frames: &[i64],
    ) -> Result<TaskTable, PipelineError> {
        let session = sources.log.session(subject, date)?;
        let offset = match &sources.time_table {
            Some(table) => table.offset(subject, date, self.config.time_buffer_start)?,
            None => 0.0,
        };
        Ok(self.align(&session, offset, video_frames))
    }

    pub fn align(&self, session: &SessionEvents, offset: f64, video_frames: &[i64]) -> TaskTable {
        let mut event_frames = quantize(&session.states, offset, self.fps);
        dedup_frames(&mut event_frames);
        let events: Vec<(i64, i64)> = event_frames
            .iter()
            .zip(&session.states)
            .map(|(&f, e)| (f, e.code))
            .collect();

        let frames = propagate(
            state_machine::Config {
                trial_start_code: self.config.trial_start_code,
                state_mapping: self.config.state_mapping.clone(),
            },
            video_frames,
            &events,
        );

        let trials = TrialClassifier::new(self.config.left_choice_code, self.config.right_choice_code)
            .classify(&session.trials);

        // trials without a parameter row keep the previous trial's metadata
        let mut last: Option<usize> = None;
        let mut current: Option<usize> = None;
        let frame_trials = frames
            .iter()
            .map(|f| {
                if f.trial.is_some() && f.trial != current {
                    current = f.trial;
                    if let Some(i) = f.trial.and_then(|k| trials.index_of(k)) {
                        last = Some(i);
                    }
                }
                current.and(last)
            })
            .collect();

        debug!(
            "Aligned {} events ({} trial rows, {} block(s)) with offset {:.3}s",
            events.len(),
            trials.trials.len(),
            trials.block_count,
            offset
        );

        TaskTable {
            attrs: session.attrs.clone(),
            offset,
            frames,
            trials,
            frame_trials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> EventSources {
        EventSources {
            log: EventLog::from_json(&event_log::testing::sample_json()).unwrap(),
            time_table: None,
        }
    }

    fn aligner() -> EventAligner {
        EventAligner::new(AlignmentConfig::default(), 10.0)
    }

    #[test]
    fn test_align_sample_session() {
        let frames: Vec<i64> = (0..20).collect();
        let task = aligner().align_video(&sources(), "101", "210301", &frames).unwrap();
        assert_eq!(task.len(), 20);

        // starts at 0.0s and 1.0s -> frames 0 and 10
        assert_eq!(task.frames[0].trial, Some(1));
        assert_eq!(task.frames[9].trial, Some(1));
        assert_eq!(task.frames[10].trial, Some(2));
        // state 7 at 0.4s -> frame 4, simplified to 4
        assert_eq!(task.frames[5].state, 7);
        assert_eq!(task.frames[5].simplified, 4);

        let t1 = task.trial_at(3).unwrap();
        assert_eq!(t1.params.choice, Some(0));
        assert_eq!(task.trial_at(15).unwrap().params.choice, Some(1));
        assert_eq!(task.trials.session_type, "+0.60");
    }

    #[test]
    fn test_row_rendering() {
        let frames: Vec<i64> = (0..20).collect();
        let task = aligner().align_video(&sources(), "101", "210301", &frames).unwrap();
        let names = task.column_names();
        assert_eq!(names[0], "genotype");
        assert_eq!(names.len(), 2 + TASK_COLUMNS.len());

        let row = task.row(4);
        assert_eq!(row.len(), names.len());
        let cell = |name: &str| row[names.iter().position(|n| n == name).unwrap()].clone();
        assert_eq!(cell("genotype"), "wt");
        assert_eq!(cell("state"), "7");
        assert_eq!(cell("state_"), "4");
        assert_eq!(cell("trial"), "1");
        assert_eq!(cell("reward"), "1");
        assert_eq!(cell("strategy"), "none");

        let row = task.row(5);
        assert_eq!(row[names.iter().position(|n| n == "state").unwrap()], "");
    }

    #[test]
    fn test_missing_session_fails() {
        let err = aligner()
            .align_video(&sources(), "101", "000000", &[0, 1])
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_time_table_offset_applies() {
        let mut src = sources();
        src.time_table = Some(TimeTable::parse("id,date,vid_start,vid_end\n101,210301,0.5,99\n").unwrap());
        let frames: Vec<i64> = (0..20).collect();
        let task = aligner().align_video(&src, "101", "210301", &frames).unwrap();
        assert_eq!(task.offset, 0.5);
        assert!(task.frames[4].trial.is_none());
        assert_eq!(task.frames[5].trial, Some(1));
        assert_eq!(task.frames[15].trial, Some(2));
    }

    #[test]
    fn test_missing_time_table_entry_fails() {
        let mut src = sources();
        src.time_table = Some(TimeTable::parse("id,date,vid_start,vid_end\n102,210301,0,99\n").unwrap());
        let err = aligner().align_video(&src, "101", "210301", &[0]).unwrap_err();
        assert!(matches!(err, PipelineError::AlignmentMiss { .. }));
    }

    #[test]
    fn test_trial_without_parameters_keeps_previous_metadata() {
        let session = SessionEvents {
            attrs: Vec::new(),
            states: [0.0, 0.5, 1.0]
                .iter()
                .map(|&time| event_log::StateEvent { time, code: 1 })
                .collect(),
            trials: vec![
                event_log::TrialParams {
                    ordinal: 1,
                    time: 0.0,
                    choice: Some(0),
                    reward: true,
                    probability_left: 0.8,
                    probability_right: 0.2,
                },
                event_log::TrialParams {
                    ordinal: 2,
                    time: 0.5,
                    choice: Some(0),
                    reward: false,
                    probability_left: 0.8,
                    probability_right: 0.2,
                },
            ],
        };
        let frames: Vec<i64> = (0..15).collect();
        let task = aligner().align(&session, 0.0, &frames);

        assert_eq!(task.frames[12].trial, Some(3));
        let second = task.trial_at(7).unwrap();
        let third = task.trial_at(12).unwrap();
        assert_eq!(third, second);
        assert_eq!(third.params.choice, Some(0));
        assert!(!third.params.reward);
        assert_eq!(third.strategy, trials::Strategy::WinStay);

        let names = task.column_names();
        let row = task.row(12);
        let cell = |name: &str| row[names.iter().position(|n| n == name).unwrap()].clone();
        assert_eq!(cell("trial"), "3");
        assert_eq!(cell("choice"), "0");
        assert_eq!(cell("reward"), "0");
        assert_eq!(cell("strategy"), "win_stay");
        assert_eq!(cell("session_trial"), "2");
    }

    #[test]
    fn test_colliding_events_kept() {
        let session = SessionEvents {
            attrs: Vec::new(),
            states: vec![
                event_log::StateEvent { time: 0.0, code: 1 },
                event_log::StateEvent { time: 0.01, code: 7 },
                event_log::StateEvent { time: 0.02, code: 1 },
            ],
            trials: Vec::new(),
        };
        let frames: Vec<i64> = (0..5).collect();
        let task = aligner().align(&session, 0.0, &frames);
        let events: Vec<Option<i64>> = task.frames.iter().map(|f| f.event).collect();
        assert_eq!(events, vec![Some(1), Some(7), Some(1), None, None]);
        assert_eq!(task.frames[4].trial, Some(2));
        // no parameter rows: nothing to attach
        assert!(task.trial_at(4).is_none());
    }
}
