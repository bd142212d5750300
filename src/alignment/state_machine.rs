// src/alignment/state_machine.rs
//
// Frame-by-frame walk over the video timeline, fed with the quantized
// state events that land on each frame. Tracks the held state code and the
// running trial ordinal.

use super::event_log::StateEvent;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignPhase {
    /// No event has landed on the timeline yet
    AwaitingEvents,
    /// Events seen, but no trial has started
    PreTrial,
    InTrial,
}

/// Resolved task state of one video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    /// Raw code of the event landing on this frame, if any
    pub event: Option<i64>,
    /// Held raw code, 0 before the first event
    pub state: i64,
    /// `state` passed through the simplification table
    pub simplified: i64,
    /// Session-wide trial ordinal, `None` before the first trial start
    pub trial: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub trial_start_code: i64,
    pub state_mapping: BTreeMap<i64, i64>,
}

pub struct StateMachine {
    config: Config,
    phase: AlignPhase,
    held_state: i64,
    trials_started: usize,
}

impl StateMachine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: AlignPhase::AwaitingEvents,
            held_state: 0,
            trials_started: 0,
        }
    }

    pub fn phase(&self) -> AlignPhase {
        self.phase
    }

    pub fn trials_started(&self) -> usize {
        self.trials_started
    }

    pub fn update(&mut self, event: Option<i64>) -> FrameState {
        if let Some(code) = event {
            self.held_state = code;
            if code == self.config.trial_start_code {
                self.trials_started += 1;
                self.phase = AlignPhase::InTrial;
            } else if self.phase == AlignPhase::AwaitingEvents {
                self.phase = AlignPhase::PreTrial;
            }
        }

        let trial = match self.phase {
            AlignPhase::InTrial => Some(self.trials_started),
            _ => None,
        };

        FrameState {
            event,
            state: self.held_state,
            simplified: self.simplify(self.held_state),
            trial,
        }
    }

    fn simplify(&self, code: i64) -> i64 {
        self.config.state_mapping.get(&code).copied().unwrap_or(code)
    }
}

/// Map event-log seconds onto frame indices, truncating toward zero:
/// `trunc((t + offset) * fps)`. Events less than one frame before the
/// video start land on frame 0.
pub fn quantize(events: &[StateEvent], offset: f64, fps: f64) -> Vec<i64> {
    events
        .iter()
        .map(|e| ((e.time + offset) * fps).trunc() as i64)
        .collect()
}

/// Make a frame sequence strictly increasing in place: any frame that does
/// not exceed its predecessor is moved to the predecessor + 1. Count and
/// order are preserved.
pub fn dedup_frames(frames: &mut [i64]) {
    for i in 1..frames.len() {
        if frames[i] <= frames[i - 1] {
            frames[i] = frames[i - 1] + 1;
        }
    }
}

/// Run the state machine over every video frame.
///
/// `events` must already be deduplicated; events whose frame is not part of
/// the video are ignored.
pub fn propagate(config: Config, video_frames: &[i64], events: &[(i64, i64)]) -> Vec<FrameState> {
    let by_frame: HashMap<i64, i64> = events.iter().copied().collect();
    let mut machine = StateMachine::new(config);
    let states: Vec<FrameState> = video_frames
        .iter()
        .map(|f| machine.update(by_frame.get(f).copied()))
        .collect();
    debug!(
        "Timeline walk ended {:?} after {} trial start(s)",
        machine.phase(),
        machine.trials_started()
    );
    states
}
