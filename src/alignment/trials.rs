// src/alignment/trials.rs
//
// Trial-level classification. A single left-to-right scan over the trials
// of a session, carrying the previous trial's choice, reward, rare flag and
// reward streak.

use super::event_log::TrialParams;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// First trial, either trial of the pair made no choice, or a common
    /// outcome followed by win-shift or lose-stay
    None,
    WinStay,
    LoseShift,
    RareStay,
    RareShift,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::WinStay => "win_stay",
            Self::LoseShift => "lose_shift",
            Self::RareStay => "rare_stay",
            Self::RareShift => "rare_shift",
        }
    }

    fn classify(prev_reward: bool, prev_rare: bool, stayed: bool) -> Self {
        match (prev_rare, prev_reward, stayed) {
            (true, _, true) => Self::RareStay,
            (true, _, false) => Self::RareShift,
            (false, true, true) => Self::WinStay,
            (false, false, false) => Self::LoseShift,
            (false, true, false) | (false, false, true) => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    pub params: TrialParams,
    pub side: Option<Side>,
    /// probability_left - probability_right
    pub contrast: f64,
    /// `None` when no choice was made
    pub optimal: Option<bool>,
    pub rare: Option<bool>,
    pub streak: i64,
    pub unexpectation: i64,
    pub strategy: Strategy,
    /// 1-based block id
    pub block: usize,
    /// Ordinal within the block; counts down toward the transition in the
    /// first block of a multi-block session
    pub block_trial: usize,
    /// Position in the session, 1..N
    pub session_trial: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionTrials {
    pub trials: Vec<TrialSummary>,
    pub block_count: usize,
    pub session_type: String,
}

impl SessionTrials {
    /// Index of the summary for a trial ordinal as counted on the frame
    /// timeline
    pub fn index_of(&self, ordinal: usize) -> Option<usize> {
        self.trials
            .binary_search_by_key(&ordinal, |t| t.params.ordinal)
            .ok()
    }
}

pub struct TrialClassifier {
    left_code: i64,
    right_code: i64,
}

impl TrialClassifier {
    pub fn new(left_code: i64, right_code: i64) -> Self {
        Self {
            left_code,
            right_code,
        }
    }

    fn side(&self, choice: Option<i64>) -> Option<Side> {
        match choice {
            Some(c) if c == self.left_code => Some(Side::Left),
            Some(c) if c == self.right_code => Some(Side::Right),
            _ => None,
        }
    }

    /// `trials` must be sorted by ordinal
    pub fn classify(&self, trials: &[TrialParams]) -> SessionTrials {
        let mut out: Vec<TrialSummary> = Vec::with_capacity(trials.len());

        let mut prev_side: Option<Side> = None;
        let mut prev_reward = false;
        let mut prev_rare: Option<bool> = None;
        let mut streak: i64 = 0;

        for (i, params) in trials.iter().enumerate() {
            let side = self.side(params.choice);
            let contrast = params.probability_left - params.probability_right;

            let optimal = side.map(|s| match s {
                Side::Left => params.probability_left > params.probability_right,
                Side::Right => params.probability_right > params.probability_left,
            });
            let rare = optimal.map(|o| o != params.reward);

            let mut unexpectation = 0;
            let direction = if params.reward { 1 } else { -1 };
            if streak * direction > 0 {
                streak += direction;
            } else {
                unexpectation = -streak;
                streak = direction;
            }

            let strategy = match (i, prev_side, side, prev_rare) {
                (0, ..) => Strategy::None,
                (_, Some(p), Some(c), Some(r)) => Strategy::classify(prev_reward, r, p == c),
                _ => Strategy::None,
            };

            out.push(TrialSummary {
                params: params.clone(),
                side,
                contrast,
                optimal,
                rare,
                streak,
                unexpectation,
                strategy,
                block: 0,
                block_trial: 0,
                session_trial: i + 1,
            });

            prev_side = side;
            prev_reward = params.reward;
            prev_rare = rare;
        }

        let (block_count, contrasts) = assign_blocks(&mut out);
        let session_type = contrasts
            .iter()
            .map(|c| format!("{:+.2}", c))
            .collect::<Vec<_>>()
            .join("_");

        SessionTrials {
            trials: out,
            block_count,
            session_type,
        }
    }
}

/// Split trials into blocks of constant reward probabilities and number
/// them. Returns the block count and each block's contrast.
fn assign_blocks(trials: &mut [TrialSummary]) -> (usize, Vec<f64>) {
    let mut bounds: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for i in 1..=trials.len() {
        let changed = i == trials.len() || {
            let (a, b) = (&trials[i - 1].params, &trials[i].params);
            a.probability_left != b.probability_left || a.probability_right != b.probability_right
        };
        if changed {
            bounds.push((start, i));
            start = i;
        }
    }

    let multi = bounds.len() > 1;
    let mut contrasts = Vec::with_capacity(bounds.len());
    for (b, &(lo, hi)) in bounds.iter().enumerate() {
        let len = hi - lo;
        contrasts.push(trials[lo].contrast);
        for (k, trial) in trials[lo..hi].iter_mut().enumerate() {
            trial.block = b + 1;
            trial.block_trial = if multi && b == 0 { len - k } else { k + 1 };
        }
    }
    (bounds.len(), contrasts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(ordinal: usize, choice: Option<i64>, reward: bool, pl: f64, pr: f64) -> TrialParams {
        TrialParams {
            ordinal,
            time: ordinal as f64,
            choice,
            reward,
            probability_left: pl,
            probability_right: pr,
        }
    }

    fn classifier() -> TrialClassifier {
        TrialClassifier::new(0, 1)
    }

    #[test]
    fn test_win_stay_lose_shift_scenario() {
        // left is optimal (0.8 vs 0.2)
        let trials = [
            trial(1, Some(0), true, 0.8, 0.2),  // optimal, rewarded: common win
            trial(2, Some(0), false, 0.8, 0.2), // stay after win; optimal unrewarded: rare
            trial(3, Some(1), false, 0.8, 0.2), // shift after rare; non-optimal unrewarded: common loss
            trial(4, Some(0), true, 0.8, 0.2),  // shift after loss
        ];
        let session = classifier().classify(&trials);
        let strategies: Vec<Strategy> = session.trials.iter().map(|t| t.strategy).collect();
        assert_eq!(
            strategies,
            vec![
                Strategy::None,
                Strategy::WinStay,
                Strategy::RareShift,
                Strategy::LoseShift
            ]
        );
        let rare: Vec<Option<bool>> = session.trials.iter().map(|t| t.rare).collect();
        assert_eq!(rare, vec![Some(false), Some(true), Some(false), Some(false)]);
        let optimal: Vec<Option<bool>> = session.trials.iter().map(|t| t.optimal).collect();
        assert_eq!(optimal, vec![Some(true), Some(true), Some(false), Some(true)]);
    }

    #[test]
    fn test_win_shift_and_lose_stay_are_none() {
        let trials = [
            trial(1, Some(0), true, 0.8, 0.2),  // common win
            trial(2, Some(1), true, 0.8, 0.2),  // shift after win; non-optimal rewarded: rare
            trial(3, Some(0), false, 0.8, 0.2), // shift after rare
            trial(4, Some(0), true, 0.8, 0.2),  // stay after rare
            trial(5, Some(1), false, 0.8, 0.2), // shift after common win
            trial(6, Some(1), false, 0.8, 0.2), // stay after common loss
        ];
        let session = classifier().classify(&trials);
        let labels: Vec<&str> = session.trials.iter().map(|t| t.strategy.as_str()).collect();
        assert_eq!(
            labels,
            vec!["none", "none", "rare_shift", "rare_stay", "none", "none"]
        );
        let allowed = ["none", "win_stay", "lose_shift", "rare_stay", "rare_shift"];
        assert!(labels.iter().all(|l| allowed.contains(l)));
    }

    #[test]
    fn test_rare_stay() {
        let trials = [
            trial(1, Some(1), true, 0.8, 0.2), // non-optimal but rewarded: rare
            trial(2, Some(1), false, 0.8, 0.2),
        ];
        let session = classifier().classify(&trials);
        assert_eq!(session.trials[1].strategy, Strategy::RareStay);
    }

    #[test]
    fn test_streak_and_unexpectation() {
        let rewards = [true, true, true, false, false, true];
        let trials: Vec<TrialParams> = rewards
            .iter()
            .enumerate()
            .map(|(i, &r)| trial(i + 1, Some(0), r, 0.5, 0.5))
            .collect();
        let session = classifier().classify(&trials);
        let streaks: Vec<i64> = session.trials.iter().map(|t| t.streak).collect();
        assert_eq!(streaks, vec![1, 2, 3, -1, -2, 1]);
        let unexp: Vec<i64> = session.trials.iter().map(|t| t.unexpectation).collect();
        assert_eq!(unexp, vec![0, 0, 0, -3, 0, 2]);
    }

    #[test]
    fn test_no_choice_breaks_strategy_chain() {
        let trials = [
            trial(1, Some(0), true, 0.8, 0.2),
            trial(2, None, false, 0.8, 0.2),
            trial(3, Some(0), true, 0.8, 0.2),
        ];
        let session = classifier().classify(&trials);
        assert_eq!(session.trials[1].optimal, None);
        assert_eq!(session.trials[1].strategy, Strategy::None);
        assert_eq!(session.trials[2].strategy, Strategy::None);
    }

    #[test]
    fn test_equal_probabilities_never_optimal() {
        let session = classifier().classify(&[trial(1, Some(1), true, 0.5, 0.5)]);
        assert_eq!(session.trials[0].optimal, Some(false));
        assert_eq!(session.trials[0].rare, Some(true));
    }

    #[test]
    fn test_block_renumbering() {
        let mut trials: Vec<TrialParams> = (1..=3).map(|i| trial(i, Some(0), true, 0.8, 0.2)).collect();
        trials.extend((4..=5).map(|i| trial(i, Some(0), true, 0.2, 0.8)));
        let session = classifier().classify(&trials);

        assert_eq!(session.block_count, 2);
        let blocks: Vec<usize> = session.trials.iter().map(|t| t.block).collect();
        assert_eq!(blocks, vec![1, 1, 1, 2, 2]);
        let local: Vec<usize> = session.trials.iter().map(|t| t.block_trial).collect();
        assert_eq!(local, vec![3, 2, 1, 1, 2]);
        let global: Vec<usize> = session.trials.iter().map(|t| t.session_trial).collect();
        assert_eq!(global, vec![1, 2, 3, 4, 5]);
        assert_eq!(session.session_type, "+0.60_-0.60");
    }

    #[test]
    fn test_single_block_counts_up() {
        let trials: Vec<TrialParams> = (1..=3).map(|i| trial(i, Some(0), true, 0.7, 0.3)).collect();
        let session = classifier().classify(&trials);
        assert_eq!(session.block_count, 1);
        let local: Vec<usize> = session.trials.iter().map(|t| t.block_trial).collect();
        assert_eq!(local, vec![1, 2, 3]);
        assert_eq!(session.session_type, "+0.40");
        assert_eq!(session.index_of(2).map(|i| session.trials[i].session_trial), Some(2));
        assert!(session.index_of(9).is_none());
    }

    #[test]
    fn test_empty_session() {
        let session = classifier().classify(&[]);
        assert_eq!(session.block_count, 0);
        assert!(session.session_type.is_empty());
    }
}
