// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub io: IoConfig,
    pub refine: RefineConfig,
    pub standardize: StandardizeConfig,
    pub features: FeatureConfig,
    pub alignment: AlignmentConfig,
    pub workers: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub input_dir: String,
    pub output_dir: String,
    /// Rows before the first data row (csv header + scorer/bodyparts/coords)
    pub header_rows: usize,
    pub fps: f64,
    pub pose_suffix: String,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input_dir: "data".to_string(),
            output_dir: "results".to_string(),
            header_rows: 4,
            fps: 25.0,
            pose_suffix: ".csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub confidence_cutoff: f64,
    pub median_window: usize,
    pub savgol_window: Option<usize>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            confidence_cutoff: 0.1,
            median_window: 5,
            savgol_window: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizeConfig {
    pub origin: Keypoint,
    pub scale_reference: Keypoint,
    /// Physical distance (cm) between origin and scale reference
    pub scale_length: f64,
    pub decimals: u32,
}

impl Default for StandardizeConfig {
    fn default() -> Self {
        Self {
            origin: Keypoint::LowerLeftCorner,
            scale_reference: Keypoint::LowerRightCorner,
            scale_length: 26.8,
            decimals: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Size of a full turn in this unit
    pub fn full_turn(&self) -> f64 {
        match self {
            Self::Degrees => 360.0,
            Self::Radians => std::f64::consts::TAU,
        }
    }

    pub fn from_radians(&self, value: f64) -> f64 {
        match self {
            Self::Degrees => value.to_degrees(),
            Self::Radians => value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub decimals: u32,
    pub body_keypoints: Vec<Keypoint>,
    pub targets: Vec<Keypoint>,
    pub angle_unit: AngleUnit,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            decimals: 2,
            body_keypoints: vec![
                Keypoint::Snout,
                Keypoint::Spine1,
                Keypoint::Spine2,
                Keypoint::Tail1,
            ],
            targets: vec![
                Keypoint::LeftScreen,
                Keypoint::MiddleScreen,
                Keypoint::RightScreen,
                Keypoint::FoodPort,
            ],
            angle_unit: AngleUnit::Degrees,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub event_log: Option<String>,
    pub time_table: Option<String>,
    /// Seconds added to the recording start when the video was clipped
    pub time_buffer_start: f64,
    pub trial_start_code: i64,
    pub state_mapping: BTreeMap<i64, i64>,
    pub left_choice_code: i64,
    pub right_choice_code: i64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        let state_mapping = [
            (0, 0),
            (1, 1),
            (2, 1),
            (3, 2),
            (4, 2),
            (5, 2),
            (6, 3),
            (7, 4),
            (8, 5),
            (9, 6),
            (10, 0),
            (99, 0),
        ]
        .into_iter()
        .collect();

        Self {
            event_log: None,
            time_table: None,
            time_buffer_start: 0.0,
            trial_start_code: 1,
            state_mapping,
            left_choice_code: 0,
            right_choice_code: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerConfig(pub usize);

impl Default for WorkerConfig {
    fn default() -> Self {
        Self(4)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// KEYPOINTS
// ============================================================================

/// Tracked body parts followed by the fixed scene reference points, in the
/// column order of the pose-estimation output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Keypoint {
    #[serde(rename = "snout")]
    Snout,
    #[serde(rename = "lEar")]
    LeftEar,
    #[serde(rename = "rEar")]
    RightEar,
    #[serde(rename = "spine1")]
    Spine1,
    #[serde(rename = "spine2")]
    Spine2,
    #[serde(rename = "tail1")]
    Tail1,
    #[serde(rename = "tail2")]
    Tail2,
    #[serde(rename = "tail3")]
    Tail3,
    #[serde(rename = "food_port")]
    FoodPort,
    #[serde(rename = "ll_corner")]
    LowerLeftCorner,
    #[serde(rename = "lr_corner")]
    LowerRightCorner,
    #[serde(rename = "l_screen")]
    LeftScreen,
    #[serde(rename = "m_screen")]
    MiddleScreen,
    #[serde(rename = "r_screen")]
    RightScreen,
}

impl Keypoint {
    pub const COUNT: usize = 14;

    pub const ALL: [Keypoint; Self::COUNT] = [
        Self::Snout,
        Self::LeftEar,
        Self::RightEar,
        Self::Spine1,
        Self::Spine2,
        Self::Tail1,
        Self::Tail2,
        Self::Tail3,
        Self::FoodPort,
        Self::LowerLeftCorner,
        Self::LowerRightCorner,
        Self::LeftScreen,
        Self::MiddleScreen,
        Self::RightScreen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snout => "snout",
            Self::LeftEar => "lEar",
            Self::RightEar => "rEar",
            Self::Spine1 => "spine1",
            Self::Spine2 => "spine2",
            Self::Tail1 => "tail1",
            Self::Tail2 => "tail2",
            Self::Tail3 => "tail3",
            Self::FoodPort => "food_port",
            Self::LowerLeftCorner => "ll_corner",
            Self::LowerRightCorner => "lr_corner",
            Self::LeftScreen => "l_screen",
            Self::MiddleScreen => "m_screen",
            Self::RightScreen => "r_screen",
        }
    }

    /// Reference points are physically fixed in the chamber
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Self::FoodPort
                | Self::LowerLeftCorner
                | Self::LowerRightCorner
                | Self::LeftScreen
                | Self::MiddleScreen
                | Self::RightScreen
        )
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Keypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which axis of a keypoint a coordinate column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

pub fn column_name(keypoint: Keypoint, axis: Axis) -> String {
    format!("{}_{}", keypoint.as_str(), axis.suffix())
}
