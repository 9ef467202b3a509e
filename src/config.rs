// Timing, topics, servo port and robot geometry/calibration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hexapod::geometry::{
    BALANCE_POSE, CHANNEL_MAP, COORD_OFFSETS, Coordinate, JOINTS_PER_LEG, LEG_COUNT,
    LegPositions, SegmentLengths,
};
use crate::hexapod::pose::check_range_of_motion;
use crate::hexapod::ssc32;

// Runtime loop frequency (status publishing, command polling)
pub const LOOP_HZ: u64 = 50;

// Pause after every gait frame so the servos can keep up
pub const STEP_DELAY: Duration = Duration::from_millis(50);

// Gait samples per half cycle when the caller doesn't say
pub const DEFAULT_PRECISION: u32 = 40;

// Zenoh topics
pub const TOPIC_CMD_MOTION: &str = "hexapod/cmd/motion"; // commands
pub const TOPIC_STATE_CONTROLLER: &str = "hexapod/state/controller"; // controller status

// Serial port for the servo controller
pub const SERVO_PORT: &str = "/dev/ttyUSB0";

/// Error types for loading a robot configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {reason}")]
    Invalid { reason: String },
}

/// Geometry and calibration of one robot
///
/// Defaults to the compiled-in tables; a JSON file with the same fields can
/// replace them for a differently assembled robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub segments: SegmentLengths,
    /// Servo channel for each leg's [hip, knee, ankle]
    pub channels: [[u8; JOINTS_PER_LEG]; LEG_COUNT],
    /// Calibration offset added to each leg's target (mm)
    pub offsets: [[f64; 3]; LEG_COUNT],
    /// Neutral standing pose (mm)
    pub balance_pose: [[f64; 3]; LEG_COUNT],
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            segments: SegmentLengths::default(),
            channels: CHANNEL_MAP,
            offsets: COORD_OFFSETS,
            balance_pose: BALANCE_POSE,
        }
    }
}

impl RobotConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON config; missing fields keep their defaults
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let SegmentLengths { l1, l2, l3 } = self.segments;
        if !(l1 >= 0.0 && l2 > 0.0 && l3 > 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!("segment lengths must be positive, got {:?}", self.segments),
            });
        }

        let mut seen = [false; ssc32::CHANNEL_COUNT as usize];
        for &channel in self.channels.iter().flatten() {
            let Some(slot) = seen.get_mut(channel as usize) else {
                return Err(ConfigError::Invalid {
                    reason: format!("channel {} does not exist", channel),
                });
            };
            if *slot {
                return Err(ConfigError::Invalid {
                    reason: format!("channel {} is assigned twice", channel),
                });
            }
            *slot = true;
        }

        if let Err(e) = check_range_of_motion(&self.balance_pose()) {
            return Err(ConfigError::Invalid {
                reason: format!("balance pose: {}", e),
            });
        }

        Ok(())
    }

    pub fn balance_pose(&self) -> LegPositions {
        LegPositions::from_table(&self.balance_pose)
    }

    pub fn offset(&self, leg: usize) -> Coordinate {
        Coordinate::from(self.offsets[leg])
    }
}
