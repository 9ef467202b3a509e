// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_PRECISION;

fn default_precision() -> u32 {
    DEFAULT_PRECISION
}

// Command from teleop/scripts -> runtime
// Tagged by "type", e.g. {"type": "walk", "paces": 2, "angle": 90}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MotionCommand {
    Balance,
    Relax,
    Walk {
        paces: u32,
        angle: f64,
        #[serde(default = "default_precision")]
        precision: u32,
    },
    /// `leg` is numbered 1-6
    SetLegPosition { leg: usize, x: f64, y: f64, z: f64 },
    /// Abort a running walk
    Stop,
}

impl MotionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MotionCommand::Balance => "balance",
            MotionCommand::Relax => "relax",
            MotionCommand::Walk { .. } => "walk",
            MotionCommand::SetLegPosition { .. } => "set_leg_position",
            MotionCommand::Stop => "stop",
        }
    }
}

/// Controller status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ControllerHealth {
    Ready,
    Moving,
    Rejected,
    Cancelled,
    Fault,
}

// Status report runtime -> operators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub health: ControllerHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StatusReport {
    pub fn new(health: ControllerHealth) -> Self {
        Self {
            health,
            detail: None,
        }
    }

    pub fn with_detail(health: ControllerHealth, detail: impl Into<String>) -> Self {
        Self {
            health,
            detail: Some(detail.into()),
        }
    }
}
