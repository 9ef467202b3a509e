// Hexapod leg control
//
// Provides:
// - Leg geometry, calibration tables and per-leg state
// - Leg inverse/forward kinematics
// - Range-of-motion check and the pose dispatcher (the only path to the servos)
// - Tripod gait generator
// - High-level motion API
// - Servo bus abstraction with a simulated bus and a serial controller driver

mod controller;
pub mod gait;
pub mod geometry;
pub mod kinematics;
pub mod pose;
pub mod servo;
pub mod ssc32;

pub use controller::HexapodController;
pub use gait::{CancelToken, TripodGait};
pub use geometry::{Coordinate, HexapodState, JointAngles, LegPositions};
pub use pose::MotionError;
pub use servo::{ServoBus, ServoError, ServoWrite, SimulatedBus};
pub use ssc32::Ssc32Bus;
