// Range-of-motion check and pose dispatch
//
// Every servo command goes through `dispatch_pose`:
// validate -> calibrate -> solve -> mirror -> clamp -> transmit.
// The whole six-leg plan is built before the first write, so a rejected
// leg blocks all 18 joints.

use tracing::{debug, error, warn};

use super::geometry::{
    Coordinate, HexapodState, JointAngles, LEG_COUNT, LegPositions, LegState, is_mirrored,
};
use super::kinematics::{KinematicsError, coords_to_angles_with_segments};
use super::servo::{ServoBus, ServoError};
use crate::config::RobotConfig;

/// Feet closer than this to the hip sit in the solver's singular region
pub const MIN_EXTENSION_MM: f64 = 90.0;

/// Servo travel limits in degrees
pub const MIN_ANGLE_DEG: i32 = 0;
pub const MAX_ANGLE_DEG: i32 = 180;

/// Why a foot target failed the range-of-motion check
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RangeViolation {
    #[error("extension {extension:.1}mm is below {min}mm", min = MIN_EXTENSION_MM)]
    TooClose { extension: f64 },

    #[error("foot is behind the hip (x < 0)")]
    BehindHip,

    #[error("coordinate is not finite")]
    NotFinite,
}

/// Error types for commanding a pose
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("Leg {leg} target {coordinate:?} is not in range of motion: {reason}")]
    OutOfRange {
        leg: usize,
        coordinate: Coordinate,
        reason: RangeViolation,
    },

    #[error("Invalid leg number {leg} (expected 1-6)")]
    InvalidLeg { leg: usize },

    #[error("Leg {leg} could not be solved: {source}")]
    Kinematics {
        leg: usize,
        #[source]
        source: KinematicsError,
    },

    #[error("Servo error: {0}")]
    Servo(#[from] ServoError),

    #[error("Motion cancelled")]
    Cancelled,
}

/// Check one foot target against the reach envelope
pub fn check_leg(coordinate: &Coordinate) -> Result<(), RangeViolation> {
    if !coordinate.is_finite() {
        return Err(RangeViolation::NotFinite);
    }

    let extension = coordinate.extension();
    if extension < MIN_EXTENSION_MM {
        return Err(RangeViolation::TooClose { extension });
    }
    if coordinate.x < 0.0 {
        return Err(RangeViolation::BehindHip);
    }
    Ok(())
}

/// Check all six uncalibrated targets, failing on the first bad leg
pub fn check_range_of_motion(targets: &LegPositions) -> Result<(), MotionError> {
    for (leg, coordinate) in targets.iter().enumerate() {
        check_leg(coordinate).map_err(|reason| MotionError::OutOfRange {
            leg,
            coordinate: *coordinate,
            reason,
        })?;
    }
    Ok(())
}

/// Restrict an angle to the servo travel
pub fn clamp_angle(angle: i32) -> u8 {
    angle.clamp(MIN_ANGLE_DEG, MAX_ANGLE_DEG) as u8
}

/// Compute the committed state for a pose without touching the hardware
pub fn plan_pose(
    config: &RobotConfig,
    targets: &LegPositions,
) -> Result<[LegState; LEG_COUNT], MotionError> {
    check_range_of_motion(targets)?;

    let mut legs = [LegState::default(); LEG_COUNT];
    for (leg, state) in legs.iter_mut().enumerate() {
        let target = targets[leg];
        let calibrated = target + config.offset(leg);

        let solved = coords_to_angles_with_segments(calibrated, &config.segments)
            .map_err(|source| MotionError::Kinematics { leg, source })?;
        let angles = if is_mirrored(leg) {
            solved.mirrored()
        } else {
            solved
        };

        *state = LegState {
            target,
            calibrated,
            angles: JointAngles::new(
                clamp_angle(angles.hip) as i32,
                clamp_angle(angles.knee) as i32,
                clamp_angle(angles.ankle) as i32,
            ),
        };
    }

    Ok(legs)
}

/// Validate, solve and send a six-leg pose, then commit it to `state`
///
/// On any error before the first write nothing is sent and `state` is left
/// as it was. `state` only ever holds the last pose that was sent in full:
/// if a write fails partway, the joints before it have already moved while
/// `state` still describes the previous pose.
pub fn dispatch_pose<B: ServoBus + ?Sized>(
    config: &RobotConfig,
    bus: &mut B,
    state: &mut HexapodState,
    targets: &LegPositions,
) -> Result<(), MotionError> {
    let legs = match plan_pose(config, targets) {
        Ok(legs) => legs,
        Err(e) => {
            warn!("Pose rejected: {}", e);
            return Err(e);
        }
    };

    for (leg, leg_state) in legs.iter().enumerate() {
        for (joint, angle) in leg_state.angles.as_array().into_iter().enumerate() {
            let channel = config.channels[leg][joint];
            if let Err(e) = bus.set_angle(channel, clamp_angle(angle)) {
                error!(
                    "Servo write failed at leg {} joint {} (channel {}): {}",
                    leg, joint, channel, e
                );
                return Err(e.into());
            }
        }
    }

    debug!("Pose dispatched: {:?}", legs.map(|leg| leg.angles.as_array()));
    state.legs = legs;
    Ok(())
}
