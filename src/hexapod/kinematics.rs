// Leg inverse kinematics for the hexapod
// Converts a foot tip coordinate (hip frame, mm) into hip/knee/ankle servo angles.
//
// Each leg is a rotating hip with a fixed offset (L1) followed by a planar
// two-link chain (upper leg L2, lower leg L3).

use std::f64::consts::{FRAC_PI_2, PI};

use super::geometry::{Coordinate, JointAngles, SegmentLengths};

/// Error types for the leg solver
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum KinematicsError {
    #[error("Foot target {coordinate:?} is out of reach (knee cosine {cosine})")]
    Unreachable { coordinate: Coordinate, cosine: f64 },
}

/// Solve one leg with the default segment lengths
pub fn coords_to_angles(coordinate: Coordinate) -> Result<JointAngles, KinematicsError> {
    coords_to_angles_with_segments(coordinate, &SegmentLengths::default())
}

/// Solve one leg and round to whole servo degrees
///
/// Ties round to even.
pub fn coords_to_angles_with_segments(
    coordinate: Coordinate,
    segments: &SegmentLengths,
) -> Result<JointAngles, KinematicsError> {
    let [hip, knee, ankle] = solve_degrees(coordinate, segments)?;

    Ok(JointAngles::new(
        hip.round_ties_even() as i32,
        knee.round_ties_even() as i32,
        ankle.round_ties_even() as i32,
    ))
}

/// Solve one leg, returning unrounded servo-frame degrees [hip, knee, ankle]
pub fn solve_degrees(
    coordinate: Coordinate,
    segments: &SegmentLengths,
) -> Result<[f64; 3], KinematicsError> {
    let Coordinate { x, y, z } = coordinate;
    let SegmentLengths { l1, l2, l3 } = *segments;

    // Hip azimuth
    let alpha = y.atan2(x);

    // Horizontal distance from the knee-pitch joint to the foot
    let planar_reach = (x.powi(2) + y.powi(2)).sqrt() - l1;

    // Interior knee angle from the law of cosines
    let cosine = (l2.powi(2) + l3.powi(2) - z.powi(2) - planar_reach.powi(2)) / (2.0 * l2 * l3);
    if !(-1.0..=1.0).contains(&cosine) {
        // Also catches NaN from non-finite input
        return Err(KinematicsError::Unreachable { coordinate, cosine });
    }
    let epsilon = cosine.acos();

    let gamma = PI - epsilon;
    let beta = -z.atan2(planar_reach) - (l3 * epsilon.sin()).atan2(l2 - l3 * epsilon.cos());

    // Servo frame: 90 deg is the hip/knee centre, ankle is measured directly
    Ok([
        (FRAC_PI_2 - alpha).to_degrees(),
        (FRAC_PI_2 - beta).to_degrees(),
        gamma.to_degrees(),
    ])
}

/// Forward kinematics: servo-frame degrees back to a foot coordinate
///
/// Exact inverse of [`solve_degrees`].
pub fn angles_to_coords(
    hip_deg: f64,
    knee_deg: f64,
    ankle_deg: f64,
    segments: &SegmentLengths,
) -> Coordinate {
    let SegmentLengths { l1, l2, l3 } = *segments;

    let alpha = FRAC_PI_2 - hip_deg.to_radians();
    let beta = FRAC_PI_2 - knee_deg.to_radians();
    let gamma = ankle_deg.to_radians();

    let planar = l1 + l2 * beta.cos() + l3 * (beta + gamma).cos();

    Coordinate::new(
        alpha.cos() * planar,
        alpha.sin() * planar,
        -l2 * beta.sin() - l3 * (beta + gamma).sin(),
    )
}
