// Fixed hexapod geometry and the per-leg value types shared by the solver,
// validator, dispatcher and gait generator.
//
// Leg numbering: 0..=2 on one side, 3..=5 on the other. Legs 3..=5 are
// mounted mirrored, so their servo angles are flipped after solving.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Number of legs on the robot
pub const LEG_COUNT: usize = 6;

/// Number of joints (servos) per leg: hip, knee, ankle
pub const JOINTS_PER_LEG: usize = 3;

/// Segment lengths in millimeters
pub const HIP_OFFSET_MM: f64 = 33.0; // L1
pub const UPPER_LEG_MM: f64 = 90.0; // L2
pub const LOWER_LEG_MM: f64 = 110.0; // L3

/// Servo controller channel for each [hip, knee, ankle]
pub const CHANNEL_MAP: [[u8; JOINTS_PER_LEG]; LEG_COUNT] = [
    [15, 14, 13],
    [12, 11, 10],
    [9, 8, 31],
    [22, 23, 27],
    [19, 20, 21],
    [16, 17, 18],
];

/// Per-leg correction for servo horn misalignment (mm)
pub const COORD_OFFSETS: [[f64; 3]; LEG_COUNT] = [
    [-15.0, 55.0, 10.0],
    [0.0, 15.0, 0.0],
    [-8.0, 10.0, -30.0],
    [-15.0, 0.0, -15.0],
    [-15.0, 22.0, -21.0],
    [-15.0, 20.0, 10.0],
];

/// Foot positions of the neutral standing posture (mm)
pub const BALANCE_POSE: [[f64; 3]; LEG_COUNT] = [[140.0, 0.0, -40.0]; LEG_COUNT];

/// Foot positions commanded at startup, legs pointing straight out (mm)
pub const INITIAL_POSE: [[f64; 3]; LEG_COUNT] = [[140.0, 0.0, 0.0]; LEG_COUNT];

/// Legs with an index above this are mounted mirrored
const LAST_UNMIRRORED_LEG: usize = 2;

/// Whether a leg's servos are mounted mirrored
pub fn is_mirrored(leg: usize) -> bool {
    leg > LAST_UNMIRRORED_LEG
}

/// Fixed segment lengths of one leg (mm)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentLengths {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
}

impl Default for SegmentLengths {
    fn default() -> Self {
        Self {
            l1: HIP_OFFSET_MM,
            l2: UPPER_LEG_MM,
            l3: LOWER_LEG_MM,
        }
    }
}

/// Foot tip position relative to the leg's hip frame (mm)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance from the hip joint to the foot
    pub fn extension(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Coordinate {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Coordinate {
    type Output = Coordinate;

    fn mul(self, rhs: f64) -> Coordinate {
        Coordinate::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Servo angles of one leg in whole degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointAngles {
    pub hip: i32,
    pub knee: i32,
    pub ankle: i32,
}

impl JointAngles {
    pub fn new(hip: i32, knee: i32, ankle: i32) -> Self {
        Self { hip, knee, ankle }
    }

    /// Flip every joint for a mirrored leg (a -> 180 - a)
    pub fn mirrored(&self) -> Self {
        Self::new(180 - self.hip, 180 - self.knee, 180 - self.ankle)
    }

    /// Returns angles as array [hip, knee, ankle]
    pub fn as_array(&self) -> [i32; JOINTS_PER_LEG] {
        [self.hip, self.knee, self.ankle]
    }
}

/// One foot target per leg, a full snapshot of the robot's pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegPositions(pub [Coordinate; LEG_COUNT]);

impl LegPositions {
    pub fn from_table(table: &[[f64; 3]; LEG_COUNT]) -> Self {
        Self(table.map(Coordinate::from))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for LegPositions {
    type Output = Coordinate;

    fn index(&self, leg: usize) -> &Coordinate {
        &self.0[leg]
    }
}

impl std::ops::IndexMut<usize> for LegPositions {
    fn index_mut(&mut self, leg: usize) -> &mut Coordinate {
        &mut self.0[leg]
    }
}

/// Last committed state of a single leg
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LegState {
    /// Foot target as requested by the caller
    pub target: Coordinate,
    /// Target with the calibration offset applied
    pub calibrated: Coordinate,
    /// Angles sent to the servos (mirrored and clamped)
    pub angles: JointAngles,
}

/// State of all six legs, owned by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HexapodState {
    pub legs: [LegState; LEG_COUNT],
}

impl HexapodState {
    /// Current foot targets of every leg
    pub fn targets(&self) -> LegPositions {
        LegPositions(self.legs.map(|leg| leg.target))
    }

    /// Angles last sent to every leg
    pub fn angles(&self) -> [JointAngles; LEG_COUNT] {
        self.legs.map(|leg| leg.angles)
    }
}
