// Tripod gait trajectory generator
//
// One pace sweeps `distance` from 0 to 80mm. The first half swings legs
// {0, 2, 4} while {1, 3, 5} stay planted, the second half swaps the groups.
// Each swinging foot follows a single sine hump:
//
//     0     20    40    80
//   0 +---- ,-, ------- ,-
//     |    /   \       /
//     |   /     \     /
//     | /         \ /
// -40 |'           '
//
// After every pace the feet are blended back to the balance pose over a
// few frames so they don't slip.

use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::geometry::{Coordinate, LEG_COUNT, LegPositions, is_mirrored};

/// Legs swinging during the first half of a pace
pub const GROUP_A: [usize; 3] = [0, 2, 4];
/// Legs swinging during the second half of a pace
pub const GROUP_B: [usize; 3] = [1, 3, 5];

/// Horizontal travel of a swinging foot per half cycle (mm)
pub const STRIDE_LENGTH: f64 = 40.0;
/// Peak lift of a swinging foot above the ground plane (mm)
pub const STEP_HEIGHT: f64 = 40.0;
/// Frames used to blend back into the balance pose
pub const SETTLE_STEPS: u32 = 10;

/// Wrap a heading in degrees into (-180, 180]
pub fn normalize_heading(angle_deg: f64) -> f64 {
    let wrapped = angle_deg.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Foot lift above the ground plane at `distance` into a half cycle
pub fn lift_height(distance: f64) -> f64 {
    (STEP_HEIGHT * (PI * distance / STRIDE_LENGTH).sin()).abs()
}

/// Shared flag to stop a walk between frames
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Frame generator for walking along one heading
#[derive(Debug, Clone)]
pub struct TripodGait {
    heading_deg: f64,
    x_dir: f64,
    y_dir: f64,
    precision: u32,
    balance: LegPositions,
}

impl TripodGait {
    /// `precision` is the number of frames per pace before settling (0 is treated as 1)
    pub fn new(angle_deg: f64, precision: u32, balance: LegPositions) -> Self {
        let heading_deg = normalize_heading(angle_deg);
        let heading = heading_deg.to_radians();

        Self {
            heading_deg,
            x_dir: heading.sin(),
            y_dir: heading.cos(),
            precision: precision.max(1),
            balance,
        }
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Position of one swinging foot `distance` mm into its half cycle
    fn swing_position(&self, leg: usize, distance: f64) -> Coordinate {
        let home = self.balance[leg];
        // Mirrored legs reach forward along -x
        let side = if is_mirrored(leg) { -1.0 } else { 1.0 };

        Coordinate::new(
            home.x + side * distance * self.x_dir,
            home.y + distance * self.y_dir,
            home.z + lift_height(distance),
        )
    }

    /// Move the swinging group to frame `i` of the pace sweep
    ///
    /// Frames with `2i <= precision` belong to the first half.
    fn apply_swing(&self, current: &mut LegPositions, i: u32) {
        let distance = 2.0 * STRIDE_LENGTH * i as f64 / self.precision as f64;
        let (group, local) = if 2 * u64::from(i) <= u64::from(self.precision) {
            (GROUP_A, distance)
        } else {
            (GROUP_B, distance - STRIDE_LENGTH)
        };

        for leg in group {
            current[leg] = self.swing_position(leg, local);
        }
    }

    /// Frames for both swing halves of one pace, starting from `start`
    ///
    /// Yields `precision + 1` snapshots, computed one at a time; the planted
    /// group keeps whatever position it had.
    pub fn swing_frames(&self, start: LegPositions) -> impl Iterator<Item = LegPositions> + '_ {
        let mut current = start;
        (0..=self.precision).map(move |i| {
            self.apply_swing(&mut current, i);
            current
        })
    }

    /// Last snapshot of [`swing_frames`](Self::swing_frames) without walking the sweep
    pub fn swing_end(&self, start: LegPositions) -> LegPositions {
        let mut end = start;
        self.apply_swing(&mut end, self.precision / 2);
        self.apply_swing(&mut end, self.precision);
        end
    }

    /// Frames blending `from` linearly into the balance pose
    ///
    /// The last frame is exactly the balance pose.
    pub fn settle_frames(&self, from: LegPositions) -> impl Iterator<Item = LegPositions> + '_ {
        (0..SETTLE_STEPS).rev().map(move |k| {
            let fraction = k as f64 / SETTLE_STEPS as f64;
            let mut frame = self.balance;
            for leg in 0..LEG_COUNT {
                let diff = self.balance[leg] - from[leg];
                frame[leg] = self.balance[leg] - diff * fraction;
            }
            frame
        })
    }

    /// All frames of one pace: both swing halves followed by the settle blend
    pub fn pace_frames(&self, start: LegPositions) -> impl Iterator<Item = LegPositions> + '_ {
        let end = self.swing_end(start);
        self.swing_frames(start).chain(self.settle_frames(end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexapod::geometry::BALANCE_POSE;

    fn balance() -> LegPositions {
        LegPositions::from_table(&BALANCE_POSE)
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_normalize_heading() {
        assert_eq!(normalize_heading(0.0), 0.0);
        assert_eq!(normalize_heading(180.0), 180.0);
        assert_eq!(normalize_heading(-180.0), 180.0);
        assert_eq!(normalize_heading(190.0), -170.0);
        assert_eq!(normalize_heading(-190.0), 170.0);
        assert_eq!(normalize_heading(720.0 + 45.0), 45.0);
        assert_eq!(normalize_heading(-450.0), -90.0);
    }

    #[test]
    fn test_lift_profile() {
        // Ground contact at both ends of the half cycle, peak in the middle
        assert_close(lift_height(0.0), 0.0);
        assert_close(lift_height(20.0), STEP_HEIGHT);
        assert_close(lift_height(STRIDE_LENGTH), 0.0);
        // Same shape as |40 sin(9 d / 2)| with d in degrees
        for d in [5.0f64, 13.0, 27.5, 33.0] {
            assert_close(lift_height(d), (40.0 * (9.0 * d.to_radians() / 2.0).sin()).abs());
        }
    }

    #[test]
    fn test_swing_frame_count_and_groups() {
        let gait = TripodGait::new(0.0, 40, balance());
        let frames: Vec<_> = gait.swing_frames(balance()).collect();
        assert_eq!(frames.len(), 41);

        // Halfway: group A has finished its stride, group B hasn't moved
        let half = frames[20];
        for leg in GROUP_A {
            assert_close(half[leg].y, STRIDE_LENGTH);
            assert_close(half[leg].z, -40.0);
        }
        for leg in GROUP_B {
            assert_eq!(half[leg], balance()[leg]);
        }

        // End of the sweep: group A stays where it landed, B finished its stride
        let end = frames[40];
        for leg in 0..LEG_COUNT {
            assert_close(end[leg].y, STRIDE_LENGTH);
            assert_close(end[leg].z, -40.0);
        }
    }

    #[test]
    fn test_sideways_heading_mirrors_x() {
        let gait = TripodGait::new(90.0, 40, balance());
        let frames: Vec<_> = gait.swing_frames(balance()).collect();
        let end = frames[40];

        // Legs 0-2 reach +x, legs 3-5 reach -x, nobody moves along y
        for leg in 0..3 {
            assert_close(end[leg].x, 140.0 + STRIDE_LENGTH);
            assert_close(end[leg].y, 0.0);
        }
        for leg in 3..LEG_COUNT {
            assert_close(end[leg].x, 140.0 - STRIDE_LENGTH);
        }
    }

    #[test]
    fn test_settle_ends_on_balance() {
        let gait = TripodGait::new(30.0, 40, balance());
        let swung = gait.swing_frames(balance()).last().unwrap();
        let settle: Vec<_> = gait.settle_frames(swung).collect();

        assert_eq!(settle.len(), SETTLE_STEPS as usize);
        assert_eq!(*settle.last().unwrap(), balance());

        // First settle frame is 90% of the way back from the swung pose
        let expected = balance()[0] - (balance()[0] - swung[0]) * 0.9;
        assert_close(settle[0][0].x, expected.x);
        assert_close(settle[0][0].y, expected.y);
    }

    #[test]
    fn test_zero_precision_is_one() {
        let gait = TripodGait::new(0.0, 0, balance());
        assert_eq!(gait.precision(), 1);
        let frames: Vec<_> = gait.pace_frames(balance()).collect();
        assert_eq!(frames.len(), 2 + SETTLE_STEPS as usize);
        assert_eq!(*frames.last().unwrap(), balance());
    }

    #[test]
    fn test_swing_end_matches_last_frame() {
        for angle in [0.0, 37.0, 90.0, -150.0] {
            for precision in [1, 2, 3, 7, 40, 79, 80, 81, 200] {
                let gait = TripodGait::new(angle, precision, balance());
                let last = gait.swing_frames(balance()).last().unwrap();
                assert_eq!(gait.swing_end(balance()), last, "precision {}", precision);
            }
        }
    }

    #[test]
    fn test_frames_are_built_on_demand() {
        // Nothing is allocated up front, even at the largest precision
        let gait = TripodGait::new(45.0, u32::MAX, balance());
        let mut frames = gait.pace_frames(balance());
        assert_eq!(frames.next(), Some(balance()));
        assert!(frames.next().is_some());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}
