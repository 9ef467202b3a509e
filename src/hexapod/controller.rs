// High-level motion API for the hexapod
//
// Owns the servo bus and the six-leg state; every pose goes through the
// pose dispatcher. Calls block until the motion is finished.

use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::gait::{CancelToken, TripodGait};
use super::geometry::{Coordinate, HexapodState, INITIAL_POSE, LEG_COUNT, LegPositions};
use super::pose::{MotionError, dispatch_pose};
use super::servo::{ServoBus, ServoError};
use crate::config::{DEFAULT_PRECISION, RobotConfig, STEP_DELAY};
use crate::messages::MotionCommand;

/// High-level motion controller for the hexapod
pub struct HexapodController<B: ServoBus> {
    bus: B,
    config: RobotConfig,
    state: HexapodState,
    step_delay: Duration,
    cancel: CancelToken,
}

impl<B: ServoBus> HexapodController<B> {
    /// Create a controller with the default geometry and put the legs in the startup pose
    pub fn new(bus: B) -> Result<Self, MotionError> {
        Self::with_config(bus, RobotConfig::default())
    }

    /// Create with a custom geometry/calibration
    ///
    /// The startup pose is sent immediately so the servos begin from a
    /// known position.
    pub fn with_config(bus: B, config: RobotConfig) -> Result<Self, MotionError> {
        let mut controller = Self {
            bus,
            config,
            state: HexapodState::default(),
            step_delay: STEP_DELAY,
            cancel: CancelToken::new(),
        };

        info!("Moving legs to startup pose");
        controller.dispatch(&LegPositions::from_table(&INITIAL_POSE))?;
        Ok(controller)
    }

    /// Pause between gait frames (50ms by default)
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    /// Token that stops a running walk before its next frame
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &HexapodState {
        &self.state
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn dispatch(&mut self, targets: &LegPositions) -> Result<(), MotionError> {
        dispatch_pose(&self.config, &mut self.bus, &mut self.state, targets)
    }

    /// Send one gait frame and wait for the servos to follow
    fn step(&mut self, frame: &LegPositions) -> Result<(), MotionError> {
        if self.cancel.is_cancelled() {
            return Err(MotionError::Cancelled);
        }
        self.dispatch(frame)?;
        if !self.step_delay.is_zero() {
            sleep(self.step_delay);
        }
        Ok(())
    }

    /// Stand in the neutral pose
    pub fn balance(&mut self) -> Result<(), MotionError> {
        debug!("Balancing");
        let balance = self.config.balance_pose();
        self.dispatch(&balance)
    }

    /// Stop driving every servo
    ///
    /// Bypasses the pose dispatcher and leaves the leg state as it was.
    /// All channels are attempted even if one fails; the first error is
    /// returned.
    pub fn relax(&mut self) -> Result<(), MotionError> {
        info!("Relaxing all servos");
        let mut first_error: Option<ServoError> = None;

        for &channel in self.config.channels.iter().flatten() {
            if let Err(e) = self.bus.relax(channel) {
                warn!("Failed to relax servo {}: {}", channel, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Walk `paces` tripod cycles along `angle_deg` (0 = +y, 90 = +x)
    ///
    /// Ends in the balance pose. Stops early with `MotionError::Cancelled`
    /// if the cancel token is set.
    pub fn walk(&mut self, paces: u32, angle_deg: f64, precision: u32) -> Result<(), MotionError> {
        let gait = TripodGait::new(angle_deg, precision, self.config.balance_pose());
        info!(
            "Walking {} paces at {:.1} deg (precision {})",
            paces,
            gait.heading_deg(),
            gait.precision()
        );

        self.balance()?;

        for pace in 0..paces {
            debug!("Pace {}/{}", pace + 1, paces);
            for frame in gait.pace_frames(self.state.targets()) {
                self.step(&frame)?;
            }
        }

        info!("Walk finished");
        Ok(())
    }

    /// Walk with the default precision
    pub fn walk_default(&mut self, paces: u32, angle_deg: f64) -> Result<(), MotionError> {
        self.walk(paces, angle_deg, DEFAULT_PRECISION)
    }

    /// Move one leg (numbered 1-6) and keep the others where they are
    pub fn set_leg_position(
        &mut self,
        leg: usize,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), MotionError> {
        if !(1..=LEG_COUNT).contains(&leg) {
            warn!("Invalid leg number {}", leg);
            return Err(MotionError::InvalidLeg { leg });
        }

        let mut targets = self.state.targets();
        targets[leg - 1] = Coordinate::new(x, y, z);
        self.dispatch(&targets)
    }

    /// Run a motion command received from the runtime
    pub fn execute(&mut self, command: &MotionCommand) -> Result<(), MotionError> {
        match *command {
            MotionCommand::Balance => self.balance(),
            MotionCommand::Relax => self.relax(),
            MotionCommand::Walk {
                paces,
                angle,
                precision,
            } => self.walk(paces, angle, precision),
            MotionCommand::SetLegPosition { leg, x, y, z } => self.set_leg_position(leg, x, y, z),
            MotionCommand::Stop => {
                // The runtime already raised the token; clear it for the next walk
                self.cancel.reset();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexapod::geometry::{JOINTS_PER_LEG, JointAngles};
    use crate::hexapod::servo::{ServoWrite, SimulatedBus};

    const JOINT_COUNT: usize = LEG_COUNT * JOINTS_PER_LEG;

    fn controller() -> HexapodController<SimulatedBus> {
        HexapodController::new(SimulatedBus::new())
            .unwrap()
            .with_step_delay(Duration::ZERO)
    }

    fn leg_writes(
        bus: &SimulatedBus,
        channels: &[u8; JOINTS_PER_LEG],
    ) -> [Option<u8>; JOINTS_PER_LEG] {
        channels.map(|channel| bus.last_angle(channel))
    }

    #[test]
    fn test_startup_pose_is_sent() {
        let controller = controller();
        assert_eq!(controller.bus().writes().len(), JOINT_COUNT);
        assert_eq!(
            controller.state().targets(),
            LegPositions::from_table(&INITIAL_POSE)
        );
    }

    #[test]
    fn test_balance_is_idempotent() {
        let mut controller = controller();
        controller.bus_mut().clear();

        controller.balance().unwrap();
        let first_state = *controller.state();
        let first_writes = controller.bus().writes().to_vec();

        controller.bus_mut().clear();
        controller.balance().unwrap();

        assert_eq!(*controller.state(), first_state);
        assert_eq!(controller.bus().writes(), first_writes.as_slice());
        assert_eq!(first_writes.len(), JOINT_COUNT);
    }

    #[test]
    fn test_relax_releases_every_channel() {
        let mut controller = controller();
        let state_before = *controller.state();
        controller.bus_mut().clear();

        controller.relax().unwrap();

        let relaxed: Vec<u8> = controller
            .bus()
            .writes()
            .iter()
            .map(|write| match *write {
                ServoWrite::Relax { channel } => channel,
                ServoWrite::Angle { .. } => panic!("relax must not set angles"),
            })
            .collect();
        let expected: Vec<u8> = controller.config().channels.iter().flatten().copied().collect();
        assert_eq!(relaxed, expected);
        assert_eq!(*controller.state(), state_before);
    }

    #[test]
    fn test_set_leg_position_matches_balance_for_leg_one() {
        let mut controller = controller();
        let channels = controller.config().channels;
        let startup = controller.state().angles();

        controller.set_leg_position(1, 140.0, 0.0, -40.0).unwrap();
        let leg0_after_set = leg_writes(controller.bus(), &channels[0]);
        let angles_after_set = controller.state().angles();

        // Other legs keep their startup angles
        assert_eq!(&angles_after_set[1..], &startup[1..]);
        for leg in 1..LEG_COUNT {
            let sent = leg_writes(controller.bus(), &channels[leg]);
            assert_eq!(sent, startup[leg].as_array().map(|a| Some(a as u8)));
        }

        controller.balance().unwrap();
        assert_eq!(leg_writes(controller.bus(), &channels[0]), leg0_after_set);
        assert_eq!(controller.state().angles()[0], JointAngles::new(66, 141, 116));
    }

    #[test]
    fn test_invalid_leg_number() {
        let mut controller = controller();
        controller.bus_mut().clear();
        let before = *controller.state();

        for leg in [0, 7, 100] {
            assert!(matches!(
                controller.set_leg_position(leg, 140.0, 0.0, -40.0),
                Err(MotionError::InvalidLeg { .. })
            ));
        }
        assert!(controller.bus().writes().is_empty());
        assert_eq!(*controller.state(), before);
    }

    #[test]
    fn test_rejected_leg_position_keeps_state() {
        let mut controller = controller();
        controller.bus_mut().clear();
        let before = *controller.state();

        let result = controller.set_leg_position(4, 40.0, 0.0, -40.0);
        assert!(matches!(result, Err(MotionError::OutOfRange { leg: 3, .. })));
        assert!(controller.bus().writes().is_empty());
        assert_eq!(*controller.state(), before);
    }

    #[test]
    fn test_walk_closes_on_balance() {
        let balance = RobotConfig::default().balance_pose();
        for angle in [0.0, 45.0, 90.0, -90.0, 180.0, 270.0, -135.0, 1000.0] {
            for precision in [1, 7, 40] {
                let mut controller = controller();
                controller.walk(1, angle, precision).unwrap();
                assert_eq!(
                    controller.state().targets(),
                    balance,
                    "angle {} precision {}",
                    angle,
                    precision
                );
            }
        }
    }

    #[test]
    fn test_walk_dispatch_count() {
        let mut controller = controller();
        controller.bus_mut().clear();

        controller.walk(2, 0.0, 40).unwrap();

        // One balance, then per pace 41 swing frames and 10 settle frames
        let dispatches = 1 + 2 * (41 + 10);
        assert_eq!(controller.bus().writes().len(), dispatches * JOINT_COUNT);
    }

    #[test]
    fn test_zero_paces_only_balances() {
        let mut controller = controller();
        controller.bus_mut().clear();
        controller.walk(0, 45.0, 40).unwrap();
        assert_eq!(controller.bus().writes().len(), JOINT_COUNT);
    }

    #[test]
    fn test_cancelled_walk_stops_before_next_frame() {
        let mut controller = controller();
        let token = controller.cancel_token();
        token.cancel();
        controller.bus_mut().clear();

        let result = controller.walk(3, 0.0, 40);
        assert!(matches!(result, Err(MotionError::Cancelled)));
        // Only the initial balance went out
        assert_eq!(controller.bus().writes().len(), JOINT_COUNT);

        controller.execute(&MotionCommand::Stop).unwrap();
        assert!(!token.is_cancelled());
        controller.walk(1, 0.0, 4).unwrap();
    }

    #[test]
    fn test_cancelled_walk_at_huge_precision_returns_at_once() {
        let mut controller = controller();
        controller.cancel_token().cancel();
        controller.bus_mut().clear();

        let started = std::time::Instant::now();
        let result = controller.walk(5, 30.0, u32::MAX);

        assert!(matches!(result, Err(MotionError::Cancelled)));
        assert_eq!(controller.bus().writes().len(), JOINT_COUNT);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_execute_routes_commands() {
        let mut controller = controller();
        controller
            .execute(&MotionCommand::SetLegPosition {
                leg: 2,
                x: 150.0,
                y: 10.0,
                z: -30.0,
            })
            .unwrap();
        assert_eq!(controller.state().targets()[1], Coordinate::new(150.0, 10.0, -30.0));

        controller.execute(&MotionCommand::Balance).unwrap();
        assert_eq!(controller.state().targets(), RobotConfig::default().balance_pose());
    }
}
