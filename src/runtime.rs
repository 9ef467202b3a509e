// Command loop: zenoh in, controller worker thread, status out
// The controller blocks for the length of a walk, so it lives on its own
// thread and the async loop only forwards commands and publishes status.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

// local imports
use crate::config::{LOOP_HZ, TOPIC_CMD_MOTION, TOPIC_STATE_CONTROLLER};
use crate::hexapod::{CancelToken, HexapodController, MotionError, ServoBus};
use crate::messages::{ControllerHealth, MotionCommand, StatusReport};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Map the outcome of a command to the status operators see
pub fn report_for(command: &MotionCommand, result: &Result<(), MotionError>) -> StatusReport {
    match result {
        Ok(()) => StatusReport::new(ControllerHealth::Ready),
        Err(MotionError::Cancelled) => {
            StatusReport::with_detail(ControllerHealth::Cancelled, command.name())
        }
        Err(e @ (MotionError::OutOfRange { .. } | MotionError::InvalidLeg { .. })) => {
            StatusReport::with_detail(ControllerHealth::Rejected, e.to_string())
        }
        Err(e) => StatusReport::with_detail(ControllerHealth::Fault, e.to_string()),
    }
}

/// Execute commands one at a time until the sender goes away
fn controller_worker<B: ServoBus>(
    mut controller: HexapodController<B>,
    commands: Receiver<MotionCommand>,
    reports: Sender<StatusReport>,
) {
    for command in commands {
        info!("Executing {:?}", command);
        let moving = StatusReport::with_detail(ControllerHealth::Moving, command.name());
        if reports.send(moving).is_err() {
            break;
        }

        let result = controller.execute(&command);
        match &result {
            Ok(()) => {}
            Err(MotionError::Cancelled) => warn!("{} cancelled", command.name()),
            Err(e) => error!("{} failed: {}", command.name(), e),
        }

        if reports.send(report_for(&command, &result)).is_err() {
            break;
        }
    }
    info!("Controller worker stopped");
}

pub struct Runtime {
    commands: Sender<MotionCommand>,
    reports: Receiver<StatusReport>,
    cancel: CancelToken,
    status: StatusReport,
    worker: JoinHandle<()>,
}

impl Runtime {
    /// Move the controller onto its worker thread
    pub fn new<B: ServoBus + Send + 'static>(
        controller: HexapodController<B>,
    ) -> std::io::Result<Self> {
        let (commands, command_rx) = mpsc::channel();
        let (report_tx, reports) = mpsc::channel();
        let cancel = controller.cancel_token();

        let worker = thread::Builder::new()
            .name("hexapod-controller".to_string())
            .spawn(move || controller_worker(controller, command_rx, report_tx))?;

        Ok(Self {
            commands,
            reports,
            cancel,
            status: StatusReport::new(ControllerHealth::Ready),
            worker,
        })
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: MotionCommand) -> Result<(), BoxError> {
        info!("Received command: {:?}", &cmd);
        if cmd == MotionCommand::Stop {
            // Raise now; the worker clears it once it reaches the queued stop
            self.cancel.cancel();
        }
        self.commands
            .send(cmd)
            .map_err(|_| "controller worker is not running".into())
    }

    /// Pick up status reports from the worker, keep the latest
    pub fn poll_reports(&mut self) -> &StatusReport {
        while let Ok(report) = self.reports.try_recv() {
            self.status = report;
        }
        &self.status
    }

    pub fn status(&self) -> &StatusReport {
        &self.status
    }

    pub fn is_worker_alive(&self) -> bool {
        !self.worker.is_finished()
    }
}

pub async fn run<B: ServoBus + Send + 'static>(
    controller: HexapodController<B>,
) -> Result<(), BoxError> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_MOTION).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE_CONTROLLER).await?;

    let mut runtime = Runtime::new(controller)?;
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!("Runtime started: {}Hz status loop", LOOP_HZ);
    info!("Subscribed to: {}", TOPIC_CMD_MOTION);
    info!("Publishing to: {}", TOPIC_STATE_CONTROLLER);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), queue them in order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<MotionCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd)?,
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Collect controller progress
        let status_json = serde_json::to_string(runtime.poll_reports())?;

        if !runtime.is_worker_alive() {
            return Err("controller worker exited".into());
        }

        // 3. Publish status
        pub_status.put(status_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexapod::SimulatedBus;
    use crate::hexapod::geometry::Coordinate;
    use crate::hexapod::pose::RangeViolation;

    // Reads reports in order so short-lived states aren't skipped
    fn wait_for(runtime: &mut Runtime, health: ControllerHealth) -> StatusReport {
        loop {
            let report = runtime
                .reports
                .recv_timeout(Duration::from_secs(5))
                .expect("no report from controller worker");
            runtime.status = report.clone();
            if report.health == health {
                return report;
            }
        }
    }

    #[test]
    fn test_report_for() {
        let walk = MotionCommand::Walk {
            paces: 1,
            angle: 0.0,
            precision: 40,
        };
        assert_eq!(report_for(&walk, &Ok(())).health, ControllerHealth::Ready);
        assert_eq!(
            report_for(&walk, &Err(MotionError::Cancelled)),
            StatusReport::with_detail(ControllerHealth::Cancelled, "walk")
        );
        assert_eq!(
            report_for(&walk, &Err(MotionError::InvalidLeg { leg: 9 })).health,
            ControllerHealth::Rejected
        );
        let out_of_range = MotionError::OutOfRange {
            leg: 2,
            coordinate: Coordinate::new(-1.0, 0.0, 0.0),
            reason: RangeViolation::BehindHip,
        };
        assert_eq!(
            report_for(&walk, &Err(out_of_range)).health,
            ControllerHealth::Rejected
        );
    }

    #[test]
    fn test_worker_stops_when_reports_are_dropped() {
        let controller = HexapodController::new(SimulatedBus::new()).unwrap();
        let (commands, command_rx) = mpsc::channel();
        let (report_tx, reports) = mpsc::channel();
        drop(reports);

        commands.send(MotionCommand::Balance).unwrap();
        let worker = thread::spawn(move || controller_worker(controller, command_rx, report_tx));

        // Returns without running the command even though the sender is still open
        worker.join().unwrap();
        assert!(commands.send(MotionCommand::Balance).is_err());
    }

    #[test]
    fn test_commands_run_on_worker() {
        let controller = HexapodController::new(SimulatedBus::new())
            .unwrap()
            .with_step_delay(Duration::ZERO);
        let mut runtime = Runtime::new(controller).unwrap();

        runtime
            .on_command(MotionCommand::SetLegPosition {
                leg: 8,
                x: 140.0,
                y: 0.0,
                z: -40.0,
            })
            .unwrap();
        let status = wait_for(&mut runtime, ControllerHealth::Rejected);
        assert!(status.detail.unwrap().contains("Invalid leg number 8"));

        runtime.on_command(MotionCommand::Balance).unwrap();
        wait_for(&mut runtime, ControllerHealth::Ready);
        assert!(runtime.is_worker_alive());
    }

    #[test]
    fn test_stop_cancels_walk() {
        // Slow enough that the stop lands mid-walk
        let controller = HexapodController::new(SimulatedBus::new())
            .unwrap()
            .with_step_delay(Duration::from_millis(20));
        let mut runtime = Runtime::new(controller).unwrap();

        runtime
            .on_command(MotionCommand::Walk {
                paces: 10,
                angle: 0.0,
                precision: 40,
            })
            .unwrap();
        wait_for(&mut runtime, ControllerHealth::Moving);
        runtime.on_command(MotionCommand::Stop).unwrap();

        let status = wait_for(&mut runtime, ControllerHealth::Cancelled);
        assert_eq!(status.detail.as_deref(), Some("walk"));

        // The queued stop clears the token, so the next walk runs normally
        wait_for(&mut runtime, ControllerHealth::Ready);
        runtime
            .on_command(MotionCommand::Walk {
                paces: 1,
                angle: 90.0,
                precision: 2,
            })
            .unwrap();
        wait_for(&mut runtime, ControllerHealth::Ready);
        assert_eq!(runtime.status().health, ControllerHealth::Ready);
    }
}
