// Servo diagnostic: READ-ONLY check of the servo controller and the leg channel map
//
// This tool does NOT move any servo - it only queries the controller.
// Run it before starting the runtime on a new robot.
//
// Usage: cargo run --example servo_diagnostic -- [port]
// Example: cargo run --example servo_diagnostic -- /dev/ttyUSB0

use hexapod_runtime::config::{RobotConfig, SERVO_PORT};
use hexapod_runtime::hexapod::Ssc32Bus;
use hexapod_runtime::hexapod::kinematics::coords_to_angles_with_segments;
use hexapod_runtime::hexapod::pose::plan_pose;
use hexapod_runtime::hexapod::ssc32::{MAX_PULSE_US, MIN_PULSE_US, angle_to_pulse};

const JOINT_NAMES: [&str; 3] = ["hip", "knee", "ankle"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    // Get port from args or use default
    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| SERVO_PORT.to_string());
    let config = RobotConfig::default();

    println!("Hexapod servo diagnostic (read-only)");
    println!("Serial port: {}", port);
    println!();

    // Step 1: planned balance pose, no hardware needed
    println!("Step 1: Balance pose plan");
    let legs = plan_pose(&config, &config.balance_pose())?;
    for (leg, state) in legs.iter().enumerate() {
        let raw = coords_to_angles_with_segments(state.calibrated, &config.segments)?;
        println!(
            "  Leg {}: target {:?} -> calibrated {:?}",
            leg + 1,
            state.target,
            state.calibrated
        );
        println!(
            "         solved {:?}, sent {:?}",
            raw.as_array(),
            state.angles.as_array()
        );
    }
    println!();

    // Step 2: open the controller
    println!("Step 2: Opening serial port...");
    let mut bus = match Ssc32Bus::open(&port) {
        Ok(bus) => {
            println!("  ✓ Serial port opened successfully");
            bus
        }
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the USB cable is connected and the board is powered");
            println!("  - On Linux, check you are in the dialout group");
            return Err(e.into());
        }
    };

    match bus.version() {
        Ok(version) => println!("  ✓ Controller firmware: {}", version),
        Err(e) => {
            println!("  ✗ No version reply: {}", e);
            return Err(e.into());
        }
    }
    println!();

    // Step 3: current pulse per channel
    println!("Step 3: Reading pulse widths ({}-{}us expected)...", MIN_PULSE_US, MAX_PULSE_US);
    let mut all_ok = true;
    for (leg, channels) in config.channels.iter().enumerate() {
        for (joint, &channel) in channels.iter().enumerate() {
            let expected = angle_to_pulse(legs[leg].angles.as_array()[joint] as u8);
            match bus.query_pulse(channel) {
                Ok(0) => println!(
                    "  - Leg {} {:<5} (ch {:>2}): idle (balance would be {}us)",
                    leg + 1,
                    JOINT_NAMES[joint],
                    channel,
                    expected
                ),
                Ok(pulse) => println!(
                    "  ✓ Leg {} {:<5} (ch {:>2}): {}us (balance would be {}us)",
                    leg + 1,
                    JOINT_NAMES[joint],
                    channel,
                    pulse,
                    expected
                ),
                Err(e) => {
                    all_ok = false;
                    println!(
                        "  ✗ Leg {} {:<5} (ch {:>2}): {}",
                        leg + 1,
                        JOINT_NAMES[joint],
                        channel,
                        e
                    );
                }
            }
        }
    }
    println!();

    if all_ok {
        println!("All channels answered. You can now start the runtime with: cargo run");
    } else {
        println!("Some channels did not answer; check wiring before running.");
    }

    Ok(())
}
