use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hexapod_runtime::config::{RobotConfig, SERVO_PORT, STEP_DELAY};
use hexapod_runtime::hexapod::{HexapodController, ServoBus, SimulatedBus, Ssc32Bus, ssc32};

/// Hexapod motion runtime: takes motion commands over Zenoh and drives the leg servos
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// JSON file with segment lengths, channel map, offsets and balance pose
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port of the servo controller
    #[arg(long, default_value = SERVO_PORT)]
    port: String,

    /// Serial baudrate
    #[arg(long, default_value_t = ssc32::DEFAULT_BAUDRATE)]
    baud: u32,

    /// Run without hardware, servo writes are only logged
    #[arg(long)]
    sim: bool,

    /// Pause between gait frames in milliseconds
    #[arg(long, default_value_t = STEP_DELAY.as_millis() as u64)]
    step_delay_ms: u64,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn open_bus(args: &Args) -> Result<Box<dyn ServoBus + Send>, BoxError> {
    if args.sim {
        info!("Simulation mode: no servo hardware");
        return Ok(Box::new(SimulatedBus::new()));
    }

    info!("Opening servo controller on {} at {} baud", args.port, args.baud);
    let mut bus = Ssc32Bus::open_with_baudrate(&args.port, args.baud)?;
    info!("Servo controller firmware: {}", bus.version()?);
    Ok(Box::new(bus))
}

async fn start(args: Args) -> Result<(), BoxError> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading robot config from {}", path.display());
            RobotConfig::from_file(path)?
        }
        None => RobotConfig::default(),
    };

    let bus = open_bus(&args)?;
    let controller = HexapodController::with_config(bus, config)?
        .with_step_delay(Duration::from_millis(args.step_delay_ms));

    hexapod_runtime::runtime::run(controller).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    if let Err(e) = start(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
