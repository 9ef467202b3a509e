// Keyboard teleop: WASD walk, B balance, X relax, SPACE stop, 1-3 paces, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use hexapod_runtime::config::{DEFAULT_PRECISION, TOPIC_CMD_MOTION, TOPIC_STATE_CONTROLLER};
use hexapod_runtime::messages::{MotionCommand, StatusReport};
use std::time::Duration;
use tracing::{info, warn};

const PACES: [u32; 3] = [1, 2, 4];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_MOTION).await?;
    let status = session.declare_subscriber(TOPIC_STATE_CONTROLLER).await?;

    info!("Controls: WASD=walk, B=balance, X=relax, SPACE=stop, 1-3=paces, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher, &status).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
    status: &zenoh::pubsub::Subscriber<zenoh::handlers::FifoChannelHandler<zenoh::sample::Sample>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut paces_idx: usize = 0;
    let mut last_status: Option<StatusReport> = None;

    loop {
        // Show controller status changes
        while let Ok(Some(sample)) = status.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<StatusReport>(&payload) {
                Ok(report) if last_status.as_ref() != Some(&report) => {
                    info!("Controller: {:?}", report);
                    last_status = Some(report);
                }
                Ok(_) => {}
                Err(e) => warn!("Bad status message: {}", e),
            }
        }

        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let paces = PACES[paces_idx];
        let walk = move |angle: f64| MotionCommand::Walk {
            paces,
            angle,
            precision: DEFAULT_PRECISION,
        };

        let command = match code {
            // Heading: 0 = forward (+y), 90 = right (+x)
            KeyCode::Char('w') => walk(0.0),
            KeyCode::Char('d') => walk(90.0),
            KeyCode::Char('s') => walk(180.0),
            KeyCode::Char('a') => walk(-90.0),

            KeyCode::Char('b') => MotionCommand::Balance,
            KeyCode::Char('x') => MotionCommand::Relax,
            KeyCode::Char(' ') => MotionCommand::Stop,

            KeyCode::Char(c @ '1'..='3') => {
                paces_idx = (c as usize) - ('1' as usize);
                info!("Paces per walk: {}", PACES[paces_idx]);
                continue;
            }

            KeyCode::Char('q') | KeyCode::Esc => break,

            _ => continue,
        };

        info!("Sending {:?}", command);
        publisher.put(serde_json::to_string(&command)?).await?;
    }

    Ok(())
}
