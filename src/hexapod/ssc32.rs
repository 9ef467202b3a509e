// 32-channel serial servo controller (SSC-32 style ASCII protocol)
//
// Commands are plain text terminated by a carriage return:
//   "#<ch>P<pulse_us>[T<ms>]\r"  move a servo
//   "#<ch>P0\r"                  stop pulsing (servo goes limp)
//   "QP<ch>\r"                   query pulse width, one byte reply in 10 us units
//   "VER\r"                      firmware version string

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use super::servo::{ServoBus, ServoError};

/// Default serial configuration for the controller
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Number of servo channels on the board
pub const CHANNEL_COUNT: u8 = 32;

/// Pulse widths for the ends of the servo travel
pub const MIN_PULSE_US: u16 = 500; // 0 deg
pub const MAX_PULSE_US: u16 = 2500; // 180 deg

const MAX_ANGLE_DEG: u8 = 180;
const TERMINATOR: u8 = b'\r';
const MAX_REPLY_LEN: usize = 64;

pub type Result<T> = std::result::Result<T, ServoError>;

/// Convert a servo angle to a pulse width in microseconds
pub fn angle_to_pulse(angle_deg: u8) -> u16 {
    let angle = angle_deg.min(MAX_ANGLE_DEG) as f64;
    let span = (MAX_PULSE_US - MIN_PULSE_US) as f64;
    MIN_PULSE_US + (angle / MAX_ANGLE_DEG as f64 * span).round() as u16
}

/// Build a move command for one channel
fn position_command(channel: u8, pulse_us: u16, move_time_ms: Option<u16>) -> String {
    match move_time_ms {
        Some(time) => format!("#{}P{}T{}\r", channel, pulse_us, time),
        None => format!("#{}P{}\r", channel, pulse_us),
    }
}

fn check_channel(channel: u8) -> Result<()> {
    if channel >= CHANNEL_COUNT {
        return Err(ServoError::InvalidChannel { channel });
    }
    Ok(())
}

/// Servo controller connected over a serial port
pub struct Ssc32Bus {
    port: Box<dyn SerialPort>,
    move_time_ms: Option<u16>,
}

impl Ssc32Bus {
    /// Open a new connection to the controller
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            port,
            move_time_ms: None,
        })
    }

    /// Let the board ramp each move over the given time instead of jumping
    pub fn with_move_time(mut self, move_time_ms: u16) -> Self {
        self.move_time_ms = Some(move_time_ms);
        self
    }

    fn send(&mut self, command: &str) -> Result<()> {
        self.port.write_all(command.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Read a carriage-return terminated text reply
    fn read_line(&mut self) -> Result<String> {
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];

        while reply.len() < MAX_REPLY_LEN {
            self.port.read_exact(&mut byte).map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    ServoError::Timeout
                } else {
                    ServoError::Io(e)
                }
            })?;

            if byte[0] == TERMINATOR {
                return String::from_utf8(reply).map_err(|e| ServoError::InvalidResponse {
                    reason: format!("Non-UTF8 reply: {}", e),
                });
            }
            reply.push(byte[0]);
        }

        Err(ServoError::InvalidResponse {
            reason: format!("Reply longer than {} bytes", MAX_REPLY_LEN),
        })
    }

    /// Send a raw pulse width to a channel
    pub fn set_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        check_channel(channel)?;
        let command = position_command(channel, pulse_us, self.move_time_ms);
        debug!("Servo {}: pulse={}us", channel, pulse_us);
        self.send(&command)
    }

    /// Read back the pulse width the board is currently generating
    pub fn query_pulse(&mut self, channel: u8) -> Result<u16> {
        check_channel(channel)?;
        self.send(&format!("QP{}\r", channel))?;

        let mut reply = [0u8; 1];
        self.port.read_exact(&mut reply).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                ServoError::Timeout
            } else {
                ServoError::Io(e)
            }
        })?;
        Ok(reply[0] as u16 * 10)
    }

    /// Firmware version, doubles as a connectivity check
    pub fn version(&mut self) -> Result<String> {
        self.send("VER\r")?;
        let version = self.read_line()?;
        if version.is_empty() {
            return Err(ServoError::InvalidResponse {
                reason: "Empty version string".to_string(),
            });
        }
        Ok(version)
    }
}

impl ServoBus for Ssc32Bus {
    fn set_angle(&mut self, channel: u8, angle_deg: u8) -> Result<()> {
        self.set_pulse(channel, angle_to_pulse(angle_deg))
    }

    fn relax(&mut self, channel: u8) -> Result<()> {
        check_channel(channel)?;
        debug!("Servo {}: relaxed", channel);
        self.send(&position_command(channel, 0, None))
    }
}
