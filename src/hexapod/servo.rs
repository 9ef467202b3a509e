// Actuator interface used by the pose dispatcher and `relax`
//
// The hexapod core only knows channels and angles; how an angle becomes a
// pulse on a wire is up to the bus implementation.

use tracing::debug;

/// Error types for servo bus communication
#[derive(Debug, thiserror::Error)]
pub enum ServoError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Channel {channel} is not available on this controller")]
    InvalidChannel { channel: u8 },

    #[error("Invalid response from servo controller: {reason}")]
    InvalidResponse { reason: String },

    #[error("Timeout waiting for servo controller")]
    Timeout,
}

/// A board (or simulation) that positions hobby servos by channel
pub trait ServoBus {
    /// Command one servo to an angle in [0, 180] degrees
    fn set_angle(&mut self, channel: u8, angle_deg: u8) -> Result<(), ServoError>;

    /// Stop driving one servo so it can move freely
    fn relax(&mut self, channel: u8) -> Result<(), ServoError>;
}

impl<B: ServoBus + ?Sized> ServoBus for Box<B> {
    fn set_angle(&mut self, channel: u8, angle_deg: u8) -> Result<(), ServoError> {
        (**self).set_angle(channel, angle_deg)
    }

    fn relax(&mut self, channel: u8) -> Result<(), ServoError> {
        (**self).relax(channel)
    }
}

/// A single write seen by a [`SimulatedBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoWrite {
    Angle { channel: u8, angle_deg: u8 },
    Relax { channel: u8 },
}

/// Servo bus that drives nothing and remembers every write in order
#[derive(Debug, Default)]
pub struct SimulatedBus {
    writes: Vec<ServoWrite>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes since creation (or the last `clear`)
    pub fn writes(&self) -> &[ServoWrite] {
        &self.writes
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Last angle commanded on a channel, if any
    pub fn last_angle(&self, channel: u8) -> Option<u8> {
        self.writes.iter().rev().find_map(|write| match *write {
            ServoWrite::Angle {
                channel: c,
                angle_deg,
            } if c == channel => Some(angle_deg),
            _ => None,
        })
    }
}

impl ServoBus for SimulatedBus {
    fn set_angle(&mut self, channel: u8, angle_deg: u8) -> Result<(), ServoError> {
        debug!("Simulated servo {} -> {} deg", channel, angle_deg);
        self.writes.push(ServoWrite::Angle { channel, angle_deg });
        Ok(())
    }

    fn relax(&mut self, channel: u8) -> Result<(), ServoError> {
        debug!("Simulated servo {} relaxed", channel);
        self.writes.push(ServoWrite::Relax { channel });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_bus_records_in_order() {
        let mut bus = SimulatedBus::new();
        bus.set_angle(15, 66).unwrap();
        bus.relax(14).unwrap();
        bus.set_angle(15, 70).unwrap();

        assert_eq!(
            bus.writes(),
            &[
                ServoWrite::Angle {
                    channel: 15,
                    angle_deg: 66
                },
                ServoWrite::Relax { channel: 14 },
                ServoWrite::Angle {
                    channel: 15,
                    angle_deg: 70
                },
            ]
        );
        assert_eq!(bus.last_angle(15), Some(70));
        assert_eq!(bus.last_angle(14), None);

        bus.clear();
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_boxed_bus_forwards() {
        let mut boxed: Box<SimulatedBus> = Box::new(SimulatedBus::new());
        boxed.set_angle(3, 90).unwrap();
        assert_eq!(boxed.last_angle(3), Some(90));
    }
}
