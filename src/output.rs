//! Tally lamp outputs
//!
//! One output line per channel. The lamps are wired through relays that
//! pull in on a low level, so "lit" maps to level 0 when `active_low` is set.

pub mod sysfs;

use std::io;
use thiserror::Error;
use tracing::info;

use crate::sysex::{Channel, CHANNEL_COUNT};

pub use sysfs::SysfsGpio;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("GPIO {pin}: {source}")]
    Io {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("expected 8 output pins, got {0}")]
    PinCount(usize),
}

/// Electrical level of an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Level that lights (or darkens) a lamp for the given polarity
    pub fn for_lamp(lit: bool, active_low: bool) -> Self {
        if lit != active_low {
            Level::High
        } else {
            Level::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Low => "0",
            Level::High => "1",
        }
    }
}

/// Abstract output capability driving one lamp per channel
pub trait TallyOutput: Send {
    /// Light or darken the lamp of `channel`
    fn set_lamp(&mut self, channel: Channel, lit: bool) -> Result<(), OutputError>;

    /// Give the lines back to the system
    fn release(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Output that only reports the selected channel in the log
///
/// Used when no GPIO is available (development machines, dry runs).
#[derive(Debug, Default)]
pub struct ConsoleOutput {
    lit: [bool; CHANNEL_COUNT],
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TallyOutput for ConsoleOutput {
    fn set_lamp(&mut self, channel: Channel, lit: bool) -> Result<(), OutputError> {
        let was_lit = std::mem::replace(&mut self.lit[channel.index()], lit);
        if lit && !was_lit {
            info!("Tally = {}", channel);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every lamp write; clones share the log
    #[derive(Clone, Default)]
    pub(crate) struct RecordingOutput {
        pub writes: Arc<Mutex<Vec<(Channel, bool)>>>,
    }

    impl RecordingOutput {
        pub fn write_count(&self) -> usize {
            self.writes.lock().len()
        }

        /// Lamp states after the most recent write of each channel
        pub fn lamps(&self) -> [bool; CHANNEL_COUNT] {
            let mut lamps = [false; CHANNEL_COUNT];
            for (channel, lit) in self.writes.lock().iter() {
                lamps[channel.index()] = *lit;
            }
            lamps
        }
    }

    impl TallyOutput for RecordingOutput {
        fn set_lamp(&mut self, channel: Channel, lit: bool) -> Result<(), OutputError> {
            self.writes.lock().push((channel, lit));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_low_polarity() {
        assert_eq!(Level::for_lamp(true, true), Level::Low);
        assert_eq!(Level::for_lamp(false, true), Level::High);
        assert_eq!(Level::for_lamp(true, false), Level::High);
        assert_eq!(Level::for_lamp(false, false), Level::Low);
    }

    #[test]
    fn test_console_output_tracks_lamps() {
        let mut output = ConsoleOutput::new();
        let ch2 = Channel::new(2).unwrap();

        output.set_lamp(ch2, true).unwrap();
        output.set_lamp(ch2, true).unwrap();
        assert!(output.lit[2]);

        output.set_lamp(ch2, false).unwrap();
        assert!(!output.lit[2]);
    }
}
