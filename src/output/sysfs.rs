//! Linux sysfs GPIO lines (`/sys/class/gpio`)

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Level, OutputError, TallyOutput};
use crate::sysex::{Channel, CHANNEL_COUNT};

/// Eight GPIO lines driven through the sysfs interface
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    pins: [u32; CHANNEL_COUNT],
    active_low: bool,
    /// Pins exported by us, unexported again on release
    exported: Vec<u32>,
}

impl SysfsGpio {
    /// Export (when needed) and configure every pin as an output
    ///
    /// `pins[n]` is the GPIO number driving the lamp of channel `n`.
    pub fn open(root: impl AsRef<Path>, pins: &[u32], active_low: bool) -> Result<Self, OutputError> {
        let pins: [u32; CHANNEL_COUNT] = pins
            .try_into()
            .map_err(|_| OutputError::PinCount(pins.len()))?;

        let mut gpio = Self {
            root: root.as_ref().to_path_buf(),
            pins,
            active_low,
            exported: Vec::new(),
        };

        for pin in pins {
            if !gpio.pin_dir(pin).exists() {
                gpio.write(pin, gpio.root.join("export"), &pin.to_string())?;
                gpio.exported.push(pin);
                debug!("Exported GPIO {}", pin);
            }
            gpio.write(pin, gpio.pin_dir(pin).join("direction"), "out")?;
        }

        Ok(gpio)
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn write(&self, pin: u32, path: PathBuf, value: &str) -> Result<(), OutputError> {
        fs::write(&path, value).map_err(|source| OutputError::Io { pin, source })
    }
}

impl TallyOutput for SysfsGpio {
    fn set_lamp(&mut self, channel: Channel, lit: bool) -> Result<(), OutputError> {
        let pin = self.pins[channel.index()];
        let level = Level::for_lamp(lit, self.active_low);
        self.write(pin, self.pin_dir(pin).join("value"), level.as_str())
    }

    fn release(&mut self) -> Result<(), OutputError> {
        let unexport = self.root.join("unexport");
        for pin in std::mem::take(&mut self.exported) {
            if let Err(e) = self.write(pin, unexport.clone(), &pin.to_string()) {
                warn!("Failed to unexport: {}", e);
            }
        }
        Ok(())
    }
}
