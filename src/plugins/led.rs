//! Status LED backends
//!
//! `SysfsLed` drives a kernel LED class device (`/sys/class/leds/<name>`);
//! pulsing uses the kernel `timer` trigger so no userspace thread has to keep
//! toggling the pin. `LogLed` only logs, for hosts without an LED.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default LED class directory
pub const SYSFS_LEDS_DIR: &str = "/sys/class/leds";

/// Blink half-period used for pulsing, in milliseconds
const PULSE_DELAY_MS: u32 = 500;

/// What the LED is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedState {
    /// Dark
    #[default]
    Off,
    /// Steady on
    On,
    /// Slow blink
    Pulse,
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::On => write!(f, "on"),
            Self::Pulse => write!(f, "pulse"),
        }
    }
}

/// A single indicator LED
pub trait Led: Send {
    /// Switch the LED to `state`
    ///
    /// # Errors
    ///
    /// Returns error if the hardware rejects the write
    fn set(&mut self, state: LedState) -> Result<()>;
}

/// LED class device under sysfs
#[derive(Debug)]
pub struct SysfsLed {
    dir: PathBuf,
    max_brightness: u32,
}

impl SysfsLed {
    /// Open the LED named `name` under [`SYSFS_LEDS_DIR`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Plugin`] if the device does not exist
    pub fn open(name: &str) -> Result<Self> {
        Self::open_at(&Path::new(SYSFS_LEDS_DIR).join(name))
    }

    /// Open an LED class device directory
    ///
    /// # Errors
    ///
    /// Returns [`Error::Plugin`] if the directory is not an LED device
    pub fn open_at(dir: &Path) -> Result<Self> {
        let brightness = dir.join("brightness");
        if !brightness.exists() {
            return Err(Error::Plugin(format!(
                "no LED device at {}",
                dir.display()
            )));
        }

        let max_brightness = fs::read_to_string(dir.join("max_brightness"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        tracing::debug!(path = %dir.display(), max_brightness, "opened LED");
        Ok(Self {
            dir: dir.to_path_buf(),
            max_brightness,
        })
    }

    fn write(&self, attr: &str, value: &str) -> Result<()> {
        fs::write(self.dir.join(attr), value).map_err(|e| {
            Error::Plugin(format!("failed to write {attr} for {}: {e}", self.dir.display()))
        })
    }
}

impl Led for SysfsLed {
    fn set(&mut self, state: LedState) -> Result<()> {
        match state {
            LedState::Off => {
                self.write("trigger", "none")?;
                self.write("brightness", "0")
            }
            LedState::On => {
                self.write("trigger", "none")?;
                self.write("brightness", &self.max_brightness.to_string())
            }
            LedState::Pulse => {
                self.write("trigger", "timer")?;
                self.write("delay_on", &PULSE_DELAY_MS.to_string())?;
                self.write("delay_off", &PULSE_DELAY_MS.to_string())
            }
        }
    }
}

/// LED stand-in that only logs state changes
#[derive(Debug, Default)]
pub struct LogLed {
    state: LedState,
}

impl LogLed {
    /// Current state
    #[must_use]
    pub const fn state(&self) -> LedState {
        self.state
    }
}

impl Led for LogLed {
    fn set(&mut self, state: LedState) -> Result<()> {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "status LED");
            self.state = state;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_led(max: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("brightness"), "0").unwrap();
        fs::write(dir.path().join("max_brightness"), max).unwrap();
        fs::write(dir.path().join("trigger"), "none").unwrap();
        dir
    }

    fn read(dir: &Path, attr: &str) -> String {
        fs::read_to_string(dir.join(attr)).unwrap()
    }

    #[test]
    fn open_missing_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SysfsLed::open_at(&dir.path().join("led0")).unwrap_err();
        assert!(matches!(err, Error::Plugin(_)));
    }

    #[test]
    fn on_uses_max_brightness() {
        let dir = fake_led("255\n");
        let mut led = SysfsLed::open_at(dir.path()).unwrap();

        led.set(LedState::On).unwrap();
        assert_eq!(read(dir.path(), "brightness"), "255");
        assert_eq!(read(dir.path(), "trigger"), "none");

        led.set(LedState::Off).unwrap();
        assert_eq!(read(dir.path(), "brightness"), "0");
    }

    #[test]
    fn pulse_uses_timer_trigger() {
        let dir = fake_led("1");
        let mut led = SysfsLed::open_at(dir.path()).unwrap();

        led.set(LedState::Pulse).unwrap();
        assert_eq!(read(dir.path(), "trigger"), "timer");
        assert_eq!(read(dir.path(), "delay_on"), "500");
        assert_eq!(read(dir.path(), "delay_off"), "500");
    }

    #[test]
    fn log_led_tracks_state() {
        let mut led = LogLed::default();
        assert_eq!(led.state(), LedState::Off);
        led.set(LedState::Pulse).unwrap();
        assert_eq!(led.state(), LedState::Pulse);
    }
}
