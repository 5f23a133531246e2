//! # Device Identity
//!
//! Identifies the machine the tool runs on. The identity is an opaque hardware
//! serial obtained through a [`SerialSource`]; everything else in
//! [`DeviceInfo`] is descriptive.
//!
//! | Platform | Source |
//! |---|---|
//! | macOS | `ioreg -rd1 -c IOPlatformExpertDevice`, `IOPlatformSerialNumber` |
//! | Linux | `/sys/class/dmi/id/product_serial`, then `/etc/machine-id`, then `/sys/class/dmi/id/board_serial` |
//! | Windows | `wmic bios get serialnumber` |
//!
//! Setting `METAREPO_DEVICE_SERIAL` replaces the hardware lookup, which is what
//! containers and tests use.
//!
//! Failing to determine the serial is fatal for any command that needs it.

use std::env;

use chrono::Utc;
use log::debug;

use crate::config::Device;
use crate::error::{Error, Result};
use crate::process;

/// Environment variable overriding the hardware serial.
pub const ENV_DEVICE_SERIAL: &str = "METAREPO_DEVICE_SERIAL";

/// Placeholder some firmware reports instead of a real serial.
const OEM_PLACEHOLDER: &str = "To Be Filled By O.E.M.";

/// Where the device serial comes from.
pub trait SerialSource {
    fn serial(&self) -> Result<String>;
}

/// A serial known in advance.
#[derive(Debug, Clone)]
pub struct FixedSerial(pub String);

impl SerialSource for FixedSerial {
    fn serial(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the serial from the platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialSource for SystemSerial {
    #[cfg(target_os = "macos")]
    fn serial(&self) -> Result<String> {
        let out = process::capture(
            "ioreg",
            ["-rd1", "-c", "IOPlatformExpertDevice"],
            None,
            None,
        )?;
        parse_ioreg(&out).ok_or_else(|| identity_error("no IOPlatformSerialNumber in ioreg output"))
    }

    #[cfg(target_os = "linux")]
    fn serial(&self) -> Result<String> {
        const CANDIDATES: [&str; 3] = [
            "/sys/class/dmi/id/product_serial",
            "/etc/machine-id",
            "/sys/class/dmi/id/board_serial",
        ];
        CANDIDATES
            .iter()
            .find_map(|path| {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| debug!("{}: {}", path, e))
                    .ok()?;
                usable_serial(&text)
            })
            .ok_or_else(|| identity_error("no readable serial or machine id"))
    }

    #[cfg(windows)]
    fn serial(&self) -> Result<String> {
        let out = process::capture("wmic", ["bios", "get", "serialnumber"], None, None)?;
        parse_wmic(&out).ok_or_else(|| identity_error("no serial number in wmic output"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", windows)))]
    fn serial(&self) -> Result<String> {
        Err(identity_error(&format!("unsupported platform: {}", env::consts::OS)))
    }
}

/// The serial source used by the application: the environment override when
/// set, otherwise the platform lookup.
pub fn default_source() -> Box<dyn SerialSource> {
    match env::var(ENV_DEVICE_SERIAL) {
        Ok(serial) if !serial.trim().is_empty() => {
            Box::new(FixedSerial(serial.trim().to_string()))
        }
        _ => Box::new(SystemSerial),
    }
}

/// Description of the current machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    pub platform: String,
    pub arch: String,
    pub hostname: String,
    pub username: String,
}

impl DeviceInfo {
    /// Collect device information using `source` for the serial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceIdentity`] (or the underlying tool error) when
    /// the serial cannot be determined.
    pub fn current(source: &dyn SerialSource) -> Result<Self> {
        let serial = source.serial().map_err(|e| match e {
            Error::DeviceIdentity { .. } => e,
            other => identity_error(&other.to_string()),
        })?;
        Ok(Self {
            serial,
            platform: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            hostname: hostname(),
            username: env::var("USER")
                .or_else(|_| env::var("USERNAME"))
                .unwrap_or_default(),
        })
    }

    /// A registry record for this machine, registered now under `name`.
    pub fn to_device(&self, name: &str) -> Device {
        Device {
            serial: self.serial.clone(),
            name: name.to_string(),
            platform: self.platform.clone(),
            hostname: self.hostname.clone(),
            registered_at: Utc::now(),
            last_sync_at: None,
        }
    }

    /// Name used when registering without an explicit one.
    pub fn default_name(&self) -> String {
        if self.hostname.is_empty() {
            self.serial.clone()
        } else {
            self.hostname.clone()
        }
    }
}

fn hostname() -> String {
    match process::capture("hostname", std::iter::empty::<&str>(), None, None) {
        Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
        _ => env::var("HOSTNAME")
            .or_else(|_| env::var("COMPUTERNAME"))
            .unwrap_or_default(),
    }
}

fn identity_error(message: &str) -> Error {
    Error::DeviceIdentity {
        message: message.to_string(),
    }
}

/// Trimmed serial, or `None` for empty and placeholder values.
pub fn usable_serial(text: &str) -> Option<String> {
    let serial = text.trim();
    if serial.is_empty() || serial == OEM_PLACEHOLDER {
        None
    } else {
        Some(serial.to_string())
    }
}

/// Extract `IOPlatformSerialNumber` from `ioreg` output.
pub fn parse_ioreg(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("\"IOPlatformSerialNumber\""))
        .find_map(|line| {
            let (_, value) = line.split_once('=')?;
            usable_serial(value.trim().trim_matches('"'))
        })
}

/// Extract the serial from `wmic bios get serialnumber` output.
pub fn parse_wmic(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.eq_ignore_ascii_case("SerialNumber"))
        .find_map(usable_serial)
}
