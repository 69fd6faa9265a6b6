//! Capture device enumeration via cpal.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use serde::Serialize;

use crate::{Error, Result};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Capture device information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioDevice {
    /// Position in the host's input device list.
    pub index: usize,
    /// Human-readable device name.
    pub name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default channel count.
    pub default_channels: u16,
    /// Whether this is the host's default input.
    pub is_default: bool,
}

/// List all capture devices of the default host.
pub fn list_input_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| device_name(&d).ok());
    let inputs = host.input_devices().map_err(|e| Error::Device(e.to_string()))?;

    let devices = inputs
        .enumerate()
        .filter_map(|(index, device)| {
            let name = device_name(&device).ok()?;
            let config = device.default_input_config().ok();
            Some(AudioDevice {
                index,
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                default_sample_rate: config.as_ref().map_or(48000, |c| c.sample_rate()),
                default_channels: config.as_ref().map_or(2, |c| c.channels()),
            })
        })
        .collect();
    Ok(devices)
}

/// The host's default capture device, if any.
pub fn default_input_device() -> Result<Option<AudioDevice>> {
    Ok(list_input_devices()?.into_iter().find(|d| d.is_default))
}

/// Find an input device by index, exact name, or case-insensitive substring.
///
/// `None` selects the host default.
pub(crate) fn find_input_device(host: &Host, name_or_index: Option<&str>) -> Result<Device> {
    let Some(search) = name_or_index else {
        return host.default_input_device().ok_or(Error::NoDevice);
    };

    let devices: Vec<Device> = host
        .input_devices()
        .map_err(|e| Error::Device(e.to_string()))?
        .collect();

    if let Ok(index) = search.parse::<usize>() {
        return devices.get(index).cloned().ok_or_else(|| {
            Error::DeviceNotFound(format!(
                "input device index {} (only {} devices available)",
                index,
                devices.len()
            ))
        });
    }

    let names: Vec<Option<String>> = devices.iter().map(|d| device_name(d).ok()).collect();
    if let Some(pos) = names.iter().position(|n| n.as_deref() == Some(search)) {
        return Ok(devices[pos].clone());
    }

    let search_lower = search.to_lowercase();
    names
        .iter()
        .position(|n| n.as_ref().is_some_and(|n| n.to_lowercase().contains(&search_lower)))
        .map(|pos| devices[pos].clone())
        .ok_or_else(|| Error::DeviceNotFound(format!("no input device matching '{search}'")))
}
