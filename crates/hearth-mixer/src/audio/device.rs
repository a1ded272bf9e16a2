//! Audio device enumeration and lookup
//!
//! Enumerates devices from every available cpal host so the probe (and any
//! settings UI built on top of the mixer) can offer both output and capture
//! devices by `DeviceId`.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId, SupportedStreamConfigRange};

use super::backend::StreamDirection;
use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

fn host_devices(host: &Host, direction: StreamDirection) -> AudioResult<Vec<cpal::Device>> {
    let devices: Result<Vec<cpal::Device>, _> = match direction {
        StreamDirection::Output => host.output_devices().map(|d| d.collect()),
        StreamDirection::Input => host.input_devices().map(|d| d.collect()),
    };
    devices.map_err(|e| AudioError::ConfigError(e.to_string()))
}

/// Supported configurations of a device in one direction
pub(crate) fn supported_configs(
    device: &cpal::Device,
    direction: StreamDirection,
) -> AudioResult<Vec<SupportedStreamConfigRange>> {
    let configs: Result<Vec<SupportedStreamConfigRange>, _> = match direction {
        StreamDirection::Output => device.supported_output_configs().map(|c| c.collect()),
        StreamDirection::Input => device.supported_input_configs().map(|c| c.collect()),
    };
    configs.map_err(|e| AudioError::ConfigError(e.to_string()))
}

/// Information about an audio device
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Identifier for configuration (includes host)
    pub id: DeviceId,
    pub name: String,
    pub host: String,
    /// Whether this is the host's default device for the direction
    pub is_default: bool,
    /// Common sample rates the device supports
    pub sample_rates: Vec<u32>,
    pub max_channels: u16,
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)
    }
}

/// List devices from all hosts for one direction
///
/// Defaults come first, then devices sorted by host and name.
pub fn list_devices(direction: StreamDirection) -> AudioResult<Vec<AudioDevice>> {
    let mut all_devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);

        let default_name = match direction {
            StreamDirection::Output => host.default_output_device(),
            StreamDirection::Input => host.default_input_device(),
        }
        .and_then(|d| d.name().ok());

        let devices = match host_devices(&host, direction) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate {} devices for {:?}: {}", direction, host_id, e);
                continue;
            }
        };

        for device in devices {
            let Ok(name) = device.name() else { continue };
            let configs = match supported_configs(&device, direction) {
                Ok(c) if !c.is_empty() => c,
                _ => continue,
            };

            let mut sample_rates = Vec::new();
            let mut max_channels: u16 = 0;
            for config in &configs {
                max_channels = max_channels.max(config.channels());
                for rate in [44100, 48000, 88200, 96000, 192000] {
                    if rate >= config.min_sample_rate().0
                        && rate <= config.max_sample_rate().0
                        && !sample_rates.contains(&rate)
                    {
                        sample_rates.push(rate);
                    }
                }
            }
            sample_rates.sort_unstable();

            all_devices.push(AudioDevice {
                id: DeviceId::with_host(&name, &host_label),
                is_default: default_name.as_ref() == Some(&name),
                name,
                host: host_label.clone(),
                sample_rates,
                max_channels,
            });
        }
    }

    if all_devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    all_devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });

    log::info!("Enumerated {} {} devices", all_devices.len(), direction);
    Ok(all_devices)
}

/// Find a device by its ID
///
/// Uses the host named in the ID if there is one, otherwise searches every host.
pub fn find_device(id: &DeviceId, direction: StreamDirection) -> AudioResult<cpal::Device> {
    let matches = |d: &cpal::Device| d.name().ok().as_deref() == Some(id.name.as_str());

    if let Some(host) = id.host.as_deref().and_then(host_by_name) {
        return host_devices(&host, direction)?
            .into_iter()
            .find(matches)
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else { continue };
        if let Some(device) = host_devices(&host, direction)
            .ok()
            .and_then(|devices| devices.into_iter().find(matches))
        {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Default device of the default host
pub fn default_device(direction: StreamDirection) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    match direction {
        StreamDirection::Output => host.default_output_device(),
        StreamDirection::Input => host.default_input_device(),
    }
    .ok_or_else(|| AudioError::NoDefaultDevice(format!("No default {} device", direction)))
}
