//! Audio backend configuration
//!
//! Device selection and stream settings for backends that open real hardware.

use serde::{Deserialize, Serialize};

/// Maximum device period size to request (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Preferred device period size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the host choose
    #[default]
    Default,
    /// Request a specific size in frames (may be adjusted by the host)
    Fixed(u32),
}

impl BufferSize {
    /// Requested frames, clamped to sane bounds, or None for the host default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some((*frames).clamp(64, MAX_BUFFER_SIZE)),
        }
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, CoreAudio...)
/// so devices with the same name on different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g. "ALSA", "WASAPI"); None = any host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for a hardware backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub output_device: Option<DeviceId>,

    /// Capture device (None = system default)
    pub input_device: Option<DeviceId>,

    /// Preferred device sample rate (None = 48kHz if supported)
    pub sample_rate: Option<u32>,

    /// Preferred device period size
    pub buffer_size: BufferSize,
}

impl AudioConfig {
    pub fn with_output_device(mut self, device: DeviceId) -> Self {
        self.output_device = Some(device);
        self
    }

    pub fn with_input_device(mut self, device: DeviceId) -> Self {
        self.input_device = Some(device);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }
}
