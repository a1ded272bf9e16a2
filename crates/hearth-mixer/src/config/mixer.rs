//! Mixer configuration
//!
//! Everything the mixer reads once at construction. Runtime changes go
//! through the `AudioMixer` setters instead.

use serde::{Deserialize, Serialize};

use crate::audio::{AudioConfig, LatencyMode};
use crate::types::{
    DEFAULT_MINIMUM_VOLUME_THRESHOLD, LFE_CUTOFF_HZ, MAX_CHANNELS, PACKET_FRAMES, PROPERTY_CHANGE_FRAMES,
    SYSTEM_SAMPLE_RATE,
};

/// Mixer configuration, persisted as YAML
///
/// Missing fields take their defaults, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Channel count the node graph renders at
    /// 0 follows the output device. Values above 8 are clamped.
    /// Default: 2
    pub output_channels: usize,

    /// Initial master volume (linear gain)
    /// Default: 1.0
    pub volume: f32,

    /// Gain below which node collaborators may treat a source as inaudible
    /// Default: 0.015
    pub minimum_volume_threshold: f32,

    /// Initial output latency mode
    /// Default: Low
    pub latency: LatencyMode,

    /// Length of the mute/unmute ramp in frames
    /// Default: 960 (20ms at 48kHz)
    pub property_change_frames: u32,

    /// Frames per compressed microphone packet
    /// Default: 960 (20ms at 48kHz)
    pub packet_frames: usize,

    /// Cutoff of the low-pass filter feeding the LFE channel
    /// Default: 120.0 Hz
    pub lfe_cutoff_hz: f32,

    /// Capacity of the capture hand-off buffer in seconds
    /// Default: 2.0
    pub mic_buffer_seconds: f32,

    /// Empty output waits tolerated during shutdown before the mix thread
    /// exits without fading
    /// Default: 50
    pub shutdown_idle_limit: u32,

    /// Device selection for the backend
    pub audio: AudioConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            output_channels: 2,
            volume: 1.0,
            minimum_volume_threshold: DEFAULT_MINIMUM_VOLUME_THRESHOLD,
            latency: LatencyMode::Low,
            property_change_frames: PROPERTY_CHANGE_FRAMES,
            packet_frames: PACKET_FRAMES,
            lfe_cutoff_hz: LFE_CUTOFF_HZ,
            mic_buffer_seconds: 2.0,
            shutdown_idle_limit: 50,
            audio: AudioConfig::default(),
        }
    }
}

impl MixerConfig {
    /// Copy with every field forced into its valid range
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let finite_or = |value: f32, fallback: f32| if value.is_finite() { value } else { fallback };

        Self {
            output_channels: self.output_channels.min(MAX_CHANNELS),
            volume: finite_or(self.volume, defaults.volume).max(0.0),
            minimum_volume_threshold: finite_or(self.minimum_volume_threshold, defaults.minimum_volume_threshold)
                .max(0.0),
            latency: self.latency,
            property_change_frames: self.property_change_frames.max(1),
            packet_frames: self.packet_frames.max(1),
            lfe_cutoff_hz: match self.lfe_cutoff_hz {
                hz if hz.is_finite() && hz > 0.0 => hz,
                _ => defaults.lfe_cutoff_hz,
            },
            mic_buffer_seconds: match self.mic_buffer_seconds {
                s if s.is_finite() && s > 0.0 => s,
                _ => defaults.mic_buffer_seconds,
            },
            shutdown_idle_limit: self.shutdown_idle_limit.max(1),
            audio: self.audio.clone(),
        }
    }

    /// Capacity of the capture ring in samples at the system rate
    pub fn mic_buffer_samples(&self, channels: usize) -> usize {
        (self.mic_buffer_seconds * SYSTEM_SAMPLE_RATE as f32) as usize * channels.max(1)
    }
}
