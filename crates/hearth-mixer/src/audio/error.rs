//! Audio error types

use thiserror::Error;

/// Errors that can occur during audio operations
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Stream error during playback or capture
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Backend refused to open the requested streams
    #[error("Audio backend initialization failed: {0}")]
    BackendInit(String),

    /// The mix thread could not be launched
    #[error("Failed to spawn mix thread: {0}")]
    ThreadSpawn(String),

    /// Operation not valid in the mixer's current state
    #[error("Mixer is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// Compressed capture requested without an encoder
    #[error("No packet encoder configured")]
    EncoderUnavailable,

    /// The packet encoder failed
    #[error("Packet encoder error: {0}")]
    Encoder(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
