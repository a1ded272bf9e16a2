//! Cross-thread mixer state
//!
//! One [`SharedValue`] per field, each with a single writer:
//!
//! | Field                    | Writer |
//! |--------------------------|--------|
//! | shutting_down            | Main   |
//! | everything else          | Mix    |
//!
//! Control-thread setters reach the mix-owned fields through tasks.

use crate::sync::{AudioThread, SharedValue};

/// Scalars shared between the control thread and the mix thread
#[derive(Debug)]
pub struct SharedState {
    /// Master volume (linear gain)
    pub volume: SharedValue<f32>,
    /// Set once by `shut_down`; the mix thread fades out and exits
    pub shutting_down: SharedValue<bool>,

    /// Channel count the node graph renders at
    pub system_channels: SharedValue<usize>,
    /// Channel count of the output device stream
    pub device_channels: SharedValue<usize>,
    /// True once a mute ramp has fully completed
    pub muted: SharedValue<bool>,
    pub minimum_volume_threshold: SharedValue<f32>,
    /// Peak of the last mix block
    pub peak_output: SharedValue<f32>,
    /// RMS of the last mix block
    pub rms_output: SharedValue<f32>,
    /// Device rate differs from the system rate
    pub resampling: SharedValue<bool>,
    /// Peak of the last captured input
    pub peak_input: SharedValue<f32>,
    /// Incremented once per rendered block
    pub mix_version: SharedValue<u64>,
}

impl SharedState {
    pub fn new(volume: f32, system_channels: usize, minimum_volume_threshold: f32) -> Self {
        use AudioThread::{Main, Mix};

        Self {
            volume: SharedValue::new(Mix, volume),
            shutting_down: SharedValue::new(Main, false),
            system_channels: SharedValue::new(Mix, system_channels),
            device_channels: SharedValue::new(Mix, 0),
            muted: SharedValue::new(Mix, false),
            minimum_volume_threshold: SharedValue::new(Mix, minimum_volume_threshold),
            peak_output: SharedValue::new(Mix, 0.0),
            rms_output: SharedValue::new(Mix, 0.0),
            resampling: SharedValue::new(Mix, false),
            peak_input: SharedValue::new(Mix, 0.0),
            mix_version: SharedValue::new(Mix, 0),
        }
    }
}
