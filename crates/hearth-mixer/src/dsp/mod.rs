//! Small DSP building blocks used by the mix thread
//!
//! - [`Resampler`]: linear interpolation between the system rate and device rates
//! - [`LowPassFilter`]: Butterworth biquad that derives the LFE channel
//! - [`VolumeRamp`]: click-free gain transitions

mod lowpass;
mod ramp;
mod resampler;

pub use lowpass::LowPassFilter;
pub use ramp::VolumeRamp;
pub use resampler::Resampler;
