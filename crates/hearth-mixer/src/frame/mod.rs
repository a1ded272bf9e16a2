//! AudioFrame - one sample per channel, with channel-format conversion
//!
//! Every channel-count decision the mix loop makes goes through this type:
//! a frame is filled from an interleaved slice of any layout, stored in the
//! canonical 8-slot form, and read back out in any other layout using the
//! constant down-mix tables or the procedural up-mix rules.

mod matrix;

use std::f32::consts::FRAC_1_SQRT_2 as INV_SQRT2;
use std::ops::MulAssign;

pub use matrix::{downmix_matrix, layout};

use crate::types::{sanitize_channels, Channel, Sample, MAX_CHANNELS};

/// A single multichannel sample frame
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Canonical slots (unused slots are always zero)
    samples: [Sample; MAX_CHANNELS],
    /// Channel count the frame was populated with, in `[1, MAX_CHANNELS]`
    stored_channels: usize,
    /// Scratch returned by [`AudioFrame::samples`]
    translated: [Sample; MAX_CHANNELS],
}

impl Default for AudioFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFrame {
    /// Create a silent mono frame
    pub fn new() -> Self {
        Self {
            samples: [0.0; MAX_CHANNELS],
            stored_channels: 1,
            translated: [0.0; MAX_CHANNELS],
        }
    }

    /// Create a frame from one interleaved frame of `channels` samples
    pub fn from_samples(samples: &[Sample], channels: usize) -> Self {
        let mut frame = Self::new();
        frame.set_samples(samples, channels);
        frame
    }

    /// Number of channels the frame was populated with
    #[inline]
    pub fn stored_channels(&self) -> usize {
        self.stored_channels
    }

    /// Value in one canonical slot
    #[inline]
    pub fn slot(&self, channel: Channel) -> Sample {
        self.samples[channel.index()]
    }

    /// Load one interleaved frame into the canonical layout
    ///
    /// `samples` holds at least `channels` values in the order given by
    /// [`layout`]. Slots the layout does not use are zeroed.
    pub fn set_samples(&mut self, samples: &[Sample], channels: usize) {
        let channels = sanitize_channels(channels);
        self.stored_channels = channels;
        self.samples = [0.0; MAX_CHANNELS];

        for (slot, value) in layout(channels).iter().zip(samples) {
            self.samples[slot.index()] = *value;
        }
    }

    /// Read the frame back as `output_channels` interleaved samples
    ///
    /// The returned slice borrows internal scratch space, so it is only valid
    /// until the next call on this frame.
    pub fn samples(&mut self, output_channels: usize) -> &[Sample] {
        let output_channels = sanitize_channels(output_channels);
        self.translated = [0.0; MAX_CHANNELS];

        if output_channels < self.stored_channels {
            // Matrix rows are already in output order
            for (out, row) in self.translated.iter_mut().zip(downmix_matrix(output_channels)) {
                *out = row
                    .iter()
                    .zip(self.samples.iter())
                    .map(|(weight, sample)| weight * sample)
                    .sum();
            }
        } else {
            let source = if output_channels > self.stored_channels {
                self.upmix()
            } else {
                self.samples
            };
            for (out, slot) in self.translated.iter_mut().zip(layout(output_channels)) {
                *out = source[slot.index()];
            }
        }

        &self.translated[..output_channels]
    }

    /// Expand the stored channels into every canonical slot
    fn upmix(&self) -> [Sample; MAX_CHANNELS] {
        use Channel::*;

        let s = &self.samples;
        let mut out = [0.0; MAX_CHANNELS];
        let left = s[FrontLeft.index()];
        let right = s[FrontRight.index()];
        let sum = (left + right) * INV_SQRT2;
        let difference = (left - right) * INV_SQRT2;

        match self.stored_channels {
            1 => {
                out = [left; MAX_CHANNELS];
                out[LowFrequency.index()] = 0.0;
            }
            2 | 3 => {
                out[FrontLeft.index()] = left;
                out[FrontRight.index()] = right;
                out[Center.index()] = if self.stored_channels == 3 { s[Center.index()] } else { sum };
                for slot in [SideLeft, SideRight, BackLeft, BackRight] {
                    out[slot.index()] = difference;
                }
            }
            4 => {
                // Quad keeps its own rears rather than up-mixing like stereo
                // Sides mirror the rears
                out[FrontLeft.index()] = left;
                out[FrontRight.index()] = right;
                out[Center.index()] = sum;
                out[SideLeft.index()] = s[BackLeft.index()];
                out[SideRight.index()] = s[BackRight.index()];
                out[BackLeft.index()] = s[BackLeft.index()];
                out[BackRight.index()] = s[BackRight.index()];
            }
            5 | 6 => {
                out[..6].copy_from_slice(&s[..6]);
                out[BackLeft.index()] = s[SideLeft.index()];
                out[BackRight.index()] = s[SideRight.index()];
            }
            // 7.0 already fills every slot but LFE; copy it straight through
            _ => out = *s,
        }

        out
    }

    /// Hard-clamp every slot to `[-1, 1]`
    pub fn clamp(&mut self) {
        for sample in self.samples.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Largest absolute value across all slots
    pub fn max_value(&self) -> Sample {
        self.samples.iter().fold(0.0, |peak: Sample, s| peak.max(s.abs()))
    }

    /// Mean of the stored channels
    pub fn mono_value(&self) -> Sample {
        if self.stored_channels == 1 {
            return self.samples[0];
        }
        self.samples.iter().sum::<Sample>() / self.stored_channels as Sample
    }
}

impl MulAssign<Sample> for AudioFrame {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        for sample in self.samples.iter_mut() {
            *sample *= factor;
        }
    }
}
