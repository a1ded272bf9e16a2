//! Two-pole Butterworth low-pass used to derive the LFE channel

use std::f32::consts::{FRAC_PI_2, PI, SQRT_2};

use crate::types::{LFE_CUTOFF_HZ, SYSTEM_SAMPLE_RATE};

/// Biquad low-pass filter (direct form I)
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    // Coefficients
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    // History
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self::new(LFE_CUTOFF_HZ)
    }
}

impl LowPassFilter {
    pub fn new(cutoff_hz: f32) -> Self {
        let mut filter = Self {
            a0: 0.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        };
        filter.set_cutoff(cutoff_hz);
        filter
    }

    /// Recompute coefficients for a cutoff at the system sample rate
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        let nyquist = SYSTEM_SAMPLE_RATE as f32 / 2.0;
        let cutoff = cutoff_hz.clamp(1.0, nyquist - 1.0);
        // tan() must stay below its pole
        let angle = (PI * cutoff / SYSTEM_SAMPLE_RATE as f32).min(FRAC_PI_2 - 1e-4);

        let c = 1.0 / angle.tan();
        let c2 = c * c;
        let alpha = 1.0 / (1.0 + SQRT_2 * c + c2);

        self.a0 = alpha;
        self.a1 = 2.0 * alpha;
        self.a2 = alpha;
        self.b1 = 2.0 * alpha * (1.0 - c2);
        self.b2 = alpha * (1.0 - SQRT_2 * c + c2);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.a0 * input + self.a1 * self.x1 + self.a2 * self.x2
            - self.b1 * self.y1
            - self.b2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
