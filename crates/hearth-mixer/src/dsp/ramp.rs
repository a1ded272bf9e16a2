//! Linear volume ramp used for mute/unmute transitions and the shutdown fade

/// Linear interpolator advanced one frame at a time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRamp {
    start: f32,
    end: f32,
    total_frames: u32,
    elapsed_frames: u32,
}

impl Default for VolumeRamp {
    fn default() -> Self {
        Self::settled(1.0)
    }
}

impl VolumeRamp {
    /// A finished ramp resting at `value`
    pub fn settled(value: f32) -> Self {
        Self {
            start: value,
            end: value,
            total_frames: 0,
            elapsed_frames: 0,
        }
    }

    /// Re-arm the ramp from `start` to `end` over `frames` frames
    pub fn set_values(&mut self, start: f32, end: f32, frames: u32) {
        self.start = start;
        self.end = end;
        self.total_frames = frames;
        self.elapsed_frames = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_frames >= self.total_frames
    }

    pub fn target(&self) -> f32 {
        self.end
    }

    /// Value at the current position without advancing
    pub fn current_value(&self) -> f32 {
        if self.is_finished() {
            return self.end;
        }
        let t = self.elapsed_frames as f32 / self.total_frames as f32;
        self.start + (self.end - self.start) * t
    }

    /// Advance one frame and return the new value
    ///
    /// The last frame of the ramp returns exactly `end`.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.elapsed_frames < self.total_frames {
            self.elapsed_frames += 1;
        }
        self.current_value()
    }
}
