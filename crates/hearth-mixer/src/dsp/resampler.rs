//! Streaming sample-rate conversion on top of rubato
//!
//! The mix loop works in interleaved frames and block sizes set by the
//! device. rubato's [`FastFixedOut`] works on planar chunks of a fixed output
//! length, so this wrapper keeps an interleaved queue on each side and
//! converts chunk by chunk in between. Linear interpolation between adjacent
//! frames is the conversion used throughout the mixer.
//!
//! Buffers are sized when the rates or channel count change, never per block.

use rubato::{FastFixedOut, PolynomialDegree, Resampler as _};

use crate::types::{sanitize_channels, Sample};

/// Output frames rubato produces per call
const CHUNK_FRAMES: usize = 64;

/// Rates are replaced, never ramped, so no headroom is needed
const MAX_RELATIVE_RATIO: f64 = 1.0;

/// Linear resampler over interleaved frames of up to 8 channels
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// None when the rates are unusable; input then passes through unchanged
    inner: Option<FastFixedOut<Sample>>,
    /// Interleaved input not yet handed to rubato
    pending_in: Vec<Sample>,
    /// Interleaved output not yet read
    pending_out: Vec<Sample>,
    /// Next frame of `pending_out` to read
    read_frame: usize,
    /// Leading output frames still to drop after a reset
    skip_frames: usize,
    planar_in: Vec<Vec<Sample>>,
    planar_out: Vec<Vec<Sample>>,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        let mut resampler = Self {
            input_rate,
            output_rate,
            channels: 1,
            inner: None,
            pending_in: Vec::new(),
            pending_out: Vec::new(),
            read_frame: 0,
            skip_frames: 0,
            planar_in: Vec::new(),
            planar_out: Vec::new(),
        };
        resampler.rebuild();
        resampler
    }

    /// Update the conversion ratio
    ///
    /// A real change rebuilds the converter and drops buffered audio.
    pub fn set_rates(&mut self, input_rate: u32, output_rate: u32) {
        if input_rate == self.input_rate && output_rate == self.output_rate {
            return;
        }
        log::debug!("Resampler: {}Hz -> {}Hz", input_rate, output_rate);
        self.input_rate = input_rate;
        self.output_rate = output_rate;
        self.rebuild();
    }

    /// Input frames consumed per output frame
    pub fn step(&self) -> f64 {
        match self.inner {
            Some(_) => self.input_rate as f64 / self.output_rate as f64,
            None => 1.0,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Output frames ready to read
    pub fn buffered_frames(&self) -> usize {
        self.pending_out.len() / self.channels - self.read_frame
    }

    fn queued_input_frames(&self) -> usize {
        self.pending_in.len() / self.channels
    }

    /// Drop all buffered audio and restart the converter
    pub fn reset(&mut self) {
        self.pending_in.clear();
        self.pending_out.clear();
        self.read_frame = 0;
        self.skip_frames = 0;
        if let Some(inner) = self.inner.as_mut() {
            inner.reset();
            self.skip_frames = inner.output_delay();
        }
    }

    fn rebuild(&mut self) {
        self.inner = None;
        if self.input_rate == 0 || self.output_rate == 0 {
            log::warn!(
                "Resampler: invalid rates {} -> {}, passing through",
                self.input_rate,
                self.output_rate
            );
            self.reset();
            return;
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        match FastFixedOut::<Sample>::new(
            ratio,
            MAX_RELATIVE_RATIO,
            PolynomialDegree::Linear,
            CHUNK_FRAMES,
            self.channels,
        ) {
            Ok(inner) => {
                self.planar_in = (0..self.channels)
                    .map(|_| Vec::with_capacity(inner.input_frames_max()))
                    .collect();
                self.planar_out = vec![vec![0.0; inner.output_frames_max()]; self.channels];
                self.inner = Some(inner);
            }
            Err(e) => {
                log::warn!(
                    "Resampler: cannot convert {} -> {} ({}), passing through",
                    self.input_rate,
                    self.output_rate,
                    e
                );
            }
        }
        self.reset();
    }

    /// Input frames to push before `output_frames` frames can be read
    ///
    /// Counts what is already queued, so asking again after pushing the
    /// answer returns zero.
    pub fn input_frames_needed(&self, output_frames: usize) -> usize {
        let missing = output_frames.saturating_sub(self.buffered_frames());
        if missing == 0 {
            return 0;
        }
        let Some(inner) = &self.inner else {
            return missing.saturating_sub(self.queued_input_frames());
        };

        let chunks = (missing + self.skip_frames).div_ceil(CHUNK_FRAMES);
        // Later chunks need about CHUNK_FRAMES * step each; round up with room
        // for the converter's fractional position
        let per_chunk = (CHUNK_FRAMES as f64 * self.step()).ceil() as usize + 2;
        let total = inner.input_frames_next() + (chunks - 1) * per_chunk;
        total.saturating_sub(self.queued_input_frames())
    }

    /// Append interleaved input frames and convert every complete chunk
    ///
    /// A change of channel count discards buffered audio.
    pub fn push_input(&mut self, samples: &[Sample], channels: usize) {
        let channels = sanitize_channels(channels);
        if channels != self.channels {
            self.channels = channels;
            self.rebuild();
        }

        // Drop output that has already been read
        if self.read_frame > 0 {
            self.pending_out.drain(..self.read_frame * channels);
            self.read_frame = 0;
        }

        let whole = samples.len() - samples.len() % channels;
        self.pending_in.extend_from_slice(&samples[..whole]);
        self.convert_pending();
    }

    fn convert_pending(&mut self) {
        let ch = self.channels;
        let Some(inner) = self.inner.as_mut() else {
            self.pending_out.append(&mut self.pending_in);
            return;
        };

        let mut consumed = 0;
        loop {
            let needed = inner.input_frames_next();
            if self.pending_in.len() / ch - consumed < needed {
                break;
            }

            // Interleaved -> planar
            let chunk = &self.pending_in[consumed * ch..(consumed + needed) * ch];
            for (c, planar) in self.planar_in.iter_mut().enumerate() {
                planar.clear();
                planar.extend(chunk.iter().skip(c).step_by(ch));
            }

            let result = inner.process_into_buffer(&self.planar_in, &mut self.planar_out, None);
            let (used, written) = match result {
                Ok(counts) => counts,
                Err(e) => {
                    log::warn!(
                        "Resampler: dropping {} queued frames: {}",
                        self.pending_in.len() / ch,
                        e
                    );
                    self.pending_in.clear();
                    return;
                }
            };
            consumed += used;

            // Planar -> interleaved, minus the converter's start-up delay
            let skip = self.skip_frames.min(written);
            self.skip_frames -= skip;
            for i in skip..written {
                self.pending_out.extend(self.planar_out.iter().map(|planar| planar[i]));
            }
        }
        self.pending_in.drain(..consumed * ch);
    }

    /// Read the next output frame into `out` (`channels()` samples)
    ///
    /// Returns false, leaving `out` untouched, if no converted frame is ready.
    pub fn next_frame(&mut self, out: &mut [Sample]) -> bool {
        if self.buffered_frames() == 0 {
            return false;
        }
        let start = self.read_frame * self.channels;
        let frame = &self.pending_out[start..start + self.channels];
        for (dst, src) in out.iter_mut().zip(frame) {
            *dst = *src;
        }
        self.read_frame += 1;
        true
    }
}
