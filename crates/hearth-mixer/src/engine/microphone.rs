//! Microphone capture and hand-off
//!
//! Capture is split across the two threads:
//!
//! - [`MicCapture`] runs on the mix thread. Each block it drains the backend
//!   input port, converts the audio to the system rate and channel count, and
//!   pushes it into an SPSC ring.
//! - [`MicDispatch`] runs on the control thread during `update()`. It drains
//!   the ring and forwards raw samples and/or encoded mono packets as events.

use crate::audio::{AudioError, InputPort};
use crate::dsp::Resampler;
use crate::frame::AudioFrame;
use crate::types::{sanitize_channels, Sample, MAX_CHANNELS, SYSTEM_SAMPLE_RATE};

use super::events::{AudioEvent, EventSink, PacketEncoder};
use super::state::SharedState;

/// Create the ring that carries adapted capture from the mix thread
pub(crate) fn capture_ring(
    port: Box<dyn InputPort>,
    capacity: usize,
) -> (MicCapture, rtrb::Consumer<Sample>) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity.max(MAX_CHANNELS));
    let capture = MicCapture {
        port,
        producer,
        resampler: Resampler::new(SYSTEM_SAMPLE_RATE, SYSTEM_SAMPLE_RATE),
        raw: Vec::new(),
        frame: AudioFrame::new(),
        dropped_frames: 0,
        failed: false,
    };
    (capture, consumer)
}

/// Mix-thread side of microphone capture
pub struct MicCapture {
    port: Box<dyn InputPort>,
    producer: rtrb::Producer<Sample>,
    resampler: Resampler,
    /// Interleaved capture as read from the port
    raw: Vec<Sample>,
    frame: AudioFrame,
    dropped_frames: u64,
    /// A device error has been returned and capture has not recovered since
    failed: bool,
}

impl MicCapture {
    /// Drain the input port and forward adapted frames
    ///
    /// Returns a device error only for the first block of a failure streak.
    /// The streak ends once capture delivers data again without an error.
    pub fn process(&mut self, system_channels: usize, shared: &SharedState) -> Option<AudioError> {
        let error = self.port.take_error();
        let errored = error.is_some();
        let failure = match error {
            Some(err) if !self.failed => {
                self.failed = true;
                Some(err)
            }
            _ => None,
        };

        self.raw.clear();
        if self.port.read_available(&mut self.raw) == 0 {
            return failure;
        }
        if !errored {
            self.failed = false;
        }

        let input_channels = sanitize_channels(self.port.channels());
        let input_rate = self.port.sample_rate();

        let peak = self.raw.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()));
        shared.peak_input.set_if_changed(peak.min(1.0));

        let mut scratch = [0.0; MAX_CHANNELS];
        if input_rate == SYSTEM_SAMPLE_RATE {
            for i in 0..self.raw.len() / input_channels {
                let start = i * input_channels;
                scratch[..input_channels].copy_from_slice(&self.raw[start..start + input_channels]);
                self.forward_frame(&scratch[..input_channels], input_channels, system_channels);
            }
        } else {
            self.resampler.set_rates(input_rate, SYSTEM_SAMPLE_RATE);
            self.resampler.push_input(&self.raw, input_channels);
            while self.resampler.next_frame(&mut scratch[..input_channels]) {
                self.forward_frame(&scratch[..input_channels], input_channels, system_channels);
            }
        }
        failure
    }

    fn forward_frame(&mut self, samples: &[Sample], input_channels: usize, system_channels: usize) {
        // Keep frames whole so the reader never sees a torn frame
        if self.producer.slots() < system_channels {
            self.dropped_frames += 1;
            if self.dropped_frames % 4800 == 1 {
                log::trace!("Capture ring full, {} frames dropped so far", self.dropped_frames);
            }
            return;
        }

        self.frame.set_samples(samples, input_channels);
        for sample in self.frame.samples(system_channels) {
            // Cannot fail: slots checked above
            let _ = self.producer.push(*sample);
        }
    }
}

/// Control-thread side of microphone capture
pub struct MicDispatch {
    consumer: rtrb::Consumer<Sample>,
    /// Samples drained this update
    drained: Vec<Sample>,
    /// Samples waiting for a full packet
    pending: Vec<Sample>,
    packet_frames: usize,
    pub send_uncompressed: bool,
    pub send_compressed: bool,
}

impl MicDispatch {
    pub fn new(consumer: rtrb::Consumer<Sample>, packet_frames: usize) -> Self {
        Self {
            consumer,
            drained: Vec::new(),
            pending: Vec::new(),
            packet_frames: packet_frames.max(1),
            send_uncompressed: false,
            send_compressed: false,
        }
    }

    /// Samples buffered below one packet
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    /// Forward everything captured since the last call
    pub fn dispatch(
        &mut self,
        channels: usize,
        encoder: Option<&mut dyn PacketEncoder>,
        sink: &mut dyn EventSink,
    ) {
        let channels = sanitize_channels(channels);

        self.drained.clear();
        while let Ok(sample) = self.consumer.pop() {
            self.drained.push(sample);
        }
        if self.drained.is_empty() {
            return;
        }

        if self.send_uncompressed {
            sink.dispatch(AudioEvent::MicrophoneUncompressed {
                channels,
                samples: self.drained.clone(),
            });
        }

        if !self.send_compressed {
            return;
        }
        let Some(encoder) = encoder else {
            log::warn!("Compressed mic input enabled without an encoder, dropping capture");
            return;
        };

        self.pending.extend_from_slice(&self.drained);
        let packet_samples = self.packet_frames * channels;
        let mut mono = Vec::with_capacity(self.packet_frames);

        while self.pending.len() >= packet_samples {
            mono.clear();
            mono.extend(
                self.pending[..packet_samples]
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<Sample>() / channels as Sample),
            );
            match encoder.encode_packet(&mono) {
                Ok(bytes) => sink.dispatch(AudioEvent::MicrophoneCompressed(bytes)),
                Err(e) => log::warn!("Failed to encode mic packet: {}", e),
            }
            self.pending.drain(..packet_samples);
        }
    }
}
