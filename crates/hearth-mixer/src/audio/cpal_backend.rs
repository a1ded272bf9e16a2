//! CPAL audio backend
//!
//! ```text
//! ┌──────────────────┐   write()   ┌─────────────────────┐   pop()   ┌──────────────────┐
//! │    Mix Thread    │────────────►│  Output Ring (f32)  │──────────►│  CPAL Callback   │
//! │ (CpalOutputPort) │             │  (lock-free SPSC)   │           │ (device thread)  │
//! └────────▲─────────┘             └─────────────────────┘           └────────┬─────────┘
//!          │                                                                  │
//!          └───────────────── condvar: "output consumed" ◄────────────────────┘
//! ```
//!
//! Capture runs the other way: the input callback pushes into a second ring
//! that the mix thread drains through [`CpalInputPort`].
//!
//! Streams are owned by [`CpalBackend`] on the control thread; only the ring
//! ends (ports) move to the mix thread.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::backend::{AudioBackend, InputPort, LatencyMode, OutputPort, StreamDirection, StreamStatus};
use super::config::{AudioConfig, DeviceId};
use super::device::{default_device, find_device, supported_configs};
use super::error::{AudioError, AudioResult};
use crate::types::{Sample, MAX_CHANNELS, SYSTEM_SAMPLE_RATE};

/// Seconds of capture the input ring can hold before dropping samples
const INPUT_RING_SECONDS: usize = 2;

/// State shared between a stream's callbacks and its port
#[derive(Default)]
struct StreamShared {
    /// Set by the output callback after it consumed samples
    consumed: Mutex<bool>,
    wake: Condvar,
    /// Last error reported by the stream's error callback
    error: Mutex<Option<String>>,
}

impl StreamShared {
    fn record_error(&self, message: String) {
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(message);
        }
    }

    fn take_error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Called from the device callback; never blocks
    fn notify_consumed(&self) {
        if let Ok(mut consumed) = self.consumed.try_lock() {
            *consumed = true;
            self.wake.notify_one();
        }
    }
}

/// Producer end of the output ring, used on the mix thread
pub struct CpalOutputPort {
    producer: rtrb::Producer<Sample>,
    channels: usize,
    sample_rate: u32,
    /// Interleaved samples to keep queued ahead of the device
    target_samples: usize,
    shared: Arc<StreamShared>,
}

impl OutputPort for CpalOutputPort {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write_available(&self) -> usize {
        let capacity = self.producer.buffer().capacity();
        let queued = capacity - self.producer.slots();
        let available = self.target_samples.saturating_sub(queued).min(self.producer.slots());
        available - available % self.channels
    }

    fn write(&mut self, samples: &[Sample]) -> AudioResult<usize> {
        if self.producer.is_abandoned() {
            return Err(AudioError::StreamError("output stream closed".to_string()));
        }
        let mut written = 0;
        for sample in samples {
            if self.producer.push(*sample).is_err() {
                break;
            }
            written += 1;
        }
        if written < samples.len() {
            log::trace!("Output ring full, dropped {} samples", samples.len() - written);
        }
        Ok(written)
    }

    fn wait_until_output_needed(&self, timeout: Duration) {
        let consumed = match self.shared.consumed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut consumed = match self.shared.wake.wait_timeout_while(consumed, timeout, |c| !*c) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
        *consumed = false;
    }

    fn set_latency(&mut self, mode: LatencyMode) {
        let capacity = self.producer.buffer().capacity();
        self.target_samples = (mode.target_frames(self.sample_rate) * self.channels).min(capacity);
        log::debug!(
            "Output latency set to {:?} ({} samples queued)",
            mode,
            self.target_samples
        );
    }

    fn take_error(&mut self) -> Option<AudioError> {
        self.shared.take_error().map(AudioError::StreamError)
    }
}

/// Consumer end of the capture ring, used on the mix thread
pub struct CpalInputPort {
    consumer: rtrb::Consumer<Sample>,
    channels: usize,
    sample_rate: u32,
    shared: Arc<StreamShared>,
}

impl InputPort for CpalInputPort {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_available(&mut self, out: &mut Vec<Sample>) -> usize {
        let available = self.consumer.slots();
        out.reserve(available);
        let mut read = 0;
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
            read += 1;
        }
        read
    }

    fn take_error(&mut self) -> Option<AudioError> {
        self.shared.take_error().map(AudioError::StreamError)
    }
}

struct OutputStream {
    stream: Stream,
    port: Option<CpalOutputPort>,
    status: StreamStatus,
}

struct InputStream {
    stream: Stream,
    port: Option<CpalInputPort>,
    status: StreamStatus,
}

/// Hardware backend built on CPAL
pub struct CpalBackend {
    config: AudioConfig,
    output: Option<OutputStream>,
    input: Option<InputStream>,
}

impl CpalBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            output: None,
            input: None,
        }
    }

    fn open_device(
        &self,
        id: Option<&DeviceId>,
        direction: StreamDirection,
    ) -> AudioResult<cpal::Device> {
        let device = match id {
            Some(id) => find_device(id, direction)?,
            None => default_device(direction)?,
        };
        log::info!(
            "Using {} device: {}",
            direction,
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    fn open_output(&mut self) -> AudioResult<()> {
        let device = self.open_device(self.config.output_device.as_ref(), StreamDirection::Output)?;
        let stream_config = choose_config(&device, StreamDirection::Output, &self.config)?;
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        // Room for the deepest latency target, twice over
        let capacity = LatencyMode::High.target_frames(sample_rate) * channels * 2;
        let (producer, mut consumer) = rtrb::RingBuffer::<Sample>::new(capacity);
        let shared = Arc::new(StreamShared::default());

        let callback_shared = Arc::clone(&shared);
        let error_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        // Underrun plays silence
                        *sample = consumer.pop().unwrap_or(0.0);
                    }
                    callback_shared.notify_consumed();
                },
                move |err| {
                    log::error!("Output stream error: {}", err);
                    error_shared.record_error(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        let mut port = CpalOutputPort {
            producer,
            channels,
            sample_rate,
            target_samples: 0,
            shared,
        };
        port.set_latency(LatencyMode::Low);

        log::info!(
            "Output stream: {} channels, {}Hz, ring {} samples",
            channels,
            sample_rate,
            capacity
        );

        self.output = Some(OutputStream {
            stream,
            port: Some(port),
            status: StreamStatus::Stopped,
        });
        Ok(())
    }

    fn open_input(&mut self) -> AudioResult<()> {
        let device = self.open_device(self.config.input_device.as_ref(), StreamDirection::Input)?;
        let stream_config = choose_config(&device, StreamDirection::Input, &self.config)?;
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        let capacity = sample_rate as usize * channels * INPUT_RING_SECONDS;
        let (mut producer, consumer) = rtrb::RingBuffer::<Sample>::new(capacity);
        let shared = Arc::new(StreamShared::default());
        let error_shared = Arc::clone(&shared);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    for sample in data {
                        // Mix thread is behind: drop the newest capture
                        if producer.push(*sample).is_err() {
                            break;
                        }
                    }
                },
                move |err| {
                    log::error!("Input stream error: {}", err);
                    error_shared.record_error(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        log::info!("Input stream: {} channels, {}Hz", channels, sample_rate);

        self.input = Some(InputStream {
            stream,
            port: Some(CpalInputPort {
                consumer,
                channels,
                sample_rate,
                shared,
            }),
            status: StreamStatus::Stopped,
        });
        Ok(())
    }

    fn stream_and_status(
        &mut self,
        direction: StreamDirection,
    ) -> Option<(&Stream, &mut StreamStatus)> {
        match direction {
            StreamDirection::Output => self.output.as_mut().map(|o| (&o.stream, &mut o.status)),
            StreamDirection::Input => self.input.as_mut().map(|i| (&i.stream, &mut i.status)),
        }
    }
}

impl AudioBackend for CpalBackend {
    fn initialize(&mut self, wants_output: bool, wants_input: bool) -> AudioResult<()> {
        if wants_output {
            self.output = None;
            self.open_output()?;
        }
        if wants_input {
            self.input = None;
            self.open_input()?;
        }
        Ok(())
    }

    fn take_output_port(&mut self) -> Option<Box<dyn OutputPort>> {
        self.output
            .as_mut()
            .and_then(|o| o.port.take())
            .map(|port| Box::new(port) as Box<dyn OutputPort>)
    }

    fn take_input_port(&mut self) -> Option<Box<dyn InputPort>> {
        self.input
            .as_mut()
            .and_then(|i| i.port.take())
            .map(|port| Box::new(port) as Box<dyn InputPort>)
    }

    fn start_streams(&mut self, direction: StreamDirection) -> AudioResult<()> {
        let (stream, status) = self
            .stream_and_status(direction)
            .ok_or_else(|| AudioError::StreamPlayError(format!("{} stream not opened", direction)))?;
        match stream.play() {
            Ok(()) => {
                *status = StreamStatus::Running;
                log::info!("Started {} stream", direction);
                Ok(())
            }
            Err(e) => {
                *status = StreamStatus::Failed;
                Err(AudioError::StreamPlayError(e.to_string()))
            }
        }
    }

    fn stop_streams(&mut self, direction: StreamDirection) {
        if let Some((stream, status)) = self.stream_and_status(direction) {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause {} stream: {}", direction, e);
            }
            *status = StreamStatus::Stopped;
        }
    }

    fn stream_status(&self, direction: StreamDirection) -> StreamStatus {
        match direction {
            StreamDirection::Output => self.output.as_ref().map(|o| o.status),
            StreamDirection::Input => self.input.as_ref().map(|i| i.status),
        }
        .unwrap_or(StreamStatus::Closed)
    }

    fn shut_down(&mut self) {
        self.stop_streams(StreamDirection::Output);
        self.stop_streams(StreamDirection::Input);
        self.output = None;
        self.input = None;
        log::info!("CPAL backend shut down");
    }
}

/// Pick an f32 stream configuration with at most eight channels
fn choose_config(
    device: &cpal::Device,
    direction: StreamDirection,
    config: &AudioConfig,
) -> AudioResult<StreamConfig> {
    let supported = supported_configs(device, direction)?;
    let target_rate = config.sample_rate.unwrap_or(SYSTEM_SAMPLE_RATE);

    let usable = |c: &&cpal::SupportedStreamConfigRange| {
        c.sample_format() == SampleFormat::F32 && (1..=MAX_CHANNELS as u16).contains(&c.channels())
    };

    let best = supported
        .iter()
        .filter(usable)
        .find(|c| target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0)
        .or_else(|| supported.iter().find(usable))
        .ok_or_else(|| {
            AudioError::UnsupportedFormat(format!("no f32 {} configuration with <= 8 channels", direction))
        })?;

    let sample_rate = if target_rate >= best.min_sample_rate().0 && target_rate <= best.max_sample_rate().0 {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Device doesn't support {}Hz, using {}Hz (the mixer will resample)",
            target_rate,
            fallback.0
        );
        fallback
    };

    let mut stream_config: StreamConfig = best.clone().with_sample_rate(sample_rate).config();
    if let Some(frames) = config.buffer_size.as_frames() {
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
    }
    log::debug!("Selected {} config: {:?}", direction, stream_config);
    Ok(stream_config)
}
