//! Test doubles for the mixing core
//!
//! Hardware-free stand-ins for the backend, its ports, the node graph, the
//! event sink and the packet encoder.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::{
    AudioBackend, AudioError, AudioResult, InputPort, LatencyMode, OutputPort, StreamDirection, StreamStatus,
};
use crate::frame::AudioFrame;
use crate::sync::{mark_current_thread, AudioThread};
use crate::types::{Sample, MAX_CHANNELS};

use super::events::{AudioEvent, EventSink, PacketEncoder};
use super::node::{ListenerId, SoundNode};

/// Restores the Main role when dropped
pub(crate) struct MixThreadGuard;

impl Drop for MixThreadGuard {
    fn drop(&mut self) {
        mark_current_thread(AudioThread::Main);
    }
}

/// Act as the mix thread until the guard drops
pub(crate) fn enter_mix_thread() -> MixThreadGuard {
    mark_current_thread(AudioThread::Mix);
    MixThreadGuard
}

/// Everything written to a [`FakeOutputPort`]
#[derive(Default)]
pub(crate) struct OutputLog {
    samples: Mutex<Vec<Sample>>,
    writes: AtomicUsize,
    latency: Mutex<Option<LatencyMode>>,
    error: Mutex<Option<String>>,
    fail_writes: AtomicBool,
}

impl OutputLog {
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.samples.lock().unwrap().clear();
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn latency(&self) -> Option<LatencyMode> {
        *self.latency.lock().unwrap()
    }

    /// Report a device error on the next `take_error`
    pub fn inject_error(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

/// Output port that records every block
///
/// Unpaced ports always have room for one block. Paced ports only have room
/// after `wait_until_output_needed`, which sleeps briefly, so a mix thread
/// driving one does not spin.
pub(crate) struct FakeOutputPort {
    channels: usize,
    sample_rate: u32,
    block_frames: usize,
    paced: bool,
    ready: AtomicBool,
    log: Arc<OutputLog>,
}

impl FakeOutputPort {
    pub fn new(channels: usize, sample_rate: u32, block_frames: usize) -> Self {
        Self {
            channels,
            sample_rate,
            block_frames,
            paced: false,
            ready: AtomicBool::new(true),
            log: Arc::new(OutputLog::default()),
        }
    }

    pub fn paced(channels: usize, sample_rate: u32, block_frames: usize) -> Self {
        Self {
            paced: true,
            ready: AtomicBool::new(false),
            ..Self::new(channels, sample_rate, block_frames)
        }
    }

    pub fn log(&self) -> Arc<OutputLog> {
        Arc::clone(&self.log)
    }
}

impl OutputPort for FakeOutputPort {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write_available(&self) -> usize {
        if self.ready.load(Ordering::SeqCst) {
            self.block_frames * self.channels
        } else {
            0
        }
    }

    fn write(&mut self, samples: &[Sample]) -> AudioResult<usize> {
        if self.log.fail_writes.load(Ordering::SeqCst) {
            return Err(AudioError::StreamError("ring buffer closed".into()));
        }
        self.log.samples.lock().unwrap().extend_from_slice(samples);
        self.log.writes.fetch_add(1, Ordering::SeqCst);
        if self.paced {
            self.ready.store(false, Ordering::SeqCst);
        }
        Ok(samples.len())
    }

    fn wait_until_output_needed(&self, _timeout: Duration) {
        if self.paced {
            std::thread::sleep(Duration::from_millis(1));
            self.ready.store(true, Ordering::SeqCst);
        }
    }

    fn set_latency(&mut self, mode: LatencyMode) {
        *self.log.latency.lock().unwrap() = Some(mode);
    }

    fn take_error(&mut self) -> Option<AudioError> {
        self.log.error.lock().unwrap().take().map(AudioError::StreamError)
    }
}

/// Input port fed by the test through a shared buffer
pub(crate) struct FakeInputPort {
    channels: usize,
    sample_rate: u32,
    feed: Arc<Mutex<Vec<Sample>>>,
    error: Arc<Mutex<Option<String>>>,
}

impl FakeInputPort {
    pub fn new(channels: usize, sample_rate: u32) -> (Self, Arc<Mutex<Vec<Sample>>>) {
        let feed = Arc::new(Mutex::new(Vec::new()));
        let port = Self {
            channels,
            sample_rate,
            feed: Arc::clone(&feed),
            error: Arc::new(Mutex::new(None)),
        };
        (port, feed)
    }

    /// Slot whose message is reported on the next `take_error`
    pub fn error_slot(&self) -> Arc<Mutex<Option<String>>> {
        Arc::clone(&self.error)
    }
}

impl InputPort for FakeInputPort {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_available(&mut self, out: &mut Vec<Sample>) -> usize {
        let mut feed = self.feed.lock().unwrap();
        let count = feed.len();
        out.append(&mut feed);
        count
    }

    fn take_error(&mut self) -> Option<AudioError> {
        self.error.lock().unwrap().take().map(AudioError::StreamError)
    }
}

/// What the test can see of a [`FakeBackend`] after handing it to the mixer
#[derive(Default)]
pub(crate) struct BackendProbe {
    pub output: Mutex<Option<Arc<OutputLog>>>,
    pub input_feed: Mutex<Option<Arc<Mutex<Vec<Sample>>>>>,
    pub output_status: Mutex<StreamStatus>,
    pub input_status: Mutex<StreamStatus>,
    pub shut_down: AtomicBool,
}

impl BackendProbe {
    pub fn output_log(&self) -> Option<Arc<OutputLog>> {
        self.output.lock().unwrap().clone()
    }

    pub fn feed_input(&self, samples: &[Sample]) -> bool {
        match self.input_feed.lock().unwrap().as_ref() {
            Some(feed) => {
                feed.lock().unwrap().extend_from_slice(samples);
                true
            }
            None => false,
        }
    }
}

/// Backend handing out paced fake ports
pub(crate) struct FakeBackend {
    output_channels: usize,
    sample_rate: u32,
    block_frames: usize,
    input_channels: usize,
    fail_init: bool,
    output: Option<FakeOutputPort>,
    input: Option<FakeInputPort>,
    probe: Arc<BackendProbe>,
}

impl FakeBackend {
    pub fn new(
        output_channels: usize,
        sample_rate: u32,
        block_frames: usize,
    ) -> (Self, Arc<BackendProbe>) {
        let probe = Arc::new(BackendProbe::default());
        let backend = Self {
            output_channels,
            sample_rate,
            block_frames,
            input_channels: 1,
            fail_init: false,
            output: None,
            input: None,
            probe: Arc::clone(&probe),
        };
        (backend, probe)
    }

    /// A backend whose `initialize` always fails
    pub fn failing() -> (Self, Arc<BackendProbe>) {
        let (mut backend, probe) = Self::new(2, 48000, 256);
        backend.fail_init = true;
        (backend, probe)
    }

    fn status(&self, direction: StreamDirection) -> &Mutex<StreamStatus> {
        match direction {
            StreamDirection::Output => &self.probe.output_status,
            StreamDirection::Input => &self.probe.input_status,
        }
    }
}

impl AudioBackend for FakeBackend {
    fn initialize(&mut self, wants_output: bool, wants_input: bool) -> AudioResult<()> {
        if self.fail_init {
            return Err(AudioError::NoDevices);
        }
        if wants_output {
            let port = FakeOutputPort::paced(self.output_channels, self.sample_rate, self.block_frames);
            *self.probe.output.lock().unwrap() = Some(port.log());
            self.output = Some(port);
            *self.probe.output_status.lock().unwrap() = StreamStatus::Stopped;
        }
        if wants_input {
            let (port, feed) = FakeInputPort::new(self.input_channels, self.sample_rate);
            *self.probe.input_feed.lock().unwrap() = Some(feed);
            self.input = Some(port);
            *self.probe.input_status.lock().unwrap() = StreamStatus::Stopped;
        }
        Ok(())
    }

    fn take_output_port(&mut self) -> Option<Box<dyn OutputPort>> {
        self.output.take().map(|port| Box::new(port) as Box<dyn OutputPort>)
    }

    fn take_input_port(&mut self) -> Option<Box<dyn InputPort>> {
        self.input.take().map(|port| Box::new(port) as Box<dyn InputPort>)
    }

    fn start_streams(&mut self, direction: StreamDirection) -> AudioResult<()> {
        let mut status = self.status(direction).lock().unwrap();
        if *status == StreamStatus::Closed {
            return Err(AudioError::StreamPlayError(format!("{} stream not open", direction)));
        }
        *status = StreamStatus::Running;
        Ok(())
    }

    fn stop_streams(&mut self, direction: StreamDirection) {
        let mut status = self.status(direction).lock().unwrap();
        if *status == StreamStatus::Running {
            *status = StreamStatus::Stopped;
        }
    }

    fn stream_status(&self, direction: StreamDirection) -> StreamStatus {
        *self.status(direction).lock().unwrap()
    }

    fn shut_down(&mut self) {
        *self.probe.output_status.lock().unwrap() = StreamStatus::Closed;
        *self.probe.input_status.lock().unwrap() = StreamStatus::Closed;
        self.probe.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Root node that renders the same frame forever
pub(crate) struct ConstantNode {
    frame: Mutex<AudioFrame>,
}

impl ConstantNode {
    pub fn new(samples: Vec<Sample>, channels: usize) -> Self {
        Self {
            frame: Mutex::new(AudioFrame::from_samples(&samples, channels)),
        }
    }
}

impl SoundNode for ConstantNode {
    fn output_samples(
        &self,
        buffer: &mut [Sample],
        channels: usize,
        _listener: Option<ListenerId>,
        _is_mix_pass: bool,
    ) -> bool {
        let mut frame = self.frame.lock().unwrap();
        let mut converted = [0.0; MAX_CHANNELS];
        converted[..channels].copy_from_slice(frame.samples(channels));
        for chunk in buffer.chunks_exact_mut(channels) {
            chunk.copy_from_slice(&converted[..channels]);
        }
        true
    }
}

/// Sink collecting every event it receives
pub(crate) struct RecordingSink {
    events: Arc<Mutex<Vec<AudioEvent>>>,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<AudioEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: Arc::clone(&events),
            },
            events,
        )
    }
}

impl EventSink for RecordingSink {
    fn dispatch(&mut self, event: AudioEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Encoder that emits the packet length as little-endian bytes
pub(crate) struct CountingEncoder {
    packets: Arc<Mutex<Vec<usize>>>,
    pub fail_init: bool,
}

impl CountingEncoder {
    pub fn new() -> (Self, Arc<Mutex<Vec<usize>>>) {
        let packets = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                packets: Arc::clone(&packets),
                fail_init: false,
            },
            packets,
        )
    }
}

impl PacketEncoder for CountingEncoder {
    fn initialize(&mut self) -> AudioResult<()> {
        if self.fail_init {
            return Err(AudioError::Encoder("codec rejected settings".into()));
        }
        self.packets.lock().unwrap().clear();
        Ok(())
    }

    fn encode_packet(&mut self, mono: &[Sample]) -> AudioResult<Vec<u8>> {
        self.packets.lock().unwrap().push(mono.len());
        Ok((mono.len() as u32).to_le_bytes().to_vec())
    }
}
