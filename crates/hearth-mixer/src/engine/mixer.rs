//! Control-thread API of the mixing core
//!
//! [`AudioMixer`] owns the backend, the mix thread handle and both task
//! queues. It never writes mix-thread state itself: every setter posts a task
//! that the mix thread runs at the top of its next block, and every getter
//! reads the last value the mix thread published.
//!
//! ```text
//! Uninitialized ──start_mixing──▶ Running ──shut_down──▶ ShuttingDown ──▶ Stopped
//!       └───────────────────────shut_down─────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::{AudioBackend, AudioError, AudioResult, LatencyMode, StreamDirection, StreamStatus};
use crate::config::MixerConfig;
use crate::sync::{task_queue, AudioTask, TaskReceiver, TaskSender};
use crate::types::MAX_CHANNELS;

use super::events::{EventSink, PacketEncoder};
use super::microphone::{capture_ring, MicDispatch};
use super::mix_loop::{MixContext, MixLoop};
use super::node::SoundNode;
use super::state::SharedState;

/// Lifecycle of an [`AudioMixer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerState {
    Uninitialized,
    Running,
    ShuttingDown,
    Stopped,
}

impl MixerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MixerState::Uninitialized => "uninitialized",
            MixerState::Running => "running",
            MixerState::ShuttingDown => "shutting down",
            MixerState::Stopped => "stopped",
        }
    }
}

/// Real-time mixer driven from the control thread
pub struct AudioMixer {
    config: MixerConfig,
    state: MixerState,
    backend: Box<dyn AudioBackend>,
    events: Box<dyn EventSink>,
    encoder: Option<Box<dyn PacketEncoder>>,
    shared: Arc<SharedState>,

    mix_tasks: TaskSender<MixContext>,
    /// Moved into the mix thread by `start_mixing`
    mix_receiver: Option<TaskReceiver<MixContext>>,
    game_sender: TaskSender<dyn EventSink>,
    game_tasks: TaskReceiver<dyn EventSink>,
    thread: Option<JoinHandle<()>>,

    /// Last requested system channel count
    channel_setting: usize,
    send_uncompressed: bool,
    send_compressed: bool,
    mic: Option<MicDispatch>,
}

impl AudioMixer {
    pub fn new(
        config: MixerConfig,
        backend: Box<dyn AudioBackend>,
        events: Box<dyn EventSink>,
    ) -> Self {
        let config = config.sanitized();
        let initial_channels = match config.output_channels {
            0 => 2,
            n => n,
        };
        let shared = Arc::new(SharedState::new(
            config.volume,
            initial_channels,
            config.minimum_volume_threshold,
        ));
        let (mix_tasks, mix_receiver) = task_queue::<MixContext>();
        let (game_sender, game_tasks) = task_queue::<dyn EventSink>();

        Self {
            channel_setting: config.output_channels,
            config,
            state: MixerState::Uninitialized,
            backend,
            events,
            encoder: None,
            shared,
            mix_tasks,
            mix_receiver: Some(mix_receiver),
            game_sender,
            game_tasks,
            thread: None,
            send_uncompressed: false,
            send_compressed: false,
            mic: None,
        }
    }

    /// Attach the encoder used for compressed microphone streaming
    pub fn with_encoder(mut self, encoder: Box<dyn PacketEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn state(&self) -> MixerState {
        self.state
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Open the output device and launch the mix thread
    ///
    /// On failure nothing is left running and the mixer stays uninitialized.
    pub fn start_mixing(&mut self, root: Arc<dyn SoundNode>) -> AudioResult<()> {
        if self.state != MixerState::Uninitialized {
            return Err(AudioError::InvalidState {
                expected: MixerState::Uninitialized.as_str(),
                actual: self.state.as_str(),
            });
        }

        log::info!("Starting mixer");
        self.backend
            .initialize(true, false)
            .map_err(|e| AudioError::BackendInit(e.to_string()))?;

        let Some(mut output) = self.backend.take_output_port() else {
            self.backend.shut_down();
            return Err(AudioError::BackendInit("backend opened no output port".into()));
        };
        output.set_latency(self.config.latency);
        log::debug!(
            "Output port: {} channels at {}Hz",
            output.channels(),
            output.sample_rate()
        );

        if let Err(e) = self.backend.start_streams(StreamDirection::Output) {
            self.backend.shut_down();
            return Err(e);
        }

        let Some(receiver) = self.mix_receiver.take() else {
            self.backend.shut_down();
            return Err(AudioError::InvalidState {
                expected: MixerState::Uninitialized.as_str(),
                actual: self.state.as_str(),
            });
        };

        let context = MixContext::new(
            Arc::clone(&self.shared),
            output,
            Some(root),
            self.game_sender.clone(),
            &self.config,
        );
        let spawned = thread::Builder::new()
            .name("audio-mix".into())
            .spawn(move || MixLoop::new(context, receiver).run());

        match spawned {
            Ok(handle) => self.thread = Some(handle),
            Err(e) => {
                self.backend.stop_streams(StreamDirection::Output);
                self.backend.shut_down();
                // The receiver went down with the closure
                let (mix_tasks, mix_receiver) = task_queue::<MixContext>();
                self.mix_tasks = mix_tasks;
                self.mix_receiver = Some(mix_receiver);
                return Err(AudioError::ThreadSpawn(e.to_string()));
            }
        }

        self.state = MixerState::Running;
        log::info!("Mixer running");

        if self.microphone_enabled() {
            if let Err(e) = self.open_capture() {
                log::warn!("Microphone capture unavailable: {}", e);
            }
        }
        Ok(())
    }

    /// Fade out, stop the mix thread and close the backend
    ///
    /// Blocks until the mix thread has exited. Safe to call repeatedly.
    pub fn shut_down(&mut self) {
        match self.state {
            MixerState::Stopped => return,
            MixerState::Uninitialized => {
                self.state = MixerState::Stopped;
                return;
            }
            MixerState::Running | MixerState::ShuttingDown => {}
        }

        log::info!("Shutting down mixer");
        self.state = MixerState::ShuttingDown;
        self.shared.shutting_down.set(true);

        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Mix thread panicked");
            }
        }

        if self.mic.take().is_some() {
            self.backend.stop_streams(StreamDirection::Input);
        }
        self.backend.stop_streams(StreamDirection::Output);
        self.backend.shut_down();

        // Release whatever the mix thread handed back on its way out
        self.game_tasks.drain_and_execute(&mut *self.events);

        self.state = MixerState::Stopped;
        log::info!("Mixer stopped");
    }

    /// Per-tick pump: run mix→game tasks and forward captured audio
    pub fn update(&mut self) {
        self.game_tasks.drain_and_execute(&mut *self.events);

        if let Some(dispatch) = self.mic.as_mut() {
            let channels = self.shared.system_channels.get();
            let encoder = self
                .encoder
                .as_mut()
                .map(|encoder| encoder.as_mut() as &mut dyn PacketEncoder);
            dispatch.dispatch(channels, encoder, &mut *self.events);
        }
    }

    /// Queue a task for the mix thread
    pub fn add_task(&self, task: AudioTask<MixContext>) {
        self.mix_tasks.push(task);
    }

    /// Sender for node-graph collaborators that post their own mix tasks
    pub fn task_sender(&self) -> TaskSender<MixContext> {
        self.mix_tasks.clone()
    }

    pub fn set_root_node(&self, node: Arc<dyn SoundNode>) {
        self.mix_tasks
            .send(move |ctx: &mut MixContext| ctx.set_root_node(Some(node)));
    }

    /// Set the master volume (linear gain, clamped to >= 0)
    pub fn set_volume(&self, volume: f32) {
        if !volume.is_finite() {
            log::warn!("Ignoring non-finite volume {}", volume);
            return;
        }
        let volume = volume.max(0.0);
        self.mix_tasks.send(move |ctx: &mut MixContext| ctx.set_volume(volume));
    }

    /// Last volume applied by the mix thread
    pub fn volume(&self) -> f32 {
        self.shared.volume.get()
    }

    /// Ramp output to silence (or back)
    pub fn set_mute(&self, mute: bool) {
        self.mix_tasks.send(move |ctx: &mut MixContext| ctx.set_muted(mute));
    }

    /// True once a mute ramp has completed
    pub fn is_muted(&self) -> bool {
        self.shared.muted.get()
    }

    /// Request the channel count the graph renders at (0 = follow the device)
    pub fn set_output_channels(&mut self, channels: usize) {
        if channels > MAX_CHANNELS {
            log::warn!("Ignoring output channel count {} (max {})", channels, MAX_CHANNELS);
            return;
        }
        if channels == self.channel_setting {
            return;
        }
        self.channel_setting = channels;
        self.mix_tasks
            .send(move |ctx: &mut MixContext| ctx.set_output_channels(channels));
    }

    /// Channel count of the most recent block
    pub fn output_channels(&self) -> usize {
        self.shared.system_channels.get()
    }

    /// Channel count of the device stream (0 until the first block)
    pub fn device_channels(&self) -> usize {
        self.shared.device_channels.get()
    }

    pub fn set_minimum_volume_threshold(&self, threshold: f32) {
        if !threshold.is_finite() || threshold < 0.0 {
            log::warn!("Ignoring minimum volume threshold {}", threshold);
            return;
        }
        self.mix_tasks
            .send(move |ctx: &mut MixContext| ctx.set_minimum_volume_threshold(threshold));
    }

    pub fn minimum_volume_threshold(&self) -> f32 {
        self.shared.minimum_volume_threshold.get()
    }

    pub fn set_latency(&self, mode: LatencyMode) {
        self.mix_tasks.send(move |ctx: &mut MixContext| ctx.set_latency(mode));
    }

    pub fn peak_output_volume(&self) -> f32 {
        self.shared.peak_output.get()
    }

    pub fn rms_output_volume(&self) -> f32 {
        self.shared.rms_output.get()
    }

    pub fn is_resampling(&self) -> bool {
        self.shared.resampling.get()
    }

    /// Number of blocks rendered so far
    pub fn mix_version(&self) -> u64 {
        self.shared.mix_version.get()
    }

    pub fn stream_status(&self, direction: StreamDirection) -> StreamStatus {
        self.backend.stream_status(direction)
    }

    /// Peak of the most recent captured input
    pub fn peak_input_volume(&self) -> f32 {
        if self.mic.is_none() {
            log::warn!("Input peak requested while microphone capture is off");
            return 0.0;
        }
        self.shared.peak_input.get()
    }

    fn microphone_enabled(&self) -> bool {
        self.send_uncompressed || self.send_compressed
    }

    /// Forward raw captured audio as events
    pub fn set_microphone_uncompressed(&mut self, enable: bool) -> AudioResult<()> {
        self.update_microphone(enable, self.send_compressed)
    }

    /// Forward encoded mono packets as events
    ///
    /// Enabling (re)initialises the encoder.
    pub fn set_microphone_compressed(&mut self, enable: bool) -> AudioResult<()> {
        if enable {
            let encoder = self.encoder.as_mut().ok_or(AudioError::EncoderUnavailable)?;
            encoder.initialize()?;
        }
        self.update_microphone(self.send_uncompressed, enable)
    }

    fn update_microphone(&mut self, uncompressed: bool, compressed: bool) -> AudioResult<()> {
        let was_enabled = self.microphone_enabled();
        let enabled = uncompressed || compressed;

        if enabled && !was_enabled && self.state == MixerState::Running {
            self.open_capture()?;
        } else if !enabled && was_enabled {
            self.close_capture();
        }

        self.send_uncompressed = uncompressed;
        self.send_compressed = compressed;
        if let Some(dispatch) = self.mic.as_mut() {
            dispatch.send_uncompressed = uncompressed;
            dispatch.send_compressed = compressed;
        }
        Ok(())
    }

    fn open_capture(&mut self) -> AudioResult<()> {
        self.backend
            .initialize(false, true)
            .map_err(|e| AudioError::BackendInit(e.to_string()))?;
        let port = self
            .backend
            .take_input_port()
            .ok_or_else(|| AudioError::BackendInit("backend opened no input port".into()))?;
        self.backend.start_streams(StreamDirection::Input)?;

        log::info!(
            "Microphone capture: {} channels at {}Hz",
            port.channels(),
            port.sample_rate()
        );
        let capacity = self.config.mic_buffer_samples(MAX_CHANNELS);
        let (capture, consumer) = capture_ring(port, capacity);
        self.mix_tasks
            .send(move |ctx: &mut MixContext| ctx.attach_capture(capture));

        let mut dispatch = MicDispatch::new(consumer, self.config.packet_frames);
        dispatch.send_uncompressed = self.send_uncompressed;
        dispatch.send_compressed = self.send_compressed;
        self.mic = Some(dispatch);
        Ok(())
    }

    fn close_capture(&mut self) {
        self.mix_tasks.send(|ctx: &mut MixContext| ctx.detach_capture());
        if self.mic.take().is_some() {
            self.backend.stop_streams(StreamDirection::Input);
            log::info!("Microphone capture stopped");
        }
    }
}

impl Drop for AudioMixer {
    fn drop(&mut self) {
        self.shut_down();
    }
}
