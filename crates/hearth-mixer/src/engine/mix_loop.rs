//! The mix thread
//!
//! [`MixContext`] owns every piece of state that only the mix thread may
//! write. Control-thread setters reach it exclusively through tasks, so none
//! of it needs a lock. [`MixLoop`] pairs the context with the receiving end
//! of the game→mix task queue and runs the block loop until shutdown.
//!
//! One block:
//! 1. drain game→mix tasks
//! 2. size the block from free space in the output ring (wait if none)
//! 3. re-check device rate → resampling
//! 4. capture microphone input
//! 5. render the root node at the system channel count
//! 6. per frame: volume, clamp, meter, channel conversion, LFE
//! 7. publish meters
//! 8. mute/unmute ramp, mute silence
//! 9. shutdown fade, write, stop

use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AudioError, LatencyMode, OutputPort, StreamDirection};
use crate::config::MixerConfig;
use crate::dsp::{LowPassFilter, Resampler, VolumeRamp};
use crate::frame::AudioFrame;
use crate::sync::{mark_current_thread, AudioThread, TaskReceiver, TaskSender};
use crate::types::{has_lfe, Channel, Sample, MAX_CHANNELS, RMS_SCALE, SYSTEM_SAMPLE_RATE};

use super::events::{AudioEvent, EventSink, GameTask};
use super::microphone::MicCapture;
use super::node::SoundNode;
use super::state::SharedState;

/// Upper bound on one wait for the device to consume output
const OUTPUT_WAIT_TIMEOUT: Duration = Duration::from_millis(1);

/// Whether the loop should run another block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixOutcome {
    Continue,
    Stop,
}

/// Mix-thread state; the target of game→mix tasks
pub struct MixContext {
    shared: Arc<SharedState>,
    output: Box<dyn OutputPort>,
    root: Option<Arc<dyn SoundNode>>,
    game: TaskSender<dyn EventSink>,
    capture: Option<MicCapture>,

    /// Requested system channel count (0 = follow the device)
    channel_setting: usize,
    /// True while a mute ramp is running
    muting: bool,
    ramp: VolumeRamp,
    lfe_filter: LowPassFilter,
    resampler: Resampler,
    frame: AudioFrame,

    /// Root node output at the system rate and channel count
    render_buffer: Vec<Sample>,
    /// Finished block at the device channel count
    output_buffer: Vec<Sample>,

    property_change_frames: u32,
    shutdown_idle_limit: u32,
    shutdown_idle_waits: u32,
    /// Previous block clipped
    clipping: bool,
    /// A write error has been reported and not yet cleared
    write_failed: bool,
}

impl MixContext {
    pub(crate) fn new(
        shared: Arc<SharedState>,
        output: Box<dyn OutputPort>,
        root: Option<Arc<dyn SoundNode>>,
        game: TaskSender<dyn EventSink>,
        config: &MixerConfig,
    ) -> Self {
        Self {
            shared,
            output,
            root,
            game,
            capture: None,
            channel_setting: config.output_channels.min(MAX_CHANNELS),
            muting: false,
            ramp: VolumeRamp::default(),
            lfe_filter: LowPassFilter::new(config.lfe_cutoff_hz),
            resampler: Resampler::new(SYSTEM_SAMPLE_RATE, SYSTEM_SAMPLE_RATE),
            frame: AudioFrame::new(),
            render_buffer: Vec::new(),
            output_buffer: Vec::new(),
            property_change_frames: config.property_change_frames,
            shutdown_idle_limit: config.shutdown_idle_limit,
            shutdown_idle_waits: 0,
            clipping: false,
            write_failed: false,
        }
    }

    /// Queue a task for the control thread's next `update()`
    pub fn post_to_game(&self, task: GameTask) {
        self.game.push(task);
    }

    fn report(&self, event: AudioEvent) {
        self.game.send(move |sink| sink.dispatch(event));
    }

    /// Master gain applied before clamping
    pub fn set_volume(&mut self, volume: f32) {
        self.shared.volume.set(volume);
    }

    pub fn minimum_volume_threshold(&self) -> f32 {
        self.shared.minimum_volume_threshold.get()
    }

    pub fn set_minimum_volume_threshold(&mut self, threshold: f32) {
        self.shared.minimum_volume_threshold.set(threshold);
    }

    /// Current system channel count
    pub fn system_channels(&self) -> usize {
        match self.channel_setting {
            0 => self.output.channels().clamp(1, MAX_CHANNELS),
            n => n,
        }
    }

    /// Request a system channel count (0 = follow the device)
    pub fn set_output_channels(&mut self, channels: usize) {
        if channels > MAX_CHANNELS {
            log::warn!("Ignoring output channel count {} (max {})", channels, MAX_CHANNELS);
            return;
        }
        self.channel_setting = channels;
        log::debug!("System channels now {}", self.system_channels());
    }

    pub fn set_latency(&mut self, mode: LatencyMode) {
        self.output.set_latency(mode);
    }

    /// Swap the root node; the old one is released on the control thread
    pub fn set_root_node(&mut self, node: Option<Arc<dyn SoundNode>>) {
        if let Some(old) = std::mem::replace(&mut self.root, node) {
            self.post_to_game(GameTask::new(move |_sink| drop(old)));
        }
    }

    pub(crate) fn attach_capture(&mut self, capture: MicCapture) {
        self.detach_capture();
        self.capture = Some(capture);
        log::debug!("Microphone capture attached");
    }

    pub(crate) fn detach_capture(&mut self) {
        if let Some(old) = self.capture.take() {
            self.post_to_game(GameTask::new(move |_sink| drop(old)));
            log::debug!("Microphone capture detached");
        }
    }

    /// Start or reverse a mute transition
    ///
    /// Muting twice does not restart a running ramp. Unmuting mid-ramp turns
    /// the ramp around from its current gain.
    pub fn set_muted(&mut self, mute: bool) {
        let muted = self.shared.muted.get();
        let frames = self.property_change_frames;

        if mute {
            if muted || self.muting {
                return;
            }
            self.muting = true;
            self.ramp.set_values(self.ramp.current_value(), 0.0, frames);
        } else if muted {
            self.shared.muted.set(false);
            self.ramp.set_values(0.0, 1.0, frames);
        } else if self.muting {
            self.muting = false;
            self.ramp.set_values(self.ramp.current_value(), 1.0, frames);
        }
    }

    /// Produce and write one block
    pub fn mix_block(&mut self) -> MixOutcome {
        let shutting_down = self.shared.shutting_down.get();

        if let Some(err) = self.output.take_error() {
            self.report_fatal(StreamDirection::Output, err);
        }

        let device_channels = self.output.channels().clamp(1, MAX_CHANNELS);
        self.shared.device_channels.set_if_changed(device_channels);

        let frames = self.output.write_available() / device_channels;
        if frames == 0 {
            self.output.wait_until_output_needed(OUTPUT_WAIT_TIMEOUT);
            if shutting_down {
                self.shutdown_idle_waits += 1;
                if self.shutdown_idle_waits >= self.shutdown_idle_limit {
                    log::warn!("Output stalled during shutdown, exiting without fade");
                    return MixOutcome::Stop;
                }
            }
            return MixOutcome::Continue;
        }

        // Device rate can change under us
        let device_rate = self.output.sample_rate();
        let resampling = device_rate != SYSTEM_SAMPLE_RATE;
        if self.shared.resampling.set_if_changed(resampling) {
            log::debug!(
                "Resampling {} ({}Hz device)",
                if resampling { "enabled" } else { "disabled" },
                device_rate
            );
            self.resampler.reset();
        }
        self.resampler.set_rates(SYSTEM_SAMPLE_RATE, device_rate);

        let system_channels = self.system_channels();
        self.shared.system_channels.set_if_changed(system_channels);

        let capture_error = self
            .capture
            .as_mut()
            .and_then(|capture| capture.process(system_channels, &self.shared));
        if let Some(err) = capture_error {
            self.report_fatal(StreamDirection::Input, err);
        }

        let input_frames = if resampling {
            self.resampler.input_frames_needed(frames)
        } else {
            frames
        };
        self.render(input_frames, system_channels);
        if resampling {
            self.resampler.push_input(&self.render_buffer, system_channels);
        }

        self.convert_block(frames, system_channels, device_channels, resampling);
        if self.shared.muted.get() {
            self.output_buffer.fill(0.0);
        } else {
            self.apply_ramp(device_channels);
        }

        if shutting_down {
            self.ramp.set_values(1.0, 0.0, frames as u32);
            self.apply_ramp(device_channels);
            self.write_block();
            log::info!("Mix thread faded out");
            return MixOutcome::Stop;
        }

        self.write_block();
        MixOutcome::Continue
    }

    /// Ask the root node for `frames` frames; silence if it has nothing
    fn render(&mut self, frames: usize, channels: usize) {
        self.render_buffer.clear();
        self.render_buffer.resize(frames * channels, 0.0);

        let audible = match &self.root {
            Some(root) => root.output_samples(&mut self.render_buffer, channels, None, true),
            None => false,
        };
        if !audible {
            self.render_buffer.fill(0.0);
        }

        let version = self.shared.mix_version.get().wrapping_add(1);
        self.shared.mix_version.set(version);
    }

    /// Volume, clamp, metering and channel conversion into `output_buffer`
    fn convert_block(
        &mut self,
        frames: usize,
        system_channels: usize,
        device_channels: usize,
        resampling: bool,
    ) {
        let volume = self.shared.volume.get();
        let lfe = has_lfe(device_channels);

        self.output_buffer.clear();
        self.output_buffer.resize(frames * device_channels, 0.0);

        let mut scratch = [0.0; MAX_CHANNELS];
        let mut peak: f32 = 0.0;
        let mut square_sum: u64 = 0;
        let mut clipped = false;

        for (i, out) in self.output_buffer.chunks_exact_mut(device_channels).enumerate() {
            if resampling {
                if !self.resampler.next_frame(&mut scratch[..system_channels]) {
                    scratch = [0.0; MAX_CHANNELS];
                }
                self.frame.set_samples(&scratch[..system_channels], system_channels);
            } else {
                let start = i * system_channels;
                self.frame
                    .set_samples(&self.render_buffer[start..start + system_channels], system_channels);
            }

            self.frame *= volume;
            if self.frame.max_value() > 1.0 {
                clipped = true;
            }
            self.frame.clamp();

            peak = peak.max(self.frame.max_value());
            let mono = self.frame.mono_value();
            let scaled = (mono.abs() * RMS_SCALE) as u64;
            square_sum += scaled * scaled;

            out.copy_from_slice(self.frame.samples(device_channels));
            if lfe {
                out[Channel::LowFrequency.index()] = self.lfe_filter.process(mono);
            }
        }

        self.shared.peak_output.set_if_changed(peak);
        if frames > 0 {
            let rms = ((square_sum as f64 / frames as f64).sqrt() / RMS_SCALE as f64) as f32;
            self.shared.rms_output.set_if_changed(rms);
        }

        if clipped && !self.clipping {
            log::debug!("Output clipped");
            self.report(AudioEvent::Clipping);
        }
        self.clipping = clipped;
    }

    /// Scale the block by the ramp, one gain per frame
    fn apply_ramp(&mut self, device_channels: usize) {
        if self.ramp.is_finished() {
            return;
        }
        for frame in self.output_buffer.chunks_exact_mut(device_channels) {
            let gain = self.ramp.next_value();
            for sample in frame {
                *sample *= gain;
            }
        }
        if self.muting && self.ramp.is_finished() {
            self.muting = false;
            self.shared.muted.set(true);
            log::debug!("Mute ramp complete");
        }
    }

    fn write_block(&mut self) {
        match self.output.write(&self.output_buffer) {
            Ok(written) => {
                if written < self.output_buffer.len() {
                    log::trace!("Short write: {} of {} samples", written, self.output_buffer.len());
                }
                self.write_failed = false;
            }
            Err(err) => {
                if !self.write_failed {
                    self.write_failed = true;
                    self.report_fatal(StreamDirection::Output, err);
                }
            }
        }
    }

    fn report_fatal(&self, direction: StreamDirection, err: AudioError) {
        log::error!("Audio {} failed: {}", direction, err);
        self.report(AudioEvent::FatalError(err.to_string()));
    }
}

/// Mix thread body: the context plus its task queue
pub struct MixLoop {
    context: MixContext,
    tasks: TaskReceiver<MixContext>,
}

impl MixLoop {
    pub(crate) fn new(context: MixContext, tasks: TaskReceiver<MixContext>) -> Self {
        Self { context, tasks }
    }

    /// Drain pending tasks and produce one block
    pub fn step(&mut self) -> MixOutcome {
        self.tasks.drain_and_execute(&mut self.context);
        self.context.mix_block()
    }

    /// Run until shutdown completes
    pub fn run(mut self) {
        mark_current_thread(AudioThread::Mix);
        log::info!("Mix thread started");
        while self.step() == MixOutcome::Continue {}
        // Release the root node on the control thread
        self.context.set_root_node(None);
        self.context.detach_capture();
        log::info!("Mix thread stopped");
    }

    #[cfg(test)]
    pub(crate) fn context_mut(&mut self) -> &mut MixContext {
        &mut self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::microphone::capture_ring;
    use crate::engine::testing::{
        enter_mix_thread, ConstantNode, FakeInputPort, FakeOutputPort, OutputLog, RecordingSink,
    };
    use crate::sync::task_queue;
    use crate::types::PROPERTY_CHANGE_FRAMES;
    use std::f32::consts::FRAC_1_SQRT_2;

    struct Harness {
        mix: MixLoop,
        mix_tasks: TaskSender<MixContext>,
        game_tasks: TaskReceiver<dyn EventSink>,
        shared: Arc<SharedState>,
        log: Arc<OutputLog>,
    }

    impl Harness {
        fn new(config: MixerConfig, port: FakeOutputPort, root: Arc<dyn SoundNode>) -> Self {
            let log = port.log();
            let shared = Arc::new(SharedState::new(
                config.volume,
                config.output_channels.max(1),
                config.minimum_volume_threshold,
            ));
            let (game_sender, game_tasks) = task_queue::<dyn EventSink>();
            let (mix_tasks, receiver) = task_queue::<MixContext>();
            let context =
                MixContext::new(Arc::clone(&shared), Box::new(port), Some(root), game_sender, &config);
            Self {
                mix: MixLoop::new(context, receiver),
                mix_tasks,
                game_tasks,
                shared,
                log,
            }
        }

        fn events(&mut self) -> Vec<AudioEvent> {
            let (mut sink, events) = RecordingSink::new();
            self.game_tasks.drain_and_execute(&mut sink);
            let events = events.lock().unwrap().clone();
            events
        }
    }

    fn stereo_config() -> MixerConfig {
        MixerConfig {
            output_channels: 2,
            ..MixerConfig::default()
        }
    }

    #[test]
    fn test_six_channel_node_down_mixed_to_stereo_device() {
        let _mix = enter_mix_thread();
        let config = MixerConfig {
            output_channels: 6,
            ..MixerConfig::default()
        };
        let node = Arc::new(ConstantNode::new(vec![0.5, 0.5, 0.5, 0.1, 0.2, 0.2], 6));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 10);
        let mut h = Harness::new(config, port, node);

        assert_eq!(h.mix.step(), MixOutcome::Continue);

        let expected = 0.5 + 0.5 * FRAC_1_SQRT_2 + 0.2 * FRAC_1_SQRT_2;
        let written = h.log.samples();
        assert_eq!(written.len(), 20);
        for s in written {
            assert!((s - expected.min(1.0)).abs() < 1e-6, "got {}", s);
        }
        assert_eq!(h.shared.system_channels.get(), 6);
        assert_eq!(h.shared.device_channels.get(), 2);
        assert_eq!(h.shared.mix_version.get(), 1);
    }

    #[test]
    fn test_volume_and_meters() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.5, -0.5], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 64);
        let mut h = Harness::new(stereo_config(), port, node);

        h.mix_tasks.send(|ctx: &mut MixContext| ctx.set_volume(0.5));

        h.mix.step();
        assert!(h.log.samples().iter().all(|s| s.abs() == 0.25));
        assert_eq!(h.shared.peak_output.get(), 0.25);
        // Mono of L=0.25, R=-0.25 is silence
        assert_eq!(h.shared.rms_output.get(), 0.0);
    }

    #[test]
    fn test_rms_of_constant_mono() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.5], 1));
        let port = FakeOutputPort::new(1, SYSTEM_SAMPLE_RATE, 128);
        let config = MixerConfig {
            output_channels: 1,
            ..MixerConfig::default()
        };
        let mut h = Harness::new(config, port, node);
        h.mix.step();

        let expected = (0.5 * RMS_SCALE) as u64 as f32 / RMS_SCALE;
        assert!((h.shared.rms_output.get() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_clipping_reported_once_per_run() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![1.5, 1.5], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 32);
        let mut h = Harness::new(stereo_config(), port, node);

        for _ in 0..3 {
            h.mix.step();
        }
        assert!(h.log.samples().iter().all(|s| *s == 1.0));
        assert_eq!(h.events(), vec![AudioEvent::Clipping]);
        assert_eq!(h.shared.peak_output.get(), 1.0);
    }

    #[test]
    fn test_lfe_derived_from_low_passed_mono() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.4, 0.4], 2));
        let port = FakeOutputPort::new(6, SYSTEM_SAMPLE_RATE, 4800);
        let mut h = Harness::new(stereo_config(), port, node);
        h.mix.step();

        let written = h.log.samples();
        let frames: Vec<&[f32]> = written.chunks(6).collect();
        // Front channels pass straight through
        assert!((frames[0][0] - 0.4).abs() < 1e-6);
        // LFE starts near zero and settles at the DC level
        assert!(frames[0][3] < 0.01);
        assert!((frames[4799][3] - 0.4).abs() < 1e-2);
    }

    #[test]
    fn test_resampling_fills_device_block() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.3, 0.3], 2));
        let port = FakeOutputPort::new(2, 44100, 441);
        let mut h = Harness::new(stereo_config(), port, node);

        for _ in 0..4 {
            h.mix.step();
        }
        assert!(h.shared.resampling.get());
        let written = h.log.samples();
        assert_eq!(written.len(), 4 * 441 * 2);
        // Past the converter's start-up the block is the node's level throughout
        assert!(written.iter().all(|s| (0.0..=0.3 + 1e-5).contains(s)));
        assert!(written[2 * 16..].iter().all(|s| (s - 0.3).abs() < 1e-5));
    }

    #[test]
    fn test_mute_ramp_then_silence() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.5, 0.5], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 480);
        let mut h = Harness::new(stereo_config(), port, node);

        h.mix_tasks.send(|ctx: &mut MixContext| ctx.set_muted(true));
        h.mix.step();
        assert!(!h.shared.muted.get());
        h.mix.step();
        assert!(h.shared.muted.get());
        h.mix.step();

        let written = h.log.samples();
        let left: Vec<f32> = written.iter().step_by(2).copied().collect();
        // Ramp over 960 frames, strictly falling to zero
        for pair in left[..960].windows(2) {
            assert!(pair[1] < pair[0]);
        }
        assert_eq!(left[959], 0.0);
        assert!(left[960..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_double_mute_does_not_restart_ramp() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.5, 0.5], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 240);
        let mut h = Harness::new(stereo_config(), port, node);

        let mut muted_transitions = 0;
        let mut was_muted = false;
        for block in 0..8 {
            if block < 2 {
                h.mix_tasks.send(|ctx: &mut MixContext| ctx.set_muted(true));
            }
            h.mix.step();
            let muted = h.shared.muted.get();
            if muted && !was_muted {
                muted_transitions += 1;
            }
            was_muted = muted;
        }
        assert_eq!(muted_transitions, 1);

        // Exactly one ramp: 960 frames = 4 blocks of 240
        let left: Vec<f32> = h.log.samples().iter().step_by(2).copied().collect();
        let expected = PROPERTY_CHANGE_FRAMES as usize;
        for pair in left[..expected].windows(2) {
            assert!(pair[1] < pair[0]);
        }
        assert!(left[expected - 1..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_unmute_ramps_back_up() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.5], 1));
        let port = FakeOutputPort::new(1, SYSTEM_SAMPLE_RATE, 960);
        let config = MixerConfig {
            output_channels: 1,
            ..MixerConfig::default()
        };
        let mut h = Harness::new(config, port, node);

        h.mix.context_mut().set_muted(true);
        h.mix.step();
        h.mix.step();
        assert!(h.shared.muted.get());

        h.mix.context_mut().set_muted(false);
        assert!(!h.shared.muted.get());
        h.log.clear();
        h.mix.step();
        let written = h.log.samples();
        assert!(written[0] > 0.0 && written[0] < 0.01);
        assert!((written[959] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unmute_mid_ramp_reverses() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![1.0], 1));
        let port = FakeOutputPort::new(1, SYSTEM_SAMPLE_RATE, 480);
        let config = MixerConfig {
            output_channels: 1,
            ..MixerConfig::default()
        };
        let mut h = Harness::new(config, port, node);

        h.mix.context_mut().set_muted(true);
        h.mix.step();
        let halfway = *h.log.samples().last().unwrap();
        assert!((halfway - 0.5).abs() < 1e-3);

        h.mix.context_mut().set_muted(false);
        h.log.clear();
        h.mix.step();
        let written = h.log.samples();
        assert!(written[0] > halfway);
        for pair in written.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        h.mix.step();
        assert!(!h.shared.muted.get());
        assert_eq!(*h.log.samples().last().unwrap(), 1.0);
    }

    #[test]
    fn test_shutdown_fades_to_zero_and_stops() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.8, 0.8], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 256);
        let mut h = Harness::new(stereo_config(), port, node);

        for _ in 0..3 {
            assert_eq!(h.mix.step(), MixOutcome::Continue);
        }

        crate::sync::mark_current_thread(AudioThread::Main);
        h.shared.shutting_down.set(true);
        crate::sync::mark_current_thread(AudioThread::Mix);
        assert_eq!(h.mix.step(), MixOutcome::Stop);

        let blocks: Vec<f32> = h
            .log
            .samples()
            .chunks(512)
            .map(|block| block.iter().fold(0.0_f32, |p, s| p.max(s.abs())))
            .collect();
        assert_eq!(blocks.len(), 4);
        assert!(blocks[3] < blocks[2]);

        let last = h.log.samples();
        let tail = &last[last.len() - 2..];
        assert_eq!(tail, &[0.0, 0.0]);
        let left: Vec<f32> = last[3 * 512..].iter().step_by(2).copied().collect();
        for pair in left.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn test_shutdown_with_stalled_device_stops() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.5, 0.5], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 0);
        let config = MixerConfig {
            shutdown_idle_limit: 3,
            ..stereo_config()
        };
        let mut h = Harness::new(config, port, node);

        assert_eq!(h.mix.step(), MixOutcome::Continue);
        crate::sync::mark_current_thread(AudioThread::Main);
        h.shared.shutting_down.set(true);
        crate::sync::mark_current_thread(AudioThread::Mix);

        assert_eq!(h.mix.step(), MixOutcome::Continue);
        assert_eq!(h.mix.step(), MixOutcome::Continue);
        assert_eq!(h.mix.step(), MixOutcome::Stop);
        assert!(h.log.samples().is_empty());
    }

    #[test]
    fn test_output_channels_follow_device_when_zero() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.1; 4], 4));
        let port = FakeOutputPort::new(4, SYSTEM_SAMPLE_RATE, 16);
        let mut h = Harness::new(stereo_config(), port, node);

        h.mix.step();
        assert_eq!(h.shared.system_channels.get(), 2);

        h.mix_tasks.send(|ctx: &mut MixContext| ctx.set_output_channels(0));
        h.mix.step();
        assert_eq!(h.shared.system_channels.get(), 4);

        h.mix_tasks.send(|ctx: &mut MixContext| ctx.set_output_channels(12));
        h.mix.step();
        assert_eq!(h.shared.system_channels.get(), 4);
    }

    #[test]
    fn test_root_replacement_hands_old_node_back() {
        let _mix = enter_mix_thread();
        let first = Arc::new(ConstantNode::new(vec![0.1, 0.1], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 8);
        let mut h = Harness::new(stereo_config(), port, first.clone());

        let second: Arc<dyn SoundNode> = Arc::new(ConstantNode::new(vec![0.2, 0.2], 2));
        h.mix_tasks
            .send(move |ctx: &mut MixContext| ctx.set_root_node(Some(second)));
        h.mix.step();

        assert!(h.log.samples().iter().all(|s| (*s - 0.2).abs() < 1e-6));
        // The old root is still alive until the control thread drains
        assert_eq!(Arc::strong_count(&first), 2);
        h.events();
        assert_eq!(Arc::strong_count(&first), 1);
    }

    #[test]
    fn test_device_error_becomes_fatal_event() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.1, 0.1], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 8);
        let mut h = Harness::new(stereo_config(), port, node);

        h.log.inject_error("device unplugged");
        h.mix.step();
        let events = h.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], AudioEvent::FatalError(msg) if msg.contains("device unplugged")));
    }

    #[test]
    fn test_write_failure_reported_once() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.1, 0.1], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 8);
        let mut h = Harness::new(stereo_config(), port, node);

        h.log.fail_writes(true);
        for _ in 0..5 {
            h.mix.step();
        }
        assert_eq!(h.log.writes(), 0);
        let fatal = h
            .events()
            .into_iter()
            .filter(|e| matches!(e, AudioEvent::FatalError(_)))
            .count();
        assert_eq!(fatal, 1);

        // A good write ends the streak; the next failure is reported again
        h.log.fail_writes(false);
        h.mix.step();
        assert_eq!(h.log.writes(), 1);
        h.log.fail_writes(true);
        h.mix.step();
        h.mix.step();
        let fatal = h
            .events()
            .into_iter()
            .filter(|e| matches!(e, AudioEvent::FatalError(_)))
            .count();
        assert_eq!(fatal, 1);
    }

    #[test]
    fn test_capture_device_error_becomes_fatal_event() {
        let _mix = enter_mix_thread();
        let node = Arc::new(ConstantNode::new(vec![0.1, 0.1], 2));
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 8);
        let mut h = Harness::new(stereo_config(), port, node);

        let (input, _feed) = FakeInputPort::new(1, SYSTEM_SAMPLE_RATE);
        let errors = input.error_slot();
        let (capture, _consumer) = capture_ring(Box::new(input), 4800);
        h.mix.context_mut().attach_capture(capture);

        for _ in 0..3 {
            *errors.lock().unwrap() = Some("capture device lost".to_string());
            h.mix.step();
        }

        let fatal: Vec<AudioEvent> = h
            .events()
            .into_iter()
            .filter(|e| matches!(e, AudioEvent::FatalError(_)))
            .collect();
        assert_eq!(
            fatal,
            vec![AudioEvent::FatalError(
                AudioError::StreamError("capture device lost".to_string()).to_string()
            )]
        );
        // Output keeps running through the capture failure
        assert_eq!(h.log.writes(), 3);
    }

    #[test]
    fn test_silent_root_still_meters_and_counts() {
        let _mix = enter_mix_thread();
        let port = FakeOutputPort::new(2, SYSTEM_SAMPLE_RATE, 16);
        let mut h = Harness::new(stereo_config(), port, Arc::new(crate::engine::SilentNode));
        h.mix.step();
        h.mix.step();
        assert_eq!(h.shared.mix_version.get(), 2);
        assert_eq!(h.shared.peak_output.get(), 0.0);
        assert_eq!(h.log.samples().len(), 64);
    }
}
