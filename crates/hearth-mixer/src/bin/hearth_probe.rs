//! hearth-probe - plays a test tone through the configured output device
//!
//! Loads `{config_dir}/hearth/mixer.yaml` (defaults if missing), starts the
//! mixer with a sine-tone root node and logs the meters once per second.
//!
//! ## Command line flags
//!
//! - `--seconds N`: how long to play (default 3)
//! - `--list-devices`: print output and input devices, then exit
//! - `--mic`: also capture the default input and log its peak

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use hearth_mixer::audio::{list_devices, CpalBackend, StreamDirection};
use hearth_mixer::config::{default_config_path, load_config, MixerConfig, MIXER_CONFIG_FILE};
use hearth_mixer::engine::{AudioEvent, AudioMixer, ListenerId, SoundNode};
use hearth_mixer::{Sample, SYSTEM_SAMPLE_RATE};

const TONE_HZ: f32 = 440.0;
const TONE_GAIN: f32 = 0.2;
const TICK: Duration = Duration::from_millis(10);

/// Sine on every channel
struct ToneNode {
    phase: Mutex<f32>,
}

impl SoundNode for ToneNode {
    fn output_samples(
        &self,
        buffer: &mut [Sample],
        channels: usize,
        _listener: Option<ListenerId>,
        _is_mix_pass: bool,
    ) -> bool {
        let Ok(mut phase) = self.phase.lock() else {
            return false;
        };
        let step = TAU * TONE_HZ / SYSTEM_SAMPLE_RATE as f32;
        for frame in buffer.chunks_exact_mut(channels) {
            frame.fill(phase.sin() * TONE_GAIN);
            *phase = (*phase + step) % TAU;
        }
        true
    }
}

fn print_devices() -> Result<()> {
    for direction in [StreamDirection::Output, StreamDirection::Input] {
        println!("{} devices:", direction);
        for device in list_devices(direction).context("Failed to enumerate devices")? {
            println!("  {}", device);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if args.iter().any(|arg| arg == "--list-devices") {
        return print_devices();
    }

    let seconds: u64 = match args.iter().position(|arg| arg == "--seconds") {
        Some(i) => args
            .get(i + 1)
            .context("--seconds needs a value")?
            .parse()
            .context("--seconds must be a whole number")?,
        None => 3,
    };
    let with_mic = args.iter().any(|arg| arg == "--mic");

    let config_path = default_config_path(MIXER_CONFIG_FILE);
    let config: MixerConfig = load_config(&config_path);
    log::info!("hearth-probe starting ({}s)", seconds);

    let backend = CpalBackend::new(config.audio.clone());
    let sink = |event: AudioEvent| match event {
        AudioEvent::Clipping => log::warn!("Output clipped"),
        AudioEvent::FatalError(message) => log::error!("Audio device failed: {}", message),
        AudioEvent::MicrophoneUncompressed { channels, samples } => {
            log::trace!("Captured {} frames", samples.len() / channels.max(1))
        }
        AudioEvent::MicrophoneCompressed(bytes) => log::trace!("Encoded {} bytes", bytes.len()),
    };

    let mut mixer = AudioMixer::new(config, Box::new(backend), Box::new(sink));
    mixer
        .start_mixing(Arc::new(ToneNode { phase: Mutex::new(0.0) }))
        .context("Failed to start mixer")?;
    if with_mic {
        mixer
            .set_microphone_uncompressed(true)
            .context("Failed to start microphone capture")?;
    }

    let start = Instant::now();
    let mut last_report = start;
    while start.elapsed() < Duration::from_secs(seconds) {
        mixer.update();
        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            log::info!(
                "peak {:.3} rms {:.3} | {} ch (device {}) | resampling {} | blocks {}",
                mixer.peak_output_volume(),
                mixer.rms_output_volume(),
                mixer.output_channels(),
                mixer.device_channels(),
                mixer.is_resampling(),
                mixer.mix_version()
            );
            if with_mic {
                log::info!("input peak {:.3}", mixer.peak_input_volume());
            }
        }
        std::thread::sleep(TICK);
    }

    mixer.shut_down();
    log::info!("hearth-probe done");
    Ok(())
}
