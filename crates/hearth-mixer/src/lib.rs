//! Hearth Mixer - real-time audio mixing core
//!
//! Combines a node graph into one interleaved output stream on a dedicated
//! mix thread, while a control thread drives it through lock-free task queues
//! and single-writer shared values.
//!
//! # Threads
//!
//! - **Control thread** owns the [`AudioMixer`](engine::AudioMixer), calls its
//!   setters and pumps `update()` once per tick
//! - **Mix thread** renders the root node, converts channels and rates,
//!   meters, ramps and writes to the device ring
//! - **Device callback** (backend) drains the ring
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hearth_mixer::audio::{AudioConfig, CpalBackend};
//! use hearth_mixer::config::MixerConfig;
//! use hearth_mixer::engine::{AudioEvent, AudioMixer};
//!
//! let backend = CpalBackend::new(AudioConfig::default());
//! let sink = |event: AudioEvent| log::info!("{:?}", event);
//! let mut mixer = AudioMixer::new(MixerConfig::default(), Box::new(backend), Box::new(sink));
//! mixer.start_mixing(Arc::new(my_graph))?;
//! loop {
//!     mixer.update();
//! }
//! ```

pub mod audio;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod frame;
pub mod sync;
pub mod types;

pub use types::*;
