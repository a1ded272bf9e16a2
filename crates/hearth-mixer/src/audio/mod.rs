//! Audio backend layer
//!
//! Hardware access is split so the real-time side never touches a platform
//! stream handle:
//!
//! - **Control thread**: owns an [`AudioBackend`], opens devices and starts/stops streams
//! - **Mix thread**: owns an [`OutputPort`] (and an [`InputPort`] while capturing)
//! - **Device callback**: drains/fills lock-free rings shared with the ports
//!
//! With the `cpal-backend` feature, [`CpalBackend`] provides the
//! cross-platform implementation. Without it, any type implementing the traits
//! can drive the mixer (tests use in-memory fakes).
//!
//! # Example Usage
//!
//! ```ignore
//! use hearth_mixer::audio::{AudioConfig, CpalBackend};
//!
//! let backend = CpalBackend::new(AudioConfig::default());
//! let mixer = AudioMixer::new(MixerConfig::default(), Box::new(backend), Box::new(sink));
//! ```

mod backend;
mod config;
mod error;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;
#[cfg(feature = "cpal-backend")]
mod device;

pub use backend::{AudioBackend, InputPort, LatencyMode, OutputPort, StreamDirection, StreamStatus};
pub use config::{AudioConfig, BufferSize, DeviceId, MAX_BUFFER_SIZE};
pub use error::{AudioError, AudioResult};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{CpalBackend, CpalInputPort, CpalOutputPort};
#[cfg(feature = "cpal-backend")]
pub use device::{default_device, find_device, list_devices, AudioDevice};
