//! Audio backend contracts
//!
//! The mixer talks to hardware through three traits:
//!
//! - [`AudioBackend`] lives on the control thread. It opens devices, starts and
//!   stops streams, and hands out ports.
//! - [`OutputPort`] is moved onto the mix thread. It wraps the producer side of
//!   the ring buffer the hardware callback drains.
//! - [`InputPort`] is moved onto the mix thread when microphone capture is on.
//!   It wraps the consumer side of the capture ring buffer.
//!
//! Streams themselves stay with the backend, so platform stream handles never
//! have to cross threads.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{AudioError, AudioResult};
use crate::types::Sample;

/// Which side of the device a stream serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    Output,
    Input,
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDirection::Output => write!(f, "output"),
            StreamDirection::Input => write!(f, "input"),
        }
    }
}

/// Lifecycle of one backend stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    /// Not opened
    #[default]
    Closed,
    /// Opened but not playing
    Stopped,
    /// Playing
    Running,
    /// The device reported an error
    Failed,
}

/// How much audio the backend keeps queued ahead of the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LatencyMode {
    /// Keep the ring buffer shallow (interactive use)
    #[default]
    Low,
    /// Queue more audio to survive scheduling hiccups
    High,
}

impl LatencyMode {
    /// Target queued duration for this mode
    pub fn target_duration(&self) -> Duration {
        match self {
            LatencyMode::Low => Duration::from_millis(20),
            LatencyMode::High => Duration::from_millis(80),
        }
    }

    /// Target queued frames at a given sample rate
    pub fn target_frames(&self, sample_rate: u32) -> usize {
        (sample_rate as u128 * self.target_duration().as_millis() / 1000) as usize
    }
}

/// Producer side of the hardware output ring, owned by the mix thread
pub trait OutputPort: Send {
    /// Interleaved channel count of the device stream
    fn channels(&self) -> usize;

    /// Device sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Interleaved samples that can be written without overrunning the
    /// latency target
    fn write_available(&self) -> usize;

    /// Write interleaved samples, returning how many were accepted
    fn write(&mut self, samples: &[Sample]) -> AudioResult<usize>;

    /// Block until the hardware has consumed some output or `timeout` elapses
    fn wait_until_output_needed(&self, timeout: Duration);

    /// Change how much audio is queued ahead of the hardware
    fn set_latency(&mut self, mode: LatencyMode);

    /// Error reported by the device since the last call, if any
    fn take_error(&mut self) -> Option<AudioError>;
}

/// Consumer side of the capture ring, owned by the mix thread
pub trait InputPort: Send {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Append every captured interleaved sample to `out`
    ///
    /// Returns the number of samples appended.
    fn read_available(&mut self, out: &mut Vec<Sample>) -> usize;

    /// Error reported by the capture device since the last call, if any
    fn take_error(&mut self) -> Option<AudioError>;
}

/// Device and stream management, owned by the control thread
pub trait AudioBackend {
    /// Open the requested directions
    ///
    /// Opening a direction that is already open replaces its stream, and ports
    /// taken from the old stream stop receiving data.
    fn initialize(&mut self, wants_output: bool, wants_input: bool) -> AudioResult<()>;

    /// Take the output port of the opened output stream
    fn take_output_port(&mut self) -> Option<Box<dyn OutputPort>>;

    /// Take the input port of the opened input stream
    fn take_input_port(&mut self) -> Option<Box<dyn InputPort>>;

    fn start_streams(&mut self, direction: StreamDirection) -> AudioResult<()>;

    fn stop_streams(&mut self, direction: StreamDirection);

    fn stream_status(&self, direction: StreamDirection) -> StreamStatus;

    /// Close every stream
    fn shut_down(&mut self);
}
