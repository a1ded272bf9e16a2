//! Engine-visible notifications and the encoder collaborator
//!
//! Everything the mix thread wants the rest of the engine to know is turned
//! into an [`AudioEvent`] and surfaced on the control thread during
//! `AudioMixer::update`.

use crate::audio::AudioResult;
use crate::sync::AudioTask;
use crate::types::Sample;

/// Notification raised on the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Output exceeded full scale and was clamped
    Clipping,
    /// The output device failed; the owner decides whether to restart
    FatalError(String),
    /// Raw captured microphone audio at the system rate
    MicrophoneUncompressed { channels: usize, samples: Vec<Sample> },
    /// One encoded microphone packet
    MicrophoneCompressed(Vec<u8>),
}

/// Receiver of [`AudioEvent`]s, owned by the control thread
pub trait EventSink: Send {
    fn dispatch(&mut self, event: AudioEvent);
}

impl<F> EventSink for F
where
    F: FnMut(AudioEvent) + Send,
{
    fn dispatch(&mut self, event: AudioEvent) {
        self(event)
    }
}

/// Task executed on the control thread during `update()`
pub type GameTask = AudioTask<dyn EventSink>;

/// Lossy encoder for compressed microphone streaming
///
/// Encoding happens on the control thread only.
pub trait PacketEncoder: Send {
    /// Prepare (or reset) the encoder state
    fn initialize(&mut self) -> AudioResult<()>;

    /// Encode one packet of mono samples at the system rate
    fn encode_packet(&mut self, mono: &[Sample]) -> AudioResult<Vec<u8>>;
}
