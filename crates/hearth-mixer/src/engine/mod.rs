//! Mixing engine - root node contract, mix thread and control API
//!
//! - [`SoundNode`]: what the mixer pulls audio from
//! - [`MixContext`]: mix-thread state, target of game→mix tasks
//! - [`AudioMixer`]: lifecycle and control-thread setters/getters
//! - Microphone capture (mix side) and dispatch (control side)
//! - [`AudioEvent`]: notifications surfaced during `AudioMixer::update`

mod events;
mod microphone;
mod mix_loop;
mod mixer;
mod node;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{AudioEvent, EventSink, GameTask, PacketEncoder};
pub use microphone::{MicCapture, MicDispatch};
pub use mix_loop::{MixContext, MixLoop, MixOutcome};
pub use mixer::{AudioMixer, MixerState};
pub use node::{ListenerId, SilentNode, SoundNode};
pub use state::SharedState;
