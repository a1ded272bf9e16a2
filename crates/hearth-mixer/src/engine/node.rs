//! Output contract of the node graph
//!
//! The mixer only ever talks to the root node of the graph. How the graph
//! produces its samples (decoders, effects, attenuation) is up to the
//! implementation.

use crate::types::Sample;

/// Identifies the listener a render pass is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// A node that can render interleaved audio at the system sample rate
///
/// Nodes are shared between threads, but `output_samples` is only ever called
/// from the mix thread. Node state that changes while rendering needs interior
/// mutability.
pub trait SoundNode: Send + Sync {
    /// Render one block into `buffer`
    ///
    /// `buffer` holds `buffer.len() / channels` interleaved frames of
    /// `channels` samples and arrives zeroed. `is_mix_pass` is true for the
    /// mix thread's own render pass.
    ///
    /// Returns false if the node produced no audible data; the caller then
    /// treats the block as silence.
    fn output_samples(
        &self,
        buffer: &mut [Sample],
        channels: usize,
        listener: Option<ListenerId>,
        is_mix_pass: bool,
    ) -> bool;
}

/// Root node that never produces sound
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNode;

impl SoundNode for SilentNode {
    fn output_samples(
        &self,
        _buffer: &mut [Sample],
        _channels: usize,
        _listener: Option<ListenerId>,
        _is_mix_pass: bool,
    ) -> bool {
        false
    }
}
