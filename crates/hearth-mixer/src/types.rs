//! Common types for Hearth
//!
//! Fundamental constants and sample types shared by the frame math, the DSP
//! helpers and the mix thread.

/// Internal processing rate of the mixer (48kHz)
///
/// The node graph always renders at this rate. If the output device runs at a
/// different rate the mix thread resamples every block.
pub const SYSTEM_SAMPLE_RATE: u32 = 48000;

/// Maximum number of channels in a frame (7.1)
pub const MAX_CHANNELS: usize = 8;

/// Length of mute/unmute volume ramps in frames (20ms at 48kHz)
pub const PROPERTY_CHANGE_FRAMES: u32 = SYSTEM_SAMPLE_RATE / 50;

/// Mono frames per compressed microphone packet (20ms at 48kHz)
pub const PACKET_FRAMES: usize = 960;

/// Default volume below which node collaborators may treat a source as silent
pub const DEFAULT_MINIMUM_VOLUME_THRESHOLD: f32 = 0.015;

/// Cutoff of the low-pass filter that derives the LFE channel
pub const LFE_CUTOFF_HZ: f32 = 120.0;

/// Scale used for the 16-bit RMS accumulator
pub const RMS_SCALE: f32 = ((1 << 15) - 1) as f32;

/// Audio sample type (32-bit float)
pub type Sample = f32;

/// Canonical channel slots of an [`AudioFrame`](crate::frame::AudioFrame)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Channel {
    FrontLeft = 0,
    FrontRight = 1,
    Center = 2,
    LowFrequency = 3,
    SideLeft = 4,
    SideRight = 5,
    BackLeft = 6,
    BackRight = 7,
}

impl Channel {
    /// All slots in canonical order
    pub const ALL: [Channel; MAX_CHANNELS] = [
        Channel::FrontLeft,
        Channel::FrontRight,
        Channel::Center,
        Channel::LowFrequency,
        Channel::SideLeft,
        Channel::SideRight,
        Channel::BackLeft,
        Channel::BackRight,
    ];

    /// Slot index in the canonical layout
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short display name
    pub fn name(&self) -> &'static str {
        match self {
            Channel::FrontLeft => "FL",
            Channel::FrontRight => "FR",
            Channel::Center => "C",
            Channel::LowFrequency => "LFE",
            Channel::SideLeft => "SL",
            Channel::SideRight => "SR",
            Channel::BackLeft => "BL",
            Channel::BackRight => "BR",
        }
    }
}

/// True if an interleaved layout with this many channels carries an LFE slot
#[inline]
pub fn has_lfe(channels: usize) -> bool {
    channels == 6 || channels == 8
}

/// Clamp a requested channel count into `[1, MAX_CHANNELS]`
///
/// Out-of-range counts are a caller bug: they assert in debug builds and fall
/// back to mono in release builds.
#[inline]
pub fn sanitize_channels(channels: usize) -> usize {
    debug_assert!(
        (1..=MAX_CHANNELS).contains(&channels),
        "channel count {} outside [1, {}]",
        channels,
        MAX_CHANNELS
    );
    if (1..=MAX_CHANNELS).contains(&channels) {
        channels
    } else {
        1
    }
}
