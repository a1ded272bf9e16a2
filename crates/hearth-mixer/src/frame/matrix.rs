//! Channel translation tables
//!
//! Each down-mix matrix has one row per *output* channel (in the interleaved
//! order of that layout) and one column per canonical slot:
//! FrontLeft, FrontRight, Center, LowFrequency, SideLeft, SideRight, BackLeft, BackRight.

use std::f32::consts::FRAC_1_SQRT_2 as INV_SQRT2;

use crate::types::{Channel, MAX_CHANNELS};

type Row = [f32; MAX_CHANNELS];

pub const DOWNMIX_1: [Row; 1] = [[INV_SQRT2, INV_SQRT2, 1.0, 0.0, 0.5, 0.5, 0.5, 0.5]];

pub const DOWNMIX_2: [Row; 2] = [
    [1.0, 0.0, INV_SQRT2, 0.0, INV_SQRT2, 0.0, INV_SQRT2, 0.0],
    [0.0, 1.0, INV_SQRT2, 0.0, 0.0, INV_SQRT2, 0.0, INV_SQRT2],
];

pub const DOWNMIX_3: [Row; 3] = [
    [1.0, 0.0, 0.0, 0.0, INV_SQRT2, 0.0, INV_SQRT2, 0.0],
    [0.0, 1.0, 0.0, 0.0, 0.0, INV_SQRT2, 0.0, INV_SQRT2],
    [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
];

pub const DOWNMIX_4: [Row; 4] = [
    [1.0, 0.0, INV_SQRT2, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, INV_SQRT2, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0],
];

pub const DOWNMIX_5: [Row; 5] = [
    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0],
];

pub const DOWNMIX_6: [Row; 6] = [
    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0],
];

pub const DOWNMIX_7: [Row; 7] = [
    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
];

/// Down-mix matrix for a target channel count in `[1, 7]`
///
/// Eight output channels never down-mix (nothing has more than eight), so
/// there is no table for it.
pub fn downmix_matrix(output_channels: usize) -> &'static [Row] {
    match output_channels {
        1 => &DOWNMIX_1,
        2 => &DOWNMIX_2,
        3 => &DOWNMIX_3,
        4 => &DOWNMIX_4,
        5 => &DOWNMIX_5,
        6 => &DOWNMIX_6,
        _ => &DOWNMIX_7,
    }
}

use Channel::*;

/// Canonical slot for each interleaved channel of a layout
///
/// A quad source is FL/FR/BL/BR, 5.0 is FL/FR/C/SL/SR, 7.1 uses every slot.
pub fn layout(channels: usize) -> &'static [Channel] {
    const MONO: [Channel; 1] = [FrontLeft];
    const STEREO: [Channel; 2] = [FrontLeft, FrontRight];
    const THREE: [Channel; 3] = [FrontLeft, FrontRight, Center];
    const QUAD: [Channel; 4] = [FrontLeft, FrontRight, BackLeft, BackRight];
    const FIVE: [Channel; 5] = [FrontLeft, FrontRight, Center, SideLeft, SideRight];
    const FIVE_ONE: [Channel; 6] = [FrontLeft, FrontRight, Center, LowFrequency, SideLeft, SideRight];
    const SEVEN: [Channel; 7] = [FrontLeft, FrontRight, Center, SideLeft, SideRight, BackLeft, BackRight];

    match channels {
        1 => &MONO,
        2 => &STEREO,
        3 => &THREE,
        4 => &QUAD,
        5 => &FIVE,
        6 => &FIVE_ONE,
        7 => &SEVEN,
        _ => &Channel::ALL,
    }
}
