//! Sample conversion and the soft-clip nonlinearity.

use crate::constants::INT24_MAX_F;

use super::intrinsics::saturate24;

/// Level where [`soft_clip`] leaves the identity region.
pub const SOFT_CLIP_KNEE: f32 = 0.95;

const INV_INT24_MAX: f32 = 1.0 / INT24_MAX_F;

/// 24-bit fixed point to nominal `-1.0..=1.0`.
#[inline(always)]
pub fn to_float(sample: i32) -> f32 {
    sample as f32 * INV_INT24_MAX
}

/// Nominal `-1.0..=1.0` back to 24-bit fixed point, truncating toward zero.
///
/// Anything beyond full scale saturates to the 24-bit range.
#[inline(always)]
pub fn to_fixed(x: f32) -> i32 {
    saturate24((x * INT24_MAX_F) as i32)
}

/// Saturating curve that is the identity up to the knee.
///
/// Above `|x| = 0.95` the excess `e` is compressed to `e / (1 + e²)`. Value
/// and slope are continuous at the knee and the curve is odd. The excess term
/// peaks at `0.5`, so the result is bounded by `1.45`; [`to_fixed`] clamps
/// what is left above full scale.
#[inline(always)]
pub fn soft_clip(x: f32) -> f32 {
    let magnitude = libm::fabsf(x);
    if magnitude <= SOFT_CLIP_KNEE {
        return x;
    }
    let excess = magnitude - SOFT_CLIP_KNEE;
    libm::copysignf(SOFT_CLIP_KNEE + excess / (1.0 + excess * excess), x)
}
