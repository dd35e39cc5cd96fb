// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-point interpolation primitives
//!
//! Integer helpers shared by the scan-converter and the pixel pipeline.
//!
//! # Conventions
//!
//! - Edge X/Y state is 16.16 (`FRAC_BITS` fractional bits) held in `i64`.
//! - Vertex parameters are 32-bit fixed values whose meaning is defined by the
//!   pipeline; once interpolated they carry 16 extra fractional bits (32.16).
//! - Reciprocal depth (`w = 1/z`) is 4.28 (`W_SHIFT`).
//!
//! # Device float format
//!
//! The geometry DSPs feeding these rasterizers exchange a 32-bit float format
//! that differs from IEEE-754:
//!
//! ```text
//! 31      24 23 22                     0
//! [exponent][s][       fraction        ]
//! ```
//!
//! - Exponent: signed 8-bit, -128 encodes zero
//! - Positive (s=0): value = (1 + fraction/2^23) * 2^exponent
//! - Negative (s=1): value = (-2 + fraction/2^23) * 2^exponent

use crate::core::pipeline::depth::DepthFormat;

/// Fractional bits of edge and interpolator state
pub const FRAC_BITS: u32 = 16;

/// 1.0 in 16.16
pub const ONE: i64 = 1 << FRAC_BITS;

/// Half a pixel in 16.16 (pixel-centre bias)
pub const HALF: i64 = 0x8000;

/// Ceiling bias in 16.16
pub const CEIL_BIAS: i64 = 0xFFFF;

/// Fractional bits of the reciprocal-depth parameter
pub const W_SHIFT: u32 = 28;

/// Depth values are stored as 24-bit words
pub const DEPTH_BITS: u32 = 24;

/// Largest representable depth word
pub const DEPTH_MAX: u32 = (1 << DEPTH_BITS) - 1;

/// Device float encoding of 0.0
pub const DSP_FLOAT_ZERO: u32 = 0x8000_0000;

/// Convert an integer to 16.16
#[inline(always)]
pub fn to_fixed(value: i32) -> i64 {
    (value as i64) << FRAC_BITS
}

/// Truncate a 16.16 value to its integer part (rounds toward negative infinity)
#[inline(always)]
pub fn from_fixed(value: i64) -> i32 {
    (value >> FRAC_BITS) as i32
}

/// Round a 16.16 value up to the next integer
#[inline(always)]
pub fn ceil_fixed(value: i64) -> i32 {
    ((value + CEIL_BIAS) >> FRAC_BITS) as i32
}

/// Multiply two 16.16 values
#[inline(always)]
pub fn fixed_mul(a: i64, b: i64) -> i64 {
    ((a as i128 * b as i128) >> FRAC_BITS) as i64
}

/// Convert a float to fixed point with `frac_bits` fractional bits
///
/// Saturates at the `i32` range; NaN maps to 0.
pub fn float_to_fixed(value: f32, frac_bits: u32) -> i32 {
    (value as f64 * (1u64 << frac_bits) as f64) as i32
}

/// Convert a fixed-point value with `frac_bits` fractional bits to a float
pub fn fixed_to_float(raw: i32, frac_bits: u32) -> f32 {
    (raw as f64 / (1u64 << frac_bits) as f64) as f32
}

/// Decode a device float word into an `f32`
///
/// Bit-exact for every encodable value whose exponent fits IEEE single
/// precision; values below the normal range are computed in `f64` first.
///
/// # Examples
///
/// ```
/// use arcpoly::core::fixed::dsp_float_to_f32;
///
/// assert_eq!(dsp_float_to_f32(0x0000_0000), 1.0);
/// assert_eq!(dsp_float_to_f32(0xFF80_0000), -1.0);
/// assert_eq!(dsp_float_to_f32(0x8000_0000), 0.0);
/// ```
pub fn dsp_float_to_f32(raw: u32) -> f32 {
    let exponent = (raw >> 24) as u8 as i8 as i32;
    if exponent == -128 {
        return 0.0;
    }

    let negative = raw & 0x0080_0000 != 0;
    let fraction = raw & 0x007F_FFFF;

    // Negative values store (2 - |m|) in the fraction field; rewrite as an
    // IEEE sign/magnitude pair
    let (sign, exponent, mantissa) = if !negative {
        (0u32, exponent, fraction)
    } else if fraction == 0 {
        (1u32, exponent + 1, 0)
    } else {
        (1u32, exponent, 0x0080_0000 - fraction)
    };

    let biased = exponent + 127;
    if (1..=254).contains(&biased) {
        f32::from_bits(sign << 31 | (biased as u32) << 23 | mantissa)
    } else {
        let magnitude = (0x0080_0000 | mantissa) as f64 * 2f64.powi(exponent - 23);
        let value = magnitude as f32;
        if sign != 0 {
            -value
        } else {
            value
        }
    }
}

/// Encode an `f32` as a device float word
///
/// Denormals and NaN flush to zero; infinities and out-of-range exponents
/// saturate to the largest magnitude of the same sign.
pub fn f32_to_dsp_float(value: f32) -> u32 {
    if value == 0.0 || value.is_nan() {
        return DSP_FLOAT_ZERO;
    }

    let bits = value.to_bits();
    let negative = bits >> 31 != 0;
    let biased = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x007F_FFFF;

    if biased == 0 {
        return DSP_FLOAT_ZERO;
    }
    if biased == 255 {
        return if negative { 0x7F80_0000 } else { 0x7F7F_FFFF };
    }

    let exponent = biased - 127;
    let (exponent, sign, fraction) = if !negative {
        (exponent, 0u32, mantissa)
    } else if mantissa == 0 {
        (exponent - 1, 1u32, 0)
    } else {
        (exponent, 1u32, 0x0080_0000 - mantissa)
    };

    if exponent < -127 {
        return DSP_FLOAT_ZERO;
    }
    if exponent > 127 {
        return if negative { 0x7F80_0000 } else { 0x7F7F_FFFF };
    }

    ((exponent as i8 as u8 as u32) << 24) | (sign << 23) | fraction
}

/// Reciprocal depth `1/z` in 4.28
///
/// Depths at or behind the eye saturate to `i32::MAX`; near-plane clipping
/// keeps those out of the rasterizer.
pub fn reciprocal_z(z: f32) -> i32 {
    if z <= 0.0 || z.is_nan() {
        return i32::MAX;
    }
    float_to_fixed(1.0 / z, W_SHIFT)
}

/// Recover a 16.16 attribute from interpolated `attr·w` and `w` terms
///
/// Both inputs are 32.16 interpolator values: `attr_w` is a 16.16 attribute
/// premultiplied by `w`, and `w` is the 4.28 reciprocal depth. This is the
/// per-pixel division that makes texture mapping perspective-correct.
#[inline]
pub fn perspective_divide(attr_w: i64, w: i64) -> i32 {
    let w = w >> FRAC_BITS;
    if w <= 0 {
        return 0;
    }
    ((attr_w << (W_SHIFT - FRAC_BITS)) / w).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Encode eye-space `z` as a 24-bit depth value
///
/// - `Linear`: `z` in 16.8
/// - `Reciprocal`: `1/z` in 0.24 (z below 1.0 saturates to the nearest value)
pub fn depth_encode(z: f32, format: DepthFormat) -> u32 {
    let raw = match format {
        DepthFormat::Linear => float_to_fixed(z, 8),
        DepthFormat::Reciprocal => reciprocal_z(z) >> (W_SHIFT - DEPTH_BITS),
    };
    raw.clamp(0, DEPTH_MAX as i32) as u32
}
