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

//! Framebuffer pixel formats and blending
//!
//! Pixels are stored as `u32` words whatever the variant's format, so the
//! compositor and the pipeline share one buffer type.
//!
//! # 15-bit layout
//!
//! - Bits 0-4: Red
//! - Bits 5-9: Green
//! - Bits 10-14: Blue
//! - Bit 15: Pen bit (`Rgb555Pen` sets it on every written pixel)

use serde::{Deserialize, Serialize};

/// 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Decode a command-stream color word (`0x00BBGGRR`)
    ///
    /// # Examples
    ///
    /// ```
    /// use arcpoly::core::pipeline::blend::Color;
    ///
    /// let color = Color::from_u32(0xFF8040);
    /// assert_eq!(color, Color::new(0x40, 0x80, 0xFF));
    /// ```
    pub fn from_u32(value: u32) -> Self {
        Self {
            r: (value & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: ((value >> 16) & 0xFF) as u8,
        }
    }

    /// Encode as a command-stream color word (`0x00BBGGRR`)
    pub fn to_u32(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16
    }
}

/// 4x4 ordered dither offsets, indexed `[y & 3][x & 3]`
const DITHER_TABLE: [[i16; 4]; 4] = [
    [-4, 0, -3, 1],
    [2, -2, 3, -1],
    [-3, 1, -4, 0],
    [3, -1, 2, -2],
];

/// Framebuffer pixel format of a hardware variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 5-5-5 RGB
    Rgb555,
    /// 5-5-5 RGB with bit 15 set on every written pixel
    Rgb555Pen,
    /// 8-8-8-8 ARGB, alpha always 0xFF when written
    Argb8888,
}

impl PixelFormat {
    /// Pack a color into a framebuffer word (channels truncated)
    #[inline]
    pub fn pack(self, c: Color) -> u32 {
        match self {
            PixelFormat::Rgb555 => pack_555(c.r, c.g, c.b),
            PixelFormat::Rgb555Pen => pack_555(c.r, c.g, c.b) | 0x8000,
            PixelFormat::Argb8888 => {
                0xFF00_0000 | (c.r as u32) << 16 | (c.g as u32) << 8 | c.b as u32
            }
        }
    }

    /// Pack with 4x4 ordered dithering at pixel `(x, y)`
    ///
    /// 32-bit formats have no precision to recover and are packed as is.
    #[inline]
    pub fn pack_dithered(self, c: Color, x: i32, y: i32) -> u32 {
        if self == PixelFormat::Argb8888 {
            return self.pack(c);
        }
        let offset = DITHER_TABLE[(y & 3) as usize][(x & 3) as usize];
        let dither = |v: u8| (v as i16 + offset).clamp(0, 255) as u8;
        self.pack(Color::new(dither(c.r), dither(c.g), dither(c.b)))
    }

    /// Expand a framebuffer word to 24-bit color
    #[inline]
    pub fn unpack(self, word: u32) -> Color {
        match self {
            PixelFormat::Rgb555 | PixelFormat::Rgb555Pen => {
                let expand = |v: u32| ((v << 3) | (v >> 2)) as u8;
                Color::new(
                    expand(word & 0x1F),
                    expand((word >> 5) & 0x1F),
                    expand((word >> 10) & 0x1F),
                )
            }
            PixelFormat::Argb8888 => Color::new((word >> 16) as u8, (word >> 8) as u8, word as u8),
        }
    }

    /// Convert a framebuffer word to opaque ARGB8888 for display
    #[inline]
    pub fn to_argb8888(self, word: u32) -> u32 {
        let c = self.unpack(word);
        0xFF00_0000 | (c.r as u32) << 16 | (c.g as u32) << 8 | c.b as u32
    }

    fn channel_layout(self) -> (&'static [u32], u32) {
        match self {
            PixelFormat::Rgb555 | PixelFormat::Rgb555Pen => (&[0, 5, 10], 0x1F),
            PixelFormat::Argb8888 => (&[0, 8, 16], 0xFF),
        }
    }

    /// Bits kept from the source word regardless of blending
    fn fixed_bits(self, src: u32) -> u32 {
        match self {
            PixelFormat::Rgb555 => 0,
            PixelFormat::Rgb555Pen => src & 0x8000,
            PixelFormat::Argb8888 => 0xFF00_0000,
        }
    }
}

#[inline(always)]
fn pack_555(r: u8, g: u8, b: u8) -> u32 {
    (r as u32 >> 3) | (g as u32 >> 3) << 5 | (b as u32 >> 3) << 10
}

/// Color blending rule between a new pixel and the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Replace the framebuffer pixel
    #[default]
    Opaque,
    /// 50% mix by halving and summing masked channel groups
    Half,
    /// Source weighted by a 5-bit factor: `(s*f + d*(31-f)) / 31`
    Translucent(u8),
    /// Per-channel saturating add
    Additive,
}

impl BlendMode {
    /// Blend packed source `src` over packed destination `dst`
    ///
    /// # Examples
    ///
    /// ```
    /// use arcpoly::core::pipeline::blend::{BlendMode, PixelFormat};
    ///
    /// let grey = BlendMode::Half.apply(PixelFormat::Rgb555, 0x7FFF, 0x0000);
    /// assert_eq!(grey, 0x3DEF);
    /// ```
    #[inline]
    pub fn apply(self, format: PixelFormat, src: u32, dst: u32) -> u32 {
        let keep = format.fixed_bits(src);
        match self {
            BlendMode::Opaque => src,
            BlendMode::Half => {
                let mask = match format {
                    PixelFormat::Rgb555 | PixelFormat::Rgb555Pen => 0x7BDE,
                    PixelFormat::Argb8888 => 0x00FE_FEFE,
                };
                (((src & mask) + (dst & mask)) >> 1) | keep
            }
            BlendMode::Translucent(factor) => {
                let f = factor.min(31) as u32;
                Self::per_channel(format, src, dst, |s, d, _| (s * f + d * (31 - f)) / 31) | keep
            }
            BlendMode::Additive => {
                Self::per_channel(format, src, dst, |s, d, max| (s + d).min(max)) | keep
            }
        }
    }

    fn per_channel(
        format: PixelFormat,
        src: u32,
        dst: u32,
        op: impl Fn(u32, u32, u32) -> u32,
    ) -> u32 {
        let (shifts, max) = format.channel_layout();
        shifts.iter().fold(0, |acc, &shift| {
            let s = (src >> shift) & max;
            let d = (dst >> shift) & max;
            acc | (op(s, d, max) & max) << shift
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_formats() {
        let c = Color::new(0xFF, 0x80, 0x08);
        assert_eq!(PixelFormat::Rgb555.pack(c), 0x1F | 0x10 << 5 | 0x01 << 10);
        assert_eq!(PixelFormat::Rgb555Pen.pack(c) & 0x8000, 0x8000);
        assert_eq!(PixelFormat::Argb8888.pack(c), 0xFFFF_8008);
    }

    #[test]
    fn test_unpack_expands_555() {
        let white = PixelFormat::Rgb555.unpack(0x7FFF);
        assert_eq!(white, Color::WHITE);
        let c = PixelFormat::Argb8888.unpack(0xFF12_3456);
        assert_eq!(c, Color::new(0x12, 0x34, 0x56));
    }

    #[test]
    fn test_dither_varies_by_position() {
        let c = Color::new(0x86, 0x86, 0x86);
        let a = PixelFormat::Rgb555.pack_dithered(c, 0, 0); // -4
        let b = PixelFormat::Rgb555.pack_dithered(c, 2, 1); // +3
        assert_eq!(a & 0x1F, 0x82 >> 3);
        assert_eq!(b & 0x1F, 0x89 >> 3);
        assert_ne!(a, b);
        assert_eq!(PixelFormat::Argb8888.pack_dithered(c, 0, 0), PixelFormat::Argb8888.pack(c));
    }

    #[test]
    fn test_dither_clamps_at_extremes() {
        let black = PixelFormat::Rgb555.pack_dithered(Color::BLACK, 0, 0);
        let white = PixelFormat::Rgb555.pack_dithered(Color::WHITE, 2, 1);
        assert_eq!(black, 0);
        assert_eq!(white, 0x7FFF);
    }

    #[test]
    fn test_half_blend() {
        assert_eq!(BlendMode::Half.apply(PixelFormat::Rgb555, 0x7FFF, 0x0000), 0x3DEF);
        // Pen bit comes from the source
        assert_eq!(BlendMode::Half.apply(PixelFormat::Rgb555Pen, 0xFFFF, 0x0000), 0xBDEF);
        assert_eq!(
            BlendMode::Half.apply(PixelFormat::Argb8888, 0xFFFF_FFFF, 0xFF00_0000),
            0xFF7F_7F7F
        );
    }

    #[test]
    fn test_translucent_blend() {
        let fmt = PixelFormat::Rgb555;
        assert_eq!(BlendMode::Translucent(31).apply(fmt, 0x7FFF, 0x0000), 0x7FFF);
        assert_eq!(BlendMode::Translucent(0).apply(fmt, 0x7FFF, 0x1234), 0x1234);
        // 10/31 of 31 = 10 per channel
        let c = BlendMode::Translucent(10).apply(fmt, 0x7FFF, 0x0000);
        assert_eq!(c, 10 | 10 << 5 | 10 << 10);
    }

    #[test]
    fn test_additive_saturates() {
        let fmt = PixelFormat::Rgb555;
        let c = BlendMode::Additive.apply(fmt, 20 | 5 << 5, 20 | 5 << 5);
        assert_eq!(c, 31 | 10 << 5);
    }
}
