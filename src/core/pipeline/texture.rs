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

//! Texture and palette store
//!
//! Texture sheets are filled through the upload path and are read-only while
//! polygons are rasterized, so one store can be shared by every render worker.
//!
//! # Texel formats
//!
//! Texels are uploaded as 16-bit words; the variant's [`TexelFormat`] decides
//! what they mean:
//!
//! - `Indexed4`: bits 0-3 index the palette (plus the polygon's palette base)
//! - `Indexed8`: bits 0-7 index the palette
//! - `Rgb555`: direct 5-5-5 color
//! - `Argb1555`: direct 5-5-5 color, bit 15 = opaque
//!
//! # Transparency
//!
//! A texel is transparent when any of these holds:
//! - the sheet has a mask and the texel's mask bit is set
//! - indexed formats: the palette entry is black (`0x000000`)
//! - `Rgb555`: the texel is `0x0000`
//! - `Argb1555`: bit 15 is clear
//!
//! # Addressing
//!
//! Coordinates are 16.16 texel units. Each axis goes through a prebuilt
//! [`WrapTable`] of length `2 * size`, indexed by the integer coordinate
//! modulo `2 * size`, that either repeats the sheet or reflects it.

use super::blend::Color;
use crate::core::error::{RenderError, Result};
use serde::{Deserialize, Serialize};

/// Meaning of uploaded texel words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TexelFormat {
    Indexed4,
    Indexed8,
    Rgb555,
    Argb1555,
}

/// Coordinate remapping for one axis of a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapTable {
    wrap: Vec<u16>,
    mirror: Vec<u16>,
}

impl WrapTable {
    /// Build both tables for an axis of `size` texels
    pub fn new(size: usize) -> Self {
        let wrap = (0..2 * size).map(|i| (i % size) as u16).collect();
        let mirror = (0..2 * size)
            .map(|i| (if i < size { i } else { 2 * size - 1 - i }) as u16)
            .collect();
        Self { wrap, mirror }
    }

    /// Map an integer texel coordinate to a texel index
    #[inline(always)]
    pub fn lookup(&self, coord: i32, mirror: bool) -> usize {
        let table = if mirror { &self.mirror } else { &self.wrap };
        table[coord.rem_euclid(table.len() as i32) as usize] as usize
    }
}

/// One texture sheet
#[derive(Debug, Clone)]
pub struct TextureSheet {
    width: usize,
    height: usize,
    texels: Vec<u16>,
    mask: Option<Vec<bool>>,
    u_table: WrapTable,
    v_table: WrapTable,
}

impl TextureSheet {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            texels: vec![0; width * height],
            mask: None,
            u_table: WrapTable::new(width),
            v_table: WrapTable::new(height),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw texel word at `(x, y)`
    pub fn texel(&self, x: usize, y: usize) -> u16 {
        self.texels[y * self.width + x]
    }

    fn check_rect(
        &self,
        sheet: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        len: usize,
    ) -> Result<()> {
        let fits_axis = |start: usize, extent: usize, size: usize| {
            start.checked_add(extent).is_some_and(|end| end <= size)
        };
        let fits = fits_axis(x, width, self.width)
            && fits_axis(y, height, self.height)
            && width.checked_mul(height) == Some(len);
        if fits {
            Ok(())
        } else {
            Err(RenderError::InvalidTextureUpload {
                sheet,
                x,
                y,
                width,
                height,
            })
        }
    }
}

/// Per-polygon texture addressing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TexelAddress {
    pub sheet: usize,
    pub palette_base: usize,
    pub mirror_u: bool,
    pub mirror_v: bool,
}

/// All texture sheets and the palette of one pipeline instance
#[derive(Debug, Clone)]
pub struct TextureStore {
    format: TexelFormat,
    sheets: Vec<TextureSheet>,
    palette: Vec<u32>,
}

impl TextureStore {
    /// Create `sheet_count` blank sheets of `width` x `height` texels and a
    /// palette of `palette_size` entries
    pub fn new(
        format: TexelFormat,
        sheet_count: usize,
        width: usize,
        height: usize,
        palette_size: usize,
    ) -> Self {
        Self {
            format,
            sheets: (0..sheet_count).map(|_| TextureSheet::new(width, height)).collect(),
            palette: vec![0; palette_size],
        }
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, id: usize) -> Option<&TextureSheet> {
        self.sheets.get(id)
    }

    pub fn palette_size(&self) -> usize {
        self.palette.len()
    }

    fn sheet_mut(&mut self, id: usize) -> Result<&mut TextureSheet> {
        self.sheets.get_mut(id).ok_or(RenderError::InvalidSheet(id))
    }

    /// Copy a rectangle of texel words into a sheet
    ///
    /// # Arguments
    ///
    /// * `sheet` - Target sheet id
    /// * `x`, `y` - Top-left texel of the destination rectangle
    /// * `width`, `height` - Rectangle size in texels
    /// * `data` - Row-major texel words, exactly `width * height` long
    ///
    /// # Returns
    ///
    /// `Ok(())` once every texel of the rectangle has been written
    ///
    /// # Errors
    ///
    /// - `InvalidSheet` for an unknown sheet id
    /// - `InvalidTextureUpload` if the rectangle leaves the sheet or `data`
    ///   is not exactly `width * height` long
    pub fn upload_texture(
        &mut self,
        sheet: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        data: &[u16],
    ) -> Result<()> {
        let target = self.sheet_mut(sheet)?;
        target.check_rect(sheet, x, y, width, height, data.len())?;

        let stride = target.width;
        for (row, src) in data.chunks_exact(width.max(1)).enumerate().take(height) {
            let start = (y + row) * stride + x;
            target.texels[start..start + width].copy_from_slice(src);
        }
        log::trace!("texture upload: sheet {} {}x{} at ({}, {})", sheet, width, height, x, y);
        Ok(())
    }

    /// Set transparency mask bits (`true` = transparent) for a rectangle
    ///
    /// # Errors
    ///
    /// Same rules as [`TextureStore::upload_texture`]
    pub fn upload_mask(
        &mut self,
        sheet: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        bits: &[bool],
    ) -> Result<()> {
        let target = self.sheet_mut(sheet)?;
        target.check_rect(sheet, x, y, width, height, bits.len())?;

        let stride = target.width;
        let size = target.width * target.height;
        let mask = target.mask.get_or_insert_with(|| vec![false; size]);
        for (row, src) in bits.chunks_exact(width.max(1)).enumerate().take(height) {
            let start = (y + row) * stride + x;
            mask[start..start + width].copy_from_slice(src);
        }
        Ok(())
    }

    /// Set one palette entry (`0x00BBGGRR`)
    pub fn set_palette(&mut self, index: usize, color: u32) -> Result<()> {
        let entry = self
            .palette
            .get_mut(index)
            .ok_or(RenderError::InvalidPaletteIndex(index))?;
        *entry = color & 0x00FF_FFFF;
        Ok(())
    }

    /// Decode the texel at integer texel coordinates, `None` if transparent
    #[inline]
    fn fetch(&self, sheet: &TextureSheet, addr: &TexelAddress, tu: i32, tv: i32) -> Option<Color> {
        let x = sheet.u_table.lookup(tu, addr.mirror_u);
        let y = sheet.v_table.lookup(tv, addr.mirror_v);
        let offset = y * sheet.width + x;

        if let Some(mask) = &sheet.mask {
            if mask[offset] {
                return None;
            }
        }

        let raw = sheet.texels[offset];
        match self.format {
            TexelFormat::Indexed4 | TexelFormat::Indexed8 => {
                let bits = if self.format == TexelFormat::Indexed4 { 0xF } else { 0xFF };
                let index = (raw & bits) as usize;
                let entry = *self.palette.get(addr.palette_base + index)?;
                if entry == 0 {
                    None
                } else {
                    Some(Color::from_u32(entry))
                }
            }
            TexelFormat::Rgb555 => {
                if raw == 0 {
                    None
                } else {
                    Some(color_from_555(raw))
                }
            }
            TexelFormat::Argb1555 => {
                if raw & 0x8000 == 0 {
                    None
                } else {
                    Some(color_from_555(raw))
                }
            }
        }
    }

    /// Point-sample at 16.16 texel coordinates `(u, v)`
    ///
    /// Returns `None` for transparent texels or an unknown sheet.
    #[inline]
    pub fn sample_nearest(&self, addr: &TexelAddress, u: i32, v: i32) -> Option<Color> {
        let sheet = self.sheets.get(addr.sheet)?;
        self.fetch(sheet, addr, u >> 16, v >> 16)
    }

    /// 2x2 bilinear sample at 16.16 texel coordinates `(u, v)`
    ///
    /// Weights use the top 8 fractional bits. A transparent top-left texel
    /// makes the whole sample transparent; other transparent neighbours take
    /// the top-left color.
    pub fn sample_bilinear(&self, addr: &TexelAddress, u: i32, v: i32) -> Option<Color> {
        let sheet = self.sheets.get(addr.sheet)?;
        let (tu, tv) = (u >> 16, v >> 16);
        let fu = ((u >> 8) & 0xFF) as u32;
        let fv = ((v >> 8) & 0xFF) as u32;

        let c00 = self.fetch(sheet, addr, tu, tv)?;
        let c10 = self.fetch(sheet, addr, tu + 1, tv).unwrap_or(c00);
        let c01 = self.fetch(sheet, addr, tu, tv + 1).unwrap_or(c00);
        let c11 = self.fetch(sheet, addr, tu + 1, tv + 1).unwrap_or(c00);

        let w00 = (256 - fu) * (256 - fv);
        let w10 = fu * (256 - fv);
        let w01 = (256 - fu) * fv;
        let w11 = fu * fv;
        let mix = |a: u8, b: u8, c: u8, d: u8| {
            ((a as u32 * w00 + b as u32 * w10 + c as u32 * w01 + d as u32 * w11) >> 16) as u8
        };

        Some(Color::new(
            mix(c00.r, c10.r, c01.r, c11.r),
            mix(c00.g, c10.g, c01.g, c11.g),
            mix(c00.b, c10.b, c01.b, c11.b),
        ))
    }
}

fn color_from_555(raw: u16) -> Color {
    let expand = |v: u16| ((v << 3) | (v >> 2)) as u8;
    Color::new(
        expand(raw & 0x1F),
        expand((raw >> 5) & 0x1F),
        expand((raw >> 10) & 0x1F),
    )
}

/// Scale a color by an 8.8 intensity (256 = unchanged), saturating
#[inline]
pub fn scale_intensity(c: Color, intensity: u16) -> Color {
    let scale = |v: u8| ((v as u32 * intensity as u32) >> 8).min(255) as u8;
    Color::new(scale(c.r), scale(c.g), scale(c.b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_store() -> TextureStore {
        // 4x4 Rgb555 sheet where red = 8 * x, green = 8 * y (5-bit)
        let mut store = TextureStore::new(TexelFormat::Rgb555, 1, 4, 4, 0);
        let data: Vec<u16> = (0..16)
            .map(|i| {
                let (x, y) = (i % 4, i / 4);
                (8 * x as u16 + 1) | (8 * y as u16 + 1) << 5
            })
            .collect();
        store.upload_texture(0, 0, 0, 4, 4, &data).unwrap();
        store
    }

    #[test]
    fn test_wrap_table_repeat_and_mirror() {
        let table = WrapTable::new(4);
        let wrapped: Vec<usize> = (-2..10).map(|c| table.lookup(c, false)).collect();
        assert_eq!(wrapped, vec![2, 3, 0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
        let mirrored: Vec<usize> = (0..10).map(|c| table.lookup(c, true)).collect();
        assert_eq!(mirrored, vec![0, 1, 2, 3, 3, 2, 1, 0, 0, 1]);
    }

    #[test]
    fn test_upload_bounds() {
        let mut store = TextureStore::new(TexelFormat::Rgb555, 2, 8, 8, 0);
        assert!(store.upload_texture(1, 4, 4, 4, 4, &[1; 16]).is_ok());
        assert!(matches!(
            store.upload_texture(1, 5, 4, 4, 4, &[1; 16]),
            Err(RenderError::InvalidTextureUpload { sheet: 1, x: 5, .. })
        ));
        assert!(matches!(
            store.upload_texture(0, 0, 0, 2, 2, &[1; 3]),
            Err(RenderError::InvalidTextureUpload { .. })
        ));
        assert!(matches!(
            store.upload_texture(2, 0, 0, 1, 1, &[1]),
            Err(RenderError::InvalidSheet(2))
        ));
        assert_eq!(store.sheet(1).unwrap().texel(7, 7), 1);
    }

    #[test]
    fn test_upload_rect_overflow_is_rejected() {
        let mut store = TextureStore::new(TexelFormat::Rgb555, 1, 8, 8, 0);
        assert!(matches!(
            store.upload_texture(0, usize::MAX, 0, 2, 1, &[1, 1]),
            Err(RenderError::InvalidTextureUpload { .. })
        ));
        assert!(matches!(
            store.upload_mask(0, 0, usize::MAX, 1, 2, &[true, true]),
            Err(RenderError::InvalidTextureUpload { .. })
        ));
        assert!(matches!(
            store.upload_texture(0, 0, 0, usize::MAX, 2, &[1, 1]),
            Err(RenderError::InvalidTextureUpload { .. })
        ));
    }

    #[test]
    fn test_palette_lookup_and_transparency() {
        let mut store = TextureStore::new(TexelFormat::Indexed4, 1, 2, 1, 32);
        store.upload_texture(0, 0, 0, 2, 1, &[0x3, 0x1]).unwrap();
        store.set_palette(16 + 3, 0x00FF_0000).unwrap();
        store.set_palette(16 + 1, 0).unwrap();
        assert!(matches!(store.set_palette(32, 0), Err(RenderError::InvalidPaletteIndex(32))));

        let addr = TexelAddress {
            palette_base: 16,
            ..Default::default()
        };
        assert_eq!(store.sample_nearest(&addr, 0, 0), Some(Color::new(0, 0, 0xFF)));
        // Black palette entry is transparent
        assert_eq!(store.sample_nearest(&addr, 1 << 16, 0), None);
    }

    #[test]
    fn test_mask_makes_texels_transparent() {
        let mut store = gradient_store();
        let addr = TexelAddress::default();
        assert!(store.sample_nearest(&addr, 1 << 16, 1 << 16).is_some());
        store.upload_mask(0, 1, 1, 1, 1, &[true]).unwrap();
        assert!(store.sample_nearest(&addr, 1 << 16, 1 << 16).is_none());
        assert!(store.sample_nearest(&addr, 2 << 16, 1 << 16).is_some());
    }

    #[test]
    fn test_argb1555_alpha_bit() {
        let mut store = TextureStore::new(TexelFormat::Argb1555, 1, 2, 1, 0);
        store.upload_texture(0, 0, 0, 2, 1, &[0x801F, 0x001F]).unwrap();
        let addr = TexelAddress::default();
        assert_eq!(store.sample_nearest(&addr, 0, 0), Some(Color::new(0xFF, 0, 0)));
        assert_eq!(store.sample_nearest(&addr, 1 << 16, 0), None);
    }

    #[test]
    fn test_nearest_sampling_wraps_and_mirrors() {
        let store = gradient_store();
        let wrap = TexelAddress::default();
        let mirror = TexelAddress {
            mirror_u: true,
            ..Default::default()
        };
        let at_5 = store.sample_nearest(&wrap, 5 << 16, 0).unwrap();
        let at_1 = store.sample_nearest(&wrap, 1 << 16, 0).unwrap();
        assert_eq!(at_5, at_1);

        let mirrored_5 = store.sample_nearest(&mirror, 5 << 16, 0).unwrap();
        let at_2 = store.sample_nearest(&wrap, 2 << 16, 0).unwrap();
        assert_eq!(mirrored_5, at_2);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let store = gradient_store();
        let addr = TexelAddress::default();
        let a = store.sample_nearest(&addr, 1 << 16, 1 << 16).unwrap();
        let b = store.sample_nearest(&addr, 2 << 16, 1 << 16).unwrap();
        let mid = store.sample_bilinear(&addr, (1 << 16) + 0x8000, 1 << 16).unwrap();
        assert_eq!(mid.r as u32, (a.r as u32 + b.r as u32) / 2);
        assert_eq!(mid.g, a.g);

        // Zero fraction reproduces the texel exactly
        assert_eq!(store.sample_bilinear(&addr, 1 << 16, 1 << 16), Some(a));
    }

    #[test]
    fn test_bilinear_transparent_top_left() {
        let mut store = gradient_store();
        store.upload_mask(0, 0, 0, 1, 1, &[true]).unwrap();
        let addr = TexelAddress::default();
        assert_eq!(store.sample_bilinear(&addr, 0x8000, 0x8000), None);
    }

    #[test]
    fn test_scale_intensity() {
        let c = Color::new(200, 100, 0);
        assert_eq!(scale_intensity(c, 256), c);
        assert_eq!(scale_intensity(c, 128), Color::new(100, 50, 0));
        assert_eq!(scale_intensity(c, 512), Color::new(255, 200, 0));
    }
}
