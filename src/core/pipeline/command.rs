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

//! Polygon records and the command-stream decoder
//!
//! The external driver turns register writes into a stream of 32-bit words;
//! [`CommandDecoder`] turns that stream into [`PolygonRecord`]s once, so later
//! stages only ever match on the record variant.
//!
//! # Word stream format
//!
//! Every record starts with a header word whose top byte is the tag.
//!
//! | Tag    | Record        | Words                                          |
//! |--------|---------------|------------------------------------------------|
//! | `0x01` | Flat          | header, attrs(3), color, 3 x (pos, z)          |
//! | `0x02` | Gouraud       | header, attrs(3), 3 x (pos, z, color)          |
//! | `0x03` | Textured      | header, attrs(3), 3 x (pos, z, u, v)           |
//! | `0x04` | Polygon3d     | header(n), attrs(3), color, normal(3), n x 8   |
//! | `0x10` | LoadIdentity  | header                                         |
//! | `0x11` | LoadMatrix    | header, 16 floats (row-major)                  |
//! | `0x12` | MultMatrix    | header, 16 floats (row-major)                  |
//! | `0x13` | PushMatrix    | header                                         |
//! | `0x14` | PopMatrix     | header                                         |
//! | `0x20` | SetLight      | header, direction(3), diffuse, ambient         |
//! | `0x21` | SetViewport   | header, x\|y, w\|h, cx, cy, focal, near        |
//! | `0x22` | SetClipRect   | header, min x\|y, max x\|y                     |
//! | `0xFF` | EndOfList     | header                                         |
//!
//! - `pos`: x in bits 0-15, y in bits 16-31 (both signed)
//! - `z`, `u`, `v` and all other floats: device float format
//!   (see [`crate::core::fixed::dsp_float_to_f32`])
//! - `color`: `0x00BBGGRR`
//! - attrs: `[flags | priority << 16 | blend << 24, sheet | palette << 16, intensity]`
//! - Polygon3d vertex: position(3), u, v, normal(3); `n` is the header's low byte
//!
//! # Error recovery
//!
//! Unknown tags are skipped one word at a time until a known tag appears. A
//! record cut short by the end of the stream is a `TruncatedRecord` error.

use super::blend::{BlendMode, Color};
use super::transform::{DirectionalLight, Matrix4, Viewport};
use crate::core::error::{RenderError, Result};
use crate::core::fixed::{dsp_float_to_f32, f32_to_dsp_float};
use crate::core::raster::ClipRect;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Most vertices a model-space polygon may carry
pub const MAX_POLYGON_VERTICES: usize = 10;

bitflags! {
    /// Per-polygon rendering switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct PolyFlags: u16 {
        /// Sample the bound sheet in `Polygon3d` records
        ///
        /// `Textured` records always sample, with or without this flag.
        const TEXTURED = 1 << 0;
        /// Interpolate texture coordinates through reciprocal depth
        const PERSPECTIVE = 1 << 1;
        const BILINEAR = 1 << 2;
        const MIRROR_U = 1 << 3;
        const MIRROR_V = 1 << 4;
        /// Use the translucent depth rule and the polygon's blend mode
        const TRANSLUCENT = 1 << 5;
        /// Per-vertex lighting from vertex normals (3D polygons)
        const SMOOTH_LIGHTING = 1 << 6;
        /// Skip the depth test and depth write
        const DEPTH_DISABLE = 1 << 7;
    }
}

/// Attributes shared by every polygon record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyAttrs {
    pub flags: PolyFlags,
    /// Folded into the depth word when the variant uses priority bits
    pub priority: u8,
    pub blend: BlendMode,
    pub sheet: u16,
    pub palette: u16,
    /// Polygon-level intensity, 8.8 fixed (256 = 1.0)
    pub intensity: u16,
}

impl Default for PolyAttrs {
    fn default() -> Self {
        Self {
            flags: PolyFlags::empty(),
            priority: 0,
            blend: BlendMode::Opaque,
            sheet: 0,
            palette: 0,
            intensity: 256,
        }
    }
}

/// Screen-space vertex position with eye-space depth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenVertex {
    pub x: i16,
    pub y: i16,
    pub z: f32,
}

impl ScreenVertex {
    pub fn new(x: i16, y: i16, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Screen-space vertex with its own color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorVertex {
    pub pos: ScreenVertex,
    pub color: Color,
}

/// Screen-space vertex with texture coordinates (texels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TexVertex {
    pub pos: ScreenVertex,
    pub u: f32,
    pub v: f32,
}

/// Model-space vertex of a 3D polygon
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub u: f32,
    pub v: f32,
    /// Vertex normal, used with `SMOOTH_LIGHTING`
    pub normal: [f32; 3],
}

/// One decoded command-stream record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolygonRecord {
    /// Single-color triangle
    Flat {
        vertices: [ScreenVertex; 3],
        color: Color,
        attrs: PolyAttrs,
    },
    /// Triangle with per-vertex colors
    Gouraud {
        vertices: [ColorVertex; 3],
        attrs: PolyAttrs,
    },
    /// Textured triangle; perspective-correct with `PERSPECTIVE`
    ///
    /// The record kind implies texturing, so `PolyFlags::TEXTURED` is not
    /// consulted.
    Textured {
        vertices: [TexVertex; 3],
        attrs: PolyAttrs,
    },
    /// Model-space polygon fan: transformed, lit, clipped, projected
    Polygon3d {
        vertices: Vec<ModelVertex>,
        /// Face normal for flat lighting
        normal: [f32; 3],
        /// Base color of untextured polygons
        color: Color,
        attrs: PolyAttrs,
    },
    LoadIdentity,
    LoadMatrix(Matrix4),
    MultMatrix(Matrix4),
    PushMatrix,
    PopMatrix,
    SetLight(DirectionalLight),
    SetViewport(Viewport),
    SetClipRect(ClipRect),
    EndOfList,
}

impl PolygonRecord {
    /// Whether this record produces pixels
    pub fn is_polygon(&self) -> bool {
        matches!(
            self,
            PolygonRecord::Flat { .. }
                | PolygonRecord::Gouraud { .. }
                | PolygonRecord::Textured { .. }
                | PolygonRecord::Polygon3d { .. }
        )
    }

    /// Attributes of polygon records
    pub fn attrs(&self) -> Option<&PolyAttrs> {
        match self {
            PolygonRecord::Flat { attrs, .. }
            | PolygonRecord::Gouraud { attrs, .. }
            | PolygonRecord::Textured { attrs, .. }
            | PolygonRecord::Polygon3d { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    /// Append the word-stream encoding of this record to `out`
    pub fn encode(&self, out: &mut Vec<u32>) {
        match self {
            PolygonRecord::Flat {
                vertices,
                color,
                attrs,
            } => {
                out.push(tag::FLAT << 24);
                encode_attrs(attrs, out);
                out.push(color.to_u32());
                for v in vertices {
                    encode_position(v, out);
                }
            }
            PolygonRecord::Gouraud { vertices, attrs } => {
                out.push(tag::GOURAUD << 24);
                encode_attrs(attrs, out);
                for v in vertices {
                    encode_position(&v.pos, out);
                    out.push(v.color.to_u32());
                }
            }
            PolygonRecord::Textured { vertices, attrs } => {
                out.push(tag::TEXTURED << 24);
                encode_attrs(attrs, out);
                for v in vertices {
                    encode_position(&v.pos, out);
                    out.push(f32_to_dsp_float(v.u));
                    out.push(f32_to_dsp_float(v.v));
                }
            }
            PolygonRecord::Polygon3d {
                vertices,
                normal,
                color,
                attrs,
            } => {
                out.push(tag::POLYGON_3D << 24 | (vertices.len() as u32 & 0xFF));
                encode_attrs(attrs, out);
                out.push(color.to_u32());
                out.extend(normal.iter().map(|&f| f32_to_dsp_float(f)));
                for v in vertices {
                    let floats = [
                        v.position[0],
                        v.position[1],
                        v.position[2],
                        v.u,
                        v.v,
                        v.normal[0],
                        v.normal[1],
                        v.normal[2],
                    ];
                    out.extend(floats.iter().map(|&f| f32_to_dsp_float(f)));
                }
            }
            PolygonRecord::LoadIdentity => out.push(tag::LOAD_IDENTITY << 24),
            PolygonRecord::LoadMatrix(m) => {
                out.push(tag::LOAD_MATRIX << 24);
                out.extend(m.to_rows().iter().map(|&f| f32_to_dsp_float(f)));
            }
            PolygonRecord::MultMatrix(m) => {
                out.push(tag::MULT_MATRIX << 24);
                out.extend(m.to_rows().iter().map(|&f| f32_to_dsp_float(f)));
            }
            PolygonRecord::PushMatrix => out.push(tag::PUSH_MATRIX << 24),
            PolygonRecord::PopMatrix => out.push(tag::POP_MATRIX << 24),
            PolygonRecord::SetLight(light) => {
                out.push(tag::SET_LIGHT << 24);
                let floats = [
                    light.direction[0],
                    light.direction[1],
                    light.direction[2],
                    light.diffuse,
                    light.ambient,
                ];
                out.extend(floats.iter().map(|&f| f32_to_dsp_float(f)));
            }
            PolygonRecord::SetViewport(vp) => {
                out.push(tag::SET_VIEWPORT << 24);
                out.push(pack_pair(vp.x, vp.y));
                out.push(pack_pair(vp.width, vp.height));
                let floats = [vp.center_x, vp.center_y, vp.focal, vp.near];
                out.extend(floats.iter().map(|&f| f32_to_dsp_float(f)));
            }
            PolygonRecord::SetClipRect(rect) => {
                out.push(tag::SET_CLIP_RECT << 24);
                out.push(pack_pair(rect.min_x, rect.min_y));
                out.push(pack_pair(rect.max_x, rect.max_y));
            }
            PolygonRecord::EndOfList => out.push(tag::END_OF_LIST << 24),
        }
    }
}

/// Record tags (top byte of the header word)
pub mod tag {
    pub const FLAT: u32 = 0x01;
    pub const GOURAUD: u32 = 0x02;
    pub const TEXTURED: u32 = 0x03;
    pub const POLYGON_3D: u32 = 0x04;
    pub const LOAD_IDENTITY: u32 = 0x10;
    pub const LOAD_MATRIX: u32 = 0x11;
    pub const MULT_MATRIX: u32 = 0x12;
    pub const PUSH_MATRIX: u32 = 0x13;
    pub const POP_MATRIX: u32 = 0x14;
    pub const SET_LIGHT: u32 = 0x20;
    pub const SET_VIEWPORT: u32 = 0x21;
    pub const SET_CLIP_RECT: u32 = 0x22;
    pub const END_OF_LIST: u32 = 0xFF;
}

/// Blend mode codes in the attribute word
const BLEND_OPAQUE: u32 = 0x00;
const BLEND_HALF: u32 = 0x01;
const BLEND_ADDITIVE: u32 = 0x02;
const BLEND_TRANSLUCENT: u32 = 0x80;

fn encode_blend(blend: BlendMode) -> u32 {
    match blend {
        BlendMode::Opaque => BLEND_OPAQUE,
        BlendMode::Half => BLEND_HALF,
        BlendMode::Additive => BLEND_ADDITIVE,
        BlendMode::Translucent(f) => BLEND_TRANSLUCENT | (f as u32 & 0x1F),
    }
}

fn decode_blend(code: u32) -> BlendMode {
    match code {
        BLEND_OPAQUE => BlendMode::Opaque,
        BLEND_HALF => BlendMode::Half,
        BLEND_ADDITIVE => BlendMode::Additive,
        c if c & BLEND_TRANSLUCENT != 0 => BlendMode::Translucent((c & 0x1F) as u8),
        c => {
            log::warn!("unknown blend code 0x{:02X}, drawing opaque", c);
            BlendMode::Opaque
        }
    }
}

fn encode_attrs(attrs: &PolyAttrs, out: &mut Vec<u32>) {
    out.push(
        attrs.flags.bits() as u32
            | (attrs.priority as u32) << 16
            | encode_blend(attrs.blend) << 24,
    );
    out.push(attrs.sheet as u32 | (attrs.palette as u32) << 16);
    out.push(attrs.intensity as u32);
}

fn encode_position(v: &ScreenVertex, out: &mut Vec<u32>) {
    out.push(v.x as u16 as u32 | (v.y as u16 as u32) << 16);
    out.push(f32_to_dsp_float(v.z));
}

fn pack_pair(lo: i32, hi: i32) -> u32 {
    lo as i16 as u16 as u32 | (hi as i16 as u16 as u32) << 16
}

fn unpack_pair(word: u32) -> (i32, i32) {
    ((word as u16 as i16) as i32, ((word >> 16) as u16 as i16) as i32)
}

/// Number of words a record occupies, given its header
fn record_len(tag: u32, header: u32) -> Option<usize> {
    Some(match tag {
        tag::FLAT => 11,
        tag::GOURAUD => 13,
        tag::TEXTURED => 16,
        tag::POLYGON_3D => 8 + 8 * (header & 0xFF) as usize,
        tag::LOAD_IDENTITY | tag::PUSH_MATRIX | tag::POP_MATRIX | tag::END_OF_LIST => 1,
        tag::LOAD_MATRIX | tag::MULT_MATRIX => 17,
        tag::SET_LIGHT => 6,
        tag::SET_VIEWPORT => 7,
        tag::SET_CLIP_RECT => 3,
        _ => return None,
    })
}

/// Sequential reader over one record's words
struct WordReader<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> WordReader<'a> {
    fn new(words: &'a [u32]) -> Self {
        Self { words, pos: 0 }
    }

    // Length is checked against `record_len` before reading
    fn word(&mut self) -> u32 {
        let w = self.words[self.pos];
        self.pos += 1;
        w
    }

    fn float(&mut self) -> f32 {
        dsp_float_to_f32(self.word())
    }

    fn floats<const N: usize>(&mut self) -> [f32; N] {
        std::array::from_fn(|_| self.float())
    }

    fn attrs(&mut self) -> PolyAttrs {
        let a = self.word();
        let b = self.word();
        let c = self.word();
        PolyAttrs {
            flags: PolyFlags::from_bits_truncate(a as u16),
            priority: (a >> 16) as u8,
            blend: decode_blend(a >> 24),
            sheet: b as u16,
            palette: (b >> 16) as u16,
            intensity: c as u16,
        }
    }

    fn position(&mut self) -> ScreenVertex {
        let (x, y) = unpack_pair(self.word());
        ScreenVertex::new(x as i16, y as i16, self.float())
    }
}

/// Decoder for the tagged word stream
#[derive(Debug, Default)]
pub struct CommandDecoder {
    skipped_words: usize,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Words skipped while resynchronising past unknown tags
    pub fn skipped_words(&self) -> usize {
        self.skipped_words
    }

    /// Decode the record starting at `offset`
    ///
    /// # Returns
    ///
    /// The record and the number of words it used.
    ///
    /// # Errors
    ///
    /// - `UnknownRecordTag` if the header tag is not recognised
    /// - `TruncatedRecord` if the stream ends inside the record, or with tag
    ///   0 and nothing available when `offset` is past the end
    /// - `VertexBufferFull` for a 3D polygon with too many vertices
    pub fn decode_one(&self, words: &[u32], offset: usize) -> Result<(PolygonRecord, usize)> {
        let Some(&header) = words.get(offset) else {
            return Err(RenderError::TruncatedRecord {
                tag: 0,
                needed: 1,
                available: 0,
            });
        };
        let tag = header >> 24;
        let len = record_len(tag, header).ok_or(RenderError::UnknownRecordTag {
            tag: tag as u8,
            offset,
        })?;

        let available = words.len() - offset;
        if available < len {
            return Err(RenderError::TruncatedRecord {
                tag: tag as u8,
                needed: len,
                available,
            });
        }

        let mut r = WordReader::new(&words[offset + 1..offset + len]);
        let record = match tag {
            tag::FLAT => {
                let attrs = r.attrs();
                let color = Color::from_u32(r.word());
                let vertices = [r.position(), r.position(), r.position()];
                PolygonRecord::Flat {
                    vertices,
                    color,
                    attrs,
                }
            }
            tag::GOURAUD => {
                let attrs = r.attrs();
                let mut vertex = || {
                    let pos = r.position();
                    ColorVertex {
                        pos,
                        color: Color::from_u32(r.word()),
                    }
                };
                let vertices = [vertex(), vertex(), vertex()];
                PolygonRecord::Gouraud { vertices, attrs }
            }
            tag::TEXTURED => {
                let attrs = r.attrs();
                let mut vertex = || {
                    let pos = r.position();
                    let [u, v] = r.floats::<2>();
                    TexVertex { pos, u, v }
                };
                let vertices = [vertex(), vertex(), vertex()];
                PolygonRecord::Textured { vertices, attrs }
            }
            tag::POLYGON_3D => {
                let count = (header & 0xFF) as usize;
                if count > MAX_POLYGON_VERTICES {
                    return Err(RenderError::VertexBufferFull {
                        capacity: MAX_POLYGON_VERTICES,
                    });
                }
                let attrs = r.attrs();
                let color = Color::from_u32(r.word());
                let normal = r.floats::<3>();
                let vertices = (0..count)
                    .map(|_| {
                        let f = r.floats::<8>();
                        ModelVertex {
                            position: [f[0], f[1], f[2]],
                            u: f[3],
                            v: f[4],
                            normal: [f[5], f[6], f[7]],
                        }
                    })
                    .collect();
                PolygonRecord::Polygon3d {
                    vertices,
                    normal,
                    color,
                    attrs,
                }
            }
            tag::LOAD_IDENTITY => PolygonRecord::LoadIdentity,
            tag::LOAD_MATRIX => PolygonRecord::LoadMatrix(Matrix4::from_rows(r.floats::<16>())),
            tag::MULT_MATRIX => PolygonRecord::MultMatrix(Matrix4::from_rows(r.floats::<16>())),
            tag::PUSH_MATRIX => PolygonRecord::PushMatrix,
            tag::POP_MATRIX => PolygonRecord::PopMatrix,
            tag::SET_LIGHT => {
                let f = r.floats::<5>();
                PolygonRecord::SetLight(DirectionalLight {
                    direction: [f[0], f[1], f[2]],
                    diffuse: f[3],
                    ambient: f[4],
                })
            }
            tag::SET_VIEWPORT => {
                let (x, y) = unpack_pair(r.word());
                let (width, height) = unpack_pair(r.word());
                let [center_x, center_y, focal, near] = r.floats::<4>();
                PolygonRecord::SetViewport(Viewport {
                    x,
                    y,
                    width,
                    height,
                    center_x,
                    center_y,
                    focal,
                    near,
                })
            }
            tag::SET_CLIP_RECT => {
                let (min_x, min_y) = unpack_pair(r.word());
                let (max_x, max_y) = unpack_pair(r.word());
                PolygonRecord::SetClipRect(ClipRect::new(min_x, min_y, max_x, max_y))
            }
            _ => PolygonRecord::EndOfList,
        };

        Ok((record, len))
    }

    /// Decode a whole word stream
    ///
    /// Unknown tags are logged and skipped word by word. Truncation stops
    /// decoding with an error; the records decoded so far are discarded.
    pub fn decode(&mut self, words: &[u32]) -> Result<Vec<PolygonRecord>> {
        let mut records = Vec::new();
        let mut offset = 0;
        let mut skipping = false;

        while offset < words.len() {
            match self.decode_one(words, offset) {
                Ok((record, len)) => {
                    skipping = false;
                    offset += len;
                    records.push(record);
                }
                Err(RenderError::UnknownRecordTag { tag, offset: at }) => {
                    if !skipping {
                        log::warn!(
                            "unknown record tag 0x{:02X} at word {}, resynchronising",
                            tag,
                            at
                        );
                    }
                    skipping = true;
                    self.skipped_words += 1;
                    offset += 1;
                }
                Err(err) => return Err(err),
            }
        }

        log::trace!("decoded {} records from {} words", records.len(), words.len());
        Ok(records)
    }
}

/// Encode a list of records into one word stream
pub fn encode_records(records: &[PolygonRecord]) -> Vec<u32> {
    let mut out = Vec::new();
    for record in records {
        record.encode(&mut out);
    }
    out
}
