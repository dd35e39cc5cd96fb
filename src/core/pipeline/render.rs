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

//! Triangle preparation, span shading and fragment commit
//!
//! Rendering a polygon happens in three steps:
//!
//! 1. [`prepare_polygon`] turns a record into a [`PolygonJob`]: screen-space
//!    triangles with a fixed parameter layout per shading class. 3D polygons
//!    are transformed, lit, frustum-clipped and fan-triangulated here.
//! 2. [`TriangleRasterizer::shade`] scan-converts the job and shades every
//!    covered pixel into a [`FragmentBatch`]. This step reads only the job
//!    and the texture store, so it can run on any thread.
//! 3. [`commit`] applies the depth test and blend rule against the
//!    framebuffer and Z-buffer, in submission order.
//!
//! # Parameter layouts
//!
//! | Class       | N | Parameters                                  |
//! |-------------|---|---------------------------------------------|
//! | Flat        | 0 | none (depth is per polygon)                 |
//! | Gouraud     | 4 | depth, r, g, b (8.16)                       |
//! | Affine      | 3 | depth, u, v (16.16)                         |
//! | Perspective | 4 | depth, w (4.28), u*w, v*w (16.16)           |
//! | Lit         | 5 | depth, w, u*w, v*w, intensity (8.8)         |
//!
//! `Textured` records always sample their sheet. 3D polygons sample only
//! with [`PolyFlags::TEXTURED`] and otherwise shade their base color.

use super::blend::{BlendMode, Color, PixelFormat};
use super::command::{ModelVertex, PolyAttrs, PolyFlags, PolygonRecord, ScreenVertex};
use super::depth::{DepthFormat, DepthRule};
use super::texture::{scale_intensity, TexelAddress, TextureStore};
use super::transform::{DirectionalLight, MatrixStack, Viewport, FULL_INTENSITY};
use crate::core::error::Result;
use crate::core::fixed::{
    depth_encode, float_to_fixed, perspective_divide, reciprocal_z, DEPTH_MAX, FRAC_BITS, W_SHIFT,
};
use crate::core::raster::{
    clip_polygon_planes, ClipPlane, ClipPolygon, ClipRect, ClipVertex, PolyVertex, ScanConverter,
    TriangleSetup,
};
use std::sync::Arc;

/// Geometry state consumed by 3D polygons and screen clipping
#[derive(Debug, Clone)]
pub struct GeometryState {
    pub matrices: MatrixStack,
    pub light: DirectionalLight,
    pub viewport: Viewport,
    /// Active scissor, already intersected with the raster
    pub clip: ClipRect,
}

impl GeometryState {
    pub fn new(width: usize, height: usize, matrix_depth: usize) -> Self {
        Self {
            matrices: MatrixStack::new(matrix_depth),
            light: DirectionalLight::default(),
            viewport: Viewport::for_raster(width, height),
            clip: ClipRect::full(width, height),
        }
    }
}

/// Per-instance shading parameters shared by every job of a pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadeParams {
    pub width: usize,
    pub format: PixelFormat,
    pub depth_rule: DepthRule,
    pub dither: bool,
}

/// One screen-space triangle in its shading-class layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreparedTriangle {
    Flat { vertices: [PolyVertex<0>; 3], depth: u32 },
    Gouraud([PolyVertex<4>; 3]),
    Affine([PolyVertex<3>; 3]),
    Perspective([PolyVertex<4>; 3]),
    Lit([PolyVertex<5>; 3]),
}

/// Everything needed to shade one polygon, independent of pipeline state
#[derive(Debug, Clone)]
pub struct PolygonJob {
    /// Submission order within the frame
    pub sequence: u64,
    pub attrs: PolyAttrs,
    /// Flat color, or base color of untextured 3D polygons
    pub color: Color,
    pub clip: ClipRect,
    pub triangles: Vec<PreparedTriangle>,
    pub params: ShadeParams,
    pub textures: Arc<TextureStore>,
}

/// Shaded pixel waiting for the depth test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Linear framebuffer index
    pub index: u32,
    /// Packed source pixel in the framebuffer format
    pub color: u32,
    /// Composed depth word
    pub depth: u32,
}

/// All fragments of one polygon, in scan order
#[derive(Debug, Clone, Default)]
pub struct FragmentBatch {
    pub sequence: u64,
    pub translucent: bool,
    pub depth_test: bool,
    pub blend: BlendMode,
    pub fragments: Vec<Fragment>,
}

/// Decode a record into a shading job
///
/// Returns `Ok(None)` for non-polygon records and for polygons that clip away
/// entirely. Matrix and state records are not handled here.
pub fn prepare_polygon(
    record: &PolygonRecord,
    geometry: &GeometryState,
    sequence: u64,
    params: ShadeParams,
    textures: &Arc<TextureStore>,
) -> Result<Option<PolygonJob>> {
    let format = params.depth_rule.format;
    let (attrs, color, triangles) = match record {
        PolygonRecord::Flat {
            vertices,
            color,
            attrs,
        } => {
            let depth = flat_depth(vertices, format);
            let vertices = vertices.map(|v| PolyVertex::new(v.x, v.y, []));
            (*attrs, *color, vec![PreparedTriangle::Flat { vertices, depth }])
        }
        PolygonRecord::Gouraud { vertices, attrs } => {
            let vertices = vertices.map(|v| {
                let c = v.color;
                PolyVertex::new(
                    v.pos.x,
                    v.pos.y,
                    [
                        depth_encode(v.pos.z, format) as i32,
                        (c.r as i32) << FRAC_BITS,
                        (c.g as i32) << FRAC_BITS,
                        (c.b as i32) << FRAC_BITS,
                    ],
                )
            });
            (*attrs, Color::WHITE, vec![PreparedTriangle::Gouraud(vertices)])
        }
        PolygonRecord::Textured { vertices, attrs } => {
            let triangle = if attrs.flags.contains(PolyFlags::PERSPECTIVE) {
                PreparedTriangle::Perspective(vertices.map(|v| {
                    let [depth, w, uw, vw, _] = perspective_params(v.pos.z, v.u, v.v, 0, format);
                    PolyVertex::new(v.pos.x, v.pos.y, [depth, w, uw, vw])
                }))
            } else {
                PreparedTriangle::Affine(vertices.map(|v| {
                    PolyVertex::new(
                        v.pos.x,
                        v.pos.y,
                        [
                            depth_encode(v.pos.z, format) as i32,
                            float_to_fixed(v.u, FRAC_BITS),
                            float_to_fixed(v.v, FRAC_BITS),
                        ],
                    )
                }))
            };
            (*attrs, Color::WHITE, vec![triangle])
        }
        PolygonRecord::Polygon3d {
            vertices,
            normal,
            color,
            attrs,
        } => {
            let triangles = prepare_3d(vertices, *normal, attrs, geometry, format)?;
            if triangles.is_empty() {
                return Ok(None);
            }
            (*attrs, *color, triangles)
        }
        _ => return Ok(None),
    };

    Ok(Some(PolygonJob {
        sequence,
        attrs,
        color,
        clip: geometry.clip,
        triangles,
        params,
        textures: Arc::clone(textures),
    }))
}

fn flat_depth(vertices: &[ScreenVertex; 3], format: DepthFormat) -> u32 {
    let sum: u64 = vertices.iter().map(|v| depth_encode(v.z, format) as u64).sum();
    (sum / 3) as u32
}

/// `[depth, w, u*w, v*w, intensity]` for one perspective vertex
fn perspective_params(z: f32, u: f32, v: f32, intensity: u16, format: DepthFormat) -> [i32; 5] {
    let w = reciprocal_z(z);
    let premultiply = |t: f32| ((float_to_fixed(t, FRAC_BITS) as i64 * w as i64) >> W_SHIFT) as i32;
    [depth_encode(z, format) as i32, w, premultiply(u), premultiply(v), intensity as i32]
}

fn prepare_3d(
    vertices: &[ModelVertex],
    face_normal: [f32; 3],
    attrs: &PolyAttrs,
    geometry: &GeometryState,
    format: DepthFormat,
) -> Result<Vec<PreparedTriangle>> {
    let matrix = geometry.matrices.top();
    let face_intensity = geometry.light.intensity(matrix.transform_normal(face_normal));
    let smooth = attrs.flags.contains(PolyFlags::SMOOTH_LIGHTING);

    let mut poly = ClipPolygon::new();
    for v in vertices {
        let eye = matrix.transform_point(v.position);
        let lit = if smooth {
            geometry.light.intensity(matrix.transform_normal(v.normal))
        } else {
            face_intensity
        };
        let intensity = (lit as u32 * attrs.intensity as u32 / FULL_INTENSITY as u32) as f32;
        poly.push(ClipVertex::with_params(eye[0], eye[1], eye[2], &[v.u, v.v, intensity]))?;
    }

    let clipped = clip_polygon_planes(&poly, &ClipPlane::frustum(&geometry.viewport), 3)?;
    if clipped.is_degenerate() {
        log::trace!("3D polygon clipped away");
        return Ok(Vec::new());
    }

    let projected: Vec<PolyVertex<5>> = clipped
        .vertices()
        .iter()
        .map(|cv| {
            let (sx, sy) = geometry.viewport.project([cv.x, cv.y, cv.z]);
            let intensity = cv.p[2].round().clamp(0.0, u16::MAX as f32) as u16;
            PolyVertex::new(
                truncate_coord(sx),
                truncate_coord(sy),
                perspective_params(cv.z, cv.p[0], cv.p[1], intensity, format),
            )
        })
        .collect();

    Ok(projected
        .windows(2)
        .skip(1)
        .map(|pair| PreparedTriangle::Lit([projected[0], pair[0], pair[1]]))
        .collect())
}

fn truncate_coord(v: f32) -> i16 {
    v.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Per-thread scan-conversion scratch, one converter per parameter count
pub struct TriangleRasterizer {
    flat: ScanConverter<0>,
    affine: ScanConverter<3>,
    quad: ScanConverter<4>,
    lit: ScanConverter<5>,
}

impl TriangleRasterizer {
    pub fn new() -> Self {
        Self {
            flat: ScanConverter::new(),
            affine: ScanConverter::new(),
            quad: ScanConverter::new(),
            lit: ScanConverter::new(),
        }
    }

    /// Shade every triangle of `job` into one fragment batch
    ///
    /// # Errors
    ///
    /// `ScanlineOverflow` from the scan-converter.
    pub fn shade(&mut self, job: &PolygonJob) -> Result<FragmentBatch> {
        let attrs = &job.attrs;
        let translucent = attrs.flags.contains(PolyFlags::TRANSLUCENT);
        let mut batch = FragmentBatch {
            sequence: job.sequence,
            translucent,
            depth_test: !attrs.flags.contains(PolyFlags::DEPTH_DISABLE),
            blend: if translucent { attrs.blend } else { BlendMode::Opaque },
            fragments: Vec::new(),
        };

        let shader = Shader::new(job);
        for triangle in &job.triangles {
            match triangle {
                PreparedTriangle::Flat { vertices, depth } => {
                    let setup = self.flat.setup(vertices[0], vertices[1], vertices[2], &job.clip)?;
                    if let Some(setup) = setup {
                        let depth = shader.depth_word(*depth);
                        shader.emit(setup, &mut batch, |_| Some((job.color, depth)));
                    }
                }
                PreparedTriangle::Gouraud(v) => {
                    if let Some(setup) = self.quad.setup(v[0], v[1], v[2], &job.clip)? {
                        shader.emit(setup, &mut batch, |p| {
                            let channel = |i: usize| (p[i] >> (2 * FRAC_BITS)).clamp(0, 255) as u8;
                            let color = Color::new(channel(1), channel(2), channel(3));
                            Some((color, shader.interpolated_depth(p[0])))
                        });
                    }
                }
                PreparedTriangle::Affine(v) => {
                    if let Some(setup) = self.affine.setup(v[0], v[1], v[2], &job.clip)? {
                        shader.emit(setup, &mut batch, |p| {
                            let u = (p[1] >> FRAC_BITS) as i32;
                            let v = (p[2] >> FRAC_BITS) as i32;
                            let texel = shader.sample(u, v)?;
                            Some((shader.polygon_intensity(texel), shader.interpolated_depth(p[0])))
                        });
                    }
                }
                PreparedTriangle::Perspective(v) => {
                    if let Some(setup) = self.quad.setup(v[0], v[1], v[2], &job.clip)? {
                        shader.emit(setup, &mut batch, |p| {
                            let u = perspective_divide(p[2], p[1]);
                            let v = perspective_divide(p[3], p[1]);
                            let texel = shader.sample(u, v)?;
                            Some((shader.polygon_intensity(texel), shader.interpolated_depth(p[0])))
                        });
                    }
                }
                PreparedTriangle::Lit(v) => {
                    if let Some(setup) = self.lit.setup(v[0], v[1], v[2], &job.clip)? {
                        let textured = attrs.flags.contains(PolyFlags::TEXTURED);
                        shader.emit(setup, &mut batch, |p| {
                            let base = if textured {
                                let u = perspective_divide(p[2], p[1]);
                                let v = perspective_divide(p[3], p[1]);
                                shader.sample(u, v)?
                            } else {
                                job.color
                            };
                            let intensity = (p[4] >> FRAC_BITS).clamp(0, u16::MAX as i64) as u16;
                            let depth = shader.interpolated_depth(p[0]);
                            Some((scale_intensity(base, intensity), depth))
                        });
                    }
                }
            }
        }

        log::trace!(
            "polygon {} shaded: {} triangles, {} fragments",
            job.sequence,
            job.triangles.len(),
            batch.fragments.len()
        );
        Ok(batch)
    }
}

impl Default for TriangleRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-job shading helpers
struct Shader<'a> {
    params: &'a ShadeParams,
    textures: &'a TextureStore,
    address: TexelAddress,
    bilinear: bool,
    intensity: u16,
    priority: u8,
}

impl<'a> Shader<'a> {
    fn new(job: &'a PolygonJob) -> Self {
        let attrs = &job.attrs;
        Self {
            params: &job.params,
            textures: &job.textures,
            address: TexelAddress {
                sheet: attrs.sheet as usize,
                palette_base: attrs.palette as usize,
                mirror_u: attrs.flags.contains(PolyFlags::MIRROR_U),
                mirror_v: attrs.flags.contains(PolyFlags::MIRROR_V),
            },
            bilinear: attrs.flags.contains(PolyFlags::BILINEAR),
            intensity: attrs.intensity,
            priority: attrs.priority,
        }
    }

    #[inline]
    fn sample(&self, u: i32, v: i32) -> Option<Color> {
        if self.bilinear {
            self.textures.sample_bilinear(&self.address, u, v)
        } else {
            self.textures.sample_nearest(&self.address, u, v)
        }
    }

    #[inline]
    fn polygon_intensity(&self, c: Color) -> Color {
        if self.intensity == FULL_INTENSITY {
            c
        } else {
            scale_intensity(c, self.intensity)
        }
    }

    #[inline]
    fn depth_word(&self, depth: u32) -> u32 {
        self.params.depth_rule.compose(depth, self.priority)
    }

    #[inline]
    fn interpolated_depth(&self, p: i64) -> u32 {
        self.depth_word((p >> FRAC_BITS).clamp(0, DEPTH_MAX as i64) as u32)
    }

    /// Walk every span of `setup`, stepping parameters by `dpdx`
    fn emit<const N: usize>(
        &self,
        setup: &TriangleSetup<N>,
        batch: &mut FragmentBatch,
        mut pixel: impl FnMut(&[i64; N]) -> Option<(Color, u32)>,
    ) {
        let width = self.params.width as i32;
        for (y, span) in setup.rows() {
            let mut p = span.p;
            for x in span.start_x..=span.end_x {
                if let Some((color, depth)) = pixel(&p) {
                    let packed = if self.params.dither {
                        self.params.format.pack_dithered(color, x, y)
                    } else {
                        self.params.format.pack(color)
                    };
                    batch.fragments.push(Fragment {
                        index: (y * width + x) as u32,
                        color: packed,
                        depth,
                    });
                }
                for (value, delta) in p.iter_mut().zip(setup.dpdx.iter()) {
                    *value += delta;
                }
            }
        }
    }
}

/// Apply a fragment batch to the color and depth buffers
///
/// Returns the number of pixels written.
pub fn commit(
    batch: &FragmentBatch,
    params: &ShadeParams,
    color: &mut [u32],
    depth: &mut [u32],
) -> usize {
    let rule = &params.depth_rule;
    let write_depth = batch.depth_test && rule.writes_depth(batch.translucent);
    let mut written = 0;

    for f in &batch.fragments {
        let i = f.index as usize;
        if i >= color.len() {
            continue;
        }
        if batch.depth_test && !rule.test(batch.translucent, f.depth, depth[i]) {
            continue;
        }
        color[i] = batch.blend.apply(params.format, f.color, color[i]);
        if write_depth {
            depth[i] = f.depth;
        }
        written += 1;
    }
    written
}
