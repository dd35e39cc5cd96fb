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

//! Polygon clipping stage
//!
//! Sutherland-Hodgman clipping of a vertex fan against one half-space plane at
//! a time. Chaining planes (e.g. the five view-frustum planes) feeds each
//! stage's output into the next.
//!
//! A plane `(a, b, c, d)` keeps the points where `a*x + b*y + c*z + d >= 0`.
//! Vertices within [`CLIP_EPSILON`] (geometric distance) of a plane count as
//! inside, so clipping an already clipped polygon again is a no-op.

use super::scan::{ClipRect, MAX_PARAMS};
use crate::core::error::{RenderError, Result};
use crate::core::pipeline::transform::Viewport;

/// Vertex capacity of a clip polygon
pub const MAX_CLIP_VERTICES: usize = 16;

/// Distance below which a vertex on the outer side still counts as inside
pub const CLIP_EPSILON: f32 = 1.0 / 256.0;

/// Clip-space vertex: position plus interpolated parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub p: [f32; MAX_PARAMS],
}

impl ClipVertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            p: [0.0; MAX_PARAMS],
        }
    }

    /// Vertex with the leading parameters set from `params`
    pub fn with_params(x: f32, y: f32, z: f32, params: &[f32]) -> Self {
        let mut v = Self::new(x, y, z);
        for (dst, src) in v.p.iter_mut().zip(params) {
            *dst = *src;
        }
        v
    }

    /// Linear interpolation towards `other` by `t`, for position and the first
    /// `param_count` parameters
    fn lerp(&self, other: &ClipVertex, t: f32, param_count: usize) -> ClipVertex {
        let mut v = ClipVertex::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        );
        for i in 0..param_count.min(MAX_PARAMS) {
            v.p[i] = self.p[i] + (other.p[i] - self.p[i]) * t;
        }
        v
    }
}

/// Half-space plane `a*x + b*y + c*z + d >= 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl ClipPlane {
    pub const fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// Signed distance (scaled by the normal length)
    #[inline]
    pub fn distance(&self, v: &ClipVertex) -> f32 {
        self.a * v.x + self.b * v.y + self.c * v.z + self.d
    }

    /// Whether `v` lies in the kept half-space
    #[inline]
    pub fn is_inside(&self, v: &ClipVertex) -> bool {
        self.distance(v) >= -CLIP_EPSILON * self.normal_length()
    }

    fn normal_length(&self) -> f32 {
        (self.a * self.a + self.b * self.b + self.c * self.c).sqrt()
    }

    /// Keep `x >= min_x`
    pub fn screen_left(min_x: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, -min_x)
    }

    /// Keep `x <= max_x`
    pub fn screen_right(max_x: f32) -> Self {
        Self::new(-1.0, 0.0, 0.0, max_x)
    }

    /// Keep `y >= min_y`
    pub fn screen_top(min_y: f32) -> Self {
        Self::new(0.0, 1.0, 0.0, -min_y)
    }

    /// Keep `y <= max_y`
    pub fn screen_bottom(max_y: f32) -> Self {
        Self::new(0.0, -1.0, 0.0, max_y)
    }

    /// Keep `z >= near`
    pub fn near(near: f32) -> Self {
        Self::new(0.0, 0.0, 1.0, -near)
    }

    /// Four screen-space planes enclosing the pixels of `rect`
    ///
    /// The right and bottom planes sit on the far side of the last pixel.
    pub fn screen_rect(rect: &ClipRect) -> [ClipPlane; 4] {
        [
            Self::screen_left(rect.min_x as f32),
            Self::screen_right((rect.max_x + 1) as f32),
            Self::screen_top(rect.min_y as f32),
            Self::screen_bottom((rect.max_y + 1) as f32),
        ]
    }

    /// Eye-space view frustum of `viewport`: left, right, top, bottom, near
    ///
    /// A point projects to `center + focal * (x, y) / z`; each side plane keeps
    /// the points projecting inside the viewport rectangle.
    pub fn frustum(viewport: &Viewport) -> [ClipPlane; 5] {
        let f = viewport.focal;
        let left = viewport.x as f32;
        let right = (viewport.x + viewport.width) as f32;
        let top = viewport.y as f32;
        let bottom = (viewport.y + viewport.height) as f32;

        [
            Self::new(f, 0.0, viewport.center_x - left, 0.0),
            Self::new(-f, 0.0, right - viewport.center_x, 0.0),
            Self::new(0.0, f, viewport.center_y - top, 0.0),
            Self::new(0.0, -f, bottom - viewport.center_y, 0.0),
            Self::near(viewport.near),
        ]
    }
}

/// Fixed-capacity ordered vertex fan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPolygon {
    verts: [ClipVertex; MAX_CLIP_VERTICES],
    len: usize,
}

impl ClipPolygon {
    pub fn new() -> Self {
        Self {
            verts: [ClipVertex::default(); MAX_CLIP_VERTICES],
            len: 0,
        }
    }

    /// Build a polygon from a vertex slice
    pub fn from_vertices(verts: &[ClipVertex]) -> Result<Self> {
        let mut poly = Self::new();
        for v in verts {
            poly.push(*v)?;
        }
        Ok(poly)
    }

    /// Append a vertex
    ///
    /// # Errors
    ///
    /// `VertexBufferFull` once [`MAX_CLIP_VERTICES`] vertices are held.
    pub fn push(&mut self, v: ClipVertex) -> Result<()> {
        if self.len == MAX_CLIP_VERTICES {
            return Err(RenderError::VertexBufferFull {
                capacity: MAX_CLIP_VERTICES,
            });
        }
        self.verts[self.len] = v;
        self.len += 1;
        Ok(())
    }

    pub fn vertices(&self) -> &[ClipVertex] {
        &self.verts[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fewer than 3 vertices: nothing left to rasterize
    pub fn is_degenerate(&self) -> bool {
        self.len < 3
    }
}

impl Default for ClipPolygon {
    fn default() -> Self {
        Self::new()
    }
}

/// Clip `poly` against one plane
///
/// Position and the first `param_count` parameters of each new vertex are
/// interpolated with the same fraction. A polygon entirely inside comes back
/// unchanged; one entirely outside comes back empty.
///
/// # Errors
///
/// `VertexBufferFull` if the result would exceed [`MAX_CLIP_VERTICES`].
/// Convex input gains at most one vertex per plane.
pub fn clip_polygon(
    poly: &ClipPolygon,
    plane: &ClipPlane,
    param_count: usize,
) -> Result<ClipPolygon> {
    let mut out = ClipPolygon::new();
    let verts = poly.vertices();
    let Some(last) = verts.last() else {
        return Ok(out);
    };

    let mut prev = last;
    let mut prev_inside = plane.is_inside(prev);
    for cur in verts {
        let cur_inside = plane.is_inside(cur);

        match (prev_inside, cur_inside) {
            (true, true) => out.push(*cur)?,
            // Leaving: intersection only
            (true, false) => out.push(intersect(prev, cur, plane, param_count))?,
            // Entering: intersection, then the inside vertex
            (false, true) => {
                out.push(intersect(cur, prev, plane, param_count))?;
                out.push(*cur)?;
            }
            (false, false) => {}
        }

        prev = cur;
        prev_inside = cur_inside;
    }

    Ok(out)
}

/// Point where the edge from `inside` to `outside` meets `plane`
fn intersect(
    inside: &ClipVertex,
    outside: &ClipVertex,
    plane: &ClipPlane,
    param_count: usize,
) -> ClipVertex {
    let d_in = plane.distance(inside);
    let d_out = plane.distance(outside);
    let denom = d_in - d_out;
    let t = if denom != 0.0 {
        (d_in / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    inside.lerp(outside, t, param_count)
}

/// Clip against each plane in turn
///
/// An empty plane list returns the polygon as is. Stops early once the
/// polygon degenerates.
pub fn clip_polygon_planes(
    poly: &ClipPolygon,
    planes: &[ClipPlane],
    param_count: usize,
) -> Result<ClipPolygon> {
    let mut current = *poly;
    for plane in planes {
        if current.is_degenerate() {
            break;
        }
        current = clip_polygon(&current, plane, param_count)?;
    }
    Ok(current)
}
