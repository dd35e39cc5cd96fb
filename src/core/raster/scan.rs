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

//! Triangle scan-converter
//!
//! Converts one triangle with 0 to 6 interpolated parameters into a list of
//! horizontal spans, one per covered scanline.
//!
//! # Algorithm
//!
//! Edge walking, split at the middle vertex:
//!
//! 1. Sort vertices by Y coordinate (v1.y <= v2.y <= v3.y)
//! 2. Reject triangles entirely outside the clip rectangle
//! 3. Compute the longest scanline (width at v2.y) to find orientation
//! 4. Compute one per-pixel delta per parameter for the whole triangle
//! 5. Walk the top half (v1..v2) then the bottom half (v2..v3)
//! 6. Clip each scanline to the clip rectangle
//!
//! # Fill convention
//!
//! Pixel centres sit at `(x + 0.5, y + 0.5)`. A pixel belongs to the triangle
//! when its centre lies on or right of the left edge and strictly left of the
//! right edge. Rows `v1.y ..= v3.y - 1` are walked. Two triangles sharing an
//! edge therefore never both cover a pixel on that edge.
//!
//! # Fixed point
//!
//! Edge X is 16.16 with the half-pixel bias folded into the start value.
//! Parameters are interpolated as 32.16: a vertex parameter `p` starts as
//! `p << 16`.

use crate::core::error::{RenderError, Result};
use crate::core::fixed::{CEIL_BIAS, FRAC_BITS, HALF};
use serde::{Deserialize, Serialize};

/// Span slots available per triangle
pub const MAX_SCANLINES: usize = 512;

/// Largest supported parameter count
pub const MAX_PARAMS: usize = 6;

/// Screen-space clip rectangle (all bounds inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl ClipRect {
    /// Create a clip rectangle from inclusive bounds
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Clip rectangle covering a whole `width` x `height` raster
    pub const fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i32 - 1, height as i32 - 1)
    }

    /// True when no pixel can pass this rectangle
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Intersection of two rectangles
    pub fn intersect(&self, other: &ClipRect) -> ClipRect {
        ClipRect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        )
    }

    /// Whether pixel `(x, y)` is inside
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Screen-space triangle vertex with `N` fixed-point parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolyVertex<const N: usize> {
    pub x: i16,
    pub y: i16,
    pub p: [i32; N],
}

impl<const N: usize> PolyVertex<N> {
    pub const fn new(x: i16, y: i16, p: [i32; N]) -> Self {
        Self { x, y, p }
    }
}

/// One horizontal run of pixels
///
/// `p` holds each parameter (32.16) at the centre of pixel `start_x`. A span
/// with `start_x > end_x` covers no pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanlineSpan<const N: usize> {
    pub start_x: i32,
    pub end_x: i32,
    pub p: [i64; N],
}

impl<const N: usize> ScanlineSpan<N> {
    /// Number of pixels covered
    #[inline]
    pub fn len(&self) -> usize {
        (self.end_x - self.start_x + 1).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end_x < self.start_x
    }
}

/// Result of setting up one triangle
///
/// Spans cover rows `start_y ..= end_y`, one span per row.
#[derive(Debug, Clone)]
pub struct TriangleSetup<const N: usize> {
    pub start_y: i32,
    pub end_y: i32,
    /// Per-pixel parameter deltas (32.16 per pixel), shared by every span
    pub dpdx: [i64; N],
    spans: Vec<ScanlineSpan<N>>,
}

impl<const N: usize> TriangleSetup<N> {
    fn new() -> Self {
        Self {
            start_y: 0,
            end_y: -1,
            dpdx: [0; N],
            spans: Vec::with_capacity(MAX_SCANLINES),
        }
    }

    /// All spans, top to bottom
    pub fn spans(&self) -> &[ScanlineSpan<N>] {
        &self.spans
    }

    /// Span for row `y`, if the triangle covers that row
    pub fn span(&self, y: i32) -> Option<&ScanlineSpan<N>> {
        if y < self.start_y {
            return None;
        }
        self.spans.get((y - self.start_y) as usize)
    }

    /// Iterate `(y, span)` pairs
    pub fn rows(&self) -> impl Iterator<Item = (i32, &ScanlineSpan<N>)> + '_ {
        self.spans
            .iter()
            .enumerate()
            .map(move |(i, span)| (self.start_y + i as i32, span))
    }

    /// Total number of pixels covered by all spans
    pub fn pixel_count(&self) -> usize {
        self.spans.iter().map(ScanlineSpan::len).sum()
    }

    /// Parameter `index` (32.16) at the centre of pixel `(x, y)`
    ///
    /// Returns `None` outside the covered pixels.
    pub fn param_at(&self, y: i32, x: i32, index: usize) -> Option<i64> {
        let span = self.span(y)?;
        if index >= N || x < span.start_x || x > span.end_x {
            return None;
        }
        Some(span.p[index] + (x - span.start_x) as i64 * self.dpdx[index])
    }
}

/// Edge walker state: X plus the parameters along the edge, both sampled at
/// the current row's pixel-centre height
#[derive(Debug, Clone, Copy)]
struct Edge<const N: usize> {
    x: i64,
    dx: i64,
    p: [i64; N],
    dp: [i64; N],
}

impl<const N: usize> Edge<N> {
    fn new(a: &PolyVertex<N>, b: &PolyVertex<N>) -> Self {
        let dy = (b.y as i64 - a.y as i64).max(1);
        let dx = ((b.x as i64 - a.x as i64) << FRAC_BITS) / dy;

        let mut p = [0i64; N];
        let mut dp = [0i64; N];
        for i in 0..N {
            dp[i] = ((b.p[i] as i64 - a.p[i] as i64) << FRAC_BITS) / dy;
            p[i] = ((a.p[i] as i64) << FRAC_BITS) + dp[i] / 2;
        }

        Self {
            x: ((a.x as i64) << FRAC_BITS) + dx / 2,
            dx,
            p,
            dp,
        }
    }

    #[inline(always)]
    fn step(&mut self) {
        self.x += self.dx;
        for i in 0..N {
            self.p[i] += self.dp[i];
        }
    }
}

/// Triangle scan-converter for `N` parameters
///
/// Owns a single reusable setup buffer; each call to [`setup`](Self::setup)
/// overwrites the previous result.
///
/// # Examples
///
/// ```
/// use arcpoly::core::raster::{ClipRect, PolyVertex, ScanConverter};
///
/// let mut scan = ScanConverter::<1>::new();
/// let clip = ClipRect::full(320, 240);
/// let setup = scan
///     .setup(
///         PolyVertex::new(0, 0, [0]),
///         PolyVertex::new(8, 0, [8]),
///         PolyVertex::new(0, 8, [0]),
///         &clip,
///     )
///     .unwrap()
///     .expect("visible triangle");
/// assert_eq!(setup.pixel_count(), 28);
/// ```
pub struct ScanConverter<const N: usize> {
    setup: Box<TriangleSetup<N>>,
}

impl<const N: usize> ScanConverter<N> {
    const PARAM_COUNT_OK: () = assert!(N <= MAX_PARAMS, "at most 6 parameters per triangle");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::PARAM_COUNT_OK;
        Self {
            setup: Box::new(TriangleSetup::new()),
        }
    }

    /// Set up one triangle against `clip`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(setup))` with at least one row
    /// - `Ok(None)` for degenerate or fully clipped triangles
    /// - `Err(ScanlineOverflow)` when the visible rows exceed [`MAX_SCANLINES`]
    pub fn setup(
        &mut self,
        v1: PolyVertex<N>,
        v2: PolyVertex<N>,
        v3: PolyVertex<N>,
        clip: &ClipRect,
    ) -> Result<Option<&TriangleSetup<N>>> {
        if clip.is_empty() {
            return Ok(None);
        }

        let mut verts = [v1, v2, v3];
        verts.sort_by_key(|v| v.y);
        let [v1, v2, v3] = verts;

        let (x1, y1) = (v1.x as i64, v1.y as i64);
        let (x2, y2) = (v2.x as i64, v2.y as i64);
        let (x3, y3) = (v3.x as i64, v3.y as i64);

        // Trivial rejection
        if y3 <= clip.min_y as i64 || y1 > clip.max_y as i64 || y1 == y3 {
            return Ok(None);
        }
        let min_vx = x1.min(x2).min(x3);
        let max_vx = x1.max(x2).max(x3);
        if max_vx <= clip.min_x as i64 || min_vx > clip.max_x as i64 {
            return Ok(None);
        }

        // Width of the triangle at v2.y, measured from v2 to the long edge.
        // Positive: v2 is left of the v1-v3 edge.
        let longest = (((x3 - x1) * (y2 - y1)) << FRAC_BITS) / (y3 - y1) + ((x1 - x2) << FRAC_BITS);
        if longest == 0 {
            return Ok(None);
        }

        let first_row = y1.max(clip.min_y as i64);
        let last_row = (y3 - 1).min(clip.max_y as i64);
        let rows = (last_row - first_row + 1) as usize;
        if rows > MAX_SCANLINES {
            return Err(RenderError::ScanlineOverflow {
                rows,
                max: MAX_SCANLINES,
            });
        }

        // Twice the signed area; same sign as `longest`
        let area2 = (x3 - x1) * (y2 - y1) + (x1 - x2) * (y3 - y1);
        let mut dpdx = [0i64; N];
        for (i, delta) in dpdx.iter_mut().enumerate() {
            let (p1, p2, p3) = (v1.p[i] as i128, v2.p[i] as i128, v3.p[i] as i128);
            let numer = (p3 - p1) * (y2 - y1) as i128 + (p1 - p2) * (y3 - y1) as i128;
            *delta = ((numer << FRAC_BITS) / area2 as i128) as i64;
        }

        let setup = &mut *self.setup;
        setup.spans.clear();
        setup.start_y = first_row as i32;
        setup.end_y = last_row as i32;
        setup.dpdx = dpdx;

        let v2_left = longest > 0;
        let mut long = Edge::new(&v1, &v3);
        let mut short = Edge::new(&v1, &v2);

        for y in y1..=last_row {
            if y == y2 {
                short = Edge::new(&v2, &v3);
            }

            if y >= first_row {
                let (left, right) = if v2_left {
                    (&short, &long)
                } else {
                    (&long, &short)
                };
                setup.spans.push(Self::span(left, right, &dpdx, clip));
            }

            long.step();
            short.step();
        }

        Ok(Some(&*self.setup))
    }

    /// Extract the span for the current row and clip it horizontally
    #[inline(always)]
    fn span(left: &Edge<N>, right: &Edge<N>, dpdx: &[i64; N], clip: &ClipRect) -> ScanlineSpan<N> {
        let mut start_x = ((left.x - HALF + CEIL_BIAS) >> FRAC_BITS) as i32;
        let end_x = (((right.x - HALF + CEIL_BIAS) >> FRAC_BITS) - 1) as i32;

        // Offset from the left edge to the first pixel centre (16.16, < 1 pixel)
        let offset = (((start_x as i64) << FRAC_BITS) + HALF - left.x) as i128;
        let mut p = [0i64; N];
        for i in 0..N {
            p[i] = left.p[i] + ((offset * dpdx[i] as i128) >> FRAC_BITS) as i64;
        }

        if start_x < clip.min_x {
            let skip = (clip.min_x - start_x) as i128;
            for i in 0..N {
                p[i] = (p[i] as i128 + skip * dpdx[i] as i128) as i64;
            }
            start_x = clip.min_x;
        }

        ScanlineSpan {
            start_x,
            end_x: end_x.min(clip.max_x),
            p,
        }
    }
}

impl<const N: usize> Default for ScanConverter<N> {
    fn default() -> Self {
        Self::new()
    }
}
