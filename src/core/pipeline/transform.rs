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

//! Geometry transformation and lighting
//!
//! Model-space polygons pass through the top of a bounded matrix stack, are
//! lit by one directional light, then projected through a [`Viewport`].
//!
//! # Conventions
//!
//! - Matrices are row-major and multiply column vectors: `p' = M * p`
//! - Eye space looks down +Z; screen Y grows downwards
//! - Projection: `screen = center + focal * (x, y) / z`
//! - Intensity is 8.8 fixed point, `256` = full brightness

use crate::core::error::{RenderError, Result};
use serde::{Deserialize, Serialize};

/// Intensity value for full brightness (1.0 in 8.8)
pub const FULL_INTENSITY: u16 = 256;

/// 4x4 transformation matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4 {
    pub m: [[f32; 4]; 4],
}

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Build from 16 row-major values
    pub fn from_rows(values: [f32; 16]) -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, value) in values.into_iter().enumerate() {
            m[i / 4][i % 4] = value;
        }
        Self { m }
    }

    /// Row-major values
    pub fn to_rows(&self) -> [f32; 16] {
        let mut values = [0.0; 16];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.m[i / 4][i % 4];
        }
        values
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut t = Self::IDENTITY;
        t.m[0][3] = x;
        t.m[1][3] = y;
        t.m[2][3] = z;
        t
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        let mut s = Self::IDENTITY;
        s.m[0][0] = x;
        s.m[1][1] = y;
        s.m[2][2] = z;
        s
    }

    /// Rotation about the Y axis by `radians`
    pub fn rotation_y(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        let mut r = Self::IDENTITY;
        r.m[0][0] = c;
        r.m[0][2] = s;
        r.m[2][0] = -s;
        r.m[2][2] = c;
        r
    }

    /// Matrix product `self * other`
    pub fn mul(&self, other: &Matrix4) -> Matrix4 {
        let mut out = [[0.0f32; 4]; 4];
        for (row, out_row) in out.iter_mut().enumerate() {
            for (col, value) in out_row.iter_mut().enumerate() {
                *value = (0..4).map(|k| self.m[row][k] * other.m[k][col]).sum();
            }
        }
        Matrix4 { m: out }
    }

    /// Transform a point (w = 1)
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.m;
        [
            m[0][0] * p[0] + m[0][1] * p[1] + m[0][2] * p[2] + m[0][3],
            m[1][0] * p[0] + m[1][1] * p[1] + m[1][2] * p[2] + m[1][3],
            m[2][0] * p[0] + m[2][1] * p[1] + m[2][2] * p[2] + m[2][3],
        ]
    }

    /// Transform a direction (w = 0); the result is not renormalised
    pub fn transform_normal(&self, n: [f32; 3]) -> [f32; 3] {
        let m = &self.m;
        [
            m[0][0] * n[0] + m[0][1] * n[1] + m[0][2] * n[2],
            m[1][0] * n[0] + m[1][1] * n[1] + m[1][2] * n[2],
            m[2][0] * n[0] + m[2][1] * n[1] + m[2][2] * n[2],
        ]
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Bounded matrix stack
///
/// Always holds at least its base entry; the top entry is the active
/// transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixStack {
    entries: Vec<Matrix4>,
    capacity: usize,
}

impl MatrixStack {
    /// Create a stack holding up to `capacity` entries (including the base)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = Vec::with_capacity(capacity);
        entries.push(Matrix4::IDENTITY);
        Self { entries, capacity }
    }

    /// Active matrix
    pub fn top(&self) -> &Matrix4 {
        // The base entry is never popped
        &self.entries[self.entries.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Matrix4 {
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    /// Number of entries currently held
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Duplicate the top entry
    pub fn push(&mut self) -> Result<()> {
        if self.entries.len() == self.capacity {
            return Err(RenderError::MatrixStackOverflow {
                depth: self.capacity,
            });
        }
        let top = *self.top();
        self.entries.push(top);
        Ok(())
    }

    /// Discard the top entry
    pub fn pop(&mut self) -> Result<()> {
        if self.entries.len() == 1 {
            return Err(RenderError::MatrixStackUnderflow);
        }
        self.entries.pop();
        Ok(())
    }

    /// Replace the top entry
    pub fn load(&mut self, m: Matrix4) {
        *self.top_mut() = m;
    }

    pub fn load_identity(&mut self) {
        self.load(Matrix4::IDENTITY);
    }

    /// Post-multiply the top entry: `top = top * m`
    pub fn multiply(&mut self, m: &Matrix4) {
        let product = self.top().mul(m);
        self.load(product);
    }

    /// Drop everything above the base entry and reset it to identity
    pub fn reset(&mut self) {
        self.entries.truncate(1);
        self.load_identity();
    }
}

/// Directional light with an ambient term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Direction the light travels in (eye space)
    pub direction: [f32; 3],
    pub diffuse: f32,
    pub ambient: f32,
}

impl DirectionalLight {
    /// Lighting intensity for a surface with normal `normal`
    ///
    /// `ambient + diffuse * max(0, n . -dir)`, clamped to 0..=1 and returned
    /// as 8.8 fixed point (0..=256).
    ///
    /// # Examples
    ///
    /// ```
    /// use arcpoly::core::pipeline::transform::DirectionalLight;
    ///
    /// let light = DirectionalLight { direction: [0.0, 0.0, 1.0], diffuse: 0.75, ambient: 0.25 };
    /// assert_eq!(light.intensity([0.0, 0.0, -1.0]), 256);
    /// assert_eq!(light.intensity([0.0, 0.0, 1.0]), 64);
    /// ```
    pub fn intensity(&self, normal: [f32; 3]) -> u16 {
        let n = normalize(normal);
        let d = normalize(self.direction);
        let lambert = -(n[0] * d[0] + n[1] * d[1] + n[2] * d[2]);
        let value = (self.ambient + self.diffuse * lambert.max(0.0)).clamp(0.0, 1.0);
        (value * FULL_INTENSITY as f32).round() as u16
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: [0.0, 0.0, 1.0],
            diffuse: 0.0,
            ambient: 1.0,
        }
    }
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        return v;
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

/// Screen rectangle and projection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub center_x: f32,
    pub center_y: f32,
    /// Distance to the projection plane, in pixels
    pub focal: f32,
    /// Near clip distance
    pub near: f32,
}

impl Viewport {
    /// Viewport covering a whole raster with a 90 degree horizontal field of view
    pub fn for_raster(width: usize, height: usize) -> Self {
        Self {
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            focal: width as f32 / 2.0,
            near: 1.0,
        }
    }

    /// Project an eye-space point to screen coordinates
    ///
    /// The caller guarantees `z > 0` (near clipping).
    #[inline]
    pub fn project(&self, p: [f32; 3]) -> (f32, f32) {
        let scale = self.focal / p[2];
        (self.center_x + p[0] * scale, self.center_y + p[1] * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let m = Matrix4::identity();
        assert_eq!(m.transform_point([1.0, -2.0, 3.0]), [1.0, -2.0, 3.0]);
        assert_eq!(m.mul(&m), m);
    }

    #[test]
    fn test_translation_and_scale_compose() {
        let m = Matrix4::translation(10.0, 0.0, 5.0).mul(&Matrix4::scale(2.0, 2.0, 2.0));
        // Scale first, then translate
        assert_eq!(m.transform_point([1.0, 1.0, 1.0]), [12.0, 2.0, 7.0]);
        // Directions ignore translation
        assert_eq!(m.transform_normal([1.0, 0.0, 0.0]), [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_row_round_trip() {
        let values: [f32; 16] = std::array::from_fn(|i| i as f32);
        assert_eq!(Matrix4::from_rows(values).to_rows(), values);
        assert_eq!(Matrix4::from_rows(values).m[1][2], 6.0);
    }

    #[test]
    fn test_matrix_stack_push_pop() {
        let mut stack = MatrixStack::new(4);
        stack.load(Matrix4::translation(1.0, 2.0, 3.0));
        stack.push().unwrap();
        stack.multiply(&Matrix4::translation(1.0, 0.0, 0.0));
        assert_eq!(stack.top().transform_point([0.0; 3]), [2.0, 2.0, 3.0]);

        stack.pop().unwrap();
        assert_eq!(stack.top().transform_point([0.0; 3]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_matrix_stack_overflow() {
        let mut stack = MatrixStack::new(2);
        stack.push().unwrap();
        let err = stack.push().unwrap_err();
        assert!(matches!(err, RenderError::MatrixStackOverflow { depth: 2 }));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_matrix_stack_underflow() {
        let mut stack = MatrixStack::new(8);
        assert!(matches!(stack.pop(), Err(RenderError::MatrixStackUnderflow)));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_light_intensity() {
        let light = DirectionalLight {
            direction: [0.0, 0.0, 1.0],
            diffuse: 0.5,
            ambient: 0.25,
        };
        // Facing the light
        assert_eq!(light.intensity([0.0, 0.0, -1.0]), 192);
        // Perpendicular and facing away get ambient only
        assert_eq!(light.intensity([1.0, 0.0, 0.0]), 64);
        assert_eq!(light.intensity([0.0, 0.0, 1.0]), 64);
        // Unnormalised normals are handled
        assert_eq!(light.intensity([0.0, 0.0, -10.0]), 192);
    }

    #[test]
    fn test_light_intensity_saturates() {
        let light = DirectionalLight {
            direction: [0.0, -1.0, 0.0],
            diffuse: 1.0,
            ambient: 0.5,
        };
        assert_eq!(light.intensity([0.0, 1.0, 0.0]), FULL_INTENSITY);
    }

    #[test]
    fn test_viewport_projection() {
        let vp = Viewport::for_raster(320, 240);
        assert_eq!(vp.project([0.0, 0.0, 5.0]), (160.0, 120.0));
        // 90 degree fov: x == z reaches the right edge
        assert_eq!(vp.project([10.0, 0.0, 10.0]), (320.0, 120.0));
    }
}
