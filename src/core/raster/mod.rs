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

//! Geometry rasterization
//!
//! - [`scan`]: triangle scan-converter producing clipped spans with
//!   interpolated fixed-point parameters
//! - [`clip`]: Sutherland-Hodgman polygon clipping against half-space planes

pub mod clip;
pub mod scan;

pub use clip::{
    clip_polygon, clip_polygon_planes, ClipPlane, ClipPolygon, ClipVertex, CLIP_EPSILON,
    MAX_CLIP_VERTICES,
};
pub use scan::{
    ClipRect, PolyVertex, ScanConverter, ScanlineSpan, TriangleSetup, MAX_PARAMS, MAX_SCANLINES,
};

#[cfg(test)]
mod tests;
