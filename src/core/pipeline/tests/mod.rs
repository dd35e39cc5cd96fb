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

//! Pipeline scenario tests

mod depth_order;
mod frame_control;
mod perspective;
mod snapshot;

use super::blend::{Color, PixelFormat};
use super::command::{PolyAttrs, PolyFlags, PolygonRecord, ScreenVertex};
use super::depth::DepthRule;
use super::texture::TexelFormat;
use super::Pipeline;
use crate::core::compositor::{PresentCadence, TransparencyKey};
use crate::core::config::{DispatchMode, PipelineConfig};

/// Small ARGB8888 configuration with one 128x128 Rgb555 sheet
fn config(width: usize, height: usize) -> PipelineConfig {
    PipelineConfig {
        width,
        height,
        pixel_format: PixelFormat::Argb8888,
        texel_format: TexelFormat::Rgb555,
        sheet_count: 1,
        sheet_width: 128,
        sheet_height: 128,
        palette_size: 0,
        matrix_stack_depth: 4,
        polygon_capacity: 64,
        dispatch: DispatchMode::Immediate,
        worker_threads: 0,
        buffer_count: 2,
        cadence: PresentCadence::EveryFrame,
        transparency_key: TransparencyKey::None,
        dither: false,
        depth_rule: DepthRule::linear_less(),
        clear_color: Some(Color::BLACK),
        viewport: None,
    }
}

fn flat(v: [(i16, i16); 3], z: f32, color: Color) -> PolygonRecord {
    PolygonRecord::Flat {
        vertices: v.map(|(x, y)| ScreenVertex::new(x, y, z)),
        color,
        attrs: PolyAttrs::default(),
    }
}

fn flat_with(v: [(i16, i16); 3], z: f32, color: Color, flags: PolyFlags) -> PolygonRecord {
    PolygonRecord::Flat {
        vertices: v.map(|(x, y)| ScreenVertex::new(x, y, z)),
        color,
        attrs: PolyAttrs {
            flags,
            ..PolyAttrs::default()
        },
    }
}

/// Triangle covering the top-left half of a `size` square
fn half_screen(size: i16) -> [(i16, i16); 3] {
    [(0, 0), (size, 0), (0, size)]
}

fn front_pixel(pipeline: &Pipeline, x: usize, y: usize) -> u32 {
    pipeline.front_buffer()[y * pipeline.config().width + x]
}
