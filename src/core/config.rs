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

//! Pipeline instance configuration
//!
//! One [`PipelineConfig`] describes one hardware variant: raster geometry,
//! pixel and texel formats, depth policy and frame pacing. Configurations are
//! stored as TOML.
//!
//! # Example
//!
//! ```toml
//! width = 384
//! height = 224
//! pixel_format = "Rgb555Pen"
//! texel_format = "Indexed8"
//! dispatch = "Immediate"
//! cadence = "EveryOtherFrame"
//! # ...
//! ```

use crate::core::compositor::{PresentCadence, TransparencyKey};
use crate::core::error::{RenderError, Result};
use crate::core::pipeline::blend::{Color, PixelFormat};
use crate::core::pipeline::depth::DepthRule;
use crate::core::pipeline::texture::TexelFormat;
use crate::core::pipeline::transform::Viewport;
use crate::core::raster::MAX_SCANLINES;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Largest raster width accepted
///
/// Heights are further limited to [`MAX_SCANLINES`], the span buffer depth
/// of the scan converter.
pub const MAX_RASTER_SIZE: usize = 4096;

/// Largest texture sheet edge accepted
pub const MAX_SHEET_SIZE: usize = 32768;

/// When submitted polygons are rasterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Rasterize each polygon as it is submitted
    Immediate,
    /// Accumulate polygons and replay them at `end_frame`
    DisplayList,
}

/// Built-in hardware archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantPreset {
    /// Reciprocal Z with priority bits, perspective-correct ARGB textures
    PerspectiveTextured,
    /// Palette-indexed textured spans on a 15-bit pen framebuffer
    PaletteSpans,
    /// Matrix-stack 3D pipeline with linear Z
    Transform3d,
}

impl FromStr for VariantPreset {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "perspectivetextured" => Ok(VariantPreset::PerspectiveTextured),
            "palettespans" => Ok(VariantPreset::PaletteSpans),
            "transform3d" => Ok(VariantPreset::Transform3d),
            _ => Err(RenderError::Config(format!("unknown preset '{}'", s))),
        }
    }
}

/// Configuration of one pipeline instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub width: usize,
    pub height: usize,
    pub pixel_format: PixelFormat,

    pub texel_format: TexelFormat,
    pub sheet_count: usize,
    pub sheet_width: usize,
    pub sheet_height: usize,
    pub palette_size: usize,

    pub matrix_stack_depth: usize,
    /// Polygons accepted per frame
    pub polygon_capacity: usize,
    pub dispatch: DispatchMode,
    /// 0 shades on the calling thread
    pub worker_threads: usize,

    pub buffer_count: usize,
    pub cadence: PresentCadence,
    pub transparency_key: TransparencyKey,
    pub dither: bool,

    pub depth_rule: DepthRule,
    /// Back buffer clear color at `begin_frame`; `None` keeps old contents
    #[serde(default)]
    pub clear_color: Option<Color>,
    /// Initial viewport; defaults to the whole raster
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

impl PipelineConfig {
    /// Configuration for a built-in archetype
    pub fn preset(preset: VariantPreset) -> Self {
        match preset {
            VariantPreset::PerspectiveTextured => Self {
                width: 496,
                height: 384,
                pixel_format: PixelFormat::Argb8888,
                depth_rule: DepthRule::reciprocal_priority(),
                texel_format: TexelFormat::Argb1555,
                sheet_count: 4,
                sheet_width: 512,
                sheet_height: 512,
                palette_size: 0,
                matrix_stack_depth: 8,
                polygon_capacity: 4096,
                dispatch: DispatchMode::DisplayList,
                worker_threads: 2,
                buffer_count: 2,
                cadence: PresentCadence::EveryFrame,
                transparency_key: TransparencyKey::None,
                dither: false,
                clear_color: Some(Color::BLACK),
                viewport: None,
            },
            VariantPreset::PaletteSpans => Self {
                width: 384,
                height: 224,
                pixel_format: PixelFormat::Rgb555Pen,
                depth_rule: DepthRule::linear_translucent_readonly(),
                texel_format: TexelFormat::Indexed8,
                sheet_count: 2,
                sheet_width: 256,
                sheet_height: 256,
                palette_size: 4096,
                matrix_stack_depth: 4,
                polygon_capacity: 2048,
                dispatch: DispatchMode::Immediate,
                worker_threads: 0,
                buffer_count: 2,
                cadence: PresentCadence::EveryOtherFrame,
                transparency_key: TransparencyKey::HighBitClear,
                dither: true,
                clear_color: Some(Color::BLACK),
                viewport: None,
            },
            VariantPreset::Transform3d => Self {
                width: 640,
                height: 480,
                pixel_format: PixelFormat::Rgb555,
                depth_rule: DepthRule::linear_less(),
                texel_format: TexelFormat::Indexed4,
                sheet_count: 8,
                sheet_width: 256,
                sheet_height: 256,
                palette_size: 4096,
                matrix_stack_depth: 16,
                polygon_capacity: 8192,
                dispatch: DispatchMode::DisplayList,
                worker_threads: 0,
                buffer_count: 2,
                cadence: PresentCadence::EveryFrame,
                transparency_key: TransparencyKey::ZeroPixel,
                dither: true,
                clear_color: Some(Color::BLACK),
                viewport: None,
            },
        }
    }

    /// Active viewport at pipeline creation
    pub fn viewport(&self) -> Viewport {
        self.viewport
            .unwrap_or_else(|| Viewport::for_raster(self.width, self.height))
    }

    /// Check limits the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(RenderError::Config(msg));

        if self.width == 0 || self.height == 0 || self.width > MAX_RASTER_SIZE {
            return fail(format!("raster {}x{} out of range", self.width, self.height));
        }
        if self.height > MAX_SCANLINES {
            return fail(format!(
                "raster height {} exceeds {} scanlines",
                self.height, MAX_SCANLINES
            ));
        }
        if self.sheet_count == 0 {
            return fail("at least one texture sheet is required".into());
        }
        if self.sheet_width == 0
            || self.sheet_height == 0
            || self.sheet_width > MAX_SHEET_SIZE
            || self.sheet_height > MAX_SHEET_SIZE
        {
            return fail(format!(
                "texture sheet {}x{} out of range",
                self.sheet_width, self.sheet_height
            ));
        }
        let indexed = matches!(self.texel_format, TexelFormat::Indexed4 | TexelFormat::Indexed8);
        if indexed && self.palette_size == 0 {
            return fail("indexed texel formats need a palette".into());
        }
        if self.matrix_stack_depth == 0 {
            return fail("matrix stack depth must be at least 1".into());
        }
        if self.polygon_capacity == 0 {
            return fail("polygon capacity must be at least 1".into());
        }
        if self.buffer_count == 0 || self.buffer_count > 4 {
            return fail(format!("buffer count {} out of range 1..=4", self.buffer_count));
        }
        if let Some(vp) = &self.viewport {
            if vp.near <= 0.0 || vp.focal <= 0.0 || vp.width <= 0 || vp.height <= 0 {
                return fail("viewport needs positive size, focal length and near plane".into());
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| RenderError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RenderError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        log::info!("loaded pipeline config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Save to a configuration file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::preset(VariantPreset::Transform3d)
    }
}
