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

//! arcpoly: polygon rasterization core for 1990s arcade 3D hardware
//!
//! This crate reproduces the pixel output of fixed-function arcade polygon
//! chips: edge-walking triangle setup with sub-pixel precision, perspective
//! correct texturing, hardware depth rules, and the frame pacing of the
//! original boards.
//!
//! # Architecture
//!
//! - [`core::raster`]: scan conversion and clipping
//! - [`core::pipeline`]: the [`Pipeline`](core::pipeline::Pipeline) rendering context
//! - [`core::compositor`]: front/back buffers and presentation
//! - [`core::config`]: hardware variant presets and TOML configuration
//!
//! # Example
//!
//! ```
//! use arcpoly::core::config::{PipelineConfig, VariantPreset};
//! use arcpoly::core::pipeline::blend::Color;
//! use arcpoly::core::pipeline::command::{PolyAttrs, PolygonRecord, ScreenVertex};
//! use arcpoly::core::pipeline::Pipeline;
//!
//! let config = PipelineConfig::preset(VariantPreset::PerspectiveTextured);
//! let mut pipeline = Pipeline::new(config)?;
//!
//! pipeline.begin_frame();
//! pipeline.submit(PolygonRecord::Flat {
//!     vertices: [
//!         ScreenVertex::new(10, 10, 2.0),
//!         ScreenVertex::new(200, 20, 2.0),
//!         ScreenVertex::new(40, 180, 2.0),
//!     ],
//!     color: Color::new(255, 128, 0),
//!     attrs: PolyAttrs::default(),
//! })?;
//! assert!(pipeline.end_frame()?);
//! # Ok::<(), arcpoly::RenderError>(())
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`], an alias for
//! `Result<T, RenderError>`.

pub mod core;

// Re-export commonly used types
pub use core::error::{RenderError, Result};
