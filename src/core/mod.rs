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

//! Rasterization core components
//!
//! - [`raster`]: triangle scan conversion and polygon clipping
//! - [`pipeline`]: command decoding, transform, shading and the frame state machine
//! - [`compositor`]: color buffers, Z-buffer and page flipping
//! - [`config`]: per-variant pipeline configuration
//! - [`fixed`]: fixed-point and float format conversions
//! - [`error`]: error type shared by every component

pub mod compositor;
pub mod config;
pub mod error;
pub mod fixed;
pub mod pipeline;
pub mod raster;
