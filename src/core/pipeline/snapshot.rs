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

//! Pipeline save/restore
//!
//! A snapshot holds what the surrounding emulator needs to resume rendering
//! exactly: matrix stack and geometry state, color and depth buffers, and the
//! frame in progress (pending display list, polygon count, abort latch).
//! Texture sheets and palettes are not included; the upload path that filled
//! them is expected to replay its own state.

use super::command::PolygonRecord;
use super::transform::{DirectionalLight, MatrixStack, Viewport};
use super::PipelineState;
use crate::core::compositor::CompositorState;
use crate::core::error::{RenderError, Result};
use crate::core::raster::ClipRect;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable pipeline state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub version: u32,
    pub captured_at: DateTime<Utc>,

    pub state: PipelineState,
    pub matrices: MatrixStack,
    pub light: DirectionalLight,
    pub viewport: Viewport,
    pub clip: ClipRect,

    pub compositor: CompositorState,

    pub display_list: Vec<PolygonRecord>,
    pub submitted: usize,
    pub sequence: u64,
    pub frame_aborted: bool,
}

impl PipelineSnapshot {
    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| RenderError::Snapshot(format!("encode failed: {}", e)))
    }

    /// Decode a snapshot produced by [`to_bytes`](Self::to_bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| RenderError::Snapshot(format!("decode failed: {}", e)))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RenderError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}
