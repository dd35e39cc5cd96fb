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

//! Frame compositor
//!
//! Owns the color buffers and the Z-buffer of one pipeline instance. The
//! pipeline draws into the back buffer; the display layer reads the front
//! buffer, which only ever holds a completed frame.
//!
//! # Frame lifecycle
//!
//! ```text
//! begin_frame ──> (draw into back buffer) ──> end_frame ──> swap if latched
//!                                         └─> abort_frame (front untouched)
//! ```
//!
//! With [`PresentCadence::EveryOtherFrame`] only every second completed frame
//! is latched to the display, matching boards whose video output ran at half
//! the rendering rate.
//!
//! A single-buffered compositor still draws into a private scratch buffer.
//! Latching copies the scratch contents into the one visible buffer, so an
//! aborted frame never reaches the display in either configuration.

use crate::core::error::{RenderError, Result};
use crate::core::pipeline::blend::{Color, PixelFormat};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// How often completed frames reach the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresentCadence {
    #[default]
    EveryFrame,
    /// Latch frames 1, 3, 5, ...; drop the frames in between
    EveryOtherFrame,
}

impl PresentCadence {
    /// Whether completed frame number `frame` (1-based) is latched
    fn latches(self, frame: u64) -> bool {
        match self {
            PresentCadence::EveryFrame => true,
            PresentCadence::EveryOtherFrame => frame % 2 == 1,
        }
    }
}

/// Front-buffer pixels that `present` leaves untouched in the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransparencyKey {
    #[default]
    None,
    /// The all-zero pixel word
    ZeroPixel,
    /// Pen bit (15-bit formats) or alpha bit 31 (ARGB8888) clear
    HighBitClear,
}

impl TransparencyKey {
    #[inline]
    fn is_transparent(self, format: PixelFormat, word: u32) -> bool {
        match self {
            TransparencyKey::None => false,
            TransparencyKey::ZeroPixel => word == 0,
            TransparencyKey::HighBitClear => match format {
                PixelFormat::Rgb555 | PixelFormat::Rgb555Pen => word & 0x8000 == 0,
                PixelFormat::Argb8888 => word & 0x8000_0000 == 0,
            },
        }
    }
}

/// Serializable compositor contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositorState {
    /// Configured buffer count; `buffers` also holds the scratch buffer
    /// when this is 1
    pub buffer_count: usize,
    pub buffers: Vec<Vec<u32>>,
    pub depth: Vec<u32>,
    pub front: usize,
    pub back: usize,
    pub frame_count: u64,
    pub changed: bool,
}

/// Color buffers, Z-buffer and page-flip state
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    width: usize,
    height: usize,
    format: PixelFormat,
    cadence: PresentCadence,
    key: TransparencyKey,

    buffer_count: usize,
    buffers: Vec<Vec<u32>>,
    depth: Vec<u32>,
    front: usize,
    back: usize,

    /// Completed (not aborted) frames since creation
    frame_count: u64,
    changed: bool,
}

impl FrameCompositor {
    /// Create a compositor with `buffer_count` color buffers (at least one)
    pub fn new(
        width: usize,
        height: usize,
        buffer_count: usize,
        format: PixelFormat,
        cadence: PresentCadence,
        key: TransparencyKey,
    ) -> Self {
        let buffer_count = buffer_count.max(1);
        let size = width * height;
        Self {
            width,
            height,
            format,
            cadence,
            key,
            buffer_count,
            buffers: vec![vec![0; size]; buffer_count.max(2)],
            depth: vec![0; size],
            front: 0,
            back: 1,
            frame_count: 0,
            changed: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Visible buffer count as configured, not counting the scratch buffer
    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Clear word for a background color
    ///
    /// The pen/alpha bit stays clear so cleared pixels are keyed out by
    /// [`TransparencyKey::HighBitClear`].
    pub fn clear_word(&self, color: Color) -> u32 {
        let word = self.format.pack(color);
        match self.format {
            PixelFormat::Rgb555 | PixelFormat::Rgb555Pen => word & 0x7FFF,
            PixelFormat::Argb8888 => word & 0x00FF_FFFF,
        }
    }

    /// Start drawing a frame: clear Z and optionally the back buffer
    pub fn begin_frame(&mut self, clear_color: Option<Color>, z_clear: u32) {
        self.depth.fill(z_clear);
        if let Some(color) = clear_color {
            let word = self.clear_word(color);
            self.buffers[self.back].fill(word);
        }
    }

    /// Make the back buffer visible
    ///
    /// Multi-buffered compositors rotate buffer roles. A single-buffered one
    /// copies the scratch buffer into its only visible buffer.
    pub fn swap(&mut self) {
        if self.buffer_count == 1 {
            let (front, back) = (self.front, self.back);
            let (visible, scratch) = if front < back {
                let (head, tail) = self.buffers.split_at_mut(back);
                (&mut head[front], &tail[0])
            } else {
                let (head, tail) = self.buffers.split_at_mut(front);
                (&mut tail[0], &head[back])
            };
            visible.copy_from_slice(scratch);
        } else {
            self.front = self.back;
            self.back = (self.back + 1) % self.buffers.len();
        }
    }

    /// Finish a frame; latch it to the display according to the cadence
    ///
    /// Returns whether the front buffer changed.
    pub fn end_frame(&mut self) -> bool {
        self.frame_count += 1;
        self.changed = self.cadence.latches(self.frame_count);
        if self.changed {
            self.swap();
        }
        log::debug!(
            "frame {} complete, latched={}",
            self.frame_count,
            self.changed
        );
        self.changed
    }

    /// Drop the frame in progress; the previous front buffer stays visible
    pub fn abort_frame(&mut self) {
        self.changed = false;
        log::error!(
            "frame {} aborted, keeping previous front buffer",
            self.frame_count + 1
        );
    }

    /// Whether the most recent `end_frame` updated the front buffer
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// Most recently completed frame
    pub fn front(&self) -> &[u32] {
        &self.buffers[self.front]
    }

    /// Front buffer as raw bytes (native endianness)
    pub fn front_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.front())
    }

    pub fn back(&self) -> &[u32] {
        &self.buffers[self.back]
    }

    pub fn back_mut(&mut self) -> &mut [u32] {
        &mut self.buffers[self.back]
    }

    pub fn depth(&self) -> &[u32] {
        &self.depth
    }

    pub fn z_mut(&mut self) -> &mut [u32] {
        &mut self.depth
    }

    /// Back buffer and Z-buffer together, for fragment commit
    pub fn targets_mut(&mut self) -> (&mut [u32], &mut [u32]) {
        (&mut self.buffers[self.back], &mut self.depth)
    }

    /// Copy the whole front buffer into an ARGB8888 surface
    ///
    /// `dest` is row-major with `dest_width` pixels per row. Keyed pixels
    /// leave the destination as it was.
    pub fn present(&self, dest: &mut [u32], dest_width: usize) -> Result<()> {
        self.copy_region(dest, dest_width, 0, 0, self.width, self.height)
    }

    /// Copy a front-buffer rectangle to the same position in `dest`
    ///
    /// # Errors
    ///
    /// `Config` if the rectangle leaves the frame or does not fit `dest`.
    pub fn copy_region(
        &self,
        dest: &mut [u32],
        dest_width: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<()> {
        let right = x.checked_add(width);
        let bottom = y.checked_add(height);
        let fits_frame = right.is_some_and(|r| r <= self.width)
            && bottom.is_some_and(|b| b <= self.height);
        let fits_dest = right.is_some_and(|r| r <= dest_width)
            && bottom
                .and_then(|b| b.checked_mul(dest_width))
                .is_some_and(|end| end <= dest.len());
        if !fits_frame || !fits_dest {
            return Err(RenderError::Config(format!(
                "present region {}x{} at ({}, {}) does not fit",
                width, height, x, y
            )));
        }

        let front = self.front();
        for row in y..y + height {
            let src = &front[row * self.width + x..row * self.width + x + width];
            let dst = &mut dest[row * dest_width + x..row * dest_width + x + width];
            for (d, &s) in dst.iter_mut().zip(src) {
                if !self.key.is_transparent(self.format, s) {
                    *d = self.format.to_argb8888(s);
                }
            }
        }
        Ok(())
    }

    /// Capture buffers and flip state
    pub fn state(&self) -> CompositorState {
        CompositorState {
            buffer_count: self.buffer_count,
            buffers: self.buffers.clone(),
            depth: self.depth.clone(),
            front: self.front,
            back: self.back,
            frame_count: self.frame_count,
            changed: self.changed,
        }
    }

    /// Restore a captured state
    ///
    /// # Errors
    ///
    /// `Snapshot` if the buffer geometry does not match this compositor.
    pub fn restore(&mut self, state: CompositorState) -> Result<()> {
        let size = self.width * self.height;
        let count = self.buffers.len();
        if state.buffer_count != self.buffer_count
            || state.buffers.len() != count
            || state.buffers.iter().any(|b| b.len() != size)
            || state.depth.len() != size
            || state.front >= count
            || state.back >= count
        {
            return Err(RenderError::Snapshot(
                "compositor geometry does not match snapshot".into(),
            ));
        }

        self.buffers = state.buffers;
        self.depth = state.depth;
        self.front = state.front;
        self.back = state.back;
        self.frame_count = state.frame_count;
        self.changed = state.changed;
        Ok(())
    }
}
