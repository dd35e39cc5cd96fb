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

//! Polygon pipeline
//!
//! [`Pipeline`] is one rendering context of one hardware variant. It accepts
//! decoded [`PolygonRecord`]s between `begin_frame` and `end_frame`, applies
//! matrix and state records in order, and rasterizes polygons into the back
//! buffer of its [`FrameCompositor`].
//!
//! # State machine
//!
//! ```text
//!            begin_frame              end_frame
//!   Idle ──────────────> Accumulating ─────────> Replaying ──> Idle
//!    ^                        │                                  │
//!    └──── abort_frame ───────┴──────────────────────────────────┘
//! ```
//!
//! In `Immediate` dispatch polygons are rasterized as they arrive and
//! `Replaying` only drains outstanding worker jobs. In `DisplayList` dispatch
//! every record is stored and replayed at `end_frame`.
//!
//! # Resource exhaustion
//!
//! A fatal error (command buffer full, matrix stack misuse, scanline
//! overflow) aborts the frame: outstanding work is discarded, the front
//! buffer keeps the last completed frame, and every further submission is
//! dropped until the next `begin_frame`. The error is returned exactly once.

pub mod blend;
pub mod command;
pub mod depth;
pub mod render;
pub mod snapshot;
pub mod texture;
pub mod transform;
pub mod worker;

#[cfg(test)]
mod tests;

use crate::core::compositor::FrameCompositor;
use crate::core::config::{DispatchMode, PipelineConfig};
use crate::core::error::{RenderError, Result};
use crate::core::raster::ClipRect;
use command::{CommandDecoder, PolygonRecord};
use render::{
    commit, prepare_polygon, FragmentBatch, GeometryState, PolygonJob, ShadeParams,
    TriangleRasterizer,
};
use serde::{Deserialize, Serialize};
use snapshot::{PipelineSnapshot, SNAPSHOT_VERSION};
use std::sync::Arc;
use texture::TextureStore;
use worker::RenderPool;

/// Rendering context state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Accumulating,
    Replaying,
}

/// One polygon pipeline instance
pub struct Pipeline {
    config: PipelineConfig,
    params: ShadeParams,
    state: PipelineState,

    geometry: GeometryState,
    textures: Arc<TextureStore>,
    compositor: FrameCompositor,

    rasterizer: TriangleRasterizer,
    pool: Option<RenderPool>,
    decoder: CommandDecoder,

    display_list: Vec<PolygonRecord>,
    /// Polygons accepted this frame
    submitted: usize,
    /// Next polygon sequence number this frame
    sequence: u64,
    frame_aborted: bool,
}

impl Pipeline {
    /// Build a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let params = ShadeParams {
            width: config.width,
            format: config.pixel_format,
            depth_rule: config.depth_rule,
            dither: config.dither,
        };
        let mut geometry =
            GeometryState::new(config.width, config.height, config.matrix_stack_depth);
        geometry.viewport = config.viewport();

        let textures = Arc::new(TextureStore::new(
            config.texel_format,
            config.sheet_count,
            config.sheet_width,
            config.sheet_height,
            config.palette_size,
        ));
        let compositor = FrameCompositor::new(
            config.width,
            config.height,
            config.buffer_count,
            config.pixel_format,
            config.cadence,
            config.transparency_key,
        );
        let pool = match config.worker_threads {
            0 => None,
            n => Some(RenderPool::new(n)?),
        };

        log::info!(
            "pipeline {}x{} {:?}, {:?} dispatch, {} worker threads",
            config.width,
            config.height,
            config.pixel_format,
            config.dispatch,
            config.worker_threads
        );

        Ok(Self {
            config,
            params,
            state: PipelineState::Idle,
            geometry,
            textures,
            compositor,
            rasterizer: TriangleRasterizer::new(),
            pool,
            decoder: CommandDecoder::new(),
            display_list: Vec::new(),
            submitted: 0,
            sequence: 0,
            frame_aborted: false,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn geometry(&self) -> &GeometryState {
        &self.geometry
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    /// Whether the current frame hit a fatal error
    pub fn is_frame_aborted(&self) -> bool {
        self.frame_aborted
    }

    /// Polygons accepted in the current frame
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Start a new frame
    ///
    /// Waits for outstanding work of an unfinished previous frame and
    /// discards it, then clears the Z-buffer and (if configured) the back
    /// buffer.
    pub fn begin_frame(&mut self) {
        if self.state != PipelineState::Idle && !self.frame_aborted {
            log::warn!("begin_frame with a frame in progress, discarding it");
            self.compositor.abort_frame();
        }
        self.discard_outstanding();

        let z_clear = self.config.depth_rule.clear_value();
        self.compositor.begin_frame(self.config.clear_color, z_clear);
        self.display_list.clear();
        self.submitted = 0;
        self.sequence = 0;
        self.frame_aborted = false;
        self.state = PipelineState::Accumulating;
        log::debug!("frame {} started", self.compositor.frame_count() + 1);
    }

    /// Append one record to the current frame
    ///
    /// Submitting while idle starts a frame. Records submitted after a fatal
    /// error are dropped until the next `begin_frame`.
    ///
    /// # Arguments
    ///
    /// * `record` - Polygon, matrix or state record. In `Immediate` dispatch
    ///   it is executed before this call returns; in `DisplayList` dispatch it
    ///   is queued until `end_frame`.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the record is executed or queued, or dropped because
    /// the frame was already aborted
    ///
    /// # Errors
    ///
    /// - `CommandBufferFull` when the frame already holds `polygon_capacity`
    ///   polygons
    /// - Matrix stack and scanline errors in `Immediate` dispatch
    ///
    /// Every error returned here has aborted the frame.
    pub fn submit(&mut self, record: PolygonRecord) -> Result<()> {
        if self.frame_aborted {
            log::trace!("frame aborted, dropping record");
            return Ok(());
        }
        if self.state == PipelineState::Idle {
            self.begin_frame();
        }

        if record.is_polygon() {
            if self.submitted >= self.config.polygon_capacity {
                return Err(self.fail_frame(RenderError::CommandBufferFull {
                    capacity: self.config.polygon_capacity,
                }));
            }
            self.submitted += 1;
        }

        match self.config.dispatch {
            DispatchMode::Immediate => {
                if let Err(err) = self.execute(&record) {
                    return Err(self.fail_frame(err));
                }
            }
            DispatchMode::DisplayList => self.display_list.push(record),
        }
        Ok(())
    }

    /// Decode a command word stream and submit every record
    ///
    /// Unknown tags are skipped. A truncated stream aborts the frame.
    ///
    /// # Arguments
    ///
    /// * `words` - Encoded records, each starting with a tagged header word
    pub fn submit_words(&mut self, words: &[u32]) -> Result<()> {
        if self.frame_aborted {
            return Ok(());
        }
        let records = match self.decoder.decode(words) {
            Ok(records) => records,
            Err(err) => return Err(self.fail_frame(err)),
        };
        for record in records {
            self.submit(record)?;
        }
        Ok(())
    }

    /// Finish the current frame
    ///
    /// Replays the display list, waits for every worker job, commits the
    /// remaining fragments in submission order and hands the back buffer to
    /// the compositor.
    ///
    /// # Returns
    ///
    /// Whether the front buffer changed. An aborted frame returns
    /// `Ok(false)` and leaves the front buffer alone.
    pub fn end_frame(&mut self) -> Result<bool> {
        if self.frame_aborted {
            self.frame_aborted = false;
            self.state = PipelineState::Idle;
            return Ok(false);
        }
        if self.state == PipelineState::Idle {
            log::warn!("end_frame without begin_frame");
            return Ok(false);
        }

        self.state = PipelineState::Replaying;
        let records = std::mem::take(&mut self.display_list);
        log::debug!("replaying {} records", records.len());
        for record in &records {
            if let Err(err) = self.execute(record) {
                let err = self.fail_frame(err);
                self.frame_aborted = false;
                self.state = PipelineState::Idle;
                return Err(err);
            }
        }

        if let Err(err) = self.flush() {
            let err = self.fail_frame(err);
            self.frame_aborted = false;
            self.state = PipelineState::Idle;
            return Err(err);
        }

        let changed = self.compositor.end_frame();
        self.state = PipelineState::Idle;
        Ok(changed)
    }

    /// Abandon the current frame without presenting it
    pub fn abort_frame(&mut self) {
        self.discard_outstanding();
        self.display_list.clear();
        self.compositor.abort_frame();
        self.frame_aborted = false;
        self.state = PipelineState::Idle;
    }

    /// Copy texels into a texture sheet
    ///
    /// # Arguments
    ///
    /// * `sheet` - Target sheet id
    /// * `x`, `y` - Top-left texel of the destination rectangle
    /// * `width`, `height` - Rectangle size in texels
    /// * `data` - Row-major texel words in the configured texel format
    ///
    /// # Errors
    ///
    /// `InvalidSheet` or `InvalidTextureUpload`; the frame is unaffected.
    pub fn upload_texture(
        &mut self,
        sheet: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        data: &[u16],
    ) -> Result<()> {
        Arc::make_mut(&mut self.textures).upload_texture(sheet, x, y, width, height, data)
    }

    /// Set transparency mask bits for a texture rectangle
    pub fn upload_mask(
        &mut self,
        sheet: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        bits: &[bool],
    ) -> Result<()> {
        Arc::make_mut(&mut self.textures).upload_mask(sheet, x, y, width, height, bits)
    }

    /// Set one palette entry (`0x00BBGGRR`)
    pub fn set_palette(&mut self, index: usize, color: u32) -> Result<()> {
        Arc::make_mut(&mut self.textures).set_palette(index, color)
    }

    /// Most recently completed frame in the native pixel format
    pub fn front_buffer(&self) -> &[u32] {
        self.compositor.front()
    }

    /// Z-buffer contents
    pub fn depth_buffer(&self) -> &[u32] {
        self.compositor.depth()
    }

    /// Whether the last `end_frame` updated the front buffer
    pub fn has_changed(&self) -> bool {
        self.compositor.has_changed()
    }

    /// Copy the front buffer into an ARGB8888 surface
    ///
    /// # Arguments
    ///
    /// * `dest` - Row-major destination surface
    /// * `dest_width` - Pixels per destination row, at least the raster width
    ///
    /// # Errors
    ///
    /// `Config` if the raster does not fit in `dest`.
    pub fn present(&self, dest: &mut [u32], dest_width: usize) -> Result<()> {
        self.compositor.present(dest, dest_width)
    }

    /// Capture the pipeline state
    ///
    /// Outstanding worker jobs are committed first so the captured buffers
    /// match what a single-threaded pipeline would hold.
    pub fn snapshot(&mut self) -> Result<PipelineSnapshot> {
        if let Err(err) = self.flush() {
            return Err(self.fail_frame(err));
        }
        Ok(PipelineSnapshot {
            version: SNAPSHOT_VERSION,
            captured_at: chrono::Utc::now(),
            state: self.state,
            matrices: self.geometry.matrices.clone(),
            light: self.geometry.light,
            viewport: self.geometry.viewport,
            clip: self.geometry.clip,
            compositor: self.compositor.state(),
            display_list: self.display_list.clone(),
            submitted: self.submitted,
            sequence: self.sequence,
            frame_aborted: self.frame_aborted,
        })
    }

    /// Restore a captured state
    ///
    /// # Errors
    ///
    /// `Snapshot` if the snapshot was taken with a different raster geometry
    /// or matrix stack depth.
    pub fn restore(&mut self, snapshot: PipelineSnapshot) -> Result<()> {
        if snapshot.matrices.capacity() != self.geometry.matrices.capacity() {
            return Err(RenderError::Snapshot(format!(
                "matrix stack depth {} does not match {}",
                snapshot.matrices.capacity(),
                self.geometry.matrices.capacity()
            )));
        }
        self.discard_outstanding();
        self.compositor.restore(snapshot.compositor)?;

        self.state = snapshot.state;
        self.geometry.matrices = snapshot.matrices;
        self.geometry.light = snapshot.light;
        self.geometry.viewport = snapshot.viewport;
        self.geometry.clip = snapshot.clip;
        self.display_list = snapshot.display_list;
        self.submitted = snapshot.submitted;
        self.sequence = snapshot.sequence;
        self.frame_aborted = snapshot.frame_aborted;
        log::info!("restored snapshot taken at {}", snapshot.captured_at);
        Ok(())
    }

    /// Apply one record: state changes directly, polygons through the
    /// rasterizer
    fn execute(&mut self, record: &PolygonRecord) -> Result<()> {
        match record {
            PolygonRecord::LoadIdentity => self.geometry.matrices.load_identity(),
            PolygonRecord::LoadMatrix(m) => self.geometry.matrices.load(*m),
            PolygonRecord::MultMatrix(m) => self.geometry.matrices.multiply(m),
            PolygonRecord::PushMatrix => self.geometry.matrices.push()?,
            PolygonRecord::PopMatrix => self.geometry.matrices.pop()?,
            PolygonRecord::SetLight(light) => self.geometry.light = *light,
            PolygonRecord::SetViewport(viewport) => self.geometry.viewport = *viewport,
            PolygonRecord::SetClipRect(rect) => {
                let raster = ClipRect::full(self.config.width, self.config.height);
                self.geometry.clip = rect.intersect(&raster);
            }
            PolygonRecord::EndOfList => log::trace!("end of display list"),
            _ => {
                let sequence = self.sequence;
                self.sequence += 1;
                let job = prepare_polygon(
                    record,
                    &self.geometry,
                    sequence,
                    self.params,
                    &self.textures,
                )?;
                if let Some(job) = job {
                    self.dispatch(job)?;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, job: PolygonJob) -> Result<()> {
        match self.pool.as_mut() {
            Some(pool) => pool.submit(job),
            None => {
                let batch = self.rasterizer.shade(&job)?;
                self.commit_batch(&batch);
                Ok(())
            }
        }
    }

    fn commit_batch(&mut self, batch: &FragmentBatch) {
        let (color, depth) = self.compositor.targets_mut();
        let written = commit(batch, &self.params, color, depth);
        log::trace!("polygon {} committed {} pixels", batch.sequence, written);
    }

    /// Wait for worker jobs and commit their batches in order
    fn flush(&mut self) -> Result<()> {
        let batches = match self.pool.as_mut() {
            Some(pool) => pool.wait()?,
            None => return Ok(()),
        };
        for batch in &batches {
            self.commit_batch(batch);
        }
        Ok(())
    }

    fn discard_outstanding(&mut self) {
        if let Some(pool) = self.pool.as_mut() {
            if pool.outstanding() > 0 {
                log::debug!("discarding {} outstanding jobs", pool.outstanding());
                let _ = pool.wait();
            }
        }
    }

    /// Abort the frame after a fatal error and hand the error back
    fn fail_frame(&mut self, err: RenderError) -> RenderError {
        log::error!("frame aborted: {}", err);
        self.discard_outstanding();
        self.display_list.clear();
        self.compositor.abort_frame();
        self.frame_aborted = true;
        err
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("submitted", &self.submitted)
            .field("frame_aborted", &self.frame_aborted)
            .field("pool", &self.pool)
            .finish()
    }
}
