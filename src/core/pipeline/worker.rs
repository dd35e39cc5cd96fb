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

//! Polygon shading worker pool
//!
//! One job per polygon. Workers only scan-convert and shade; they never touch
//! the framebuffer or Z-buffer. [`RenderPool::wait`] is the frame barrier: it
//! collects every outstanding batch and returns them in submission order, so
//! the caller commits fragments exactly as a single-threaded pipeline would.

use super::render::{FragmentBatch, PolygonJob, TriangleRasterizer};
use crate::core::error::{RenderError, Result};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Counters shared by all workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub jobs: u64,
    pub fragments: u64,
}

/// Fixed-size pool of shading threads
pub struct RenderPool {
    job_tx: Option<Sender<PolygonJob>>,
    result_rx: Receiver<Result<FragmentBatch>>,
    workers: Vec<JoinHandle<()>>,
    outstanding: usize,
    stats: Arc<Mutex<PoolStats>>,
}

impl RenderPool {
    /// Spawn `threads` workers (at least one)
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<PolygonJob>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let stats = Arc::new(Mutex::new(PoolStats::default()));

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let stats = Arc::clone(&stats);
            let handle = thread::Builder::new()
                .name(format!("arcpoly-shade-{}", id))
                .spawn(move || worker_loop(id, job_rx, result_tx, stats))?;
            workers.push(handle);
        }

        log::debug!("render pool started with {} workers", threads);
        Ok(Self {
            job_tx: Some(job_tx),
            result_rx,
            workers,
            outstanding: 0,
            stats,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted since the last `wait`
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    /// Queue one polygon for shading
    pub fn submit(&mut self, job: PolygonJob) -> Result<()> {
        let tx = self.job_tx.as_ref().ok_or(RenderError::WorkerPoolDisconnected)?;
        tx.send(job).map_err(|_| RenderError::WorkerPoolDisconnected)?;
        self.outstanding += 1;
        Ok(())
    }

    /// Block until every outstanding job is shaded
    ///
    /// Batches come back sorted by sequence number. All outstanding results
    /// are drained even when one of them failed; the first failure is then
    /// returned.
    pub fn wait(&mut self) -> Result<Vec<FragmentBatch>> {
        let mut batches = Vec::with_capacity(self.outstanding);
        let mut first_error = None;

        while self.outstanding > 0 {
            let result = self
                .result_rx
                .recv()
                .map_err(|_| RenderError::WorkerPoolDisconnected)?;
            self.outstanding -= 1;
            match result {
                Ok(batch) => batches.push(batch),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        batches.sort_unstable_by_key(|b| b.sequence);
        Ok(batches)
    }
}

fn worker_loop(
    id: usize,
    jobs: Receiver<PolygonJob>,
    results: Sender<Result<FragmentBatch>>,
    stats: Arc<Mutex<PoolStats>>,
) {
    let mut rasterizer = TriangleRasterizer::new();
    for job in jobs.iter() {
        let result = rasterizer.shade(&job);
        if let Ok(batch) = &result {
            let mut stats = stats.lock();
            stats.jobs += 1;
            stats.fragments += batch.fragments.len() as u64;
        }
        if results.send(result).is_err() {
            break;
        }
    }
    log::trace!("render worker {} exiting", id);
}

impl Drop for RenderPool {
    fn drop(&mut self) {
        // Closing the job channel ends every worker loop
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for RenderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPool")
            .field("threads", &self.workers.len())
            .field("outstanding", &self.outstanding)
            .finish()
    }
}
