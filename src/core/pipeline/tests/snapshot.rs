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

use super::*;
use crate::core::error::RenderError;
use crate::core::pipeline::snapshot::{PipelineSnapshot, SNAPSHOT_VERSION};
use crate::core::pipeline::PipelineState;
use tempfile::tempdir;

fn display_list_config() -> PipelineConfig {
    let mut cfg = config(32, 32);
    cfg.dispatch = DispatchMode::DisplayList;
    cfg
}

fn opening(pipeline: &mut Pipeline) {
    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(32), 3.0, Color::new(200, 0, 0))).unwrap();
    pipeline.submit(PolygonRecord::PushMatrix).unwrap();
}

fn closing(pipeline: &mut Pipeline) -> bool {
    pipeline.submit(flat([(8, 8), (30, 8), (8, 30)], 1.0, Color::new(0, 0, 200))).unwrap();
    pipeline.submit(PolygonRecord::PopMatrix).unwrap();
    pipeline.end_frame().unwrap()
}

#[test]
fn test_restored_pipeline_finishes_the_same_frame() {
    let mut original = Pipeline::new(display_list_config()).unwrap();
    opening(&mut original);

    let bytes = original.snapshot().unwrap().to_bytes().unwrap();
    let snapshot = PipelineSnapshot::from_bytes(&bytes).unwrap();
    assert_eq!(snapshot.state, PipelineState::Accumulating);
    assert_eq!(snapshot.display_list.len(), 2);
    assert_eq!(snapshot.submitted, 1);

    let mut restored = Pipeline::new(display_list_config()).unwrap();
    restored.restore(snapshot).unwrap();
    assert_eq!(restored.state(), PipelineState::Accumulating);

    assert!(closing(&mut original));
    assert!(closing(&mut restored));
    assert_eq!(original.front_buffer(), restored.front_buffer());
    assert_eq!(original.depth_buffer(), restored.depth_buffer());
    assert_eq!(front_pixel(&restored, 10, 10), 0xFF00_00C8);
    assert_eq!(front_pixel(&restored, 2, 2), 0xFFC8_0000);
}

#[test]
fn test_snapshot_commits_outstanding_worker_jobs() {
    let mut cfg = config(32, 32);
    cfg.worker_threads = 2;
    let mut pooled = Pipeline::new(cfg).unwrap();
    opening(&mut pooled);
    let snapshot = pooled.snapshot().unwrap();

    // The first polygon is already in the captured back buffer
    let back = &snapshot.compositor.buffers[snapshot.compositor.back];
    assert_eq!(back[0], 0xFFC8_0000);
}

#[test]
fn test_snapshot_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frame.snap");

    let mut pipeline = Pipeline::new(display_list_config()).unwrap();
    opening(&mut pipeline);
    let snapshot = pipeline.snapshot().unwrap();
    snapshot.save(&path).unwrap();

    let loaded = PipelineSnapshot::load(&path).unwrap();
    assert_eq!(loaded, snapshot);
}

#[test]
fn test_version_mismatch_is_rejected() {
    let mut pipeline = Pipeline::new(display_list_config()).unwrap();
    let mut snapshot = pipeline.snapshot().unwrap();
    snapshot.version = SNAPSHOT_VERSION + 1;

    let bytes = snapshot.to_bytes().unwrap();
    let err = PipelineSnapshot::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, RenderError::Snapshot(_)));
}

#[test]
fn test_garbage_bytes_are_rejected() {
    let err = PipelineSnapshot::from_bytes(&[0xFF; 7]).unwrap_err();
    assert!(matches!(err, RenderError::Snapshot(_)));
}

#[test]
fn test_geometry_mismatch_is_rejected() {
    let mut pipeline = Pipeline::new(display_list_config()).unwrap();
    let snapshot = pipeline.snapshot().unwrap();

    let mut deeper = display_list_config();
    deeper.matrix_stack_depth = 8;
    let mut other = Pipeline::new(deeper).unwrap();
    assert!(matches!(other.restore(snapshot.clone()), Err(RenderError::Snapshot(_))));

    let mut larger = Pipeline::new(config(64, 32)).unwrap();
    assert!(matches!(larger.restore(snapshot), Err(RenderError::Snapshot(_))));
}
