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
use crate::core::pipeline::PipelineState;

const RED: Color = Color::new(255, 0, 0);
const BLUE: Color = Color::new(0, 0, 255);

fn overflow_scenario(dispatch: DispatchMode, worker_threads: usize, buffer_count: usize) {
    let mut cfg = config(32, 32);
    cfg.polygon_capacity = 4;
    cfg.buffer_count = buffer_count;
    cfg.dispatch = dispatch;
    cfg.worker_threads = worker_threads;
    let mut pipeline = Pipeline::new(cfg).unwrap();

    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(32), 1.0, RED)).unwrap();
    assert!(pipeline.end_frame().unwrap());
    let completed = pipeline.front_buffer().to_vec();

    pipeline.begin_frame();
    let mut errors = Vec::new();
    for _ in 0..10 {
        if let Err(err) = pipeline.submit(flat(half_screen(32), 0.5, BLUE)) {
            errors.push(err);
        }
    }
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], RenderError::CommandBufferFull { capacity: 4 }));
    assert!(errors[0].is_frame_fatal());
    assert!(pipeline.is_frame_aborted());

    assert!(!pipeline.end_frame().unwrap());
    assert!(!pipeline.has_changed());
    assert_eq!(pipeline.front_buffer(), &completed[..]);
    assert_eq!(pipeline.state(), PipelineState::Idle);

    // The next frame renders normally
    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(32), 1.0, BLUE)).unwrap();
    assert!(pipeline.end_frame().unwrap());
    assert_eq!(front_pixel(&pipeline, 0, 0), 0xFF00_00FF);
}

#[test]
fn test_overflow_immediate() {
    overflow_scenario(DispatchMode::Immediate, 0, 2);
}

#[test]
fn test_overflow_display_list() {
    overflow_scenario(DispatchMode::DisplayList, 0, 2);
}

#[test]
fn test_overflow_with_workers() {
    overflow_scenario(DispatchMode::Immediate, 2, 2);
}

#[test]
fn test_overflow_single_buffered() {
    overflow_scenario(DispatchMode::Immediate, 0, 1);
}

#[test]
fn test_single_buffered_abort_keeps_front_buffer() {
    let mut cfg = config(16, 16);
    cfg.buffer_count = 1;
    let mut pipeline = Pipeline::new(cfg).unwrap();
    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(16), 1.0, RED)).unwrap();
    assert!(pipeline.end_frame().unwrap());
    let completed = pipeline.front_buffer().to_vec();
    assert_eq!(front_pixel(&pipeline, 0, 0), 0xFFFF_0000);

    // Immediate dispatch draws BLUE before the abort
    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(16), 0.5, BLUE)).unwrap();
    pipeline.abort_frame();
    assert_eq!(pipeline.front_buffer(), &completed[..]);
    assert!(!pipeline.has_changed());
}

#[test]
fn test_tallest_raster_renders_full_height_triangle() {
    assert!(matches!(Pipeline::new(config(64, 600)), Err(RenderError::Config(_))));

    let mut pipeline = Pipeline::new(config(64, 512)).unwrap();
    pipeline.begin_frame();
    pipeline.submit(flat([(0, 0), (60, 0), (0, 512)], 1.0, RED)).unwrap();
    assert!(pipeline.end_frame().unwrap());
    assert_eq!(front_pixel(&pipeline, 0, 500), 0xFFFF_0000);
}

#[test]
fn test_state_records_do_not_count_against_capacity() {
    let mut cfg = config(16, 16);
    cfg.polygon_capacity = 1;
    let mut pipeline = Pipeline::new(cfg).unwrap();

    pipeline.begin_frame();
    for _ in 0..8 {
        pipeline.submit(PolygonRecord::LoadIdentity).unwrap();
    }
    pipeline.submit(flat(half_screen(16), 1.0, RED)).unwrap();
    assert_eq!(pipeline.submitted(), 1);
    assert!(pipeline.end_frame().unwrap());
}

fn parity_frames(cadence: PresentCadence) -> Vec<bool> {
    let mut cfg = config(16, 16);
    cfg.cadence = cadence;
    let mut pipeline = Pipeline::new(cfg).unwrap();

    (0..2)
        .map(|_| {
            pipeline.begin_frame();
            pipeline.submit(flat(half_screen(16), 1.0, RED)).unwrap();
            let changed = pipeline.end_frame().unwrap();
            assert_eq!(changed, pipeline.has_changed());
            changed
        })
        .collect()
}

#[test]
fn test_every_other_frame_parity() {
    assert_eq!(parity_frames(PresentCadence::EveryOtherFrame), vec![true, false]);
}

#[test]
fn test_every_frame_parity() {
    assert_eq!(parity_frames(PresentCadence::EveryFrame), vec![true, true]);
}

#[test]
fn test_state_transitions() {
    let mut cfg = config(16, 16);
    cfg.dispatch = DispatchMode::DisplayList;
    let mut pipeline = Pipeline::new(cfg).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Idle);

    // Submitting while idle starts a frame
    pipeline.submit(flat(half_screen(16), 1.0, RED)).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Accumulating);
    // Nothing is drawn before replay
    assert!(pipeline.compositor().back().iter().all(|&p| p == 0));

    assert!(pipeline.end_frame().unwrap());
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(front_pixel(&pipeline, 0, 0), 0xFFFF_0000);

    // end_frame while idle is a no-op
    assert!(!pipeline.end_frame().unwrap());
}

#[test]
fn test_explicit_abort_keeps_front_buffer() {
    let mut pipeline = Pipeline::new(config(16, 16)).unwrap();
    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(16), 1.0, RED)).unwrap();
    pipeline.end_frame().unwrap();
    let completed = pipeline.front_buffer().to_vec();

    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(16), 0.5, BLUE)).unwrap();
    pipeline.abort_frame();
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(pipeline.front_buffer(), &completed[..]);
    assert!(!pipeline.has_changed());
}

#[test]
fn test_matrix_underflow_aborts_display_list_frame() {
    let mut cfg = config(16, 16);
    cfg.dispatch = DispatchMode::DisplayList;
    let mut pipeline = Pipeline::new(cfg).unwrap();

    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(16), 1.0, RED)).unwrap();
    pipeline.submit(PolygonRecord::PopMatrix).unwrap();
    let err = pipeline.end_frame().unwrap_err();
    assert!(matches!(err, RenderError::MatrixStackUnderflow));
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(!pipeline.has_changed());
    assert!(pipeline.front_buffer().iter().all(|&p| p == 0));
}

#[test]
fn test_present_after_frame() {
    let mut pipeline = Pipeline::new(config(8, 8)).unwrap();
    pipeline.begin_frame();
    pipeline.submit(flat(half_screen(8), 1.0, RED)).unwrap();
    pipeline.end_frame().unwrap();

    let mut surface = vec![0u32; 64];
    pipeline.present(&mut surface, 8).unwrap();
    assert_eq!(surface[0], 0xFFFF_0000);
    assert_eq!(surface[63], 0xFF00_0000);
}
