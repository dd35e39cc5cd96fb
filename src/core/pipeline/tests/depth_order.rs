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
use crate::core::fixed::depth_encode;
use crate::core::pipeline::blend::BlendMode;
use crate::core::pipeline::depth::DepthFormat;
use proptest::prelude::*;

const NEAR: Color = Color::new(0, 255, 0);
const FAR: Color = Color::new(255, 0, 0);

fn rules() -> [DepthRule; 3] {
    [
        DepthRule::linear_less(),
        DepthRule::reciprocal_priority(),
        DepthRule::linear_translucent_readonly(),
    ]
}

fn render(rule: DepthRule, records: Vec<PolygonRecord>, worker_threads: usize) -> Pipeline {
    let mut cfg = config(32, 32);
    cfg.depth_rule = rule;
    cfg.worker_threads = worker_threads;
    let mut pipeline = Pipeline::new(cfg).unwrap();
    pipeline.begin_frame();
    for record in records {
        pipeline.submit(record).unwrap();
    }
    pipeline.end_frame().unwrap();
    pipeline
}

#[test]
fn test_nearer_wins_in_either_order() {
    for rule in rules() {
        let near = flat(half_screen(32), 1.0, NEAR);
        let far = flat(half_screen(32), 4.0, FAR);
        let expected_depth = rule.compose(depth_encode(1.0, rule.format), 0);

        for records in [vec![far.clone(), near.clone()], vec![near.clone(), far.clone()]] {
            let pipeline = render(rule, records, 0);
            assert_eq!(front_pixel(&pipeline, 3, 3), 0xFF00_FF00, "{:?}", rule);
            assert_eq!(pipeline.depth_buffer()[3 * 32 + 3], expected_depth, "{:?}", rule);
        }
    }
}

#[test]
fn test_tie_strictness_per_rule() {
    let first = flat(half_screen(32), 2.0, NEAR);
    let second = flat(half_screen(32), 2.0, FAR);

    let strict = render(DepthRule::linear_less(), vec![first.clone(), second.clone()], 0);
    assert_eq!(front_pixel(&strict, 0, 0), 0xFF00_FF00);

    let reciprocal = render(
        DepthRule::reciprocal_priority(),
        vec![first.clone(), second.clone()],
        0,
    );
    assert_eq!(front_pixel(&reciprocal, 0, 0), 0xFFFF_0000);

    let readonly = render(DepthRule::linear_translucent_readonly(), vec![first, second], 0);
    assert_eq!(front_pixel(&readonly, 0, 0), 0xFFFF_0000);
}

#[test]
fn test_translucent_depth_write_policy() {
    let opaque = flat(half_screen(32), 4.0, FAR);
    let mut glass = flat_with(half_screen(32), 1.0, NEAR, PolyFlags::TRANSLUCENT);
    if let PolygonRecord::Flat { attrs, .. } = &mut glass {
        attrs.blend = BlendMode::Half;
    }

    // linear_less writes depth on translucent polygons
    let writes = render(DepthRule::linear_less(), vec![opaque.clone(), glass.clone()], 0);
    assert_eq!(writes.depth_buffer()[0], depth_encode(1.0, DepthFormat::Linear));
    assert_eq!(front_pixel(&writes, 0, 0), 0xFF7F_7F00);

    // the read-only variant keeps the opaque depth
    let rule = DepthRule::linear_translucent_readonly();
    let keeps = render(rule, vec![opaque, glass], 0);
    assert_eq!(keeps.depth_buffer()[0], depth_encode(4.0, rule.format));
    assert_eq!(front_pixel(&keeps, 0, 0), 0xFF7F_7F00);
}

#[test]
fn test_priority_bits_override_depth() {
    let rule = DepthRule::reciprocal_priority();
    let mut back = flat(half_screen(32), 8.0, FAR);
    if let PolygonRecord::Flat { attrs, .. } = &mut back {
        attrs.priority = 2;
    }
    let front = flat(half_screen(32), 1.0, NEAR);

    let pipeline = render(rule, vec![back, front], 0);
    // Higher priority wins although it is farther away
    assert_eq!(front_pixel(&pipeline, 0, 0), 0xFFFF_0000);
}

/// Up to 40 flat triangles overlapping the raster edges at depths 1..=4
fn scene() -> impl Strategy<Value = Vec<PolygonRecord>> {
    let triangle = (
        prop::array::uniform3((-4i16..36, -4i16..36)),
        1u8..=4,
        any::<(u8, u8, u8)>(),
    )
        .prop_map(|(v, z, (r, g, b))| flat(v, z as f32, Color::new(r, g, b)));
    prop::collection::vec(triangle, 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_worker_pool_matches_inline(records in scene()) {
        for rule in rules() {
            let inline = render(rule, records.clone(), 0);
            let pooled = render(rule, records.clone(), 3);
            prop_assert_eq!(inline.front_buffer(), pooled.front_buffer(), "{:?}", rule);
            prop_assert_eq!(inline.depth_buffer(), pooled.depth_buffer(), "{:?}", rule);
        }
    }
}
