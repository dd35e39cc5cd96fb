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

use crate::core::fixed::{float_to_fixed, perspective_divide, reciprocal_z, FRAC_BITS, W_SHIFT};
use crate::core::raster::{ClipRect, PolyVertex, ScanConverter};

/// `(x, y, z, u, v)` of the test triangle: the right corner recedes to z=4
const CORNERS: [(i16, i16, f32, f32, f32); 3] = [
    (0, 0, 1.0, 0.0, 0.0),
    (64, 0, 4.0, 64.0, 0.0),
    (0, 64, 1.0, 0.0, 64.0),
];

/// Allowed error of a recovered coordinate, in 16.16 units
const TOLERANCE: i64 = 64;

fn perspective_vertex((x, y, z, u, v): (i16, i16, f32, f32, f32)) -> PolyVertex<4> {
    let w = reciprocal_z(z);
    let premultiply = |t: f32| ((float_to_fixed(t, FRAC_BITS) as i64 * w as i64) >> W_SHIFT) as i32;
    PolyVertex::new(x, y, [0, w, premultiply(u), premultiply(v)])
}

/// Hyperbolic interpolation of `(u, v)` at pixel centre `(x, y)`
fn expected_uv(x: i32, y: i32) -> (f64, f64) {
    let px = x as f64 + 0.5;
    let py = y as f64 + 0.5;
    let l1 = px / 64.0;
    let l2 = py / 64.0;
    let l0 = 1.0 - l1 - l2;

    let [a, b, c] = CORNERS;
    let inv = |corner: (i16, i16, f32, f32, f32)| 1.0 / corner.2 as f64;
    let one_over_z = l0 * inv(a) + l1 * inv(b) + l2 * inv(c);
    let u_over_z = l0 * a.3 as f64 * inv(a) + l1 * b.3 as f64 * inv(b) + l2 * c.3 as f64 * inv(c);
    let v_over_z = l0 * a.4 as f64 * inv(a) + l1 * b.4 as f64 * inv(b) + l2 * c.4 as f64 * inv(c);
    (u_over_z / one_over_z, v_over_z / one_over_z)
}

#[test]
fn test_perspective_divide_matches_hyperbolic_interpolation() {
    let mut scan = ScanConverter::<4>::new();
    let clip = ClipRect::full(128, 128);
    let [a, b, c] = CORNERS.map(perspective_vertex);
    let setup = scan.setup(a, b, c, &clip).unwrap().expect("visible");

    let mut checked = 0;
    for (y, span) in setup.rows() {
        for x in span.start_x..=span.end_x {
            let w = setup.param_at(y, x, 1).unwrap();
            let u = perspective_divide(setup.param_at(y, x, 2).unwrap(), w) as i64;
            let v = perspective_divide(setup.param_at(y, x, 3).unwrap(), w) as i64;

            let (eu, ev) = expected_uv(x, y);
            let eu = (eu * 65536.0).round() as i64;
            let ev = (ev * 65536.0).round() as i64;
            assert!((u - eu).abs() <= TOLERANCE, "u at ({}, {}): {} vs {}", x, y, u, eu);
            assert!((v - ev).abs() <= TOLERANCE, "v at ({}, {}): {} vs {}", x, y, v, ev);
            checked += 1;
        }
    }
    assert!(checked > 1500);
}

#[test]
fn test_perspective_differs_from_affine_mid_triangle() {
    let (x, y) = (24, 8);
    let (perspective_u, _) = expected_uv(x, y);
    let affine_u = (x as f64 + 0.5) / 64.0 * 64.0;

    // Receding corner compresses texture space near the far edge
    assert!(affine_u - perspective_u > 1.0);

    let mut scan = ScanConverter::<4>::new();
    let [a, b, c] = CORNERS.map(perspective_vertex);
    let setup = scan.setup(a, b, c, &ClipRect::full(128, 128)).unwrap().expect("visible");
    let w = setup.param_at(y, x, 1).unwrap();
    let u = perspective_divide(setup.param_at(y, x, 2).unwrap(), w) as f64 / 65536.0;
    assert!(affine_u - u > 1.0, "perspective u {} too close to affine {}", u, affine_u);
}

#[test]
fn test_equal_depths_reduce_to_affine() {
    let flat_corners = CORNERS.map(|(x, y, _, u, v)| (x, y, 2.0, u, v));
    let mut scan = ScanConverter::<4>::new();
    let [a, b, c] = flat_corners.map(perspective_vertex);
    let setup = scan.setup(a, b, c, &ClipRect::full(128, 128)).unwrap().expect("visible");

    for (x, y) in [(0, 0), (10, 20), (40, 10), (5, 50)] {
        let w = setup.param_at(y, x, 1).unwrap();
        let u = perspective_divide(setup.param_at(y, x, 2).unwrap(), w) as i64;
        let affine = ((x as i64) << FRAC_BITS) + (1 << (FRAC_BITS - 1));
        assert!((u - affine).abs() <= TOLERANCE, "({}, {}): {} vs {}", x, y, u, affine);
    }
}
