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

//! Depth test rules
//!
//! Each hardware variant has its own comparison direction and strictness,
//! and some use a different comparison for translucent polygons than for
//! opaque ones. These are kept per variant in a [`DepthRule`] rather than
//! unified.
//!
//! # Depth word
//!
//! ```text
//! 31      24 23                     0
//! [priority][        depth          ]
//! ```
//!
//! The priority byte is only folded in when [`DepthRule::priority_bits`] is
//! set; the whole word then takes part in the comparison.

use crate::core::fixed::DEPTH_MAX;
use serde::{Deserialize, Serialize};

/// Depth comparison: incoming fragment vs stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthCompare {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Always,
}

impl DepthCompare {
    /// Whether a fragment with depth `incoming` passes against `stored`
    #[inline(always)]
    pub fn passes(self, incoming: u32, stored: u32) -> bool {
        match self {
            DepthCompare::Less => incoming < stored,
            DepthCompare::LessEqual => incoming <= stored,
            DepthCompare::Greater => incoming > stored,
            DepthCompare::GreaterEqual => incoming >= stored,
            DepthCompare::Always => true,
        }
    }
}

/// How eye-space Z maps to the 24-bit depth value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthFormat {
    /// `z` in 16.8 fixed point; nearer is smaller
    Linear,
    /// `1/z` in 0.24 fixed point; nearer is larger
    Reciprocal,
}

/// Per-variant depth policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRule {
    pub format: DepthFormat,
    /// Comparison for opaque polygons
    pub opaque: DepthCompare,
    /// Comparison for translucent polygons
    pub translucent: DepthCompare,
    /// Whether translucent polygons update the Z-buffer
    pub write_on_translucent: bool,
    /// Fold the polygon priority into bits 24..31 of the depth word
    pub priority_bits: bool,
}

impl DepthRule {
    /// Linear Z, strictly-less for everything, always writes
    pub const fn linear_less() -> Self {
        Self {
            format: DepthFormat::Linear,
            opaque: DepthCompare::Less,
            translucent: DepthCompare::Less,
            write_on_translucent: true,
            priority_bits: false,
        }
    }

    /// Reciprocal Z with priority bits; opaque passes on ties, translucent
    /// needs to be strictly nearer and never writes depth
    pub const fn reciprocal_priority() -> Self {
        Self {
            format: DepthFormat::Reciprocal,
            opaque: DepthCompare::GreaterEqual,
            translucent: DepthCompare::Greater,
            write_on_translucent: false,
            priority_bits: true,
        }
    }

    /// Linear Z; opaque passes on ties, translucent strictly nearer and
    /// read-only
    pub const fn linear_translucent_readonly() -> Self {
        Self {
            format: DepthFormat::Linear,
            opaque: DepthCompare::LessEqual,
            translucent: DepthCompare::Less,
            write_on_translucent: false,
            priority_bits: false,
        }
    }

    /// Whether larger depth words are nearer the viewer
    fn nearer_is_larger(&self) -> bool {
        match self.opaque {
            DepthCompare::Greater | DepthCompare::GreaterEqual => true,
            DepthCompare::Less | DepthCompare::LessEqual => false,
            DepthCompare::Always => self.format == DepthFormat::Reciprocal,
        }
    }

    /// Z-buffer value meaning "nothing drawn yet" (farthest possible)
    pub fn clear_value(&self) -> u32 {
        match (self.nearer_is_larger(), self.priority_bits) {
            (true, _) => 0,
            (false, true) => u32::MAX,
            (false, false) => DEPTH_MAX,
        }
    }

    /// Build the stored depth word
    #[inline(always)]
    pub fn compose(&self, depth: u32, priority: u8) -> u32 {
        let depth = depth.min(DEPTH_MAX);
        if self.priority_bits {
            ((priority as u32) << 24) | depth
        } else {
            depth
        }
    }

    /// Run the depth test for one fragment
    #[inline(always)]
    pub fn test(&self, translucent: bool, incoming: u32, stored: u32) -> bool {
        let compare = if translucent {
            self.translucent
        } else {
            self.opaque
        };
        compare.passes(incoming, stored)
    }

    /// Whether a passing fragment updates the Z-buffer
    #[inline(always)]
    pub fn writes_depth(&self, translucent: bool) -> bool {
        !translucent || self.write_on_translucent
    }
}

impl Default for DepthRule {
    fn default() -> Self {
        Self::linear_less()
    }
}
