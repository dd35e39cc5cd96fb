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

//! Error types for the rasterization core
//!
//! Degenerate or fully clipped triangles are not errors; the scan-converter
//! reports them as "no output" and they never reach this type.
//!
//! Everything here falls into one of three groups:
//! - Resource exhaustion (scanline, vertex, command or matrix stack limits).
//!   These abort the current frame.
//! - Malformed command streams (unknown tag, truncated record).
//! - Boundary misuse and configuration/persistence failures.

use thiserror::Error;

/// Errors raised by the rasterization core
#[derive(Debug, Error)]
pub enum RenderError {
    /// A triangle needs more scanlines than the span scratch buffer holds
    #[error("triangle spans {rows} scanlines, scratch buffer holds {max}")]
    ScanlineOverflow { rows: usize, max: usize },

    /// Too many polygons were submitted in one frame
    #[error("command buffer full ({capacity} polygons per frame)")]
    CommandBufferFull { capacity: usize },

    /// A clipped polygon grew beyond the vertex scratch buffer
    #[error("vertex scratch buffer full ({capacity} vertices)")]
    VertexBufferFull { capacity: usize },

    /// Push on a full matrix stack
    #[error("matrix stack overflow (depth {depth})")]
    MatrixStackOverflow { depth: usize },

    /// Pop on a matrix stack holding only its base entry
    #[error("matrix stack underflow")]
    MatrixStackUnderflow,

    /// The command stream contained a tag with no known record layout
    #[error("unknown record tag 0x{tag:02X} at word {offset}")]
    UnknownRecordTag { tag: u8, offset: usize },

    /// The command stream ended in the middle of a record
    #[error("record 0x{tag:02X} needs {needed} words, only {available} available")]
    TruncatedRecord {
        tag: u8,
        needed: usize,
        available: usize,
    },

    /// Texture upload rectangle or data length does not fit the sheet
    #[error("texture upload {width}x{height} at ({x}, {y}) does not fit sheet {sheet}")]
    InvalidTextureUpload {
        sheet: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// Texture sheet id outside the configured store
    #[error("texture sheet {0} does not exist")]
    InvalidSheet(usize),

    /// Palette index outside the configured palette
    #[error("palette index {0} out of range")]
    InvalidPaletteIndex(usize),

    /// A render worker went away while jobs were outstanding
    #[error("render worker pool disconnected")]
    WorkerPoolDisconnected,

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot encode/decode failure
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// I/O error (config and snapshot files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether this error terminates processing of the current frame
    ///
    /// Resource exhaustion had no recovery path on the original hardware, so
    /// the frame in progress is dropped and the previous one stays on screen.
    pub fn is_frame_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::ScanlineOverflow { .. }
                | RenderError::CommandBufferFull { .. }
                | RenderError::VertexBufferFull { .. }
                | RenderError::MatrixStackOverflow { .. }
                | RenderError::MatrixStackUnderflow
                | RenderError::TruncatedRecord { .. }
                | RenderError::WorkerPoolDisconnected
        )
    }
}

/// Result type for rasterization core operations
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_is_frame_fatal() {
        assert!(RenderError::CommandBufferFull { capacity: 4 }.is_frame_fatal());
        assert!(RenderError::MatrixStackUnderflow.is_frame_fatal());
        assert!(RenderError::ScanlineOverflow { rows: 600, max: 512 }.is_frame_fatal());
    }

    #[test]
    fn test_boundary_errors_are_not_frame_fatal() {
        assert!(!RenderError::InvalidSheet(3).is_frame_fatal());
        assert!(!RenderError::UnknownRecordTag { tag: 0x7E, offset: 0 }.is_frame_fatal());
        assert!(!RenderError::Config("bad".into()).is_frame_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = RenderError::UnknownRecordTag { tag: 0x7E, offset: 12 };
        assert_eq!(err.to_string(), "unknown record tag 0x7E at word 12");

        let err = RenderError::ScanlineOverflow { rows: 600, max: 512 };
        assert_eq!(
            err.to_string(),
            "triangle spans 600 scanlines, scratch buffer holds 512"
        );
    }
}
