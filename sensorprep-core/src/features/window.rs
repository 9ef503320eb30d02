//! Fixed-length window extraction over a record sequence.
//!
//! Windows start at `0, stride, 2 * stride, ...` and are emitted while
//! `start + window_size <= len`. A trailing segment shorter than
//! `window_size` is dropped rather than padded, so every window summarizes
//! exactly `window_size` records. With `stride < window_size` consecutive
//! windows overlap.
//!
//! Example with `len = 10`, `window_size = 4`, `stride = 2`:
//!
//! ```text
//! records:  0 1 2 3 4 5 6 7 8 9
//! window 0: [0 1 2 3]
//! window 1:     [2 3 4 5]
//! window 2:         [4 5 6 7]
//! window 3:             [6 7 8 9]
//! ```

use crate::config::WindowConfig;
use crate::data::table::RecordSequence;
use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use std::ops::Range;

/// A half-open index span `[start, end)` into a record sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Lazy sequence of window descriptors. Cloning restarts from the clone
/// point; no record data is copied.
#[derive(Debug, Clone)]
pub struct Windows {
    next_start: usize,
    sequence_len: usize,
    window_size: usize,
    stride: usize,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let end = self.next_start.checked_add(self.window_size)?;
        if end > self.sequence_len {
            return None;
        }
        let window = Window {
            start: self.next_start,
            end,
        };
        // Saturate so a huge stride ends iteration instead of wrapping.
        self.next_start = self.next_start.saturating_add(self.stride);
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .sequence_len
            .checked_sub(self.next_start)
            .map_or(0, |rest| window_count(rest, self.window_size, self.stride));
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

impl FusedIterator for Windows {}

/// Number of windows for a sequence of `len` records:
/// `floor((len - window_size) / stride) + 1` when `len >= window_size`, else 0.
pub fn window_count(len: usize, window_size: usize, stride: usize) -> usize {
    if window_size == 0 || stride == 0 || len < window_size {
        return 0;
    }
    (len - window_size) / stride + 1
}

/// Window descriptors for a sequence of `sequence_len` records.
pub fn extract(sequence_len: usize, window_size: usize, stride: usize) -> Result<Windows, PrepError> {
    if window_size == 0 {
        return Err(PrepError::configuration("window_size must be >= 1"));
    }
    if stride == 0 {
        return Err(PrepError::configuration("stride must be >= 1"));
    }
    Ok(Windows {
        next_start: 0,
        sequence_len,
        window_size,
        stride,
    })
}

/// Window extractor bound to validated settings.
#[derive(Debug, Clone, Copy)]
pub struct WindowExtractor {
    window_size: usize,
    stride: usize,
}

impl WindowExtractor {
    pub fn new(window_size: usize, stride: usize) -> Result<Self, PrepError> {
        extract(0, window_size, stride)?;
        Ok(Self {
            window_size,
            stride,
        })
    }

    pub fn from_config(config: &WindowConfig) -> Result<Self, PrepError> {
        Self::new(config.window_size, config.stride)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Windows over an already time-ordered sequence.
    pub fn windows(&self, sequence: &RecordSequence) -> Windows {
        self.windows_for_len(sequence.len())
    }

    pub fn windows_for_len(&self, sequence_len: usize) -> Windows {
        Windows {
            next_start: 0,
            sequence_len,
            window_size: self.window_size,
            stride: self.stride,
        }
    }
}
