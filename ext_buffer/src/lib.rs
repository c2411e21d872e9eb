/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Two-region byte buffer backing a dynamic dictionary.
//!
//! A dictionary image starts life as a single byte run (the *original*
//! region, typically loaded from a file). Updates never restructure that
//! run: new node arrays are appended to a growable *additional* region, and
//! existing arrays reach them by having a link field patched in place. Readers therefore address a single logical byte space
//! that spans both regions: absolute positions `0..original_size()` fall in
//! the original region, positions `original_size()..tail_position()` in the
//! additional one.
//!
//! [`ExtendableBuffer::resolve`] is the one place where absolute positions
//! are translated into region-relative ones, so decoding code never has to
//! branch on which region it is reading from.

use std::fmt::Display;

/// Upper bound on the additional region, in bytes.
///
/// Appends that would push the additional region past this limit are
/// rejected so a runaway writer cannot grow a dictionary without bound.
pub const MAX_ADDITIONAL_BUFFER_SIZE: usize = 1024 * 1024;

/// The additional region is full; returned by [`ExtendableBuffer::extend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutOfSpace(());

impl Display for OutOfSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Additional buffer region is full")
    }
}

impl std::error::Error for OutOfSpace {}

/// The requested range is not contained in a single region; returned by
/// [`ExtendableBuffer::write_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteOutOfBounds(());

impl Display for WriteOutOfBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Write does not fit inside a single buffer region")
    }
}

impl std::error::Error for WriteOutOfBounds {}

/// A byte buffer made of an immutable original region plus a growable
/// additional region.
///
/// Absolute positions span both regions; the original region always comes
/// first. The buffer owns its bytes and does no interpretation of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendableBuffer {
    original: Box<[u8]>,
    additional: Vec<u8>,
    max_additional_size: usize,
}

impl ExtendableBuffer {
    /// Creates a buffer over an existing dictionary image, with an empty
    /// additional region.
    pub fn from_original(original: impl Into<Box<[u8]>>) -> Self {
        Self {
            original: original.into(),
            additional: Vec::new(),
            max_additional_size: MAX_ADDITIONAL_BUFFER_SIZE,
        }
    }

    /// Same as [`Self::from_original`] but with a caller-chosen cap on the
    /// additional region.
    pub fn with_max_additional_size(original: impl Into<Box<[u8]>>, max: usize) -> Self {
        Self {
            original: original.into(),
            additional: Vec::new(),
            max_additional_size: max,
        }
    }

    /// One past the last valid absolute position.
    pub fn tail_position(&self) -> usize {
        self.original.len() + self.additional.len()
    }

    /// Size of the original region in bytes.
    pub fn original_size(&self) -> usize {
        self.original.len()
    }

    /// Whether `pos` addresses the additional region.
    ///
    /// Positions past the tail are reported as "additional" as well; callers
    /// that care about validity should go through [`Self::resolve`].
    pub fn is_in_additional_region(&self, pos: usize) -> bool {
        pos >= self.original.len()
    }

    /// The raw bytes of one region.
    pub fn region(&self, additional: bool) -> &[u8] {
        if additional {
            &self.additional
        } else {
            &self.original
        }
    }

    /// Translates an absolute position into a region slice plus a
    /// region-relative position.
    ///
    /// Returns `None` when `pos` is at or past the tail.
    pub fn resolve(&self, pos: usize) -> Option<(&[u8], usize)> {
        if pos < self.original.len() {
            Some((&self.original, pos))
        } else if pos < self.tail_position() {
            Some((&self.additional, pos - self.original.len()))
        } else {
            None
        }
    }

    /// Appends `bytes` to the additional region and returns the absolute
    /// position at which they were placed.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<usize, OutOfSpace> {
        if self.additional.len() + bytes.len() > self.max_additional_size {
            return Err(OutOfSpace(()));
        }
        let pos = self.tail_position();
        self.additional.extend_from_slice(bytes);
        Ok(pos)
    }

    /// Overwrites already-present bytes at an absolute position.
    ///
    /// Used to patch fields inside existing node arrays, e.g. a forward
    /// link. The write must stay inside a single region.
    pub fn write_at(&mut self, pos: usize, bytes: &[u8]) -> Result<(), WriteOutOfBounds> {
        let original_len = self.original.len();
        let target = if pos < original_len {
            if pos + bytes.len() > original_len {
                return Err(WriteOutOfBounds(()));
            }
            &mut self.original[pos..pos + bytes.len()]
        } else {
            let rel = pos - original_len;
            if rel + bytes.len() > self.additional.len() {
                return Err(WriteOutOfBounds(()));
            }
            &mut self.additional[rel..rel + bytes.len()]
        };
        target.copy_from_slice(bytes);
        Ok(())
    }
}
