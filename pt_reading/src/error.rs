/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use thiserror::Error;

/// Fatal conditions detected while reading a dictionary image.
///
/// These correspond to a buggy caller or a broken/hostile image. Running out
/// of siblings or node arrays is *not* an error; that is the ordinary
/// end-of-chain state, reported through [`ReadingHelper::is_end`] and
/// `None` results instead.
///
/// Once an operation has returned an error the helper's cursor is no longer
/// meaningful; re-initialize it before reuse.
///
/// [`ReadingHelper::is_end`]: crate::ReadingHelper::is_end
#[derive(Debug, Error)]
pub enum ReadError {
    /// A position outside the buffer was about to be read.
    #[error("invalid dictionary position {pos}, dictionary size: {tail}")]
    InvalidPosition {
        /// The offending absolute position.
        pos: usize,
        /// The buffer tail position at the time of the read.
        tail: usize,
    },

    /// More nodes were counted in one array chain than
    /// [`TraversalLimits::max_pt_node_count`](crate::TraversalLimits::max_pt_node_count)
    /// allows; the chain is cyclic or the image is corrupt.
    #[error("more than {ceiling} PtNodes in one array chain")]
    TooManyPtNodes {
        /// The configured ceiling that was exceeded.
        ceiling: u32,
    },

    /// More arrays were chained through forward links than
    /// [`TraversalLimits::max_pt_node_array_count`](crate::TraversalLimits::max_pt_node_array_count)
    /// allows; the chain is cyclic or the image is corrupt.
    #[error("more than {ceiling} PtNode arrays in one chain")]
    TooManyPtNodeArrays {
        /// The configured ceiling that was exceeded.
        ceiling: u32,
    },

    /// The reading state stack outgrew the depth implied by
    /// [`TraversalLimits::max_word_length`](crate::TraversalLimits::max_word_length);
    /// child links form a cycle or the image is corrupt.
    #[error("reading state stack overflow at depth {depth}")]
    StackOverflow {
        /// The stack depth at which the push was refused.
        depth: usize,
    },

    /// A field could not be decoded (truncated or malformed bytes).
    #[error("malformed PtNode data: {0}")]
    Decode(#[from] std::io::Error),
}
