/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Read and traversal engine for a dynamic Patricia trie stored in an
//! [`ext_buffer::ExtendableBuffer`].
//!
//! The trie is read directly out of the buffer; nothing is deserialized into
//! an object graph. A [`ReadingHelper`] keeps a cursor (a [`ReadingState`])
//! into the buffer plus a bounded stack of saved cursors that stands in for
//! the call stack, so traversal depth is bounded by the maximum word length
//! instead of by native stack space. On top of that cursor the helper offers:
//!
//! - two listener-driven depth-first traversals over all nodes
//!   (post-order, and array-level pre-order which mirrors on-buffer order),
//! - terminal-position lookup for a code point sequence,
//! - reverse reconstruction of a word from a terminal position by following
//!   parent links.
//!
//! Malformed or hostile images never panic and never hang: every walk is
//! bounded by the configurable [`TraversalLimits`], and corruption surfaces
//! as a typed [`ReadError`]. A cursor that simply runs out of siblings or
//! arrays is not an error; that state is observable via
//! [`ReadingHelper::is_end`].
//!
//! [`ReadingState`]: reading_state::ReadingState

mod error;
mod helper;
mod listener;
mod node_params;
mod reading_state;

pub use error::ReadError;
pub use helper::{ReadingHelper, ReconstructedWord, TraversalLimits};
pub use listener::TraversingEventListener;
pub use node_params::PtNodeParams;

/// Longest representable word, in code points.
///
/// This is the default value of [`TraversalLimits::max_word_length`] and the
/// depth bound rationale for the reading state stack: descending into a
/// child array always consumes at least one code point of edge label.
pub const MAX_WORD_LENGTH: usize = 48;
