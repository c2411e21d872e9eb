/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use crate::PtNodeParams;

/// Callback interface driving the full-trie traversals.
///
/// The traversal methods on [`ReadingHelper`] call back into the listener at
/// four kinds of events. Every callback returns whether the traversal should
/// keep going; returning `false` aborts it immediately (no further nodes are
/// visited and no closing [`on_ascend`](Self::on_ascend) is delivered), and
/// the traversal method reports `Ok(false)` to its caller.
///
/// A listener is used by exactly one traversal call at a time; implementors
/// are free to accumulate state across events.
///
/// [`ReadingHelper`]: crate::ReadingHelper
pub trait TraversingEventListener {
    /// About to descend into the node array at `pt_node_array_pos`.
    ///
    /// Also fired once at the start of a traversal, for the descent from the
    /// (virtual) root into the root node array.
    fn on_descend(&mut self, pt_node_array_pos: usize) -> bool;

    /// Done with a node array chain and its subtrees; returning towards the
    /// root. Also fired once when the whole traversal completes.
    fn on_ascend(&mut self) -> bool;

    /// Visiting a single node.
    fn on_visiting_pt_node(&mut self, pt_node_params: &PtNodeParams) -> bool;

    /// Reached the tail of an array chain (every sibling in it has been
    /// read). Fired once per chain with nodes in it; for an empty root array
    /// the array-level pre-order traversal still fires it, the post-order
    /// traversal does not.
    fn on_reading_pt_node_array_tail(&mut self) -> bool;
}
