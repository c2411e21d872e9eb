/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

/// The engine's cursor into the dictionary image.
///
/// `pos` is `None` once the cursor has run out of siblings and forward
/// links; that is the ordinary end-of-chain state, not an error.
///
/// The two chain counters (`total_pt_node_index_in_this_array_chain`,
/// `pt_node_array_index_in_this_array_chain`) exist purely for loop
/// detection: they only ever grow while walking one array chain and are
/// reset when the cursor leaves the chain by descending into a child array
/// or stepping to a parent node.
#[derive(Debug, Clone)]
pub(crate) struct ReadingState {
    /// Absolute position of the node to read next, or `None` at the end of
    /// the chain.
    pub(crate) pos: Option<usize>,
    /// Head position of the array the cursor is currently in.
    pub(crate) pos_of_this_pt_node_array_head: usize,
    /// Nodes left to read in the current array, including the one at `pos`.
    pub(crate) remaining_pt_node_count_in_this_array: usize,
    /// Code points consumed along the path from the root to (but not
    /// including) the current node.
    pub(crate) total_code_point_count: usize,
    /// Loop-detection counter: nodes seen in the current array chain.
    pub(crate) total_pt_node_index_in_this_array_chain: u32,
    /// Loop-detection counter: arrays entered in the current chain.
    pub(crate) pt_node_array_index_in_this_array_chain: u32,
    /// Position of the forward-link field read most recently.
    pub(crate) pos_of_last_forward_link_field: Option<usize>,
}

impl ReadingState {
    /// Cursor about to enter the node array headed at `pos`.
    pub(crate) fn at_pt_node_array(pos: usize) -> Self {
        Self {
            pos: Some(pos),
            pos_of_this_pt_node_array_head: pos,
            remaining_pt_node_count_in_this_array: 0,
            total_code_point_count: 0,
            total_pt_node_index_in_this_array_chain: 0,
            pt_node_array_index_in_this_array_chain: 0,
            pos_of_last_forward_link_field: None,
        }
    }

    /// Cursor primed on the single node at `pos`, as if it were an array of
    /// one. Used to read a node out of band, e.g. a terminal found by lookup
    /// or a parent during reverse reconstruction.
    pub(crate) fn at_pt_node(pos: usize) -> Self {
        Self {
            pos: Some(pos),
            pos_of_this_pt_node_array_head: pos,
            remaining_pt_node_count_in_this_array: 1,
            total_code_point_count: 0,
            total_pt_node_index_in_this_array_chain: 0,
            pt_node_array_index_in_this_array_chain: 0,
            pos_of_last_forward_link_field: None,
        }
    }

    pub(crate) fn reset_chain_counters(&mut self) {
        self.total_pt_node_index_in_this_array_chain = 0;
        self.pt_node_array_index_in_this_array_chain = 0;
    }
}
