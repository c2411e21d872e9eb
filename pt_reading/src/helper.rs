/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::io::Cursor;

use ext_buffer::ExtendableBuffer;
use icu_casemap::CaseMapper;

use crate::{
    MAX_WORD_LENGTH, PtNodeParams, ReadError, TraversingEventListener,
    reading_state::ReadingState,
};

/// Work ceilings for a single traversal or lookup call.
///
/// The dictionary format is mutable and may be corrupted by a partial write
/// or hostile input; without hard ceilings a cyclic forward link or child
/// pointer would make a walk loop forever. Every ceiling strictly bounds
/// total work per call, so any walk over any image terminates in
/// O(ceiling) steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalLimits {
    /// Most PtNodes tolerated in one forward-linked array chain.
    pub max_pt_node_count: u32,
    /// Most arrays tolerated in one forward-linked array chain.
    pub max_pt_node_array_count: u32,
    /// Longest word the engine will traverse or reconstruct, in code
    /// points. Also bounds the reading state stack, since depth only grows
    /// by descending into a child array, which consumes at least one code
    /// point.
    pub max_word_length: usize,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            max_pt_node_count: 100_000,
            max_pt_node_array_count: 100_000,
            max_word_length: MAX_WORD_LENGTH,
        }
    }
}

/// A word rebuilt from a terminal node by
/// [`ReadingHelper::get_code_points_and_probability`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedWord {
    /// The word's code points in root-to-leaf (forward) order.
    pub code_points: Vec<u32>,
    /// The unigram probability stored at the terminal node.
    pub probability: u8,
}

/// The reading engine: a cursor over one dictionary image plus a bounded
/// stack of saved cursors.
///
/// A helper instance serves one logical traversal or lookup at a time;
/// re-initialize it (or use a fresh instance) per call. It never blocks and
/// never recurses: traversal depth lives in the explicit state stack, whose
/// size is bounded by [`TraversalLimits::max_word_length`].
#[derive(Debug)]
pub struct ReadingHelper<'a> {
    buffer: &'a ExtendableBuffer,
    limits: TraversalLimits,
    state: ReadingState,
    state_stack: Vec<ReadingState>,
}

impl<'a> ReadingHelper<'a> {
    /// Creates a helper over `buffer` with the cursor at end-of-chain.
    /// Position it with [`Self::init_with_pt_node_array_pos`] or
    /// [`Self::init_with_pt_node_pos`] before use.
    pub fn new(buffer: &'a ExtendableBuffer, limits: TraversalLimits) -> Self {
        let mut state = ReadingState::at_pt_node_array(0);
        state.pos = None;
        Self {
            buffer,
            limits,
            state,
            state_stack: Vec::new(),
        }
    }

    /// Points the cursor at the node array headed at `pos` and enters it
    /// (reads its size field, chasing forward links across empty arrays).
    pub fn init_with_pt_node_array_pos(&mut self, pos: usize) -> Result<(), ReadError> {
        self.state = ReadingState::at_pt_node_array(pos);
        self.state_stack.clear();
        self.next_pt_node_array()
    }

    /// Primes the cursor on the single node at `pos`, e.g. a terminal
    /// position returned by [`Self::get_terminal_pt_node_pos_of_word`].
    pub fn init_with_pt_node_pos(&mut self, pos: usize) {
        self.state = ReadingState::at_pt_node(pos);
        self.state_stack.clear();
    }

    /// Whether the cursor has run out of siblings and forward links. Not an
    /// error; see [`ReadError`] for the conditions that are.
    pub fn is_end(&self) -> bool {
        self.state.pos.is_none()
    }

    /// Head position of the array the cursor entered most recently.
    pub fn pos_of_last_pt_node_array_head(&self) -> usize {
        self.state.pos_of_this_pt_node_array_head
    }

    /// Position of the forward-link field read most recently, if any.
    /// A writer extending an array chain patches the link at this position.
    pub fn pos_of_last_forward_link_field(&self) -> Option<usize> {
        self.state.pos_of_last_forward_link_field
    }

    /// Visits all PtNodes in post-order depth-first manner: children
    /// strictly before their parent, siblings in on-buffer order.
    ///
    /// For a dictionary holding "a", "ab" and "ac" (edge `a` with child
    /// edges `b` and `c`) the visit order is `b`, `c`, `a`.
    ///
    /// Returns `Ok(true)` when the whole trie was visited, `Ok(false)` when
    /// the listener asked to stop.
    pub fn traverse_all_pt_nodes_in_postorder_dfs<L: TraversingEventListener>(
        &mut self,
        listener: &mut L,
    ) -> Result<bool, ReadError> {
        let mut already_visited_children = false;
        // Descend from the root to the root PtNode array.
        if !listener.on_descend(self.state.pos_of_this_pt_node_array_head) {
            return Ok(false);
        }
        while let Some(pos) = self.state.pos {
            let pt_node_params = self.read_pt_node(pos)?;
            if !already_visited_children {
                if let Some(children_pos) = pt_node_params.children_pos() {
                    // Move to the first child.
                    if !listener.on_descend(children_pos) {
                        return Ok(false);
                    }
                    self.push_reading_state()?;
                    self.read_child_node(&pt_node_params)?;
                } else {
                    already_visited_children = true;
                }
            } else {
                if !listener.on_visiting_pt_node(&pt_node_params) {
                    return Ok(false);
                }
                self.read_next_sibling_node(&pt_node_params)?;
                if self.is_end() {
                    // All PtNodes in the current linked arrays have been
                    // visited. Return to the parent.
                    if !listener.on_reading_pt_node_array_tail() {
                        return Ok(false);
                    }
                    if self.state_stack.is_empty() {
                        break;
                    }
                    if !listener.on_ascend() {
                        return Ok(false);
                    }
                    self.pop_reading_state();
                    already_visited_children = true;
                } else {
                    // Process the sibling PtNode.
                    already_visited_children = false;
                }
            }
        }
        // Ascend from the root PtNode array to the root.
        if !listener.on_ascend() {
            return Ok(false);
        }
        Ok(true)
    }

    /// Visits all PtNodes in PtNode-array-level pre-order depth-first
    /// manner, which is the order the nodes occupy in the buffer: a parent's
    /// whole array before any of its children's arrays.
    ///
    /// For a dictionary holding "a", "ab" and "ac" the visit order is `a`,
    /// `b`, `c`.
    ///
    /// Returns `Ok(true)` when the whole trie was visited, `Ok(false)` when
    /// the listener asked to stop.
    pub fn traverse_all_pt_nodes_in_pt_node_array_level_preorder_dfs<
        L: TraversingEventListener,
    >(
        &mut self,
        listener: &mut L,
    ) -> Result<bool, ReadError> {
        let mut already_visited_all_pt_nodes_in_array = false;
        let mut already_visited_children = false;
        // Descend from the root to the root PtNode array.
        if !listener.on_descend(self.state.pos_of_this_pt_node_array_head) {
            return Ok(false);
        }
        if self.is_end() {
            // Empty dictionary. The tail of the empty root array must still
            // be reported, so that every array produces exactly one tail
            // event.
            if !listener.on_reading_pt_node_array_tail() {
                return Ok(false);
            }
        }
        self.push_reading_state()?;
        while let Some(pos) = self.state.pos {
            let pt_node_params = self.read_pt_node(pos)?;
            if already_visited_all_pt_nodes_in_array {
                if already_visited_children {
                    // Move to the next sibling PtNode's children.
                    self.read_next_sibling_node(&pt_node_params)?;
                    if self.is_end() {
                        // Return to the parent PtNode.
                        if !listener.on_ascend() {
                            return Ok(false);
                        }
                        if self.state_stack.is_empty() {
                            break;
                        }
                        self.pop_reading_state();
                        already_visited_children = true;
                        already_visited_all_pt_nodes_in_array = true;
                    } else {
                        already_visited_children = false;
                    }
                } else if let Some(children_pos) = pt_node_params.children_pos() {
                    // Move to the first child.
                    if !listener.on_descend(children_pos) {
                        return Ok(false);
                    }
                    self.push_reading_state()?;
                    self.read_child_node(&pt_node_params)?;
                    // Push a state to return to the head of the child array.
                    self.push_reading_state()?;
                    already_visited_all_pt_nodes_in_array = false;
                    already_visited_children = false;
                } else {
                    already_visited_children = true;
                }
            } else {
                if !listener.on_visiting_pt_node(&pt_node_params) {
                    return Ok(false);
                }
                self.read_next_sibling_node(&pt_node_params)?;
                if self.is_end() {
                    if !listener.on_reading_pt_node_array_tail() {
                        return Ok(false);
                    }
                    // Return to the head of the current PtNode array.
                    self.pop_reading_state();
                    already_visited_all_pt_nodes_in_array = true;
                }
            }
        }
        self.pop_reading_state();
        // Ascend from the root PtNode array to the root.
        if !listener.on_ascend() {
            return Ok(false);
        }
        Ok(true)
    }

    /// Finds the terminal node position storing exactly the word `in_word`.
    ///
    /// Returns `Ok(None)` when the word is absent, including when it is only
    /// a non-terminal prefix of stored words. With `force_lower_case_search`
    /// every searched code point is lower-cased first, so an upper-case
    /// query can match a dictionary stored in lower case.
    pub fn get_terminal_pt_node_pos_of_word(
        &mut self,
        in_word: &[u32],
        force_lower_case_search: bool,
    ) -> Result<Option<usize>, ReadError> {
        if in_word.is_empty() {
            return Ok(None);
        }
        let search_code_points: Vec<u32> = if force_lower_case_search {
            let casemapper = CaseMapper::new();
            in_word.iter().map(|&cp| to_lower_code_point(casemapper, cp)).collect()
        } else {
            in_word.to_vec()
        };
        while let Some(pos) = self.state.pos {
            let pt_node_params = self.read_pt_node(pos)?;
            let matched_code_point_count = self.state.total_code_point_count;
            if matched_code_point_count + pt_node_params.code_point_count()
                > search_code_points.len()
                || pt_node_params.is_deleted()
                || pt_node_params.code_points()[0] != search_code_points[matched_code_point_count]
            {
                // This node has too many code points, or is deleted, or its
                // first code point differs from the target. Not a failure:
                // skip to the next sibling.
                self.read_next_sibling_node(&pt_node_params)?;
                continue;
            }
            // Check the remaining merged code points. A mismatch here is
            // conclusive, because sibling edges are disjoint by first code
            // point.
            for j in 1..pt_node_params.code_point_count() {
                if pt_node_params.code_points()[j]
                    != search_code_points[matched_code_point_count + j]
                {
                    return Ok(None);
                }
            }
            if matched_code_point_count + pt_node_params.code_point_count()
                == search_code_points.len()
            {
                // The whole word is matched; it is stored iff this node is
                // terminal.
                return Ok(if pt_node_params.is_terminal() {
                    Some(pt_node_params.head_pos())
                } else {
                    None
                });
            }
            if !pt_node_params.has_children() {
                return Ok(None);
            }
            // Advance to the children.
            self.read_child_node(&pt_node_params)?;
        }
        Ok(None)
    }

    /// Rebuilds the word ending at the cursor's node by following parent
    /// links back to the root; the cursor must have been primed with
    /// [`Self::init_with_pt_node_pos`].
    ///
    /// Returns `Ok(None)` when the node is not a live terminal node, when
    /// the word would exceed `max_code_point_count`, or when the parent
    /// chain is not decodable; each of those means the position is not a
    /// valid terminal position in this dictionary.
    pub fn get_code_points_and_probability(
        &mut self,
        max_code_point_count: usize,
    ) -> Result<Option<ReconstructedWord>, ReadError> {
        let Some(pos) = self.state.pos else {
            return Ok(None);
        };
        // First, read the terminal node itself and take its probability.
        let Ok(terminal_pt_node_params) = PtNodeParams::read(self.buffer, pos) else {
            return Ok(None);
        };
        if terminal_pt_node_params.is_deleted() {
            return Ok(None);
        }
        let Some(probability) = terminal_pt_node_params.probability() else {
            return Ok(None);
        };
        // Parent links run from the terminal towards the root, so code
        // points accumulate in reverse order.
        let mut reverse_code_points: Vec<u32> = Vec::with_capacity(max_code_point_count);
        while let Some(pos) = self.state.pos {
            let Ok(pt_node_params) = PtNodeParams::read(self.buffer, pos) else {
                return Ok(None);
            };
            let total_code_point_count =
                self.state.total_code_point_count + pt_node_params.code_point_count();
            if total_code_point_count > max_code_point_count {
                // Either the word is longer than the caller allows or a
                // cyclic parent chain keeps the count growing.
                return Ok(None);
            }
            reverse_code_points.extend(pt_node_params.code_points().iter().rev());
            self.read_parent_node(&pt_node_params);
        }
        reverse_code_points.reverse();
        Ok(Some(ReconstructedWord {
            code_points: reverse_code_points,
            probability,
        }))
    }

    /// Reads the array size field at the cursor, entering the array. Chases
    /// forward links across empty arrays iteratively; node and array
    /// ceilings bound the total work.
    fn next_pt_node_array(&mut self) -> Result<(), ReadError> {
        loop {
            let Some(pos) = self.state.pos else {
                return Ok(());
            };
            let (region, rel) = self.buffer.resolve(pos).ok_or(ReadError::InvalidPosition {
                pos,
                tail: self.buffer.tail_position(),
            })?;
            self.state.pos_of_this_pt_node_array_head = pos;
            let mut cursor = Cursor::new(&region[rel..]);
            let pt_node_count = pt_codec::read_pt_node_array_size(&mut cursor)?;
            self.state.pos = Some(pos + cursor.position() as usize);

            // Count up nodes and arrays to catch cyclic chains.
            self.state.total_pt_node_index_in_this_array_chain = self
                .state
                .total_pt_node_index_in_this_array_chain
                .saturating_add(pt_node_count as u32);
            self.state.pt_node_array_index_in_this_array_chain = self
                .state
                .pt_node_array_index_in_this_array_chain
                .saturating_add(1);
            if self.state.total_pt_node_index_in_this_array_chain > self.limits.max_pt_node_count {
                return Err(ReadError::TooManyPtNodes {
                    ceiling: self.limits.max_pt_node_count,
                });
            }
            if self.state.pt_node_array_index_in_this_array_chain
                > self.limits.max_pt_node_array_count
            {
                return Err(ReadError::TooManyPtNodeArrays {
                    ceiling: self.limits.max_pt_node_array_count,
                });
            }

            self.state.remaining_pt_node_count_in_this_array = pt_node_count;
            if pt_node_count > 0 {
                return Ok(());
            }
            // Empty array; it may still chain to an extension.
            if !self.step_forward_link()? {
                return Ok(());
            }
        }
    }

    /// Reads the forward-link field at the cursor and either moves the
    /// cursor to the linked array head (returning `true`) or, when the link
    /// is absent, parks it at end-of-chain (returning `false`).
    fn step_forward_link(&mut self) -> Result<bool, ReadError> {
        let Some(pos) = self.state.pos else {
            return Ok(false);
        };
        let (region, rel) = self.buffer.resolve(pos).ok_or(ReadError::InvalidPosition {
            pos,
            tail: self.buffer.tail_position(),
        })?;
        let mut cursor = Cursor::new(&region[rel..]);
        let forward_link = pt_codec::read_dict_offset(&mut cursor)?;
        self.state.pos_of_last_forward_link_field = Some(pos);
        if forward_link == 0 {
            // All node arrays in this chain have been read.
            self.state.pos = None;
            return Ok(false);
        }
        let target =
            self.state.pos_of_this_pt_node_array_head as i64 + forward_link as i64;
        if target < 0 {
            return Err(ReadError::InvalidPosition {
                pos,
                tail: self.buffer.tail_position(),
            });
        }
        self.state.pos = Some(target as usize);
        Ok(true)
    }

    /// Moves the cursor past `pt_node_params` to its next sibling, following
    /// the forward link when the node was the last one in its array.
    fn read_next_sibling_node(&mut self, pt_node_params: &PtNodeParams) -> Result<(), ReadError> {
        self.state.remaining_pt_node_count_in_this_array = self
            .state
            .remaining_pt_node_count_in_this_array
            .saturating_sub(1);
        self.state.pos = Some(pt_node_params.head_pos() + pt_node_params.size_in_bytes());
        if self.state.remaining_pt_node_count_in_this_array == 0 {
            // The cursor now sits on the forward-link field.
            if self.step_forward_link()? {
                self.next_pt_node_array()?;
            }
        }
        Ok(())
    }

    /// Descends into the children array of `pt_node_params`. Starts a fresh
    /// chain: loop-detection counters restart.
    fn read_child_node(&mut self, pt_node_params: &PtNodeParams) -> Result<(), ReadError> {
        self.state.total_code_point_count += pt_node_params.code_point_count();
        self.state.reset_chain_counters();
        self.state.pos = pt_node_params.children_pos();
        self.next_pt_node_array()
    }

    /// Steps from `pt_node_params` to its logical parent, priming the cursor
    /// on that single node; parks at end-of-chain when the node has no
    /// parent (it sits in the root array).
    fn read_parent_node(&mut self, pt_node_params: &PtNodeParams) {
        self.state.total_code_point_count += pt_node_params.code_point_count();
        self.state.reset_chain_counters();
        match pt_node_params.parent_pos() {
            Some(parent_pos) => {
                self.state.pos = Some(parent_pos);
                self.state.pos_of_this_pt_node_array_head = parent_pos;
                self.state.remaining_pt_node_count_in_this_array = 1;
            }
            None => self.state.pos = None,
        }
    }

    fn read_pt_node(&self, pos: usize) -> Result<PtNodeParams, ReadError> {
        Ok(PtNodeParams::read(self.buffer, pos)?)
    }

    fn push_reading_state(&mut self) -> Result<(), ReadError> {
        // The array-level pre-order traversal pushes two states per descent
        // plus one priming state, hence the factor of two over the depth
        // bound.
        if self.state_stack.len() >= 2 * self.limits.max_word_length + 1 {
            return Err(ReadError::StackOverflow {
                depth: self.state_stack.len(),
            });
        }
        self.state_stack.push(self.state.clone());
        Ok(())
    }

    fn pop_reading_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.state = state;
        }
    }
}

/// Lower-cases one code point through the external case mapping; code points
/// outside the Unicode scalar range are kept as they are.
fn to_lower_code_point(
    casemapper: icu_casemap::CaseMapperBorrowed<'_>,
    code_point: u32,
) -> u32 {
    match char::from_u32(code_point) {
        Some(c) => casemapper.simple_lowercase(c) as u32,
        None => code_point,
    }
}
