/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Fixture builders shared by the integration tests: a small Patricia trie
//! writer that serializes word lists into dictionary images, byte-level
//! helpers for hand-crafted (including corrupt) images, and a listener that
//! records traversal events.

use ext_buffer::ExtendableBuffer;
use pt_reading::{PtNodeParams, TraversingEventListener};

/// One traversal callback, as recorded by [`EventLog`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Event {
    Descend(usize),
    Ascend,
    /// The visited node's merged code points.
    Visit(Vec<u32>),
    ArrayTail,
}

/// Listener that appends every event to a log, optionally asking the
/// traversal to stop after a fixed number of events.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<Event>,
    stop_after: Option<usize>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopping_after(event_count: usize) -> Self {
        Self {
            events: Vec::new(),
            stop_after: Some(event_count),
        }
    }

    fn record(&mut self, event: Event) -> bool {
        self.events.push(event);
        match self.stop_after {
            Some(limit) => self.events.len() < limit,
            None => true,
        }
    }

    /// The code points of every visited node, in visit order.
    pub fn visited(&self) -> Vec<Vec<u32>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Visit(code_points) => Some(code_points.clone()),
                _ => None,
            })
            .collect()
    }
}

impl TraversingEventListener for EventLog {
    fn on_descend(&mut self, pt_node_array_pos: usize) -> bool {
        self.record(Event::Descend(pt_node_array_pos))
    }

    fn on_ascend(&mut self) -> bool {
        self.record(Event::Ascend)
    }

    fn on_visiting_pt_node(&mut self, pt_node_params: &PtNodeParams) -> bool {
        self.record(Event::Visit(pt_node_params.code_points().to_vec()))
    }

    fn on_reading_pt_node_array_tail(&mut self) -> bool {
        self.record(Event::ArrayTail)
    }
}

/// Converts a string into the code point sequence the engine works with.
pub fn code_points(word: &str) -> Vec<u32> {
    word.chars().map(|c| c as u32).collect()
}

/// In-memory Patricia trie that serializes itself into a dictionary image.
///
/// Words are merged edge-wise the usual Patricia way; sibling order is
/// insertion order. Arrays are laid out in array-level pre-order (the order
/// the pre-order traversal is specified to reproduce), every forward link is
/// written as absent, and parent offsets point back at the owning node so
/// reverse reconstruction works.
#[derive(Debug, Default)]
pub struct DictBuilder {
    root: Vec<BuildNode>,
}

#[derive(Debug)]
struct BuildNode {
    code_points: Vec<u32>,
    probability: Option<u8>,
    children: Vec<BuildNode>,
}

impl DictBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_word(mut self, word: &str, probability: u8) -> Self {
        let word = code_points(word);
        assert!(!word.is_empty(), "cannot store an empty word");
        insert(&mut self.root, &word, probability);
        self
    }

    /// Serializes the trie; the root array sits at position 0 of the
    /// original region.
    pub fn build(&self) -> ExtendableBuffer {
        let mut flat = FlatDict::default();
        flat.flatten(&self.root, None);
        flat.assign_positions();
        ExtendableBuffer::from_original(flat.serialize())
    }
}

fn insert(siblings: &mut Vec<BuildNode>, word: &[u32], probability: u8) {
    for node in siblings.iter_mut() {
        if node.code_points[0] != word[0] {
            continue;
        }
        let common = node
            .code_points
            .iter()
            .zip(word)
            .take_while(|(a, b)| a == b)
            .count();
        if common == node.code_points.len() {
            if common == word.len() {
                node.probability = Some(probability);
            } else {
                insert(&mut node.children, &word[common..], probability);
            }
            return;
        }
        // Split the edge at the divergence point.
        let tail_code_points = node.code_points.split_off(common);
        let tail = BuildNode {
            code_points: tail_code_points,
            probability: node.probability.take(),
            children: std::mem::take(&mut node.children),
        };
        node.children.push(tail);
        if common == word.len() {
            node.probability = Some(probability);
        } else {
            node.children.push(BuildNode {
                code_points: word[common..].to_vec(),
                probability: Some(probability),
                children: Vec::new(),
            });
        }
        return;
    }
    siblings.push(BuildNode {
        code_points: word.to_vec(),
        probability: Some(probability),
        children: Vec::new(),
    });
}

#[derive(Debug, Default)]
struct FlatDict {
    arrays: Vec<FlatArray>,
    nodes: Vec<FlatNode>,
}

#[derive(Debug)]
struct FlatArray {
    node_indices: Vec<usize>,
    head_pos: usize,
}

#[derive(Debug)]
struct FlatNode {
    code_points: Vec<u32>,
    probability: Option<u8>,
    parent_node: Option<usize>,
    child_array: Option<usize>,
    head_pos: usize,
}

impl FlatDict {
    fn flatten(&mut self, siblings: &[BuildNode], parent_node: Option<usize>) -> usize {
        let array_index = self.arrays.len();
        self.arrays.push(FlatArray {
            node_indices: Vec::new(),
            head_pos: 0,
        });
        let mut node_indices = Vec::with_capacity(siblings.len());
        for node in siblings {
            let node_index = self.nodes.len();
            self.nodes.push(FlatNode {
                code_points: node.code_points.clone(),
                probability: node.probability,
                parent_node,
                child_array: None,
                head_pos: 0,
            });
            node_indices.push(node_index);
        }
        self.arrays[array_index].node_indices = node_indices.clone();
        // Child arrays follow their parent array, depth first.
        for (node, &node_index) in siblings.iter().zip(&node_indices) {
            if !node.children.is_empty() {
                let child_array = self.flatten(&node.children, Some(node_index));
                self.nodes[node_index].child_array = Some(child_array);
            }
        }
        array_index
    }

    fn assign_positions(&mut self) {
        let mut pos = 0;
        for array_index in 0..self.arrays.len() {
            self.arrays[array_index].head_pos = pos;
            let node_count = self.arrays[array_index].node_indices.len();
            pos += if node_count < 0x80 { 1 } else { 2 };
            for node_index in self.arrays[array_index].node_indices.clone() {
                self.nodes[node_index].head_pos = pos;
                pos += node_size(&self.nodes[node_index]);
            }
            pos += 3; // forward link
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for array in &self.arrays {
            assert_eq!(out.len(), array.head_pos);
            pt_codec::write_pt_node_array_size(&mut out, array.node_indices.len()).unwrap();
            for &node_index in &array.node_indices {
                let node = &self.nodes[node_index];
                assert_eq!(out.len(), node.head_pos);
                let parent_offset = node
                    .parent_node
                    .map(|p| self.nodes[p].head_pos as i32 - node.head_pos as i32)
                    .unwrap_or(0);
                let children_offset = node
                    .child_array
                    .map(|a| self.arrays[a].head_pos as i32 - node.head_pos as i32)
                    .unwrap_or(0);
                out.extend_from_slice(&node_bytes(
                    &node.code_points,
                    node.probability,
                    parent_offset,
                    children_offset,
                ));
            }
            pt_codec::write_dict_offset(&mut out, 0).unwrap();
        }
        out
    }
}

fn node_size(node: &FlatNode) -> usize {
    let code_point_bytes: usize = node
        .code_points
        .iter()
        .map(|&cp| {
            if (pt_codec::MIN_ONE_BYTE_CODE_POINT..=pt_codec::MAX_ONE_BYTE_CODE_POINT)
                .contains(&cp)
            {
                1
            } else {
                3
            }
        })
        .sum();
    let terminator = usize::from(node.code_points.len() > 1);
    let probability = usize::from(node.probability.is_some());
    1 + 3 + code_point_bytes + terminator + probability + 3
}

/// Serializes one PtNode record with the given head-relative offsets.
pub fn node_bytes(
    code_points: &[u32],
    probability: Option<u8>,
    parent_offset: i32,
    children_offset: i32,
) -> Vec<u8> {
    let mut flags = 0;
    if probability.is_some() {
        flags |= pt_codec::FLAG_IS_TERMINAL;
    }
    if code_points.len() > 1 {
        flags |= pt_codec::FLAG_HAS_MULTIPLE_CODE_POINTS;
    }
    let mut out = Vec::new();
    pt_codec::write_u8(&mut out, flags).unwrap();
    pt_codec::write_dict_offset(&mut out, parent_offset).unwrap();
    pt_codec::write_code_points(&mut out, code_points).unwrap();
    if let Some(probability) = probability {
        pt_codec::write_u8(&mut out, probability).unwrap();
    }
    pt_codec::write_dict_offset(&mut out, children_offset).unwrap();
    out
}

/// Serializes one PtNode array: size field, node records, forward link.
pub fn array_bytes(nodes: &[Vec<u8>], forward_link: i32) -> Vec<u8> {
    let mut out = Vec::new();
    pt_codec::write_pt_node_array_size(&mut out, nodes.len()).unwrap();
    for node in nodes {
        out.extend_from_slice(node);
    }
    pt_codec::write_dict_offset(&mut out, forward_link).unwrap();
    out
}
