/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::io::{self, Cursor};

use ext_buffer::ExtendableBuffer;

/// One decoded PtNode record.
///
/// A PtNode is an edge of the Patricia trie: one or more merged code points,
/// an optional terminal probability, and optional links to its children
/// array and to its logical parent node. The record is decoded on the fly
/// from its head position; nothing refers back into the buffer, so the
/// params value can outlive the cursor that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtNodeParams {
    head_pos: usize,
    flags: u8,
    code_points: Vec<u32>,
    probability: Option<u8>,
    parent_pos: Option<usize>,
    children_pos: Option<usize>,
    size_in_bytes: usize,
}

impl PtNodeParams {
    /// Decodes the record at absolute position `pos`.
    ///
    /// Parent and children offsets are stored relative to the node head, so
    /// they resolve to absolute positions without caring which buffer region
    /// the node lives in.
    pub(crate) fn read(buffer: &ExtendableBuffer, pos: usize) -> io::Result<Self> {
        let (region, rel) = buffer.resolve(pos).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "PtNode position is past the buffer tail",
            )
        })?;
        let mut cursor = Cursor::new(&region[rel..]);

        let flags = pt_codec::read_u8(&mut cursor)?;
        let parent_offset = pt_codec::read_dict_offset(&mut cursor)?;
        let code_points = pt_codec::read_code_points(
            &mut cursor,
            flags & pt_codec::FLAG_HAS_MULTIPLE_CODE_POINTS != 0,
        )?;
        let probability = if flags & pt_codec::FLAG_IS_TERMINAL != 0 {
            Some(pt_codec::read_u8(&mut cursor)?)
        } else {
            None
        };
        let children_offset = pt_codec::read_dict_offset(&mut cursor)?;

        Ok(Self {
            head_pos: pos,
            flags,
            code_points,
            probability,
            parent_pos: resolve_offset(pos, parent_offset)?,
            children_pos: resolve_offset(pos, children_offset)?,
            size_in_bytes: cursor.position() as usize,
        })
    }

    /// Absolute position of the record's first byte.
    pub fn head_pos(&self) -> usize {
        self.head_pos
    }

    /// The merged code points, in root-to-leaf order. Never empty.
    pub fn code_points(&self) -> &[u32] {
        &self.code_points
    }

    /// Number of merged code points.
    pub fn code_point_count(&self) -> usize {
        self.code_points.len()
    }

    /// Whether this node ends a stored word.
    pub fn is_terminal(&self) -> bool {
        self.flags & pt_codec::FLAG_IS_TERMINAL != 0
    }

    /// Whether an update has logically removed this node.
    pub fn is_deleted(&self) -> bool {
        self.flags & pt_codec::FLAG_IS_DELETED != 0
    }

    /// The word's unigram probability; `None` for non-terminal nodes.
    pub fn probability(&self) -> Option<u8> {
        self.probability
    }

    /// Whether the node points at a children array.
    pub fn has_children(&self) -> bool {
        self.children_pos.is_some()
    }

    /// Absolute head position of the children array, if any.
    pub fn children_pos(&self) -> Option<usize> {
        self.children_pos
    }

    /// Absolute head position of the logical parent node; `None` for nodes
    /// in the root array.
    pub fn parent_pos(&self) -> Option<usize> {
        self.parent_pos
    }

    /// On-buffer size of the record; the next sibling starts this many bytes
    /// after [`Self::head_pos`].
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }
}

/// Turns a head-relative field offset into an absolute position. `0` is the
/// "absent" encoding; an offset pointing before the start of the buffer is
/// corrupt.
fn resolve_offset(head_pos: usize, offset: i32) -> io::Result<Option<usize>> {
    if offset == 0 {
        return Ok(None);
    }
    let target = head_pos as i64 + offset as i64;
    if target < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "offset field points before the start of the buffer",
        ));
    }
    Ok(Some(target as usize))
}
