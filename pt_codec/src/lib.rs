/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! # Field codec for the dynamic Patricia trie binary format
//!
//! A dictionary image is a flat byte run holding *PtNode arrays*: contiguous
//! runs of sibling nodes, each array preceded by a size field and followed by
//! a forward-link field. This crate encodes and decodes the individual
//! variable-length fields; it knows nothing about buffer regions or
//! traversal, which live in `ext_buffer` and `pt_reading` respectively.
//!
//! All functions work on [`std::io::Read`]/[`std::io::Write`]
//! implementations, typically a [`std::io::Cursor`] positioned at the field.
//! Truncated or malformed input surfaces as a [`std::io::Error`]; decoding
//! never panics.
//!
//! ## PtNode array size field
//!
//! Sizes below `0x80` take one byte. Larger sizes take two bytes, big-endian,
//! with the top bit of the first byte set, giving a 15-bit range:
//!
//! ```text
//! 0x05        -> 5
//! 0x81 0x02   -> 0x0102 = 258
//! ```
//!
//! ## Offset fields (forward link, parent, children)
//!
//! Three bytes, big-endian, two's complement, so an offset can reach
//! ±8 MiB. The value `0` is reserved for "no link" / "no parent" /
//! "no children"; what the offset is relative to is the caller's business
//! (forward links are relative to the array head, parent and children
//! offsets to the node head).
//!
//! ## Merged code points
//!
//! A PtNode carries one or more code points. Code points in
//! `0x20..=0xFF` are stored as a single byte. Anything else is stored as
//! three big-endian bytes whose lead byte is below `0x1F`, which is
//! unambiguous because one-byte code points are always `>= 0x20`. When a
//! node has more than one code point (its `HAS_MULTIPLE_CODE_POINTS` flag is
//! set), the sequence after the first code point is closed by the
//! [`CODE_POINT_TERMINATOR`] byte `0x1F`:
//!
//! ```text
//! "a"   -> 0x61
//! "ab"  -> 0x61 0x62 0x1F
//! "a語" -> 0x61 0x00 0x8A 0x9E 0x1F
//! ```

use std::io::{self, Read, Write};

/// Closes a multi-code-point sequence.
pub const CODE_POINT_TERMINATOR: u8 = 0x1F;

/// Smallest code point representable in one byte.
pub const MIN_ONE_BYTE_CODE_POINT: u32 = 0x20;

/// Largest code point representable in one byte.
pub const MAX_ONE_BYTE_CODE_POINT: u32 = 0xFF;

/// Largest encodable code point; the lead byte of a three-byte code point
/// must stay below [`CODE_POINT_TERMINATOR`].
pub const MAX_CODE_POINT: u32 = 0x1E_FFFF;

/// Cap on merged code points per node. Longer sequences are treated as
/// corrupt rather than decoded, which bounds the allocation a hostile image
/// can force per node.
pub const MAX_CODE_POINT_COUNT_PER_NODE: usize = 48;

/// Largest value an array size field can carry (15 bits).
pub const MAX_PT_NODE_ARRAY_SIZE: usize = 0x7FFF;

/// The node is the end of a stored word and carries a probability byte.
pub const FLAG_IS_TERMINAL: u8 = 0x10;

/// The node's code point sequence is terminator-closed rather than a single
/// code point.
pub const FLAG_HAS_MULTIPLE_CODE_POINTS: u8 = 0x20;

/// The node has been logically removed by an update; readers must not match
/// or enumerate it as a word.
pub const FLAG_IS_DELETED: u8 = 0x40;

fn invalid_data(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Reads a single byte, e.g. a flags or probability field.
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Writes a single byte and returns the number of bytes written.
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<usize> {
    writer.write_all(&[value])?;
    Ok(1)
}

/// Decodes a PtNode array size field.
pub fn read_pt_node_array_size<R: Read>(reader: &mut R) -> io::Result<usize> {
    let first = read_u8(reader)?;
    if first & 0x80 == 0 {
        return Ok(first as usize);
    }
    let second = read_u8(reader)?;
    Ok(((first & 0x7F) as usize) << 8 | second as usize)
}

/// Encodes a PtNode array size field and returns the number of bytes
/// written.
pub fn write_pt_node_array_size<W: Write>(writer: &mut W, size: usize) -> io::Result<usize> {
    if size > MAX_PT_NODE_ARRAY_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "PtNode array size does not fit in the 15-bit size field",
        ));
    }
    if size < 0x80 {
        writer.write_all(&[size as u8])?;
        Ok(1)
    } else {
        writer.write_all(&[0x80 | (size >> 8) as u8, size as u8])?;
        Ok(2)
    }
}

/// Decodes a three-byte signed offset field (forward link, parent offset or
/// children offset). `0` is the "absent" value.
pub fn read_dict_offset<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0; 3];
    reader.read_exact(&mut buf)?;
    let raw = (buf[0] as u32) << 16 | (buf[1] as u32) << 8 | buf[2] as u32;
    // Sign-extend from 24 bits.
    Ok(((raw << 8) as i32) >> 8)
}

/// Encodes a three-byte signed offset field and returns the number of bytes
/// written.
pub fn write_dict_offset<W: Write>(writer: &mut W, offset: i32) -> io::Result<usize> {
    if !(-(1 << 23)..(1 << 23)).contains(&offset) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "offset does not fit in a three-byte field",
        ));
    }
    let raw = offset as u32;
    writer.write_all(&[(raw >> 16) as u8, (raw >> 8) as u8, raw as u8])?;
    Ok(3)
}

fn read_code_point_lead(reader: &mut impl Read) -> io::Result<u8> {
    read_u8(reader)
}

fn read_code_point_tail(reader: &mut impl Read, lead: u8) -> io::Result<u32> {
    if lead as u32 >= MIN_ONE_BYTE_CODE_POINT {
        return Ok(lead as u32);
    }
    let mut buf = [0; 2];
    reader.read_exact(&mut buf)?;
    Ok((lead as u32) << 16 | (buf[0] as u32) << 8 | buf[1] as u32)
}

/// Decodes a node's merged code point sequence.
///
/// `has_multiple` mirrors the node's [`FLAG_HAS_MULTIPLE_CODE_POINTS`] flag:
/// when set, code points are read until the terminator byte; otherwise
/// exactly one code point is read.
pub fn read_code_points<R: Read>(reader: &mut R, has_multiple: bool) -> io::Result<Vec<u32>> {
    let lead = read_code_point_lead(reader)?;
    if lead == CODE_POINT_TERMINATOR {
        return Err(invalid_data("PtNode has an empty code point sequence"));
    }
    let mut code_points = vec![read_code_point_tail(reader, lead)?];
    if !has_multiple {
        return Ok(code_points);
    }
    loop {
        let lead = read_code_point_lead(reader)?;
        if lead == CODE_POINT_TERMINATOR {
            return Ok(code_points);
        }
        if code_points.len() == MAX_CODE_POINT_COUNT_PER_NODE {
            return Err(invalid_data("merged code point sequence is too long"));
        }
        code_points.push(read_code_point_tail(reader, lead)?);
    }
}

/// Encodes a merged code point sequence, including the terminator when the
/// sequence holds more than one code point. Returns the number of bytes
/// written.
///
/// The matching node flags must set [`FLAG_HAS_MULTIPLE_CODE_POINTS`] iff
/// `code_points.len() > 1`.
pub fn write_code_points<W: Write>(writer: &mut W, code_points: &[u32]) -> io::Result<usize> {
    if code_points.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "a PtNode must carry at least one code point",
        ));
    }
    if code_points.len() > MAX_CODE_POINT_COUNT_PER_NODE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "merged code point sequence is too long",
        ));
    }
    let mut written = 0;
    for &code_point in code_points {
        written += write_code_point(writer, code_point)?;
    }
    if code_points.len() > 1 {
        written += write_u8(writer, CODE_POINT_TERMINATOR)?;
    }
    Ok(written)
}

fn write_code_point<W: Write>(writer: &mut W, code_point: u32) -> io::Result<usize> {
    if (MIN_ONE_BYTE_CODE_POINT..=MAX_ONE_BYTE_CODE_POINT).contains(&code_point) {
        writer.write_all(&[code_point as u8])?;
        Ok(1)
    } else if code_point <= MAX_CODE_POINT {
        writer.write_all(&[
            (code_point >> 16) as u8,
            (code_point >> 8) as u8,
            code_point as u8,
        ])?;
        Ok(3)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "code point is not encodable",
        ))
    }
}
