//! Packed entry header codec.
//!
//! An entry starts with a variable-length header: the first byte carries
//! the kind in bits 4-6 and the low four bits of the inflated size; while
//! bit 7 is set, each following byte contributes seven more size bits,
//! least significant first. Delta entries append their base reference: a
//! variable-length negative offset for offset deltas, a literal 20-byte id
//! for ref deltas.

use grit_hash::ObjectId;

use crate::{EntryKind, PackError};

/// A 64-bit size never needs more than ten header bytes.
const MAX_SIZE_BYTES: usize = 10;

/// A decoded entry header.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub kind: EntryKind,
    /// Inflated size of the entry payload (for deltas, of the delta stream).
    pub size: u64,
    /// Bytes consumed by the header, including any base reference.
    pub header_len: usize,
    /// Absolute offset of the compressed payload in the pack.
    pub data_offset: u64,
}

/// Decode the entry header starting at `data[0]`, which sits at absolute
/// offset `entry_offset` in the pack.
pub fn parse_entry_header(data: &[u8], entry_offset: u64) -> Result<EntryHeader, PackError> {
    if data.is_empty() {
        return Err(PackError::CorruptEntry(entry_offset));
    }

    let mut pos = 0;
    let first = data[pos];
    pos += 1;

    let kind_bits = (first >> 4) & 0x07;
    let mut size = (first & 0x0f) as u64;
    let mut shift = 4;

    let mut byte = first;
    while byte & 0x80 != 0 {
        if pos >= data.len() || pos >= MAX_SIZE_BYTES {
            return Err(PackError::CorruptEntry(entry_offset));
        }
        byte = data[pos];
        pos += 1;
        size |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    let kind = match kind_bits {
        1 => EntryKind::Commit,
        2 => EntryKind::Tree,
        3 => EntryKind::Blob,
        4 => EntryKind::Tag,
        6 => {
            let (neg_offset, consumed) = parse_negative_offset(&data[pos..], entry_offset)?;
            pos += consumed;
            if neg_offset == 0 || neg_offset >= entry_offset {
                return Err(PackError::CorruptEntry(entry_offset));
            }
            EntryKind::OfsDelta {
                base_offset: entry_offset - neg_offset,
            }
        }
        7 => {
            if pos + 20 > data.len() {
                return Err(PackError::CorruptEntry(entry_offset));
            }
            let base_id = ObjectId::from_bytes(&data[pos..pos + 20])
                .map_err(|_| PackError::CorruptEntry(entry_offset))?;
            pos += 20;
            EntryKind::RefDelta { base_id }
        }
        other => {
            // 0 and 5 are the undefined kind numbers of the 3-bit field.
            return Err(PackError::UnsupportedEntryKind {
                kind: other,
                offset: entry_offset,
            });
        }
    };

    Ok(EntryHeader {
        kind,
        size,
        header_len: pos,
        data_offset: entry_offset + pos as u64,
    })
}

/// Decode an offset delta's negative base offset.
///
/// Big-endian by septet with a continuation bit, and an extra +1 folded in
/// per continuation so that multi-byte encodings have no redundant forms.
fn parse_negative_offset(data: &[u8], entry_offset: u64) -> Result<(u64, usize), PackError> {
    if data.is_empty() {
        return Err(PackError::CorruptEntry(entry_offset));
    }
    let mut pos = 0;
    let mut byte = data[pos];
    pos += 1;
    let mut value = (byte & 0x7f) as u64;
    while byte & 0x80 != 0 {
        if pos >= data.len() || pos >= MAX_SIZE_BYTES {
            return Err(PackError::CorruptEntry(entry_offset));
        }
        byte = data[pos];
        pos += 1;
        value = ((value + 1) << 7) | (byte & 0x7f) as u64;
    }
    Ok((value, pos))
}

/// Encode an entry header (kind number + inflated size). Base references
/// for delta kinds are appended separately.
pub fn encode_entry_header(kind_number: u8, size: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_SIZE_BYTES);
    let mut rest = size;
    let mut byte = (kind_number << 4) | (rest & 0x0f) as u8;
    rest >>= 4;
    while rest > 0 {
        buf.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    buf.push(byte);
    buf
}

/// Encode an offset delta's negative base offset.
pub fn encode_negative_offset(offset: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_SIZE_BYTES);
    let mut rest = offset;
    buf.push((rest & 0x7f) as u8);
    rest >>= 7;
    while rest > 0 {
        rest -= 1;
        buf.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    buf.reverse();
    buf
}
