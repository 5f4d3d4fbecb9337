//! Pack index (v2) reading and lookup.
//!
//! The index maps object ids to byte offsets in the companion `.pack`.
//! Layout:
//!
//! ```text
//! Header:  \xff t O c | version (= 2), both big-endian u32
//! Fanout:  256 cumulative counts, big-endian u32
//! Ids:     N sorted 20-byte ids
//! CRC32:   N big-endian u32, parallel to the id column
//! Offsets: N big-endian u32; high bit set -> low 31 bits index the 64-bit table
//! 64-bit:  M big-endian u64 (present when the pack exceeds 2 GiB)
//! Trailer: 20-byte pack checksum | 20-byte index checksum
//! ```
//!
//! Opening verifies the whole structure, including the trailing SHA-1 over
//! every preceding byte; a malformed or tampered index never becomes a
//! usable value.

use std::path::{Path, PathBuf};

use grit_hash::fanout::FANOUT_BYTES;
use grit_hash::hasher::Hasher;
use grit_hash::{FanoutTable, ObjectId};
use memmap2::Mmap;

use crate::{PackError, IDX_SIGNATURE, IDX_VERSION, LARGE_OFFSET_THRESHOLD};

const TRAILER_LEN: usize = 40;
const OID_LEN: usize = 20;

/// An open, verified pack index.
pub struct PackIndex {
    data: Mmap,
    fanout: FanoutTable,
    num_objects: u32,
    oid_start: usize,
    crc_start: usize,
    offset32_start: usize,
    offset64_start: usize,
    num_large_offsets: usize,
    idx_path: PathBuf,
    pack_path: PathBuf,
    pack_size: u64,
}

impl std::fmt::Debug for PackIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackIndex")
            .field("idx_path", &self.idx_path)
            .field("pack_path", &self.pack_path)
            .field("num_objects", &self.num_objects)
            .field("pack_size", &self.pack_size)
            .finish()
    }
}

impl PackIndex {
    /// Open and verify a pack index file.
    ///
    /// The companion `.pack` must exist; its size decides whether the
    /// 64-bit offset table is part of the layout.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let pack_path = idx_path.with_extension("pack");
        let pack_size = std::fs::metadata(&pack_path)?.len();

        let file = std::fs::File::open(&idx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < 8 + FANOUT_BYTES + TRAILER_LEN {
            return Err(PackError::InvalidIndex(format!(
                "file too small: {} bytes",
                data.len()
            )));
        }
        if data[0..4] != IDX_SIGNATURE {
            return Err(PackError::InvalidIndex("bad signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != IDX_VERSION {
            return Err(PackError::InvalidIndex(format!(
                "unsupported version {version}, expected {IDX_VERSION}"
            )));
        }

        let fanout = FanoutTable::from_bytes(&data[8..8 + FANOUT_BYTES])?;
        let num_objects = fanout.total();
        let n = num_objects as usize;

        let oid_start = 8 + FANOUT_BYTES;
        let crc_start = oid_start + n * OID_LEN;
        let offset32_start = crc_start + n * 4;
        let offset64_start = offset32_start + n * 4;

        if data.len() < offset64_start + TRAILER_LEN {
            return Err(PackError::InvalidIndex(format!(
                "{n} objects do not fit in {} bytes",
                data.len()
            )));
        }

        // The 64-bit offset table fills whatever lies between the 32-bit
        // offsets and the trailer. It may only be present for large packs.
        let spare = data.len() - offset64_start - TRAILER_LEN;
        let num_large_offsets = if pack_size > LARGE_OFFSET_THRESHOLD {
            if spare % 8 != 0 {
                return Err(PackError::InvalidIndex(format!(
                    "large offset table has odd size {spare}"
                )));
            }
            spare / 8
        } else {
            if spare != 0 {
                return Err(PackError::InvalidIndex(format!(
                    "{spare} unexpected bytes before trailer"
                )));
            }
            0
        };

        // Trailer: the final 20 bytes are the SHA-1 of everything before
        // them, including the pack checksum that precedes them.
        let body_len = data.len() - OID_LEN;
        let mut hasher = Hasher::new();
        hasher.update(&data[..body_len]);
        let computed = hasher.finalize();
        let stored = ObjectId::from_bytes(&data[body_len..])?;
        if computed != stored {
            return Err(PackError::IndexChecksumMismatch { stored, computed });
        }

        Ok(Self {
            data,
            fanout,
            num_objects,
            oid_start,
            crc_start,
            offset32_start,
            offset64_start,
            num_large_offsets,
            idx_path,
            pack_path,
            pack_size,
        })
    }

    /// Find the slot of an id, or `None` if it is not in this index.
    pub fn find(&self, id: &ObjectId) -> Option<u32> {
        let range = self.fanout.range(id.first_byte());
        let target: &[u8] = id.as_bytes();

        let mut low = range.start;
        let mut high = range.end;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.oid_bytes_at(mid).cmp(target) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return Some(mid as u32),
            }
        }
        None
    }

    /// Pack file offset of the entry at the given slot.
    ///
    /// Resolves the 31-bit/64-bit split: a 32-bit value with the high bit
    /// set indexes the 64-bit table with its low 31 bits.
    pub fn offset_at(&self, slot: u32) -> Result<u64, PackError> {
        let pos = self.offset32_start + slot as usize * 4;
        let raw = u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ]);
        if raw & 0x8000_0000 == 0 {
            return Ok(raw as u64);
        }

        let idx64 = (raw & 0x7fff_ffff) as usize;
        if idx64 >= self.num_objects as usize || idx64 >= self.num_large_offsets {
            return Err(PackError::InvalidIndex(format!(
                "large offset index {idx64} out of range ({} entries)",
                self.num_large_offsets
            )));
        }
        let pos = self.offset64_start + idx64 * 8;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[pos..pos + 8]);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Convenience: find an id and resolve its offset in one call.
    pub fn lookup(&self, id: &ObjectId) -> Result<Option<u64>, PackError> {
        match self.find(id) {
            Some(slot) => self.offset_at(slot).map(Some),
            None => Ok(None),
        }
    }

    /// All ids starting with the given byte prefix, with their offsets.
    pub fn lookup_prefix(&self, prefix: &[u8]) -> Result<Vec<(ObjectId, u64)>, PackError> {
        if prefix.is_empty() || prefix.len() > OID_LEN {
            return Ok(Vec::new());
        }
        let mut matches = Vec::new();
        for slot in self.fanout.range(prefix[0]) {
            let bytes = self.oid_bytes_at(slot);
            if &bytes[..prefix.len()] == prefix {
                let id = ObjectId::from_bytes(bytes)?;
                matches.push((id, self.offset_at(slot as u32)?));
            }
        }
        Ok(matches)
    }

    /// The id at the given slot.
    pub fn oid_at(&self, slot: u32) -> ObjectId {
        let bytes = self.oid_bytes_at(slot as usize);
        // Slot arithmetic was validated against the file size at open.
        ObjectId::from_bytes(bytes).expect("20-byte id column slice")
    }

    /// The CRC32 of the raw entry bytes, at the given slot.
    pub fn crc32_at(&self, slot: u32) -> u32 {
        let pos = self.crc_start + slot as usize * 4;
        u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ])
    }

    /// Number of objects in the index (equal to `fanout[255]`).
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The fan-out table.
    pub fn fanout(&self) -> &FanoutTable {
        &self.fanout
    }

    /// Path of the `.idx` file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// Path of the companion `.pack` file.
    pub fn pack_path(&self) -> &Path {
        &self.pack_path
    }

    /// Size of the companion `.pack`, as stat'd at open time.
    pub fn pack_size(&self) -> u64 {
        self.pack_size
    }

    /// The pack checksum recorded in the trailer.
    pub fn pack_checksum(&self) -> ObjectId {
        let start = self.data.len() - TRAILER_LEN;
        ObjectId::from_bytes(&self.data[start..start + OID_LEN]).expect("trailer slice")
    }

    /// The index's own checksum, the final 20 bytes of the file.
    pub fn index_checksum(&self) -> ObjectId {
        let start = self.data.len() - OID_LEN;
        ObjectId::from_bytes(&self.data[start..]).expect("trailer slice")
    }

    /// Iterate over `(id, offset)` pairs in id order.
    pub fn iter(&self) -> PackIndexIter<'_> {
        PackIndexIter {
            index: self,
            slot: 0,
        }
    }

    fn oid_bytes_at(&self, slot: usize) -> &[u8] {
        let start = self.oid_start + slot * OID_LEN;
        &self.data[start..start + OID_LEN]
    }
}

/// Iterator over `(id, offset)` pairs of a pack index.
pub struct PackIndexIter<'a> {
    index: &'a PackIndex,
    slot: u32,
}

impl Iterator for PackIndexIter<'_> {
    type Item = Result<(ObjectId, u64), PackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot >= self.index.num_objects {
            return None;
        }
        let slot = self.slot;
        self.slot += 1;
        let id = self.index.oid_at(slot);
        Some(self.index.offset_at(slot).map(|offset| (id, offset)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.index.num_objects - self.slot) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PackIndexIter<'_> {}
