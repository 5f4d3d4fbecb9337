//! Reading `.pack` files.
//!
//! A pack is `"PACK" | version | object count`, a run of entries (header +
//! zlib payload), and a trailing SHA-1 of everything before it.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use grit_hash::ObjectId;
use grit_object::ObjectKind;
use memmap2::Mmap;

use crate::delta::apply_delta;
use crate::entry::{parse_entry_header, EntryHeader};
use crate::index::PackIndex;
use crate::{
    EntryKind, PackError, MAX_DELTA_CHAIN_DEPTH, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION,
};

/// A memory-mapped packfile together with its verified index.
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
}

impl std::fmt::Debug for PackFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackFile")
            .field("pack_path", &self.pack_path)
            .field("num_objects", &self.num_objects)
            .finish()
    }
}

impl PackFile {
    /// Open a `.pack` and its companion `.idx`.
    ///
    /// Validates the pack header and requires the object counts of pack and
    /// index to agree.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();
        let idx_path = pack_path.with_extension("idx");
        let index = PackIndex::open(&idx_path)?;

        let file = std::fs::File::open(&pack_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < PACK_HEADER_SIZE + 20 {
            return Err(PackError::InvalidHeader("file too small".into()));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(PackError::InvalidHeader("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        if num_objects != index.num_objects() {
            return Err(PackError::InvalidHeader(format!(
                "pack holds {num_objects} objects, index {}",
                index.num_objects()
            )));
        }

        Ok(Self {
            data,
            index,
            pack_path,
            num_objects,
        })
    }

    /// Parse the entry header at an absolute pack offset.
    pub fn entry_at(&self, offset: u64) -> Result<EntryHeader, PackError> {
        let body_end = self.data.len() - 20;
        if offset < PACK_HEADER_SIZE as u64 || offset >= body_end as u64 {
            return Err(PackError::CorruptEntry(offset));
        }
        parse_entry_header(&self.data[offset as usize..body_end], offset)
    }

    /// Inflate the payload starting at `data_offset`, expecting exactly
    /// `expected_size` bytes out.
    ///
    /// The zlib stream carries its own end marker, so trailing pack bytes
    /// are left untouched.
    pub fn inflate_at(&self, data_offset: u64, expected_size: u64) -> Result<Vec<u8>, PackError> {
        let start = data_offset as usize;
        if start >= self.data.len() {
            return Err(PackError::CorruptEntry(data_offset));
        }
        let mut decoder = ZlibDecoder::new(&self.data[start..]);
        let mut buf = Vec::with_capacity(expected_size as usize);
        decoder
            .read_to_end(&mut buf)
            .map_err(|_| PackError::CorruptEntry(data_offset))?;
        if buf.len() as u64 != expected_size {
            return Err(PackError::CorruptEntry(data_offset));
        }
        Ok(buf)
    }

    /// Read an object by id, resolving delta chains within this pack.
    ///
    /// Returns `Ok(None)` when the id is not in this pack's index. A ref
    /// delta whose base lives in another pack fails with `MissingBase`;
    /// multi-pack resolution belongs to the object opener.
    pub fn read_object(
        &self,
        id: &ObjectId,
    ) -> Result<Option<(ObjectKind, Vec<u8>)>, PackError> {
        let offset = match self.index.lookup(id)? {
            Some(offset) => offset,
            None => return Ok(None),
        };
        self.read_at(offset).map(Some)
    }

    /// Read the object stored at an absolute entry offset, applying any
    /// delta chain that stays within this pack.
    pub fn read_at(&self, offset: u64) -> Result<(ObjectKind, Vec<u8>), PackError> {
        // Walk to the base, collecting delta payloads outermost-first.
        let mut deltas: Vec<Vec<u8>> = Vec::new();
        let mut current = offset;

        for _ in 0..=MAX_DELTA_CHAIN_DEPTH {
            let entry = self.entry_at(current)?;
            match entry.kind {
                EntryKind::Commit | EntryKind::Tree | EntryKind::Blob | EntryKind::Tag => {
                    let kind = entry.kind.object_kind().expect("plain entry kind");
                    let mut data = self.inflate_at(entry.data_offset, entry.size)?;
                    for delta in deltas.iter().rev() {
                        data = apply_delta(&data, delta)?;
                    }
                    return Ok((kind, data));
                }
                EntryKind::OfsDelta { base_offset } => {
                    deltas.push(self.inflate_at(entry.data_offset, entry.size)?);
                    current = base_offset;
                }
                EntryKind::RefDelta { base_id } => {
                    deltas.push(self.inflate_at(entry.data_offset, entry.size)?);
                    match self.index.lookup(&base_id)? {
                        Some(base_offset) => current = base_offset,
                        None => return Err(PackError::MissingBase(base_id)),
                    }
                }
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset,
            max_depth: MAX_DELTA_CHAIN_DEPTH,
        })
    }

    /// Whether this pack's index lists the id.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.find(id).is_some()
    }

    /// Object count from the pack header.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The companion index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Path of the `.pack` file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }

    /// The raw mapped pack bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
