//! Delta chain resolution across packs.
//!
//! A delta entry names its base either by negative offset (same pack) or
//! by object id (any pack). Resolution walks those references down to a
//! plain entry, recording one link per delta layer; application then runs
//! the other way, from the base out to the requested object.

use std::io::Read;
use std::sync::Arc;

use flate2::bufread::ZlibDecoder;
use grit_hash::ObjectId;
use grit_object::ObjectKind;

use crate::delta::{apply_delta, read_delta_sizes};
use crate::pack::PackFile;
use crate::{EntryKind, PackError, MAX_DELTA_CHAIN_DEPTH};

/// One delta layer: the compressed delta stream at `data_offset` in `pack`.
pub struct DeltaLink {
    pub pack: Arc<PackFile>,
    /// Offset of the entry whose payload this is.
    pub entry_offset: u64,
    /// Offset of the compressed delta stream.
    pub data_offset: u64,
    /// Inflated size of the delta stream.
    pub size: u64,
}

/// The plain entry a chain bottoms out at.
pub struct ChainBase {
    pub pack: Arc<PackFile>,
    pub entry_offset: u64,
    pub data_offset: u64,
    /// Inflated size of the base object.
    pub size: u64,
    pub kind: ObjectKind,
}

/// A resolved delta chain: links ordered from the requested object inward,
/// ending at a plain base. The chain keeps every pack it spans open.
pub struct DeltaChain {
    links: Vec<DeltaLink>,
    base: ChainBase,
}

impl DeltaChain {
    /// Number of delta layers.
    pub fn depth(&self) -> usize {
        self.links.len()
    }

    /// The object kind the chain resolves to.
    pub fn kind(&self) -> ObjectKind {
        self.base.kind
    }

    /// The delta layers, outermost first.
    pub fn links(&self) -> &[DeltaLink] {
        &self.links
    }

    /// The plain base entry.
    pub fn base(&self) -> &ChainBase {
        &self.base
    }

    /// Size of the fully reconstructed object.
    ///
    /// Comes from the result-size header of the outermost delta, so no
    /// delta application happens here.
    pub fn result_size(&self) -> Result<u64, PackError> {
        match self.links.first() {
            Some(link) => peek_result_size(link),
            None => Ok(self.base.size),
        }
    }

    /// Reconstruct the object: inflate the base, then apply every delta
    /// layer from the base outward.
    pub fn materialize(&self) -> Result<Vec<u8>, PackError> {
        let mut data = self
            .base
            .pack
            .inflate_at(self.base.data_offset, self.base.size)?;
        for link in self.links.iter().rev() {
            let delta = link.pack.inflate_at(link.data_offset, link.size)?;
            data = apply_delta(&data, &delta)?;
        }
        Ok(data)
    }
}

/// Resolve the delta chain for the entry at `offset` in `pack`.
///
/// `locate_base` is consulted for ref-delta bases absent from the current
/// pack; it returns the pack and entry offset of the base, which may itself
/// be a delta. Resolution is iterative and capped at
/// [`MAX_DELTA_CHAIN_DEPTH`] layers.
pub fn resolve_chain(
    pack: &Arc<PackFile>,
    offset: u64,
    locate_base: &mut dyn FnMut(&ObjectId) -> Result<Option<(Arc<PackFile>, u64)>, PackError>,
) -> Result<DeltaChain, PackError> {
    let mut links = Vec::new();
    let mut current_pack = Arc::clone(pack);
    let mut current_offset = offset;

    for _ in 0..=MAX_DELTA_CHAIN_DEPTH {
        let entry = current_pack.entry_at(current_offset)?;
        match entry.kind {
            EntryKind::Commit | EntryKind::Tree | EntryKind::Blob | EntryKind::Tag => {
                let kind = entry.kind.object_kind().expect("plain entry kind");
                return Ok(DeltaChain {
                    links,
                    base: ChainBase {
                        pack: current_pack,
                        entry_offset: current_offset,
                        data_offset: entry.data_offset,
                        size: entry.size,
                        kind,
                    },
                });
            }
            EntryKind::OfsDelta { base_offset } => {
                links.push(DeltaLink {
                    pack: Arc::clone(&current_pack),
                    entry_offset: current_offset,
                    data_offset: entry.data_offset,
                    size: entry.size,
                });
                current_offset = base_offset;
            }
            EntryKind::RefDelta { base_id } => {
                links.push(DeltaLink {
                    pack: Arc::clone(&current_pack),
                    entry_offset: current_offset,
                    data_offset: entry.data_offset,
                    size: entry.size,
                });
                if let Some(slot) = current_pack.index().find(&base_id) {
                    current_offset = current_pack.index().offset_at(slot)?;
                } else {
                    match locate_base(&base_id)? {
                        Some((base_pack, base_offset)) => {
                            current_pack = base_pack;
                            current_offset = base_offset;
                        }
                        None => return Err(PackError::MissingBase(base_id)),
                    }
                }
            }
        }
    }

    Err(PackError::DeltaChainTooDeep {
        offset,
        max_depth: MAX_DELTA_CHAIN_DEPTH,
    })
}

/// Inflate just enough of a delta stream to read its result size.
fn peek_result_size(link: &DeltaLink) -> Result<u64, PackError> {
    let data = link.pack.data();
    let start = link.data_offset as usize;
    if start >= data.len() {
        return Err(PackError::CorruptEntry(link.data_offset));
    }

    // Two maximal varints fit in 20 bytes; 32 gives slack.
    let mut decoder = ZlibDecoder::new(&data[start..]);
    let mut prefix = [0u8; 32];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = decoder
            .read(&mut prefix[filled..])
            .map_err(|_| PackError::CorruptEntry(link.data_offset))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let (_base_size, result_size, _header_len) = read_delta_sizes(&prefix[..filled])?;
    Ok(result_size)
}
