//! Pack discovery and packed-object lookup.
//!
//! `objects/pack/` is scanned once for `pack-<40 hex>.idx` names; the
//! resulting list fixes the probe order (directory-iteration order, first
//! match wins). Indexes are opened and verified on first probe and kept
//! open afterwards, which cannot change which pack answers a lookup.

use std::path::Path;
use std::sync::Arc;

use grit_hash::{hex, ObjectId};
use grit_pack::chain::resolve_chain;
use grit_pack::pack::PackFile;
use grit_pack::{EntryKind, PackError};

use crate::{ObjectDatabase, OdbError, PackSlot, PackedObject, PackedPayload};

/// Length of a pack index file name: `pack-` + 40 hex + `.idx`.
const PACK_INDEX_NAME_LEN: usize = 5 + 40 + 4;

/// Whether a file name is a pack index name.
fn is_pack_index_name(name: &str) -> bool {
    name.len() == PACK_INDEX_NAME_LEN
        && name.starts_with("pack-")
        && name.ends_with(".idx")
        && hex::is_hex(&name[5..45])
}

/// Scan `objects/pack/` for index files, in directory-iteration order.
pub(crate) fn discover_pack_slots(objects_dir: &Path) -> Result<Vec<PackSlot>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    let mut slots = Vec::new();
    if !pack_dir.is_dir() {
        return Ok(slots);
    }
    for entry in std::fs::read_dir(&pack_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if is_pack_index_name(name) {
            slots.push(PackSlot {
                idx_path: entry.path(),
                pack: None,
            });
        }
    }
    Ok(slots)
}

/// Get the pack at a slot, opening and memoizing it on first use.
fn pack_at(odb: &ObjectDatabase, slot: usize) -> Result<Arc<PackFile>, PackError> {
    {
        let packs = odb.packs().read().unwrap();
        if let Some(pack) = packs[slot].pack.as_ref() {
            return Ok(Arc::clone(pack));
        }
    }
    let mut packs = odb.packs().write().unwrap();
    if let Some(pack) = packs[slot].pack.as_ref() {
        return Ok(Arc::clone(pack));
    }
    let pack_path = packs[slot].idx_path.with_extension("pack");
    let pack = Arc::new(PackFile::open(&pack_path)?);
    packs[slot].pack = Some(Arc::clone(&pack));
    Ok(pack)
}

fn slot_count(odb: &ObjectDatabase) -> usize {
    odb.packs().read().unwrap().len()
}

/// Find the pack and offset holding `id`, in probe order.
fn locate_in_packs(
    odb: &ObjectDatabase,
    id: &ObjectId,
) -> Result<Option<(Arc<PackFile>, u64)>, PackError> {
    for slot in 0..slot_count(odb) {
        let pack = pack_at(odb, slot)?;
        if let Some(offset) = pack.index().lookup(id)? {
            return Ok(Some((pack, offset)));
        }
    }
    Ok(None)
}

/// Open a packed object by id: locate the entry, parse its header, and for
/// delta entries resolve the whole chain (ref-delta bases are searched in
/// every pack, in the same probe order).
pub(crate) fn open_packed(
    odb: &ObjectDatabase,
    id: &ObjectId,
) -> Result<Option<PackedObject>, OdbError> {
    let Some((pack, entry_offset)) = locate_in_packs(odb, id)? else {
        return Ok(None);
    };

    let entry = pack.entry_at(entry_offset)?;
    let packed = match entry.kind {
        EntryKind::Commit | EntryKind::Tree | EntryKind::Blob | EntryKind::Tag => {
            let kind = entry.kind.object_kind().expect("plain entry kind");
            PackedObject {
                pack,
                entry_offset,
                kind,
                size: entry.size,
                payload: PackedPayload::Plain {
                    data_offset: entry.data_offset,
                },
            }
        }
        EntryKind::OfsDelta { .. } | EntryKind::RefDelta { .. } => {
            let chain = resolve_chain(&pack, entry_offset, &mut |base_id| {
                locate_in_packs(odb, base_id)
            })?;
            let kind = chain.kind();
            let size = chain.result_size()?;
            PackedObject {
                pack,
                entry_offset,
                kind,
                size,
                payload: PackedPayload::Chain(chain),
            }
        }
    };
    Ok(Some(packed))
}

/// Whether any pack's index lists the id. Unopenable packs count as not
/// holding it.
pub(crate) fn any_pack_contains(odb: &ObjectDatabase, id: &ObjectId) -> bool {
    for slot in 0..slot_count(odb) {
        match pack_at(odb, slot) {
            Ok(pack) => {
                if pack.contains(id) {
                    return true;
                }
            }
            Err(_) => continue,
        }
    }
    false
}
