//! Synthetic pack construction for tests.
//!
//! Builds byte-exact `.pack`/`.idx` pairs without a pack writer: entries
//! are laid out in order, offsets recorded, and the index sealed with real
//! fanout, CRC, and trailer hashes.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use grit_hash::hasher::Hasher;
use grit_hash::{FanoutTable, ObjectId};
use grit_pack::entry::{encode_entry_header, encode_negative_offset};
use grit_pack::{IDX_SIGNATURE, IDX_VERSION, PACK_SIGNATURE, PACK_VERSION};

pub enum EntryBody {
    /// A literal object: kind number 1-4 plus uncompressed content.
    Plain { kind_num: u8, data: Vec<u8> },
    /// An offset delta against an earlier entry of this pack.
    OfsDelta { base_slot: usize, delta: Vec<u8> },
    /// A ref delta naming its base by id.
    RefDelta { base_id: ObjectId, delta: Vec<u8> },
}

pub struct EntrySpec {
    /// The id recorded in the index (the hash of the reconstructed object).
    pub id: ObjectId,
    pub body: EntryBody,
}

pub fn plain(kind_word: &str, kind_num: u8, data: &[u8]) -> EntrySpec {
    EntrySpec {
        id: Hasher::object_id(kind_word, data),
        body: EntryBody::Plain {
            kind_num,
            data: data.to_vec(),
        },
    }
}

/// Write a `.pack` and matching `.idx`. Returns the pack path and the
/// entry offsets, in spec order.
pub fn build_pack(dir: &Path, name: &str, entries: &[EntrySpec]) -> (PathBuf, Vec<u64>) {
    let pack_path = dir.join(format!("{name}.pack"));
    let idx_path = dir.join(format!("{name}.idx"));

    let mut pack = Vec::new();
    pack.extend_from_slice(PACK_SIGNATURE);
    pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
    pack.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    let mut offsets = Vec::with_capacity(entries.len());
    let mut crcs = Vec::with_capacity(entries.len());

    for spec in entries {
        let offset = pack.len() as u64;
        offsets.push(offset);

        let mut raw = Vec::new();
        match &spec.body {
            EntryBody::Plain { kind_num, data } => {
                raw.extend_from_slice(&encode_entry_header(*kind_num, data.len() as u64));
                raw.extend_from_slice(&deflate(data));
            }
            EntryBody::OfsDelta { base_slot, delta } => {
                raw.extend_from_slice(&encode_entry_header(6, delta.len() as u64));
                let neg = offset - offsets[*base_slot];
                raw.extend_from_slice(&encode_negative_offset(neg));
                raw.extend_from_slice(&deflate(delta));
            }
            EntryBody::RefDelta { base_id, delta } => {
                raw.extend_from_slice(&encode_entry_header(7, delta.len() as u64));
                raw.extend_from_slice(base_id.as_bytes());
                raw.extend_from_slice(&deflate(delta));
            }
        }

        let mut crc = crc32fast::Hasher::new();
        crc.update(&raw);
        crcs.push(crc.finalize());
        pack.extend_from_slice(&raw);
    }

    let mut hasher = Hasher::new();
    hasher.update(&pack);
    let pack_checksum = hasher.finalize();
    pack.extend_from_slice(pack_checksum.as_bytes());
    std::fs::write(&pack_path, &pack).unwrap();

    let idx = build_idx(entries, &offsets, &crcs, &pack_checksum);
    std::fs::write(&idx_path, &idx).unwrap();

    (pack_path, offsets)
}

fn build_idx(
    entries: &[EntrySpec],
    offsets: &[u64],
    crcs: &[u32],
    pack_checksum: &ObjectId,
) -> Vec<u8> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&i| entries[i].id);

    let mut idx = Vec::new();
    idx.extend_from_slice(&IDX_SIGNATURE);
    idx.extend_from_slice(&IDX_VERSION.to_be_bytes());

    let sorted_ids: Vec<ObjectId> = order.iter().map(|&i| entries[i].id).collect();
    let fanout = FanoutTable::build(&sorted_ids);
    for bucket in 0..=255u8 {
        idx.extend_from_slice(&fanout.get(bucket).to_be_bytes());
    }
    for id in &sorted_ids {
        idx.extend_from_slice(id.as_bytes());
    }
    for &i in &order {
        idx.extend_from_slice(&crcs[i].to_be_bytes());
    }
    for &i in &order {
        idx.extend_from_slice(&(offsets[i] as u32).to_be_bytes());
    }

    idx.extend_from_slice(pack_checksum.as_bytes());
    let mut hasher = Hasher::new();
    hasher.update(&idx);
    idx.extend_from_slice(hasher.finalize().as_bytes());
    idx
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
