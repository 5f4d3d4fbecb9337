//! Synthetic repository construction: loose files and sealed pack pairs
//! written straight into an `objects/` directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use grit_hash::hasher::Hasher;
use grit_hash::{FanoutTable, ObjectId};
use grit_object::{header, ObjectKind};
use grit_pack::entry::{encode_entry_header, encode_negative_offset};
use grit_pack::{IDX_SIGNATURE, IDX_VERSION, PACK_SIGNATURE, PACK_VERSION};

pub enum EntryBody {
    Plain { kind: ObjectKind, data: Vec<u8> },
    OfsDelta { base_slot: usize, delta: Vec<u8> },
    RefDelta { base_id: ObjectId, delta: Vec<u8> },
}

pub struct EntrySpec {
    pub id: ObjectId,
    pub body: EntryBody,
}

pub fn plain(kind: ObjectKind, data: &[u8]) -> EntrySpec {
    EntrySpec {
        id: Hasher::object_id(kind.as_str(), data),
        body: EntryBody::Plain {
            kind,
            data: data.to_vec(),
        },
    }
}

/// Delta stream: base size, result size, instructions.
pub fn delta_stream(base_size: u64, result_size: u64, instructions: &[u8]) -> Vec<u8> {
    let mut buf = grit_pack::delta::write_varint(base_size);
    buf.extend_from_slice(&grit_pack::delta::write_varint(result_size));
    buf.extend_from_slice(instructions);
    buf
}

/// Write a loose object into `objects_dir`, returning its id.
pub fn put_loose(objects_dir: &Path, kind: ObjectKind, content: &[u8]) -> ObjectId {
    let id = Hasher::object_id(kind.as_str(), content);
    let path = objects_dir.join(id.loose_path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut raw = header::write_header(kind, content.len());
    raw.extend_from_slice(content);
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = ZlibEncoder::new(file, Compression::default());
    encoder.write_all(&raw).unwrap();
    encoder.finish().unwrap();
    id
}

/// Write `pack-<seed as 40 hex>.pack` + `.idx` under `objects/pack/`.
/// Returns the idx path and the entry offsets in spec order.
pub fn put_pack(objects_dir: &Path, seed: u64, entries: &[EntrySpec]) -> (PathBuf, Vec<u64>) {
    let pack_dir = objects_dir.join("pack");
    std::fs::create_dir_all(&pack_dir).unwrap();
    let stem = format!("pack-{seed:040x}");

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
            EntryBody::Plain { kind, data } => {
                let kind_num = match kind {
                    ObjectKind::Commit => 1,
                    ObjectKind::Tree => 2,
                    ObjectKind::Blob => 3,
                    ObjectKind::Tag => 4,
                };
                raw.extend_from_slice(&encode_entry_header(kind_num, data.len() as u64));
                raw.extend_from_slice(&deflate(data));
            }
            EntryBody::OfsDelta { base_slot, delta } => {
                raw.extend_from_slice(&encode_entry_header(6, delta.len() as u64));
                raw.extend_from_slice(&encode_negative_offset(offset - offsets[*base_slot]));
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
    std::fs::write(pack_dir.join(format!("{stem}.pack")), &pack).unwrap();

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

    let idx_path = pack_dir.join(format!("{stem}.idx"));
    std::fs::write(&idx_path, &idx).unwrap();
    (idx_path, offsets)
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
