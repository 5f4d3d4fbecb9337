//! Integration tests: unified reads over mixed loose and packed storage.
//!
//! Repositories are synthesized on disk; nothing here shells out. The
//! closing tests replay the store's end-to-end contract: whatever the
//! opener returns must hash back to the id it was asked for.

mod common;

use common::{delta_stream, plain, put_loose, put_pack, EntryBody, EntrySpec};
use grit_hash::hasher::Hasher;
use grit_hash::ObjectId;
use grit_object::ObjectKind;
use grit_odb::{Object, ObjectDatabase, OdbError};
use grit_pack::delta::{encode_copy, encode_insert};
use grit_pack::PackError;

fn empty_objects_dir() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let objects = dir.path().join("objects");
    std::fs::create_dir_all(&objects).unwrap();
    (dir, objects)
}

// ── loose storage ───────────────────────────────────────────────────

#[test]
fn loose_empty_blob_roundtrip() {
    let (_dir, objects) = empty_objects_dir();
    let id = put_loose(&objects, ObjectKind::Blob, b"");
    assert_eq!(id.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let object = odb.open(&id).unwrap();
    assert!(!object.is_packed());
    assert_eq!(object.kind(), ObjectKind::Blob);
    assert_eq!(object.size(), 0);

    let data = odb.extract(object).unwrap();
    assert!(data.is_empty());
    assert_eq!(Hasher::object_id("blob", &data), id);
}

#[test]
fn loose_only_repository_serves_every_object() {
    let (_dir, objects) = empty_objects_dir();
    let contents: Vec<Vec<u8>> = (0..20u8).map(|i| vec![i; i as usize + 1]).collect();
    let ids: Vec<ObjectId> = contents
        .iter()
        .map(|c| put_loose(&objects, ObjectKind::Blob, c))
        .collect();

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    for (id, content) in ids.iter().zip(&contents) {
        let (kind, data) = odb.read(id).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(&data, content);
    }
}

#[test]
fn missing_object_is_not_found() {
    let (_dir, objects) = empty_objects_dir();
    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let id = ObjectId::from_hex("00000000000000000000000000000000000000ff").unwrap();

    let err = odb.open(&id).unwrap_err();
    assert!(matches!(err, OdbError::NotFound(missing) if missing == id));
    assert!(!odb.contains(&id));
}

// ── packed storage ──────────────────────────────────────────────────

#[test]
fn packed_empty_tree() {
    let (_dir, objects) = empty_objects_dir();
    put_pack(&objects, 1, &[plain(ObjectKind::Tree, b"")]);

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let id = ObjectId::from_hex("4b825dc642cb6eb9a060e54bf8d69288fbee4904").unwrap();

    let object = odb.open(&id).unwrap();
    assert!(object.is_packed());
    assert_eq!(object.kind(), ObjectKind::Tree);
    assert_eq!(object.size(), 0);
    assert!(odb.extract(object).unwrap().is_empty());
}

#[test]
fn packed_only_repository_serves_every_object() {
    let (_dir, objects) = empty_objects_dir();
    let entries = vec![
        plain(ObjectKind::Blob, b"alpha"),
        plain(ObjectKind::Blob, b"beta"),
        plain(ObjectKind::Tag, b"object 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n"),
    ];
    let ids: Vec<ObjectId> = entries.iter().map(|e| e.id).collect();
    put_pack(&objects, 2, &entries);

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    for id in &ids {
        let (kind, data) = odb.read(id).unwrap();
        assert_eq!(Hasher::object_id(kind.as_str(), &data), *id);
    }
}

#[test]
fn offset_delta_through_opener() {
    let (_dir, objects) = empty_objects_dir();

    let base = b"hello\n";
    let target = b"hello!\n";
    let mut ins = encode_copy(0, 5);
    ins.extend_from_slice(&encode_insert(b"!\n"));

    let entries = vec![
        plain(ObjectKind::Blob, base),
        EntrySpec {
            id: Hasher::object_id("blob", target),
            body: EntryBody::OfsDelta {
                base_slot: 0,
                delta: delta_stream(6, 7, &ins),
            },
        },
    ];
    let target_id = entries[1].id;
    put_pack(&objects, 3, &entries);

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let object = odb.open(&target_id).unwrap();
    assert_eq!(object.kind(), ObjectKind::Blob);
    assert_eq!(object.size(), 7, "size comes from the delta header");
    if let Object::Packed(packed) = &object {
        assert_eq!(packed.chain().unwrap().depth(), 1);
    } else {
        panic!("expected a packed object");
    }

    let data = odb.extract(object).unwrap();
    assert_eq!(data, target);
    assert_eq!(Hasher::object_id("blob", &data), target_id);
}

#[test]
fn ref_delta_spanning_packs() {
    let (_dir, objects) = empty_objects_dir();

    // Pack A: the base. Pack B: a ref delta turning "aaaaa" into "aaaab".
    let base_spec = plain(ObjectKind::Blob, b"aaaaa");
    let base_id = base_spec.id;
    put_pack(&objects, 0xa, &[base_spec]);

    let mut ins = encode_copy(0, 4);
    ins.extend_from_slice(&encode_insert(b"b"));
    let target_id = Hasher::object_id("blob", b"aaaab");
    put_pack(
        &objects,
        0xb,
        &[EntrySpec {
            id: target_id,
            body: EntryBody::RefDelta {
                base_id,
                delta: delta_stream(5, 5, &ins),
            },
        }],
    );

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let (kind, data) = odb.read(&target_id).unwrap();
    assert_eq!(kind, ObjectKind::Blob);
    assert_eq!(data, b"aaaab");
}

#[test]
fn loose_object_wins_over_packed() {
    let (_dir, objects) = empty_objects_dir();
    let content = b"stored twice";
    let id = put_loose(&objects, ObjectKind::Blob, content);
    put_pack(&objects, 4, &[plain(ObjectKind::Blob, content)]);

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let object = odb.open(&id).unwrap();
    assert!(!object.is_packed(), "loose storage is probed first");
    assert_eq!(odb.extract(object).unwrap(), content);
}

#[test]
fn duplicate_id_across_packs_resolves_stably() {
    let (_dir, objects) = empty_objects_dir();
    let content = b"in both packs";
    let id = Hasher::object_id("blob", content);
    put_pack(&objects, 5, &[plain(ObjectKind::Blob, content)]);
    put_pack(&objects, 6, &[plain(ObjectKind::Blob, content)]);

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let first = match odb.open(&id).unwrap() {
        Object::Packed(p) => p.pack_path().to_path_buf(),
        Object::Loose(_) => panic!("expected packed"),
    };
    // First match wins, and the winner does not change between lookups.
    for _ in 0..3 {
        match odb.open(&id).unwrap() {
            Object::Packed(p) => assert_eq!(p.pack_path(), first),
            Object::Loose(_) => panic!("expected packed"),
        }
    }
    assert_eq!(odb.read(&id).unwrap().1, content);
}

// ── corruption surfaces as typed errors ─────────────────────────────

#[test]
fn corrupt_index_trailer_fails_the_lookup() {
    let (_dir, objects) = empty_objects_dir();
    let entries = vec![plain(ObjectKind::Blob, b"sealed")];
    let id = entries[0].id;
    let (idx_path, _) = put_pack(&objects, 7, &entries);

    let mut bytes = std::fs::read(&idx_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&idx_path, &bytes).unwrap();

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let err = odb.open(&id).unwrap_err();
    assert!(matches!(
        err,
        OdbError::Pack(PackError::IndexChecksumMismatch { .. })
    ));
}

#[test]
fn corrupt_delta_size_is_bad_delta() {
    let (_dir, objects) = empty_objects_dir();

    let entries = vec![
        plain(ObjectKind::Blob, b"hello\n"),
        EntrySpec {
            id: ObjectId::from_hex("feedfacefeedfacefeedfacefeedfacefeedface").unwrap(),
            body: EntryBody::OfsDelta {
                base_slot: 0,
                // The base is 6 bytes; the delta claims 42.
                delta: delta_stream(42, 2, &encode_insert(b"hi")),
            },
        },
    ];
    let delta_id = entries[1].id;
    put_pack(&objects, 8, &entries);

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let object = odb.open(&delta_id).unwrap();
    let err = odb.extract(object).unwrap_err();
    assert!(matches!(err, OdbError::Pack(PackError::InvalidDelta { .. })));
}

// ── ancillary behavior ──────────────────────────────────────────────

#[test]
fn read_header_does_not_materialize() {
    let (_dir, objects) = empty_objects_dir();
    let id = put_loose(&objects, ObjectKind::Commit, b"tree x\n\nmessage\n");

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let (kind, size) = odb.read_header(&id).unwrap();
    assert_eq!(kind, ObjectKind::Commit);
    assert_eq!(size, 16);
}

#[test]
fn read_cached_returns_shared_bytes() {
    let (_dir, objects) = empty_objects_dir();
    let id = put_loose(&objects, ObjectKind::Blob, b"cache me");

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    let (_, first) = odb.read_cached(&id).unwrap();
    let (_, second) = odb.read_cached(&id).unwrap();
    assert_eq!(&*first, b"cache me");
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn refresh_picks_up_new_packs() {
    let (_dir, objects) = empty_objects_dir();
    let odb = ObjectDatabase::open_at(&objects).unwrap();

    let entries = vec![plain(ObjectKind::Blob, b"arrived late")];
    let id = entries[0].id;
    put_pack(&objects, 9, &entries);

    assert!(matches!(odb.open(&id), Err(OdbError::NotFound(_))));
    odb.refresh().unwrap();
    assert_eq!(odb.read(&id).unwrap().1, b"arrived late");
}

#[test]
fn contains_checks_all_stores() {
    let (_dir, objects) = empty_objects_dir();
    let loose_id = put_loose(&objects, ObjectKind::Blob, b"loose");
    let entries = vec![plain(ObjectKind::Blob, b"packed")];
    let packed_id = entries[0].id;
    put_pack(&objects, 10, &entries);

    let odb = ObjectDatabase::open_at(&objects).unwrap();
    assert!(odb.contains(&loose_id));
    assert!(odb.contains(&packed_id));
    assert!(!odb.contains(&ObjectId::NULL));
}
