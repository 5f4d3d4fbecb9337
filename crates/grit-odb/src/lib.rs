//! The object opener: one front door over loose and packed storage.
//!
//! An [`ObjectDatabase`] is rooted at an `objects/` directory. Opening an
//! id probes loose storage first, then every pack index under
//! `objects/pack/` in directory order, first match wins. The result is a
//! two-stage handle: [`open`](ObjectDatabase::open) yields an [`Object`]
//! whose kind and size are already known; [`extract`](ObjectDatabase::extract)
//! materializes the bytes, applying delta chains base-outward.

mod cache;
mod search;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use grit_hash::ObjectId;
use grit_loose::{LooseError, LooseObject, LooseStore};
use grit_object::ObjectKind;
use grit_pack::chain::DeltaChain;
use grit_pack::pack::PackFile;
use grit_pack::PackError;

use cache::BytesCache;

/// Errors from object database operations.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error(transparent)]
    Loose(#[from] LooseError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A pack discovered in `objects/pack/`, opened on first use.
pub(crate) struct PackSlot {
    pub(crate) idx_path: PathBuf,
    pub(crate) pack: Option<Arc<PackFile>>,
}

/// An open object handle.
///
/// Kind and size are available without materializing; the handle owns its
/// file resources (the loose inflate stream, or shared maps of every pack
/// its delta chain touches) and releases them when dropped or extracted.
pub enum Object {
    Loose(LooseObject),
    Packed(PackedObject),
}

/// How a packed object's bytes are produced.
pub enum PackedPayload {
    /// A literal entry: zlib data at `data_offset`.
    Plain { data_offset: u64 },
    /// A delta entry with its resolved chain.
    Chain(DeltaChain),
}

/// An object stored in a pack.
pub struct PackedObject {
    pub(crate) pack: Arc<PackFile>,
    pub(crate) entry_offset: u64,
    pub(crate) kind: ObjectKind,
    pub(crate) size: u64,
    pub(crate) payload: PackedPayload,
}

impl PackedObject {
    /// Path of the pack holding the entry.
    pub fn pack_path(&self) -> &Path {
        self.pack.path()
    }

    /// Offset of the entry within its pack.
    pub fn entry_offset(&self) -> u64 {
        self.entry_offset
    }

    /// The resolved delta chain, for delta entries.
    pub fn chain(&self) -> Option<&DeltaChain> {
        match &self.payload {
            PackedPayload::Chain(chain) => Some(chain),
            PackedPayload::Plain { .. } => None,
        }
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loose(_) => write!(f, "Object::Loose"),
            Self::Packed(_) => write!(f, "Object::Packed"),
        }
    }
}

impl Object {
    /// The object kind. For packed deltas this is the chain's resolved kind.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Loose(obj) => obj.kind(),
            Self::Packed(obj) => obj.kind,
        }
    }

    /// The object's content size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Loose(obj) => obj.size() as u64,
            Self::Packed(obj) => obj.size,
        }
    }

    /// Whether the object came from a pack.
    pub fn is_packed(&self) -> bool {
        matches!(self, Self::Packed(_))
    }
}

/// Unified read access to an `objects/` directory.
pub struct ObjectDatabase {
    loose: LooseStore,
    packs: RwLock<Vec<PackSlot>>,
    cache: Mutex<BytesCache>,
    objects_dir: PathBuf,
}

impl ObjectDatabase {
    /// Default capacity of the extracted-bytes cache.
    const CACHE_CAPACITY: usize = 256;

    /// Open the database at an objects directory.
    ///
    /// Pack indexes are located now (directory-iteration order, which fixes
    /// the match order for ids stored in several packs) but opened lazily.
    pub fn open_at(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseStore::open(&objects_dir);
        let packs = search::discover_pack_slots(&objects_dir)?;

        Ok(Self {
            loose,
            packs: RwLock::new(packs),
            cache: Mutex::new(BytesCache::new(Self::CACHE_CAPACITY)),
            objects_dir,
        })
    }

    /// Open an object by id.
    ///
    /// Loose storage wins over packs; among packs the first index listing
    /// the id wins. Fails with [`OdbError::NotFound`] when no store has it.
    pub fn open(&self, id: &ObjectId) -> Result<Object, OdbError> {
        if let Some(loose) = self.loose.open_object(id)? {
            return Ok(Object::Loose(loose));
        }
        match search::open_packed(self, id)? {
            Some(packed) => Ok(Object::Packed(packed)),
            None => Err(OdbError::NotFound(*id)),
        }
    }

    /// Materialize an object's bytes, consuming the handle.
    pub fn extract(&self, object: Object) -> Result<Vec<u8>, OdbError> {
        match object {
            Object::Loose(obj) => Ok(obj.into_bytes()?),
            Object::Packed(obj) => {
                let data = match &obj.payload {
                    PackedPayload::Plain { data_offset } => {
                        obj.pack.inflate_at(*data_offset, obj.size)?
                    }
                    PackedPayload::Chain(chain) => chain.materialize()?,
                };
                Ok(data)
            }
        }
    }

    /// Open and extract in one call.
    pub fn read(&self, id: &ObjectId) -> Result<(ObjectKind, Vec<u8>), OdbError> {
        let object = self.open(id)?;
        let kind = object.kind();
        let data = self.extract(object)?;
        Ok((kind, data))
    }

    /// Like [`read`](Self::read), backed by a bounded LRU of extracted bytes.
    pub fn read_cached(&self, id: &ObjectId) -> Result<(ObjectKind, Arc<[u8]>), OdbError> {
        if let Some(hit) = self.cache.lock().unwrap().get(id) {
            return Ok(hit);
        }
        let (kind, data) = self.read(id)?;
        let data: Arc<[u8]> = data.into();
        self.cache
            .lock()
            .unwrap()
            .insert(*id, kind, Arc::clone(&data));
        Ok((kind, data))
    }

    /// Kind and size of an object, without materializing delta chains.
    pub fn read_header(&self, id: &ObjectId) -> Result<(ObjectKind, u64), OdbError> {
        let object = self.open(id)?;
        Ok((object.kind(), object.size()))
    }

    /// Whether any store holds the id. Index lookups only; packs that fail
    /// to open are treated as not holding it.
    pub fn contains(&self, id: &ObjectId) -> bool {
        if self.loose.contains(id) {
            return true;
        }
        search::any_pack_contains(self, id)
    }

    /// Re-scan `objects/pack/`, keeping already-open packs whose index
    /// files are still present.
    pub fn refresh(&self) -> Result<(), OdbError> {
        let fresh = search::discover_pack_slots(&self.objects_dir)?;
        let mut packs = self.packs.write().unwrap();
        let old: Vec<PackSlot> = std::mem::take(&mut *packs);
        *packs = fresh
            .into_iter()
            .map(|slot| {
                let reuse = old
                    .iter()
                    .find(|o| o.idx_path == slot.idx_path)
                    .and_then(|o| o.pack.clone());
                PackSlot {
                    idx_path: slot.idx_path,
                    pack: reuse,
                }
            })
            .collect();
        Ok(())
    }

    /// The loose half of the store.
    pub fn loose(&self) -> &LooseStore {
        &self.loose
    }

    /// The objects directory this database reads.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub(crate) fn packs(&self) -> &RwLock<Vec<PackSlot>> {
        &self.packs
    }
}
