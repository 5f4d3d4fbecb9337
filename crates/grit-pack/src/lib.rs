//! Packfile reading.
//!
//! A packfile stores many objects in one file, some as compressed literals
//! and some as deltas against other objects in the same or another pack.
//! The companion `.idx` file maps sorted object ids to byte offsets. This
//! crate reads both formats: index lookup, entry header decoding, delta
//! chain resolution (including cross-pack ref deltas), and delta
//! application. It never writes packs.

pub mod chain;
pub mod delta;
pub mod entry;
pub mod index;
pub mod pack;
pub mod verify;

use grit_hash::ObjectId;
use grit_object::ObjectKind;

/// Errors from pack and pack index operations.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    InvalidHeader(String),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid pack index: {0}")]
    InvalidIndex(String),

    #[error("pack index checksum mismatch: stored {stored}, computed {computed}")]
    IndexChecksumMismatch {
        stored: ObjectId,
        computed: ObjectId,
    },

    #[error("pack checksum mismatch: stored {stored}, computed {computed}")]
    PackChecksumMismatch {
        stored: ObjectId,
        computed: ObjectId,
    },

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error("unsupported pack entry kind {kind} at offset {offset}")]
    UnsupportedEntryKind { kind: u8, offset: u64 },

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta base not found: {0}")]
    MissingBase(ObjectId),

    #[error("delta chain too deep (>{max_depth} levels) at offset {offset}")]
    DeltaChainTooDeep { offset: u64, max_depth: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}

/// Kind of a packed entry as stored in its header.
///
/// The first four map straight to object kinds; the two delta kinds are
/// pack-internal encodings that resolve to a plain kind through their base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Commit,
    Tree,
    Blob,
    Tag,
    /// Delta whose base lives earlier in the same pack.
    OfsDelta { base_offset: u64 },
    /// Delta whose base is named by id and may live in any pack.
    RefDelta { base_id: ObjectId },
}

impl EntryKind {
    /// The object kind, for non-delta entries.
    pub fn object_kind(&self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::Tag => Some(ObjectKind::Tag),
            Self::OfsDelta { .. } | Self::RefDelta { .. } => None,
        }
    }

    /// Whether this entry is a delta.
    pub fn is_delta(&self) -> bool {
        matches!(self, Self::OfsDelta { .. } | Self::RefDelta { .. })
    }

    /// The kind number used in entry headers.
    pub fn kind_number(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
            Self::OfsDelta { .. } => 6,
            Self::RefDelta { .. } => 7,
        }
    }
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;

/// Pack index v2 constants.
pub const IDX_SIGNATURE: [u8; 4] = [0xff, 0x74, 0x4f, 0x63]; // "\xfftOc"
pub const IDX_VERSION: u32 = 2;

/// Packs whose file size exceeds this carry a 64-bit offset table.
pub const LARGE_OFFSET_THRESHOLD: u64 = 0x7fff_ffff;

/// Maximum delta chain depth before resolution bails out. Packs produced by
/// real repack runs stay under ~50 levels.
pub const MAX_DELTA_CHAIN_DEPTH: usize = 512;
