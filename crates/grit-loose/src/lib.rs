//! Loose object storage.
//!
//! Each loose object lives at `objects/XX/YYYY...` where `XX` is the first
//! byte of the id in hex and `YYYY...` is the remaining 38 characters. The
//! file content is zlib-compressed `"<kind> <size>\0<content>"`.
//!
//! This store is read-only; new objects are written by other tools.

mod enumerate;
mod read;
mod stream;

pub use enumerate::LooseIter;
pub use stream::LooseObject;

use std::path::{Path, PathBuf};

use grit_hash::ObjectId;

/// Interface to the loose half of an `objects/` directory.
pub struct LooseStore {
    objects_dir: PathBuf,
}

impl LooseStore {
    /// Open the loose store rooted at the given objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
        }
    }

    /// The file path a given id would occupy.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.objects_dir.join(id.loose_path())
    }

    /// Whether a loose object exists for this id.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// The objects directory this store reads from.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}

/// Errors from loose object reads.
#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("corrupt loose object {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("decompression error for {id}: {source}")]
    Decompress {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("object parse error: {0}")]
    Object(#[from] grit_object::ObjectError),
}
