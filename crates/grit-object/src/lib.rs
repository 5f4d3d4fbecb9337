//! Object kinds and the loose object header codec.
//!
//! Every object in the store is one of four kinds. A loose object file
//! carries a header of the form `"<kind> <size>\0"` in front of its
//! content; this crate parses and writes that header.

pub mod header;

use bstr::BString;

/// Errors produced by object parsing.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object kind: {0}")]
    InvalidKind(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: header declares {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// The four kinds of objects the store holds.
///
/// Offset and ref deltas are pack-internal encodings, not object kinds;
/// they are modeled by the pack reader and always resolve to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    /// Parse the kind word used in loose object headers.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"commit" => Ok(Self::Commit),
            b"tree" => Ok(Self::Tree),
            b"blob" => Ok(Self::Blob),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidKind(BString::from(s))),
        }
    }

    /// The canonical kind word.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }

    /// The canonical kind word as bytes.
    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}
