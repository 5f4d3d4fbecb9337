//! Streaming SHA-1 computation.

use digest::Digest;

use crate::ObjectId;

/// Streaming SHA-1 hasher producing an [`ObjectId`].
///
/// Data is fed incrementally with [`update`](Hasher::update) or through the
/// [`std::io::Write`] impl. Finalization consumes the hasher, so feeding
/// data after finalizing is unrepresentable.
pub struct Hasher {
    inner: sha1::Sha1,
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            inner: sha1::Sha1::new(),
        }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the digest as an [`ObjectId`].
    pub fn finalize(self) -> ObjectId {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        ObjectId::from_raw(bytes)
    }

    /// Hash a buffer in one call.
    pub fn digest(data: &[u8]) -> ObjectId {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }

    /// Compute the id of an object: SHA-1 of `"<kind> <len>\0<content>"`.
    pub fn object_id(kind_word: &str, content: &[u8]) -> ObjectId {
        let mut h = Self::new();
        h.update(kind_word.as_bytes());
        h.update(b" ");
        h.update(content.len().to_string().as_bytes());
        h.update(b"\0");
        h.update(content);
        h.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
