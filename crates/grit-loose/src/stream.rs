use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::ObjectId;
use grit_object::{header, ObjectKind};

use crate::read::inflate_header_prefix;
use crate::{LooseError, LooseStore};

/// An open loose object.
///
/// The header has been parsed; the handle holds the underlying file and the
/// inflate state, and [`Read`] yields the content bytes after the header,
/// clamped to the declared size. Dropping the handle closes the file.
pub struct LooseObject {
    kind: ObjectKind,
    size: usize,
    header_len: usize,
    decoder: ZlibDecoder<fs::File>,
    consumed: usize,
}

impl LooseObject {
    /// The object kind declared by the header.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The content size declared by the header.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Length of the inflated header, including the NUL.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Content bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.size - self.consumed
    }

    /// Inflate the rest of the content into a buffer.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf = Vec::with_capacity(self.remaining());
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for LooseObject {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(0);
        }
        let want = remaining.min(buf.len());
        let n = self.decoder.read(&mut buf[..want])?;
        if n == 0 && want > 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("loose object ends {remaining} bytes early"),
            ));
        }
        self.consumed += n;
        Ok(n)
    }
}

impl LooseStore {
    /// Open a loose object for streaming reads.
    ///
    /// Returns `Ok(None)` if no file exists for this id. The header is
    /// parsed eagerly; content is inflated on demand.
    pub fn open_object(&self, id: &ObjectId) -> Result<Option<LooseObject>, LooseError> {
        let path = self.object_path(id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        // First pass learns kind, size, and the header length.
        let mut decoder = ZlibDecoder::new(file);
        let prefix = inflate_header_prefix(&mut decoder, id)?;
        let (kind, size, header_len) = header::parse_header(&prefix)?;

        // Restart the stream and skip exactly the header so reads yield
        // content bytes only.
        let mut decoder = ZlibDecoder::new(fs::File::open(&path)?);
        let mut skip = vec![0u8; header_len];
        decoder
            .read_exact(&mut skip)
            .map_err(|e| LooseError::Decompress {
                id: id.to_hex(),
                source: e,
            })?;

        Ok(Some(LooseObject {
            kind,
            size,
            header_len,
            decoder,
            consumed: 0,
        }))
    }
}
