use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::ObjectId;
use grit_object::{header, ObjectKind};

use crate::{LooseError, LooseStore};

/// Upper bound on the inflated header prefix. Headers are `"<kind> <size>\0"`
/// and stay well under this even for absurd sizes.
const MAX_HEADER_BYTES: usize = 64;

impl LooseStore {
    /// Read a loose object in full.
    ///
    /// Returns `Ok(None)` if no file exists for this id, an error if the
    /// file exists but is corrupt.
    pub fn read(&self, id: &ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>, LooseError> {
        let path = self.object_path(id);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut inflated = Vec::new();
        decoder
            .read_to_end(&mut inflated)
            .map_err(|e| LooseError::Decompress {
                id: id.to_hex(),
                source: e,
            })?;

        let (kind, size, header_len) = header::parse_header(&inflated)?;
        let content = inflated.split_off(header_len);
        if content.len() != size {
            return Err(LooseError::Corrupt {
                id: id.to_hex(),
                reason: format!("header declares {size} bytes, payload has {}", content.len()),
            });
        }
        Ok(Some((kind, content)))
    }

    /// Read just the header (kind + declared size) without inflating the
    /// whole payload.
    ///
    /// Returns `Ok(None)` if no file exists for this id.
    pub fn read_header(&self, id: &ObjectId) -> Result<Option<(ObjectKind, usize)>, LooseError> {
        let path = self.object_path(id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let mut decoder = ZlibDecoder::new(file);
        let buf = inflate_header_prefix(&mut decoder, id)?;
        let (kind, size, _header_len) = header::parse_header(&buf)?;
        Ok(Some((kind, size)))
    }
}

/// Inflate until the header NUL appears, never more than [`MAX_HEADER_BYTES`].
pub(crate) fn inflate_header_prefix<R: Read>(
    decoder: &mut ZlibDecoder<R>,
    id: &ObjectId,
) -> Result<Vec<u8>, LooseError> {
    let mut buf = [0u8; MAX_HEADER_BYTES];
    let mut filled = 0;
    loop {
        if filled == buf.len() {
            return Err(LooseError::Corrupt {
                id: id.to_hex(),
                reason: format!("header exceeds {MAX_HEADER_BYTES} bytes"),
            });
        }
        let n = decoder
            .read(&mut buf[filled..])
            .map_err(|e| LooseError::Decompress {
                id: id.to_hex(),
                source: e,
            })?;
        if n == 0 {
            return Err(LooseError::Corrupt {
                id: id.to_hex(),
                reason: "stream ends before header NUL".into(),
            });
        }
        filled += n;
        if buf[..filled].contains(&0) {
            return Ok(buf[..filled].to_vec());
        }
    }
}
