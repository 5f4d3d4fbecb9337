//! The loose object header: `"<kind> <size>\0"`.

use crate::{ObjectError, ObjectKind};

/// Parse an object header from the start of `data`.
///
/// Returns `(kind, declared_size, header_length)` where `header_length`
/// includes the NUL terminator, so `data[header_length..]` is the payload.
pub fn parse_header(data: &[u8]) -> Result<(ObjectKind, usize, usize), ObjectError> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ObjectError::InvalidHeader("missing NUL terminator".into()))?;

    let header = &data[..nul];
    let space = header
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ObjectError::InvalidHeader("missing space".into()))?;

    let kind = ObjectKind::from_bytes(&header[..space])?;

    let size_str = std::str::from_utf8(&header[space + 1..])
        .map_err(|_| ObjectError::InvalidHeader("non-ASCII size".into()))?;
    if size_str.is_empty() || !size_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ObjectError::InvalidHeader(format!(
            "invalid size: {size_str:?}"
        )));
    }
    let size: usize = size_str
        .parse()
        .map_err(|_| ObjectError::InvalidHeader(format!("size out of range: {size_str}")))?;

    Ok((kind, size, nul + 1))
}

/// Write an object header for the given kind and payload size.
pub fn write_header(kind: ObjectKind, size: usize) -> Vec<u8> {
    format!("{kind} {size}\0").into_bytes()
}
