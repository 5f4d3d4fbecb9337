use std::fmt;
use std::str::FromStr;

use crate::{hex, HashError};

/// Number of raw bytes in an object id.
pub const RAW_LEN: usize = 20;

/// An object identifier: the SHA-1 digest of an object's header and content.
///
/// Ordering is lexicographic on the raw bytes, which is the order pack
/// indexes sort their id tables in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; RAW_LEN]);

impl ObjectId {
    /// The null id (all zeros).
    pub const NULL: Self = Self([0u8; RAW_LEN]);

    /// Wrap a raw 20-byte digest.
    pub const fn from_raw(bytes: [u8; RAW_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an ObjectId from a byte slice, which must be exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; RAW_LEN] =
            bytes
                .try_into()
                .map_err(|_| HashError::InvalidDigestLength {
                    expected: RAW_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    /// Parse an ObjectId from 40 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let mut bytes = [0u8; RAW_LEN];
        hex::decode(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; RAW_LEN] {
        &self.0
    }

    /// The lowercase 40-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Whether this is the all-zeros id.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The first byte of the digest, used for fan-out indexing.
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// The loose-object path component: `"xx/<38 hex>"`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
