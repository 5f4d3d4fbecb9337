//! The 256-entry fan-out table used by pack indexes.

use crate::{HashError, ObjectId};

/// Serialized size of a fan-out table: 256 big-endian u32 values.
pub const FANOUT_BYTES: usize = 256 * 4;

/// Cumulative counts indexed by the first byte of an object id.
///
/// `table[i]` is the number of ids whose first byte is ≤ `i`; `table[255]`
/// is the total object count. The table narrows a binary search over the
/// sorted id column to a single bucket.
#[derive(Debug, Clone)]
pub struct FanoutTable {
    table: [u32; 256],
}

impl FanoutTable {
    /// Build a fan-out table from a sorted slice of ids.
    ///
    /// The ids must already be sorted; this does not verify order.
    pub fn build(ids: &[ObjectId]) -> Self {
        let mut table = [0u32; 256];
        for id in ids {
            table[id.first_byte() as usize] += 1;
        }
        for i in 1..256 {
            table[i] += table[i - 1];
        }
        Self { table }
    }

    /// Decode from the binary index form, validating monotonicity.
    pub fn from_bytes(data: &[u8]) -> Result<Self, HashError> {
        if data.len() < FANOUT_BYTES {
            return Err(HashError::TruncatedFanout {
                expected: FANOUT_BYTES,
                actual: data.len(),
            });
        }
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let off = i * 4;
            *entry = u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);
        }
        for i in 1..256 {
            if table[i] < table[i - 1] {
                return Err(HashError::NonMonotonicFanout {
                    bucket: i,
                    previous: table[i - 1],
                    current: table[i],
                });
            }
        }
        Ok(Self { table })
    }

    /// Slot range of ids whose first byte equals `first_byte`.
    pub fn range(&self, first_byte: u8) -> std::ops::Range<usize> {
        let end = self.table[first_byte as usize] as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.table[(first_byte - 1) as usize] as usize
        };
        start..end
    }

    /// Total number of ids covered by the table.
    pub fn total(&self) -> u32 {
        self.table[255]
    }

    /// Raw cumulative count for a bucket.
    pub fn get(&self, bucket: u8) -> u32 {
        self.table[bucket as usize]
    }
}
