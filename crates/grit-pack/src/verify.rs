//! Pack integrity verification.

use grit_hash::hasher::Hasher;
use grit_hash::ObjectId;
use grit_object::ObjectKind;

use crate::pack::PackFile;
use crate::PackError;

impl PackFile {
    /// Verify the pack trailer: SHA-1 over the whole file except the final
    /// 20 bytes must equal those bytes.
    pub fn verify_checksum(&self) -> Result<(), PackError> {
        let data = self.data();
        let body = &data[..data.len() - 20];
        let stored = ObjectId::from_bytes(&data[data.len() - 20..])
            .map_err(|_| PackError::InvalidHeader("short trailer".into()))?;

        let mut hasher = Hasher::new();
        hasher.update(body);
        let computed = hasher.finalize();

        if computed != stored {
            return Err(PackError::PackChecksumMismatch { stored, computed });
        }
        Ok(())
    }

    /// Verify the per-entry CRC32 column of the index.
    ///
    /// Each CRC covers the raw entry bytes, header through compressed
    /// payload, up to the next entry (or the trailer for the last one).
    pub fn verify_entry_crcs(&self) -> Result<(), PackError> {
        let index = self.index();
        let mut by_offset: Vec<(u32, u64)> = Vec::with_capacity(index.num_objects() as usize);
        for slot in 0..index.num_objects() {
            by_offset.push((slot, index.offset_at(slot)?));
        }
        by_offset.sort_by_key(|&(_, offset)| offset);

        let body_end = (self.data().len() - 20) as u64;
        for (i, &(slot, offset)) in by_offset.iter().enumerate() {
            let end = by_offset
                .get(i + 1)
                .map(|&(_, next)| next)
                .unwrap_or(body_end);
            if offset >= end || end > body_end {
                return Err(PackError::CorruptEntry(offset));
            }
            let raw = &self.data()[offset as usize..end as usize];
            let mut crc = crc32fast::Hasher::new();
            crc.update(raw);
            let computed = crc.finalize();
            let stored = index.crc32_at(slot);
            if computed != stored {
                return Err(PackError::InvalidIndex(format!(
                    "crc mismatch for entry at offset {offset}: stored {stored:#010x}, computed {computed:#010x}"
                )));
            }
        }
        Ok(())
    }

    /// Iterate over every object in the pack, in id order, resolving delta
    /// chains that stay within this pack.
    pub fn objects(&self) -> PackObjectIter<'_> {
        PackObjectIter {
            pack: self,
            slot: 0,
        }
    }
}

/// Iterator over fully materialized pack objects.
pub struct PackObjectIter<'a> {
    pack: &'a PackFile,
    slot: u32,
}

impl Iterator for PackObjectIter<'_> {
    type Item = Result<(ObjectId, ObjectKind, Vec<u8>), PackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot >= self.pack.num_objects() {
            return None;
        }
        let slot = self.slot;
        self.slot += 1;

        let id = self.pack.index().oid_at(slot);
        let item = self
            .pack
            .index()
            .offset_at(slot)
            .and_then(|offset| self.pack.read_at(offset))
            .map(|(kind, data)| (id, kind, data));
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.pack.num_objects() - self.slot) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PackObjectIter<'_> {}
