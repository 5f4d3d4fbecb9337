use std::fs;
use std::path::PathBuf;

use grit_hash::ObjectId;

use crate::{LooseError, LooseStore};

/// Iterator over the ids of all loose objects in a store.
///
/// Walks the two-hex-digit fan-out directories in sorted order and yields
/// each entry whose name completes a valid 40-character id. Files with
/// other names are skipped.
pub struct LooseIter {
    dirs: Vec<PathBuf>,
    dir_index: usize,
    current: Vec<String>,
    entry_index: usize,
    prefix: String,
}

impl LooseIter {
    fn new(objects_dir: &std::path::Path) -> Result<Self, LooseError> {
        let mut dirs = Vec::new();
        if objects_dir.is_dir() {
            for entry in fs::read_dir(objects_dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.len() == 2
                    && name.bytes().all(|b| b.is_ascii_hexdigit())
                    && entry.file_type()?.is_dir()
                {
                    dirs.push(entry.path());
                }
            }
        }
        dirs.sort();
        Ok(Self {
            dirs,
            dir_index: 0,
            current: Vec::new(),
            entry_index: 0,
            prefix: String::new(),
        })
    }

    fn advance_dir(&mut self) -> Result<bool, LooseError> {
        while self.dir_index < self.dirs.len() {
            let dir = &self.dirs[self.dir_index];
            self.dir_index += 1;
            self.prefix = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let mut names = Vec::new();
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            names.sort();

            if !names.is_empty() {
                self.current = names;
                self.entry_index = 0;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for LooseIter {
    type Item = Result<ObjectId, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.entry_index >= self.current.len() {
                match self.advance_dir() {
                    Ok(true) => continue,
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }
            let name = &self.current[self.entry_index];
            self.entry_index += 1;
            if name.len() != 38 {
                continue;
            }
            let hex = format!("{}{}", self.prefix, name.to_lowercase());
            if let Ok(id) = ObjectId::from_hex(&hex) {
                return Some(Ok(id));
            }
        }
    }
}

impl LooseStore {
    /// Iterate over all loose object ids, in id order.
    pub fn iter(&self) -> Result<LooseIter, LooseError> {
        LooseIter::new(self.objects_dir())
    }
}
