extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use embedded_io::Read;
use log::warn;

use crate::fs::{File, Filesystem};

/// Maximum number of manifest entries kept in the table.
pub const MAX_ENTRIES: usize = 1000;
/// Per-line budget in the manifest, terminator included.
pub const MAX_NAME_BYTES: usize = 20;

/// Ordered list of asset filenames read from the manifest once at startup.
/// Immutable afterwards; the cursor indexes into this table.
pub struct Catalog {
    names: Vec<String>,
}

impl Catalog {
    pub const fn empty() -> Self {
        Self { names: Vec::new() }
    }

    /// Reads up to [`MAX_ENTRIES`] newline-delimited filenames from `path`.
    /// A missing or unreadable manifest leaves the catalog empty, which is a
    /// valid "nothing to show" state rather than an error.
    pub fn load<F: Filesystem>(fs: &mut F, path: &str) -> Self {
        let mut file = match fs.open_file(path) {
            Ok(file) => file,
            Err(_) => {
                warn!("cannot open manifest {}", path);
                return Self::empty();
            }
        };

        let mut raw = Vec::new();
        raw.resize(file.size(), 0);
        let mut filled = 0;
        while filled < raw.len() {
            match file.read(&mut raw[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(_) => {
                    warn!("manifest read failed after {} bytes", filled);
                    return Self::empty();
                }
            }
        }

        let mut names = Vec::new();
        for line in raw[..filled].split(|&b| b == b'\n') {
            let line = match line.split_last() {
                Some((b'\r', rest)) => rest,
                _ => line,
            };
            if line.is_empty() {
                continue;
            }
            if names.len() >= MAX_ENTRIES {
                warn!("manifest {} truncated at {} entries", path, MAX_ENTRIES);
                break;
            }
            let line = if line.len() > MAX_NAME_BYTES {
                warn!("manifest line exceeds {} bytes, clamped", MAX_NAME_BYTES);
                &line[..MAX_NAME_BYTES]
            } else {
                line
            };
            match core::str::from_utf8(line) {
                Ok(name) => names.push(String::from(name)),
                Err(_) => warn!("manifest line is not valid utf-8, skipped"),
            }
        }
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}
