//! In-memory collaborators for host tests.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use embedded_io::{ErrorKind, ErrorType, Read, Seek, SeekFrom};

use crate::fs::{File, Filesystem};
use crate::image_loader::{DecodeFailed, DecodeSink, JpegDecoder, Region};
use crate::store::{KvStore, StoreError};

#[derive(Debug)]
pub struct MemFsError;

impl embedded_io::Error for MemFsError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

struct MemEntry {
    data: Vec<u8>,
    // size() may claim more than is actually readable, to provoke short reads
    claimed: usize,
}

/// Map-backed read-only filesystem.
pub struct MemFs {
    files: BTreeMap<String, MemEntry>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, path: &str, data: Vec<u8>) {
        let claimed = data.len();
        self.files.insert(String::from(path), MemEntry { data, claimed });
    }

    pub fn insert_truncated(&mut self, path: &str, data: Vec<u8>, claimed: usize) {
        self.files.insert(String::from(path), MemEntry { data, claimed });
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }
}

impl ErrorType for MemFs {
    type Error = MemFsError;
}

impl Filesystem for MemFs {
    type File<'a> = MemFile<'a>;

    fn open_file(&mut self, path: &str) -> Result<MemFile<'_>, MemFsError> {
        let entry = self.files.get(path).ok_or(MemFsError)?;
        Ok(MemFile {
            data: &entry.data,
            claimed: entry.claimed,
            pos: 0,
        })
    }
}

pub struct MemFile<'a> {
    data: &'a [u8],
    claimed: usize,
    pos: usize,
}

impl ErrorType for MemFile<'_> {
    type Error = MemFsError;
}

impl Read for MemFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MemFsError> {
        let n = buf.len().min(self.data.len().saturating_sub(self.pos));
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for MemFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MemFsError> {
        let len = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if target < 0 {
            return Err(MemFsError);
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }
}

impl File for MemFile<'_> {
    fn size(&self) -> usize {
        self.claimed
    }
}

/// Shared-state key-value store; clones see the same map, so a clone held
/// aside acts like the flash chip across a simulated restart.
#[derive(Clone)]
pub struct MemKv {
    map: Rc<RefCell<BTreeMap<String, i32>>>,
    fail_writes: bool,
}

impl MemKv {
    pub fn new() -> Self {
        Self {
            map: Rc::new(RefCell::new(BTreeMap::new())),
            fail_writes: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }
}

impl KvStore for MemKv {
    fn get_i32(&mut self, key: &str) -> Option<i32> {
        self.map.borrow().get(key).copied()
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError);
        }
        self.map.borrow_mut().insert(String::from(key), value);
        Ok(())
    }
}

/// Fake bitstream understood by [`StripDecoder`]: `IMG` magic followed by
/// width and height as little-endian u16.
pub fn encode_header(width: u16, height: u16) -> Vec<u8> {
    let mut data = Vec::with_capacity(7);
    data.extend_from_slice(b"IMG");
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data
}

/// Deterministic gradient so tests can check where the adapter put a pixel.
pub fn test_pixel(x: u32, y: u32, width: u32) -> u16 {
    (y * width + x) as u16
}

/// Decoder that synthesizes the gradient raster described by the fake
/// header, honoring the row cap like the real MCU decoder does.
pub struct StripDecoder;

impl JpegDecoder for StripDecoder {
    fn decode(
        &mut self,
        jpeg: &[u8],
        max_rows: u32,
        sink: &mut dyn DecodeSink,
    ) -> Result<(), DecodeFailed> {
        if jpeg.len() < 7 || &jpeg[..3] != b"IMG" {
            return Err(DecodeFailed);
        }
        let width = u16::from_le_bytes([jpeg[3], jpeg[4]]) as u32;
        let height = u16::from_le_bytes([jpeg[5], jpeg[6]]) as u32;
        if !sink.begin(width, height) {
            return Err(DecodeFailed);
        }
        let mut strip = Vec::new();
        let mut y = 0;
        while y < height {
            let rows = max_rows.min(height - y);
            strip.clear();
            for row in 0..rows {
                for x in 0..width {
                    strip.extend_from_slice(&test_pixel(x, y + row, width).to_be_bytes());
                }
            }
            let region = Region {
                x: 0,
                y,
                width,
                height: rows,
                pixels: &strip,
            };
            if !sink.draw(&region) {
                return Err(DecodeFailed);
            }
            y += rows;
        }
        Ok(())
    }
}
