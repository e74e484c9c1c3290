use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read as _, Seek as _, SeekFrom as StdSeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use embedded_io::{ErrorKind, ErrorType, Read, Seek, SeekFrom};
use log::{error, warn};

use frame_core::fs::{File, Filesystem};
use frame_core::image_loader::{DecodeFailed, DecodeSink, JpegDecoder, Region};
use frame_core::power::{IrqFlags, IrqQueue, IrqToken, PowerChip, PowerError};
use frame_core::store::{KvStore, StoreError};

/// GPIO the simulated power chip "wires" its interrupt line to.
const PMU_IRQ_GPIO: u8 = 21;

#[derive(Debug)]
pub struct DirFsError(std::io::ErrorKind);

impl embedded_io::Error for DirFsError {
    fn kind(&self) -> ErrorKind {
        match self.0 {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Other,
        }
    }
}

/// The asset root directory standing in for the mounted SD card.
pub struct DirFilesystem {
    root: PathBuf,
}

impl DirFilesystem {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ErrorType for DirFilesystem {
    type Error = DirFsError;
}

impl Filesystem for DirFilesystem {
    type File<'a> = StdFile;

    fn open_file(&mut self, path: &str) -> Result<StdFile, DirFsError> {
        let full = self.root.join(path);
        let file = fs::File::open(&full).map_err(|e| DirFsError(e.kind()))?;
        let size = file
            .metadata()
            .map_err(|e| DirFsError(e.kind()))?
            .len() as usize;
        Ok(StdFile { file, size })
    }
}

pub struct StdFile {
    file: fs::File,
    size: usize,
}

impl ErrorType for StdFile {
    type Error = DirFsError;
}

impl Read for StdFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DirFsError> {
        self.file.read(buf).map_err(|e| DirFsError(e.kind()))
    }
}

impl Seek for StdFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, DirFsError> {
        let std_pos = match pos {
            SeekFrom::Start(offset) => StdSeekFrom::Start(offset),
            SeekFrom::End(offset) => StdSeekFrom::End(offset),
            SeekFrom::Current(offset) => StdSeekFrom::Current(offset),
        };
        self.file.seek(std_pos).map_err(|e| DirFsError(e.kind()))
    }
}

impl File for StdFile {
    fn size(&self) -> usize {
        self.size
    }
}

/// `key=value` file standing in for the NVS namespace. Every set commits.
pub struct FileKv {
    path: PathBuf,
    values: BTreeMap<String, i32>,
}

impl FileKv {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut values = BTreeMap::new();
        if let Ok(text) = fs::read_to_string(&path) {
            for line in text.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    if let Ok(value) = value.trim().parse() {
                        values.insert(key.trim().to_string(), value);
                    }
                }
            }
        }
        Self { path, values }
    }

    fn commit(&self) -> std::io::Result<()> {
        let mut text = String::new();
        for (key, value) in &self.values {
            text.push_str(&format!("{}={}\n", key, value));
        }
        fs::write(&self.path, text)
    }
}

impl KvStore for FileKv {
    fn get_i32(&mut self, key: &str) -> Option<i32> {
        self.values.get(key).copied()
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        self.commit().map_err(|e| {
            error!("nvs commit failed: {}", e);
            StoreError
        })
    }
}

/// Decodes with the `image` crate and replays the raster through the
/// row-callback contract in strips, the way the MCU decoder delivers MCU
/// bands.
pub struct ImageCrateDecoder;

impl JpegDecoder for ImageCrateDecoder {
    fn decode(
        &mut self,
        jpeg: &[u8],
        max_rows: u32,
        sink: &mut dyn DecodeSink,
    ) -> Result<(), DecodeFailed> {
        let rgb = image::load_from_memory(jpeg)
            .map_err(|e| {
                warn!("image decode failed: {}", e);
                DecodeFailed
            })?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
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
                    let p = rgb.get_pixel(x, y + row);
                    let rgb565 = ((p[0] as u16 & 0xF8) << 8)
                        | ((p[1] as u16 & 0xFC) << 3)
                        | (p[2] as u16 >> 3);
                    strip.extend_from_slice(&rgb565.to_be_bytes());
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

struct PmuState {
    percent: f32,
    charging: bool,
    pending: u16,
}

/// Simulated AXP-style power chip. State changes latch condition bits and
/// raise the "interrupt line" by parking a token on the shared queue.
pub struct SimPmu {
    state: Rc<RefCell<PmuState>>,
}

/// Handle the event loop keeps to poke the chip from the keyboard.
#[derive(Clone)]
pub struct PmuControl {
    state: Rc<RefCell<PmuState>>,
}

impl SimPmu {
    pub fn new() -> (Self, PmuControl) {
        let state = Rc::new(RefCell::new(PmuState {
            percent: 87.0,
            charging: false,
            pending: 0,
        }));
        (
            Self {
                state: Rc::clone(&state),
            },
            PmuControl { state },
        )
    }
}

impl PmuControl {
    pub fn toggle_charging(&self, queue: &IrqQueue) {
        let mut state = self.state.borrow_mut();
        state.charging = !state.charging;
        state.pending |= if state.charging {
            IrqFlags::VBUS_INSERT | IrqFlags::CHG_START
        } else {
            IrqFlags::VBUS_REMOVE | IrqFlags::CHG_DONE
        };
        queue.push_from_isr(IrqToken(PMU_IRQ_GPIO));
    }
}

impl PowerChip for SimPmu {
    fn read_irq_status(&mut self) -> Result<IrqFlags, PowerError> {
        let mut state = self.state.borrow_mut();
        let flags = IrqFlags(state.pending);
        state.pending = 0;
        Ok(flags)
    }

    fn battery_percent(&mut self) -> Result<u8, PowerError> {
        let mut state = self.state.borrow_mut();
        if state.charging {
            state.percent = (state.percent + 0.4).min(100.0);
        } else {
            state.percent = (state.percent - 0.05).max(3.0);
        }
        Ok(state.percent as u8)
    }

    fn is_charging(&mut self) -> Result<bool, PowerError> {
        Ok(self.state.borrow().charging)
    }
}
