extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::image::ImageRawBE;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_io::{Read, Seek, SeekFrom};
use log::{error, warn};

use crate::fs::{File, Filesystem};

/// Capacity of the raw-file staging buffer.
pub const RAW_BUFFER_SIZE: usize = 200_000;
/// Largest raster the pixel buffer can hold.
pub const MAX_PIXELS: usize = 400 * 450;
/// Pixel buffer capacity in bytes, 2 bytes per RGB565 pixel.
pub const PIXEL_BUFFER_SIZE: usize = MAX_PIXELS * 2;
/// Row cap handed to the decoder per callback, so a single callback never
/// produces a large write on constrained hardware.
pub const MAX_DECODE_ROWS: u32 = 103;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// Asset file missing or unreadable.
    Open,
    /// Short read / size mismatch while staging the file.
    Read,
    /// Malformed or oversized bitstream, or decoder-reported failure.
    Decode,
}

/// Failure reported by the external decoder, including an aborted callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeFailed;

/// One span of decoded pixels, RGB565 big-endian, `width * height * 2` bytes.
pub struct Region<'a> {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

/// Receives decoder output. `begin` is called once with the parsed raster
/// dimensions before any pixels; returning `false` from either method aborts
/// the decode.
pub trait DecodeSink {
    fn begin(&mut self, width: u32, height: u32) -> bool;
    fn draw(&mut self, region: &Region<'_>) -> bool;
}

/// The external JPEG decoder. Implementations must emit spans no taller than
/// `max_rows` and never write outside the spans they report.
pub trait JpegDecoder {
    fn decode(
        &mut self,
        jpeg: &[u8],
        max_rows: u32,
        sink: &mut dyn DecodeSink,
    ) -> Result<(), DecodeFailed>;
}

/// Owns the two fixed memory regions for the lifetime of the engine: the raw
/// staging buffer and the decoded pixel buffer. One image, one load at a time.
pub struct ImageLoader<D: JpegDecoder> {
    decoder: D,
    raw: Vec<u8>,
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    valid: bool,
}

struct BufferSink<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
}

impl DecodeSink for BufferSink<'_> {
    fn begin(&mut self, width: u32, height: u32) -> bool {
        if width as usize * height as usize > MAX_PIXELS {
            error!("raster {}x{} exceeds pixel buffer", width, height);
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

    fn draw(&mut self, region: &Region<'_>) -> bool {
        if region.x >= self.width || region.y >= self.height {
            return true;
        }
        // Tiles at the right and bottom edges may be clipped.
        let cols = region.width.min(self.width - region.x) as usize;
        let rows = region.height.min(self.height - region.y) as usize;
        let src_stride = region.width as usize * 2;
        if region.pixels.len() < rows * src_stride {
            return false;
        }
        for row in 0..rows {
            let src = &region.pixels[row * src_stride..row * src_stride + cols * 2];
            let dst = ((region.y as usize + row) * self.width as usize + region.x as usize) * 2;
            self.pixels[dst..dst + cols * 2].copy_from_slice(src);
        }
        true
    }
}

impl<D: JpegDecoder> ImageLoader<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            raw: vec![0; RAW_BUFFER_SIZE],
            pixels: vec![0; PIXEL_BUFFER_SIZE],
            width: 0,
            height: 0,
            valid: false,
        }
    }

    /// Stages the file into the raw buffer and decodes it into the pixel
    /// buffer. Open and read failures leave the previously decoded frame
    /// intact; a decode failure invalidates it.
    pub fn load<F: Filesystem>(&mut self, fs: &mut F, path: &str) -> Result<(), LoadError> {
        let mut file = fs.open_file(path).map_err(|_| {
            error!("failed to open image file {}", path);
            LoadError::Open
        })?;

        let file_len = file.size();
        if file_len > RAW_BUFFER_SIZE {
            error!("{} is {} bytes, raw buffer holds {}", path, file_len, RAW_BUFFER_SIZE);
            return Err(LoadError::Decode);
        }
        file.seek(SeekFrom::Start(0)).map_err(|_| LoadError::Read)?;

        let mut filled = 0;
        while filled < file_len {
            match file.read(&mut self.raw[filled..file_len]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(_) => return Err(LoadError::Read),
            }
        }
        if filled != file_len {
            error!("short read on {}: {} of {} bytes", path, filled, file_len);
            return Err(LoadError::Read);
        }

        // The pixel buffer is overwritten from here; the previous frame must
        // not be shown again unless the decode completes.
        self.valid = false;
        let mut sink = BufferSink {
            pixels: &mut self.pixels,
            width: 0,
            height: 0,
        };
        self.decoder
            .decode(&self.raw[..file_len], MAX_DECODE_ROWS, &mut sink)
            .map_err(|_| {
                warn!("decode failed for {}", path);
                LoadError::Decode
            })?;
        self.width = sink.width;
        self.height = sink.height;
        self.valid = true;
        Ok(())
    }

    /// Decoded raster dimensions, only after a successful decode.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.valid.then_some((self.width, self.height))
    }

    /// The current frame as a drawable image. `None` until the first
    /// successful decode, or after a failed one.
    pub fn frame(&self) -> Option<ImageRawBE<'_, Rgb565>> {
        if !self.valid {
            return None;
        }
        let bytes = self.width as usize * self.height as usize * 2;
        Some(ImageRawBE::new(&self.pixels[..bytes], self.width))
    }
}
