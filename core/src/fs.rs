use core::result::Result;

use embedded_io::{ErrorType, Read, Seek};

/// Read-only view of the mounted removable storage. Mounting itself is
/// platform bring-up and happens before the engine is constructed.
pub trait Filesystem: ErrorType {
    type File<'a>: File
    where
        Self: 'a;

    fn open_file(&mut self, path: &str) -> Result<Self::File<'_>, Self::Error>;
}

pub trait File: Read + Seek {
    fn size(&self) -> usize;
}
