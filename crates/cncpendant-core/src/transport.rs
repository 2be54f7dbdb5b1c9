//! Byte transport and program source abstractions
//!
//! The core never owns the lifecycle of a serial port or a storage device;
//! it only polls these interfaces. All reads are non-blocking: callers
//! check `available()` before consuming.

use crate::error::{Error, JobError, Result, TransportError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Polled byte stream to the motion controller
pub trait ByteTransport: Send {
    /// Number of bytes that can be read without blocking
    fn available(&mut self) -> std::result::Result<usize, TransportError>;

    /// Read one byte, `None` if nothing is buffered
    fn read_byte(&mut self) -> std::result::Result<Option<u8>, TransportError>;

    /// Write all bytes
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), TransportError>;

    /// Change the line speed
    fn set_baud(&mut self, rate: u32) -> std::result::Result<(), TransportError>;

    /// Discard everything currently buffered for reading
    fn drain_input(&mut self) -> std::result::Result<usize, TransportError> {
        let mut drained = 0;
        while self.read_byte()?.is_some() {
            drained += 1;
        }
        Ok(drained)
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn available(&mut self) -> std::result::Result<usize, TransportError> {
        (**self).available()
    }

    fn read_byte(&mut self) -> std::result::Result<Option<u8>, TransportError> {
        (**self).read_byte()
    }

    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn set_baud(&mut self, rate: u32) -> std::result::Result<(), TransportError> {
        (**self).set_baud(rate)
    }

    fn drain_input(&mut self) -> std::result::Result<usize, TransportError> {
        (**self).drain_input()
    }
}

/// Sequential program source (a G-code file on some storage)
pub trait ProgramSource: Send {
    /// Read the next byte, `None` at end of file
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Bytes left to read
    fn available(&self) -> u64;

    /// Total size in bytes
    fn size(&self) -> u64;

    /// Display name of the program
    fn name(&self) -> String;

    /// Release the underlying handle
    fn close(&mut self);
}

/// Program source backed by a file on disk
pub struct FileSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    size: u64,
    pos: u64,
}

impl FileSource {
    /// Open a program file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_failed = |e: std::io::Error| {
            Error::from(JobError::OpenFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        };
        let file = File::open(path).map_err(open_failed)?;
        let size = file.metadata().map_err(open_failed)?.len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(BufReader::new(file)),
            size,
            pos: 0,
        })
    }

    /// Path of the program file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgramSource for FileSource {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut byte = [0u8; 1];
        match reader.read(&mut byte)? {
            0 => Ok(None),
            _ => {
                self.pos += 1;
                Ok(Some(byte[0]))
            }
        }
    }

    fn available(&self) -> u64 {
        if self.reader.is_none() {
            return 0;
        }
        self.size.saturating_sub(self.pos)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Program source over an in-memory buffer
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
    pos: usize,
    closed: bool,
}

impl MemorySource {
    /// Create a source serving `data`
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            pos: 0,
            closed: false,
        }
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ProgramSource for MemorySource {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.closed {
            return Ok(None);
        }
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn available(&self) -> u64 {
        if self.closed {
            return 0;
        }
        (self.data.len() - self.pos) as u64
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
