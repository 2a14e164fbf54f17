use crate::error::{ProbeError, ProbeResult};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// An immutable story file image. Loaded once, then only borrowed.
pub struct StoryFile {
    bytes: Vec<u8>,
}

impl StoryFile {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        StoryFile { bytes }
    }

    /// Read the whole file into memory
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let io_err = |source| ProbeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io_err)?;
        debug!("Loaded {} bytes from {}", bytes.len(), path.display());
        Ok(StoryFile::from_bytes(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Read a byte, yielding 0 past the end of the buffer
pub fn get_byte(mem: &[u8], addr: usize) -> u8 {
    mem.get(addr).copied().unwrap_or(0)
}

/// Read a big-endian word, yielding 0 for any byte past the end of the buffer
pub fn get_word(mem: &[u8], addr: usize) -> u16 {
    u16::from_be_bytes([get_byte(mem, addr), get_byte(mem, addr.saturating_add(1))])
}

/// Sequential reader over a borrowed buffer. Reads past the end yield 0 and
/// set `clamped`, so callers can tell a clamp from a genuine zero byte.
pub struct ClampedReader<'a> {
    mem: &'a [u8],
    pub offset: usize,
    pub clamped: bool,
}

impl<'a> ClampedReader<'a> {
    pub fn new(mem: &'a [u8], offset: usize) -> Self {
        ClampedReader {
            mem,
            offset,
            clamped: false,
        }
    }

    pub fn read_u8(&mut self) -> u8 {
        let value = match self.mem.get(self.offset) {
            Some(b) => *b,
            None => {
                self.clamped = true;
                0
            }
        };
        self.offset += 1;
        value
    }

    pub fn read_u16(&mut self) -> u16 {
        let high = self.read_u8() as u16;
        let low = self.read_u8() as u16;
        (high << 8) | low
    }
}
