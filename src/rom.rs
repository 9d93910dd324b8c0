//! ROM files.
//!
//! A CHIP-8 ROM is a raw sequence of big-endian instruction words with no
//! header. It is loaded verbatim at 0x200.

use std::path::Path;
use thiserror::Error;

/// A program read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    /// Display name, taken from the file stem.
    pub name: String,
    /// Program bytes.
    pub bytes: Vec<u8>,
}

impl Rom {
    /// Wrap bytes that did not come from a file.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, RomError> {
        if bytes.is_empty() {
            return Err(RomError::Empty);
        }
        Ok(Self { name: name.into(), bytes })
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of whole instruction words.
    pub fn word_count(&self) -> usize {
        self.bytes.len() / 2
    }
}

/// Load a ROM file from disk.
pub fn load_rom<P: AsRef<Path>>(path: P) -> Result<Rom, RomError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rom".to_string());

    Rom::from_bytes(name, bytes)
}

/// Errors that can occur while loading a ROM.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ROM file is empty")]
    Empty,
}
