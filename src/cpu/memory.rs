//! CHIP-8 memory subsystem.
//!
//! Memory is a flat byte array. The low 512 bytes belong to the
//! interpreter and hold the hexadecimal font; programs are loaded at 0x200.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Address programs are loaded at (and where the PC starts).
pub const PROGRAM_START: usize = 0x200;

/// Address of the first font glyph.
pub const FONT_START: usize = 0x000;

/// Bytes per font glyph.
pub const GLYPH_SIZE: usize = 5;

/// Sixteen 4x5 glyphs for the hexadecimal digits 0-F.
pub const FONT: [u8; 16 * GLYPH_SIZE] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// CHIP-8 RAM with a configurable capacity.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create zeroed memory of `capacity` bytes with the font installed.
    ///
    /// The capacity is expected to come from a validated
    /// [`MachineConfig`](crate::MachineConfig), so it always fits the font.
    pub fn new(capacity: usize) -> Self {
        let mut mem = Self {
            cells: vec![0; capacity.max(PROGRAM_START)],
        };
        mem.install_font();
        mem
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Read one byte.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange { addr, capacity: self.capacity() })
    }

    /// Write one byte.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), MemoryError> {
        let capacity = self.capacity();
        let cell = self
            .cells
            .get_mut(addr)
            .ok_or(MemoryError::AddressOutOfRange { addr, capacity })?;
        *cell = value;
        Ok(())
    }

    /// Read a big-endian 16-bit word at `addr`.
    pub fn read_word(&self, addr: usize) -> Result<u16, MemoryError> {
        let bytes = self.read_range(addr, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Borrow `len` bytes starting at `addr`.
    ///
    /// The whole range is checked up front; on error nothing is returned.
    pub fn read_range(&self, addr: usize, len: usize) -> Result<&[u8], MemoryError> {
        let end = self.checked_end(addr, len)?;
        Ok(&self.cells[addr..end])
    }

    /// Copy `data` into memory starting at `addr`.
    ///
    /// Either every byte is written or, if the range does not fit, none is.
    pub fn write_range(&mut self, addr: usize, data: &[u8]) -> Result<(), MemoryError> {
        let end = self.checked_end(addr, data.len())?;
        self.cells[addr..end].copy_from_slice(data);
        Ok(())
    }

    /// Load a program at 0x200.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        let available = self.capacity().saturating_sub(PROGRAM_START);
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        self.cells[PROGRAM_START..PROGRAM_START + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Zero all memory and reinstall the font.
    pub fn clear(&mut self) {
        self.cells.fill(0);
        self.install_font();
    }

    fn install_font(&mut self) {
        self.cells[FONT_START..FONT_START + FONT.len()].copy_from_slice(&FONT);
    }

    fn checked_end(&self, addr: usize, len: usize) -> Result<usize, MemoryError> {
        let capacity = self.capacity();
        match addr.checked_add(len) {
            Some(end) if end <= capacity => Ok(end),
            // Report the first byte that falls outside memory.
            _ => Err(MemoryError::AddressOutOfRange {
                addr: addr.max(capacity),
                capacity,
            }),
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RAM_SIZE)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let program_bytes = self.cells[PROGRAM_START..]
            .iter()
            .filter(|&&b| b != 0)
            .count();

        f.debug_struct("Memory")
            .field("capacity", &self.capacity())
            .field("non_zero_program_bytes", &program_bytes)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory address {addr:#05x} out of range (capacity {capacity} bytes)")]
    AddressOutOfRange { addr: usize, capacity: usize },

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_installed() {
        let mem = Memory::new(4096);
        assert_eq!(mem.read_range(0, 0x50).unwrap(), &FONT[..]);
        assert_eq!(mem.read(0x50).unwrap(), 0);
    }

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new(4096);
        mem.write(0x300, 42).unwrap();
        assert_eq!(mem.read(0x300).unwrap(), 42);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new(1024);

        assert!(mem.read(1023).is_ok());
        assert_eq!(
            mem.read(1024),
            Err(MemoryError::AddressOutOfRange { addr: 1024, capacity: 1024 })
        );
        assert!(mem.write(5000, 1).is_err());
    }

    #[test]
    fn test_read_word_big_endian() {
        let mut mem = Memory::new(4096);
        mem.write_range(0x200, &[0x12, 0x34]).unwrap();
        assert_eq!(mem.read_word(0x200).unwrap(), 0x1234);
        assert!(mem.read_word(4095).is_err());
    }

    #[test]
    fn test_write_range_is_all_or_nothing() {
        let mut mem = Memory::new(1024);
        assert!(mem.write_range(1022, &[1, 2, 3]).is_err());
        assert_eq!(mem.read(1022).unwrap(), 0);
        assert_eq!(mem.read(1023).unwrap(), 0);
    }

    #[test]
    fn test_load_program_limits() {
        let mut mem = Memory::new(4096);

        let exact = vec![0xAB; 4096 - 512];
        assert!(mem.load_program(&exact).is_ok());
        assert_eq!(mem.read(0x200).unwrap(), 0xAB);
        assert_eq!(mem.read(4095).unwrap(), 0xAB);

        let too_big = vec![0; 4096 - 511];
        assert_eq!(
            mem.load_program(&too_big),
            Err(MemoryError::ProgramTooLarge { size: 3585, available: 3584 })
        );
    }

    #[test]
    fn test_clear_keeps_font() {
        let mut mem = Memory::new(4096);
        mem.write(0x400, 7).unwrap();
        mem.clear();
        assert_eq!(mem.read(0x400).unwrap(), 0);
        assert_eq!(mem.read(0).unwrap(), FONT[0]);
    }
}
