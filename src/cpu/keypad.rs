//! Hexadecimal keypad latch.
//!
//! Sixteen independent key states. The host sets them; the interpreter
//! only reads them.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of keys on the keypad.
pub const KEY_COUNT: usize = 16;

/// The 16-key input latch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    keys: [bool; KEY_COUNT],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of key `index` (0-F).
    pub fn set_key(&mut self, index: u8, pressed: bool) -> Result<(), KeypadError> {
        let key = self
            .keys
            .get_mut(index as usize)
            .ok_or(KeypadError::InvalidKey(index))?;
        *key = pressed;
        Ok(())
    }

    /// State of key `index`, `None` if there is no such key.
    pub fn is_pressed(&self, index: u8) -> Option<bool> {
        self.keys.get(index as usize).copied()
    }

    /// The highest-numbered key that is currently down.
    pub fn highest_pressed(&self) -> Option<u8> {
        self.keys.iter().rposition(|&k| k).map(|i| i as u8)
    }

    pub fn release_all(&mut self) {
        self.keys = [false; KEY_COUNT];
    }
}

/// Errors raised by keypad access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeypadError {
    #[error("no key {0:#x} on the keypad (valid keys are 0x0-0xF)")]
    InvalidKey(u8),
}
