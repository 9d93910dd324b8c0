//! Instruction decoder for CHIP-8.
//!
//! Every instruction is a big-endian 16-bit word. The high nibble selects
//! one of 16 opcode families; families 0x0 and 0x8 are further split on the
//! low nibble, 0xE and 0xF on the low byte. Everything else is decided by
//! the high nibble alone, so `5XYN` and `9XYN` decode for any N.
//!
//! Decoding is therefore many-to-one in families 0x0, 0x5 and 0x9, and
//! [`encode`] produces the canonical word (`00E0`, `00EE`, `5XY0`, `9XY0`).

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Decoded CHIP-8 instruction.
///
/// `x` and `y` are register indices (0-F), `nn` an 8-bit immediate,
/// `n` a 4-bit immediate and `addr` a 12-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Display ====================

    /// 00E0: clear the display
    ClearScreen,

    /// DXYN: draw an 8xN sprite from memory[I] at (Vx, Vy)
    Draw { x: u8, y: u8, n: u8 },

    // ==================== Control Flow ====================

    /// 00EE: return from subroutine
    Return,

    /// 1NNN: PC := NNN
    Jump { addr: u16 },

    /// 2NNN: call subroutine at NNN
    Call { addr: u16 },

    /// BNNN: PC := NNN + V0
    JumpOffset { addr: u16 },

    /// 3XNN: skip next if Vx == NN
    SkipEqImm { x: u8, nn: u8 },

    /// 4XNN: skip next if Vx != NN
    SkipNeImm { x: u8, nn: u8 },

    /// 5XY0: skip next if Vx == Vy
    SkipEqReg { x: u8, y: u8 },

    /// 9XY0: skip next if Vx != Vy
    SkipNeReg { x: u8, y: u8 },

    // ==================== Registers ====================

    /// 6XNN: Vx := NN
    LoadImm { x: u8, nn: u8 },

    /// 7XNN: Vx := Vx + NN (no carry flag)
    AddImm { x: u8, nn: u8 },

    /// 8XY0: Vx := Vy
    Move { x: u8, y: u8 },

    /// 8XY1: Vx := Vx | Vy
    Or { x: u8, y: u8 },

    /// 8XY2: Vx := Vx & Vy
    And { x: u8, y: u8 },

    /// 8XY3: Vx := Vx ^ Vy
    Xor { x: u8, y: u8 },

    /// 8XY4: Vx := Vx + Vy, VF := carry
    AddReg { x: u8, y: u8 },

    /// 8XY5: Vx := Vx - Vy, VF := not borrow
    SubReg { x: u8, y: u8 },

    /// 8XY6: Vx := Vx >> 1, VF := shifted-out bit (Vy is ignored)
    ShiftRight { x: u8, y: u8 },

    /// 8XY7: Vx := Vy - Vx, VF := not borrow
    SubRev { x: u8, y: u8 },

    /// 8XYE: Vx := Vx << 1, VF := shifted-out bit (Vy is ignored)
    ShiftLeft { x: u8, y: u8 },

    /// CXNN: Vx := random & NN
    Random { x: u8, nn: u8 },

    // ==================== Index Register ====================

    /// ANNN: I := NNN
    LoadIndex { addr: u16 },

    /// FX1E: I := I + Vx, VF := I overflowed 0xFFF
    AddIndex { x: u8 },

    /// FX29: I := address of the glyph for digit Vx
    LoadGlyph { x: u8 },

    /// FX33: memory[I..I+3] := decimal digits of Vx
    StoreBcd { x: u8 },

    /// FX55: memory[I..=I+X] := V0..=Vx, then I := X + 1
    StoreRegisters { x: u8 },

    /// FX65: V0..=Vx := memory[I..=I+X], then I := X + 1
    LoadRegisters { x: u8 },

    // ==================== Keypad ====================

    /// EX9E: skip next if key Vx is down
    SkipKeyPressed { x: u8 },

    /// EXA1: skip next if key Vx is up
    SkipKeyReleased { x: u8 },

    /// FX0A: wait until a key is down, store it in Vx
    WaitKey { x: u8 },

    // ==================== Timers ====================

    /// FX07: Vx := delay timer
    LoadDelay { x: u8 },

    /// FX15: delay timer := Vx
    SetDelay { x: u8 },

    /// FX18: sound timer := Vx
    SetSound { x: u8 },
}

/// Decode a 16-bit instruction word.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let family = (word >> 12) as u8;
    let x = ((word >> 8) & 0xF) as u8;
    let y = ((word >> 4) & 0xF) as u8;
    let n = (word & 0xF) as u8;
    let nn = (word & 0xFF) as u8;
    let addr = word & 0x0FFF;

    let instruction = match (family, n) {
        (0x0, 0x0) => Instruction::ClearScreen,
        (0x0, 0xE) => Instruction::Return,
        (0x1, _) => Instruction::Jump { addr },
        (0x2, _) => Instruction::Call { addr },
        (0x3, _) => Instruction::SkipEqImm { x, nn },
        (0x4, _) => Instruction::SkipNeImm { x, nn },
        (0x5, _) => Instruction::SkipEqReg { x, y },
        (0x6, _) => Instruction::LoadImm { x, nn },
        (0x7, _) => Instruction::AddImm { x, nn },
        (0x8, 0x0) => Instruction::Move { x, y },
        (0x8, 0x1) => Instruction::Or { x, y },
        (0x8, 0x2) => Instruction::And { x, y },
        (0x8, 0x3) => Instruction::Xor { x, y },
        (0x8, 0x4) => Instruction::AddReg { x, y },
        (0x8, 0x5) => Instruction::SubReg { x, y },
        (0x8, 0x6) => Instruction::ShiftRight { x, y },
        (0x8, 0x7) => Instruction::SubRev { x, y },
        (0x8, 0xE) => Instruction::ShiftLeft { x, y },
        (0x9, _) => Instruction::SkipNeReg { x, y },
        (0xA, _) => Instruction::LoadIndex { addr },
        (0xB, _) => Instruction::JumpOffset { addr },
        (0xC, _) => Instruction::Random { x, nn },
        (0xD, _) => Instruction::Draw { x, y, n },
        (0xE, _) => match nn {
            0x9E => Instruction::SkipKeyPressed { x },
            0xA1 => Instruction::SkipKeyReleased { x },
            _ => return Err(DecodeError::UnknownOpcode(word)),
        },
        (0xF, _) => match nn {
            0x07 => Instruction::LoadDelay { x },
            0x0A => Instruction::WaitKey { x },
            0x15 => Instruction::SetDelay { x },
            0x18 => Instruction::SetSound { x },
            0x1E => Instruction::AddIndex { x },
            0x29 => Instruction::LoadGlyph { x },
            0x33 => Instruction::StoreBcd { x },
            0x55 => Instruction::StoreRegisters { x },
            0x65 => Instruction::LoadRegisters { x },
            _ => return Err(DecodeError::UnknownOpcode(word)),
        },
        _ => return Err(DecodeError::UnknownOpcode(word)),
    };

    Ok(instruction)
}

/// Encode an instruction back to its 16-bit word.
///
/// Out-of-range operands are masked to their field width.
pub fn encode(instr: &Instruction) -> u16 {
    fn xy(family: u16, x: u8, y: u8, n: u16) -> u16 {
        family << 12 | (x as u16 & 0xF) << 8 | (y as u16 & 0xF) << 4 | n
    }
    fn xnn(family: u16, x: u8, nn: u8) -> u16 {
        family << 12 | (x as u16 & 0xF) << 8 | nn as u16
    }
    fn nnn(family: u16, addr: u16) -> u16 {
        family << 12 | addr & 0x0FFF
    }

    match *instr {
        Instruction::ClearScreen => 0x00E0,
        Instruction::Return => 0x00EE,
        Instruction::Jump { addr } => nnn(0x1, addr),
        Instruction::Call { addr } => nnn(0x2, addr),
        Instruction::SkipEqImm { x, nn } => xnn(0x3, x, nn),
        Instruction::SkipNeImm { x, nn } => xnn(0x4, x, nn),
        Instruction::SkipEqReg { x, y } => xy(0x5, x, y, 0x0),
        Instruction::LoadImm { x, nn } => xnn(0x6, x, nn),
        Instruction::AddImm { x, nn } => xnn(0x7, x, nn),
        Instruction::Move { x, y } => xy(0x8, x, y, 0x0),
        Instruction::Or { x, y } => xy(0x8, x, y, 0x1),
        Instruction::And { x, y } => xy(0x8, x, y, 0x2),
        Instruction::Xor { x, y } => xy(0x8, x, y, 0x3),
        Instruction::AddReg { x, y } => xy(0x8, x, y, 0x4),
        Instruction::SubReg { x, y } => xy(0x8, x, y, 0x5),
        Instruction::ShiftRight { x, y } => xy(0x8, x, y, 0x6),
        Instruction::SubRev { x, y } => xy(0x8, x, y, 0x7),
        Instruction::ShiftLeft { x, y } => xy(0x8, x, y, 0xE),
        Instruction::SkipNeReg { x, y } => xy(0x9, x, y, 0x0),
        Instruction::LoadIndex { addr } => nnn(0xA, addr),
        Instruction::JumpOffset { addr } => nnn(0xB, addr),
        Instruction::Random { x, nn } => xnn(0xC, x, nn),
        Instruction::Draw { x, y, n } => xy(0xD, x, y, n as u16 & 0xF),
        Instruction::SkipKeyPressed { x } => xnn(0xE, x, 0x9E),
        Instruction::SkipKeyReleased { x } => xnn(0xE, x, 0xA1),
        Instruction::LoadDelay { x } => xnn(0xF, x, 0x07),
        Instruction::WaitKey { x } => xnn(0xF, x, 0x0A),
        Instruction::SetDelay { x } => xnn(0xF, x, 0x15),
        Instruction::SetSound { x } => xnn(0xF, x, 0x18),
        Instruction::AddIndex { x } => xnn(0xF, x, 0x1E),
        Instruction::LoadGlyph { x } => xnn(0xF, x, 0x29),
        Instruction::StoreBcd { x } => xnn(0xF, x, 0x33),
        Instruction::StoreRegisters { x } => xnn(0xF, x, 0x55),
        Instruction::LoadRegisters { x } => xnn(0xF, x, 0x65),
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_fields() {
        assert_eq!(decode(0x00E0).unwrap(), Instruction::ClearScreen);
        assert_eq!(decode(0x00EE).unwrap(), Instruction::Return);
        assert_eq!(decode(0x1ABC).unwrap(), Instruction::Jump { addr: 0xABC });
        assert_eq!(decode(0x3A42).unwrap(), Instruction::SkipEqImm { x: 0xA, nn: 0x42 });
        assert_eq!(decode(0x8124).unwrap(), Instruction::AddReg { x: 1, y: 2 });
        assert_eq!(decode(0x812E).unwrap(), Instruction::ShiftLeft { x: 1, y: 2 });
        assert_eq!(decode(0xD125).unwrap(), Instruction::Draw { x: 1, y: 2, n: 5 });
        assert_eq!(decode(0xE59E).unwrap(), Instruction::SkipKeyPressed { x: 5 });
        assert_eq!(decode(0xF30A).unwrap(), Instruction::WaitKey { x: 3 });
        assert_eq!(decode(0xFF65).unwrap(), Instruction::LoadRegisters { x: 0xF });
    }

    #[test]
    fn test_unknown_opcodes() {
        for word in [0x0123, 0x00E1, 0x00EF, 0x8128, 0x812F, 0xE1FF, 0xF1FF, 0xF100] {
            assert_eq!(decode(word), Err(DecodeError::UnknownOpcode(word)), "{:#06x}", word);
        }
    }

    #[test]
    fn test_non_canonical_words() {
        assert_eq!(decode(0x0000).unwrap(), Instruction::ClearScreen);
        assert_eq!(decode(0x00F0).unwrap(), Instruction::ClearScreen);
        assert_eq!(decode(0x012E).unwrap(), Instruction::Return);
        assert_eq!(decode(0x5121).unwrap(), Instruction::SkipEqReg { x: 1, y: 2 });
        assert_eq!(decode(0x912F).unwrap(), Instruction::SkipNeReg { x: 1, y: 2 });

        assert_eq!(encode(&decode(0x00F0).unwrap()), 0x00E0);
        assert_eq!(encode(&decode(0x5121).unwrap()), 0x5120);
    }

    proptest! {
        #[test]
        fn prop_encode_is_canonical(word in any::<u16>()) {
            // Re-encoding never changes the meaning, and outside the
            // many-to-one families it gives back the same bits.
            if let Ok(instr) = decode(word) {
                let canonical = encode(&instr);
                prop_assert_eq!(decode(canonical), Ok(instr));
                if !matches!(word >> 12, 0x0 | 0x5 | 0x9) {
                    prop_assert_eq!(canonical, word);
                }
            }
        }

        #[test]
        fn prop_unknown_reports_word(word in any::<u16>()) {
            if let Err(DecodeError::UnknownOpcode(reported)) = decode(word) {
                prop_assert_eq!(reported, word);
            }
        }
    }
}
