//! CHIP-8 register file.
//!
//! - V0..VF: sixteen 8-bit general purpose registers (VF doubles as the flag)
//! - I: 16-bit index register, used as a 12-bit address
//! - PC: 16-bit program counter
//! - a bounded stack of return addresses plus its stack pointer

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Index of the flag register VF.
pub const VF: usize = 0xF;

/// The CHIP-8 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// V0..VF general purpose registers.
    pub v: [u8; 16],

    /// I: index register.
    pub i: u16,

    /// PC: program counter.
    pub pc: u16,

    stack: Vec<u16>,
    sp: usize,
}

impl Registers {
    /// Create a register file with a stack of `stack_depth` entries.
    pub fn new(stack_depth: usize) -> Self {
        Self {
            v: [0; 16],
            i: 0,
            pc: crate::cpu::memory::PROGRAM_START as u16,
            stack: vec![0; stack_depth],
            sp: 0,
        }
    }

    /// Reset to the power-on state, keeping the stack depth.
    pub fn reset(&mut self) {
        self.v = [0; 16];
        self.i = 0;
        self.pc = crate::cpu::memory::PROGRAM_START as u16;
        self.stack.fill(0);
        self.sp = 0;
    }

    /// Read register Vx.
    #[inline]
    pub fn get(&self, x: u8) -> u8 {
        self.v[x as usize & 0xF]
    }

    /// Write register Vx.
    #[inline]
    pub fn set(&mut self, x: u8, value: u8) {
        self.v[x as usize & 0xF] = value;
    }

    /// Write the flag register VF.
    #[inline]
    pub fn set_flag(&mut self, flag: bool) {
        self.v[VF] = flag as u8;
    }

    /// Advance the PC past the current instruction.
    #[inline]
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    /// Advance the PC by 4 if `condition` holds, by 2 otherwise.
    #[inline]
    pub fn skip_if(&mut self, condition: bool) {
        let step = if condition { 4 } else { 2 };
        self.pc = self.pc.wrapping_add(step);
    }

    /// Push a return address.
    pub fn push(&mut self, addr: u16) -> Result<(), StackError> {
        let depth = self.stack.len();
        let slot = self
            .stack
            .get_mut(self.sp)
            .ok_or(StackError::Overflow { depth })?;
        *slot = addr;
        self.sp += 1;
        Ok(())
    }

    /// Pop the most recent return address.
    pub fn pop(&mut self) -> Result<u16, StackError> {
        if self.sp == 0 {
            return Err(StackError::Underflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    /// Current stack pointer (number of live return addresses).
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Maximum number of return addresses.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// The live part of the stack, oldest entry first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp]
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_STACK_DEPTH)
    }
}

/// Errors raised by stack operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack overflow (depth {depth})")]
    Overflow { depth: usize },

    #[error("return with an empty stack")]
    Underflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new(16);
        assert_eq!(regs.pc, 0x200);
        assert_eq!(regs.i, 0);
        assert_eq!(regs.sp(), 0);
        assert_eq!(regs.v, [0; 16]);
        assert_eq!(regs.stack_depth(), 16);
    }

    #[test]
    fn test_push_pop() {
        let mut regs = Registers::new(2);
        regs.push(0x202).unwrap();
        regs.push(0x304).unwrap();
        assert_eq!(regs.stack(), &[0x202, 0x304]);

        assert_eq!(regs.pop().unwrap(), 0x304);
        assert_eq!(regs.pop().unwrap(), 0x202);
        assert_eq!(regs.pop(), Err(StackError::Underflow));
    }

    #[test]
    fn test_stack_overflow() {
        let mut regs = Registers::new(2);
        regs.push(1).unwrap();
        regs.push(2).unwrap();
        assert_eq!(regs.push(3), Err(StackError::Overflow { depth: 2 }));
        assert_eq!(regs.sp(), 2);
    }

    #[test]
    fn test_skip_if() {
        let mut regs = Registers::new(16);
        regs.skip_if(false);
        assert_eq!(regs.pc, 0x202);
        regs.skip_if(true);
        assert_eq!(regs.pc, 0x206);
    }

    #[test]
    fn test_flag() {
        let mut regs = Registers::new(16);
        regs.set_flag(true);
        assert_eq!(regs.get(0xF), 1);
        regs.set_flag(false);
        assert_eq!(regs.get(0xF), 0);
    }
}
