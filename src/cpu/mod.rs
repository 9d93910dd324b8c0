//! CHIP-8 machine core.
//!
//! - 4 KiB byte-addressed memory with the hex font at 0x000 and programs at 0x200
//! - sixteen 8-bit registers, a 16-bit index register and a bounded call stack
//! - delay and sound timers ticked once per step
//! - a 64x32 monochrome display and a 16-key keypad
//! - the 35-instruction classic instruction set

pub mod memory;
pub mod registers;
pub mod timers;
pub mod display;
pub mod keypad;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Registers, StackError};
pub use timers::Timers;
pub use display::{Display, DisplayError};
pub use keypad::{Keypad, KeypadError};
pub use decode::{Instruction, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, RunStop, RunSummary, StepOutcome, StepStatus};
