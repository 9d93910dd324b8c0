//! # Chipper
//!
//! A CHIP-8 virtual machine.
//!
//! The core is a single-step interpreter: each call to [`Cpu::step`] runs one
//! fetch-decode-execute cycle and one timer tick, and reports what happened.
//! Pacing, rendering, input and audio belong to the host; the terminal player
//! and WebAssembly bindings are two such hosts.

pub mod config;
pub mod cpu;
pub mod rom;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use config::{ConfigError, MachineConfig};
pub use cpu::{Cpu, CpuState, CpuError, StepOutcome, StepStatus, RunStop, RunSummary};
pub use cpu::{Memory, MemoryError, Registers, StackError, Display, DisplayError, Keypad, KeypadError, Timers};
pub use cpu::decode::{decode, encode, Instruction, DecodeError};
pub use rom::{load_rom, Rom, RomError};

#[cfg(feature = "tui")]
pub use tui::run_player;
