//! WebAssembly bindings for the CHIP-8 machine.
//!
//! This module provides JavaScript-friendly wrappers around the core machine.
//! The page owns pacing: call `run_frame` from `requestAnimationFrame`, feed
//! key events through `set_key`, and repaint when `poll_redraw` says so.

use wasm_bindgen::prelude::*;
use serde::Serialize;
use crate::{Cpu, CpuState, Rom, StepStatus};
use crate::cpu::display::{HEIGHT, WIDTH};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Register snapshot handed to JavaScript as JSON.
#[derive(Serialize)]
struct RegisterSnapshot<'a> {
    v: &'a [u8; 16],
    i: u16,
    pc: u16,
    sp: usize,
    stack: &'a [u16],
    delay: u8,
    sound: u8,
    cycles: u64,
    state: CpuState,
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    cpu: Cpu,
    program: Vec<u8>,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a new machine with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            program: Vec::new(),
        }
    }

    /// Load a ROM image. Returns its size in bytes.
    #[wasm_bindgen]
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<usize, JsError> {
        let rom = Rom::from_bytes("rom", bytes.to_vec())
            .map_err(|e| JsError::new(&e.to_string()))?;

        self.cpu.reset();
        self.cpu.load_program(&rom.bytes)
            .map_err(|e| JsError::new(&e.to_string()))?;
        self.program = rom.bytes;

        Ok(self.program.len())
    }

    /// Step one cycle. Returns a short description of what happened.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let outcome = self.cpu.step()
            .map_err(|e| JsError::new(&e.to_string()))?;

        Ok(match outcome.status {
            StepStatus::Executed(instr) => format!("{:?}", instr),
            StepStatus::WaitingForKey => "waiting for key".to_string(),
            StepStatus::UnknownOpcode(word) => format!("unknown opcode {:04X}", word),
        })
    }

    /// Run up to `cycles` steps for one animation frame.
    ///
    /// Returns `true` if a sound notification fired during the frame. Stops
    /// early on an unknown opcode.
    #[wasm_bindgen]
    pub fn run_frame(&mut self, cycles: u32) -> Result<bool, JsError> {
        let summary = self.cpu.run_limited(cycles as u64)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(summary.beeps > 0)
    }

    /// Set the state of keypad key `index` (0-15).
    #[wasm_bindgen]
    pub fn set_key(&mut self, index: u8, pressed: bool) -> Result<(), JsError> {
        self.cpu.set_key(index, pressed)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Whether the display changed since the last call.
    #[wasm_bindgen]
    pub fn poll_redraw(&mut self) -> bool {
        self.cpu.poll_and_clear_redraw()
    }

    /// Display cells, row-major, one byte (0 or 1) per pixel.
    #[wasm_bindgen]
    pub fn display(&self) -> js_sys::Uint8Array {
        let cells: Vec<u8> = self.cpu.display()
            .grid()
            .iter()
            .flat_map(|row| row.iter().map(|&lit| lit as u8))
            .collect();
        js_sys::Uint8Array::from(cells.as_slice())
    }

    #[wasm_bindgen]
    pub fn width(&self) -> usize {
        WIDTH
    }

    #[wasm_bindgen]
    pub fn height(&self) -> usize {
        HEIGHT
    }

    /// Reset to power-on state and reload the last ROM.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.cpu.reset();
        if !self.program.is_empty() {
            self.cpu.load_program(&self.program)
                .map_err(|e| JsError::new(&e.to_string()))?;
        }
        Ok(())
    }

    /// Check if the machine is running.
    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    /// Whether the sound timer is non-zero.
    #[wasm_bindgen]
    pub fn is_sounding(&self) -> bool {
        self.cpu.timers.is_sounding()
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.regs.pc
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.cpu.state)
    }

    /// Get registers, timers and stack as a JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        let snapshot = RegisterSnapshot {
            v: &self.cpu.regs.v,
            i: self.cpu.regs.i,
            pc: self.cpu.regs.pc,
            sp: self.cpu.regs.sp(),
            stack: self.cpu.regs.stack(),
            delay: self.cpu.timers.delay,
            sound: self.cpu.timers.sound,
            cycles: self.cpu.cycles,
            state: self.cpu.state,
        };
        serde_json::to_string(&snapshot)
            .map_err(|e| JsError::new(&e.to_string()))
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}
