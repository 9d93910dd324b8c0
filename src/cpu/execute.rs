//! CPU execution engine for CHIP-8.
//!
//! Implements the fetch-decode-execute-tick cycle and all instruction
//! behaviours. One call to [`Cpu::step`] runs exactly one cycle; pacing,
//! rendering and audio are left to the host.

use crate::config::{ConfigError, MachineConfig};
use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::display::{Display, DisplayError, HEIGHT, WIDTH};
use crate::cpu::keypad::{Keypad, KeypadError};
use crate::cpu::memory::{Memory, MemoryError, FONT_START, GLYPH_SIZE};
use crate::cpu::registers::{Registers, StackError};
use crate::cpu::timers::Timers;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU hit a fault and stays stopped until [`Cpu::reset`].
    Faulted,
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// The instruction ran and control moved on.
    Executed(Instruction),
    /// FX0A found no key down; nothing changed and the PC stays put.
    WaitingForKey,
    /// The word at PC is not an instruction. The PC is not advanced.
    UnknownOpcode(u16),
}

/// Facts observed during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub status: StepStatus,
    /// The sound timer ran out during this step.
    pub sound: bool,
}

impl StepOutcome {
    /// Whether the step made forward progress.
    pub fn progressed(&self) -> bool {
        matches!(self.status, StepStatus::Executed(_))
    }
}

/// Why [`Cpu::run_limited`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStop {
    /// The cycle budget was used up.
    CycleLimit,
    /// A jump to itself was executed; the program is idling.
    Idle,
    /// FX0A is waiting for input.
    WaitingForKey,
    /// An unknown opcode was hit.
    UnknownOpcode(u16),
}

/// Result of [`Cpu::run_limited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub stop: RunStop,
    /// Number of sound notifications raised while running.
    pub beeps: u64,
}

/// The CHIP-8 machine.
pub struct Cpu {
    /// CPU registers and stack.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Delay and sound timers.
    pub timers: Timers,
    /// Display surface.
    pub display: Display,
    /// Key latch.
    pub keypad: Keypad,
    /// Current execution state.
    pub state: CpuState,
    /// Completed steps.
    pub cycles: u64,
    config: MachineConfig,
    last_instr: Option<Instruction>,
    rng: StdRng,
}

impl Cpu {
    /// Create a CPU with the default configuration.
    pub fn new() -> Self {
        Self::build(MachineConfig::default())
    }

    /// Create a CPU from a configuration, validating it first.
    pub fn with_config(config: MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MachineConfig) -> Self {
        Self {
            regs: Registers::new(config.stack_depth),
            mem: Memory::new(config.ram_size),
            timers: Timers::new(),
            display: Display::new(),
            keypad: Keypad::new(),
            state: CpuState::Running,
            cycles: 0,
            config,
            last_instr: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Make CXNN deterministic.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Reset to the power-on state. The program has to be loaded again.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.timers = Timers::new();
        self.display = Display::new();
        self.keypad.release_all();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program at 0x200.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(program)?;
        debug!(bytes = program.len(), "program loaded");
        Ok(())
    }

    /// Set the state of one key.
    pub fn set_key(&mut self, index: u8, pressed: bool) -> Result<(), KeypadError> {
        self.keypad.set_key(index, pressed)
    }

    /// The display surface.
    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Whether the display changed since the last call.
    pub fn poll_and_clear_redraw(&mut self) -> bool {
        self.display.poll_and_clear_redraw()
    }

    /// Execute a single cycle: fetch, decode, execute, tick the timers.
    ///
    /// A fault stops the CPU: the faulting instruction leaves the machine
    /// as it was (PC included), no timer tick happens, and every later call
    /// returns [`CpuError::NotRunning`] until [`Cpu::reset`].
    pub fn step(&mut self) -> Result<StepOutcome, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let status = match self.cycle() {
            Ok(status) => status,
            Err(e) => {
                error!(pc = self.regs.pc, error = %e, "cpu fault");
                self.state = CpuState::Faulted;
                return Err(e);
            }
        };

        let sound = self.timers.tick();
        self.cycles += 1;
        if let StepStatus::Executed(instr) = status {
            self.last_instr = Some(instr);
        }

        Ok(StepOutcome { status, sound })
    }

    /// Run for at most `max_cycles` steps.
    ///
    /// Also stops early on an unknown opcode, a key wait, or a jump to
    /// itself, since none of them can make progress on their own.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<RunSummary, CpuError> {
        let start_cycles = self.cycles;
        let mut beeps = 0;
        let mut stop = RunStop::CycleLimit;

        while self.cycles - start_cycles < max_cycles {
            let pc = self.regs.pc;
            let outcome = self.step()?;
            beeps += outcome.sound as u64;

            match outcome.status {
                StepStatus::Executed(Instruction::Jump { .. }) if self.regs.pc == pc => {
                    stop = RunStop::Idle;
                    break;
                }
                StepStatus::Executed(_) => {}
                StepStatus::WaitingForKey => {
                    stop = RunStop::WaitingForKey;
                    break;
                }
                StepStatus::UnknownOpcode(word) => {
                    stop = RunStop::UnknownOpcode(word);
                    break;
                }
            }
        }

        Ok(RunSummary {
            cycles: self.cycles - start_cycles,
            stop,
            beeps,
        })
    }

    fn cycle(&mut self) -> Result<StepStatus, CpuError> {
        // Fetch
        let pc = self.regs.pc;
        let word = self.mem.read_word(pc as usize)?;

        // Decode
        let instr = match decode::decode(word) {
            Ok(instr) => instr,
            Err(DecodeError::UnknownOpcode(word)) => {
                warn!(pc, opcode = word, "unknown opcode");
                return Ok(StepStatus::UnknownOpcode(word));
            }
        };
        trace!(pc, opcode = word, ?instr, "execute");

        // Execute
        self.execute(instr)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<StepStatus, CpuError> {
        match instr {
            // ==================== Display ====================

            Instruction::ClearScreen => {
                self.display.clear();
                self.regs.advance_pc();
            }

            Instruction::Draw { x, y, n } => {
                self.draw_sprite(x, y, n)?;
                self.regs.advance_pc();
            }

            // ==================== Control Flow ====================

            Instruction::Return => {
                self.regs.pc = self.regs.pop()?;
                self.regs.advance_pc();
            }

            Instruction::Jump { addr } => {
                self.regs.pc = addr;
            }

            Instruction::Call { addr } => {
                self.regs.push(self.regs.pc)?;
                self.regs.pc = addr;
            }

            Instruction::JumpOffset { addr } => {
                self.regs.pc = addr + self.regs.get(0) as u16;
            }

            Instruction::SkipEqImm { x, nn } => {
                let vx = self.regs.get(x);
                self.regs.skip_if(vx == nn);
            }

            Instruction::SkipNeImm { x, nn } => {
                let vx = self.regs.get(x);
                self.regs.skip_if(vx != nn);
            }

            Instruction::SkipEqReg { x, y } => {
                let (vx, vy) = (self.regs.get(x), self.regs.get(y));
                self.regs.skip_if(vx == vy);
            }

            Instruction::SkipNeReg { x, y } => {
                let (vx, vy) = (self.regs.get(x), self.regs.get(y));
                self.regs.skip_if(vx != vy);
            }

            // ==================== Registers ====================

            Instruction::LoadImm { x, nn } => {
                self.regs.set(x, nn);
                self.regs.advance_pc();
            }

            Instruction::AddImm { x, nn } => {
                let vx = self.regs.get(x);
                self.regs.set(x, vx.wrapping_add(nn));
                self.regs.advance_pc();
            }

            Instruction::Move { x, y } => self.alu(x, y, |_, vy| vy),
            Instruction::Or { x, y } => self.alu(x, y, |vx, vy| vx | vy),
            Instruction::And { x, y } => self.alu(x, y, |vx, vy| vx & vy),
            Instruction::Xor { x, y } => self.alu(x, y, |vx, vy| vx ^ vy),

            Instruction::AddReg { x, y } => self.alu_flagged(
                x, y,
                |vx, vy| vx.checked_add(vy).is_none(),
                u8::wrapping_add,
            ),

            Instruction::SubReg { x, y } => self.alu_flagged(
                x, y,
                |vx, vy| vy <= vx,
                u8::wrapping_sub,
            ),

            Instruction::SubRev { x, y } => self.alu_flagged(
                x, y,
                |vx, vy| vx <= vy,
                |vx, vy| vy.wrapping_sub(vx),
            ),

            Instruction::ShiftRight { x, y } => self.alu_flagged(
                x, y,
                |vx, _| vx & 0x01 != 0,
                |vx, _| vx >> 1,
            ),

            Instruction::ShiftLeft { x, y } => self.alu_flagged(
                x, y,
                |vx, _| vx & 0x80 != 0,
                |vx, _| vx << 1,
            ),

            Instruction::Random { x, nn } => {
                let byte: u8 = self.rng.gen();
                self.regs.set(x, byte & nn);
                self.regs.advance_pc();
            }

            // ==================== Index Register ====================

            Instruction::LoadIndex { addr } => {
                self.regs.i = addr;
                self.regs.advance_pc();
            }

            Instruction::AddIndex { x } => {
                let sum = self.regs.i as u32 + self.regs.get(x) as u32;
                self.regs.i = sum as u16;
                self.regs.set_flag(sum > 0xFFF);
                self.regs.advance_pc();
            }

            Instruction::LoadGlyph { x } => {
                self.regs.i = (FONT_START + self.regs.get(x) as usize * GLYPH_SIZE) as u16;
                self.regs.advance_pc();
            }

            Instruction::StoreBcd { x } => {
                let vx = self.regs.get(x);
                let digits = [vx / 100, (vx / 10) % 10, vx % 10];
                self.mem.write_range(self.regs.i as usize, &digits)?;
                self.regs.advance_pc();
            }

            Instruction::StoreRegisters { x } => {
                let count = x as usize + 1;
                self.mem.write_range(self.regs.i as usize, &self.regs.v[..count])?;
                self.regs.i = count as u16;
                self.regs.advance_pc();
            }

            Instruction::LoadRegisters { x } => {
                let count = x as usize + 1;
                let bytes = self.mem.read_range(self.regs.i as usize, count)?;
                self.regs.v[..count].copy_from_slice(bytes);
                self.regs.i = count as u16;
                self.regs.advance_pc();
            }

            // ==================== Keypad ====================

            Instruction::SkipKeyPressed { x } => {
                let pressed = self.key_state(x)?;
                self.regs.skip_if(pressed);
            }

            Instruction::SkipKeyReleased { x } => {
                let pressed = self.key_state(x)?;
                self.regs.skip_if(!pressed);
            }

            Instruction::WaitKey { x } => match self.keypad.highest_pressed() {
                Some(key) => {
                    self.regs.set(x, key);
                    self.regs.advance_pc();
                }
                None => return Ok(StepStatus::WaitingForKey),
            },

            // ==================== Timers ====================

            Instruction::LoadDelay { x } => {
                self.regs.set(x, self.timers.delay);
                self.regs.advance_pc();
            }

            Instruction::SetDelay { x } => {
                self.timers.delay = self.regs.get(x);
                self.regs.advance_pc();
            }

            Instruction::SetSound { x } => {
                self.timers.sound = self.regs.get(x);
                self.regs.advance_pc();
            }
        }

        Ok(StepStatus::Executed(instr))
    }

    /// 8XY_ without a flag: Vx := op(Vx, Vy).
    fn alu(&mut self, x: u8, y: u8, op: impl FnOnce(u8, u8) -> u8) {
        let result = op(self.regs.get(x), self.regs.get(y));
        self.regs.set(x, result);
        self.regs.advance_pc();
    }

    /// 8XY_ with a flag. VF is written first and the result is computed
    /// from the registers after that write, so with x = F the result
    /// replaces the flag and with y = F it reads the new flag.
    fn alu_flagged(
        &mut self,
        x: u8,
        y: u8,
        flag: impl FnOnce(u8, u8) -> bool,
        op: impl FnOnce(u8, u8) -> u8,
    ) {
        let carry = flag(self.regs.get(x), self.regs.get(y));
        self.regs.set_flag(carry);

        let result = op(self.regs.get(x), self.regs.get(y));
        self.regs.set(x, result);
        self.regs.advance_pc();
    }

    fn key_state(&self, x: u8) -> Result<bool, KeypadError> {
        let key = self.regs.get(x);
        self.keypad.is_pressed(key).ok_or(KeypadError::InvalidKey(key))
    }

    /// DXYN. Sprites do not wrap: a lit sprite pixel that lands off the
    /// grid is a fault, detected before any cell is touched.
    fn draw_sprite(&mut self, x: u8, y: u8, n: u8) -> Result<(), CpuError> {
        let x0 = self.regs.get(x) as usize;
        let y0 = self.regs.get(y) as usize;
        let rows = self.mem.read_range(self.regs.i as usize, n as usize)?;

        let lit: Vec<(usize, usize)> = rows
            .iter()
            .enumerate()
            .flat_map(|(j, &row)| {
                (0..8)
                    .filter(move |&i| row & (0x80 >> i) != 0)
                    .map(move |i| (x0 + i, y0 + j))
            })
            .collect();

        if let Some(&(px, py)) = lit.iter().find(|&&(px, py)| px >= WIDTH || py >= HEIGHT) {
            return Err(DisplayError::OutOfBounds { x: px, y: py }.into());
        }

        let mut collision = false;
        for (px, py) in lit {
            collision |= self.display.toggle(px, py)?;
        }

        self.regs.set_flag(collision);
        self.display.raise_redraw();
        Ok(())
    }

    /// The configuration this CPU was built with.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Check if the CPU has faulted.
    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("timers", &self.timers)
            .finish()
    }
}

/// Faults that stop the CPU.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("display error: {0}")]
    Display(#[from] DisplayError),

    #[error("keypad error: {0}")]
    Keypad(#[from] KeypadError),

    #[error("stack error: {0}")]
    Stack(#[from] StackError),
}
