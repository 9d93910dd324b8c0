//! Player state and the real-time frame loop.

use crate::cpu::display::{Grid, HEIGHT, WIDTH};
use crate::cpu::keypad::{KeypadError, KEY_COUNT};
use crate::{Cpu, Rom, StepStatus};
use crossterm::event::KeyCode;
use std::time::{Duration, Instant};
use tracing::info;

/// One 60 Hz frame.
pub const FRAME: Duration = Duration::from_micros(16_667);

/// Default number of steps per frame.
pub const DEFAULT_SPEED: u32 = 10;

/// Upper bound for the speed setting.
pub const MAX_SPEED: u32 = 1000;

/// Terminals only report presses, so a key stays down this many frames
/// after its last press (auto-repeat keeps it down while held).
const KEY_HOLD_FRAMES: u8 = 6;

/// Frames the sound indicator stays lit after a notification.
const BEEP_FRAMES: u8 = 10;

/// Map a keyboard character to a keypad key.
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// q w e r  ->  4 5 6 D
/// a s d f      7 8 9 E
/// z x c v      A 0 B F
/// ```
pub fn key_for_char(c: char) -> Option<u8> {
    let key = match c.to_ascii_lowercase() {
        '1' => 0x1, '2' => 0x2, '3' => 0x3, '4' => 0xC,
        'q' => 0x4, 'w' => 0x5, 'e' => 0x6, 'r' => 0xD,
        'a' => 0x7, 's' => 0x8, 'd' => 0x9, 'f' => 0xE,
        'z' => 0xA, 'x' => 0x0, 'c' => 0xB, 'v' => 0xF,
        _ => return None,
    };
    Some(key)
}

/// Player application state.
pub struct PlayerApp {
    /// The machine being played.
    pub cpu: Cpu,
    /// ROM kept for resets.
    pub rom: Rom,
    /// Steps per frame.
    pub speed: u32,
    /// Is execution paused?
    pub paused: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Last rendered display snapshot.
    pub screen: Grid,
    hold: [u8; KEY_COUNT],
    beep_frames: u8,
}

impl PlayerApp {
    /// Create a player around a machine that already has `rom` loaded.
    pub fn new(cpu: Cpu, rom: Rom, speed: u32) -> Self {
        Self {
            cpu,
            rom,
            speed: speed.clamp(1, MAX_SPEED),
            paused: false,
            should_quit: false,
            status: "Running. Space pauses, Backspace resets, Esc quits.".into(),
            screen: [[false; WIDTH]; HEIGHT],
            hold: [0; KEY_COUNT],
            beep_frames: 0,
        }
    }

    /// React to one key press.
    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Backspace => self.reset(),
            KeyCode::Char(' ') => {
                self.paused = !self.paused;
                self.status = if self.paused { "Paused.".into() } else { "Running.".into() };
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.set_speed(self.speed + 1),
            KeyCode::Char('-') => self.set_speed(self.speed.saturating_sub(1)),
            KeyCode::Char(c) => {
                if let Some(key) = key_for_char(c) {
                    self.press(key);
                }
            }
            _ => {}
        }
    }

    /// Mark a keypad key as down for the next few frames.
    pub fn press(&mut self, key: u8) {
        if let Some(hold) = self.hold.get_mut(key as usize) {
            *hold = KEY_HOLD_FRAMES;
        }
    }

    fn set_speed(&mut self, speed: u32) {
        self.speed = speed.clamp(1, MAX_SPEED);
        self.status = format!("Speed: {} steps/frame", self.speed);
    }

    /// Run one frame: latch keys, run `speed` steps, pick up display changes.
    pub fn frame(&mut self) {
        self.beep_frames = self.beep_frames.saturating_sub(1);

        if !self.paused && self.cpu.is_running() {
            if let Err(e) = self.latch_keys() {
                self.status = format!("Keypad error: {}", e);
            }
            self.run_steps();
        }

        for hold in self.hold.iter_mut() {
            *hold = hold.saturating_sub(1);
        }

        if self.cpu.poll_and_clear_redraw() {
            self.screen = self.cpu.display().grid();
        }
    }

    fn latch_keys(&mut self) -> Result<(), KeypadError> {
        for (key, &hold) in self.hold.iter().enumerate() {
            self.cpu.set_key(key as u8, hold > 0)?;
        }
        Ok(())
    }

    fn run_steps(&mut self) {
        for _ in 0..self.speed {
            let pc = self.cpu.regs.pc;
            match self.cpu.step() {
                Ok(outcome) => {
                    if outcome.sound {
                        self.beep_frames = BEEP_FRAMES;
                    }
                    if let StepStatus::UnknownOpcode(word) = outcome.status {
                        self.paused = true;
                        self.status = format!("Unknown opcode {:04X} at {:03X}. Paused.", word, pc);
                        break;
                    }
                }
                Err(e) => {
                    self.status = format!("Fault at PC={:03X}: {}", pc, e);
                    break;
                }
            }
        }
    }

    /// Reset the machine and reload the ROM.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.hold = [0; KEY_COUNT];
        self.beep_frames = 0;
        self.paused = false;

        self.status = match self.cpu.load_program(&self.rom.bytes) {
            Ok(()) => "Reset. Running.".into(),
            Err(e) => format!("Reload failed: {}", e),
        };
        info!(rom = %self.rom.name, "player reset");
    }

    /// Whether the sound indicator is lit.
    pub fn beeping(&self) -> bool {
        self.beep_frames > 0 || self.cpu.timers.is_sounding()
    }
}

/// Play a ROM in the terminal until Esc is pressed.
pub fn run_player(cpu: Cpu, rom: Rom, speed: u32) -> std::io::Result<()> {
    use crossterm::{
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;

    enable_raw_mode()?;
    with_restore(
        || {
            stdout().execute(EnterAlternateScreen)?;
            Terminal::new(CrosstermBackend::new(stdout()))
        },
        |mut terminal| main_loop(&mut terminal, &mut PlayerApp::new(cpu, rom, speed)),
        || {
            let raw = disable_raw_mode();
            let screen = stdout().execute(LeaveAlternateScreen).map(|_| ());
            raw.and(screen)
        },
    )
}

/// Run `body` on whatever `setup` builds, then always run `restore`, even
/// when `setup` or `body` failed. The first error wins.
fn with_restore<T>(
    setup: impl FnOnce() -> std::io::Result<T>,
    body: impl FnOnce(T) -> std::io::Result<()>,
    restore: impl FnOnce() -> std::io::Result<()>,
) -> std::io::Result<()> {
    let result = setup().and_then(body);
    let restored = restore();
    result.and(restored)
}

fn main_loop<B: ratatui::backend::Backend>(
    terminal: &mut ratatui::Terminal<B>,
    app: &mut PlayerApp,
) -> std::io::Result<()> {
    use crossterm::event::{self, Event, KeyEventKind};

    let mut next_frame = Instant::now();

    loop {
        // Handle input until the next frame is due
        let timeout = next_frame.saturating_duration_since(Instant::now());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Release {
                    app.handle_key(key.code);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }

        let now = Instant::now();
        if now >= next_frame {
            app.frame();
            terminal.draw(|frame| super::ui::draw(frame, app))?;

            next_frame += FRAME;
            // Don't try to catch up after a stall.
            if now > next_frame + FRAME * 4 {
                next_frame = now + FRAME;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(words: &[u16], speed: u32) -> PlayerApp {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        let rom = Rom::from_bytes("test", bytes).unwrap();
        let mut cpu = Cpu::new();
        cpu.load_program(&rom.bytes).unwrap();
        PlayerApp::new(cpu, rom, speed)
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(key_for_char('1'), Some(0x1));
        assert_eq!(key_for_char('4'), Some(0xC));
        assert_eq!(key_for_char('X'), Some(0x0));
        assert_eq!(key_for_char('v'), Some(0xF));
        assert_eq!(key_for_char('p'), None);
    }

    #[test]
    fn test_frame_runs_speed_steps_and_refreshes_screen() {
        // I := glyph 0, draw at (0, 0), then idle.
        let mut app = player(&[0xA000, 0xD015, 0x1204], 5);
        app.frame();
        assert_eq!(app.cpu.cycles, 5);
        assert!(app.screen[0][0]);
        assert!(!app.screen[1][1]);
    }

    #[test]
    fn test_pause_stops_execution() {
        let mut app = player(&[0x1200], 3);
        app.handle_key(KeyCode::Char(' '));
        app.frame();
        assert_eq!(app.cpu.cycles, 0);
        app.handle_key(KeyCode::Char(' '));
        app.frame();
        assert_eq!(app.cpu.cycles, 3);
    }

    #[test]
    fn test_key_is_held_then_released() {
        // Wait for a key, then idle.
        let mut app = player(&[0xF50A, 0x1202], 1);
        app.handle_key(KeyCode::Char('e'));
        app.frame();
        assert_eq!(app.cpu.regs.get(5), 0x6);
        assert_eq!(app.cpu.keypad.is_pressed(0x6), Some(true));

        for _ in 0..KEY_HOLD_FRAMES {
            app.frame();
        }
        assert_eq!(app.cpu.keypad.is_pressed(0x6), Some(false));
    }

    #[test]
    fn test_unknown_opcode_pauses() {
        let mut app = player(&[0x6001, 0xFFFF], 10);
        app.frame();
        assert!(app.paused);
        assert_eq!(app.cpu.cycles, 2);
        assert!(app.status.contains("FFFF"));
    }

    #[test]
    fn test_fault_reported_and_reset_recovers() {
        let mut app = player(&[0x00EE], 1);
        app.frame();
        assert!(app.cpu.is_faulted());
        assert!(app.status.starts_with("Fault"));

        app.handle_key(KeyCode::Backspace);
        assert!(app.cpu.is_running());
        assert_eq!(app.cpu.mem.read_word(0x200).unwrap(), 0x00EE);
    }

    #[test]
    fn test_sound_indicator() {
        let mut app = player(&[0x6001, 0xF018, 0x1204], 3);
        app.frame();
        assert!(app.beeping());
        for _ in 0..BEEP_FRAMES {
            app.frame();
        }
        assert!(!app.beeping());
    }

    #[test]
    fn test_restore_runs_when_setup_fails() {
        use std::cell::Cell;
        use std::io::{Error, ErrorKind};

        let restored = Cell::new(false);
        let body_ran = Cell::new(false);
        let result = with_restore(
            || Err::<(), _>(Error::new(ErrorKind::Other, "no tty")),
            |_| {
                body_ran.set(true);
                Ok(())
            },
            || {
                restored.set(true);
                Ok(())
            },
        );

        assert_eq!(result.unwrap_err().to_string(), "no tty");
        assert!(restored.get());
        assert!(!body_ran.get());
    }

    #[test]
    fn test_restore_runs_after_body_and_keeps_first_error() {
        use std::cell::Cell;
        use std::io::{Error, ErrorKind};

        let restored = Cell::new(false);
        let result = with_restore(
            || Ok(7),
            |value| {
                assert_eq!(value, 7);
                Err(Error::new(ErrorKind::Other, "draw failed"))
            },
            || {
                restored.set(true);
                Err(Error::new(ErrorKind::Other, "restore failed"))
            },
        );

        assert_eq!(result.unwrap_err().to_string(), "draw failed");
        assert!(restored.get());

        let result = with_restore(|| Ok(()), |_| Ok(()), || Err(Error::new(ErrorKind::Other, "restore failed")));
        assert_eq!(result.unwrap_err().to_string(), "restore failed");
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut app = player(&[0x1200], 1);
        app.handle_key(KeyCode::Char('-'));
        assert_eq!(app.speed, 1);
        app.handle_key(KeyCode::Char('+'));
        assert_eq!(app.speed, 2);
    }
}
