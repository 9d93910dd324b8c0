//! Terminal player.
//!
//! Runs a ROM in real time:
//! - fixed 60 Hz frames with a configurable number of steps per frame
//! - half-block rendering of the 64x32 display
//! - keyboard mapped onto the 16-key keypad
//! - sound indicator and fault reporting in the status line

mod app;
mod ui;

pub use app::{PlayerApp, run_player, key_for_char, DEFAULT_SPEED, FRAME, MAX_SPEED};
