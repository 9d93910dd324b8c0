//! Delay and sound timers.

use serde::{Serialize, Deserialize};

/// The two 8-bit countdown timers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timers {
    pub delay: u8,
    pub sound: u8,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decrement both timers by one, stopping at zero.
    ///
    /// Returns `true` on the tick that takes the sound timer from 1 to 0.
    pub fn tick(&mut self) -> bool {
        self.delay = self.delay.saturating_sub(1);

        let beep = self.sound == 1;
        self.sound = self.sound.saturating_sub(1);
        beep
    }

    /// Whether the sound timer is still running.
    pub fn is_sounding(&self) -> bool {
        self.sound > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_stops_at_zero() {
        let mut timers = Timers { delay: 1, sound: 0 };
        assert!(!timers.tick());
        assert_eq!(timers.delay, 0);
        assert!(!timers.tick());
        assert_eq!(timers, Timers::new());
    }

    #[test]
    fn test_sound_fires_once() {
        let mut timers = Timers { delay: 0, sound: 3 };
        let beeps: Vec<bool> = (0..5).map(|_| timers.tick()).collect();
        assert_eq!(beeps, vec![false, false, true, false, false]);
        assert!(!timers.is_sounding());
    }
}
