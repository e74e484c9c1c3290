use log::info;

/// Touch input, already classified by the toolkit's gesture recognizer.
/// A directional swipe never doubles as a tap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Tap,
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    SwipeRight,
}

/// Hold time on the boot key before a long press is reported.
pub const LONG_PRESS_MS: u32 = 1500;

/// Level-sampled state of the physical boot key, fed once per UI tick.
#[derive(Default)]
pub struct BootKey {
    held_ms: u32,
    fired: bool,
}

impl BootKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates hold time; returns true exactly once when the hold
    /// crosses [`LONG_PRESS_MS`]. Releasing the key re-arms it.
    pub fn sample(&mut self, pressed: bool, elapsed_ms: u32) -> bool {
        if !pressed {
            self.held_ms = 0;
            self.fired = false;
            return false;
        }
        if self.held_ms == 0 {
            info!("boot key pressed");
        }
        self.held_ms = self.held_ms.saturating_add(elapsed_ms);
        if self.held_ms >= LONG_PRESS_MS && !self.fired {
            self.fired = true;
            return true;
        }
        false
    }

    pub fn held_ms(&self) -> u32 {
        self.held_ms
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn long_press_fires_once() {
        let mut key = BootKey::new();
        let mut fired = 0;
        for _ in 0..10 {
            if key.sample(true, 500) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn release_rearms() {
        let mut key = BootKey::new();
        assert!(!key.sample(true, 1000));
        assert!(key.sample(true, 500));
        assert!(!key.sample(false, 500));
        assert_eq!(key.held_ms(), 0);
        assert!(!key.sample(true, 1000));
        assert!(key.sample(true, 500));
    }
}
