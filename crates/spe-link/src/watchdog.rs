//! Device silence detection
//!
//! The watchdog counts poll ticks since the last validated frame. It never
//! stops the poll loop; running out only tells the session to show the
//! placeholder screen.

/// Outcome of one watchdog tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogTick {
    /// Still counting down; ticks left before expiry
    Counting(u32),
    /// The counter is at zero
    Expired {
        /// True on the first expired tick of a silent episode
        first: bool,
    },
}

/// Tick-based countdown reset by every validated frame
#[derive(Debug, Clone)]
pub struct Watchdog {
    max: u32,
    remaining: u32,
    starved: bool,
}

impl Watchdog {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            remaining: max,
            starved: false,
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Advance one poll tick
    ///
    /// A tick that finds the counter at zero reports expiry and leaves it
    /// there; otherwise the counter is decremented.
    pub fn tick(&mut self) -> WatchdogTick {
        if self.remaining == 0 {
            let first = !self.starved;
            self.starved = true;
            WatchdogTick::Expired { first }
        } else {
            self.remaining -= 1;
            WatchdogTick::Counting(self.remaining)
        }
    }

    /// Record a validated frame, restarting the full countdown
    ///
    /// Returns true if this ends a silent episode.
    pub fn feed(&mut self) -> bool {
        let recovered = self.starved;
        self.remaining = self.max;
        self.starved = false;
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_expires_after_max_ticks() {
        let mut wd = Watchdog::new(3);
        assert_eq!(wd.tick(), WatchdogTick::Counting(2));
        assert_eq!(wd.tick(), WatchdogTick::Counting(1));
        assert_eq!(wd.tick(), WatchdogTick::Counting(0));
        assert_eq!(wd.tick(), WatchdogTick::Expired { first: true });
        assert_eq!(wd.tick(), WatchdogTick::Expired { first: false });
        assert_eq!(wd.remaining(), 0);
    }

    #[test]
    fn test_feed_restarts_full_countdown() {
        let mut wd = Watchdog::new(10);
        for _ in 0..7 {
            wd.tick();
        }
        assert!(!wd.feed());
        assert_eq!(wd.remaining(), 10);

        for _ in 0..11 {
            wd.tick();
        }
        assert!(wd.feed());
        assert_eq!(wd.remaining(), 10);
        assert_eq!(wd.tick(), WatchdogTick::Counting(9));
    }

    proptest! {
        #[test]
        fn expiry_depends_only_on_ticks_since_last_feed(
            max in 1u32..20,
            before in 0u32..40,
            after in 0u32..40,
        ) {
            let mut wd = Watchdog::new(max);
            for _ in 0..before {
                wd.tick();
            }
            wd.feed();

            let mut expired_at = None;
            for n in 1..=after {
                if let WatchdogTick::Expired { first: true } = wd.tick() {
                    expired_at = Some(n);
                }
            }
            if after > max {
                prop_assert_eq!(expired_at, Some(max + 1));
            } else {
                prop_assert_eq!(expired_at, None);
            }
        }
    }
}
