/// Lifecycle of the per-batch countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Running,
    Confirmed,
    Cancelled,
    Expired,
}

/// Outcome of a one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still running with this many seconds left.
    Remaining(u32),
    /// Reached zero on this tick; the timeout policy must run.
    Expired,
    /// No countdown is running; stale timer callback.
    Inactive,
}

/// Cooperative countdown, advanced by an external one-second timer.
///
/// Only one may be running at a time; the owner stops its timer source on
/// every transition out of `Running`.
#[derive(Debug, Clone)]
pub struct Countdown {
    state: CountdownState,
    remaining: u32,
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            state: CountdownState::Idle,
            remaining: 0,
        }
    }
}

impl Countdown {
    pub fn start(&mut self, seconds: u32) {
        self.state = CountdownState::Running;
        self.remaining = seconds;
    }

    pub fn tick(&mut self) -> Tick {
        if self.state != CountdownState::Running {
            return Tick::Inactive;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = CountdownState::Expired;
            Tick::Expired
        } else {
            Tick::Remaining(self.remaining)
        }
    }

    /// Terminal transition after the operator confirmed.
    pub fn confirm(&mut self) {
        self.state = CountdownState::Confirmed;
    }

    /// Terminal transition after a cancel or an external interrupt.
    pub fn cancel(&mut self) {
        self.state = CountdownState::Cancelled;
    }

    /// Back to idle, e.g. while a pinned panel waits for the next batch.
    pub fn reset(&mut self) {
        self.state = CountdownState::Idle;
        self.remaining = 0;
    }

    /// `Time remaining: m:ss`
    pub fn label(&self) -> String {
        format!(
            "Time remaining: {}:{:02}",
            self.remaining / 60,
            self.remaining % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_exactly_t_ticks() {
        let mut countdown = Countdown::default();
        countdown.start(3);
        assert_eq!(countdown.tick(), Tick::Remaining(2));
        assert_eq!(countdown.tick(), Tick::Remaining(1));
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.state, CountdownState::Expired);
        assert_eq!(countdown.tick(), Tick::Inactive);
    }

    #[test]
    fn zero_seconds_expires_on_first_tick() {
        let mut countdown = Countdown::default();
        countdown.start(0);
        assert_eq!(countdown.tick(), Tick::Expired);
    }

    #[test]
    fn ticks_after_confirm_or_cancel_are_inert() {
        let mut countdown = Countdown::default();
        countdown.start(10);
        countdown.confirm();
        assert_eq!(countdown.tick(), Tick::Inactive);

        countdown.start(10);
        countdown.cancel();
        assert_eq!(countdown.tick(), Tick::Inactive);
        assert_eq!(countdown.state, CountdownState::Cancelled);
    }

    #[test]
    fn restart_replaces_previous_run() {
        let mut countdown = Countdown::default();
        countdown.start(5);
        countdown.tick();
        countdown.start(60);
        assert_eq!(countdown.remaining, 60);
        assert_eq!(countdown.state, CountdownState::Running);
    }

    #[test]
    fn label_formats_minutes_and_padded_seconds() {
        let mut countdown = Countdown::default();
        countdown.start(65);
        assert_eq!(countdown.label(), "Time remaining: 1:05");
        countdown.start(9);
        assert_eq!(countdown.label(), "Time remaining: 0:09");
    }
}
