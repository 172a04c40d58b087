use std::fmt;
use std::time::Duration;

/// Deferred work the session asks to be woken up for. Round-scoped timers
/// carry their round number so a late delivery for a finished round can be
/// recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    CountdownTick { round_number: u64 },
    EarlyEnd { round_number: u64 },
    NextRound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Delivers a `Timer` back to the session after `delay`, through the same
/// queue that carries player events.
pub trait Scheduler: Send {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerHandle;

    /// Cancelling a handle that already fired is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}
