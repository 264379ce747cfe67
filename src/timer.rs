//! System timer — tick accounting on top of the host monotonic clock
//!
//! Tasks express delays and block times in ticks. The tick rate decides
//! how many ticks make up one second; 1 kHz gives one tick per millisecond.

use std::thread;
use std::time::{Duration, Instant};

/// Default tick rate (Hz)
pub const DEFAULT_TICK_RATE_HZ: u32 = 1_000;

/// Upper bound on the tick rate (1 tick per microsecond)
pub const MAX_TICK_RATE_HZ: u32 = 1_000_000;

/// A duration expressed in scheduler ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u32);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);
    /// "Block forever" sentinel
    pub const MAX: Ticks = Ticks(u32::MAX);

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Tick frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// Create a tick rate. Clamped to `1..=MAX_TICK_RATE_HZ`.
    pub const fn new(hz: u32) -> Self {
        let hz = if hz == 0 {
            1
        } else if hz > MAX_TICK_RATE_HZ {
            MAX_TICK_RATE_HZ
        } else {
            hz
        };
        Self { hz }
    }

    pub fn hz(&self) -> u32 {
        self.hz
    }

    /// Milliseconds to ticks, truncating. Saturates just below `Ticks::MAX`
    /// so a long delay never turns into "forever".
    pub fn ms_to_ticks(&self, ms: u64) -> Ticks {
        let ticks = ms.saturating_mul(self.hz as u64) / 1_000;
        Ticks(ticks.min(u32::MAX as u64 - 1) as u32)
    }

    /// Length of `ticks` on the wall clock
    pub fn ticks_to_duration(&self, ticks: Ticks) -> Duration {
        let nanos = ticks.0 as u128 * 1_000_000_000 / self.hz as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Whole ticks elapsed in `elapsed`
    pub fn duration_to_ticks(&self, elapsed: Duration) -> u64 {
        (elapsed.as_nanos() * self.hz as u128 / 1_000_000_000) as u64
    }

    /// Suspend the calling task for `ticks`.
    ///
    /// The thread sleeps; it is never a spin. Zero ticks only yields.
    pub fn delay(&self, ticks: Ticks) {
        if ticks == Ticks::ZERO {
            thread::yield_now();
        } else {
            thread::sleep(self.ticks_to_duration(ticks));
        }
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE_HZ)
    }
}

/// How long a blocking call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Fail straight away if the call would block
    Immediate,
    /// Give up after this long
    After(Duration),
    /// Block until the call can complete
    Forever,
}

impl Timeout {
    /// Block time in ticks: `0` never blocks, `Ticks::MAX` blocks forever.
    pub fn from_ticks(ticks: Ticks, rate: TickRate) -> Self {
        match ticks {
            Ticks::ZERO => Timeout::Immediate,
            Ticks::MAX => Timeout::Forever,
            t => Timeout::After(rate.ticks_to_duration(t)),
        }
    }

    /// Budget reported in a `TimedOut` error
    pub fn budget(&self) -> Duration {
        match self {
            Timeout::Immediate => Duration::ZERO,
            Timeout::After(d) => *d,
            Timeout::Forever => Duration::MAX,
        }
    }
}

/// Absolute expiry of a blocking call
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// Expiry instant (`None` = never)
    at: Option<Instant>,
}

impl Deadline {
    pub fn new(start: Instant, timeout: Timeout) -> Self {
        let at = match timeout {
            Timeout::Immediate => Some(start),
            // An unrepresentable instant is as good as forever.
            Timeout::After(d) => start.checked_add(d),
            Timeout::Forever => None,
        };
        Self { at }
    }

    /// Has the deadline passed?
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.at, Some(at) if now >= at)
    }

    /// Remaining wait (`None` when unbounded, zero once expired)
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(now))
    }
}

/// Tick counter since kernel start
#[derive(Debug, Clone, Copy)]
pub struct SysTimer {
    epoch: Instant,
    rate: TickRate,
}

impl SysTimer {
    /// Start counting from now
    pub fn start(rate: TickRate) -> Self {
        Self {
            epoch: Instant::now(),
            rate,
        }
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// Ticks since start
    pub fn now_ticks(&self) -> u64 {
        self.rate.duration_to_ticks(self.epoch.elapsed())
    }
}
