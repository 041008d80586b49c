//! Control loop: poll, hand events to the caller, sleep, repeat.
//!
//! Runs on the caller's thread. Sleeping goes through `Clock`, so tests can
//! drive the loop with `TestClock` and deadlines are reached without waiting.
use pump_traits::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::RunnerSettings;
use crate::event::PumpEvent;
use crate::registry::PumpRegistry;
use crate::session::PumpSession;

/// Something the loop can poll for events.
pub trait Pollable {
    fn poll_events(&mut self) -> Vec<PumpEvent>;
}

impl Pollable for PumpSession {
    fn poll_events(&mut self) -> Vec<PumpEvent> {
        self.poll();
        self.take_events()
    }
}

impl Pollable for PumpRegistry {
    fn poll_events(&mut self) -> Vec<PumpEvent> {
        self.poll()
    }
}

/// What the tick callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Done,
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The callback returned `Tick::Done`.
    Finished,
    /// The shutdown flag was raised.
    Shutdown,
    /// The deadline passed first.
    TimedOut,
}

pub struct Runner {
    clock: Arc<dyn Clock>,
    poll: Duration,
    deadline: Option<Duration>,
}

impl Runner {
    pub fn new(clock: Arc<dyn Clock>, settings: RunnerSettings) -> Self {
        Self {
            clock,
            poll: settings.poll.max(crate::util::MIN_POLL),
            deadline: None,
        }
    }

    /// Give up after `d` of clock time.
    #[must_use]
    pub fn with_deadline(mut self, d: Duration) -> Self {
        self.deadline = Some(d);
        self
    }

    pub fn poll_period(&self) -> Duration {
        self.poll
    }

    /// Tick until the callback says done, `shutdown` is raised or the deadline passes.
    ///
    /// The callback sees every event exactly once, in order, and may act on
    /// the target (e.g. cancel) before the next tick.
    pub fn run<P, F>(&self, target: &mut P, shutdown: &AtomicBool, mut on_tick: F) -> RunOutcome
    where
        P: Pollable,
        F: FnMut(&mut P, &[PumpEvent]) -> Tick,
    {
        let epoch = self.clock.now();
        loop {
            let events = target.poll_events();
            if on_tick(target, &events) == Tick::Done {
                return RunOutcome::Finished;
            }
            if shutdown.load(Ordering::Relaxed) {
                tracing::debug!("runner received shutdown signal");
                return RunOutcome::Shutdown;
            }
            if let Some(limit) = self.deadline {
                if self.clock.now().saturating_duration_since(epoch) >= limit {
                    return RunOutcome::TimedOut;
                }
            }
            self.clock.sleep(self.poll);
        }
    }
}
