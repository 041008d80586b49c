//! Background line reader.
//!
//! Spawns one thread per connected pump. The thread owns the `LineReader`,
//! decodes each line into a `Report` and pushes it through a bounded channel
//! to the control thread. It never touches session state.
//!
//! Shutdown: a stop flag is checked between reads (each read is bounded by
//! the transport timeout) and the thread also exits once the receiving side
//! is gone. Stopping never joins, so a wedged read cannot block the caller.
use crossbeam_channel as xch;
use pump_traits::LineReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::hw_error::link_failure_text;
use crate::report::{self, Report};

/// How long a blocked producer waits before re-checking the stop flag.
const SEND_SLICE: Duration = Duration::from_millis(50);

/// What the producer does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backpressure {
    /// Wait for the consumer, re-checking the stop flag every slice.
    #[default]
    Block,
    /// Evict the oldest queued item to make room.
    DropOldest,
}

/// Item delivered to the control thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderMsg {
    Report { raw: String, report: Report },
    /// The link failed or reached EOF; no more items follow.
    Closed(String),
}

pub struct ReaderTask {
    rx: xch::Receiver<ReaderMsg>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderTask {
    pub fn spawn(
        mut reader: Box<dyn LineReader>,
        capacity: usize,
        policy: Backpressure,
        label: String,
    ) -> Self {
        let (tx, rx) = xch::bounded(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        // DropOldest needs its own handle on the queue to evict from.
        let evict = (policy == Backpressure::DropOldest).then(|| rx.clone());

        let handle = std::thread::Builder::new()
            .name(format!("pump-reader-{label}"))
            .spawn(move || {
                let producer = Producer {
                    tx,
                    evict,
                    stop: stop_thread,
                };
                loop {
                    if producer.stopped() {
                        tracing::debug!(port = %label, "reader received stop signal");
                        break;
                    }
                    let msg = match reader.read_line() {
                        Ok(Some(line)) if line.trim().is_empty() => continue,
                        Ok(Some(line)) => {
                            let report = report::parse(&line);
                            ReaderMsg::Report { raw: line, report }
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!(port = %label, error = %e, "serial read failed");
                            producer.deliver(ReaderMsg::Closed(link_failure_text(&*e)));
                            break;
                        }
                    };
                    if !producer.deliver(msg) {
                        break;
                    }
                }
                tracing::trace!(port = %label, "reader thread exiting");
            });

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn reader thread");
                None
            }
        };

        Self { rx, stop, handle }
    }

    /// Everything queued so far, without blocking.
    pub fn drain(&self) -> Vec<ReaderMsg> {
        self.rx.try_iter().collect()
    }

    /// Signal the thread to exit. Does not wait for it.
    ///
    /// The thread notices between reads, so the `LineReader` (and for a
    /// serial link, its port handle) lives until the read in progress
    /// returns, at most one read timeout later.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Queued item count.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.stop();
        // Detach: the thread observes the flag after its current read.
        drop(self.handle.take());
    }
}

struct Producer {
    tx: xch::Sender<ReaderMsg>,
    evict: Option<xch::Receiver<ReaderMsg>>,
    stop: Arc<AtomicBool>,
}

impl Producer {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Queue `msg` according to the policy. Returns false when the thread should exit.
    fn deliver(&self, mut msg: ReaderMsg) -> bool {
        match &self.evict {
            None => loop {
                match self.tx.send_timeout(msg, SEND_SLICE) {
                    Ok(()) => return true,
                    Err(xch::SendTimeoutError::Timeout(back)) => {
                        if self.stopped() {
                            return false;
                        }
                        msg = back;
                    }
                    Err(xch::SendTimeoutError::Disconnected(_)) => return false,
                }
            },
            Some(evict) => loop {
                match self.tx.try_send(msg) {
                    Ok(()) => return true,
                    Err(xch::TrySendError::Full(back)) => {
                        if evict.try_recv().is_ok() {
                            tracing::trace!("reader queue full, dropped oldest item");
                        }
                        msg = back;
                    }
                    Err(xch::TrySendError::Disconnected(_)) => return false,
                }
            },
        }
    }
}
