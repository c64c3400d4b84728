//! Deadline timer sized to the job: per-line budget times line count plus a
//! fixed overhead. Every suspension point waits through the watchdog, so an
//! elapsed deadline short-circuits the job instead of leaving it hanging.
//! （依作業規模計算期限的看門狗：每行預算乘上行數再加固定緩衝，所有等待點都透過它進行。）

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::job::PrintOptions;

/// Fixed scheduling overhead added on top of the per-line budget.
pub const JOB_OVERHEAD: Duration = Duration::from_millis(200);

/// Generic cause reported when the deadline elapses with no recorded error.
pub const TIMED_OUT: &str = "TimedOut";

/// Why a watchdog-mediated wait ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The job deadline elapsed.
    Expired,
    /// The sending side went away; no value will ever arrive.
    Disconnected,
}

#[derive(Debug)]
pub struct Watchdog {
    deadline: Option<Instant>,
    last_error: Option<String>,
}

impl Watchdog {
    /// Arms a deadline of `per_line × line_count + JOB_OVERHEAD` from now.
    pub fn arm(per_line: Duration, line_count: usize) -> Self {
        let budget = per_line * line_count as u32 + JOB_OVERHEAD;
        Self {
            deadline: Some(Instant::now() + budget),
            last_error: None,
        }
    }

    /// A watchdog that never fires; waits block until a value or disconnect.
    pub fn unarmed() -> Self {
        Self {
            deadline: None,
            last_error: None,
        }
    }

    /// The job-level arming rule: a watchdog is armed whenever a
    /// human-visible or printer-bound outcome is expected, i.e. unless the
    /// job is both previewing and silent.
    pub fn for_job(options: &PrintOptions, line_count: usize) -> Self {
        if options.preview && options.silent {
            Self::unarmed()
        } else {
            Self::arm(Duration::from_millis(options.time_out_per_line), line_count)
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Budget left before the deadline; `None` when unarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Blocks on `source` for at most the remaining budget.
    pub fn wait_on<T>(&self, source: &Receiver<T>) -> Result<T, WaitError> {
        match self.deadline {
            None => source.recv().map_err(|_| WaitError::Disconnected),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(WaitError::Expired);
                }
                match source.recv_timeout(deadline - now) {
                    Ok(value) => Ok(value),
                    Err(RecvTimeoutError::Timeout) => Err(WaitError::Expired),
                    Err(RecvTimeoutError::Disconnected) => Err(WaitError::Disconnected),
                }
            }
        }
    }

    /// Remembers the most recent rendering/print error so a later timeout
    /// can report it as its cause.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Cause carried by a timeout failure: the last recorded error if one
    /// exists, otherwise the generic marker.
    pub fn timeout_cause(&self) -> String {
        self.last_error
            .clone()
            .unwrap_or_else(|| TIMED_OUT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn deadline_arithmetic() {
        let options = PrintOptions::for_printer("X").with_time_out_per_line(50);
        let watchdog = Watchdog::for_job(&options, 2);
        let remaining = watchdog.remaining().expect("armed");
        // 50ms × 2 lines + 200ms overhead.
        assert!(remaining <= Duration::from_millis(300));
        assert!(remaining > Duration::from_millis(250));
    }

    #[test]
    fn silent_preview_is_exempt() {
        let options = PrintOptions::for_preview().with_silent(true);
        assert!(!Watchdog::for_job(&options, 3).is_armed());
        // A visible preview still gets a deadline.
        assert!(Watchdog::for_job(&PrintOptions::for_preview(), 3).is_armed());
    }

    #[test]
    fn expires_when_no_value_arrives() {
        let watchdog = Watchdog::arm(Duration::from_millis(10), 1);
        let (_tx, rx) = mpsc::channel::<()>();
        let started = Instant::now();
        assert_eq!(watchdog.wait_on(&rx), Err(WaitError::Expired));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn unarmed_wait_blocks_until_value() {
        let watchdog = Watchdog::unarmed();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(7_u32).unwrap();
        });
        assert_eq!(watchdog.wait_on(&rx), Ok(7));
    }

    #[test]
    fn timeout_cause_prefers_last_error() {
        let mut watchdog = Watchdog::arm(Duration::from_millis(1), 0);
        assert_eq!(watchdog.timeout_cause(), TIMED_OUT);
        watchdog.record_error("printer jammed");
        assert_eq!(watchdog.timeout_cause(), "printer jammed");
        assert_eq!(watchdog.last_error(), Some("printer jammed"));
    }
}
