//! Liveness monitor.
//!
//! Owned background thread that periodically warns while no bundle has been
//! produced. The only state shared with the session thread is a set of
//! atomics; `stop()` (or drop) joins the thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::ContractError;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct MonitorShared {
    /// Set once a bundle was delivered; silences the monitor
    activity: AtomicBool,
    stop: AtomicBool,
    /// Bumped by `rearm` so the thread restarts its silence clock
    epoch: AtomicU64,
    warnings: AtomicU64,
}

/// Periodic "no data received" warner
#[derive(Debug)]
pub struct WarningMonitor {
    shared: Arc<MonitorShared>,
    handle: Option<JoinHandle<()>>,
}

impl WarningMonitor {
    /// Spawn the monitor thread.
    ///
    /// # Errors
    /// `Io` if the thread cannot be spawned.
    pub fn start(
        description: String,
        tolerant: bool,
        interval: Duration,
    ) -> Result<Self, ContractError> {
        let shared = Arc::new(MonitorShared::default());
        let thread_shared = Arc::clone(&shared);
        let interval = interval.max(Duration::from_millis(1));

        let handle = thread::Builder::new()
            .name("odom-sync-monitor".to_string())
            .spawn(move || run(&thread_shared, &description, tolerant, interval))?;

        debug!(interval_s = interval.as_secs_f64(), tolerant, "warning monitor started");
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Liveness observed; the monitor stays silent until re-armed
    pub fn notify_activity(&self) {
        self.shared.activity.store(true, Ordering::Release);
    }

    /// Resume warning (after a session reset)
    pub fn rearm(&self) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        self.shared.activity.store(false, Ordering::Release);
    }

    pub fn is_silent(&self) -> bool {
        self.shared.activity.load(Ordering::Acquire)
    }

    /// Warnings emitted so far
    pub fn warning_count(&self) -> u64 {
        self.shared.warnings.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop and join the background thread (idempotent)
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        handle.thread().unpark();
        if handle.join().is_err() {
            warn!("warning monitor thread panicked");
        }
        debug!("warning monitor stopped");
    }
}

impl Drop for WarningMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &MonitorShared, description: &str, tolerant: bool, interval: Duration) {
    let mut next_tick = Instant::now() + interval;
    let mut silent_since = Instant::now();
    let mut seen_epoch = shared.epoch.load(Ordering::Acquire);

    while !shared.stop.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next_tick {
            thread::park_timeout(next_tick - now);
            continue;
        }
        next_tick += interval;

        let epoch = shared.epoch.load(Ordering::Acquire);
        if epoch != seen_epoch {
            seen_epoch = epoch;
            silent_since = now;
        }

        if shared.activity.load(Ordering::Acquire) {
            continue;
        }

        let seconds = now.duration_since(silent_since).as_secs_f64().round();
        warn!("{}", warning_message(seconds, description, tolerant));
        shared.warnings.fetch_add(1, Ordering::AcqRel);
        observability::record_monitor_warning();
    }
}

fn warning_message(seconds: f64, description: &str, tolerant: bool) -> String {
    let sync_note = if tolerant {
        "Approximate synchronization is used: inputs are matched to the closest timestamps."
    } else {
        "Exact synchronization is used: every input must carry the very same timestamp. \
         Enable approx_sync if the inputs are not hardware-synchronized."
    };
    format!(
        "Did not receive data since {seconds} seconds! Make sure the input lines are \
         published and their timestamps are set. {sync_note}\n{description}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Poll `condition` until it holds or a generous deadline passes
    fn eventually(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_warns_until_activity() {
        let mut monitor =
            WarningMonitor::start("expects scan".into(), true, Duration::from_millis(10)).unwrap();

        assert!(eventually(|| monitor.warning_count() >= 1));

        monitor.notify_activity();
        assert!(monitor.is_silent());
        let count = monitor.warning_count();
        thread::sleep(Duration::from_millis(60));
        // At most one tick may have been in flight while notifying
        assert!(monitor.warning_count() <= count + 1);

        monitor.rearm();
        let count = monitor.warning_count();
        assert!(eventually(|| monitor.warning_count() > count));

        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let mut monitor =
            WarningMonitor::start("expects odom".into(), false, Duration::from_secs(60)).unwrap();
        let started = Instant::now();
        monitor.stop();
        monitor.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(monitor.warning_count(), 0);
    }

    #[test]
    fn test_message_mentions_sync_mode() {
        let exact = warning_message(5.0, "lines: scan", false);
        assert!(exact.contains("since 5 seconds"));
        assert!(exact.contains("very same timestamp"));
        assert!(exact.ends_with("lines: scan"));

        let tolerant = warning_message(10.0, "", true);
        assert!(tolerant.contains("Approximate"));
    }
}
