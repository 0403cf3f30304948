//! Binary signal primitive shared between the worker thread, the GPIO edge
//! callback and any caller driving the calibration handoff.
//!
//! A latched boolean with a bounded wait, the same shape as a
//! cross-thread event flag. The daemon's own shutdown flag is one; each channel's
//! [`crate::measurement::calibrator::Calibrator`] holds two more for its
//! request/response handoff.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A latched boolean flag with a condition-variable-backed bounded wait.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Signal {
    /// Create a new, initially-clear signal.
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Latch the signal and wake any waiters.
    pub fn set(&self) {
        let (lock, cvar) = &*self.inner;
        let mut flag = lock.lock().unwrap();
        *flag = true;
        cvar.notify_all();
    }

    /// Clear the signal.
    pub fn clear(&self) {
        let (lock, _) = &*self.inner;
        let mut flag = lock.lock().unwrap();
        *flag = false;
    }

    /// Current state without waiting.
    pub fn is_set(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap()
    }

    /// Block until set or `timeout` elapses. Returns `true` if the signal
    /// was observed set, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let flag = lock.lock().unwrap();
        if *flag {
            return true;
        }
        let (flag, result) = cvar.wait_timeout_while(flag, timeout, |f| !*f).unwrap();
        let _ = result;
        *flag
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn set_then_wait_returns_immediately() {
        let s = Signal::new();
        s.set();
        assert!(s.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn wait_times_out_when_never_set() {
        let s = Signal::new();
        assert!(!s.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn clear_resets_state() {
        let s = Signal::new();
        s.set();
        s.clear();
        assert!(!s.is_set());
    }

    #[test]
    fn set_wakes_a_blocked_waiter() {
        let s = Signal::new();
        let s2 = s.clone();
        let handle = thread::spawn(move || s2.wait_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        s.set();
        assert!(handle.join().unwrap());
    }
}
