//! Single-instance session timers
//!
//! A [`TimerSlot`] holds at most one live timer task. Arming always aborts
//! the previous task first, and every arm hands the new task a token so its
//! callback can tell whether it is still the live instance when it fires.

use std::future::Future;
use tokio::task::JoinHandle;

/// At-most-one-live-instance timer
#[derive(Debug, Default)]
pub struct TimerSlot {
    token: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any live instance and spawn a new one
    ///
    /// `make` receives the token of the new instance.
    pub fn arm<F, Fut>(&mut self, make: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.disarm();
        self.token += 1;
        let token = self.token;
        self.handle = Some(tokio::spawn(make(token)));
        token
    }

    /// Abort the live instance; returns whether one was armed
    pub fn disarm(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                // Tokens of aborted instances must never match again
                self.token += 1;
                true
            }
            None => false,
        }
    }

    /// Detach the instance identified by `token` without aborting it
    ///
    /// Called by a firing timer before it acts, so teardown it triggers does
    /// not abort the task that is running it. Returns false when the token
    /// is no longer current (the timer was re-armed or disarmed).
    pub fn claim(&mut self, token: u64) -> bool {
        if self.token != token || self.handle.is_none() {
            return false;
        }
        self.handle = None;
        true
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.token == token && self.handle.is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
