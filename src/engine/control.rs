//! Run control: pause, resume and cancel for a running operation.
//!
//! A `RunControl` is a cheap cloneable handle. The dispatch loop and every
//! worker call [`RunControl::checkpoint`] at their suspension points; while
//! paused they block on a condition variable (no polling) until resumed or
//! cancelled.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, info};

/// Observable lifecycle of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Running,
    Paused,
    Cancelling,
    Completed,
    Failed,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::Idle => "idle",
            OperationState::Running => "running",
            OperationState::Paused => "paused",
            OperationState::Cancelling => "cancelling",
            OperationState::Completed => "completed",
            OperationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a routine should do after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Proceed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
    Finished { ok: bool },
}

#[derive(Debug)]
struct Flags {
    phase: Phase,
    paused: bool,
    cancelled: bool,
}

#[derive(Debug)]
struct Shared {
    flags: Mutex<Flags>,
    gate: Condvar,
}

#[derive(Debug, Clone)]
pub struct RunControl {
    shared: Arc<Shared>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                flags: Mutex::new(Flags {
                    phase: Phase::Idle,
                    paused: false,
                    cancelled: false,
                }),
                gate: Condvar::new(),
            }),
        }
    }

    // A poisoned flag mutex only means another thread panicked while holding
    // it; the flags themselves are always consistent.
    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.shared.flags.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Ask routines to stop at their next checkpoint. No effect after completion.
    pub fn pause(&self) {
        let mut f = self.flags();
        if !matches!(f.phase, Phase::Finished { .. }) && !f.cancelled {
            f.paused = true;
            info!("Pause requested");
        }
    }

    pub fn resume(&self) {
        let mut f = self.flags();
        if f.paused {
            f.paused = false;
            info!("Resumed");
        }
        self.shared.gate.notify_all();
    }

    /// Cancel the run. Paused routines wake up and observe the cancellation.
    pub fn cancel(&self) {
        let mut f = self.flags();
        if !matches!(f.phase, Phase::Finished { .. }) && !f.cancelled {
            f.cancelled = true;
            f.paused = false;
            info!("Cancellation requested");
        }
        self.shared.gate.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags().cancelled
    }

    pub fn state(&self) -> OperationState {
        let f = self.flags();
        match f.phase {
            Phase::Finished { ok: true } => OperationState::Completed,
            Phase::Finished { ok: false } => OperationState::Failed,
            _ if f.cancelled => OperationState::Cancelling,
            Phase::Idle => OperationState::Idle,
            Phase::Active if f.paused => OperationState::Paused,
            Phase::Active => OperationState::Running,
        }
    }

    /// Block while paused; report whether the caller should carry on.
    pub fn checkpoint(&self) -> Checkpoint {
        let mut f = self.flags();
        if f.paused {
            debug!("paused at checkpoint");
        }
        while f.paused && !f.cancelled {
            f = self.shared.gate.wait(f).unwrap_or_else(|p| p.into_inner());
        }
        if f.cancelled {
            Checkpoint::Cancelled
        } else {
            Checkpoint::Proceed
        }
    }

    pub(crate) fn start(&self) {
        let mut f = self.flags();
        if f.phase == Phase::Idle {
            f.phase = Phase::Active;
        }
    }

    pub(crate) fn finish(&self, ok: bool) {
        let mut f = self.flags();
        f.phase = Phase::Finished { ok };
        f.paused = false;
        self.shared.gate.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn state_follows_lifecycle() {
        let c = RunControl::new();
        assert_eq!(c.state(), OperationState::Idle);
        c.start();
        assert_eq!(c.state(), OperationState::Running);
        c.pause();
        assert_eq!(c.state(), OperationState::Paused);
        c.resume();
        assert_eq!(c.state(), OperationState::Running);
        c.cancel();
        assert_eq!(c.state(), OperationState::Cancelling);
        c.finish(true);
        assert_eq!(c.state(), OperationState::Completed);
        // Late requests are no-ops.
        c.pause();
        assert_eq!(c.state(), OperationState::Completed);
    }

    #[test]
    fn paused_checkpoint_blocks_until_resume() {
        let c = RunControl::new();
        c.start();
        c.pause();
        let (tx, rx) = mpsc::channel();
        let worker = {
            let c = c.clone();
            thread::spawn(move || tx.send(c.checkpoint()).unwrap())
        };
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        c.resume();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Checkpoint::Proceed);
        worker.join().unwrap();
    }

    #[test]
    fn cancel_wakes_paused_routines() {
        let c = RunControl::new();
        c.start();
        c.pause();
        let waiter = {
            let c = c.clone();
            thread::spawn(move || c.checkpoint())
        };
        thread::sleep(Duration::from_millis(50));
        c.cancel();
        assert_eq!(waiter.join().unwrap(), Checkpoint::Cancelled);
    }
}
