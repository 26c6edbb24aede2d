//! Private per-worker wake signal.

use std::sync::{Condvar, Mutex, PoisonError};

/// Binary wait/notify primitive scoped to a single worker thread.
///
/// Strict 1:1 producer-to-consumer: one thread waits, whoever cleared the
/// worker's idle flag raises. A raise that happens before the wait is
/// latched, never lost.
#[derive(Debug, Default)]
pub(crate) struct WakeSignal {
    raised: Mutex<bool>,
    cvar: Condvar,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until the signal is raised, then consumes it.
    pub(crate) fn wait(&self) {
        let mut raised = self
            .raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*raised {
            raised = self
                .cvar
                .wait(raised)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *raised = false;
    }

    /// Raises the signal, releasing the waiter (now or on its next wait).
    pub(crate) fn raise(&self) {
        let mut raised = self
            .raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *raised = true;
        self.cvar.notify_one();
    }
}
