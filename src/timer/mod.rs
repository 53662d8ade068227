//! # Periodic Sync Scheduling
//!
//! The original discipline was a SIGALRM firing every few seconds with
//! the flush region blocking the signal. Here the recurring tick is an
//! explicit, cancellable task on its own thread; callers get the same
//! atomicity by serializing the tick against user-driven calls, e.g.
//! with an `Arc<Mutex<RecoverySession>>` captured by the callback.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A cancellable recurring task. Cancelled on drop.
pub struct SyncTimer {
    cancel_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl SyncTimer {
    /// Start ticking every `period`, invoking `tick` from a dedicated
    /// thread. The first tick fires one full period after the call.
    pub fn start<F>(period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("recovery-sync".to_string())
            .spawn(move || loop {
                match cancel_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    // Cancelled, or the timer handle was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            cancel_tx,
            handle: Some(handle),
        })
    }

    /// Stop the timer and wait for the tick thread to exit.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.cancel_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SyncTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
