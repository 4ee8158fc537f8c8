//! One-shot readiness signal handed to run handlers

use tokio::sync::oneshot;

/// Signals that a run handler's operation has started or attached
///
/// A run handler receives the signal by value and fires it with
/// [`notify`](Self::notify) once its operation is underway, e.g. a
/// long-lived resource is now listening. Firing consumes the signal, so
/// it can happen at most once. The runner resolves the surrounding
/// `run` call only after the signal has fired and the handler future
/// has settled; dropping the signal without firing leaves the call
/// pending forever, so hosts that cannot trust a module should wrap
/// `run` in their own timeout.
#[derive(Debug)]
pub struct ReadySignal {
    tx: oneshot::Sender<()>,
}

impl ReadySignal {
    /// Create a signal and the receiving half the runner waits on
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Mark the operation as started/attached
    pub fn notify(self) {
        // The receiver disappears only when the host dropped the whole
        // run call; nothing left to signal then.
        let _ = self.tx.send(());
    }
}
