use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Cooperative cancellation shared by the pipeline's worker loops.
///
/// Nothing is ever sent on the channel: dropping the [`StopTrigger`]
/// disconnects it, which every cloned [`StopSignal`] observes. A blocked
/// [`StopSignal::wait`] returns as soon as the trigger fires, so the same
/// signal doubles as an interruptible sleep.
#[derive(Clone, Debug)]
pub struct StopSignal {
    rx: Receiver<()>,
}

/// Owning half of a stop signal. Firing (or dropping) it stops every loop
/// holding a matching [`StopSignal`].
#[derive(Debug)]
pub struct StopTrigger {
    _tx: Sender<()>,
}

impl StopSignal {
    pub fn new() -> (StopTrigger, StopSignal) {
        let (tx, rx) = crossbeam_channel::bounded(0);
        (StopTrigger { _tx: tx }, StopSignal { rx })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for up to `timeout`. Returns `true` when stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

impl StopTrigger {
    pub fn fire(self) {}
}
