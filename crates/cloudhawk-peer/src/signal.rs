use std::sync::Arc;

use tokio::sync::watch;

/// Update-available hint shared by the listener and the connection manager.
///
/// Carries no payload. Bursts coalesce: a receiver that falls behind sees
/// one wake-up for many updates, so consumers re-read the snapshot instead
/// of counting events.
#[derive(Clone)]
pub struct UpdateSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl UpdateSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Wake every receiver.
    pub fn notify(&self) {
        self.tx
            .send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Number of updates fired so far.
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> UpdateReceiver {
        UpdateReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for UpdateSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdateSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSignal")
            .field("generation", &self.generation())
            .finish()
    }
}

/// Receiving half of [`UpdateSignal`].
#[derive(Debug, Clone)]
pub struct UpdateReceiver {
    rx: watch::Receiver<u64>,
}

impl UpdateReceiver {
    /// Wait for the next update. Returns `false` once the signal is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Whether an update arrived since the last `changed`.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
