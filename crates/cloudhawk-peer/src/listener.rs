use cloudhawk_frame::{decode_frame, response_name, ResponseKey};
use cloudhawk_transport::NotificationStream;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::signal::UpdateSignal;
use crate::store::{ResponseEntry, ResponseStore};

/// Route one notification into the store.
///
/// Returns the key stored under, or `None` when the notification was
/// dropped. Frames with a wrong checksum are still stored; the mismatch is
/// only logged.
pub fn handle_notification(
    raw: Vec<u8>,
    store: &ResponseStore,
    signal: &UpdateSignal,
) -> Option<ResponseKey> {
    let frame = match decode_frame(raw) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "dropping malformed notification");
            return None;
        }
    };

    if frame.checksum_valid() == Some(false) {
        warn!(frame = %hex::encode(&frame.raw), "notification checksum mismatch");
    }

    let Some(entry) = ResponseEntry::from_frame(&frame) else {
        debug!(frame = %hex::encode(&frame.raw), "notification too short to key");
        return None;
    };

    let key = entry.key;
    debug!(
        key = %key,
        response = response_name(key),
        data = %hex::encode(entry.data()),
        "stored response"
    );
    store.put(entry);
    signal.notify();
    Some(key)
}

/// Background task feeding one link's notifications into the store.
///
/// One listener runs per live link. Dropping it cancels the task.
pub struct NotificationListener {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl NotificationListener {
    /// Start consuming `stream` until it ends or `cancel` fires.
    pub fn spawn(
        stream: NotificationStream,
        store: ResponseStore,
        signal: UpdateSignal,
        cancel: CancellationToken,
    ) -> Self {
        let token = cancel.clone();
        let task = tokio::spawn(run(stream, store, signal, token));
        info!("notification listener started");
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "notification listener task failed");
            }
        }
        info!("notification listener stopped");
    }
}

impl Drop for NotificationListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    mut stream: NotificationStream,
    store: ResponseStore,
    signal: UpdateSignal,
    cancel: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(raw) => raw,
                None => {
                    debug!("notification stream ended");
                    break;
                }
            },
        };
        handle_notification(raw, &store, &signal);
    }
}
