//! Progress events and the channel that carries them.
//!
//! Every copy runs on a background thread that owns the write end of a
//! rendezvous channel. The caller owns the read end as a [`ProgressReceiver`]
//! and drains it until the terminal event arrives. Because the channel has no
//! buffer, a slow consumer throttles the copy.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::CopyError;

/// Lifecycle state reported by a [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressState {
    /// A file is about to be transferred; `bytes_total` is known
    StartFile,
    /// Chunk progress for the current file
    Copy,
    /// The current file was copied completely
    EndFile,
    /// A batch is over; nothing else will be sent
    Finished,
    /// Something failed; see [`ProgressEvent::error`]
    Error,
}

/// One snapshot of a copy at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Source file being processed; empty for [`ProgressState::Finished`]
    pub current_source: PathBuf,
    /// Destination of `current_source`
    pub current_target: PathBuf,
    pub state: ProgressState,
    /// Size of the current source file
    pub bytes_total: u64,
    /// Bytes transferred so far for the current file
    pub bytes_copied: u64,
    /// Present only when `state` is [`ProgressState::Error`]
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<Arc<CopyError>>,
}

fn serialize_error<S>(error: &Option<Arc<CopyError>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ProgressEvent {
    pub(crate) fn finished() -> Self {
        Self {
            current_source: PathBuf::new(),
            current_target: PathBuf::new(),
            state: ProgressState::Finished,
            bytes_total: 0,
            bytes_copied: 0,
            error: None,
        }
    }

    /// An error not tied to a file transfer (root or directory failures).
    pub(crate) fn failure(source: PathBuf, target: PathBuf, error: CopyError) -> Self {
        Self {
            current_source: source,
            current_target: target,
            state: ProgressState::Error,
            bytes_total: 0,
            bytes_copied: 0,
            error: Some(Arc::new(error)),
        }
    }

    /// True for `END_FILE` and `ERROR`, the events after which a single-file
    /// copy sends nothing more.
    pub fn is_terminal_for_file(&self) -> bool {
        matches!(self.state, ProgressState::EndFile | ProgressState::Error)
    }

    /// Current file progress as a percentage (0-100)
    pub fn file_percentage(&self) -> f32 {
        if self.bytes_total == 0 {
            if self.state == ProgressState::EndFile {
                100.0
            } else {
                0.0
            }
        } else {
            (self.bytes_copied as f32 / self.bytes_total as f32) * 100.0
        }
    }
}

/// Shared flag used to ask a running copy to stop.
///
/// Checked before each file and after each chunk.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every copy sharing this handle
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the handle can be reused
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// What kind of operation feeds a channel, which decides its terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamKind {
    File,
    Batch,
}

/// Write end of a progress channel, owned by the background worker.
pub(crate) struct ProgressSender {
    tx: flume::Sender<ProgressEvent>,
    cancel: CancelHandle,
}

impl ProgressSender {
    /// Blocks until the consumer takes the event.
    pub(crate) fn send(&self, event: ProgressEvent) -> Result<(), CopyError> {
        self.tx.send(event).map_err(|_| CopyError::Disconnected)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Read end of a progress channel.
///
/// Iterating yields events up to and including the terminal one
/// (`END_FILE`/`ERROR` for a single file, `FINISHED` for a batch) and then stops,
/// even though the channel may still be technically open.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: flume::Receiver<ProgressEvent>,
    kind: StreamKind,
    done: bool,
}

pub(crate) fn channel(kind: StreamKind, cancel: CancelHandle) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = flume::bounded(0);
    (
        ProgressSender { tx, cancel },
        ProgressReceiver {
            rx,
            kind,
            done: false,
        },
    )
}

impl ProgressReceiver {
    /// Whether `event` ends this stream.
    pub fn is_terminal(&self, event: &ProgressEvent) -> bool {
        match self.kind {
            StreamKind::File => event.is_terminal_for_file(),
            StreamKind::Batch => event.state == ProgressState::Finished,
        }
    }

    /// Block until the next event. `None` once the worker has gone away.
    pub fn recv(&self) -> Option<ProgressEvent> {
        self.rx.recv().ok()
    }

    /// Block for at most `timeout`. `None` if nothing arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ProgressEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Await the next event from async code.
    pub async fn recv_async(&self) -> Option<ProgressEvent> {
        self.rx.recv_async().await.ok()
    }

    /// Collect every event up to and including the terminal one.
    pub fn drain(self) -> Vec<ProgressEvent> {
        self.collect()
    }
}

impl Iterator for ProgressReceiver {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let event = self.recv()?;
        if self.is_terminal(&event) {
            self.done = true;
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn event(state: ProgressState) -> ProgressEvent {
        ProgressEvent {
            state,
            ..ProgressEvent::finished()
        }
    }

    #[test]
    fn file_stream_stops_after_end_file() {
        let (tx, rx) = channel(StreamKind::File, CancelHandle::new());
        let worker = thread::spawn(move || {
            tx.send(event(ProgressState::StartFile)).unwrap();
            tx.send(event(ProgressState::EndFile)).unwrap();
            // The consumer stops reading, so this blocks until the receiver drops.
            tx.send(event(ProgressState::Copy))
        });

        let states: Vec<_> = rx.map(|e| e.state).collect();
        assert_eq!(states, vec![ProgressState::StartFile, ProgressState::EndFile]);
        assert!(matches!(worker.join().unwrap(), Err(CopyError::Disconnected)));
    }

    #[test]
    fn batch_stream_only_ends_on_finished() {
        let (tx, rx) = channel(StreamKind::Batch, CancelHandle::new());
        thread::spawn(move || {
            for state in [
                ProgressState::StartFile,
                ProgressState::EndFile,
                ProgressState::Error,
                ProgressState::Finished,
            ] {
                tx.send(event(state)).unwrap();
            }
        });

        let states: Vec<_> = rx.drain().into_iter().map(|e| e.state).collect();
        assert_eq!(states.len(), 4);
        assert_eq!(states.last(), Some(&ProgressState::Finished));
    }

    #[test]
    fn sender_blocks_until_event_is_taken() {
        let (tx, rx) = channel(StreamKind::File, CancelHandle::new());
        let (done_tx, done_rx) = flume::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(event(ProgressState::StartFile));
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(rx.recv().is_some());
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn cancel_handle_is_shared_between_clones() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn percentage_handles_empty_files() {
        let mut e = event(ProgressState::StartFile);
        assert_eq!(e.file_percentage(), 0.0);
        e.state = ProgressState::EndFile;
        assert_eq!(e.file_percentage(), 100.0);
        e.bytes_total = 200;
        e.bytes_copied = 50;
        assert_eq!(e.file_percentage(), 25.0);
    }

    #[test]
    fn events_serialize_with_error_text() {
        let e = ProgressEvent::failure(
            PathBuf::from("a"),
            PathBuf::from("b"),
            CopyError::Cancelled,
        );
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["state"], "ERROR");
        assert_eq!(json["error"], "copy cancelled");
        assert!(serde_json::to_value(ProgressEvent::finished()).unwrap()["error"].is_null());
    }
}
