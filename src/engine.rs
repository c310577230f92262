use std::path::Path;
use std::thread;

use tracing::{debug, error};

use crate::args::CopyOptions;
use crate::copy::{copy_file_job, copy_tree_job};
use crate::error::CopyError;
use crate::progress::{self, CancelHandle, ProgressReceiver, StreamKind};

/// Starts copies on background threads and hands back their progress streams.
///
/// Every call spawns one worker thread that owns the write end of a fresh
/// channel. All copies started from the same engine share one [`CancelHandle`].
#[derive(Debug, Clone, Default)]
pub struct CopyEngine {
    options: CopyOptions,
    cancel: CancelHandle,
}

impl CopyEngine {
    pub fn new(options: CopyOptions) -> Self {
        Self {
            options,
            cancel: CancelHandle::new(),
        }
    }

    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Get a handle to request cancellation
    ///
    /// The flag is shared by every copy this engine has started or will start:
    /// `cancel()` stops all of them, and until [`CancelHandle::reset`] is called
    /// each new copy fails immediately with `ERROR(Cancelled)`.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Copy a single regular file.
    ///
    /// The stream ends with `END_FILE` on success or `ERROR` on failure.
    pub fn copy_file<P, Q>(&self, source: P, destination: Q) -> ProgressReceiver
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let (tx, rx) = progress::channel(StreamKind::File, self.cancel.clone());
        let source = source.as_ref().to_path_buf();
        let destination = destination.as_ref().to_path_buf();
        let options = self.options.clone();

        self.spawn("pcopy-file", move || {
            copy_file_job(&source, &destination, &options, &tx).map(|_| ())
        });
        rx
    }

    /// Copy every file below `source_root` into `destination_root`.
    ///
    /// `cutoff` is a relative path below `source_root`; the part of each file's
    /// path up to and including it is dropped when re-rooting the file under
    /// `destination_root`. The stream always ends with `FINISHED`.
    pub fn copy_recursive<P, Q, C>(
        &self,
        source_root: P,
        destination_root: Q,
        cutoff: C,
    ) -> ProgressReceiver
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        C: AsRef<Path>,
    {
        let (tx, rx) = progress::channel(StreamKind::Batch, self.cancel.clone());
        let source_root = source_root.as_ref().to_path_buf();
        let destination_root = destination_root.as_ref().to_path_buf();
        let cutoff = cutoff.as_ref().to_path_buf();
        let options = self.options.clone();

        self.spawn("pcopy-tree", move || {
            copy_tree_job(&source_root, &destination_root, &cutoff, &options, &tx)
        });
        rx
    }

    fn spawn<F>(&self, name: &str, job: F)
    where
        F: FnOnce() -> Result<(), CopyError> + Send + 'static,
    {
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            if let Err(err) = job() {
                debug!(error = %err, "Copy worker stopped early");
            }
        });

        // The job, and with it the sender, is dropped here; the receiver then
        // reports a closed stream instead of hanging.
        if let Err(err) = spawned {
            error!(error = %err, "Failed to spawn copy worker");
        }
    }
}
