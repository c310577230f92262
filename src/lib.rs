//! pcopy - file and directory copies with live progress events
//!
//! Both entry points return immediately with a [`ProgressReceiver`] and do the
//! work on a background thread. The receiver yields [`ProgressEvent`]s until
//! the terminal one: `END_FILE`/`ERROR` for a single file, `FINISHED` for a tree.

pub mod args;
pub mod error;
pub mod stats;
pub mod utils;

mod copy;
mod engine;
mod progress;

use std::path::Path;

pub use args::CopyOptions;
pub use engine::CopyEngine;
pub use error::CopyError;
pub use progress::{CancelHandle, ProgressEvent, ProgressReceiver, ProgressState};
pub use stats::Statistics;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Copy one file with default options.
pub fn copy_file<P, Q>(source: P, destination: Q) -> ProgressReceiver
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    CopyEngine::default().copy_file(source, destination)
}

/// Copy a directory tree with default options.
///
/// See [`CopyEngine::copy_recursive`] for the meaning of `cutoff`.
pub fn copy_recursive<P, Q, C>(source_root: P, destination_root: Q, cutoff: C) -> ProgressReceiver
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    C: AsRef<Path>,
{
    CopyEngine::default().copy_recursive(source_root, destination_root, cutoff)
}
