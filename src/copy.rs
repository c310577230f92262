use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::args::CopyOptions;
use crate::error::CopyError;
use crate::progress::{ProgressEvent, ProgressSender, ProgressState};
use crate::stats::Statistics;
use crate::utils::{copy_with_progress, ensure_dir, normalize_lexically, remap_destination};

/// How a single-file copy ended, once its terminal event was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Copied(u64),
    Failed,
}

/// Per-file counters; every event is a fresh snapshot of these.
struct FileProgress {
    source: PathBuf,
    target: PathBuf,
    bytes_total: u64,
    bytes_copied: u64,
}

impl FileProgress {
    fn new(source: &Path, target: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            bytes_total: 0,
            bytes_copied: 0,
        }
    }

    fn event(&self, state: ProgressState) -> ProgressEvent {
        ProgressEvent {
            current_source: self.source.clone(),
            current_target: self.target.clone(),
            state,
            bytes_total: self.bytes_total,
            bytes_copied: self.bytes_copied,
            error: None,
        }
    }

    fn end_file(&mut self) -> ProgressEvent {
        self.bytes_copied = self.bytes_total;
        self.event(ProgressState::EndFile)
    }

    fn error(&self, error: CopyError) -> ProgressEvent {
        ProgressEvent {
            error: Some(Arc::new(error)),
            ..self.event(ProgressState::Error)
        }
    }
}

/// Copy one file, reporting every step on `tx`.
///
/// Failures are delivered as an `ERROR` event and reported as
/// [`FileOutcome::Failed`]. The only error returned is
/// [`CopyError::Disconnected`], when nobody is listening anymore.
pub(crate) fn copy_file_job(
    source: &Path,
    target: &Path,
    options: &CopyOptions,
    tx: &ProgressSender,
) -> Result<FileOutcome, CopyError> {
    let mut progress = FileProgress::new(source, target);

    // Both file handles are closed by the time `transfer` returns.
    match transfer(&mut progress, options, tx) {
        Ok(bytes) => {
            debug!(
                source = %source.display(),
                target = %target.display(),
                bytes,
                "File copied"
            );
            tx.send(progress.end_file())?;
            Ok(FileOutcome::Copied(bytes))
        }
        Err(CopyError::Disconnected) => Err(CopyError::Disconnected),
        Err(err) => {
            warn!(
                source = %source.display(),
                target = %target.display(),
                error = %err,
                "File copy failed"
            );
            tx.send(progress.error(err))?;
            Ok(FileOutcome::Failed)
        }
    }
}

fn transfer(
    progress: &mut FileProgress,
    options: &CopyOptions,
    tx: &ProgressSender,
) -> Result<u64, CopyError> {
    if tx.is_cancelled() {
        return Err(CopyError::Cancelled);
    }

    let metadata = fs::metadata(&progress.source).map_err(|source| CopyError::SourceAccess {
        path: progress.source.clone(),
        source,
    })?;
    if metadata.is_dir() {
        return Err(CopyError::SourceIsDirectory {
            path: progress.source.clone(),
        });
    }
    // Opening a FIFO for reading would block until a writer shows up.
    if !metadata.is_file() {
        return Err(CopyError::SourceNotRegular {
            path: progress.source.clone(),
        });
    }

    let mut reader = File::open(&progress.source).map_err(|source| CopyError::SourceAccess {
        path: progress.source.clone(),
        source,
    })?;
    let mut writer = open_destination(&progress.source, &progress.target, &metadata).map_err(
        |source| CopyError::DestinationAccess {
            path: progress.target.clone(),
            source,
        },
    )?;

    progress.bytes_total = metadata.len();
    tx.send(progress.event(ProgressState::StartFile))?;

    let mut stop_reason = None;
    let result = copy_with_progress(
        &mut reader,
        &mut writer,
        options.effective_buffer_size(),
        |bytes| {
            // A source that grows mid-copy must not push past the size reported at start.
            progress.bytes_copied = bytes.min(progress.bytes_total);
            if let Err(err) = tx.send(progress.event(ProgressState::Copy)) {
                stop_reason = Some(err);
                return ControlFlow::Break(());
            }
            if tx.is_cancelled() {
                stop_reason = Some(CopyError::Cancelled);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        },
    );

    result.map_err(|source| {
        stop_reason.unwrap_or_else(|| CopyError::Transfer {
            source_path: progress.source.clone(),
            destination_path: progress.target.clone(),
            source,
        })
    })
}

/// Create or truncate `target`, carrying over the source's permission bits.
fn open_destination(source: &Path, target: &Path, metadata: &Metadata) -> io::Result<File> {
    if is_same_file(source, target) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "source and destination are the same file",
        ));
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(metadata.permissions().mode() & 0o7777);
    }
    #[cfg(not(unix))]
    let _ = metadata;

    options.open(target)
}

fn is_same_file(source: &Path, target: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(source), Ok(target)) => source == target,
        _ => false,
    }
}

/// Absolute source root and the prefix stripped from every file below it.
#[derive(Debug)]
struct ResolvedRoot {
    absolute: PathBuf,
    cut_root: PathBuf,
}

fn resolve_root(
    source_root: &Path,
    destination_root: &Path,
    cutoff: &Path,
) -> Result<ResolvedRoot, CopyError> {
    if cutoff.has_root() {
        return Err(CopyError::InvalidCutoff {
            cutoff: cutoff.to_path_buf(),
        });
    }

    let absolute = std::path::absolute(source_root).map_err(|source| CopyError::RootResolution {
        path: source_root.to_path_buf(),
        source,
    })?;
    let metadata = fs::metadata(&absolute).map_err(|source| CopyError::RootResolution {
        path: absolute.clone(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(CopyError::RootNotDirectory { path: absolute });
    }

    // Copying into the tree being walked would keep feeding the walk.
    if let Ok(destination) = std::path::absolute(destination_root) {
        if normalize_lexically(&destination).starts_with(normalize_lexically(&absolute)) {
            return Err(CopyError::DestinationInsideSource {
                source_root: absolute,
                destination_root: destination,
            });
        }
    }

    let cut_root = absolute.join(cutoff);
    Ok(ResolvedRoot { absolute, cut_root })
}

/// Regular files and links to them. Dangling links pass so the copy reports them.
fn is_regular_file(entry: &DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    if entry.path_is_symlink() {
        return fs::metadata(entry.path()).map_or(true, |m| m.is_file());
    }
    false
}

/// Copy every file below `source_root` into `destination_root`, then send `FINISHED`.
///
/// Files are copied one after the other on the calling thread. Root failures
/// are reported as a single `ERROR` and still followed by `FINISHED`.
pub(crate) fn copy_tree_job(
    source_root: &Path,
    destination_root: &Path,
    cutoff: &Path,
    options: &CopyOptions,
    tx: &ProgressSender,
) -> Result<(), CopyError> {
    let stats = Statistics::new();
    info!(
        source = %source_root.display(),
        destination = %destination_root.display(),
        cutoff = %cutoff.display(),
        options = %options.to_string_flags(),
        "Starting tree copy"
    );

    match resolve_root(source_root, destination_root, cutoff) {
        Ok(root) => walk_tree(&root, destination_root, options, tx, &stats)?,
        Err(err) => {
            warn!(source = %source_root.display(), error = %err, "Cannot start tree copy");
            stats.add_walk_error();
            tx.send(ProgressEvent::failure(
                source_root.to_path_buf(),
                destination_root.to_path_buf(),
                err,
            ))?;
        }
    }

    info!(%stats, "Tree copy finished");
    tx.send(ProgressEvent::finished())
}

fn walk_tree(
    root: &ResolvedRoot,
    destination_root: &Path,
    options: &CopyOptions,
    tx: &ProgressSender,
    stats: &Statistics,
) -> Result<(), CopyError> {
    let walker = WalkDir::new(&root.absolute)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name();

    for entry in walker {
        if tx.is_cancelled() {
            info!(source = %root.absolute.display(), "Tree copy cancelled");
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                stats.add_walk_error();
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.absolute.clone());
                warn!(path = %path.display(), error = %err, "Cannot read entry");
                let err = CopyError::SourceAccess {
                    path: path.clone(),
                    source: io::Error::from(err),
                };
                tx.send(ProgressEvent::failure(path, PathBuf::new(), err))?;
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }
        if !is_regular_file(&entry) {
            debug!(path = %entry.path().display(), "Skipping non-regular entry");
            stats.add_file_skipped();
            continue;
        }
        if !options.matches(&entry.file_name().to_string_lossy()) {
            stats.add_file_skipped();
            continue;
        }

        let source = entry.path();
        let target = remap_destination(source, &root.cut_root, &root.absolute, destination_root);

        if let Some(parent) = target.parent() {
            match ensure_dir(parent) {
                Ok(true) => {
                    debug!(path = %parent.display(), "Created directory");
                    stats.add_dir_created();
                }
                Ok(false) => {}
                Err(source_err) => {
                    warn!(path = %parent.display(), error = %source_err, "Cannot create directory");
                    stats.add_dir_failed();
                    let err = CopyError::DirectoryCreation {
                        path: parent.to_path_buf(),
                        source: source_err,
                    };
                    tx.send(ProgressEvent::failure(source.to_path_buf(), target.clone(), err))?;
                    continue;
                }
            }
        }

        match copy_file_job(source, &target, options, tx)? {
            FileOutcome::Copied(bytes) => stats.add_file_copied(bytes),
            FileOutcome::Failed => stats.add_file_failed(),
        }
    }

    Ok(())
}
