use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one recursive copy.
#[derive(Debug, Default)]
pub struct Statistics {
    pub dirs_created: AtomicUsize,
    pub dirs_failed: AtomicUsize,
    pub files_copied: AtomicUsize,
    pub bytes_copied: AtomicU64,
    pub files_failed: AtomicUsize,
    pub files_skipped: AtomicUsize,
    pub walk_errors: AtomicUsize,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir_created(&self) {
        self.dirs_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_dir_failed(&self) {
        self.dirs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_file_copied(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_walk_error(&self) {
        self.walk_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total failures of any kind.
    pub fn error_count(&self) -> usize {
        self.dirs_failed.load(Ordering::Relaxed)
            + self.files_failed.load(Ordering::Relaxed)
            + self.walk_errors.load(Ordering::Relaxed)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={} bytes={} skipped={} failed={} dirs={} dir_errors={} walk_errors={}",
            self.files_copied.load(Ordering::Relaxed),
            self.bytes_copied.load(Ordering::Relaxed),
            self.files_skipped.load(Ordering::Relaxed),
            self.files_failed.load(Ordering::Relaxed),
            self.dirs_created.load(Ordering::Relaxed),
            self.dirs_failed.load(Ordering::Relaxed),
            self.walk_errors.load(Ordering::Relaxed)
        )
    }
}
