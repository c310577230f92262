//! Failure taxonomy carried inside `ERROR` progress events.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while copying.
///
/// Entry points never return these directly; they travel to the consumer
/// inside [`ProgressEvent::error`](crate::ProgressEvent::error).
#[derive(Debug, Error)]
pub enum CopyError {
    /// Source missing or unreadable.
    #[error("cannot access source {}: {source}", .path.display())]
    SourceAccess { path: PathBuf, source: io::Error },

    /// A directory was handed to the single-file copy.
    #[error("cannot copy directory {} as a file", .path.display())]
    SourceIsDirectory { path: PathBuf },

    /// FIFOs, sockets and device nodes are never read.
    #[error("{} is not a regular file", .path.display())]
    SourceNotRegular { path: PathBuf },

    /// Destination could not be created or opened for writing.
    #[error("cannot open destination {}: {source}", .path.display())]
    DestinationAccess { path: PathBuf, source: io::Error },

    /// Read or write failed mid-transfer.
    #[error(
        "transfer {} -> {} failed: {source}",
        .source_path.display(),
        .destination_path.display()
    )]
    Transfer {
        source_path: PathBuf,
        destination_path: PathBuf,
        source: io::Error,
    },

    /// An intermediate destination directory could not be created.
    #[error("cannot create directory {}: {source}", .path.display())]
    DirectoryCreation { path: PathBuf, source: io::Error },

    /// The batch source root could not be resolved.
    #[error("cannot resolve source root {}: {source}", .path.display())]
    RootResolution { path: PathBuf, source: io::Error },

    #[error("source root {} is not a directory", .path.display())]
    RootNotDirectory { path: PathBuf },

    /// Destination root lies inside the tree being copied.
    #[error(
        "destination {} is inside source {}",
        .destination_root.display(),
        .source_root.display()
    )]
    DestinationInsideSource {
        source_root: PathBuf,
        destination_root: PathBuf,
    },

    #[error("cutoff prefix {} must be relative", .cutoff.display())]
    InvalidCutoff { cutoff: PathBuf },

    #[error("copy cancelled")]
    Cancelled,

    /// The consumer dropped its receiver. Never emitted as an event.
    #[error("progress receiver dropped")]
    Disconnected,
}

impl CopyError {
    /// Returns the underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::SourceAccess { source, .. }
            | Self::DestinationAccess { source, .. }
            | Self::Transfer { source, .. }
            | Self::DirectoryCreation { source, .. }
            | Self::RootResolution { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path_and_cause() {
        let err = CopyError::SourceAccess {
            path: PathBuf::from("/nope/file.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        let text = err.to_string();
        assert!(text.contains("/nope/file.txt"));
        assert!(text.contains("gone"));
        assert_eq!(err.io_error().map(io::Error::kind), Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn non_io_variants_have_no_io_error() {
        assert!(CopyError::Cancelled.io_error().is_none());
        assert!(
            CopyError::SourceIsDirectory {
                path: PathBuf::from("dir")
            }
            .io_error()
            .is_none()
        );
    }
}
