use std::fs;
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;

/// Copy everything from `reader` to `writer`, calling `on_chunk` with the
/// cumulative byte count after each chunk is written.
///
/// Returning [`ControlFlow::Break`] from `on_chunk` stops the copy with an
/// [`io::ErrorKind::Interrupted`] error. Returns the total number of bytes written.
pub fn copy_with_progress<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    mut on_chunk: F,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(u64) -> ControlFlow<()>,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut bytes_copied: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        writer.write_all(&buffer[..bytes_read])?;
        bytes_copied += bytes_read as u64;

        if on_chunk(bytes_copied).is_break() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "copy stopped"));
        }
    }

    writer.flush()?;
    Ok(bytes_copied)
}

/// Make sure `path` exists as a directory, creating missing parents.
///
/// Returns `true` when something had to be created.
pub fn ensure_dir(path: &Path) -> io::Result<bool> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path)?;
    Ok(true)
}

/// Destination for `file` in a tree copy.
///
/// The part of `file` below `cut_root` is re-rooted under `destination_root`.
/// Files outside `cut_root` keep their path relative to `source_root`.
pub fn remap_destination(
    file: &Path,
    cut_root: &Path,
    source_root: &Path,
    destination_root: &Path,
) -> PathBuf {
    let relative = file
        .strip_prefix(cut_root)
        .or_else(|_| file.strip_prefix(source_root))
        .unwrap_or(file);
    destination_root.join(relative)
}

/// Drop `.` and fold `..` into its parent without touching the filesystem.
///
/// `..` at the root stays at the root; leading `..` of a relative path is kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

pub fn matches_pattern(entry_name: &str, pattern: &str) -> bool {
    if let Ok(compiled_pattern) = Pattern::new(pattern) {
        if compiled_pattern.matches(entry_name) {
            return true;
        }
    }

    // robocopy habit: "*.*" also matches names without a dot
    if pattern == "*" || pattern == "*.*" {
        return true;
    }

    entry_name == pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn copy_reports_cumulative_counts() {
        let data = vec![7u8; 10];
        let mut reader = Cursor::new(data.clone());
        let mut writer = Vec::new();
        let mut seen = Vec::new();

        let total = copy_with_progress(&mut reader, &mut writer, 4, |n| {
            seen.push(n);
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(total, 10);
        assert_eq!(seen, vec![4, 8, 10]);
        assert_eq!(writer, data);
    }

    #[test]
    fn empty_input_never_calls_back() {
        let mut calls = 0;
        let total = copy_with_progress(&mut io::empty(), &mut io::sink(), 8, |_| {
            calls += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(total, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn break_stops_the_copy() {
        let mut reader = Cursor::new(vec![1u8; 100]);
        let mut writer = Vec::new();
        let err = copy_with_progress(&mut reader, &mut writer, 10, |n| {
            if n >= 20 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(writer.len(), 20);
    }

    #[test]
    fn write_failure_is_returned() {
        let mut reader = Cursor::new(vec![1u8; 3]);
        let err = copy_with_progress(&mut reader, &mut FailingWriter, 8, |_| {
            ControlFlow::Continue(())
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        assert!(ensure_dir(&nested).unwrap());
        assert!(nested.is_dir());
        assert!(!ensure_dir(&nested).unwrap());
    }

    #[test]
    fn ensure_dir_fails_below_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(ensure_dir(&file.join("sub")).is_err());
    }

    #[test]
    fn remap_strips_whole_root_without_cutoff() {
        let root = Path::new("/a/b");
        let dst = remap_destination(Path::new("/a/b/c/d.txt"), root, root, Path::new("/x"));
        assert_eq!(dst, PathBuf::from("/x/c/d.txt"));
    }

    #[test]
    fn remap_honours_cutoff_prefix() {
        let root = Path::new("/a/b");
        let cut = root.join("c");
        let dst = remap_destination(Path::new("/a/b/c/e/d.txt"), &cut, root, Path::new("/x"));
        assert_eq!(dst, PathBuf::from("/x/e/d.txt"));
    }

    #[test]
    fn remap_falls_back_to_source_root() {
        let root = Path::new("/a/b");
        let cut = root.join("c");
        let dst = remap_destination(Path::new("/a/b/other/d.txt"), &cut, root, Path::new("/x"));
        assert_eq!(dst, PathBuf::from("/x/other/d.txt"));
    }

    #[test]
    fn remap_ignores_trailing_separator() {
        let root = Path::new("/a/b/");
        let dst = remap_destination(Path::new("/a/b/d.txt"), root, root, Path::new("x"));
        assert_eq!(dst, PathBuf::from("x/d.txt"));
    }

    #[test]
    fn normalize_folds_parent_and_current_dirs() {
        assert_eq!(
            normalize_lexically(Path::new("/tmp/src/../dst/./x")),
            PathBuf::from("/tmp/dst/x")
        );
        assert_eq!(normalize_lexically(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_lexically(Path::new("../a/../../b")), PathBuf::from("../../b"));
        assert_eq!(normalize_lexically(Path::new("./a/")), PathBuf::from("a"));
    }

    #[test]
    fn pattern_matching() {
        assert!(matches_pattern("report.txt", "*.txt"));
        assert!(matches_pattern("README", "*.*"));
        assert!(matches_pattern("data_01.csv", "data_??.csv"));
        assert!(!matches_pattern("report.txt", "*.md"));
        assert!(matches_pattern("[odd].txt", "[odd].txt"));
    }
}
