use serde::{Deserialize, Serialize};

/// Default chunk size for the byte-copy loop.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Chunk size used by the transfer loop; one `COPY` event per chunk
    pub buffer_size: usize,
    /// Glob patterns matched against file names during a recursive copy
    pub patterns: Vec<String>,
    /// Descend into symlinked directories while walking a tree
    pub follow_symlinks: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            buffer_size: DEFAULT_BUFFER_SIZE,
            patterns: vec!["*".to_string()],
            follow_symlinks: false,
        }
    }
}

impl CopyOptions {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }

    /// Buffer size actually used by the transfer loop (never zero).
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }

    /// Whether `file_name` passes the pattern filter. An empty list matches everything.
    pub fn matches(&self, file_name: &str) -> bool {
        self.patterns.is_empty()
            || self
                .patterns
                .iter()
                .any(|p| crate::utils::matches_pattern(file_name, p))
    }

    /// Compact description of non-default settings, for log lines.
    pub fn to_string_flags(&self) -> String {
        let mut result = Vec::new();

        if self.buffer_size != DEFAULT_BUFFER_SIZE {
            result.push(format!("buffer={}", self.effective_buffer_size()));
        }

        if self.patterns != ["*"] {
            result.push(format!("patterns={}", self.patterns.join(",")));
        }

        if self.follow_symlinks {
            result.push("follow-symlinks".to_string());
        }

        if result.is_empty() {
            "defaults".to_string()
        } else {
            result.join(" ")
        }
    }
}
