use crate::error::{Result, TupleError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{trace, warn};

/// Async discovery of document files below a path
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include, lowercase and without the dot
    extensions: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    /// Maximum directory depth below the root (None = unlimited)
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

/// Result of one discovery run
#[derive(Debug, Default, Clone)]
pub struct Discovered {
    pub files: Vec<PathBuf>,
    /// Entries that could not be inspected; the walk continues past them
    pub errors: Vec<(PathBuf, String)>,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_set: None,
            exclude_set: None,
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Only files matching at least one pattern are kept
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.include_set = build_glob_set(&patterns)?;
        Ok(self)
    }

    /// Files matching any pattern are skipped
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.exclude_set = build_glob_set(&patterns)?;
        Ok(self)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Document files under `path`, sorted. A file path is returned as-is if it matches.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.discover(path).await?.files)
    }

    /// Walk `path`, collecting matching files and the entries that failed.
    ///
    /// Only a failure on `path` itself is returned as an error.
    pub async fn discover(&self, path: &Path) -> Result<Discovered> {
        let metadata = fs::metadata(path).await?;
        let mut discovered = Discovered::default();

        if metadata.is_file() {
            if self.should_process(path) {
                discovered.files.push(path.to_path_buf());
            }
            return Ok(discovered);
        }

        // Files directly in the root are at depth 0
        let mut pending = vec![(path.to_path_buf(), 0usize)];
        while let Some((directory, depth)) = pending.pop() {
            if let Err(e) = self
                .scan_directory(&directory, depth, &mut pending, &mut discovered.files)
                .await
            {
                warn!("Error scanning {}: {}", directory.display(), e);
                discovered.errors.push((directory, e.to_string()));
            }
        }

        discovered.files.sort();
        Ok(discovered)
    }

    async fn scan_directory(
        &self,
        directory: &Path,
        depth: usize,
        pending: &mut Vec<(PathBuf, usize)>,
        files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let mut read_dir = fs::read_dir(directory).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let entry_path = entry.path();
            if entry_path.is_symlink() && !self.follow_symlinks {
                trace!("Skipping symlink {}", entry_path.display());
                continue;
            }

            let file_type = fs::metadata(&entry_path).await?;
            if file_type.is_dir() {
                if self.max_depth.is_none_or(|max| depth < max) {
                    pending.push((entry_path, depth + 1));
                }
            } else if file_type.is_file() && self.should_process(&entry_path) {
                files.push(entry_path);
            }
        }
        Ok(())
    }

    /// Extension filter, then exclude patterns, then include patterns
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(path)
        {
            return false;
        }

        match &self.include_set {
            Some(include_set) => include_set.is_match(path),
            None => true,
        }
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| TupleError::Config(format!("Invalid glob pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| TupleError::Config(format!("Failed to build glob set: {}", e)))
}
