use color_eyre::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Recently opened files, one path per line, oldest first
pub const RECENT_FILES: &str = "recent_files.txt";
/// Log file written while the terminal UI owns stderr
pub const LOG_FILE: &str = "sheetplot.log";

/// Registry of known cache files
const CACHE_FILES: &[&str] = &[RECENT_FILES, LOG_FILE];

/// Manages cache directory and cache file operations
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Create a CacheManager rooted at `cache_dir` (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path to a specific cache file
    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    /// Ensure the cache directory exists
    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Clear a specific cache file
    pub fn clear_file(&self, filename: &str) -> Result<()> {
        let file_path = self.cache_file(filename);
        if file_path.exists() {
            fs::remove_file(&file_path)?;
        }
        Ok(())
    }

    /// Clear all registered cache files
    pub fn clear_all(&self) -> Result<()> {
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    eprintln!("Warning: Could not remove cache file {}: {}", filename, e);
                }
            }
        }

        Ok(())
    }
}

/// Files opened in earlier sessions, most recent last.
#[derive(Debug, Clone, Default)]
pub struct RecentFiles {
    entries: Vec<PathBuf>,
    limit: usize,
}

impl RecentFiles {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
        }
    }

    /// Read the history file; a missing file is an empty history.
    pub fn load(cache: &CacheManager, limit: usize) -> Self {
        let mut recent = Self::new(limit);
        match fs::read_to_string(cache.cache_file(RECENT_FILES)) {
            Ok(content) => {
                for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    recent.push(PathBuf::from(line));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not read recent files: {}", e),
        }
        recent
    }

    /// Write the history file under an exclusive lock.
    pub fn save(&self, cache: &CacheManager) -> Result<()> {
        cache.ensure_cache_dir()?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(cache.cache_file(RECENT_FILES))?;

        if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
            warn!("Could not lock recent files: {}", e);
        }
        for path in &self.entries {
            writeln!(file, "{}", path.display())?;
        }
        file.flush()?;
        Ok(())
    }

    /// Record `path` as the most recent entry. An earlier occurrence is moved, not duplicated.
    pub fn push(&mut self, path: PathBuf) {
        if self.limit == 0 {
            return;
        }
        self.entries.retain(|p| p != &path);
        self.entries.push(path);
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Entry `back` steps from the newest (0 = most recent)
    pub fn nth_back(&self, back: usize) -> Option<&PathBuf> {
        self.entries.iter().rev().nth(back)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
