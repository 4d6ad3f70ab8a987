use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names never searched for annotated sources.
const SKIPPED_DIRS: &[&str] = &["target", "docs"];

/// File scanner for traversing project directories.
///
/// The scanner walks a directory tree and collects every `.rs` file. Hidden
/// directories, `target` and `docs` are always skipped; `vendor` is skipped
/// unless vendored sources are requested, and any user-supplied exclusion
/// prunes the subtree below it.
///
/// # Example
///
/// ```no_run
/// use swagger_from_annotations::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-service"))
///     .with_excludes(vec![PathBuf::from("src/legacy")]);
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    excludes: Vec<PathBuf>,
    include_vendor: bool,
}

/// Result of a directory scan.
pub struct ScanResult {
    /// Discovered `.rs` files, sorted
    pub rust_files: Vec<PathBuf>,
    /// Entries that could not be read; the scan continued past them
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            excludes: Vec::new(),
            include_vendor: false,
        }
    }

    /// Paths to leave out. Relative paths are taken from the scan root.
    pub fn with_excludes(mut self, excludes: Vec<PathBuf>) -> Self {
        self.excludes = excludes
            .into_iter()
            .map(|path| {
                if path.is_absolute() {
                    path
                } else {
                    self.root_path.join(path)
                }
            })
            .collect();
        self
    }

    /// Also descend into `vendor` directories.
    pub fn include_vendor(mut self, include: bool) -> Self {
        self.include_vendor = include;
        self
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.path() == self.root_path {
            return false;
        }
        if self.excludes.iter().any(|excluded| entry.path().starts_with(excluded)) {
            debug!("Excluded: {}", entry.path().display());
            return true;
        }
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.')
            || SKIPPED_DIRS.contains(&name.as_ref())
            || (name == "vendor" && !self.include_vendor)
    }

    /// Walks the tree below the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a readable directory. Unreadable
    /// entries below it only produce warnings.
    pub fn scan(&self) -> Result<ScanResult> {
        ensure_dir(&self.root_path)?;

        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();
        for entry in WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|entry| !self.is_skipped(entry))
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "rs") {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }
        rust_files.sort();

        debug!(
            "Scanned {}: {} Rust files",
            self.root_path.display(),
            rust_files.len()
        );
        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot access directory: {}", path.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Not a directory: {}", path.display());
    }
    Ok(())
}
