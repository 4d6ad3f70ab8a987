//! Long-form descriptions loaded from markdown files.

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Supplies markdown text for `@Description.markdown` style annotations.
pub trait MarkdownSource {
    /// Markdown for `tag`: `api` for the general description, a tag name, or
    /// an operation's function name.
    fn markdown_for(&self, tag: &str) -> Result<String>;
}

/// A directory of `*.md` files. The first file, by name, whose name contains
/// the requested tag is used.
#[derive(Debug, Clone)]
pub struct MarkdownDir {
    dir: PathBuf,
}

impl MarkdownDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl MarkdownSource for MarkdownDir {
    fn markdown_for(&self, tag: &str) -> Result<String> {
        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(".md") && name.contains(tag))
            })
            .collect();
        candidates.sort();

        match candidates.first() {
            Some(path) => {
                debug!("Loading markdown for `{}` from {}", tag, path.display());
                Ok(fs::read_to_string(path)?)
            }
            None => Err(Error::MissingMarkdown {
                tag: tag.to_string(),
                dir: self.dir.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_first_matching_file_wins() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "users_v2.md", "second");
        create_temp_file(&temp_dir, "users.md", "first");
        create_temp_file(&temp_dir, "users.txt", "not markdown");

        let source = MarkdownDir::new(temp_dir.path());
        assert_eq!(source.markdown_for("users").unwrap(), "first");
    }

    #[test]
    fn test_missing_markdown() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "api.md", "# API");

        let source = MarkdownDir::new(temp_dir.path());
        assert_eq!(source.markdown_for("api").unwrap(), "# API");
        let err = source.markdown_for("orders").unwrap_err();
        assert!(matches!(err, Error::MissingMarkdown { ref tag, .. } if tag == "orders"));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let source = MarkdownDir::new("/nonexistent/markdown/dir");
        assert!(matches!(source.markdown_for("api"), Err(Error::IoError(_))));
    }
}
