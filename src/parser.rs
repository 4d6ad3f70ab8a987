use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// AST parser for annotated Rust source files.
///
/// Every file is parsed with `syn` and tagged with the module path it
/// contributes to, which is the scope handlers and types declared in it live in.
///
/// # Example
///
/// ```no_run
/// use swagger_from_annotations::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/handlers/users.rs")).unwrap();
/// assert_eq!(parsed.module_path, "handlers::users");
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module path derived from the file location (`""` for the crate root)
    pub module_path: String,
    /// True for files that belong to a dependency rather than the project itself
    pub dependency: bool,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedFile {
    /// Marks the file as dependency source.
    pub fn into_dependency(mut self) -> Self {
        self.dependency = true;
        self
    }
}

impl AstParser {
    /// Parses a single Rust source file into an AST.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Rust syntax
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        Self::parse_source(path.to_path_buf(), &module_path_for(path), &content)
    }

    /// Parses source text that is already in memory.
    pub fn parse_source(path: PathBuf, module_path: &str, content: &str) -> Result<ParsedFile> {
        let syntax_tree = syn::parse_file(content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        debug!(
            "Successfully parsed file: {} (module `{}`)",
            path.display(),
            module_path
        );

        Ok(ParsedFile {
            path,
            module_path: module_path.to_string(),
            dependency: false,
            syntax_tree,
        })
    }

    /// Parses multiple Rust source files, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings so a partial document can
    /// still be produced.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| match Self::parse_file(path) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Err(e)
                }
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}

/// Derives the module path of a source file from its location.
///
/// The path is taken relative to the innermost `src` directory; `lib.rs`,
/// `main.rs` and `mod.rs` name their parent module. Files outside any `src`
/// directory are treated as a top-level module named after the file.
pub fn module_path_for(path: &Path) -> String {
    let components: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let start = components
        .iter()
        .rposition(|component| component == "src")
        .map(|index| index + 1)
        .unwrap_or(components.len().saturating_sub(1));

    let mut segments: Vec<String> = components[start..].to_vec();
    if let Some(last) = segments.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        let is_root = matches!(stem.as_str(), "lib" | "main" | "mod");
        if !is_root {
            segments.push(stem);
        }
    }
    segments
        .iter()
        .map(|segment| segment.replace('-', "_"))
        .collect::<Vec<_>>()
        .join("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_parse_valid_file_records_module_path() {
        let temp_dir = TempDir::new().unwrap();
        let code = r#"
            pub struct User {
                pub id: u32,
                pub name: String,
            }
        "#;

        let file_path = create_temp_file(&temp_dir, "src/models/user.rs", code);
        let parsed = AstParser::parse_file(&file_path).unwrap();

        assert_eq!(parsed.path, file_path);
        assert_eq!(parsed.module_path, "models::user");
        assert!(!parsed.dependency);
        assert_eq!(parsed.syntax_tree.items.len(), 1);
    }

    #[test]
    fn test_parse_invalid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(&temp_dir, "invalid.rs", "fn broken( { let x = ; }");
        let result = AstParser::parse_file(&file_path);

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Failed to parse Rust syntax"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let result = AstParser::parse_file(Path::new("/nonexistent/file.rs"));

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Failed to read file"));
    }

    #[test]
    fn test_parse_files_batch_keeps_going() {
        let temp_dir = TempDir::new().unwrap();

        let file1 = create_temp_file(&temp_dir, "file1.rs", "pub fn hello() {}");
        let file2 = create_temp_file(&temp_dir, "file2.rs", "pub struct World;");
        let file3 = create_temp_file(&temp_dir, "file3.rs", "pub fn broken( {");

        let results = AstParser::parse_files(&[file1.clone(), file2, file3]);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
        assert_eq!(results[0].as_ref().unwrap().path, file1);
    }

    #[test]
    fn test_module_path_for() {
        assert_eq!(module_path_for(Path::new("src/lib.rs")), "");
        assert_eq!(module_path_for(Path::new("src/main.rs")), "");
        assert_eq!(module_path_for(Path::new("/p/src/handlers.rs")), "handlers");
        assert_eq!(module_path_for(Path::new("/p/src/api/mod.rs")), "api");
        assert_eq!(module_path_for(Path::new("/p/src/api/v1/users.rs")), "api::v1::users");
        assert_eq!(module_path_for(Path::new("/tmp/xyz/pkg-b.rs")), "pkg_b");
    }

    #[test]
    fn test_dependency_marker() {
        let parsed = AstParser::parse_source(PathBuf::from("dep/src/lib.rs"), "", "struct A;")
            .unwrap()
            .into_dependency();
        assert!(parsed.dependency);
    }
}
