use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::config::{Config, NamingStrategy};
use crate::generator::Generator;
use crate::parser::{AstParser, ParsedFile};
use crate::routes::RouteTable;
use crate::scanner::FileScanner;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};

/// Generate a Swagger 2.0 document from annotated Rust handlers
#[derive(Parser, Debug)]
#[command(name = "swagger-from-annotations")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Write JSON on a single line
    #[arg(long)]
    pub compact: bool,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Settings file (YAML, or JSON by extension)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Treat route mismatches and duplicate routes as errors
    #[arg(long)]
    pub strict: bool,

    /// Property naming strategy for struct fields
    #[arg(long, value_enum)]
    pub naming: Option<NamingStrategy>,

    /// Index types declared in dependency sources
    #[arg(long)]
    pub parse_dependency: bool,

    /// Collection format for array query parameters
    #[arg(long, value_name = "FORMAT")]
    pub collection_format: Option<String>,

    /// Skip operations with unresolvable types instead of failing
    #[arg(long)]
    pub keep_going: bool,

    /// Directory holding markdown descriptions
    #[arg(long, value_name = "DIR")]
    pub markdown_dir: Option<PathBuf>,

    /// Route table file (YAML or JSON); routes are scanned from the sources otherwise
    #[arg(long, value_name = "FILE")]
    pub routes: Option<PathBuf>,

    /// Source directory of a dependency whose types may be referenced
    #[arg(long = "dependency-dir", value_name = "DIR")]
    pub dependency_dirs: Vec<PathBuf>,

    /// Path to leave out of the scan, relative to the project
    #[arg(long = "exclude", value_name = "PATH")]
    pub excludes: Vec<PathBuf>,

    /// Also scan `vendor` directories
    #[arg(long)]
    pub include_vendor: bool,

    /// Print every operation as annotation lines instead of generating a document
    #[arg(long)]
    pub print_annotations: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
    }
    for dir in &args.dependency_dirs {
        if !dir.is_dir() {
            anyhow::bail!("Dependency path is not a directory: {}", dir.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }
    Ok(args)
}

/// Settings from the config file, overridden by flags.
pub fn build_config(args: &CliArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.strict |= args.strict;
    config.parse_dependency |= args.parse_dependency;
    config.keep_going |= args.keep_going;
    if let Some(naming) = args.naming {
        config.naming_strategy = naming;
    }
    if let Some(format) = &args.collection_format {
        config.collection_format_in_query = Some(format.clone());
    }
    if let Some(dir) = &args.markdown_dir {
        config.markdown_dir = Some(dir.clone());
    }
    Ok(config)
}

fn parse_tree(root: &Path, excludes: &[PathBuf], include_vendor: bool) -> Result<Vec<ParsedFile>> {
    let scan_result = FileScanner::new(root.to_path_buf())
        .with_excludes(excludes.to_vec())
        .include_vendor(include_vendor)
        .scan()?;
    info!("Found {} Rust files in {}", scan_result.rust_files.len(), root.display());

    let parsed = AstParser::parse_files(&scan_result.rust_files)
        .into_iter()
        .filter_map(|result| match result {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Skipping file due to parse error: {:#}", e);
                None
            }
        })
        .collect();
    Ok(parsed)
}

/// Project files followed by dependency files.
pub fn load_sources(args: &CliArgs) -> Result<Vec<ParsedFile>> {
    let mut files = parse_tree(&args.project_path, &args.excludes, args.include_vendor)?;
    if files.is_empty() {
        anyhow::bail!("No Rust files could be parsed in {}", args.project_path.display());
    }
    for dir in &args.dependency_dirs {
        let dependency = parse_tree(dir, &[], true)?;
        files.extend(dependency.into_iter().map(ParsedFile::into_dependency));
    }
    Ok(files)
}

fn load_routes(args: &CliArgs, files: &[ParsedFile]) -> Result<RouteTable> {
    let routes = match &args.routes {
        Some(path) => RouteTable::load(path)?,
        None => RouteTable::scan(files),
    };
    if routes.is_empty() {
        warn!("No registered routes found; only handlers with @Router are documented");
    } else {
        info!("Using {} registered routes", routes.len());
    }
    Ok(routes)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    let config = build_config(&args)?;
    let files = load_sources(&args)?;
    let routes = load_routes(&args, &files)?;
    let generator = Generator::new(&files, &config).with_routes((!routes.is_empty()).then_some(&routes));

    let content = if args.print_annotations {
        let operations = generator.operations().context("Failed to parse handler annotations")?;
        let mut out = String::new();
        for operation in &operations {
            out.push_str(&format!("// {}\n", operation.qualified_name));
            for line in operation.render_annotations() {
                out.push_str(&format!("/// {}\n", line));
            }
            out.push('\n');
        }
        out
    } else {
        let document = generator.generate().context("Failed to generate Swagger document")?;
        match args.output_format {
            OutputFormat::Yaml => serialize_yaml(&document)?,
            OutputFormat::Json => serialize_json(&document, args.compact)?,
        }
    };

    match &args.output_path {
        Some(path) => {
            write_to_file(&content, path)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(project: &Path, extra: &[&str]) -> CliArgs {
        let mut argv = vec!["swagger-from-annotations".to_string(), project.display().to_string()];
        argv.extend(extra.iter().map(|arg| arg.to_string()));
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("swagger.yaml");
        fs::write(&config_path, "naming_strategy: snakecase\ncollection_format_in_query: csv\n").unwrap();

        let config_arg = config_path.display().to_string();
        let parsed = args(
            temp_dir.path(),
            &["--config", &config_arg, "--strict", "--collection-format", "multi"],
        );
        let config = build_config(&parsed).unwrap();

        assert_eq!(config.naming_strategy, NamingStrategy::SnakeCase);
        assert!(config.strict);
        assert_eq!(config.collection_format_in_query.as_deref(), Some("multi"));

        let parsed = args(temp_dir.path(), &["--naming", "pascalcase"]);
        assert_eq!(build_config(&parsed).unwrap().naming_strategy, NamingStrategy::PascalCase);
    }

    #[test]
    fn test_run_writes_json_document() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("main.rs"),
            r#"
            /// @title Ping API
            /// @version 1.0
            fn main() {}

            /// @Summary Health check
            /// @Success 200 {string} string "pong"
            /// @Router /ping [get]
            pub fn ping() {}
            "#,
        )
        .unwrap();
        let output = temp_dir.path().join("out/swagger.json");
        let output_arg = output.display().to_string();

        let parsed = args(temp_dir.path(), &["-f", "json", "--compact", "-o", &output_arg]);
        run(parse_args_from_parsed(parsed).unwrap()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["info"]["title"], "Ping API");
        assert_eq!(value["paths"]["/ping"]["get"]["summary"], "Health check");
        assert_eq!(value["paths"]["/ping"]["get"]["responses"]["200"]["schema"]["type"], "string");
    }

    #[test]
    fn test_missing_project_path_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let parsed = args(&temp_dir.path().join("missing"), &[]);
        assert!(parse_args_from_parsed(parsed).is_err());
    }
}
