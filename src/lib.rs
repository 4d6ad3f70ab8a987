//! Swagger 2.0 documents from annotated Rust handlers.
//!
//! Handlers describe themselves with `@` annotations in their doc comments
//! (`@Summary`, `@Param`, `@Success`, `@Router`, ...). Handlers that take a
//! gin-like context are also inspected: accessor calls such as
//! `ctx.param("id")` or `ctx.json(200, body)` contribute parameters and
//! responses the annotations leave out. Referenced types are resolved from
//! the project's own declarations into schema definitions.
//!
//! # Pipeline
//!
//! 1. [`scanner`] and [`parser`] turn a project directory into syntax trees.
//! 2. [`source`] collects candidate handlers and general API doc blocks.
//! 3. [`general`] and [`operation`] parse annotations; [`inspector`] infers
//!    the rest from handler bodies.
//! 4. [`resolver`] maps types to schemas through the [`universe`] index and
//!    registers named ones in the [`registry`].
//! 5. [`assembler`] places operations on their routes ([`routes`]) and
//!    finishes the [`document`]; [`serializer`] writes it out.
//!
//! [`generator::Generator`] runs steps 2 through 5.
//!
//! ```no_run
//! use swagger_from_annotations::{
//!     config::Config, generator::Generator, parser::AstParser, routes::RouteTable,
//!     scanner::FileScanner, serializer::serialize_yaml,
//! };
//! use std::path::PathBuf;
//!
//! let scan = FileScanner::new(PathBuf::from("./my-service")).scan().unwrap();
//! let files: Vec<_> = AstParser::parse_files(&scan.rust_files)
//!     .into_iter()
//!     .filter_map(Result::ok)
//!     .collect();
//! let routes = RouteTable::scan(&files);
//! let config = Config::default();
//! let document = Generator::new(&files, &config)
//!     .with_routes(Some(&routes))
//!     .generate()
//!     .unwrap();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```

pub mod assembler;
pub mod attribute;
pub mod cli;
pub mod config;
pub mod directives;
pub mod document;
pub mod error;
pub mod general;
pub mod generator;
pub mod http;
pub mod inspector;
pub mod markdown;
pub mod operation;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod routes;
pub mod scanner;
pub mod schema;
pub mod serializer;
pub mod source;
pub mod types;
pub mod universe;
