//! One generation run over parsed files.
//!
//! The run reads the general API information, collects the handlers, parses
//! their annotations, merges what the call-site inspector infers, and hands
//! every operation to the [`DocumentAssembler`].

use log::{debug, info, warn};

use crate::assembler::DocumentAssembler;
use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::general::{is_general_block, GeneralInfoParser};
use crate::inspector::CallSiteInspector;
use crate::markdown::{MarkdownDir, MarkdownSource};
use crate::operation::{Operation, OperationParser};
use crate::parser::ParsedFile;
use crate::resolver::SchemaResolver;
use crate::routes::RouteTable;
use crate::source::{collect_handlers, general_doc_blocks};
use crate::universe::SourceIndex;

pub struct Generator<'a> {
    files: &'a [ParsedFile],
    config: &'a Config,
    routes: Option<&'a RouteTable>,
    markdown: Option<MarkdownDir>,
}

impl<'a> Generator<'a> {
    pub fn new(files: &'a [ParsedFile], config: &'a Config) -> Self {
        Self {
            files,
            config,
            routes: None,
            markdown: config.markdown_dir.clone().map(MarkdownDir::new),
        }
    }

    /// Registered routes to validate against and to place unrouted handlers with.
    pub fn with_routes(mut self, routes: Option<&'a RouteTable>) -> Self {
        self.routes = routes;
        self
    }

    fn markdown(&self) -> Option<&dyn MarkdownSource> {
        self.markdown.as_ref().map(|dir| dir as &dyn MarkdownSource)
    }

    /// Builds the document.
    ///
    /// # Errors
    ///
    /// Returns the first annotation, type resolution or route problem found.
    /// With `keep_going` set, operations whose types cannot be resolved are
    /// skipped instead, together with any definition they registered.
    pub fn generate(&self) -> Result<Document> {
        let index = SourceIndex::new(self.files, self.config.parse_dependency);
        debug!("Indexed {} type declarations", index.len());

        let (document, collection_format) = self.general_info()?;
        let operations = self.operations_with(&index)?;
        info!("Parsed {} operations", operations.len());

        let mut resolver = SchemaResolver::new(&index, self.config.naming_strategy);
        let mut assembler = DocumentAssembler::new(document, self.routes, self.config.strict)
            .with_collection_format_in_query(collection_format);
        for operation in &operations {
            let checkpoint = self.config.keep_going.then(|| resolver.checkpoint());
            match assembler.add_operation(operation, &mut resolver) {
                Ok(()) => {}
                Err(err) if err.is_unresolved_type() && checkpoint.is_some() => {
                    warn!("{}; operation skipped", err);
                    if let Some(checkpoint) = checkpoint {
                        resolver.rollback(checkpoint);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let document = assembler.build(resolver.into_registry())?;
        info!(
            "Document has {} paths and {} definitions",
            document.paths.len(),
            document.definitions.len()
        );
        Ok(document)
    }

    /// Every handler's operation, annotations merged with inferred data.
    pub fn operations(&self) -> Result<Vec<Operation>> {
        let index = SourceIndex::new(self.files, self.config.parse_dependency);
        self.operations_with(&index)
    }

    fn operations_with(&self, index: &SourceIndex) -> Result<Vec<Operation>> {
        let table = self.config.accessor_table();
        let handlers = collect_handlers(self.files, &table.receivers());
        let parser = OperationParser::new(self.markdown());
        let mut inspector = CallSiteInspector::new(table, index);

        let mut operations = Vec::with_capacity(handlers.len());
        for decl in &handlers {
            let mut operation = parser
                .parse(decl)
                .map_err(|err| err.in_operation(&decl.qualified_name, &decl.location))?;
            operation.merge_inferred(inspector.inspect(decl));
            operations.push(operation);
        }
        Ok(operations)
    }

    /// Document seeded with the general API information and the configured
    /// overrides, plus the collection format for query arrays.
    fn general_info(&self) -> Result<(Document, Option<String>)> {
        let mut document = Document::default();
        let parser = GeneralInfoParser::new(self.markdown());
        let mut collection_format = None;
        for block in general_doc_blocks(self.files) {
            if !is_general_block(&block) {
                continue;
            }
            let general = parser.parse(&block, &mut document)?;
            collection_format = general.collection_format_in_query.or(collection_format);
        }

        self.config
            .info
            .apply(&mut document.info, &mut document.host, &mut document.base_path);
        let collection_format = self
            .config
            .collection_format_in_query
            .clone()
            .or(collection_format);
        Ok((document, collection_format))
    }
}
