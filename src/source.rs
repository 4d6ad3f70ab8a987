//! Source positions, doc-comment lines and the handler declarations found in parsed files.

use log::debug;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use syn::spanned::Spanned;
use syn::visit::{self, Visit};

use crate::parser::ParsedFile;
use crate::types::TypeExpr;

/// A file and line, reported in every diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location of the first token covered by `span`.
    pub fn from_span(file: &Path, span: proc_macro2::Span) -> Self {
        Self::new(file, span.start().line)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One line of a doc comment, trimmed, with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocLine {
    pub text: String,
    pub location: SourceLocation,
}

impl DocLine {
    pub fn new(text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            text: text.into(),
            location,
        }
    }
}

/// Extracts the doc-comment lines of the given style from `attrs`.
///
/// Block comments (`/** ... */`) contribute one line per source line, with
/// leading `*` decoration removed.
pub fn doc_lines(attrs: &[syn::Attribute], file: &Path, style: syn::AttrStyle) -> Vec<DocLine> {
    let mut lines = Vec::new();
    for attr in attrs {
        if attr.style != style || !attr.path().is_ident("doc") {
            continue;
        }
        let syn::Meta::NameValue(name_value) = &attr.meta else {
            continue;
        };
        let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(text),
            ..
        }) = &name_value.value
        else {
            continue;
        };
        let start = SourceLocation::from_span(file, attr.span());
        for (offset, raw) in text.value().lines().enumerate() {
            let line = raw.trim();
            let line = line.strip_prefix('*').map(str::trim).unwrap_or(line);
            lines.push(DocLine::new(
                line,
                SourceLocation::new(&start.file, start.line + offset),
            ));
        }
    }
    lines
}

/// Plain documentation text: doc lines joined with newlines, blank edges dropped.
pub fn docs_text(attrs: &[syn::Attribute], file: &Path) -> Option<String> {
    let text = doc_lines(attrs, file, syn::AttrStyle::Outer)
        .into_iter()
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// A function that is a candidate HTTP handler.
#[derive(Debug, Clone)]
pub struct HandlerDecl {
    /// Function name
    pub name: String,
    /// `scope::fn` or `scope::SelfType::fn`
    pub qualified_name: String,
    /// Module path the function is declared in
    pub scope: String,
    pub location: SourceLocation,
    pub doc_lines: Vec<DocLine>,
    /// Named inputs with their declared types
    pub inputs: Vec<(String, TypeExpr)>,
    pub output: Option<TypeExpr>,
    pub body: syn::Block,
}

impl HandlerDecl {
    /// True when any doc line looks like an `@` annotation.
    pub fn is_annotated(&self) -> bool {
        has_annotations(&self.doc_lines)
    }
}

fn has_annotations(lines: &[DocLine]) -> bool {
    lines.iter().any(|line| line.text.starts_with('@'))
}

/// Collects every function of the project files that carries annotations or
/// takes a parameter whose type is one of the accessor receivers.
///
/// `fn main` at the crate root is reserved for general API information and never
/// becomes a handler.
pub fn collect_handlers(files: &[ParsedFile], receivers: &BTreeSet<String>) -> Vec<HandlerDecl> {
    let mut handlers = Vec::new();
    for file in files.iter().filter(|file| !file.dependency) {
        let mut collector = HandlerCollector {
            file,
            receivers,
            scope: Vec::new(),
            self_type: None,
            handlers: Vec::new(),
        };
        collector.visit_file(&file.syntax_tree);
        handlers.extend(collector.handlers);
    }
    debug!("Collected {} candidate handlers", handlers.len());
    handlers
}

/// Doc blocks that may hold general API information: the inner docs of every
/// file and the outer docs of a crate-root `fn main`.
pub fn general_doc_blocks(files: &[ParsedFile]) -> Vec<Vec<DocLine>> {
    let mut blocks = Vec::new();
    for file in files.iter().filter(|file| !file.dependency) {
        let inner = doc_lines(&file.syntax_tree.attrs, &file.path, syn::AttrStyle::Inner(Default::default()));
        if has_annotations(&inner) {
            blocks.push(inner);
        }
        if !file.module_path.is_empty() {
            continue;
        }
        for item in &file.syntax_tree.items {
            if let syn::Item::Fn(item_fn) = item {
                if item_fn.sig.ident == "main" {
                    let lines = doc_lines(&item_fn.attrs, &file.path, syn::AttrStyle::Outer);
                    if has_annotations(&lines) {
                        blocks.push(lines);
                    }
                }
            }
        }
    }
    blocks
}

struct HandlerCollector<'a> {
    file: &'a ParsedFile,
    receivers: &'a BTreeSet<String>,
    scope: Vec<String>,
    self_type: Option<String>,
    handlers: Vec<HandlerDecl>,
}

impl HandlerCollector<'_> {
    fn current_scope(&self) -> String {
        std::iter::once(self.file.module_path.as_str())
            .chain(self.scope.iter().map(String::as_str))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("::")
    }

    fn consider(&mut self, sig: &syn::Signature, attrs: &[syn::Attribute], block: &syn::Block) {
        let name = sig.ident.to_string();
        let scope = self.current_scope();
        if scope.is_empty() && self.self_type.is_none() && name == "main" {
            return;
        }

        let doc_lines = doc_lines(attrs, &self.file.path, syn::AttrStyle::Outer);
        let inputs = signature_inputs(sig);
        let takes_receiver = inputs.iter().any(|(_, ty)| {
            ty.base_name()
                .is_some_and(|base| self.receivers.contains(base))
        });
        if !has_annotations(&doc_lines) && !takes_receiver {
            return;
        }

        let qualified_name = [Some(scope.as_str()), self.self_type.as_deref(), Some(name.as_str())]
            .into_iter()
            .flatten()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("::");
        debug!("Found handler candidate: {}", qualified_name);

        self.handlers.push(HandlerDecl {
            location: SourceLocation::from_span(&self.file.path, sig.ident.span()),
            name,
            qualified_name,
            scope,
            doc_lines,
            inputs,
            output: match &sig.output {
                syn::ReturnType::Default => None,
                syn::ReturnType::Type(_, ty) => Some(TypeExpr::from_syn(ty)),
            },
            body: block.clone(),
        });
    }
}

impl<'ast> Visit<'ast> for HandlerCollector<'_> {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if node.content.is_some() {
            self.scope.push(node.ident.to_string());
            visit::visit_item_mod(self, node);
            self.scope.pop();
        }
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        let self_type = match TypeExpr::from_syn(&node.self_ty) {
            TypeExpr::Named { path, .. } => path.last().cloned(),
            _ => None,
        };
        let previous = std::mem::replace(&mut self.self_type, self_type);
        visit::visit_item_impl(self, node);
        self.self_type = previous;
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.consider(&node.sig, &node.attrs, &node.block);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        self.consider(&node.sig, &node.attrs, &node.block);
    }
}

/// Binding names and types of a signature's typed inputs.
///
/// A destructuring pattern such as `Json(body): Json<T>` binds `body` to `T`.
fn signature_inputs(sig: &syn::Signature) -> Vec<(String, TypeExpr)> {
    sig.inputs
        .iter()
        .filter_map(|input| match input {
            syn::FnArg::Typed(pat_type) => {
                let ty = TypeExpr::from_syn(&pat_type.ty);
                match &*pat_type.pat {
                    syn::Pat::Ident(ident) => Some((ident.ident.to_string(), ty)),
                    syn::Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => {
                        let syn::Pat::Ident(inner) = tuple.elems.first()? else {
                            return None;
                        };
                        let inner_ty = match ty {
                            TypeExpr::Named { mut args, .. } if !args.is_empty() => args.remove(0),
                            other => other,
                        };
                        Some((inner.ident.to_string(), inner_ty))
                    }
                    _ => None,
                }
            }
            syn::FnArg::Receiver(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AstParser;

    fn parse(module_path: &str, code: &str) -> ParsedFile {
        AstParser::parse_source(PathBuf::from("src/test.rs"), module_path, code).unwrap()
    }

    fn receivers() -> BTreeSet<String> {
        BTreeSet::from(["Context".to_string()])
    }

    #[test]
    fn test_collects_annotated_and_receiver_functions() {
        let file = parse(
            "handlers",
            r#"
            /// @Summary Say hello
            /// @Router /hello [get]
            pub fn hello() {}

            pub fn greet(ctx: &mut Context) {}

            pub fn helper(x: i32) -> i32 { x }
            "#,
        );
        let handlers = collect_handlers(&[file], &receivers());
        let names: Vec<_> = handlers.iter().map(|h| h.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["handlers::hello", "handlers::greet"]);
        assert_eq!(handlers[0].doc_lines[0].text, "@Summary Say hello");
        assert_eq!(handlers[0].doc_lines[0].location.line, 2);
        assert_eq!(handlers[1].inputs[0].0, "ctx");
    }

    #[test]
    fn test_scope_includes_inline_modules_and_self_type() {
        let file = parse(
            "api",
            r#"
            mod v1 {
                struct Users;
                impl Users {
                    /// @Router /users [get]
                    fn list(&self) {}
                }
            }
            "#,
        );
        let handlers = collect_handlers(&[file], &receivers());
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].scope, "api::v1");
        assert_eq!(handlers[0].qualified_name, "api::v1::Users::list");
    }

    #[test]
    fn test_destructured_input_binds_inner_type() {
        let file = parse(
            "",
            r#"
            /// @Router /users [post]
            async fn create(Json(body): Json<CreateUser>) {}
            "#,
        );
        let handlers = collect_handlers(&[file], &receivers());
        assert_eq!(handlers[0].inputs, vec![("body".to_string(), TypeExpr::named("CreateUser"))]);
    }

    #[test]
    fn test_main_docs_are_general_blocks() {
        let file = parse(
            "",
            r#"
            //! @title Pet Store
            //! @version 1.0

            /// @host example.com
            fn main() {}
            "#,
        );
        let files = [file];
        assert!(collect_handlers(&files, &receivers()).is_empty());
        let blocks = general_doc_blocks(&files);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0][0].text, "@title Pet Store");
        assert_eq!(blocks[1][0].text, "@host example.com");
    }

    #[test]
    fn test_block_doc_comment_lines() {
        let file = parse(
            "",
            r#"
            /**
             * @Summary Block style
             * @Router /block [get]
             */
            fn block() {}
            "#,
        );
        let handlers = collect_handlers(&[file], &receivers());
        let texts: Vec<_> = handlers[0]
            .doc_lines
            .iter()
            .map(|line| line.text.as_str())
            .filter(|text| !text.is_empty())
            .collect();
        assert_eq!(texts, vec!["@Summary Block style", "@Router /block [get]"]);
    }
}
