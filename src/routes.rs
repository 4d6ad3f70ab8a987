//! Registered routes: which handler serves which path and method.
//!
//! A [`RouteTable`] is either scanned from router construction code or loaded
//! from a YAML/JSON file of `{handler, path, method}` records. The assembler uses
//! it to validate `@Router` annotations and to route handlers that have none.

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use syn::punctuated::Punctuated;
use syn::{visit::Visit, Expr, ExprMethodCall, Lit, Token};

use crate::http::HttpMethod;
use crate::parser::ParsedFile;

/// `:id`, `*rest`, `{id}` and `{*rest}` placeholders
static PATH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?::|\*)(\w+)|\{\*?(\w+)\}").unwrap());

const ROUTE_VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];

/// One registered route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Handler path as registered, e.g. `handlers::greet` or `greet`
    pub handler: String,
    pub path: String,
    pub method: HttpMethod,
}

impl RouteEntry {
    pub fn new(handler: impl Into<String>, path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            handler: handler.into(),
            path: path.into(),
            method,
        }
    }

    /// True when the handler path names the function `qualified_name`,
    /// compared on whole `::` segments from the end.
    pub fn serves(&self, qualified_name: &str) -> bool {
        let handler = strip_relative(&self.handler);
        qualified_name == handler
            || qualified_name
                .strip_suffix(handler)
                .is_some_and(|rest| rest.ends_with("::"))
    }
}

fn strip_relative(mut handler: &str) -> &str {
    while let Some(rest) = ["crate::", "self::", "super::"]
        .iter()
        .find_map(|prefix| handler.strip_prefix(prefix))
    {
        handler = rest;
    }
    handler
}

/// All routes known for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Scans router construction code in the project files.
    pub fn scan(files: &[ParsedFile]) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for file in files.iter().filter(|file| !file.dependency) {
            let mut scanner = RouteScanner::new(&file.module_path);
            scanner.visit_file(&file.syntax_tree);
            for entry in scanner.routes {
                if seen.insert(entry.clone()) {
                    entries.push(entry);
                }
            }
        }
        debug!("Scanned {} registered routes", entries.len());
        Self { entries }
    }

    /// Loads a route file; `.json` files are JSON, everything else YAML.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading routes from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read routes file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let table = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON routes file: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML routes file: {}", path.display()))?
        };
        Ok(table)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Routes registered for the function `qualified_name`.
    pub fn routes_for(&self, qualified_name: &str) -> Vec<&RouteEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.serves(qualified_name))
            .collect()
    }

    /// The route registered under `method` whose path has the same shape as `path`.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&RouteEntry> {
        let shape = path_shape(path);
        self.entries
            .iter()
            .find(|entry| entry.method == method && path_shape(&entry.path) == shape)
    }
}

/// Writes every placeholder as `{name}`, the form used in the document.
pub fn normalize_path(path: &str) -> String {
    let normalized = PATH_PARAM.replace_all(path, |captures: &regex::Captures| {
        let name = captures.get(1).or_else(|| captures.get(2)).map_or("", |m| m.as_str());
        format!("{{{}}}", name)
    });
    if normalized.starts_with('/') {
        normalized.into_owned()
    } else {
        format!("/{}", normalized)
    }
}

/// The path with every placeholder replaced by `*`; two paths with the same
/// shape match the same requests.
pub fn path_shape(path: &str) -> String {
    let shape = PATH_PARAM.replace_all(path, "*");
    let shape = shape.trim_end_matches('/');
    if shape.is_empty() {
        "/".to_string()
    } else if shape.starts_with('/') {
        shape.to_string()
    } else {
        format!("/{}", shape)
    }
}

/// Placeholder names in order of appearance.
pub fn path_params(path: &str) -> Vec<String> {
    PATH_PARAM
        .captures_iter(path)
        .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Joins a prefix and a path, handling slashes.
fn combine_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(lit_str) => Some(lit_str.value()),
            _ => None,
        },
        _ => None,
    }
}

/// `handlers::greet` for a handler given as a path.
fn handler_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path_expr) => Some(
            path_expr
                .path
                .segments
                .iter()
                .map(|segment| segment.ident.to_string())
                .collect::<Vec<_>>()
                .join("::"),
        ),
        Expr::Reference(reference) => handler_path(&reference.expr),
        Expr::Paren(paren) => handler_path(&paren.expr),
        _ => {
            debug!("Handler expression is not a path, route skipped");
            None
        }
    }
}

/// Method of a verb function such as `get` or `web::post`.
fn verb_of(func: &Expr) -> Option<HttpMethod> {
    match func {
        Expr::Path(path_expr) => path_expr
            .path
            .segments
            .last()
            .and_then(|segment| HttpMethod::from_str(&segment.ident.to_string()).ok()),
        _ => None,
    }
}

/// Methods and handlers of a method router: `get(a).post(b)` or `web::get().to(a)`.
fn method_router(expr: &Expr) -> Vec<(HttpMethod, String)> {
    match expr {
        Expr::Call(call) => {
            let Some(method) = verb_of(&call.func) else {
                return Vec::new();
            };
            call.args
                .first()
                .and_then(handler_path)
                .map(|handler| vec![(method, handler)])
                .unwrap_or_default()
        }
        Expr::MethodCall(call) if call.method == "to" => match call.receiver.as_ref() {
            Expr::Call(verb) => match (verb_of(&verb.func), call.args.first().and_then(handler_path)) {
                (Some(method), Some(handler)) => vec![(method, handler)],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        Expr::MethodCall(call) => {
            let mut routes = method_router(&call.receiver);
            if let Ok(method) = HttpMethod::from_str(&call.method.to_string()) {
                if let Some(handler) = call.args.first().and_then(handler_path) {
                    routes.push((method, handler));
                }
            }
            routes
        }
        _ => Vec::new(),
    }
}

/// Literal argument of the `name("/p")` call a method chain starts from,
/// e.g. `web::resource("/p")` or `web::scope("/p")`.
fn chain_root(expr: &Expr, name: &str) -> Option<String> {
    match expr {
        Expr::MethodCall(call) => chain_root(&call.receiver, name),
        Expr::Call(call) => match call.func.as_ref() {
            Expr::Path(path_expr)
                if path_expr
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| segment.ident == name) =>
            {
                call.args.first().and_then(string_literal)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Visitor collecting routes from router builders and route attribute macros.
struct RouteScanner {
    scope: Vec<String>,
    prefix: String,
    routes: Vec<RouteEntry>,
}

impl RouteScanner {
    fn new(module_path: &str) -> Self {
        Self {
            scope: module_path
                .split("::")
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            prefix: String::new(),
            routes: Vec::new(),
        }
    }

    fn push(&mut self, handler: String, path: &str, method: HttpMethod) {
        debug!("Found route {} {} -> {}", method, path, handler);
        self.routes.push(RouteEntry::new(handler, path, method));
    }

    /// `#[get("/path")]` style attributes on a function.
    fn attribute_routes(&mut self, attrs: &[syn::Attribute], name: &syn::Ident) {
        for attr in attrs {
            let Some(method) = attr
                .path()
                .segments
                .last()
                .and_then(|segment| HttpMethod::from_str(&segment.ident.to_string()).ok())
            else {
                continue;
            };
            let Ok(args) = attr.parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated) else {
                continue;
            };
            if let Some(path) = args.first().and_then(string_literal) {
                let mut handler = self.scope.clone();
                handler.push(name.to_string());
                self.push(handler.join("::"), &path, method);
            }
        }
    }

    fn method_call_routes(&mut self, node: &ExprMethodCall) {
        let method = node.method.to_string();
        if method == "route" {
            let (path, router) = match (node.args.first(), node.args.iter().nth(1)) {
                (Some(path), Some(router)) => (string_literal(path), router),
                (Some(router), None) => (chain_root(&node.receiver, "resource"), router),
                _ => return,
            };
            if let Some(path) = path {
                let full_path = combine_paths(&self.prefix, &path);
                for (method, handler) in method_router(router) {
                    self.push(handler, &full_path, method);
                }
            }
        } else if ROUTE_VERBS.contains(&method.as_str()) && node.args.len() == 2 {
            let path = string_literal(&node.args[0]);
            let handler = handler_path(&node.args[1]);
            if let (Some(path), Some(handler), Ok(method)) = (path, handler, HttpMethod::from_str(&method)) {
                let full_path = combine_paths(&self.prefix, &path);
                self.push(handler, &full_path, method);
            }
        }
    }
}

impl<'ast> Visit<'ast> for RouteScanner {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if node.content.is_some() {
            self.scope.push(node.ident.to_string());
            syn::visit::visit_item_mod(self, node);
            self.scope.pop();
        }
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.attribute_routes(&node.attrs, &node.sig.ident);
        syn::visit::visit_item_fn(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        self.visit_expr(&node.receiver);

        let saved = self.prefix.clone();
        if let Some(root) = chain_root(&node.receiver, "scope") {
            self.prefix = combine_paths(&self.prefix, &root);
        }

        let nested = match node.method.to_string().as_str() {
            "nest" | "scope" => node.args.first().and_then(string_literal),
            _ => None,
        };
        match nested {
            Some(prefix) => {
                self.prefix = combine_paths(&self.prefix, &prefix);
                for arg in node.args.iter().skip(1) {
                    self.visit_expr(arg);
                }
            }
            None => {
                self.method_call_routes(node);
                for arg in &node.args {
                    self.visit_expr(arg);
                }
            }
        }
        self.prefix = saved;
    }
}
