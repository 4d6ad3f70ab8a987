//! Call-site inspection of handler bodies.
//!
//! The inspector walks a handler body looking for method calls on known
//! receivers (a gin-like `Context` by default) and turns each recognized call
//! into a parameter or response descriptor. What a call means is pure data in
//! an [`AccessorTable`], so other request APIs can be described from
//! configuration.

use convert_case::{Case, Casing};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use syn::visit::{self, Visit};
use syn::{Expr, Lit};

use crate::http;
use crate::operation::{Origin, ParamAttrs, ParamDescriptor, ParamLocation, ResponseDescriptor, ResponseKind};
use crate::source::{HandlerDecl, SourceLocation};
use crate::types::TypeExpr;
use crate::universe::TypeUniverse;

/// Wire type of a parameter read through an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    StringArray,
    Object,
}

impl ValueType {
    fn type_expr(&self) -> TypeExpr {
        match self {
            ValueType::String => TypeExpr::named("string"),
            ValueType::StringArray => TypeExpr::Array(Box::new(TypeExpr::named("string"))),
            ValueType::Object => TypeExpr::named("object"),
        }
    }
}

/// What a recognized call tells about the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum InferenceRule {
    /// Reads one named request value; the name is a string literal argument
    Param {
        location: ParamLocation,
        name_arg: usize,
        value_type: ValueType,
        #[serde(default)]
        required: bool,
        /// Argument holding the default value
        #[serde(default)]
        default_arg: Option<usize>,
    },
    /// Deserializes the request into a typed value, taken from the turbofish,
    /// the target argument or the binding it is assigned to
    Bind {
        location: ParamLocation,
        #[serde(default)]
        target_arg: Option<usize>,
        #[serde(default)]
        required: bool,
    },
    /// Writes a response
    Respond { status_arg: usize, payload_arg: usize },
    /// Writes a response in an encoding the document cannot describe
    UnsupportedEncoding { encoding: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessorEntry {
    /// Last path segment of the receiver type
    pub receiver: String,
    pub method: String,
    #[serde(flatten)]
    pub rule: InferenceRule,
}

impl AccessorEntry {
    pub fn new(receiver: &str, method: &str, rule: InferenceRule) -> Self {
        Self {
            receiver: receiver.to_string(),
            method: method.to_string(),
            rule,
        }
    }
}

/// `(receiver, method) -> rule` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessorTable {
    entries: Vec<AccessorEntry>,
}

impl Default for AccessorTable {
    /// Accessors of a gin-like `Context`.
    fn default() -> Self {
        const RECEIVER: &str = "Context";
        let param = |location, value_type, required, default_arg| InferenceRule::Param {
            location,
            name_arg: 0,
            value_type,
            required,
            default_arg,
        };
        let mut entries = Vec::new();
        for method in ["query", "get_query"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                method,
                param(ParamLocation::Query, ValueType::String, false, None),
            ));
        }
        for method in ["query_map", "get_query_map"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                method,
                param(ParamLocation::Query, ValueType::Object, false, None),
            ));
        }
        for method in ["query_array", "get_query_array"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                method,
                param(ParamLocation::Query, ValueType::StringArray, false, None),
            ));
        }
        entries.push(AccessorEntry::new(
            RECEIVER,
            "default_query",
            param(ParamLocation::Query, ValueType::String, false, Some(1)),
        ));
        entries.push(AccessorEntry::new(
            RECEIVER,
            "param",
            param(ParamLocation::Path, ValueType::String, true, None),
        ));
        for method in ["get_header", "header"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                method,
                param(ParamLocation::Header, ValueType::String, false, None),
            ));
        }
        for method in ["bind_query", "should_bind_query"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                method,
                InferenceRule::Bind {
                    location: ParamLocation::Query,
                    target_arg: Some(0),
                    required: false,
                },
            ));
        }
        for method in ["bind_json", "should_bind_json"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                method,
                InferenceRule::Bind {
                    location: ParamLocation::Body,
                    target_arg: Some(0),
                    required: true,
                },
            ));
        }
        for method in ["json", "jsonp"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                method,
                InferenceRule::Respond {
                    status_arg: 0,
                    payload_arg: 1,
                },
            ));
        }
        for encoding in ["xml", "yaml", "protobuf", "toml"] {
            entries.push(AccessorEntry::new(
                RECEIVER,
                encoding,
                InferenceRule::UnsupportedEncoding {
                    encoding: encoding.to_string(),
                },
            ));
        }
        Self { entries }
    }
}

impl AccessorTable {
    pub fn new(entries: Vec<AccessorEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AccessorEntry] {
        &self.entries
    }

    /// First rule registered for the call.
    pub fn lookup(&self, receiver: &str, method: &str) -> Option<&InferenceRule> {
        self.entries
            .iter()
            .find(|entry| entry.receiver == receiver && entry.method == method)
            .map(|entry| &entry.rule)
    }

    /// Receiver type names; a handler taking one of them is inspected even
    /// without annotations.
    pub fn receivers(&self) -> BTreeSet<String> {
        self.entries.iter().map(|entry| entry.receiver.clone()).collect()
    }
}

/// Descriptors inferred from one handler body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inferred {
    pub params: Vec<ParamDescriptor>,
    pub success: Option<ResponseDescriptor>,
    pub failures: Vec<ResponseDescriptor>,
}

impl Inferred {
    fn add_param(&mut self, param: ParamDescriptor) {
        if self.params.iter().any(|existing| existing.name == param.name) {
            return;
        }
        self.params.push(param);
    }

    fn add_response(&mut self, code: String, ty: Option<TypeExpr>) {
        if code == "200" {
            if self.success.is_none() {
                self.success = Some(inferred_response(ResponseKind::Success, code, ty));
            }
            return;
        }
        self.failures
            .push(inferred_response(ResponseKind::Failure, code, ty));
    }
}

fn inferred_response(kind: ResponseKind, code: String, ty: Option<TypeExpr>) -> ResponseDescriptor {
    ResponseDescriptor {
        kind,
        codes: vec![code],
        ty,
        description: None,
        origin: Origin::Inferred,
    }
}

/// Infers parameters and responses from handler bodies.
pub struct CallSiteInspector<'u> {
    table: AccessorTable,
    universe: &'u dyn TypeUniverse,
    /// Unsupported encodings already reported during this run
    warned_encodings: HashSet<String>,
}

impl<'u> CallSiteInspector<'u> {
    pub fn new(table: AccessorTable, universe: &'u dyn TypeUniverse) -> Self {
        Self {
            table,
            universe,
            warned_encodings: HashSet::new(),
        }
    }

    pub fn table(&self) -> &AccessorTable {
        &self.table
    }

    pub fn inspect(&mut self, decl: &HandlerDecl) -> Inferred {
        debug!("Inspecting body of {}", decl.qualified_name);
        let locals = decl.inputs.iter().cloned().collect();
        let mut visitor = BodyVisitor {
            inspector: self,
            decl,
            locals,
            binding: None,
            inferred: Inferred::default(),
        };
        visitor.visit_block(&decl.body);
        visitor.inferred
    }
}

/// The `let` a call is the initializer of.
struct Binding {
    name: String,
    ty: Option<TypeExpr>,
}

struct BodyVisitor<'a, 'u> {
    inspector: &'a mut CallSiteInspector<'u>,
    decl: &'a HandlerDecl,
    /// Known local variable types
    locals: HashMap<String, TypeExpr>,
    binding: Option<Binding>,
    inferred: Inferred,
}

impl BodyVisitor<'_, '_> {
    fn location(&self, span: proc_macro2::Span) -> SourceLocation {
        SourceLocation::from_span(&self.decl.location.file, span)
    }

    /// Static type of an expression, when it can be told locally.
    fn infer_type(&self, expr: &Expr) -> Option<TypeExpr> {
        match expr {
            Expr::Path(path) => {
                let ident = path.path.get_ident()?;
                self.locals.get(&ident.to_string()).cloned()
            }
            Expr::Reference(reference) => self.infer_type(&reference.expr),
            Expr::Paren(paren) => self.infer_type(&paren.expr),
            Expr::Group(group) => self.infer_type(&group.expr),
            Expr::Unary(unary) => self.infer_type(&unary.expr),
            Expr::Try(try_expr) => self.infer_type(&try_expr.expr),
            Expr::Cast(cast) => Some(TypeExpr::from_syn(&cast.ty)),
            Expr::Struct(literal) => Some(TypeExpr::from_path(&literal.path)),
            Expr::Lit(literal) => match &literal.lit {
                Lit::Str(_) => Some(TypeExpr::named("String")),
                Lit::Int(_) => Some(TypeExpr::named("i64")),
                Lit::Float(_) => Some(TypeExpr::named("f64")),
                Lit::Bool(_) => Some(TypeExpr::named("bool")),
                _ => None,
            },
            Expr::Macro(mac) => {
                let name = mac.mac.path.segments.last()?.ident.to_string();
                match name.as_str() {
                    "json" => Some(TypeExpr::Any),
                    "format" => Some(TypeExpr::named("String")),
                    _ => None,
                }
            }
            Expr::MethodCall(call) => match call.method.to_string().as_str() {
                "clone" | "to_owned" | "unwrap" | "expect" | "unwrap_or_default" => {
                    self.infer_type(&call.receiver)
                }
                "to_string" => Some(TypeExpr::named("String")),
                _ => None,
            },
            Expr::Call(call) => self.infer_call_type(call),
            _ => None,
        }
    }

    fn infer_call_type(&self, call: &syn::ExprCall) -> Option<TypeExpr> {
        let Expr::Path(func) = &*call.func else {
            return None;
        };
        let segments: Vec<String> = func
            .path
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        let last = segments.last()?;

        // payload wrappers
        if matches!(last.as_str(), "Json" | "Some" | "Ok" | "Box" | "Arc" | "Rc") && segments.len() == 1 {
            return call.args.first().and_then(|arg| self.infer_type(arg));
        }
        if segments.len() >= 2 {
            let owner = &segments[segments.len() - 2];
            if owner.starts_with(char::is_uppercase) {
                if matches!(owner.as_str(), "Box" | "Arc" | "Rc") {
                    return call.args.first().and_then(|arg| self.infer_type(arg));
                }
                // `T::new(..)` and other associated constructors
                let type_path = segments[..segments.len() - 1].join("::");
                return Some(TypeExpr::named(&type_path));
            }
        }
        self.inspector
            .universe
            .find_function_output(&segments.join("::"), &self.decl.scope)
            .cloned()
    }

    /// HTTP status written by an expression; `default` when it is not static.
    fn eval_status(&self, expr: &Expr) -> String {
        self.static_status(expr)
            .map(|code| code.to_string())
            .unwrap_or_else(|| "default".to_string())
    }

    fn static_status(&self, expr: &Expr) -> Option<u16> {
        match expr {
            Expr::Lit(literal) => match &literal.lit {
                Lit::Int(int) => int.base10_parse().ok(),
                _ => None,
            },
            Expr::Path(path) => {
                let segments: Vec<_> = path.path.segments.iter().collect();
                let [.., owner, name] = segments.as_slice() else {
                    return None;
                };
                if owner.ident != "StatusCode" {
                    return None;
                }
                http::status_from_name(&name.ident.to_string())
            }
            Expr::Reference(reference) => self.static_status(&reference.expr),
            Expr::Paren(paren) => self.static_status(&paren.expr),
            Expr::Group(group) => self.static_status(&group.expr),
            Expr::Try(try_expr) => self.static_status(&try_expr.expr),
            Expr::MethodCall(call) => match call.method.to_string().as_str() {
                "as_u16" | "into" | "unwrap" | "expect" => self.static_status(&call.receiver),
                _ => None,
            },
            Expr::Call(call) => {
                let Expr::Path(func) = &*call.func else {
                    return None;
                };
                let last = func.path.segments.last()?;
                if last.ident == "from_u16" {
                    call.args.first().and_then(|arg| self.static_status(arg))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn string_arg(call: &syn::ExprMethodCall, index: usize) -> Option<String> {
        match call.args.iter().nth(index)? {
            Expr::Lit(syn::ExprLit { lit: Lit::Str(text), .. }) => Some(text.value()),
            Expr::Lit(syn::ExprLit { lit: Lit::Int(int), .. }) => Some(int.base10_digits().to_string()),
            Expr::Lit(syn::ExprLit { lit: Lit::Bool(flag), .. }) => Some(flag.value.to_string()),
            _ => None,
        }
    }

    fn apply_rule(&mut self, call: &syn::ExprMethodCall, rule: &InferenceRule) {
        let location = self.location(call.method.span());
        match rule {
            InferenceRule::Param {
                location: param_location,
                name_arg,
                value_type,
                required,
                default_arg,
            } => {
                let Some(name) = Self::string_arg(call, *name_arg) else {
                    debug!("{}: `{}` called without a literal name, skipped", location, call.method);
                    return;
                };
                let default = default_arg.and_then(|index| Self::string_arg(call, index));
                self.inferred.add_param(ParamDescriptor {
                    description: Some(name.clone()),
                    name,
                    location: *param_location,
                    ty: value_type.type_expr(),
                    required: *required || *param_location == ParamLocation::Path,
                    attrs: ParamAttrs {
                        default,
                        ..Default::default()
                    },
                    origin: Origin::Inferred,
                });
            }
            InferenceRule::Bind {
                location: param_location,
                target_arg,
                required,
            } => {
                let target = target_arg.and_then(|index| call.args.iter().nth(index));
                let turbofish = call.turbofish.as_ref().and_then(|args| {
                    args.args.iter().find_map(|arg| match arg {
                        syn::GenericArgument::Type(ty) => Some(TypeExpr::from_syn(ty)),
                        _ => None,
                    })
                });
                let ty = turbofish
                    .or_else(|| target.and_then(|target| self.infer_type(target)))
                    .or_else(|| self.binding.as_ref().and_then(|binding| binding.ty.clone()));
                let Some(ty) = ty else {
                    debug!("{}: cannot tell the type bound by `{}`", location, call.method);
                    return;
                };
                let name = target
                    .and_then(target_name)
                    .or_else(|| self.binding.as_ref().map(|binding| binding.name.clone()))
                    .unwrap_or_else(|| ty.display_name().to_case(Case::Snake));
                self.inferred.add_param(ParamDescriptor {
                    description: Some(name.clone()),
                    name,
                    location: *param_location,
                    ty,
                    required: *required,
                    attrs: ParamAttrs::default(),
                    origin: Origin::Inferred,
                });
            }
            InferenceRule::Respond {
                status_arg,
                payload_arg,
            } => {
                let Some(status) = call.args.iter().nth(*status_arg) else {
                    return;
                };
                let code = self.eval_status(status);
                let ty = call
                    .args
                    .iter()
                    .nth(*payload_arg)
                    .and_then(|payload| self.infer_type(payload));
                if ty.is_none() {
                    debug!("{}: payload type of `{}` is unknown", location, call.method);
                }
                self.inferred.add_response(code, ty);
            }
            InferenceRule::UnsupportedEncoding { encoding } => {
                if self.inspector.warned_encodings.insert(encoding.clone()) {
                    warn!(
                        "{}: {}: `{}` responses are not supported, skipping",
                        location, self.decl.qualified_name, encoding
                    );
                }
            }
        }
    }
}

/// Variable name of a bind target such as `&mut body`.
fn target_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path) => path.path.get_ident().map(|ident| ident.to_string()),
        Expr::Reference(reference) => target_name(&reference.expr),
        _ => None,
    }
}

impl<'ast> Visit<'ast> for BodyVisitor<'_, '_> {
    fn visit_local(&mut self, node: &'ast syn::Local) {
        let (name, declared) = match &node.pat {
            syn::Pat::Type(pat_type) => match &*pat_type.pat {
                syn::Pat::Ident(ident) => (
                    Some(ident.ident.to_string()),
                    Some(TypeExpr::from_syn(&pat_type.ty)),
                ),
                _ => (None, None),
            },
            syn::Pat::Ident(ident) => (Some(ident.ident.to_string()), None),
            _ => (None, None),
        };

        if let Some(init) = &node.init {
            let previous = self.binding.take();
            self.binding = name.clone().map(|name| Binding {
                name,
                ty: declared.clone(),
            });
            self.visit_expr(&init.expr);
            self.binding = previous;
            if let Some((_, diverge)) = &init.diverge {
                self.visit_expr(diverge);
            }
        }

        if let Some(name) = name {
            let ty = declared.or_else(|| node.init.as_ref().and_then(|init| self.infer_type(&init.expr)));
            match ty {
                Some(ty) => {
                    self.locals.insert(name, ty);
                }
                None => {
                    self.locals.remove(&name);
                }
            }
        }
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        visit::visit_expr_method_call(self, node);

        let Some(receiver) = self.infer_type(&node.receiver) else {
            return;
        };
        let Some(receiver) = receiver.base_name().map(str::to_string) else {
            return;
        };
        let method = node.method.to_string();
        let Some(rule) = self.inspector.table.lookup(&receiver, &method).cloned() else {
            return;
        };
        self.apply_rule(node, &rule);
    }
}
