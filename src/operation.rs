//! Operation annotations parsed from a handler's doc comments.
//!
//! [`OperationParser`] turns the ordered doc lines of one handler into an
//! [`Operation`]. Call-site inference is merged in afterwards with
//! [`Operation::merge_inferred`]; annotated data always wins.

use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::attribute::{self, AttributeKind};
use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::inspector::Inferred;
use crate::markdown::MarkdownSource;
use crate::source::{DocLine, HandlerDecl, SourceLocation};
use crate::types::TypeExpr;

static PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+)\s+(\S+)\s+(\S+)\s+(\S+)(?:\s+"([^"]*)")?(.*)$"#).unwrap()
});
static PARAM_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\(([^)]*)\)").unwrap());
static RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([\w,]+)(?:\s+\{(\w+)\}\s+(\S+))?(?:\s+"?([^"]*)"?)?\s*$"#).unwrap()
});
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([\w,]+)\s+\{(\w+)\}\s+(\S+)(?:\s+"?([^"]*)"?)?\s*$"#).unwrap()
});
static ROUTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+\[(\w+)\](?:\s+(\S+))?\s*$").unwrap());
static SECURITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)(?:\[([^\]]*)\])?$").unwrap());

/// Where a parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    Query,
    Path,
    Header,
    Body,
    FormData,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Query => "query",
            ParamLocation::Path => "path",
            ParamLocation::Header => "header",
            ParamLocation::Body => "body",
            ParamLocation::FormData => "formData",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "query" => Ok(ParamLocation::Query),
            "path" => Ok(ParamLocation::Path),
            "header" => Ok(ParamLocation::Header),
            "body" => Ok(ParamLocation::Body),
            "formdata" => Ok(ParamLocation::FormData),
            other => Err(format!("unknown parameter location `{}`", other)),
        }
    }
}

/// Whether a descriptor was written by hand or inferred from the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Origin {
    #[default]
    Annotated,
    Inferred,
}

/// Optional `name(value)` suffixes of an `@Param` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamAttrs {
    pub default: Option<String>,
    pub enums: Option<Vec<String>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    pub format: Option<String>,
    pub example: Option<String>,
    pub collection_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    pub name: String,
    pub location: ParamLocation,
    pub ty: TypeExpr,
    pub required: bool,
    pub description: Option<String>,
    pub attrs: ParamAttrs,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Success,
    Failure,
    Response,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    pub kind: ResponseKind,
    /// Status codes, or `default`
    pub codes: Vec<String>,
    /// Payload type, if any
    pub ty: Option<TypeExpr>,
    pub description: Option<String>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderDescriptor {
    /// Status codes the header is sent with; `all` applies to every response
    pub codes: Vec<String>,
    pub header_type: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDeclaration {
    pub path: String,
    pub method: HttpMethod,
    pub tag: Option<String>,
    pub location: SourceLocation,
}

/// Everything known about one handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Function name
    pub name: String,
    pub qualified_name: String,
    /// Scope types are resolved from
    pub scope: String,
    pub location: SourceLocation,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub id: Option<String>,
    pub tags: Vec<String>,
    pub accept: Vec<String>,
    pub produce: Vec<String>,
    pub params: Vec<ParamDescriptor>,
    pub success: Option<ResponseDescriptor>,
    pub response: Option<ResponseDescriptor>,
    pub failures: Vec<ResponseDescriptor>,
    pub headers: Vec<HeaderDescriptor>,
    pub route: Option<RouteDeclaration>,
    /// One requirement object per `@Security` line
    pub security: Vec<BTreeMap<String, Vec<String>>>,
    pub deprecated: bool,
    pub extensions: BTreeMap<String, Value>,
    /// Lines that are not annotations, kept verbatim
    pub others: Vec<String>,
}

impl Operation {
    pub fn new(decl: &HandlerDecl) -> Self {
        Self {
            name: decl.name.clone(),
            qualified_name: decl.qualified_name.clone(),
            scope: decl.scope.clone(),
            location: decl.location.clone(),
            summary: None,
            description: None,
            id: None,
            tags: Vec::new(),
            accept: Vec::new(),
            produce: Vec::new(),
            params: Vec::new(),
            success: None,
            response: None,
            failures: Vec::new(),
            headers: Vec::new(),
            route: None,
            security: Vec::new(),
            deprecated: false,
            extensions: BTreeMap::new(),
            others: Vec::new(),
        }
    }

    /// All responses: success, the generic response, then failures.
    pub fn responses(&self) -> impl Iterator<Item = &ResponseDescriptor> {
        self.success
            .iter()
            .chain(self.response.iter())
            .chain(self.failures.iter())
    }

    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Fills the gaps left by annotations with inferred descriptors.
    ///
    /// Parameters are matched by name, the success slot keeps its first
    /// occupant, and failures whose codes are already annotated are dropped.
    /// Parameters and failures end up in lexicographic order.
    pub fn merge_inferred(&mut self, inferred: Inferred) {
        for param in inferred.params {
            if self.param(&param.name).is_some() {
                debug!(
                    "{}: keeping annotated parameter `{}` over inferred one",
                    self.location, param.name
                );
                continue;
            }
            self.params.push(param);
        }

        if self.success.is_none() {
            self.success = inferred.success;
        }

        for failure in inferred.failures {
            let annotated = self
                .responses()
                .any(|existing| existing.codes.iter().any(|code| failure.codes.contains(code)));
            if !annotated {
                self.failures.push(failure);
            }
        }

        self.params.sort_by(|a, b| a.name.cmp(&b.name));
        self.failures.sort_by(|a, b| a.codes.cmp(&b.codes));
    }

    /// The operation written back as annotation lines, sorted.
    pub fn render_annotations(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(summary) = &self.summary {
            lines.push(format!("@Summary {}", summary));
        }
        if let Some(description) = &self.description {
            lines.extend(description.lines().map(|line| format!("@Description {}", line)));
        }
        for param in &self.params {
            let mut line = format!(
                "@Param {} {} {} {}",
                param.name,
                param.location,
                param.ty.display_name(),
                param.required
            );
            if let Some(description) = &param.description {
                line.push_str(&format!(" \"{}\"", description));
            }
            if let Some(default) = &param.attrs.default {
                line.push_str(&format!(" default({})", default));
            }
            lines.push(line);
        }
        for response in self.responses() {
            let keyword = match response.kind {
                ResponseKind::Success => "@Success",
                ResponseKind::Failure => "@Failure",
                ResponseKind::Response => "@Response",
            };
            let mut line = format!("{} {}", keyword, response.codes.join(","));
            if let Some(ty) = &response.ty {
                let shape = match ty {
                    TypeExpr::Array(_) => "array",
                    _ => "object",
                };
                let name = match ty {
                    TypeExpr::Array(element) => element.display_name(),
                    other => other.display_name(),
                };
                line.push_str(&format!(" {{{}}} {}", shape, name));
            }
            if let Some(description) = &response.description {
                line.push_str(&format!(" \"{}\"", description));
            }
            lines.push(line);
        }
        for header in &self.headers {
            lines.push(format!(
                "@Header {} {{{}}} {}",
                header.codes.join(","),
                header.header_type,
                header.name
            ));
        }
        if !self.accept.is_empty() {
            lines.push(format!("@Accept {}", self.accept.join(",")));
        }
        if !self.produce.is_empty() {
            lines.push(format!("@Produce {}", self.produce.join(",")));
        }
        if let Some(route) = &self.route {
            let mut line = format!("@Router {} [{}]", route.path, route.method.as_str().to_lowercase());
            if let Some(tag) = &route.tag {
                line.push_str(&format!(" {}", tag));
            }
            lines.push(line);
        }
        lines.extend(self.others.iter().cloned());
        lines.sort();
        lines
    }
}

/// Parses the doc lines of a handler into an [`Operation`].
pub struct OperationParser<'a> {
    markdown: Option<&'a dyn MarkdownSource>,
}

impl<'a> OperationParser<'a> {
    pub fn new(markdown: Option<&'a dyn MarkdownSource>) -> Self {
        Self { markdown }
    }

    pub fn parse(&self, decl: &HandlerDecl) -> Result<Operation> {
        debug!("Parsing annotations of {}", decl.qualified_name);
        let mut operation = Operation::new(decl);
        let mut previous: Option<AttributeKind> = None;

        for line in &decl.doc_lines {
            let attr = attribute::tokenize(&line.text);
            if attr.text.is_empty() {
                previous = None;
                continue;
            }
            let continued = previous == Some(attr.kind);
            self.apply(&mut operation, line, &attr, continued)?;
            previous = Some(attr.kind);
        }

        if operation.summary.is_none() {
            operation.summary = Some(decl.name.clone());
        }
        Ok(operation)
    }

    fn apply(
        &self,
        operation: &mut Operation,
        line: &DocLine,
        attr: &attribute::Attribute,
        continued: bool,
    ) -> Result<()> {
        let value = attr.value.as_str();
        let location = &line.location;
        match attr.kind {
            AttributeKind::Summary => operation.summary = Some(value.to_string()),
            AttributeKind::Description => {
                let description = operation.description.get_or_insert_with(String::new);
                if continued {
                    description.push('\n');
                } else {
                    description.clear();
                }
                description.push_str(value);
            }
            AttributeKind::DescriptionMarkdown => {
                let tag = if value.is_empty() { operation.name.as_str() } else { value };
                match self.markdown {
                    Some(source) => operation.description = Some(source.markdown_for(tag)?),
                    None => warn!(
                        "{}: @Description.markdown used but no markdown directory is configured",
                        location
                    ),
                }
            }
            AttributeKind::Id => operation.id = Some(value.to_string()),
            AttributeKind::Tags => operation.tags.extend(split_list(value)),
            AttributeKind::Accept => {
                if operation.accept.is_empty() {
                    operation.accept =
                        attribute::parse_mime_list(value).map_err(|message| Error::malformed(location, message))?;
                }
            }
            AttributeKind::Produce => {
                if operation.produce.is_empty() {
                    operation.produce =
                        attribute::parse_mime_list(value).map_err(|message| Error::malformed(location, message))?;
                }
            }
            AttributeKind::Param => {
                let param = parse_param(value, location)?;
                if operation.param(&param.name).is_some() {
                    debug!("{}: duplicate @Param `{}` ignored", location, param.name);
                } else {
                    operation.params.push(param);
                }
            }
            AttributeKind::Success => {
                let response = parse_response(ResponseKind::Success, value, location)?;
                if operation.success.is_none() {
                    operation.success = Some(response);
                }
            }
            AttributeKind::Response => {
                let response = parse_response(ResponseKind::Response, value, location)?;
                if operation.response.is_none() {
                    operation.response = Some(response);
                }
            }
            AttributeKind::Failure => {
                operation
                    .failures
                    .push(parse_response(ResponseKind::Failure, value, location)?);
            }
            AttributeKind::Header => operation.headers.push(parse_header(value, location)?),
            AttributeKind::Router => {
                let route = parse_router(value, location)?;
                if operation.route.is_none() {
                    operation.route = Some(route);
                }
            }
            AttributeKind::Security => operation.security.push(parse_security(value, location)?),
            AttributeKind::Deprecated => operation.deprecated = true,
            AttributeKind::Extension => {
                let (name, value) = parse_extension(attr, location)?;
                operation.extensions.insert(name, value);
            }
            AttributeKind::Other => operation.others.push(attr.text.clone()),
            kind => {
                debug!("{}: {:?} ignored on operation {}", location, kind, operation.name);
                operation.others.push(attr.text.clone());
            }
        }
        Ok(())
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

fn parse_param(value: &str, location: &SourceLocation) -> Result<ParamDescriptor> {
    let captures = PARAM.captures(value).ok_or_else(|| {
        Error::malformed(location, format!("@Param `{}` must be `name location type required \"description\"`", value))
    })?;
    let name = captures[1].to_string();
    let param_location = ParamLocation::from_str(&captures[2])
        .map_err(|message| Error::malformed(location, message))?;
    let ty = TypeExpr::parse_annotation(&captures[3]);
    let mut required = match captures[4].to_lowercase().as_str() {
        "true" => true,
        "false" => false,
        other => {
            return Err(Error::malformed(
                location,
                format!("@Param `{}`: required must be true or false, got `{}`", name, other),
            ))
        }
    };

    let rest = captures.get(6).map_or("", |m| m.as_str());
    let attrs = parse_param_attrs(rest, location)?;
    let description = match captures.get(5) {
        Some(quoted) => Some(quoted.as_str().to_string()),
        None => {
            let plain = PARAM_ATTR.replace_all(rest, "");
            let plain = plain.trim();
            (!plain.is_empty()).then(|| plain.to_string())
        }
    };

    if param_location == ParamLocation::Path && !required {
        warn!("{}: path parameter `{}` is always required", location, name);
        required = true;
    }

    Ok(ParamDescriptor {
        name,
        location: param_location,
        ty,
        required,
        description,
        attrs,
        origin: Origin::Annotated,
    })
}

fn parse_param_attrs(rest: &str, location: &SourceLocation) -> Result<ParamAttrs> {
    let mut attrs = ParamAttrs::default();
    for captures in PARAM_ATTR.captures_iter(rest) {
        let key = captures[1].to_lowercase();
        let value = captures[2].trim().to_string();
        let number = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|_| Error::malformed(location, format!("{}({}) is not a number", key, value)))
        };
        let integer = |value: &str| {
            value
                .parse::<i64>()
                .map_err(|_| Error::malformed(location, format!("{}({}) is not an integer", key, value)))
        };
        match key.as_str() {
            "default" => attrs.default = Some(value),
            "enums" => attrs.enums = Some(split_list(&value).collect()),
            "minimum" => attrs.minimum = Some(number(&value)?),
            "maximum" => attrs.maximum = Some(number(&value)?),
            "minlength" => attrs.min_length = Some(integer(&value)?),
            "maxlength" => attrs.max_length = Some(integer(&value)?),
            "format" => attrs.format = Some(value),
            "example" => attrs.example = Some(value),
            "collectionformat" => attrs.collection_format = Some(value),
            _ => debug!("{}: unknown parameter attribute `{}` ignored", location, key),
        }
    }
    Ok(attrs)
}

fn parse_codes(raw: &str, location: &SourceLocation) -> Result<Vec<String>> {
    let codes: Vec<String> = split_list(raw).collect();
    for code in &codes {
        let valid = code == "default" || code == "all" || code.parse::<u16>().is_ok();
        if !valid {
            return Err(Error::malformed(location, format!("invalid status code `{}`", code)));
        }
    }
    Ok(codes)
}

fn parse_response(kind: ResponseKind, value: &str, location: &SourceLocation) -> Result<ResponseDescriptor> {
    let captures = RESPONSE.captures(value).ok_or_else(|| {
        Error::malformed(location, format!("response `{}` must be `code {{shape}} Type \"description\"`", value))
    })?;
    let codes = parse_codes(&captures[1], location)?;
    if codes.iter().any(|code| code == "all") {
        return Err(Error::malformed(location, "`all` is only valid on @Header"));
    }

    let ty = match (captures.get(2), captures.get(3)) {
        (Some(shape), Some(ty)) => {
            let element = TypeExpr::parse_annotation(ty.as_str());
            match shape.as_str().to_lowercase().as_str() {
                "array" => Some(TypeExpr::Array(Box::new(element))),
                "object" | "string" | "integer" | "number" | "boolean" | "file" | "primitive" => {
                    Some(element)
                }
                other => {
                    return Err(Error::malformed(location, format!("unknown response shape `{{{}}}`", other)))
                }
            }
        }
        _ => None,
    };
    let description = captures
        .get(4)
        .map(|m| m.as_str().trim().to_string())
        .filter(|description| !description.is_empty());

    Ok(ResponseDescriptor {
        kind,
        codes,
        ty,
        description,
        origin: Origin::Annotated,
    })
}

fn parse_header(value: &str, location: &SourceLocation) -> Result<HeaderDescriptor> {
    let captures = HEADER.captures(value).ok_or_else(|| {
        Error::malformed(location, format!("@Header `{}` must be `code {{type}} Name \"description\"`", value))
    })?;
    Ok(HeaderDescriptor {
        codes: parse_codes(&captures[1], location)?,
        header_type: captures[2].to_string(),
        name: captures[3].to_string(),
        description: captures
            .get(4)
            .map(|m| m.as_str().trim().to_string())
            .filter(|description| !description.is_empty()),
    })
}

fn parse_router(value: &str, location: &SourceLocation) -> Result<RouteDeclaration> {
    let captures = ROUTER
        .captures(value)
        .ok_or_else(|| Error::malformed(location, format!("@Router `{}` must be `/path [method]`", value)))?;
    let method = HttpMethod::from_str(&captures[2]).map_err(|message| Error::malformed(location, message))?;
    Ok(RouteDeclaration {
        path: captures[1].to_string(),
        method,
        tag: captures.get(3).map(|m| m.as_str().to_string()),
        location: location.clone(),
    })
}

fn parse_security(value: &str, location: &SourceLocation) -> Result<BTreeMap<String, Vec<String>>> {
    let mut requirement = BTreeMap::new();
    for option in value.split("||").map(str::trim).filter(|option| !option.is_empty()) {
        let compact: String = option.split_whitespace().collect();
        let captures = SECURITY
            .captures(&compact)
            .ok_or_else(|| Error::malformed(location, format!("invalid @Security `{}`", option)))?;
        let scopes = captures
            .get(2)
            .map(|scopes| split_list(scopes.as_str()).collect())
            .unwrap_or_default();
        requirement.insert(captures[1].to_string(), scopes);
    }
    if requirement.is_empty() {
        return Err(Error::malformed(location, "@Security needs a scheme name"));
    }
    Ok(requirement)
}

/// `@x-name <json>` into (`x-name`, value).
pub fn parse_extension(attr: &attribute::Attribute, location: &SourceLocation) -> Result<(String, Value)> {
    let name = attr.name.trim_start_matches('@').to_string();
    if attr.value.is_empty() {
        return Err(Error::malformed(location, format!("annotation {} need a value", attr.name)));
    }
    let value = serde_json::from_str(&attr.value)
        .map_err(|_| Error::malformed(location, format!("annotation {} need a valid json value", attr.name)))?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::MarkdownDir;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn decl(name: &str, lines: &[&str]) -> HandlerDecl {
        HandlerDecl {
            name: name.to_string(),
            qualified_name: format!("handlers::{}", name),
            scope: "handlers".to_string(),
            location: SourceLocation::new("src/handlers.rs", 1),
            doc_lines: lines
                .iter()
                .enumerate()
                .map(|(i, text)| DocLine::new(*text, SourceLocation::new("src/handlers.rs", i + 1)))
                .collect(),
            inputs: Vec::new(),
            output: None,
            body: syn::parse_quote!({}),
        }
    }

    fn parse(name: &str, lines: &[&str]) -> Result<Operation> {
        OperationParser::new(None).parse(&decl(name, lines))
    }

    #[test]
    fn test_full_operation() {
        let operation = parse(
            "get_user",
            &[
                "@Summary Get a user",
                "@Description Loads one user",
                "@Description by id.",
                "@ID get-user",
                "@Tags users, admin",
                "@Accept json",
                "@Produce json,xml",
                "@Param id path int true \"User ID\" minimum(1)",
                "@Param fields query []string false \"Fields\" collectionFormat(multi) enums(a,b)",
                "@Success 200 {object} models::User \"ok\"",
                "@Failure 404,410 {object} ApiError \"gone\"",
                "@Header 200 {string} X-Token \"token\"",
                "@Router /users/{id} [get]",
                "@Security ApiKeyAuth || OAuth2[read, write]",
                "@Deprecated",
                "@x-rate-limit {\"per_minute\": 10}",
            ],
        )
        .unwrap();

        assert_eq!(operation.summary.as_deref(), Some("Get a user"));
        assert_eq!(operation.description.as_deref(), Some("Loads one user\nby id."));
        assert_eq!(operation.id.as_deref(), Some("get-user"));
        assert_eq!(operation.tags, vec!["users", "admin"]);
        assert_eq!(operation.accept, vec!["application/json"]);
        assert_eq!(operation.produce, vec!["application/json", "text/xml"]);

        let id = operation.param("id").unwrap();
        assert_eq!(id.location, ParamLocation::Path);
        assert_eq!(id.ty, TypeExpr::named("int"));
        assert!(id.required);
        assert_eq!(id.attrs.minimum, Some(1.0));
        let fields = operation.param("fields").unwrap();
        assert_eq!(fields.ty, TypeExpr::Array(Box::new(TypeExpr::named("string"))));
        assert_eq!(fields.attrs.collection_format.as_deref(), Some("multi"));
        assert_eq!(fields.attrs.enums, Some(vec!["a".to_string(), "b".to_string()]));

        let success = operation.success.as_ref().unwrap();
        assert_eq!(success.codes, vec!["200"]);
        assert_eq!(success.ty, Some(TypeExpr::named("models::User")));
        assert_eq!(operation.failures[0].codes, vec!["404", "410"]);
        assert_eq!(operation.headers[0].name, "X-Token");

        let route = operation.route.as_ref().unwrap();
        assert_eq!(route.path, "/users/{id}");
        assert_eq!(route.method, HttpMethod::Get);

        assert_eq!(operation.security.len(), 1);
        assert_eq!(operation.security[0]["ApiKeyAuth"], Vec::<String>::new());
        assert_eq!(operation.security[0]["OAuth2"], vec!["read", "write"]);
        assert!(operation.deprecated);
        assert_eq!(operation.extensions["x-rate-limit"], json!({"per_minute": 10}));
    }

    #[test]
    fn test_description_continuation_only_when_adjacent() {
        let operation = parse(
            "f",
            &["@Description first", "@Summary s", "@Description second", "@Description third"],
        )
        .unwrap();
        assert_eq!(operation.description.as_deref(), Some("second\nthird"));
    }

    #[test]
    fn test_single_slots_keep_first() {
        let operation = parse(
            "f",
            &[
                "@Success 200 {object} First",
                "@Success 201 {object} Second",
                "@Router /a [get]",
                "@Router /b [post]",
                "@Accept json",
                "@Accept xml",
            ],
        )
        .unwrap();
        assert_eq!(operation.success.unwrap().ty, Some(TypeExpr::named("First")));
        assert_eq!(operation.route.unwrap().path, "/a");
        assert_eq!(operation.accept, vec!["application/json"]);
    }

    #[test]
    fn test_summary_synthesized_from_name() {
        let operation = parse("list_items", &["Lists items."]).unwrap();
        assert_eq!(operation.summary.as_deref(), Some("list_items"));
        assert_eq!(operation.others, vec!["Lists items."]);
    }

    #[test]
    fn test_path_param_forced_required() {
        let operation = parse("f", &["@Param id path string false \"id\""]).unwrap();
        assert!(operation.param("id").unwrap().required);
    }

    #[test]
    fn test_response_variants() {
        let operation = parse(
            "f",
            &[
                "@Success 200 {array} Item",
                "@Failure default \"unexpected\"",
                "@Failure 500",
                "@Response 202 {string} string \"accepted\"",
            ],
        )
        .unwrap();
        assert_eq!(
            operation.success.unwrap().ty,
            Some(TypeExpr::Array(Box::new(TypeExpr::named("Item"))))
        );
        assert_eq!(operation.failures[0].codes, vec!["default"]);
        assert_eq!(operation.failures[0].description.as_deref(), Some("unexpected"));
        assert!(operation.failures[1].ty.is_none());
        assert_eq!(operation.response.unwrap().ty, Some(TypeExpr::named("string")));
    }

    #[test]
    fn test_malformed_annotations() {
        let cases = [
            "@Param id nowhere string true",
            "@Param id query string maybe",
            "@Param id",
            "@Success abc {object} User",
            "@Router /users",
            "@Router /users [fetch]",
            "@Accept jsn",
            "@x-flag not json",
            "@x-empty",
        ];
        for line in cases {
            let err = parse("f", &[line]).unwrap_err();
            assert!(
                matches!(err, Error::MalformedAnnotation { .. }),
                "line {:?} gave {:?}",
                line,
                err
            );
        }
    }

    #[test]
    fn test_description_markdown() {
        let temp_dir = TempDir::new().unwrap();
        let path: PathBuf = temp_dir.path().join("get_user.md");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"# Get user").unwrap();

        let markdown = MarkdownDir::new(temp_dir.path());
        let operation = OperationParser::new(Some(&markdown))
            .parse(&decl("get_user", &["@Description.markdown"]))
            .unwrap();
        assert_eq!(operation.description.as_deref(), Some("# Get user"));
    }

    #[test]
    fn test_merge_inferred_explicit_wins() {
        let mut operation = parse(
            "f",
            &["@Param id path string true \"id\"", "@Failure 404 {object} NotFound"],
        )
        .unwrap();
        let inferred_id = ParamDescriptor {
            name: "id".to_string(),
            location: ParamLocation::Path,
            ty: TypeExpr::named("int"),
            required: true,
            description: None,
            attrs: ParamAttrs::default(),
            origin: Origin::Inferred,
        };
        let inferred_q = ParamDescriptor {
            name: "a_query".to_string(),
            location: ParamLocation::Query,
            ty: TypeExpr::named("string"),
            required: false,
            ..inferred_id.clone()
        };
        let response = |kind, code: &str, ty: &str| ResponseDescriptor {
            kind,
            codes: vec![code.to_string()],
            ty: Some(TypeExpr::named(ty)),
            description: None,
            origin: Origin::Inferred,
        };

        operation.merge_inferred(Inferred {
            params: vec![inferred_id, inferred_q],
            success: Some(response(ResponseKind::Success, "200", "User")),
            failures: vec![
                response(ResponseKind::Failure, "404", "Other"),
                response(ResponseKind::Failure, "400", "BadRequest"),
            ],
        });

        let names: Vec<_> = operation.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a_query", "id"]);
        let id = operation.param("id").unwrap();
        assert_eq!(id.origin, Origin::Annotated);
        assert_eq!(id.ty, TypeExpr::named("string"));
        assert_eq!(operation.success.as_ref().unwrap().ty, Some(TypeExpr::named("User")));
        let failures: Vec<_> = operation
            .failures
            .iter()
            .map(|f| (f.codes[0].as_str(), f.ty.as_ref().unwrap().display_name()))
            .collect();
        assert_eq!(failures, vec![("400", "BadRequest".to_string()), ("404", "NotFound".to_string())]);
    }

    #[test]
    fn test_render_annotations_is_sorted() {
        let operation = parse(
            "f",
            &["@Router /a [get]", "@Param q query string false \"q\"", "note"],
        )
        .unwrap();
        let lines = operation.render_annotations();
        assert_eq!(
            lines,
            vec![
                "@Param q query string false \"q\"",
                "@Router /a [get]",
                "@Summary f",
                "note",
            ]
        );
    }
}
