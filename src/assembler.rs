//! Builds the document from finished operations.
//!
//! [`DocumentAssembler`] checks each operation's route against the route table,
//! turns its descriptors into Swagger parameter and response objects through the
//! schema resolver, and files it under its path and method. [`DocumentAssembler::build`]
//! applies the registry's final renames and checks operation ids.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::document::{Document, Header, Parameter, PathOperation, Response};
use crate::error::{Error, Result};
use crate::http::{reason_phrase, HttpMethod};
use crate::operation::{Operation, ParamDescriptor, ParamLocation, RouteDeclaration};
use crate::registry::SchemaRegistry;
use crate::resolver::SchemaResolver;
use crate::routes::{normalize_path, path_params, path_shape, RouteTable};
use crate::schema::{self, Schema, SchemaKind, ARRAY, STRING};
use crate::types::TypeExpr;

/// A route an operation is filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    path: String,
    method: HttpMethod,
    tag: Option<String>,
}

pub struct DocumentAssembler<'r> {
    document: Document,
    routes: Option<&'r RouteTable>,
    strict: bool,
    collection_format_in_query: Option<String>,
    /// Source location of the operation filed under each path and method
    owners: BTreeMap<(String, HttpMethod), String>,
}

impl<'r> DocumentAssembler<'r> {
    /// Starts from a document that already holds the general API information.
    pub fn new(document: Document, routes: Option<&'r RouteTable>, strict: bool) -> Self {
        debug!("Initializing DocumentAssembler");
        Self {
            document,
            routes,
            strict,
            collection_format_in_query: None,
            owners: BTreeMap::new(),
        }
    }

    /// Collection format for array query parameters that do not set one.
    pub fn with_collection_format_in_query(mut self, format: Option<String>) -> Self {
        self.collection_format_in_query = format;
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Adds one operation under every route it is placed on.
    pub fn add_operation(&mut self, operation: &Operation, resolver: &mut SchemaResolver) -> Result<()> {
        let placements = self.placements(operation)?;
        if placements.is_empty() {
            return Ok(());
        }

        let built = self
            .build_operation(operation, resolver)
            .map_err(|err| err.in_operation(&operation.qualified_name, &operation.location))?;

        for placement in placements {
            debug!(
                "Adding operation {} as {} {}",
                operation.qualified_name, placement.method, placement.path
            );
            let mut path_operation = built.clone();
            if path_operation.tags.is_empty() {
                path_operation.tags.extend(placement.tag.clone());
            }
            add_missing_path_params(&mut path_operation, &placement.path);
            self.insert(placement, path_operation, operation)?;
        }
        Ok(())
    }

    /// Applies pending definition renames and checks operation ids.
    pub fn build(mut self, registry: SchemaRegistry) -> Result<Document> {
        debug!("Building final document");
        let (definitions, renames) = registry.finalize();
        if !renames.is_empty() {
            for item in self.document.paths.values_mut() {
                for operation in item.operations_mut() {
                    rewrite_operation_refs(operation, &renames);
                }
            }
        }
        self.document.definitions = definitions;
        self.check_operation_ids()?;
        Ok(self.document)
    }

    fn placements(&self, operation: &Operation) -> Result<Vec<Placement>> {
        match (&operation.route, self.routes) {
            (Some(declared), Some(table)) => {
                self.check_route(operation, declared, table)?;
                Ok(vec![declared_placement(declared)])
            }
            (Some(declared), None) => Ok(vec![declared_placement(declared)]),
            (None, Some(table)) => {
                let entries = table.routes_for(&operation.qualified_name);
                if entries.is_empty() {
                    warn!(
                        "{}: no route is registered for `{}`, operation skipped",
                        operation.location, operation.qualified_name
                    );
                }
                let tag = operation
                    .scope
                    .rsplit("::")
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string);
                Ok(entries
                    .into_iter()
                    .map(|entry| Placement {
                        path: normalize_path(&entry.path),
                        method: entry.method,
                        tag: tag.clone(),
                    })
                    .collect())
            }
            (None, None) => {
                warn!(
                    "{}: `{}` has no @Router and no route table is available, operation skipped",
                    operation.location, operation.qualified_name
                );
                Ok(Vec::new())
            }
        }
    }

    /// Compares a declared route with the routes registered for the same handler.
    ///
    /// A route registered at the same method and path for another handler does
    /// not count.
    fn check_route(&self, operation: &Operation, declared: &RouteDeclaration, table: &RouteTable) -> Result<()> {
        let own = table.routes_for(&operation.qualified_name);
        let shape = path_shape(&declared.path);
        let registered = own
            .iter()
            .any(|entry| entry.method == declared.method && path_shape(&entry.path) == shape);
        if !registered {
            let mut message = format!(
                "declared route {} {} is not registered for this handler",
                declared.method, declared.path
            );
            if own.is_empty() {
                if let Some(owner) = table.find(declared.method, &declared.path) {
                    message.push_str(&format!(", it belongs to `{}`", owner.handler));
                }
            } else {
                let routes: Vec<String> = own
                    .iter()
                    .map(|entry| format!("{} {}", entry.method, entry.path))
                    .collect();
                message.push_str(&format!(", the handler is registered at {}", routes.join(", ")));
            }
            self.mismatch(operation, declared, message)?;
        }

        let expected: BTreeSet<String> = path_params(&declared.path).into_iter().collect();
        let captured: BTreeSet<String> = operation
            .params
            .iter()
            .filter(|param| param.location == ParamLocation::Path)
            .map(|param| param.name.clone())
            .collect();
        if expected != captured {
            self.mismatch(
                operation,
                declared,
                format!(
                    "route {} declares path parameters {:?} but the operation has {:?}",
                    declared.path, expected, captured
                ),
            )?;
        }
        Ok(())
    }

    fn mismatch(&self, operation: &Operation, declared: &RouteDeclaration, message: String) -> Result<()> {
        if self.strict {
            return Err(Error::RouteMismatch {
                operation: operation.qualified_name.clone(),
                location: declared.location.clone(),
                message,
            });
        }
        warn!(
            "{}: operation `{}`: {}",
            declared.location, operation.qualified_name, message
        );
        Ok(())
    }

    fn insert(&mut self, placement: Placement, path_operation: PathOperation, operation: &Operation) -> Result<()> {
        let key = (placement.path.clone(), placement.method);
        let item = self.document.paths.entry(placement.path.clone()).or_default();
        if item.operation(placement.method).is_some() {
            if self.strict {
                return Err(Error::DuplicateRoute {
                    method: placement.method.to_string(),
                    path: placement.path,
                    location: operation.location.clone(),
                });
            }
            let previous = self.owners.get(&key).map(String::as_str).unwrap_or("?");
            warn!(
                "{}: route {} {} is already declared at {}, the later operation `{}` replaces it",
                operation.location, placement.method, placement.path, previous, operation.qualified_name
            );
        }
        item.set(placement.method, path_operation);
        self.owners.insert(key, operation.location.to_string());
        Ok(())
    }

    fn check_operation_ids(&self) -> Result<()> {
        let mut seen: BTreeMap<&str, String> = BTreeMap::new();
        for (path, method, operation) in self.document.operations() {
            let Some(id) = operation.operation_id.as_deref() else {
                continue;
            };
            let current = self
                .owners
                .get(&(path.to_string(), method))
                .cloned()
                .unwrap_or_else(|| format!("{} {}", method, path));
            if let Some(previous) = seen.get(id) {
                return Err(Error::DuplicateOperationId {
                    id: id.to_string(),
                    current,
                    previous: previous.clone(),
                });
            }
            seen.insert(id, current);
        }
        Ok(())
    }

    fn build_operation(&self, operation: &Operation, resolver: &mut SchemaResolver) -> Result<PathOperation> {
        let parameters = operation
            .params
            .iter()
            .map(|param| self.build_parameter(operation, param, resolver))
            .collect::<Result<Vec<_>>>()?;

        Ok(PathOperation {
            tags: operation.tags.clone(),
            summary: operation.summary.clone(),
            description: operation.description.clone(),
            operation_id: operation.id.clone(),
            consumes: operation.accept.clone(),
            produces: operation.produce.clone(),
            parameters,
            responses: build_responses(operation, resolver)?,
            deprecated: operation.deprecated,
            security: operation.security.clone(),
            extensions: operation.extensions.clone(),
        })
    }

    fn build_parameter(
        &self,
        operation: &Operation,
        param: &ParamDescriptor,
        resolver: &mut SchemaResolver,
    ) -> Result<Parameter> {
        let mut parameter = Parameter {
            name: param.name.clone(),
            location: param.location.as_str().to_string(),
            description: param.description.clone(),
            required: param.required,
            ..Default::default()
        };

        if param.location == ParamLocation::Body {
            parameter.schema = Some(resolver.resolve(&param.ty, &operation.scope, true)?);
            return Ok(parameter);
        }

        let resolved = resolver.resolve(&param.ty, &operation.scope, false)?;
        let schema = resolver.dereference(&resolved);
        let invalid = |message: String| {
            Error::malformed(&operation.location, format!("parameter `{}`: {}", param.name, message))
        };
        let attrs = &param.attrs;

        match schema.kind() {
            SchemaKind::Array => {
                let mut items = schema
                    .items
                    .as_deref()
                    .map(|items| resolver.dereference(items))
                    .filter(|items| items.kind() == SchemaKind::Primitive)
                    .unwrap_or_else(|| Schema::primitive(STRING));
                let item_type = items.schema_type.clone().unwrap_or_else(|| STRING.to_string());
                if let Some(enums) = &attrs.enums {
                    items.enum_values = Some(
                        enums
                            .iter()
                            .map(|value| schema::define_type(&item_type, value))
                            .collect::<std::result::Result<Vec<_>, _>>()
                            .map_err(invalid)?,
                    );
                }
                if let Some(format) = &attrs.format {
                    items.format = Some(format.clone());
                }
                if let Some(default) = &attrs.default {
                    parameter.default = Some(
                        schema::define_type_of_example(ARRAY, Some(&item_type), default).map_err(invalid)?,
                    );
                }
                parameter.param_type = Some(ARRAY.to_string());
                parameter.items = Some(items);
                parameter.collection_format = attrs.collection_format.clone().or_else(|| {
                    (param.location == ParamLocation::Query)
                        .then(|| self.collection_format_in_query.clone())
                        .flatten()
                });
            }
            kind => {
                let (param_type, format) = if kind == SchemaKind::Primitive {
                    (schema.schema_type.clone().unwrap_or_else(|| STRING.to_string()), schema.format.clone())
                } else {
                    debug!(
                        "{}: non-body parameter `{}` of type {} is documented as a string",
                        operation.location,
                        param.name,
                        param.ty.display_name()
                    );
                    (STRING.to_string(), None)
                };
                if let Some(enums) = &attrs.enums {
                    parameter.enum_values = Some(
                        enums
                            .iter()
                            .map(|value| schema::define_type(&param_type, value))
                            .collect::<std::result::Result<Vec<_>, _>>()
                            .map_err(invalid)?,
                    );
                }
                if let Some(default) = &attrs.default {
                    parameter.default = Some(schema::define_type(&param_type, default).map_err(invalid)?);
                }
                if schema::is_numeric(&param_type) {
                    parameter.minimum = attrs.minimum;
                    parameter.maximum = attrs.maximum;
                } else if attrs.minimum.is_some() || attrs.maximum.is_some() {
                    debug!("{}: bounds ignored on non-numeric parameter `{}`", operation.location, param.name);
                }
                if param_type == STRING {
                    parameter.min_length = attrs.min_length;
                    parameter.max_length = attrs.max_length;
                }
                parameter.format = attrs.format.clone().or(format);
                parameter.param_type = Some(param_type);
            }
        }

        if let Some(example) = &attrs.example {
            let example_type = parameter.param_type.as_deref().unwrap_or(STRING);
            let value = match example_type {
                ARRAY => {
                    let item_type = parameter.items.as_ref().and_then(|items| items.schema_type.as_deref());
                    schema::define_type_of_example(ARRAY, item_type, example)
                }
                other => schema::define_type(other, example),
            }
            .map_err(invalid)?;
            parameter.extensions.insert("x-example".to_string(), value);
        }
        Ok(parameter)
    }
}

fn declared_placement(declared: &RouteDeclaration) -> Placement {
    Placement {
        path: normalize_path(&declared.path),
        method: declared.method,
        tag: declared.tag.clone(),
    }
}

fn build_responses(operation: &Operation, resolver: &mut SchemaResolver) -> Result<BTreeMap<String, Response>> {
    let mut responses = BTreeMap::new();
    for descriptor in operation.responses() {
        let schema = match &descriptor.ty {
            None | Some(TypeExpr::Unit) => None,
            Some(ty) => Some(resolver.resolve(ty, &operation.scope, true)?),
        };
        for code in &descriptor.codes {
            if responses.contains_key(code) {
                debug!("{}: response {} is declared twice, keeping the first", operation.location, code);
                continue;
            }
            let description = descriptor
                .description
                .clone()
                .or_else(|| reason_phrase(code).map(str::to_string))
                .unwrap_or_default();
            responses.insert(
                code.clone(),
                Response {
                    description,
                    schema: schema.clone(),
                    headers: BTreeMap::new(),
                },
            );
        }
    }

    if responses.is_empty() {
        responses.insert(
            "200".to_string(),
            Response {
                description: "OK".to_string(),
                ..Default::default()
            },
        );
    }

    for header in &operation.headers {
        let value = Header {
            header_type: header.header_type.clone(),
            description: header.description.clone(),
        };
        for code in &header.codes {
            if code == "all" {
                for response in responses.values_mut() {
                    response.headers.insert(header.name.clone(), value.clone());
                }
            } else if let Some(response) = responses.get_mut(code) {
                response.headers.insert(header.name.clone(), value.clone());
            } else {
                debug!(
                    "{}: header `{}` names response {} which is not declared",
                    operation.location, header.name, code
                );
            }
        }
    }
    Ok(responses)
}

/// Path placeholders without a parameter become required string parameters.
fn add_missing_path_params(operation: &mut PathOperation, path: &str) {
    for name in path_params(path) {
        let declared = operation
            .parameters
            .iter()
            .any(|parameter| parameter.location == "path" && parameter.name == name);
        if !declared {
            debug!("Adding path parameter `{}` of {}", name, path);
            operation.parameters.push(Parameter {
                name,
                location: ParamLocation::Path.as_str().to_string(),
                required: true,
                param_type: Some(STRING.to_string()),
                ..Default::default()
            });
        }
    }
}

fn rewrite_operation_refs(operation: &mut PathOperation, renames: &BTreeMap<String, String>) {
    for parameter in &mut operation.parameters {
        if let Some(schema) = &mut parameter.schema {
            schema.rewrite_refs(renames);
        }
    }
    for response in operation.responses.values_mut() {
        if let Some(schema) = &mut response.schema {
            schema.rewrite_refs(renames);
        }
    }
}
