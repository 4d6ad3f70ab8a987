use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::config::NamingStrategy;
use crate::directives::RenameRule;
use crate::error::{Error, Result};
use crate::registry::SchemaRegistry;
use crate::schema::{self, Schema, ANY, ARRAY, BOOLEAN, INTEGER, NUMBER, OBJECT, STRING};
use crate::types::{FieldDef, TypeDefinition, TypeExpr, TypeRef, TypeShape};
use crate::universe::TypeUniverse;

/// A fully resolved named type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSchema {
    pub type_ref: TypeRef,
    pub schema: Schema,
}

/// Outcome of resolving a declaration.
enum Definition {
    Parsed(Rc<ParsedSchema>),
    /// The declaration is already being resolved further up the stack
    Recursive,
}

/// Resolver state saved by [`SchemaResolver::checkpoint`].
#[derive(Debug)]
pub struct Checkpoint {
    registry: SchemaRegistry,
    parsed: HashSet<TypeRef>,
}

/// Properties contributed by one struct field.
struct FieldProperties {
    properties: BTreeMap<String, Schema>,
    required: Vec<String>,
}

/// Resolves type expressions into schemas.
///
/// The resolver is the single context object of a run: it owns the cache of
/// resolved declarations, the stack of declarations currently being resolved
/// and the definitions registry. Object-like named types are returned as
/// references when asked to, everything else is inlined.
pub struct SchemaResolver<'u> {
    universe: &'u dyn TypeUniverse,
    naming: NamingStrategy,
    parsed: HashMap<TypeRef, Rc<ParsedSchema>>,
    stack: Vec<TypeRef>,
    registry: SchemaRegistry,
}

impl<'u> SchemaResolver<'u> {
    pub fn new(universe: &'u dyn TypeUniverse, naming: NamingStrategy) -> Self {
        debug!("Initializing SchemaResolver");
        Self {
            universe,
            naming,
            parsed: HashMap::new(),
            stack: Vec::new(),
            registry: SchemaRegistry::new(),
        }
    }

    /// Resolves a type written in `scope`.
    ///
    /// # Arguments
    ///
    /// * `expr` - The type as written in source or in an annotation
    /// * `scope` - Module path the type is written in, used to resolve imports
    /// * `as_reference` - Return named objects as `$ref`s into the registry
    ///   instead of inlining them
    ///
    /// # Returns
    ///
    /// The schema of the type. Named objects used by its fields are always
    /// registered as definitions; the type itself only when `as_reference` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedType`] when a named type is not declared in
    /// the project, and [`Error::MalformedAnnotation`] when a declaration
    /// carries an attribute that cannot be read or converted.
    pub fn resolve(&mut self, expr: &TypeExpr, scope: &str, as_reference: bool) -> Result<Schema> {
        debug_assert!(self.stack.is_empty());
        self.resolve_expr(expr, scope, &[], as_reference)
    }

    /// Saves the registry and the set of cached declarations.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            registry: self.registry.clone(),
            parsed: self.parsed.keys().cloned().collect(),
        }
    }

    /// Forgets every definition registered and every declaration cached since
    /// `checkpoint`, including placeholders left by a resolution that failed.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let Checkpoint { registry, parsed } = checkpoint;
        let discarded = self.registry.len().saturating_sub(registry.len());
        self.registry = registry;
        self.parsed.retain(|type_ref, _| parsed.contains(type_ref));
        self.stack.clear();
        debug!("Rolled back {} definitions", discarded);
    }

    /// Cached result for a declaration that has been resolved.
    pub fn parsed_schema(&self, type_ref: &TypeRef) -> Option<Rc<ParsedSchema>> {
        self.parsed.get(type_ref).cloned()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> SchemaRegistry {
        self.registry
    }

    /// Follows references through the registry and returns the schema with
    /// its definition substituted, so callers can inspect properties.
    pub fn dereference(&self, schema: &Schema) -> Schema {
        match schema.ref_name().and_then(|name| self.registry.definition(name)) {
            Some(definition) => definition.clone(),
            None => schema.clone(),
        }
    }

    /// Types along the schema, two levels deep: `["integer"]`,
    /// `["array", "string"]`, `["object", "number"]` for maps.
    pub fn schema_type_path(&self, schema: &Schema, depth: usize) -> Vec<String> {
        if depth == 0 {
            return Vec::new();
        }
        if let Some(name) = schema.ref_name() {
            return match self.registry.definition(name) {
                Some(definition) => self.schema_type_path(definition, depth),
                None => Vec::new(),
            };
        }
        match schema.schema_type.as_deref() {
            Some(ARRAY) => {
                let mut path = vec![ARRAY.to_string()];
                if let Some(items) = &schema.items {
                    path.extend(self.schema_type_path(items, depth - 1));
                }
                path
            }
            Some(OBJECT) => {
                let mut path = vec![OBJECT.to_string()];
                if let Some(values) = &schema.additional_properties {
                    path.extend(self.schema_type_path(values, depth - 1));
                }
                path
            }
            Some(other) => vec![other.to_string()],
            None => vec![ANY.to_string()],
        }
    }

    fn resolve_expr(
        &mut self,
        expr: &TypeExpr,
        scope: &str,
        generics: &[String],
        as_reference: bool,
    ) -> Result<Schema> {
        match expr {
            TypeExpr::Optional(inner) | TypeExpr::Pointer(inner) => {
                self.resolve_expr(inner, scope, generics, as_reference)
            }
            TypeExpr::Array(element) => Ok(Schema::array(
                self.resolve_expr(element, scope, generics, true)?,
            )),
            TypeExpr::Map(_, value) => match value.as_ref() {
                TypeExpr::Any => Ok(Schema::map(None)),
                value => Ok(Schema::map(Some(
                    self.resolve_expr(value, scope, generics, true)?,
                ))),
            },
            TypeExpr::Any | TypeExpr::Unit => Ok(Schema::any()),
            TypeExpr::Func => Err(Error::UnsupportedFieldKind("fn".to_string())),
            TypeExpr::Unsupported(text) => {
                debug!("Type `{}` is not supported yet, using object instead", text);
                Ok(Schema::object())
            }
            TypeExpr::Named { path, .. } => {
                if let [single] = path.as_slice() {
                    if generics.contains(single) {
                        return Ok(Schema::any());
                    }
                }
                self.type_schema(&path.join("::"), scope, as_reference)
            }
        }
    }

    /// Schema for a named type: primitives inline, declarations via the cache.
    ///
    /// Library types such as `Uuid` or `NaiveDate` are inlined only when the
    /// path names their crate or the project declares no type of that name.
    fn type_schema(&mut self, name: &str, scope: &str, as_reference: bool) -> Result<Schema> {
        let simple = name.rsplit("::").next().unwrap_or(name);
        if let Some(primitive) = schema::primitive_schema(simple) {
            return Ok(primitive);
        }
        let library = schema::library_schema(simple);
        if let Some(library) = &library {
            if schema::names_library_type(name) {
                return Ok(library.clone());
            }
        }

        let universe = self.universe;
        let Some(definition) = universe.find_type(name, scope) else {
            return library.ok_or_else(|| Error::UnresolvedType {
                type_name: name.to_string(),
                scope: scope.to_string(),
            });
        };

        let parsed = match self.parse_definition(definition)? {
            Definition::Parsed(parsed) => parsed,
            Definition::Recursive => {
                let placeholder = Schema::object();
                if as_reference {
                    return Ok(self.registry.reference(&definition.type_ref, &placeholder));
                }
                warn!(
                    "{}: `{}` contains itself without indirection, emitting an empty object",
                    definition.location, definition.type_ref
                );
                return Ok(placeholder);
            }
        };

        if as_reference && parsed.schema.is_object() {
            return Ok(self.registry.reference(&parsed.type_ref, &parsed.schema));
        }
        Ok(parsed.schema.clone())
    }

    fn parse_definition(&mut self, definition: &TypeDefinition) -> Result<Definition> {
        let type_ref = &definition.type_ref;
        if let Some(parsed) = self.parsed.get(type_ref) {
            debug!("Skipping '{}', already parsed.", type_ref);
            return Ok(Definition::Parsed(Rc::clone(parsed)));
        }
        if self.stack.contains(type_ref) {
            debug!("Skipping '{}', recursion detected.", type_ref);
            return Ok(Definition::Recursive);
        }
        if let Some(message) = &definition.error {
            return Err(Error::malformed(
                &definition.location,
                format!("`{}`: {}", type_ref, message),
            ));
        }

        debug!("Generating schema for {}", type_ref);
        self.stack.push(type_ref.clone());
        let result = self.parse_shape(definition);
        self.stack.pop();
        let mut schema = result?;
        if schema.description.is_none() {
            schema.description = definition.docs.clone();
        }

        let parsed = Rc::new(ParsedSchema {
            type_ref: type_ref.clone(),
            schema,
        });
        self.parsed.insert(type_ref.clone(), Rc::clone(&parsed));
        // a reference handed out during recursion still points at the placeholder
        self.registry.update(type_ref, &parsed.schema);
        Ok(Definition::Parsed(parsed))
    }

    fn parse_shape(&mut self, definition: &TypeDefinition) -> Result<Schema> {
        let scope = definition.type_ref.scope.as_str();
        match &definition.shape {
            TypeShape::Struct(fields) => self.parse_struct(definition, fields),
            TypeShape::Newtype(inner) | TypeShape::Alias(inner) => {
                self.resolve_expr(inner, scope, &definition.generics, false)
            }
            TypeShape::Enum(variants) => {
                let mut schema = Schema::primitive(STRING);
                schema.enum_values = Some(variants.iter().cloned().map(Value::String).collect());
                Ok(schema)
            }
            TypeShape::Any => Ok(Schema::any()),
        }
    }

    fn parse_struct(&mut self, definition: &TypeDefinition, fields: &[FieldDef]) -> Result<Schema> {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for field in fields {
            match self.parse_field(definition, field) {
                Ok(Some(contributed)) => {
                    properties.extend(contributed.properties);
                    required.extend(contributed.required);
                }
                Ok(None) => {}
                Err(Error::UnsupportedFieldKind(kind)) => {
                    warn!(
                        "{}: skipping field `{}` of `{}`: `{}` values have no schema",
                        field.location, field.name, definition.type_ref, kind
                    );
                }
                Err(e) => return Err(e),
            }
        }

        required.sort();
        required.dedup();

        let mut schema = Schema::object();
        if !properties.is_empty() {
            schema.properties = Some(properties);
        }
        if !required.is_empty() {
            schema.required = Some(required);
        }
        Ok(schema)
    }

    fn property_name(&self, owner: &TypeDefinition, field: &FieldDef) -> String {
        if let Some(rename) = &field.directives.rename {
            return rename.clone();
        }
        match owner.rename_all.as_deref().and_then(RenameRule::parse) {
            Some(rule) => rule.apply_to_field(&field.name),
            None => self.naming.apply(&field.name),
        }
    }

    fn parse_field(
        &mut self,
        owner: &TypeDefinition,
        field: &FieldDef,
    ) -> Result<Option<FieldProperties>> {
        let directives = &field.directives;
        if let Some(message) = &directives.error {
            return Err(Error::malformed(
                &field.location,
                format!("field `{}` of `{}`: {}", field.name, owner.type_ref, message),
            ));
        }
        if directives.ignore {
            return Ok(None);
        }
        let scope = owner.type_ref.scope.as_str();

        if directives.flatten {
            let schema = self.resolve_expr(&field.ty, scope, &owner.generics, false)?;
            let schema = self.dereference(&schema);
            let properties = schema.properties.unwrap_or_default();
            if properties.is_empty() {
                debug!("Flattened field `{}` contributes no properties", field.name);
                return Ok(None);
            }
            return Ok(Some(FieldProperties {
                properties,
                required: schema.required.unwrap_or_default(),
            }));
        }

        let name = self.property_name(owner, field);
        let mut schema = match &directives.schema_type {
            Some(custom) => {
                let parts: Vec<&str> = custom.split(',').map(str::trim).collect();
                schema::build_custom_schema(&parts).map_err(|message| {
                    Error::malformed(&field.location, format!("field `{}`: {}", field.name, message))
                })?
            }
            None => self.resolve_expr(&field.ty, scope, &owner.generics, true)?,
        };

        let types = self.schema_type_path(&schema, 2);
        if types.is_empty() {
            return Err(Error::malformed(
                &field.location,
                format!("field `{}`: invalid type", field.name),
            ));
        }
        let tag = field_tag(field, &types)?;

        if tag.schema_type == STRING && types[0] != STRING {
            schema = Schema::primitive(STRING);
        }
        apply_field_tag(&mut schema, tag);

        let required = directives.required || (!field.ty.is_optional() && !directives.has_default);
        Ok(Some(FieldProperties {
            properties: BTreeMap::from([(name.clone(), schema)]),
            required: if required { vec![name] } else { Vec::new() },
        }))
    }
}

/// Field directives converted against the field's schema types.
#[derive(Debug, Default)]
struct FieldTag {
    schema_type: String,
    array_type: Option<String>,
    description: Option<String>,
    format: Option<String>,
    read_only: bool,
    example: Option<Value>,
    default: Option<Value>,
    enums: Option<Vec<Value>>,
    maximum: Option<f64>,
    minimum: Option<f64>,
    multiple_of: Option<f64>,
    max_length: Option<i64>,
    min_length: Option<i64>,
    extensions: BTreeMap<String, Value>,
}

fn field_tag(field: &FieldDef, types: &[String]) -> Result<FieldTag> {
    let directives = &field.directives;
    let malformed = |message: String| {
        Error::malformed(&field.location, format!("field `{}`: {}", field.name, message))
    };

    let schema_type = types[0].clone();
    let array_type = if types.len() > 1 && (schema_type == ARRAY || schema_type == OBJECT) {
        Some(types[1].clone())
    } else {
        None
    };
    let mut tag = FieldTag {
        description: directives.description.clone().or_else(|| field.docs.clone()),
        format: directives.format.clone(),
        read_only: directives.read_only,
        schema_type,
        array_type,
        ..Default::default()
    };

    if let Some(example) = &directives.example {
        tag.example = Some(if directives.string_encoded {
            Value::String(example.clone())
        } else {
            schema::define_type_of_example(&tag.schema_type, tag.array_type.as_deref(), example)
                .map_err(malformed)?
        });
    }
    if let Some(extensions) = &directives.extensions {
        tag.extensions = parse_extensions(extensions);
    }
    if let Some(enums) = &directives.enums {
        let enum_type = if tag.schema_type == ARRAY {
            tag.array_type.clone().unwrap_or_else(|| STRING.to_string())
        } else {
            tag.schema_type.clone()
        };
        let values = enums
            .split(',')
            .map(|value| schema::define_type(&enum_type, value))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(malformed)?;
        tag.enums = Some(values);
    }
    if let Some(default) = &directives.default_value {
        tag.default = Some(schema::define_type(&tag.schema_type, default).map_err(malformed)?);
    }

    let numeric = schema::is_numeric(&tag.schema_type)
        || tag.array_type.as_deref().is_some_and(schema::is_numeric);
    if numeric {
        tag.maximum = parse_bound(&directives.maximum, "maximum").map_err(malformed)?;
        tag.minimum = parse_bound(&directives.minimum, "minimum").map_err(malformed)?;
        tag.multiple_of = parse_bound(&directives.multiple_of, "multiple_of").map_err(malformed)?;
    }
    let textual = tag.schema_type == STRING || tag.array_type.as_deref() == Some(STRING);
    if textual {
        tag.max_length = parse_length(&directives.max_length, "max_length").map_err(malformed)?;
        tag.min_length = parse_length(&directives.min_length, "min_length").map_err(malformed)?;
    }

    if directives.string_encoded {
        let zero_value = match tag.schema_type.as_str() {
            STRING => Some(""),
            INTEGER | NUMBER => Some("0"),
            BOOLEAN => Some("false"),
            _ => None,
        };
        if let Some(zero_value) = zero_value {
            tag.schema_type = STRING.to_string();
            if tag.example.is_none() {
                tag.example = Some(Value::String(zero_value.to_string()));
            }
        }
    }

    Ok(tag)
}

fn apply_field_tag(schema: &mut Schema, tag: FieldTag) {
    if tag.description.is_some() {
        schema.description = tag.description;
    }
    schema.read_only = tag.read_only;
    schema.default = tag.default;
    schema.example = tag.example;
    schema.extensions.extend(tag.extensions);

    let element = if tag.schema_type == ARRAY {
        match schema.items.as_deref_mut() {
            Some(items) => items,
            None => return,
        }
    } else {
        schema
    };
    if tag.format.is_some() {
        element.format = tag.format;
    }
    element.maximum = tag.maximum;
    element.minimum = tag.minimum;
    element.multiple_of = tag.multiple_of;
    element.max_length = tag.max_length;
    element.min_length = tag.min_length;
    if tag.enums.is_some() {
        element.enum_values = tag.enums;
    }
}

fn parse_bound(value: &Option<String>, name: &str) -> std::result::Result<Option<f64>, String> {
    value
        .as_deref()
        .map(|raw| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| format!("{} `{}` is not a number", name, raw))
        })
        .transpose()
}

fn parse_length(value: &Option<String>, name: &str) -> std::result::Result<Option<i64>, String> {
    value
        .as_deref()
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_| format!("{} `{}` is not an integer", name, raw))
        })
        .transpose()
}

/// Parses `x-a=b,!x-c,x-d` into `{x-a: "b", x-c: false, x-d: true}`.
pub fn parse_extensions(raw: &str) -> BTreeMap<String, Value> {
    let mut extensions = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        match entry.split_once('=') {
            Some((key, value)) => {
                extensions.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
            }
            None => match entry.strip_prefix('!') {
                Some(key) => {
                    extensions.insert(key.to_string(), Value::Bool(false));
                }
                None => {
                    extensions.insert(entry.to_string(), Value::Bool(true));
                }
            },
        }
    }
    extensions
}
