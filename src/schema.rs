use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const STRING: &str = "string";
pub const INTEGER: &str = "integer";
pub const NUMBER: &str = "number";
pub const BOOLEAN: &str = "boolean";
pub const ARRAY: &str = "array";
pub const OBJECT: &str = "object";
pub const FILE: &str = "file";
/// Pseudo type reported for schemas without a `type`
pub const ANY: &str = "any";

/// Prefix of every reference into the definitions map
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Swagger 2.0 schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a named definition
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "float", "double")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required property names, sorted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for map types
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(rename = "multipleOf", skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(rename = "readOnly", default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    /// `x-` vendor extensions
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Structural category of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Primitive,
    Object,
    Array,
    Map,
    Reference,
    Any,
}

impl Schema {
    pub fn primitive(schema_type: &str) -> Self {
        Schema {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn object() -> Self {
        Schema::primitive(OBJECT)
    }

    /// Schema with no constraints; accepts any value.
    pub fn any() -> Self {
        Schema::default()
    }

    pub fn array(items: Schema) -> Self {
        Schema {
            schema_type: Some(ARRAY.to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    /// Object keyed by strings; `None` leaves the value type open.
    pub fn map(values: Option<Schema>) -> Self {
        Schema {
            schema_type: Some(OBJECT.to_string()),
            additional_properties: values.map(Box::new),
            ..Default::default()
        }
    }

    pub fn reference(name: &str) -> Self {
        Schema {
            reference: Some(format!("{}{}", DEFINITIONS_PREFIX, name)),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> SchemaKind {
        if self.reference.is_some() {
            return SchemaKind::Reference;
        }
        match self.schema_type.as_deref() {
            Some(ARRAY) => SchemaKind::Array,
            Some(OBJECT) if self.additional_properties.is_some() => SchemaKind::Map,
            Some(OBJECT) => SchemaKind::Object,
            Some(_) => SchemaKind::Primitive,
            None => SchemaKind::Any,
        }
    }

    /// True for `type: object`, maps included.
    pub fn is_object(&self) -> bool {
        self.schema_type.as_deref() == Some(OBJECT)
    }

    /// Definition name this schema points at, if it is a reference.
    pub fn ref_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|reference| reference.strip_prefix(DEFINITIONS_PREFIX))
    }

    /// Repoints references whose definition name appears in `renames`, recursively.
    pub fn rewrite_refs(&mut self, renames: &BTreeMap<String, String>) {
        if let Some(new_name) = self.ref_name().and_then(|name| renames.get(name)) {
            self.reference = Some(format!("{}{}", DEFINITIONS_PREFIX, new_name));
        }
        if let Some(properties) = &mut self.properties {
            for property in properties.values_mut() {
                property.rewrite_refs(renames);
            }
        }
        if let Some(items) = &mut self.items {
            items.rewrite_refs(renames);
        }
        if let Some(values) = &mut self.additional_properties {
            values.rewrite_refs(renames);
        }
    }
}

/// Schema for language primitives and annotation keywords, looked up by simple name.
pub fn primitive_schema(name: &str) -> Option<Schema> {
    let schema = match name {
        "String" | "str" | "char" | "string" => Schema::primitive(STRING),
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => Schema::primitive(INTEGER).with_format("int32"),
        "i64" | "i128" | "u64" | "u128" | "isize" | "usize" => {
            Schema::primitive(INTEGER).with_format("int64")
        }
        "integer" | "int" => Schema::primitive(INTEGER),
        "f32" => Schema::primitive(NUMBER).with_format("float"),
        "f64" => Schema::primitive(NUMBER).with_format("double"),
        "number" => Schema::primitive(NUMBER),
        "bool" | "boolean" => Schema::primitive(BOOLEAN),
        "file" => Schema::primitive(FILE),
        "object" => Schema::object(),
        _ => return None,
    };
    Some(schema)
}

/// Crates whose types [`library_schema`] describes.
const LIBRARY_CRATES: &[&str] = &[
    "std",
    "chrono",
    "time",
    "uuid",
    "url",
    "bson",
    "mongodb",
    "rust_decimal",
    "bigdecimal",
    "serde_json",
    "ulid",
];

/// Schema for a well-known library type.
///
/// Unlike [`primitive_schema`] these names can also be declared by the project
/// itself, so callers consult the type universe first and fall back to this
/// table only when the name is not declared there, or when
/// [`names_library_type`] says the path points into the library.
///
/// # Arguments
///
/// * `name` - Simple name of the type, e.g. `NaiveDate`
///
/// # Returns
///
/// The inline schema for the type, or `None` for names the table does not know.
pub fn library_schema(name: &str) -> Option<Schema> {
    let schema = match name {
        "Decimal" | "BigDecimal" => Schema::primitive(NUMBER),
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime" | "SystemTime"
        | "Timestamp" => Schema::primitive(STRING).with_format("date-time"),
        "NaiveDate" | "Date" => Schema::primitive(STRING).with_format("date"),
        "NaiveTime" | "Time" | "Instant" | "Duration" => Schema::primitive(STRING),
        "Uuid" => Schema::primitive(STRING).with_format("uuid"),
        "ObjectId" | "Ulid" | "Url" | "PathBuf" | "IpAddr" => Schema::primitive(STRING),
        "Value" | "JsonValue" => Schema::any(),
        _ => return None,
    };
    Some(schema)
}

/// True when `path` (`::`-separated) starts at one of the known library crates.
pub fn names_library_type(path: &str) -> bool {
    path.split_once("::")
        .is_some_and(|(root, _)| LIBRARY_CRATES.contains(&root))
}

pub fn is_numeric(schema_type: &str) -> bool {
    schema_type == INTEGER || schema_type == NUMBER
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Converts a directive value into a JSON value of the given primitive type.
pub fn define_type(schema_type: &str, value: &str) -> Result<Value, String> {
    let value = value.trim();
    match schema_type {
        STRING => Ok(Value::String(value.to_string())),
        NUMBER => value
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| format!("`{}` is not a valid number", value)),
        INTEGER => value
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("`{}` is not a valid integer", value)),
        BOOLEAN => parse_bool(value)
            .map(Value::Bool)
            .ok_or_else(|| format!("`{}` is not a valid boolean", value)),
        other => Err(format!("{} is unsupported type in enum value {}", other, value)),
    }
}

/// Converts an example value written in an annotation.
///
/// # Arguments
///
/// * `schema_type` - Swagger type of the value, e.g. `integer` or `array`
/// * `array_type` - Element type for arrays and value type for maps; strings when absent
/// * `value` - The text; arrays are comma separated and maps use `key:value` pairs
///
/// # Errors
///
/// Returns a message naming the value when it does not parse as `schema_type`.
pub fn define_type_of_example(
    schema_type: &str,
    array_type: Option<&str>,
    value: &str,
) -> Result<Value, String> {
    match schema_type {
        ARRAY => {
            let element_type = array_type.unwrap_or(STRING);
            value
                .split(',')
                .map(|element| define_type_of_example(element_type, None, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        OBJECT => {
            let Some(value_type) = array_type else {
                return Err(format!(
                    "{} is unsupported type in example value `{}`",
                    schema_type, value
                ));
            };
            let mut map = serde_json::Map::new();
            for pair in value.split(',') {
                let Some((key, element)) = pair.split_once(':') else {
                    return Err(format!("example value {} should format: key:value", value));
                };
                map.insert(
                    key.trim().to_string(),
                    define_type_of_example(value_type, None, element)?,
                );
            }
            Ok(Value::Object(map))
        }
        _ => define_type(schema_type, value),
    }
}

/// Builds a schema from a comma separated type override such as `array,integer`.
pub fn build_custom_schema(types: &[&str]) -> Result<Schema, String> {
    let Some((first, rest)) = types.split_first() else {
        return Err("empty schema type".to_string());
    };
    match first.trim() {
        "primitive" => {
            if rest.is_empty() {
                return Err("need primitive type after primitive".to_string());
            }
            build_custom_schema(rest)
        }
        ARRAY => {
            if rest.is_empty() {
                return Err("need array item type after array".to_string());
            }
            Ok(Schema::array(build_custom_schema(rest)?))
        }
        OBJECT => {
            if rest.is_empty() {
                return Ok(Schema::object());
            }
            Ok(Schema::map(Some(build_custom_schema(rest)?)))
        }
        basic @ (STRING | INTEGER | NUMBER | BOOLEAN | FILE) => Ok(Schema::primitive(basic)),
        other => Err(format!("{} is not basic types", other)),
    }
}
