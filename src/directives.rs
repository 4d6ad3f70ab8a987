//! Field and container directives read from `#[serde]`, `#[schema]`, `#[validate]`
//! and `#[serde_as]` attributes.
//!
//! Values are kept as written; they are converted and validated against the
//! field's resolved schema type when the owning struct is resolved, so an
//! unusable directive only fails the operations that actually reach it.

use convert_case::{Case, Casing};
use syn::meta::ParseNestedMeta;

/// Schema-affecting directives attached to one struct field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDirectives {
    /// `#[serde(rename = "...")]`
    pub rename: Option<String>,
    /// `#[serde(skip)]`, `#[serde(skip_serializing)]` or `#[schema(ignore)]`
    pub ignore: bool,
    /// `#[serde(flatten)]`
    pub flatten: bool,
    /// `#[serde(default)]`
    pub has_default: bool,
    /// `#[schema(required)]` or `#[validate(required)]`
    pub required: bool,
    pub read_only: bool,
    /// Value is encoded as a string on the wire
    pub string_encoded: bool,
    pub description: Option<String>,
    pub example: Option<String>,
    pub format: Option<String>,
    /// Comma separated enum values
    pub enums: Option<String>,
    pub default_value: Option<String>,
    pub maximum: Option<String>,
    pub minimum: Option<String>,
    pub multiple_of: Option<String>,
    pub max_length: Option<String>,
    pub min_length: Option<String>,
    /// `x-a=b,!x-c` style extension list
    pub extensions: Option<String>,
    /// Schema type override such as `primitive,integer` or `array,string`
    pub schema_type: Option<String>,
    /// First problem found while reading the attributes
    pub error: Option<String>,
}

impl FieldDirectives {
    /// Reads every recognised attribute of a field.
    pub fn from_attrs(attrs: &[syn::Attribute]) -> Self {
        let mut directives = FieldDirectives::default();
        for attr in attrs {
            let result = if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| directives.serde_item(&meta))
            } else if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| directives.schema_item(&meta))
            } else if attr.path().is_ident("validate") {
                attr.parse_nested_meta(|meta| directives.validate_item(&meta))
            } else if attr.path().is_ident("serde_as") {
                attr.parse_nested_meta(|meta| directives.serde_as_item(&meta))
            } else {
                Ok(())
            };
            if let Err(e) = result {
                directives.error.get_or_insert_with(|| e.to_string());
            }
        }
        directives
    }

    fn serde_item(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        let key = meta_key(meta);
        match key.as_str() {
            "rename" => {
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|inner| {
                        let value = lit_value(&inner)?;
                        if inner.path.is_ident("serialize") {
                            self.rename = Some(value);
                        }
                        Ok(())
                    })
                } else {
                    self.rename = Some(lit_value(meta)?);
                    Ok(())
                }
            }
            "skip" | "skip_serializing" => {
                self.ignore = true;
                Ok(())
            }
            "flatten" => {
                self.flatten = true;
                Ok(())
            }
            "default" => {
                self.has_default = true;
                skip_value(meta)
            }
            "with" | "serialize_with" => {
                let value = lit_value(meta)?;
                if value.contains("string") || value.contains("display") {
                    self.string_encoded = true;
                }
                Ok(())
            }
            _ => skip_value(meta),
        }
    }

    fn schema_item(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        let key = meta_key(meta);
        match key.as_str() {
            "ignore" => self.ignore = true,
            "required" => self.required = true,
            "readonly" | "read_only" => self.read_only = true,
            "string" => self.string_encoded = true,
            "description" => self.description = Some(lit_value(meta)?),
            "example" => self.example = Some(lit_value(meta)?),
            "format" => self.format = Some(lit_value(meta)?),
            "enums" => self.enums = Some(lit_value(meta)?),
            "default" => self.default_value = Some(lit_value(meta)?),
            "maximum" => self.maximum = Some(lit_value(meta)?),
            "minimum" => self.minimum = Some(lit_value(meta)?),
            "multiple_of" => self.multiple_of = Some(lit_value(meta)?),
            "max_length" => self.max_length = Some(lit_value(meta)?),
            "min_length" => self.min_length = Some(lit_value(meta)?),
            "extensions" => self.extensions = Some(lit_value(meta)?),
            "schema_type" => self.schema_type = Some(lit_value(meta)?),
            other => return Err(meta.error(format!("unknown schema directive `{}`", other))),
        }
        Ok(())
    }

    fn validate_item(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("required") {
            self.required = true;
        }
        skip_value(meta)
    }

    fn serde_as_item(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("as") {
            if lit_value(meta)?.contains("DisplayFromStr") {
                self.string_encoded = true;
            }
            return Ok(());
        }
        skip_value(meta)
    }
}

/// Container-level serde settings of a struct or enum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerDirectives {
    pub rename_all: Option<String>,
    pub transparent: bool,
    /// First problem found while reading the attributes
    pub error: Option<String>,
}

impl ContainerDirectives {
    pub fn from_attrs(attrs: &[syn::Attribute]) -> Self {
        let mut directives = ContainerDirectives::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            let result = attr.parse_nested_meta(|meta| directives.serde_item(&meta));
            if let Err(e) = result {
                directives.error.get_or_insert_with(|| e.to_string());
            }
        }
        if let Some(rule) = directives.rename_all.as_deref() {
            if RenameRule::parse(rule).is_none() {
                directives
                    .error
                    .get_or_insert_with(|| format!("unknown rename_all rule `{}`", rule));
            }
        }
        directives
    }

    fn serde_item(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("rename_all") {
            if meta.input.peek(syn::token::Paren) {
                meta.parse_nested_meta(|inner| {
                    let value = lit_value(&inner)?;
                    if inner.path.is_ident("serialize") {
                        self.rename_all = Some(value);
                    }
                    Ok(())
                })
            } else {
                self.rename_all = Some(lit_value(meta)?);
                Ok(())
            }
        } else if meta.path.is_ident("transparent") {
            self.transparent = true;
            Ok(())
        } else {
            skip_value(meta)
        }
    }
}

/// Serialized name of an enum variant under `#[serde(rename = ...)]`.
///
/// # Errors
///
/// Returns the first attribute that cannot be read.
pub fn variant_rename(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && !meta.input.peek(syn::token::Paren) {
                rename = Some(lit_value(&meta)?);
                Ok(())
            } else {
                skip_value(&meta)
            }
        })?;
    }
    Ok(rename)
}

/// A `rename_all` rule as spelled in serde attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    pub fn parse(rule: &str) -> Option<Self> {
        match rule {
            "lowercase" => Some(RenameRule::Lower),
            "UPPERCASE" => Some(RenameRule::Upper),
            "PascalCase" => Some(RenameRule::Pascal),
            "camelCase" => Some(RenameRule::Camel),
            "snake_case" => Some(RenameRule::Snake),
            "SCREAMING_SNAKE_CASE" => Some(RenameRule::ScreamingSnake),
            "kebab-case" => Some(RenameRule::Kebab),
            "SCREAMING-KEBAB-CASE" => Some(RenameRule::ScreamingKebab),
            _ => None,
        }
    }

    /// Applies the rule to a snake_case field identifier.
    pub fn apply_to_field(&self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => field.to_case(Case::Pascal),
            RenameRule::Camel => field.to_case(Case::Camel),
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.replace('_', "-").to_ascii_uppercase(),
        }
    }

    /// Applies the rule to a PascalCase variant identifier.
    pub fn apply_to_variant(&self, variant: &str) -> String {
        match self {
            RenameRule::Pascal => variant.to_string(),
            RenameRule::Lower => variant.to_ascii_lowercase(),
            RenameRule::Upper => variant.to_ascii_uppercase(),
            RenameRule::Camel => variant.to_case(Case::Camel),
            RenameRule::Snake => variant.to_case(Case::Snake),
            RenameRule::ScreamingSnake => variant.to_case(Case::Snake).to_ascii_uppercase(),
            RenameRule::Kebab => variant.to_case(Case::Kebab),
            RenameRule::ScreamingKebab => variant.to_case(Case::Kebab).to_ascii_uppercase(),
        }
    }
}

fn meta_key(meta: &ParseNestedMeta) -> String {
    meta.path
        .get_ident()
        .map(|ident| ident.to_string())
        .unwrap_or_default()
}

/// Reads `= <literal>`, accepting strings, numbers, booleans and negated numbers.
fn lit_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let expr: syn::Expr = meta.value()?.parse()?;
    expr_literal(&expr).ok_or_else(|| meta.error("expected a literal value"))
}

fn expr_literal(expr: &syn::Expr) -> Option<String> {
    match expr {
        syn::Expr::Lit(syn::ExprLit { lit, .. }) => match lit {
            syn::Lit::Str(s) => Some(s.value()),
            syn::Lit::Int(i) => Some(i.base10_digits().to_string()),
            syn::Lit::Float(f) => Some(f.base10_digits().to_string()),
            syn::Lit::Bool(b) => Some(b.value.to_string()),
            _ => None,
        },
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => expr_literal(expr).map(|value| format!("-{}", value)),
        _ => None,
    }
}

/// Consumes whatever follows a key this module does not interpret.
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: proc_macro2::TokenStream = content.parse()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_directives(code: &str) -> FieldDirectives {
        let item: syn::ItemStruct = syn::parse_str(code).unwrap();
        let field = item.fields.iter().next().unwrap();
        FieldDirectives::from_attrs(&field.attrs)
    }

    #[test]
    fn test_serde_attributes() {
        let directives = field_directives(
            r#"struct A {
                #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
                name: Option<String>,
            }"#,
        );
        assert_eq!(directives.rename.as_deref(), Some("userName"));
        assert!(directives.has_default);
        assert!(!directives.ignore);
        assert!(directives.error.is_none());
    }

    #[test]
    fn test_schema_attributes() {
        let directives = field_directives(
            r#"struct A {
                #[schema(required, example = "42", minimum = -1, maximum = 100, enums = "1,2,3")]
                #[validate(required, length(min = 1))]
                count: i64,
            }"#,
        );
        assert!(directives.required);
        assert_eq!(directives.example.as_deref(), Some("42"));
        assert_eq!(directives.minimum.as_deref(), Some("-1"));
        assert_eq!(directives.maximum.as_deref(), Some("100"));
        assert_eq!(directives.enums.as_deref(), Some("1,2,3"));
        assert!(directives.error.is_none());
    }

    #[test]
    fn test_string_encoding_markers() {
        let directives = field_directives(
            r#"struct A { #[serde_as(as = "DisplayFromStr")] id: u64 }"#,
        );
        assert!(directives.string_encoded);

        let directives = field_directives(r#"struct A { #[schema(string)] id: u64 }"#);
        assert!(directives.string_encoded);
    }

    #[test]
    fn test_unknown_schema_directive_is_recorded() {
        let directives = field_directives(r#"struct A { #[schema(colour = "red")] id: u64 }"#);
        assert!(directives.error.unwrap().contains("colour"));
    }

    #[test]
    fn test_container_directives() {
        let item: syn::ItemStruct = syn::parse_str(
            r#"#[derive(Serialize)]
            #[serde(rename_all = "camelCase", deny_unknown_fields)]
            struct A { user_id: u64 }"#,
        )
        .unwrap();
        let container = ContainerDirectives::from_attrs(&item.attrs);
        assert_eq!(container.rename_all.as_deref(), Some("camelCase"));
        assert!(!container.transparent);
        assert!(container.error.is_none());
    }

    #[test]
    fn test_container_problems_are_recorded() {
        let item: syn::ItemStruct =
            syn::parse_str(r#"#[serde(rename_all)] struct A { user_id: u64 }"#).unwrap();
        assert!(ContainerDirectives::from_attrs(&item.attrs).error.is_some());

        let item: syn::ItemStruct =
            syn::parse_str(r#"#[serde(rename_all = "Title Case")] struct A { user_id: u64 }"#)
                .unwrap();
        let container = ContainerDirectives::from_attrs(&item.attrs);
        assert!(container.error.unwrap().contains("Title Case"));
    }

    #[test]
    fn test_variant_rename() {
        let item: syn::ItemEnum = syn::parse_str(
            r#"enum Status {
                #[serde(rename = "open", alias = "o")]
                Open,
                #[serde(rename)]
                Closed,
            }"#,
        )
        .unwrap();
        let variants: Vec<_> = item.variants.iter().collect();
        assert_eq!(variant_rename(&variants[0].attrs).unwrap().as_deref(), Some("open"));
        assert!(variant_rename(&variants[1].attrs).is_err());
    }

    #[test]
    fn test_rename_rules() {
        let camel = RenameRule::parse("camelCase").unwrap();
        assert_eq!(camel.apply_to_field("user_id"), "userId");
        assert_eq!(camel.apply_to_variant("InProgress"), "inProgress");

        let screaming = RenameRule::parse("SCREAMING_SNAKE_CASE").unwrap();
        assert_eq!(screaming.apply_to_field("user_id"), "USER_ID");
        assert_eq!(screaming.apply_to_variant("InProgress"), "IN_PROGRESS");

        assert_eq!(RenameRule::Kebab.apply_to_field("user_id"), "user-id");
        assert_eq!(RenameRule::Lower.apply_to_variant("InProgress"), "inprogress");
        assert!(RenameRule::parse("Title Case").is_none());
    }
}
