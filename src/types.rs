//! Language-neutral view of the type expressions and type declarations found in source.

use quote::ToTokens;
use std::fmt;

use crate::directives::FieldDirectives;
use crate::source::SourceLocation;

/// Identity of a named type: its declaring module scope plus its simple name.
///
/// Two types with the same name in different modules are different `TypeRef`s;
/// all caches and the definitions registry are keyed on this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Module path of the declaring scope (`""` for the crate root)
    pub scope: String,
    /// Simple type name
    pub name: String,
}

impl TypeRef {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }

    /// Definition name used once this type's bare name collides with another type.
    ///
    /// Module separators become underscores: `pkgb::Response` turns into `pkgb_Response`,
    /// and a crate-root type is prefixed with `crate`.
    pub fn qualified_schema_name(&self) -> String {
        if self.scope.is_empty() {
            format!("crate_{}", self.name)
        } else {
            format!("{}_{}", self.scope.replace("::", "_"), self.name)
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}::{}", self.scope, self.name)
        }
    }
}

/// A type as written at a use site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A path to a named type, with its generic arguments
    Named { path: Vec<String>, args: Vec<TypeExpr> },
    /// Sequence of elements (`Vec<T>`, `[T]`, sets, ...)
    Array(Box<TypeExpr>),
    /// Key/value map
    Map(Box<TypeExpr>, Box<TypeExpr>),
    /// `Option<T>`
    Optional(Box<TypeExpr>),
    /// References and smart pointers; transparent for schema purposes
    Pointer(Box<TypeExpr>),
    /// Function-like value
    Func,
    /// Arbitrary value (`serde_json::Value`, `dyn Any`)
    Any,
    /// `()`
    Unit,
    /// Anything else, kept as source text for diagnostics
    Unsupported(String),
}

const SEQUENCE_TYPES: &[&str] = &[
    "Vec",
    "VecDeque",
    "LinkedList",
    "HashSet",
    "BTreeSet",
    "IndexSet",
    "BinaryHeap",
    "SmallVec",
];
const MAP_TYPES: &[&str] = &["HashMap", "BTreeMap", "IndexMap"];
const POINTER_TYPES: &[&str] = &[
    "Box", "Rc", "Arc", "Cow", "RefCell", "Cell", "Mutex", "RwLock",
];

impl TypeExpr {
    /// A named type from a `::`-separated path.
    pub fn named(path: &str) -> Self {
        TypeExpr::Named {
            path: path
                .split("::")
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            args: Vec::new(),
        }
    }

    /// Converts a `syn` type into a type expression.
    pub fn from_syn(ty: &syn::Type) -> Self {
        match ty {
            syn::Type::Path(type_path) => Self::from_path(&type_path.path),
            syn::Type::Reference(reference) => {
                if is_str(&reference.elem) {
                    return TypeExpr::named("str");
                }
                TypeExpr::Pointer(Box::new(Self::from_syn(&reference.elem)))
            }
            syn::Type::Ptr(ptr) => TypeExpr::Pointer(Box::new(Self::from_syn(&ptr.elem))),
            syn::Type::Slice(slice) => TypeExpr::Array(Box::new(Self::from_syn(&slice.elem))),
            syn::Type::Array(array) => TypeExpr::Array(Box::new(Self::from_syn(&array.elem))),
            syn::Type::Paren(paren) => Self::from_syn(&paren.elem),
            syn::Type::Group(group) => Self::from_syn(&group.elem),
            syn::Type::Tuple(tuple) if tuple.elems.is_empty() => TypeExpr::Unit,
            syn::Type::BareFn(_) => TypeExpr::Func,
            syn::Type::ImplTrait(impl_trait) if bounds_are_fn(&impl_trait.bounds) => TypeExpr::Func,
            syn::Type::TraitObject(object) if bounds_are_fn(&object.bounds) => TypeExpr::Func,
            syn::Type::TraitObject(object) if bounds_name(&object.bounds, "Any") => TypeExpr::Any,
            other => TypeExpr::Unsupported(other.to_token_stream().to_string()),
        }
    }

    /// Converts a path such as `Option<models::User>`.
    pub fn from_path(path: &syn::Path) -> Self {
        let segments: Vec<String> = path
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .filter(|segment| segment != "crate")
            .collect();
        let Some(last) = path.segments.last() else {
            return TypeExpr::Unsupported(String::new());
        };
        let args: Vec<TypeExpr> = match &last.arguments {
            syn::PathArguments::AngleBracketed(angle) => angle
                .args
                .iter()
                .filter_map(|arg| match arg {
                    syn::GenericArgument::Type(ty) => Some(Self::from_syn(ty)),
                    _ => None,
                })
                .collect(),
            syn::PathArguments::Parenthesized(_) => return TypeExpr::Func,
            syn::PathArguments::None => Vec::new(),
        };

        let name = last.ident.to_string();
        match name.as_str() {
            "Option" => TypeExpr::Optional(Box::new(nth_or_any(&args, 0))),
            _ if SEQUENCE_TYPES.contains(&name.as_str()) => {
                TypeExpr::Array(Box::new(nth_or_any(&args, 0)))
            }
            _ if MAP_TYPES.contains(&name.as_str()) => TypeExpr::Map(
                Box::new(nth_or_any(&args, 0)),
                Box::new(nth_or_any(&args, 1)),
            ),
            _ if POINTER_TYPES.contains(&name.as_str()) => {
                TypeExpr::Pointer(Box::new(nth_or_any(&args, 0)))
            }
            "Value" if segments.first().is_some_and(|root| root == "serde_json") => TypeExpr::Any,
            "Fn" | "FnMut" | "FnOnce" => TypeExpr::Func,
            _ => TypeExpr::Named {
                path: segments,
                args,
            },
        }
    }

    /// Parses a type written inside an annotation.
    ///
    /// Accepts Rust syntax (`Vec<models::User>`), `::` or `.` qualified names, and the
    /// `[]T` / `map[K]V` shorthands.
    pub fn parse_annotation(text: &str) -> Self {
        let text = text.trim();
        if let Some(element) = text.strip_prefix("[]") {
            return TypeExpr::Array(Box::new(Self::parse_annotation(element)));
        }
        if let Some(rest) = text.strip_prefix("map[") {
            if let Some((key, value)) = rest.split_once(']') {
                return TypeExpr::Map(
                    Box::new(Self::parse_annotation(key)),
                    Box::new(Self::parse_annotation(value)),
                );
            }
        }
        match syn::parse_str::<syn::Type>(text) {
            Ok(ty) => Self::from_syn(&ty),
            Err(_) => TypeExpr::Named {
                path: text
                    .split(['.', ':'])
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect(),
                args: Vec::new(),
            },
        }
    }

    /// Strips references, smart pointers and `Option`.
    pub fn peeled(&self) -> &TypeExpr {
        match self {
            TypeExpr::Pointer(inner) | TypeExpr::Optional(inner) => inner.peeled(),
            other => other,
        }
    }

    /// Last path segment of the peeled type, if it is a named type.
    pub fn base_name(&self) -> Option<&str> {
        match self.peeled() {
            TypeExpr::Named { path, .. } => path.last().map(String::as_str),
            _ => None,
        }
    }

    /// True when the value may be absent (`Option`, possibly behind a pointer).
    pub fn is_optional(&self) -> bool {
        match self {
            TypeExpr::Optional(_) => true,
            TypeExpr::Pointer(inner) => inner.is_optional(),
            _ => false,
        }
    }

    /// Short human readable name, used for parameter descriptions.
    pub fn display_name(&self) -> String {
        match self {
            TypeExpr::Named { path, .. } => path.last().cloned().unwrap_or_default(),
            TypeExpr::Array(element) => format!("[]{}", element.display_name()),
            TypeExpr::Map(key, value) => {
                format!("map[{}]{}", key.display_name(), value.display_name())
            }
            TypeExpr::Optional(inner) | TypeExpr::Pointer(inner) => inner.display_name(),
            TypeExpr::Func => "fn".to_string(),
            TypeExpr::Any => "any".to_string(),
            TypeExpr::Unit => "()".to_string(),
            TypeExpr::Unsupported(text) => text.clone(),
        }
    }
}

fn nth_or_any(args: &[TypeExpr], index: usize) -> TypeExpr {
    args.get(index).cloned().unwrap_or(TypeExpr::Any)
}

fn is_str(ty: &syn::Type) -> bool {
    matches!(ty, syn::Type::Path(path) if path.path.is_ident("str"))
}

fn bounds_name(
    bounds: &syn::punctuated::Punctuated<syn::TypeParamBound, syn::Token![+]>,
    name: &str,
) -> bool {
    bounds.iter().any(|bound| match bound {
        syn::TypeParamBound::Trait(trait_bound) => trait_bound
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == name),
        _ => false,
    })
}

fn bounds_are_fn(
    bounds: &syn::punctuated::Punctuated<syn::TypeParamBound, syn::Token![+]>,
) -> bool {
    ["Fn", "FnMut", "FnOnce"]
        .iter()
        .any(|name| bounds_name(bounds, name))
}

/// One named field of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeExpr,
    pub directives: FieldDirectives,
    /// Joined doc comment
    pub docs: Option<String>,
    pub location: SourceLocation,
}

/// Structural shape of a declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    /// Record with named fields
    Struct(Vec<FieldDef>),
    /// Single-field tuple struct or `#[serde(transparent)]` wrapper
    Newtype(TypeExpr),
    /// `type X = Y;`
    Alias(TypeExpr),
    /// Enum whose variants carry no data, serialized as strings
    Enum(Vec<String>),
    /// Anything whose wire shape cannot be described further
    Any,
}

/// A type declaration as indexed from source.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub type_ref: TypeRef,
    /// Names of generic type parameters
    pub generics: Vec<String>,
    pub shape: TypeShape,
    /// Container-level `#[serde(rename_all = "...")]`
    pub rename_all: Option<String>,
    pub docs: Option<String>,
    pub location: SourceLocation,
    /// First problem found in the container or variant attributes
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> TypeExpr {
        TypeExpr::from_syn(&syn::parse_str::<syn::Type>(text).unwrap())
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            parse("Vec<User>"),
            TypeExpr::Array(Box::new(TypeExpr::named("User")))
        );
        assert_eq!(
            parse("Option<Box<Node>>"),
            TypeExpr::Optional(Box::new(TypeExpr::Pointer(Box::new(TypeExpr::named("Node")))))
        );
        assert_eq!(
            parse("HashMap<String, i32>"),
            TypeExpr::Map(
                Box::new(TypeExpr::named("String")),
                Box::new(TypeExpr::named("i32"))
            )
        );
        assert_eq!(parse("&str"), TypeExpr::named("str"));
    }

    #[test]
    fn test_special_forms() {
        assert_eq!(parse("serde_json::Value"), TypeExpr::Any);
        // a bare `Value` may be a project type; the resolver decides
        assert_eq!(parse("Value"), TypeExpr::named("Value"));
        assert_eq!(parse("fn(i32) -> i32"), TypeExpr::Func);
        assert_eq!(parse("Box<dyn Fn() + Send>"), TypeExpr::Pointer(Box::new(TypeExpr::Func)));
        assert_eq!(parse("()"), TypeExpr::Unit);
        assert!(matches!(parse("(i32, String)"), TypeExpr::Unsupported(_)));
    }

    #[test]
    fn test_crate_prefix_is_dropped() {
        assert_eq!(parse("crate::models::User"), TypeExpr::named("models::User"));
    }

    #[test]
    fn test_annotation_shorthands() {
        assert_eq!(
            TypeExpr::parse_annotation("[]string"),
            TypeExpr::Array(Box::new(TypeExpr::named("string")))
        );
        assert_eq!(
            TypeExpr::parse_annotation("models.Greeting"),
            TypeExpr::named("models::Greeting")
        );
        assert_eq!(
            TypeExpr::parse_annotation("Vec<models::Greeting>"),
            TypeExpr::Array(Box::new(TypeExpr::named("models::Greeting")))
        );
    }

    #[test]
    fn test_optional_and_names() {
        let ty = parse("Option<Vec<Tag>>");
        assert!(ty.is_optional());
        assert_eq!(ty.display_name(), "[]Tag");
        assert_eq!(parse("&mut Context").base_name(), Some("Context"));
    }

    #[test]
    fn test_qualified_schema_name() {
        assert_eq!(TypeRef::new("pkgb", "Response").qualified_schema_name(), "pkgb_Response");
        assert_eq!(
            TypeRef::new("api::v1", "Response").qualified_schema_name(),
            "api_v1_Response"
        );
        assert_eq!(TypeRef::new("", "Response").qualified_schema_name(), "crate_Response");
        assert_eq!(TypeRef::new("a::b", "C").to_string(), "a::b::C");
    }
}
