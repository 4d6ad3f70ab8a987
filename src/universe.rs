//! Lookup of type declarations and function return types across all parsed files.

use log::debug;
use std::collections::HashMap;
use std::path::Path;
use syn::spanned::Spanned;

use crate::directives::{variant_rename, ContainerDirectives, FieldDirectives, RenameRule};
use crate::parser::ParsedFile;
use crate::source::{docs_text, SourceLocation};
use crate::types::{FieldDef, TypeDefinition, TypeExpr, TypeRef, TypeShape};

/// Source of type declarations, queried by name relative to a scope.
pub trait TypeUniverse {
    /// Finds the declaration `name` refers to when written inside `from_scope`.
    fn find_type(&self, name: &str, from_scope: &str) -> Option<&TypeDefinition>;

    /// Declared return type of the function `name` as seen from `from_scope`.
    fn find_function_output(&self, _name: &str, _from_scope: &str) -> Option<&TypeExpr> {
        None
    }
}

/// Index over every struct, enum, alias and free function of the parsed files.
///
/// Names resolve in this order: the scope itself, its `use` imports (including
/// glob imports), `self`/`super`/crate-absolute paths, and finally a crate-wide
/// search by simple name. When several scopes declare the name, the
/// lexicographically smallest scope wins so the result is stable.
#[derive(Debug, Default)]
pub struct SourceIndex {
    types: HashMap<TypeRef, TypeDefinition>,
    functions: HashMap<TypeRef, TypeExpr>,
    /// scope -> alias -> absolute path
    imports: HashMap<String, HashMap<String, String>>,
    /// scope -> glob-imported module paths
    globs: HashMap<String, Vec<String>>,
}

impl SourceIndex {
    /// Indexes the given files; dependency files are only indexed when
    /// `parse_dependency` is set.
    pub fn new(files: &[ParsedFile], parse_dependency: bool) -> Self {
        let mut index = SourceIndex::default();
        for file in files {
            if file.dependency && !parse_dependency {
                debug!("Skipping dependency file {}", file.path.display());
                continue;
            }
            index.index_items(&file.syntax_tree.items, &file.module_path, &file.path);
        }
        debug!(
            "Indexed {} types and {} functions",
            index.types.len(),
            index.functions.len()
        );
        index
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn index_items(&mut self, items: &[syn::Item], scope: &str, file: &Path) {
        for item in items {
            match item {
                syn::Item::Struct(item_struct) => {
                    let definition = struct_definition(item_struct, scope, file);
                    self.types.insert(definition.type_ref.clone(), definition);
                }
                syn::Item::Enum(item_enum) => {
                    let definition = enum_definition(item_enum, scope, file);
                    self.types.insert(definition.type_ref.clone(), definition);
                }
                syn::Item::Type(item_type) => {
                    let definition = TypeDefinition {
                        type_ref: TypeRef::new(scope, item_type.ident.to_string()),
                        generics: generic_names(&item_type.generics),
                        shape: TypeShape::Alias(TypeExpr::from_syn(&item_type.ty)),
                        rename_all: None,
                        docs: docs_text(&item_type.attrs, file),
                        location: SourceLocation::from_span(file, item_type.ident.span()),
                        error: None,
                    };
                    self.types.insert(definition.type_ref.clone(), definition);
                }
                syn::Item::Fn(item_fn) => {
                    if let syn::ReturnType::Type(_, ty) = &item_fn.sig.output {
                        self.functions.insert(
                            TypeRef::new(scope, item_fn.sig.ident.to_string()),
                            TypeExpr::from_syn(ty),
                        );
                    }
                }
                syn::Item::Use(item_use) => {
                    self.index_use(&item_use.tree, scope, Vec::new());
                }
                syn::Item::Mod(item_mod) => {
                    if let Some((_, content)) = &item_mod.content {
                        let nested = join_scope(scope, &item_mod.ident.to_string());
                        self.index_items(content, &nested, file);
                    }
                }
                _ => {}
            }
        }
    }

    fn index_use(&mut self, tree: &syn::UseTree, scope: &str, mut prefix: Vec<String>) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.index_use(&path.tree, scope, prefix);
            }
            syn::UseTree::Name(name) => {
                let alias = name.ident.to_string();
                prefix.push(alias.clone());
                self.add_import(scope, alias, &prefix);
            }
            syn::UseTree::Rename(rename) => {
                prefix.push(rename.ident.to_string());
                self.add_import(scope, rename.rename.to_string(), &prefix);
            }
            syn::UseTree::Glob(_) => {
                let target = absolute_path(&prefix, scope);
                self.globs.entry(scope.to_string()).or_default().push(target);
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.index_use(item, scope, prefix.clone());
                }
            }
        }
    }

    fn add_import(&mut self, scope: &str, alias: String, path: &[String]) {
        if alias == "self" {
            // `use a::b::{self}` imports the module `b`
            let module: Vec<String> = path[..path.len() - 1].to_vec();
            if let Some(last) = module.last().cloned() {
                self.add_import(scope, last, &module);
            }
            return;
        }
        let target = absolute_path(path, scope);
        self.imports
            .entry(scope.to_string())
            .or_default()
            .insert(alias, target);
    }

    /// Resolves a `::`-separated name to a declared item key.
    fn lookup<'a, T>(
        &self,
        table: &'a HashMap<TypeRef, T>,
        name: &str,
        from_scope: &str,
    ) -> Option<&'a T> {
        let segments: Vec<&str> = name.split("::").filter(|s| !s.is_empty()).collect();
        let (simple, qualifier) = segments.split_last()?;

        if qualifier.is_empty() {
            if let Some(found) = table.get(&TypeRef::new(from_scope, *simple)) {
                return Some(found);
            }
            if let Some(target) = self.import_of(from_scope, simple) {
                if let Some(found) = self.lookup_absolute(table, &target) {
                    return Some(found);
                }
            }
            for glob in self.globs.get(from_scope).into_iter().flatten() {
                if let Some(found) = table.get(&TypeRef::new(glob.as_str(), *simple)) {
                    return Some(found);
                }
            }
            return self.lookup_global(table, simple, None);
        }

        let qualifier: Vec<String> = qualifier.iter().map(|s| s.to_string()).collect();
        let candidates = [
            // first segment imported as a module alias
            self.import_of(from_scope, &qualifier[0]).map(|target| {
                let mut path = vec![target];
                path.extend(qualifier[1..].iter().cloned());
                path.join("::")
            }),
            // child module of the current scope
            Some(join_scope(from_scope, &qualifier.join("::"))),
            // made absolute by self/super/crate
            Some(absolute_path(&qualifier, from_scope)),
            // already absolute
            Some(qualifier.join("::")),
        ];
        for scope in candidates.into_iter().flatten() {
            if let Some(found) = table.get(&TypeRef::new(scope, *simple)) {
                return Some(found);
            }
        }
        let suffix = qualifier.join("::");
        self.lookup_global(table, simple, Some(&suffix))
    }

    fn import_of(&self, scope: &str, alias: &str) -> Option<String> {
        self.imports.get(scope)?.get(alias).cloned()
    }

    fn lookup_absolute<'a, T>(&self, table: &'a HashMap<TypeRef, T>, path: &str) -> Option<&'a T> {
        let (scope, simple) = match path.rsplit_once("::") {
            Some((scope, simple)) => (scope, simple),
            None => ("", path),
        };
        table
            .get(&TypeRef::new(scope, simple))
            .or_else(|| self.lookup_global(table, simple, Some(scope).filter(|s| !s.is_empty())))
    }

    /// Crate-wide search by simple name, optionally requiring the scope to end
    /// with `scope_suffix` on a `::` boundary.
    fn lookup_global<'a, T>(
        &self,
        table: &'a HashMap<TypeRef, T>,
        simple: &str,
        scope_suffix: Option<&str>,
    ) -> Option<&'a T> {
        table
            .iter()
            .filter(|(key, _)| key.name == simple)
            .filter(|(key, _)| match scope_suffix {
                Some(suffix) => {
                    key.scope == suffix || key.scope.ends_with(&format!("::{}", suffix))
                }
                None => true,
            })
            .min_by(|(a, _), (b, _)| a.scope.cmp(&b.scope))
            .map(|(_, value)| value)
    }
}

impl TypeUniverse for SourceIndex {
    fn find_type(&self, name: &str, from_scope: &str) -> Option<&TypeDefinition> {
        self.lookup(&self.types, name, from_scope)
    }

    fn find_function_output(&self, name: &str, from_scope: &str) -> Option<&TypeExpr> {
        self.lookup(&self.functions, name, from_scope)
    }
}

fn join_scope(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", scope, name)
    }
}

/// Turns a path written in `scope` into a crate-absolute module path.
fn absolute_path(path: &[String], scope: &str) -> String {
    let mut current: Vec<&str> = scope.split("::").filter(|s| !s.is_empty()).collect();
    let mut segments = path.iter().map(String::as_str).peekable();
    match segments.peek().copied() {
        Some("crate") => {
            segments.next();
            current.clear();
        }
        Some("self") => {
            segments.next();
        }
        Some("super") => {
            while segments.peek() == Some(&"super") {
                segments.next();
                current.pop();
            }
        }
        _ => current.clear(),
    }
    current.extend(segments);
    current.join("::")
}

fn generic_names(generics: &syn::Generics) -> Vec<String> {
    generics
        .type_params()
        .map(|param| param.ident.to_string())
        .collect()
}

fn field_name(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}

fn struct_definition(item: &syn::ItemStruct, scope: &str, file: &Path) -> TypeDefinition {
    let container = ContainerDirectives::from_attrs(&item.attrs);
    let shape = match &item.fields {
        syn::Fields::Named(named) if container.transparent && named.named.len() == 1 => {
            let field = &named.named[0];
            TypeShape::Newtype(TypeExpr::from_syn(&field.ty))
        }
        syn::Fields::Named(named) => TypeShape::Struct(
            named
                .named
                .iter()
                .filter_map(|field| {
                    let ident = field.ident.as_ref()?;
                    Some(FieldDef {
                        name: field_name(ident),
                        ty: TypeExpr::from_syn(&field.ty),
                        directives: FieldDirectives::from_attrs(&field.attrs),
                        docs: docs_text(&field.attrs, file),
                        location: SourceLocation::from_span(file, field.span()),
                    })
                })
                .collect(),
        ),
        syn::Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            TypeShape::Newtype(TypeExpr::from_syn(&unnamed.unnamed[0].ty))
        }
        _ => TypeShape::Any,
    };

    TypeDefinition {
        type_ref: TypeRef::new(scope, item.ident.to_string()),
        generics: generic_names(&item.generics),
        shape,
        rename_all: container.rename_all,
        docs: docs_text(&item.attrs, file),
        location: SourceLocation::from_span(file, item.ident.span()),
        error: container.error,
    }
}

fn enum_definition(item: &syn::ItemEnum, scope: &str, file: &Path) -> TypeDefinition {
    let mut container = ContainerDirectives::from_attrs(&item.attrs);
    let unit_only = item
        .variants
        .iter()
        .all(|variant| matches!(variant.fields, syn::Fields::Unit));
    let rule = container.rename_all.as_deref().and_then(RenameRule::parse);

    let shape = if unit_only && !item.variants.is_empty() {
        TypeShape::Enum(
            item.variants
                .iter()
                .map(|variant| {
                    let rename = variant_rename(&variant.attrs).unwrap_or_else(|e| {
                        container
                            .error
                            .get_or_insert_with(|| format!("variant `{}`: {}", variant.ident, e));
                        None
                    });
                    rename.unwrap_or_else(|| {
                        let name = variant.ident.to_string();
                        match rule {
                            Some(rule) => rule.apply_to_variant(&name),
                            None => name,
                        }
                    })
                })
                .collect(),
        )
    } else {
        TypeShape::Any
    };

    TypeDefinition {
        type_ref: TypeRef::new(scope, item.ident.to_string()),
        generics: generic_names(&item.generics),
        shape,
        rename_all: container.rename_all,
        docs: docs_text(&item.attrs, file),
        location: SourceLocation::from_span(file, item.ident.span()),
        error: container.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AstParser;
    use std::path::PathBuf;

    fn file(module_path: &str, code: &str) -> ParsedFile {
        AstParser::parse_source(PathBuf::from(format!("src/{}.rs", module_path)), module_path, code)
            .unwrap()
    }

    #[test]
    fn test_struct_fields_and_directives() {
        let index = SourceIndex::new(
            &[file(
                "models",
                r#"
                /// A user account
                #[serde(rename_all = "camelCase")]
                pub struct User {
                    /// Unique id
                    pub user_id: u64,
                    #[serde(skip)]
                    pub secret: String,
                }
                "#,
            )],
            false,
        );

        let user = index.find_type("User", "models").unwrap();
        assert_eq!(user.type_ref, TypeRef::new("models", "User"));
        assert_eq!(user.docs.as_deref(), Some("A user account"));
        assert_eq!(user.rename_all.as_deref(), Some("camelCase"));
        let TypeShape::Struct(fields) = &user.shape else {
            panic!("expected a struct shape");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].docs.as_deref(), Some("Unique id"));
        assert!(fields[1].directives.ignore);
    }

    #[test]
    fn test_lookup_through_imports_and_paths() {
        let files = [
            file("models", "pub struct Greeting { pub message: String }"),
            file(
                "handlers",
                r#"
                use crate::models::Greeting as Hello;
                use crate::models;
                "#,
            ),
            file("api::v1", "pub struct Item;"),
        ];
        let index = SourceIndex::new(&files, false);

        let expected = TypeRef::new("models", "Greeting");
        assert_eq!(index.find_type("Hello", "handlers").unwrap().type_ref, expected);
        assert_eq!(index.find_type("models::Greeting", "handlers").unwrap().type_ref, expected);
        assert_eq!(index.find_type("crate::models::Greeting", "api").unwrap().type_ref, expected);
        assert_eq!(index.find_type("super::models::Greeting", "handlers").unwrap().type_ref, expected);
        assert_eq!(index.find_type("v1::Item", "handlers").unwrap().type_ref, TypeRef::new("api::v1", "Item"));
        assert!(index.find_type("Missing", "handlers").is_none());
    }

    #[test]
    fn test_same_scope_wins_over_global() {
        let files = [
            file("pkga", "pub struct Response { pub a: String }"),
            file("pkgb", "pub struct Response { pub b: String }"),
        ];
        let index = SourceIndex::new(&files, false);

        assert_eq!(index.find_type("Response", "pkgb").unwrap().type_ref.scope, "pkgb");
        // ambiguous from elsewhere: smallest scope
        assert_eq!(index.find_type("Response", "handlers").unwrap().type_ref.scope, "pkga");
    }

    #[test]
    fn test_glob_imports_and_inline_modules() {
        let files = [file(
            "",
            r#"
            mod dto {
                pub struct Page { pub size: u32 }
            }
            mod routes {
                use super::dto::*;
            }
            "#,
        )];
        let index = SourceIndex::new(&files, false);
        assert_eq!(index.find_type("Page", "routes").unwrap().type_ref.scope, "dto");
    }

    #[test]
    fn test_enum_and_alias_shapes() {
        let index = SourceIndex::new(
            &[file(
                "models",
                r#"
                #[serde(rename_all = "snake_case")]
                pub enum Status { InProgress, #[serde(rename = "finished")] Done }
                pub enum Event { Created { id: u64 }, Deleted }
                pub type Users = Vec<User>;
                pub struct UserId(pub u64);
                "#,
            )],
            false,
        );

        assert_eq!(
            index.find_type("Status", "models").unwrap().shape,
            TypeShape::Enum(vec!["in_progress".to_string(), "finished".to_string()])
        );
        assert_eq!(index.find_type("Event", "models").unwrap().shape, TypeShape::Any);
        assert_eq!(
            index.find_type("Users", "models").unwrap().shape,
            TypeShape::Alias(TypeExpr::Array(Box::new(TypeExpr::named("User"))))
        );
        assert_eq!(
            index.find_type("UserId", "models").unwrap().shape,
            TypeShape::Newtype(TypeExpr::named("u64"))
        );
    }

    #[test]
    fn test_function_outputs_and_dependencies() {
        let dependency = file("shared", "pub struct Money { pub cents: i64 }").into_dependency();
        let helpers = file("helpers", "pub fn make_response() -> models::Greeting { todo!() }");

        let without = SourceIndex::new(&[dependency, helpers], false);
        assert!(without.find_type("Money", "").is_none());
        assert_eq!(
            without.find_function_output("make_response", "helpers"),
            Some(&TypeExpr::named("models::Greeting"))
        );

        let dependency = file("shared", "pub struct Money { pub cents: i64 }").into_dependency();
        let with = SourceIndex::new(&[dependency], true);
        assert!(with.find_type("Money", "").is_some());
    }
}
