use log::debug;
use std::collections::{BTreeMap, HashMap};

use crate::schema::Schema;
use crate::types::TypeRef;

/// Named definitions referenced from the document.
///
/// Every type is registered under its bare name until a second, different type
/// claims the same name. From then on the newcomer is registered under its
/// qualified name right away, and the first holder is renamed by [`finalize`],
/// which also repoints every reference issued under the old name.
///
/// [`finalize`]: SchemaRegistry::finalize
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    definitions: BTreeMap<String, Schema>,
    /// Name issued to each registered type
    output: HashMap<TypeRef, String>,
    /// First type registered under each bare name
    exist_names: HashMap<String, TypeRef>,
    /// Bare names whose first holder must be renamed
    to_be_renamed: BTreeMap<String, TypeRef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema` for `type_ref` if needed and returns a reference to it.
    ///
    /// # Arguments
    ///
    /// * `type_ref` - The declaration the schema belongs to
    /// * `schema` - Its schema; ignored when the type is already registered
    ///
    /// # Returns
    ///
    /// A `$ref` schema under the bare name, or under the qualified
    /// `scope_Name` when another type already holds the bare name.
    pub fn reference(&mut self, type_ref: &TypeRef, schema: &Schema) -> Schema {
        if let Some(name) = self.output.get(type_ref) {
            return Schema::reference(name);
        }

        let name = match self.exist_names.get(&type_ref.name) {
            Some(first) => {
                let renamed = type_ref.qualified_schema_name();
                debug!(
                    "Definition name `{}` already used by `{}`, registering `{}` as `{}`",
                    type_ref.name, first, type_ref, renamed
                );
                self.to_be_renamed
                    .entry(type_ref.name.clone())
                    .or_insert_with(|| first.clone());
                renamed
            }
            None => {
                self.exist_names
                    .insert(type_ref.name.clone(), type_ref.clone());
                type_ref.name.clone()
            }
        };

        self.definitions.insert(name.clone(), schema.clone());
        self.output.insert(type_ref.clone(), name.clone());
        Schema::reference(&name)
    }

    /// Replaces the stored schema of an already registered type.
    pub fn update(&mut self, type_ref: &TypeRef, schema: &Schema) {
        if let Some(name) = self.output.get(type_ref) {
            self.definitions.insert(name.clone(), schema.clone());
        }
    }

    pub fn contains(&self, type_ref: &TypeRef) -> bool {
        self.output.contains_key(type_ref)
    }

    pub fn name_of(&self, type_ref: &TypeRef) -> Option<&str> {
        self.output.get(type_ref).map(String::as_str)
    }

    pub fn definition(&self, name: &str) -> Option<&Schema> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Applies pending renames, consuming the registry.
    ///
    /// # Returns
    ///
    /// The definitions keyed by their final names, and the old-to-new name map
    /// that references outside the definitions (paths, parameters, responses)
    /// must still be rewritten with. References inside the returned
    /// definitions already follow the renames.
    pub fn finalize(self) -> (BTreeMap<String, Schema>, BTreeMap<String, String>) {
        let SchemaRegistry {
            mut definitions,
            to_be_renamed,
            ..
        } = self;

        let renames: BTreeMap<String, String> = to_be_renamed
            .iter()
            .map(|(name, type_ref)| (name.clone(), type_ref.qualified_schema_name()))
            .collect();

        for (old, new) in &renames {
            if let Some(schema) = definitions.remove(old) {
                debug!("Renaming definition `{}` to `{}`", old, new);
                definitions.insert(new.clone(), schema);
            }
        }
        for schema in definitions.values_mut() {
            schema.rewrite_refs(&renames);
        }

        (definitions, renames)
    }
}
