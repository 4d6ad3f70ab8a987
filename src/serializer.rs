//! Writes a finished [`Document`] as YAML or JSON.

use crate::document::Document;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes the document to YAML.
pub fn serialize_yaml(doc: &Document) -> Result<String> {
    debug!("Serializing Swagger document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize Swagger document to YAML")
}

/// Serializes the document to JSON, indented unless `compact` is set.
pub fn serialize_json(doc: &Document, compact: bool) -> Result<String> {
    debug!("Serializing Swagger document to JSON (compact: {})", compact);
    let json = if compact {
        serde_json::to_string(doc)
    } else {
        serde_json::to_string_pretty(doc)
    };
    json.context("Failed to serialize Swagger document to JSON")
}

/// Writes `content` to `path`, creating parent directories as needed.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PathItem, PathOperation, Response};
    use crate::http::HttpMethod;
    use crate::schema::Schema;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_document() -> Document {
        let mut doc = Document::default();
        doc.info.title = "Pets".to_string();
        doc.base_path = Some("/api".to_string());

        let mut operation = PathOperation::default();
        operation.responses.insert(
            "200".to_string(),
            Response {
                description: "OK".to_string(),
                schema: Some(Schema::reference("Pet")),
                ..Default::default()
            },
        );
        let mut item = PathItem::default();
        item.set(HttpMethod::Get, operation);
        doc.paths.insert("/pets".to_string(), item);

        let mut pet = Schema::object();
        pet.properties = Some([("name".to_string(), Schema::primitive("string"))].into());
        doc.definitions.insert("Pet".to_string(), pet);
        doc
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&sample_document()).unwrap();

        assert!(yaml.contains("swagger: '2.0'"));
        assert!(yaml.contains("basePath: /api"));
        assert!(yaml.contains("$ref: '#/definitions/Pet'"));

        let parsed: Document = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.info.title, "Pets");
        assert!(parsed.operation("/pets", HttpMethod::Get).is_some());
    }

    #[test]
    fn test_serialize_json_pretty_and_compact() {
        let doc = sample_document();
        let pretty = serialize_json(&doc, false).unwrap();
        let compact = serialize_json(&doc, true).unwrap();

        assert!(pretty.lines().count() > 5);
        assert_eq!(compact.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&compact).unwrap();
        assert_eq!(value["swagger"], "2.0");
        assert_eq!(
            value["paths"]["/pets"]["get"]["responses"]["200"]["schema"]["$ref"],
            "#/definitions/Pet"
        );
        assert_eq!(value["definitions"]["Pet"]["properties"]["name"]["type"], "string");
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("docs").join("swagger.json");

        write_to_file("{}", &file_path).unwrap();
        write_to_file("{\"swagger\":\"2.0\"}", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"swagger\":\"2.0\"}");
    }
}
