use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use swagger_from_annotations::{
    config::Config,
    document::Document,
    error::Error,
    generator::Generator,
    http::HttpMethod,
    parser::{AstParser, ParsedFile},
    routes::{RouteEntry, RouteTable},
    scanner::FileScanner,
    serializer::{serialize_json, serialize_yaml},
};
use tempfile::TempDir;

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

fn petstore() -> TempDir {
    create_test_project(vec![
        ("src/main.rs", include_str!("fixtures/petstore/main.rs")),
        ("src/models.rs", include_str!("fixtures/petstore/models.rs")),
        ("src/handlers.rs", include_str!("fixtures/petstore/handlers.rs")),
        ("src/admin.rs", include_str!("fixtures/petstore/admin.rs")),
    ])
}

fn parse_project(root: &Path) -> Vec<ParsedFile> {
    let scan_result = FileScanner::new(root.to_path_buf())
        .scan()
        .expect("Failed to scan directory");
    AstParser::parse_files(&scan_result.rust_files)
        .into_iter()
        .map(|result| result.expect("Fixture should parse"))
        .collect()
}

fn generate(root: &Path, config: &Config) -> Result<Document, Error> {
    let files = parse_project(root);
    let routes = RouteTable::scan(&files);
    Generator::new(&files, config).with_routes(Some(&routes)).generate()
}

#[test]
fn test_petstore_general_info_and_paths() {
    let project = petstore();
    let document = generate(project.path(), &Config::default()).unwrap();

    assert_eq!(document.swagger, "2.0");
    assert_eq!(document.info.title, "Petstore");
    assert_eq!(
        document.info.description.as_deref(),
        Some("Pets and the people who keep them.")
    );
    assert_eq!(document.host.as_deref(), Some("petstore.local"));
    assert_eq!(document.base_path.as_deref(), Some("/v1"));
    assert_eq!(document.schemes, vec!["https"]);
    assert_eq!(document.security_definitions["ApiKeyAuth"].scheme_type, "apiKey");

    let paths: Vec<_> = document.paths.keys().cloned().collect();
    assert_eq!(paths, vec!["/admin/stats", "/hello/{name}", "/pets", "/pets/{id}"]);
    assert_eq!(document.operations().count(), 6);
}

#[test]
fn test_annotated_parameters_and_responses() {
    let project = petstore();
    let document = generate(project.path(), &Config::default()).unwrap();

    let list = document.operation("/pets", HttpMethod::Get).unwrap();
    assert_eq!(list.tags, vec!["pets"]);
    let limit = list.parameters.iter().find(|p| p.name == "limit").unwrap();
    assert_eq!(limit.location, "query");
    assert_eq!(limit.param_type.as_deref(), Some("integer"));
    assert_eq!(limit.default, Some(json!(20)));
    assert_eq!(limit.minimum, Some(1.0));
    assert_eq!(limit.maximum, Some(100.0));
    let tags = list.parameters.iter().find(|p| p.name == "tags").unwrap();
    assert_eq!(tags.param_type.as_deref(), Some("array"));
    assert_eq!(tags.items.as_ref().unwrap().schema_type.as_deref(), Some("string"));
    let listed = list.responses["200"].schema.as_ref().unwrap();
    assert_eq!(listed.schema_type.as_deref(), Some("array"));
    assert_eq!(listed.items.as_ref().unwrap().ref_name(), Some("Pet"));

    let create = document.operation("/pets", HttpMethod::Post).unwrap();
    assert_eq!(create.consumes, vec!["application/json"]);
    let body = &create.parameters[0];
    assert_eq!(body.location, "body");
    assert!(body.required);
    assert_eq!(body.schema.as_ref().unwrap().ref_name(), Some("NewPet"));
    assert_eq!(create.responses["201"].schema.as_ref().unwrap().ref_name(), Some("Pet"));
    assert_eq!(create.responses["400"].description, "Invalid pet");
    assert_eq!(create.security.len(), 1);
    assert!(create.security[0].contains_key("ApiKeyAuth"));

    let new_pet = &document.definitions["NewPet"];
    assert_eq!(new_pet.required.as_deref(), Some(&["name".to_string()][..]));
}

#[test]
fn test_unannotated_handler_is_inferred() {
    let project = petstore();
    let document = generate(project.path(), &Config::default()).unwrap();

    let greet = document.operation("/hello/{name}", HttpMethod::Get).unwrap();
    assert_eq!(greet.parameters.len(), 1);
    let name = &greet.parameters[0];
    assert_eq!(name.name, "name");
    assert_eq!(name.location, "path");
    assert_eq!(name.param_type.as_deref(), Some("string"));
    assert!(name.required);
    assert_eq!(greet.responses["200"].schema.as_ref().unwrap().ref_name(), Some("Greeting"));

    let greeting = serde_json::to_value(&document.definitions["Greeting"]).unwrap();
    assert_eq!(greeting["properties"]["message"], json!({"type": "string"}));
}

#[test]
fn test_annotations_take_precedence_over_inference() {
    let project = petstore();
    let document = generate(project.path(), &Config::default()).unwrap();

    let show = document.operation("/pets/{id}", HttpMethod::Get).unwrap();
    let names: Vec<_> = show.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["id", "verbose"]);

    let id = &show.parameters[0];
    assert_eq!(id.description.as_deref(), Some("Pet id"));
    let verbose = &show.parameters[1];
    assert_eq!(verbose.location, "query");
    assert!(!verbose.required);
}

#[test]
fn test_same_named_types_get_distinct_definitions() {
    let project = petstore();
    let document = generate(project.path(), &Config::default()).unwrap();

    assert!(!document.definitions.contains_key("Response"));
    let stats = document.operation("/admin/stats", HttpMethod::Get).unwrap();
    let delete = document.operation("/pets/{id}", HttpMethod::Delete).unwrap();
    let stats_ref = stats.responses["200"].schema.as_ref().unwrap().ref_name().unwrap();
    let delete_ref = delete.responses["200"].schema.as_ref().unwrap().ref_name().unwrap();
    assert_eq!(stats_ref, "admin_Response");
    assert_eq!(delete_ref, "models_Response");

    let total = document.definitions[stats_ref].properties.as_ref().unwrap();
    assert!(total.contains_key("total"));
    let ok = document.definitions[delete_ref].properties.as_ref().unwrap();
    assert!(ok.contains_key("ok"));
}

#[test]
fn test_recursive_and_string_encoded_fields() {
    let project = petstore();
    let document = generate(project.path(), &Config::default()).unwrap();

    let pet = &document.definitions["Pet"];
    let properties = pet.properties.as_ref().unwrap();
    assert_eq!(properties["parent"].ref_name(), Some("Pet"));

    let age = &properties["ageMonths"];
    assert_eq!(age.schema_type.as_deref(), Some("string"));
    assert_eq!(age.example, Some(json!("0")));
    assert_eq!(
        pet.required.as_deref(),
        Some(&["ageMonths".to_string(), "id".to_string(), "name".to_string(), "tags".to_string()][..])
    );
}

#[test]
fn test_generation_is_idempotent() {
    let project = petstore();
    let config = Config::default();

    let first = generate(project.path(), &config).unwrap();
    let second = generate(project.path(), &config).unwrap();
    assert_eq!(serialize_json(&first, false).unwrap(), serialize_json(&second, false).unwrap());
    assert_eq!(serialize_yaml(&first).unwrap(), serialize_yaml(&second).unwrap());
}

#[test]
fn test_unregistered_route_strict_and_lenient() {
    let project = create_test_project(vec![(
        "src/items.rs",
        r#"
        /// @Summary Show an item
        /// @Param id path string true "Item id"
        /// @Success 200 {string} string
        /// @Router /items/{id} [get]
        pub fn show_item() {}
        "#,
    )]);
    let files = parse_project(project.path());
    let routes = RouteTable::new(vec![RouteEntry::new("items::list_items", "/items", HttpMethod::Get)]);

    let mut config = Config::default();
    config.strict = true;
    let err = Generator::new(&files, &config)
        .with_routes(Some(&routes))
        .generate()
        .unwrap_err();
    assert!(matches!(err, Error::RouteMismatch { ref operation, .. } if operation == "items::show_item"));

    config.strict = false;
    let document = Generator::new(&files, &config)
        .with_routes(Some(&routes))
        .generate()
        .unwrap();
    let operation = document.operation("/items/{id}", HttpMethod::Get).unwrap();
    assert_eq!(operation.summary.as_deref(), Some("Show an item"));
}

#[test]
fn test_operation_ids_must_be_unique() {
    let project = create_test_project(vec![(
        "src/lib.rs",
        r#"
        /// @ID listThings
        /// @Router /things [get]
        pub fn list_things() {}

        /// @ID listThings
        /// @Router /stuff [get]
        pub fn list_stuff() {}
        "#,
    )]);
    let err = generate(project.path(), &Config::default()).unwrap_err();
    assert!(matches!(err, Error::DuplicateOperationId { ref id, .. } if id == "listThings"));
}
