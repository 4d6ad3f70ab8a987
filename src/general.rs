//! General API information: the crate-level annotation block.

use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::attribute::{self, Attribute, AttributeKind};
use crate::document::{Contact, Document, ExternalDocs, License, SecurityScheme, Tag};
use crate::error::{Error, Result};
use crate::markdown::MarkdownSource;
use crate::operation::parse_extension;
use crate::source::{DocLine, SourceLocation};

/// Settings found in the general block that steer operation building.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneralInfo {
    pub collection_format_in_query: Option<String>,
}

/// True when the block holds no operation-only annotation.
pub fn is_general_block(lines: &[DocLine]) -> bool {
    lines.iter().all(|line| {
        !matches!(
            attribute::tokenize(&line.text).kind,
            AttributeKind::Summary
                | AttributeKind::Router
                | AttributeKind::Success
                | AttributeKind::Failure
                | AttributeKind::Response
        )
    })
}

pub struct GeneralInfoParser<'a> {
    markdown: Option<&'a dyn MarkdownSource>,
}

impl<'a> GeneralInfoParser<'a> {
    pub fn new(markdown: Option<&'a dyn MarkdownSource>) -> Self {
        Self { markdown }
    }

    /// Applies one general block to `document`.
    pub fn parse(&self, lines: &[DocLine], document: &mut Document) -> Result<GeneralInfo> {
        let mut general = GeneralInfo::default();
        let attrs: Vec<Attribute> = lines.iter().map(|line| attribute::tokenize(&line.text)).collect();
        let mut previous: Option<AttributeKind> = None;

        for (index, (attr, line)) in attrs.iter().zip(lines).enumerate() {
            let value = attr.value.as_str();
            let location = &line.location;
            let continued = previous == Some(attr.kind);
            previous = Some(attr.kind);

            match attr.kind {
                AttributeKind::Title => document.info.title = value.to_string(),
                AttributeKind::Version => document.info.version = value.to_string(),
                AttributeKind::Description => {
                    let description = document.info.description.get_or_insert_with(String::new);
                    if continued {
                        description.push('\n');
                    } else {
                        description.clear();
                    }
                    description.push_str(value);
                }
                AttributeKind::DescriptionMarkdown => {
                    document.info.description = Some(self.markdown_for("api", location)?);
                }
                AttributeKind::TermsOfService => {
                    document.info.terms_of_service = Some(value.to_string())
                }
                AttributeKind::ContactName => contact(document).name = Some(value.to_string()),
                AttributeKind::ContactUrl => contact(document).url = Some(value.to_string()),
                AttributeKind::ContactEmail => contact(document).email = Some(value.to_string()),
                AttributeKind::LicenseName => license(document).name = value.to_string(),
                AttributeKind::LicenseUrl => license(document).url = Some(value.to_string()),
                AttributeKind::Host => document.host = Some(value.to_string()),
                AttributeKind::BasePath => document.base_path = Some(value.to_string()),
                AttributeKind::Accept => {
                    let types = attribute::parse_mime_list(value)
                        .map_err(|message| Error::malformed(location, message))?;
                    extend_unique(&mut document.consumes, types);
                }
                AttributeKind::Produce => {
                    let types = attribute::parse_mime_list(value)
                        .map_err(|message| Error::malformed(location, message))?;
                    extend_unique(&mut document.produces, types);
                }
                AttributeKind::Schemes => {
                    document.schemes = value.split_whitespace().map(str::to_string).collect();
                }
                AttributeKind::QueryCollectionFormat => {
                    general.collection_format_in_query = Some(value.to_string());
                }
                AttributeKind::TagName => document.tags.push(Tag {
                    name: value.to_string(),
                    ..Default::default()
                }),
                AttributeKind::TagDescription => {
                    last_tag(document, attr, location)?.description = Some(value.to_string());
                }
                AttributeKind::TagDescriptionMarkdown => {
                    let name = last_tag(document, attr, location)?.name.clone();
                    let text = self.markdown_for(&name, location)?;
                    last_tag(document, attr, location)?.description = Some(text);
                }
                AttributeKind::TagDocsUrl => {
                    last_tag(document, attr, location)?.external_docs = Some(ExternalDocs {
                        url: value.to_string(),
                        description: None,
                    });
                }
                AttributeKind::TagDocsDescription => {
                    let tag = last_tag(document, attr, location)?;
                    match &mut tag.external_docs {
                        Some(docs) => docs.description = Some(value.to_string()),
                        None => {
                            return Err(Error::malformed(
                                location,
                                format!("{} needs to come after a @tag.docs.url", attr.name),
                            ))
                        }
                    }
                }
                AttributeKind::SecurityBasic => {
                    document
                        .security_definitions
                        .insert(value.to_string(), SecurityScheme::basic());
                }
                AttributeKind::SecurityApiKey
                | AttributeKind::SecurityOAuth2Application
                | AttributeKind::SecurityOAuth2Implicit
                | AttributeKind::SecurityOAuth2Password
                | AttributeKind::SecurityOAuth2AccessCode => {
                    let scheme = security_scheme(attr, &attrs[index + 1..], location)?;
                    document.security_definitions.insert(value.to_string(), scheme);
                }
                AttributeKind::Extension => {
                    let key = attr.key();
                    let in_security = document
                        .security_definitions
                        .values()
                        .any(|scheme| scheme.extensions.contains_key(&key));
                    if in_security {
                        continue;
                    }
                    let (name, value) = parse_extension(attr, location)?;
                    if name.contains("logo") {
                        document.info.extensions.insert(name, value);
                    } else {
                        document.extensions.insert(name, value);
                    }
                }
                AttributeKind::Scope => check_scope(attr, location)?,
                kind => debug!("{}: {:?} ignored in general API info", location, kind),
            }
        }
        Ok(general)
    }

    fn markdown_for(&self, tag: &str, location: &SourceLocation) -> Result<String> {
        match self.markdown {
            Some(source) => source.markdown_for(tag),
            None => Err(Error::malformed(
                location,
                "markdown description requested but no markdown directory is configured",
            )),
        }
    }
}

fn contact(document: &mut Document) -> &mut Contact {
    document.info.contact.get_or_insert_with(Contact::default)
}

fn license(document: &mut Document) -> &mut License {
    document.info.license.get_or_insert_with(License::default)
}

fn extend_unique(target: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

fn last_tag<'d>(document: &'d mut Document, attr: &Attribute, location: &SourceLocation) -> Result<&'d mut Tag> {
    document
        .tags
        .last_mut()
        .ok_or_else(|| Error::malformed(location, format!("{} needs to come after a @tag.name", attr.name)))
}

fn check_scope(attr: &Attribute, location: &SourceLocation) -> Result<()> {
    if attr.name.contains(',') {
        return Err(Error::malformed(
            location,
            format!("@scope can't use comma(,) get={}", attr.name),
        ));
    }
    Ok(())
}

/// Builds a security scheme from the attribute lines that follow its header,
/// up to the next security definition.
fn security_scheme(attr: &Attribute, following: &[Attribute], location: &SourceLocation) -> Result<SecurityScheme> {
    let required: &[AttributeKind] = match attr.kind {
        AttributeKind::SecurityApiKey => &[AttributeKind::SecurityIn, AttributeKind::SecurityName],
        AttributeKind::SecurityOAuth2Application | AttributeKind::SecurityOAuth2Password => {
            &[AttributeKind::SecurityTokenUrl]
        }
        AttributeKind::SecurityOAuth2Implicit => &[AttributeKind::SecurityAuthorizationUrl],
        _ => &[AttributeKind::SecurityTokenUrl, AttributeKind::SecurityAuthorizationUrl],
    };

    let mut values: BTreeMap<String, String> = BTreeMap::new();
    let mut scopes = BTreeMap::new();
    let mut extensions = BTreeMap::new();
    for next in following {
        if next.key().starts_with("securitydefinitions.") {
            break;
        }
        match next.kind {
            kind if required.contains(&kind) => {
                values.insert(next.key(), next.value.clone());
            }
            AttributeKind::Scope => {
                check_scope(next, location)?;
                let name = next.key().trim_start_matches("scope.").to_string();
                scopes.insert(name, next.value.clone());
            }
            AttributeKind::Extension => {
                extensions.insert(next.key(), Value::String(next.value.clone()));
            }
            _ => {}
        }
    }

    if values.len() != required.len() {
        let names: Vec<String> = required
            .iter()
            .map(|kind| format!("{:?}", kind).trim_start_matches("Security").to_string())
            .collect();
        return Err(Error::malformed(
            location,
            format!("{} requires {}", attr.name, names.join(", ")),
        ));
    }
    let value = |key: &str| values.get(key).cloned();

    let mut scheme = match attr.kind {
        AttributeKind::SecurityApiKey => SecurityScheme::api_key(
            &value("name").unwrap_or_default(),
            &value("in").unwrap_or_default(),
        ),
        AttributeKind::SecurityOAuth2Application => SecurityScheme::oauth2("application", None, value("tokenurl")),
        AttributeKind::SecurityOAuth2Implicit => SecurityScheme::oauth2("implicit", value("authorizationurl"), None),
        AttributeKind::SecurityOAuth2Password => SecurityScheme::oauth2("password", None, value("tokenurl")),
        _ => SecurityScheme::oauth2("accessCode", value("authorizationurl"), value("tokenurl")),
    };
    if scheme.scheme_type == "oauth2" {
        scheme.scopes = scopes;
    }
    scheme.extensions = extensions;
    Ok(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn lines(texts: &[&str]) -> Vec<DocLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| DocLine::new(*text, SourceLocation::new("src/main.rs", i + 1)))
            .collect()
    }

    fn parse(texts: &[&str]) -> Result<(Document, GeneralInfo)> {
        let mut document = Document::default();
        let general = GeneralInfoParser::new(None).parse(&lines(texts), &mut document)?;
        Ok((document, general))
    }

    #[test]
    fn test_info_fields() {
        let (document, general) = parse(&[
            "@title Pet Store",
            "@version 1.2",
            "@description First line",
            "@description second line",
            "@termsOfService http://example.com/terms",
            "@contact.name API Support",
            "@contact.email support@example.com",
            "@license.name Apache 2.0",
            "@license.url http://www.apache.org/licenses/LICENSE-2.0.html",
            "@host petstore.example.com",
            "@BasePath /v2",
            "@schemes http https",
            "@accept json",
            "@produce json,xml",
            "@query.collection.format multi",
            "@x-logo {\"url\": \"logo.png\"}",
            "@x-audience [\"public\"]",
        ])
        .unwrap();

        assert_eq!(document.info.title, "Pet Store");
        assert_eq!(document.info.version, "1.2");
        assert_eq!(document.info.description.as_deref(), Some("First line\nsecond line"));
        let contact = document.info.contact.as_ref().unwrap();
        assert_eq!(contact.name.as_deref(), Some("API Support"));
        assert_eq!(document.info.license.as_ref().unwrap().name, "Apache 2.0");
        assert_eq!(document.host.as_deref(), Some("petstore.example.com"));
        assert_eq!(document.base_path.as_deref(), Some("/v2"));
        assert_eq!(document.schemes, vec!["http", "https"]);
        assert_eq!(document.consumes, vec!["application/json"]);
        assert_eq!(document.produces, vec!["application/json", "text/xml"]);
        assert_eq!(general.collection_format_in_query.as_deref(), Some("multi"));
        assert_eq!(document.info.extensions["x-logo"], json!({"url": "logo.png"}));
        assert_eq!(document.extensions["x-audience"], json!(["public"]));
    }

    #[test]
    fn test_invalid_produce_list() {
        // the separator is a comma, `json xml` is a single unknown alias
        assert!(parse(&["@produce json xml"]).is_err());
    }

    #[test]
    fn test_tags() {
        let (document, _) = parse(&[
            "@tag.name users",
            "@tag.description User operations",
            "@tag.docs.url https://example.com/users",
            "@tag.docs.description Users guide",
            "@tag.name orders",
        ])
        .unwrap();
        assert_eq!(document.tags.len(), 2);
        let users = &document.tags[0];
        assert_eq!(users.description.as_deref(), Some("User operations"));
        let docs = users.external_docs.as_ref().unwrap();
        assert_eq!(docs.url, "https://example.com/users");
        assert_eq!(docs.description.as_deref(), Some("Users guide"));
    }

    #[test]
    fn test_tag_lines_need_a_tag() {
        assert!(matches!(
            parse(&["@tag.description orphan"]),
            Err(Error::MalformedAnnotation { .. })
        ));
        assert!(matches!(
            parse(&["@tag.name a", "@tag.docs.description no url"]),
            Err(Error::MalformedAnnotation { .. })
        ));
    }

    #[test]
    fn test_security_definitions() {
        let (document, _) = parse(&[
            "@securityDefinitions.basic BasicAuth",
            "@securityDefinitions.apikey ApiKeyAuth",
            "@in header",
            "@name Authorization",
            "@securitydefinitions.oauth2.accessCode OAuth2AccessCode",
            "@tokenUrl https://example.com/oauth/token",
            "@authorizationUrl https://example.com/oauth/authorize",
            "@scope.admin Grants read and write access",
            "@x-tokenName id_token",
            "@x-tokenName id_token",
        ])
        .unwrap();

        let definitions = &document.security_definitions;
        assert_eq!(definitions["BasicAuth"].scheme_type, "basic");
        assert_eq!(definitions["ApiKeyAuth"], SecurityScheme::api_key("Authorization", "header"));
        let oauth = &definitions["OAuth2AccessCode"];
        assert_eq!(oauth.flow.as_deref(), Some("accessCode"));
        assert_eq!(oauth.token_url.as_deref(), Some("https://example.com/oauth/token"));
        assert_eq!(oauth.scopes["admin"], "Grants read and write access");
        assert_eq!(oauth.extensions["x-tokenname"], json!("id_token"));
        // extension lines consumed by a security definition stay out of the root
        assert!(document.extensions.is_empty());
    }

    #[test]
    fn test_security_definition_missing_attribute() {
        let err = parse(&["@securityDefinitions.apikey ApiKeyAuth", "@in header"]).unwrap_err();
        assert!(err.to_string().contains("requires"));
        assert!(parse(&["@securityDefinitions.oauth2.implicit Implicit", "@tokenUrl x"]).is_err());
    }

    #[test]
    fn test_scope_with_comma() {
        let err = parse(&[
            "@securityDefinitions.oauth2.password Password",
            "@tokenUrl https://example.com/token",
            "@scope.read,write Both",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("comma"));
    }

    #[test]
    fn test_is_general_block() {
        assert!(is_general_block(&lines(&["@title API", "@version 1"])));
        assert!(!is_general_block(&lines(&["@title API", "@Router /a [get]"])));
    }
}
