//! Doc-comment line tokenizer.
//!
//! Every line is classified by the first entry of [`GRAMMAR`] that accepts its
//! leading word. Matching is case-insensitive and the order of the table is the
//! precedence: prefix entries (`@scope.`, `@x-`) only see lines that no exact
//! entry above them claimed.

use regex::Regex;
use std::sync::LazyLock;

/// The kind of an annotation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    // General API information
    Title,
    Version,
    TermsOfService,
    ContactName,
    ContactUrl,
    ContactEmail,
    LicenseName,
    LicenseUrl,
    Host,
    BasePath,
    Schemes,
    QueryCollectionFormat,
    TagName,
    TagDescription,
    TagDescriptionMarkdown,
    TagDocsUrl,
    TagDocsDescription,
    SecurityBasic,
    SecurityApiKey,
    SecurityOAuth2Application,
    SecurityOAuth2Implicit,
    SecurityOAuth2Password,
    SecurityOAuth2AccessCode,
    SecurityIn,
    SecurityName,
    SecurityTokenUrl,
    SecurityAuthorizationUrl,
    Scope,
    // Operations
    Router,
    Param,
    Success,
    Failure,
    Response,
    Header,
    Accept,
    Produce,
    Summary,
    DescriptionMarkdown,
    Description,
    Id,
    Tags,
    Security,
    Deprecated,
    // Shared
    Extension,
    Other,
}

impl AttributeKind {
    /// Kinds that only make sense in a general API information block.
    pub fn is_general(&self) -> bool {
        matches!(
            self,
            AttributeKind::Title
                | AttributeKind::Version
                | AttributeKind::TermsOfService
                | AttributeKind::ContactName
                | AttributeKind::ContactUrl
                | AttributeKind::ContactEmail
                | AttributeKind::LicenseName
                | AttributeKind::LicenseUrl
                | AttributeKind::Host
                | AttributeKind::BasePath
                | AttributeKind::Schemes
                | AttributeKind::QueryCollectionFormat
                | AttributeKind::TagName
                | AttributeKind::TagDescription
                | AttributeKind::TagDescriptionMarkdown
                | AttributeKind::TagDocsUrl
                | AttributeKind::TagDocsDescription
                | AttributeKind::SecurityBasic
                | AttributeKind::SecurityApiKey
                | AttributeKind::SecurityOAuth2Application
                | AttributeKind::SecurityOAuth2Implicit
                | AttributeKind::SecurityOAuth2Password
                | AttributeKind::SecurityOAuth2AccessCode
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// The whole leading word, lowercased
    Word(&'static str),
    /// A prefix of the lowercased leading word
    Prefix(&'static str),
}

impl Matcher {
    fn accepts(&self, word: &str) -> bool {
        match self {
            Matcher::Word(expected) => word == *expected,
            Matcher::Prefix(prefix) => word.starts_with(prefix) && word.len() > prefix.len(),
        }
    }
}

/// Ordered classification table. Earlier entries win.
const GRAMMAR: &[(Matcher, AttributeKind)] = &[
    (Matcher::Word("@title"), AttributeKind::Title),
    (Matcher::Word("@version"), AttributeKind::Version),
    (Matcher::Word("@termsofservice"), AttributeKind::TermsOfService),
    (Matcher::Word("@contact.name"), AttributeKind::ContactName),
    (Matcher::Word("@contact.url"), AttributeKind::ContactUrl),
    (Matcher::Word("@contact.email"), AttributeKind::ContactEmail),
    (Matcher::Word("@license.name"), AttributeKind::LicenseName),
    (Matcher::Word("@license.url"), AttributeKind::LicenseUrl),
    (Matcher::Word("@host"), AttributeKind::Host),
    (Matcher::Word("@basepath"), AttributeKind::BasePath),
    (Matcher::Word("@schemes"), AttributeKind::Schemes),
    (Matcher::Word("@query.collection.format"), AttributeKind::QueryCollectionFormat),
    (Matcher::Word("@tag.name"), AttributeKind::TagName),
    (Matcher::Word("@tag.description.markdown"), AttributeKind::TagDescriptionMarkdown),
    (Matcher::Word("@tag.description"), AttributeKind::TagDescription),
    (Matcher::Word("@tag.docs.url"), AttributeKind::TagDocsUrl),
    (Matcher::Word("@tag.docs.description"), AttributeKind::TagDocsDescription),
    (Matcher::Word("@securitydefinitions.basic"), AttributeKind::SecurityBasic),
    (Matcher::Word("@securitydefinitions.apikey"), AttributeKind::SecurityApiKey),
    (Matcher::Word("@securitydefinitions.oauth2.application"), AttributeKind::SecurityOAuth2Application),
    (Matcher::Word("@securitydefinitions.oauth2.implicit"), AttributeKind::SecurityOAuth2Implicit),
    (Matcher::Word("@securitydefinitions.oauth2.password"), AttributeKind::SecurityOAuth2Password),
    (Matcher::Word("@securitydefinitions.oauth2.accesscode"), AttributeKind::SecurityOAuth2AccessCode),
    (Matcher::Word("@in"), AttributeKind::SecurityIn),
    (Matcher::Word("@name"), AttributeKind::SecurityName),
    (Matcher::Word("@tokenurl"), AttributeKind::SecurityTokenUrl),
    (Matcher::Word("@authorizationurl"), AttributeKind::SecurityAuthorizationUrl),
    (Matcher::Prefix("@scope."), AttributeKind::Scope),
    (Matcher::Word("@router"), AttributeKind::Router),
    (Matcher::Word("@param"), AttributeKind::Param),
    (Matcher::Word("@success"), AttributeKind::Success),
    (Matcher::Word("@failure"), AttributeKind::Failure),
    (Matcher::Word("@response"), AttributeKind::Response),
    (Matcher::Word("@header"), AttributeKind::Header),
    (Matcher::Word("@accept"), AttributeKind::Accept),
    (Matcher::Word("@produce"), AttributeKind::Produce),
    (Matcher::Word("@summary"), AttributeKind::Summary),
    (Matcher::Word("@description.markdown"), AttributeKind::DescriptionMarkdown),
    (Matcher::Word("@description"), AttributeKind::Description),
    (Matcher::Word("@id"), AttributeKind::Id),
    (Matcher::Word("@tags"), AttributeKind::Tags),
    (Matcher::Word("@security"), AttributeKind::Security),
    (Matcher::Word("@deprecated"), AttributeKind::Deprecated),
    (Matcher::Prefix("@x-"), AttributeKind::Extension),
];

/// One classified doc-comment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub kind: AttributeKind,
    /// Leading word as written, e.g. `@Param`
    pub name: String,
    /// Everything after the leading word, trimmed
    pub value: String,
    /// The full trimmed line
    pub text: String,
}

impl Attribute {
    /// Leading word without `@`, lowercased.
    pub fn key(&self) -> String {
        self.name.trim_start_matches('@').to_lowercase()
    }
}

/// Classifies one doc-comment line.
pub fn tokenize(line: &str) -> Attribute {
    let text = line.trim();
    let (name, value) = match text.split_once(char::is_whitespace) {
        Some((name, value)) => (name, value.trim()),
        None => (text, ""),
    };
    let word = name.to_lowercase();

    let kind = if word.starts_with('@') {
        GRAMMAR
            .iter()
            .find(|(matcher, _)| matcher.accepts(&word))
            .map(|(_, kind)| *kind)
            .unwrap_or(AttributeKind::Other)
    } else {
        AttributeKind::Other
    };

    Attribute {
        kind,
        name: name.to_string(),
        value: value.to_string(),
        text: text.to_string(),
    }
}

static MIME_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/\s]+/[^/\s]+$").unwrap());

/// Expands one MIME alias, or accepts a literal `type/subtype`.
pub fn mime_type(alias: &str) -> Option<String> {
    let expanded = match alias {
        "json" => "application/json",
        "xml" => "text/xml",
        "plain" => "text/plain",
        "html" => "text/html",
        "mpfd" => "multipart/form-data",
        "x-www-form-urlencoded" => "application/x-www-form-urlencoded",
        "json-api" => "application/vnd.api+json",
        "json-stream" => "application/x-json-stream",
        "octet-stream" => "application/octet-stream",
        "png" => "image/png",
        "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        literal if MIME_TYPE.is_match(literal) => literal,
        _ => return None,
    };
    Some(expanded.to_string())
}

/// Parses the comma separated value of an `@Accept` or `@Produce` line.
pub fn parse_mime_list(value: &str) -> Result<Vec<String>, String> {
    let mut types = Vec::new();
    for alias in value.split(',').map(str::trim).filter(|alias| !alias.is_empty()) {
        let mime = mime_type(alias).ok_or_else(|| format!("{} accept type can't be accepted", alias))?;
        if !types.contains(&mime) {
            types.push(mime);
        }
    }
    if types.is_empty() {
        return Err("missing MIME types".to_string());
    }
    Ok(types)
}
