//! HTTP vocabulary shared by the annotation parser, the call-site inspector and the assembler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP methods an operation can be routed on.
///
/// The declaration order is the order in which operations of one path are
/// visited when the document is checked, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET method
    #[serde(alias = "get")]
    Get,
    /// HTTP PUT method
    #[serde(alias = "put")]
    Put,
    /// HTTP POST method
    #[serde(alias = "post")]
    Post,
    /// HTTP DELETE method
    #[serde(alias = "delete")]
    Delete,
    /// HTTP OPTIONS method
    #[serde(alias = "options")]
    Options,
    /// HTTP HEAD method
    #[serde(alias = "head")]
    Head,
    /// HTTP PATCH method
    #[serde(alias = "patch")]
    Patch,
}

impl HttpMethod {
    /// All methods in visiting order.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
    ];

    /// Upper-case wire name (`GET`, `POST`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "put" => Ok(HttpMethod::Put),
            "post" => Ok(HttpMethod::Post),
            "delete" => Ok(HttpMethod::Delete),
            "options" => Ok(HttpMethod::Options),
            "head" => Ok(HttpMethod::Head),
            "patch" => Ok(HttpMethod::Patch),
            other => Err(format!("unknown HTTP method `{}`", other)),
        }
    }
}

/// Well-known status constants as spelled on `http::StatusCode`.
const STATUS_CODES: &[(&str, u16, &str)] = &[
    ("CONTINUE", 100, "Continue"),
    ("SWITCHING_PROTOCOLS", 101, "Switching Protocols"),
    ("OK", 200, "OK"),
    ("CREATED", 201, "Created"),
    ("ACCEPTED", 202, "Accepted"),
    ("NON_AUTHORITATIVE_INFORMATION", 203, "Non Authoritative Information"),
    ("NO_CONTENT", 204, "No Content"),
    ("RESET_CONTENT", 205, "Reset Content"),
    ("PARTIAL_CONTENT", 206, "Partial Content"),
    ("MOVED_PERMANENTLY", 301, "Moved Permanently"),
    ("FOUND", 302, "Found"),
    ("SEE_OTHER", 303, "See Other"),
    ("NOT_MODIFIED", 304, "Not Modified"),
    ("TEMPORARY_REDIRECT", 307, "Temporary Redirect"),
    ("PERMANENT_REDIRECT", 308, "Permanent Redirect"),
    ("BAD_REQUEST", 400, "Bad Request"),
    ("UNAUTHORIZED", 401, "Unauthorized"),
    ("PAYMENT_REQUIRED", 402, "Payment Required"),
    ("FORBIDDEN", 403, "Forbidden"),
    ("NOT_FOUND", 404, "Not Found"),
    ("METHOD_NOT_ALLOWED", 405, "Method Not Allowed"),
    ("NOT_ACCEPTABLE", 406, "Not Acceptable"),
    ("REQUEST_TIMEOUT", 408, "Request Timeout"),
    ("CONFLICT", 409, "Conflict"),
    ("GONE", 410, "Gone"),
    ("PRECONDITION_FAILED", 412, "Precondition Failed"),
    ("PAYLOAD_TOO_LARGE", 413, "Payload Too Large"),
    ("UNSUPPORTED_MEDIA_TYPE", 415, "Unsupported Media Type"),
    ("UNPROCESSABLE_ENTITY", 422, "Unprocessable Entity"),
    ("TOO_MANY_REQUESTS", 429, "Too Many Requests"),
    ("INTERNAL_SERVER_ERROR", 500, "Internal Server Error"),
    ("NOT_IMPLEMENTED", 501, "Not Implemented"),
    ("BAD_GATEWAY", 502, "Bad Gateway"),
    ("SERVICE_UNAVAILABLE", 503, "Service Unavailable"),
    ("GATEWAY_TIMEOUT", 504, "Gateway Timeout"),
];

/// Numeric value of a status constant name such as `NOT_FOUND`.
pub fn status_from_name(name: &str) -> Option<u16> {
    STATUS_CODES
        .iter()
        .find(|(constant, _, _)| *constant == name)
        .map(|(_, code, _)| *code)
}

/// Reason phrase for a status code, used as the default response description.
pub fn reason_phrase(code: &str) -> Option<&'static str> {
    let code: u16 = code.parse().ok()?;
    STATUS_CODES
        .iter()
        .find(|(_, value, _)| *value == code)
        .map(|(_, _, phrase)| *phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip_through_str() {
        for method in HttpMethod::ALL {
            assert_eq!(method.as_str().parse::<HttpMethod>().unwrap(), method);
        }
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("fetch".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_status_lookup() {
        assert_eq!(status_from_name("OK"), Some(200));
        assert_eq!(status_from_name("UNPROCESSABLE_ENTITY"), Some(422));
        assert_eq!(status_from_name("TEAPOT"), None);
        assert_eq!(reason_phrase("404"), Some("Not Found"));
        assert_eq!(reason_phrase("default"), None);
    }
}
