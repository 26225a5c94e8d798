use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bytes::Bytes;

use crate::config::Credentials;

/// Methods used by the listing and content protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
        }
    }
}

/// An outgoing HTTP request, with query and credentials kept apart from the URL
///
/// Handed to an [`HttpExecutor`](crate::HttpExecutor), which may be a real
/// network client or an in-process server.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: Method,

    /// Absolute URL without query string
    pub url: String,

    /// Query parameters, appended to the URL in key order
    pub query: BTreeMap<String, String>,

    /// Request headers
    pub headers: HashMap<String, String>,

    /// Raw request body
    pub body: Option<Bytes>,

    /// Pass-through credentials, sent as basic auth
    pub credentials: Option<Credentials>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(name.into(), value.to_string());
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The URL with its query string, as sent on the wire.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.url, query)
    }
}

/// HTTP response from a request
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Status text (e.g., "OK", "Not Found")
    pub status_text: String,

    /// Response headers, names in lower case
    pub headers: HashMap<String, String>,

    /// Raw body, `None` when the response carried none
    pub body: Option<Bytes>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        let status_text = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();
        Self {
            status,
            status_text,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// A plain-text response, used for error messages and `exists` answers.
    pub fn text(status: u16, message: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain")
            .with_body(message.into())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body decoded as UTF-8, lossy.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|body| String::from_utf8_lossy(body).into_owned())
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_url_encodes_query_in_key_order() {
        let request = HttpRequest::get("http://localhost/list/a")
            .with_query("recursive", true)
            .with_query("full", false)
            .with_query("name", "a b");
        assert_eq!(
            request.full_url(),
            "http://localhost/list/a?full=false&name=a+b&recursive=true"
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let request = HttpRequest::put("http://localhost/").with_header("Content-Type", "text/plain");
        assert_eq!(request.header("content-type"), Some("text/plain"));

        let response = HttpResponse::new(200).with_header("Content-Length", "3");
        assert_eq!(response.header("CONTENT-LENGTH"), Some("3"));
    }

    #[test]
    fn success_is_2xx_only() {
        let response = HttpResponse::new(404);
        assert_eq!(response.status_text, "Not Found");
        assert!(!response.is_success());
        assert!(HttpResponse::new(204).is_success());
        assert!(!HttpResponse::new(304).is_success());
    }
}
