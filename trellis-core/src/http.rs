// HTTP request and response types

use crate::headers::HeaderMap;
use crate::{Error, HttpStatus};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::GET,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::DELETE,
        HttpMethod::PATCH,
        HttpMethod::HEAD,
        HttpMethod::OPTIONS,
    ];

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of methods a route binding answers to
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodSet(u8);

impl MethodSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A set answering every method
    pub fn any() -> Self {
        HttpMethod::ALL.into_iter().collect()
    }

    pub fn with(mut self, method: HttpMethod) -> Self {
        self.0 |= method.bit();
        self
    }

    pub fn contains(&self, method: HttpMethod) -> bool {
        self.0 & method.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = HttpMethod> + '_ {
        HttpMethod::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

impl From<HttpMethod> for MethodSet {
    fn from(method: HttpMethod) -> Self {
        MethodSet::empty().with(method)
    }
}

impl FromIterator<HttpMethod> for MethodSet {
    fn from_iter<I: IntoIterator<Item = HttpMethod>>(iter: I) -> Self {
        iter.into_iter().fold(MethodSet::empty(), MethodSet::with)
    }
}

impl<const N: usize> From<[HttpMethod; N]> for MethodSet {
    fn from(methods: [HttpMethod; N]) -> Self {
        methods.into_iter().collect()
    }
}

impl fmt::Debug for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// HTTP request as handed over by a transport: method, raw path with query
/// string, parsed headers and the unparsed body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a JSON body and the matching content type
    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        self.headers.insert("Content-Type", "application/json");
        Ok(self)
    }
}

/// Response envelope: status code, headers and a JSON body.
///
/// A `Null` body means "no content". Strings are sent as raw text; every
/// other value is sent as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Value::Null,
        }
    }

    pub fn ok() -> Self {
        Self::new(HttpStatus::Ok.code())
    }

    pub fn created() -> Self {
        Self::new(HttpStatus::Created.code())
    }

    pub fn no_content() -> Self {
        Self::new(HttpStatus::NoContent.code())
    }

    pub fn bad_request() -> Self {
        Self::new(HttpStatus::BadRequest.code())
    }

    pub fn not_found() -> Self {
        Self::new(HttpStatus::NotFound.code())
    }

    pub fn method_not_allowed() -> Self {
        Self::new(HttpStatus::MethodNotAllowed.code())
    }

    pub fn internal_server_error() -> Self {
        Self::new(HttpStatus::InternalServerError.code())
    }

    /// A 200 response carrying `body`
    pub fn json(body: impl Into<Value>) -> Self {
        Self::ok().with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize any value into the body
    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        self.body = serde_json::to_value(value)?;
        Ok(self)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_null()
    }

    /// Content type implied by the body, unless a header overrides it
    pub fn content_type(&self) -> Option<&str> {
        if let Some(explicit) = self.headers.content_type() {
            return Some(explicit);
        }
        match &self.body {
            Value::Null => None,
            Value::String(_) => Some("text/plain; charset=utf-8"),
            _ => Some("application/json"),
        }
    }

    /// Wire bytes for the body
    pub fn body_bytes(&self) -> Result<Bytes, Error> {
        match &self.body {
            Value::Null => Ok(Bytes::new()),
            Value::String(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            other => Ok(Bytes::from(serde_json::to_vec(other)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!(HttpMethod::from_str("get"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::from_str("Patch"), Some(HttpMethod::PATCH));
        assert_eq!(HttpMethod::from_str("BREW"), None);
    }

    #[test]
    fn test_method_set() {
        let set = MethodSet::from([HttpMethod::GET, HttpMethod::HEAD]);
        assert!(set.contains(HttpMethod::GET));
        assert!(set.contains(HttpMethod::HEAD));
        assert!(!set.contains(HttpMethod::POST));
        assert_eq!(set.iter().count(), 2);

        let any = MethodSet::any();
        assert!(HttpMethod::ALL.iter().all(|m| any.contains(*m)));
        assert!(MethodSet::empty().is_empty());
    }

    #[test]
    fn test_string_body_is_plain_text() {
        let res = HttpResponse::json("Hello world");
        assert_eq!(res.status, 200);
        assert_eq!(res.content_type(), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body_bytes().unwrap(), Bytes::from_static(b"Hello world"));
    }

    #[test]
    fn test_object_body_is_json() {
        let res = HttpResponse::json(json!({ "a": 1 }));
        assert_eq!(res.content_type(), Some("application/json"));
        assert_eq!(res.body_bytes().unwrap(), Bytes::from_static(br#"{"a":1}"#));
    }

    #[test]
    fn test_empty_body() {
        let res = HttpResponse::no_content();
        assert!(!res.has_body());
        assert_eq!(res.content_type(), None);
        assert!(res.body_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let res = HttpResponse::json("<p>hi</p>").with_header("content-type", "text/html");
        assert_eq!(res.content_type(), Some("text/html"));
    }

    #[test]
    fn test_request_with_json() {
        let req = HttpRequest::new("POST", "/users")
            .with_json(&json!({ "name": "ada" }))
            .unwrap();
        assert_eq!(req.headers.get("content-type"), Some("application/json"));
        assert_eq!(&req.body[..], br#"{"name":"ada"}"#);
    }
}
