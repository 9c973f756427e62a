// Per-request context: path, query parameters and matched path variables

use crate::headers::HeaderMap;
use std::collections::HashMap;

pub type QueryParams = HashMap<String, String>;
pub type PathVariables = HashMap<String, String>;

/// Derived per-request state.
///
/// `query` is `None` when the raw path has no `?` or nothing follows it;
/// an empty map never stands in for "no query string".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub path: String,
    pub query: Option<QueryParams>,
    pub path_variables: Option<PathVariables>,
}

impl RequestContext {
    /// Split a raw `path?query` string.
    ///
    /// ```rust
    /// use trellis_core::context::RequestContext;
    ///
    /// let ctx = RequestContext::parse("/greet?message=hello+world%20%28testing%29&foo=bar");
    /// let query = ctx.query.unwrap();
    /// assert_eq!(ctx.path, "/greet");
    /// assert_eq!(query["message"], "hello world (testing)");
    /// assert_eq!(query["foo"], "bar");
    /// ```
    pub fn parse(raw_path: &str) -> Self {
        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) if !query.is_empty() => (path, Some(parse_query_string(query))),
            Some((path, _)) => (path, None),
            None => (raw_path, None),
        };

        Self {
            path: path.to_string(),
            query,
            path_variables: None,
        }
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_ref()?.get(name).map(String::as_str)
    }

    pub fn path_variable(&self, name: &str) -> Option<&str> {
        self.path_variables.as_ref()?.get(name).map(String::as_str)
    }
}

/// Parse `k1=v1&k2=v2`. `+` is a space, values are percent-decoded, the last
/// duplicate wins and a key without `=` maps to an empty string.
pub fn parse_query_string(query: &str) -> QueryParams {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Percent-decode a query component with `+` as space. Malformed escapes
/// are kept verbatim.
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Percent-decode a header value or path segment (no `+` handling).
pub fn percent_decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Read-only snapshot of a request handed to model-attribute producers.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub query: Option<QueryParams>,
    pub path_variables: Option<PathVariables>,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn from_context(method: &str, ctx: &RequestContext, headers: &HeaderMap) -> Self {
        Self {
            method: method.to_string(),
            path: ctx.path.clone(),
            query: ctx.query.clone(),
            path_variables: ctx.path_variables.clone(),
            headers: headers.clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_ref()?.get(name).map(String::as_str)
    }

    pub fn path_variable(&self, name: &str) -> Option<&str> {
        self.path_variables.as_ref()?.get(name).map(String::as_str)
    }
}
