//! Body-parsing collaborators.
//!
//! The dispatcher never reads a body itself. When at least one matched
//! route needs one, it calls the [`BodyParser`] supplied with the request,
//! exactly once, and hands the decoded value to every handler.

use crate::headers::HeaderMap;
use crate::{Error, RequestError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;

/// Decodes the request body into a JSON value.
#[async_trait]
pub trait BodyParser: Send + Sync {
    async fn parse(&self, headers: &HeaderMap) -> Result<Value, Error>;
}

/// Parses an in-memory body according to its `Content-Type`.
///
/// - `application/json` and `*+json`: JSON, invalid input is a 400
/// - `application/x-www-form-urlencoded`: flat object of strings
/// - `text/*`: a JSON string
/// - anything else: JSON when it parses, otherwise UTF-8 text
///
/// An empty body decodes to `Null` regardless of content type.
#[derive(Debug, Clone)]
pub struct BytesBodyParser {
    body: Bytes,
}

impl BytesBodyParser {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    fn parse_json(&self) -> Result<Value, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::BodyParse(e.to_string()))
    }

    fn parse_form(&self) -> Result<Value, Error> {
        let fields: HashMap<String, String> = serde_urlencoded::from_bytes(&self.body)
            .map_err(|e| Error::BodyParse(e.to_string()))?;
        Ok(Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect::<Map<_, _>>(),
        ))
    }

    fn parse_text(&self) -> Result<Value, Error> {
        std::str::from_utf8(&self.body)
            .map(|s| Value::String(s.to_string()))
            .map_err(|_| {
                RequestError::bad_request("Request body is not valid UTF-8 text").into()
            })
    }
}

#[async_trait]
impl BodyParser for BytesBodyParser {
    async fn parse(&self, headers: &HeaderMap) -> Result<Value, Error> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }

        let mime = headers
            .content_type()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime == "application/json" || mime.ends_with("+json") {
            self.parse_json()
        } else if mime == "application/x-www-form-urlencoded" {
            self.parse_form()
        } else if mime.starts_with("text/") {
            self.parse_text()
        } else {
            self.parse_json().or_else(|_| self.parse_text())
        }
    }
}

/// Adapts an async closure into a [`BodyParser`].
pub struct FnBodyParser<F> {
    f: F,
}

impl<F> FnBodyParser<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> BodyParser for FnBodyParser<F>
where
    F: Fn(HeaderMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Error>> + Send,
{
    async fn parse(&self, headers: &HeaderMap) -> Result<Value, Error> {
        (self.f)(headers.clone()).await
    }
}
