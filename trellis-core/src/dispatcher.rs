//! Request dispatch.
//!
//! [`RequestRouter::handle_request`] runs one request through a fixed
//! pipeline:
//!
//! 1. parse the path and query string
//! 2. look the path up in the route table and keep the bindings that answer
//!    the method (unknown path: 405, known path without a matching method:
//!    404)
//! 3. fail with an internal error if a body is required but no body parser
//!    was supplied
//! 4. parse the body once, if any matched route requires it
//! 5. produce each referenced model attribute once per controller
//! 6. resolve the route's arguments
//! 7. invoke the handler, through the route's FIFO mutex if synchronized
//! 8. fold the handler result into the response envelope
//!
//! Steps 5 to 8 repeat for every matched route, in registration order. A
//! request that produced no envelope is answered with 204.

use crate::binding::RouteBinding;
use crate::body::{BodyParser, BytesBodyParser};
use crate::context::{RequestContext, RequestInfo};
use crate::handler::HandlerResult;
use crate::headers::HeaderMap;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::logging::{debug, error, info, warn};
use crate::resolver::{AttributeCache, RequestSources, resolve_arguments};
use crate::route_table::{RouteLookup, RouteTable};
use crate::synchronizer::SynchronizerRegistry;
use crate::{Error, HttpStatus, RequestError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Dispatcher behaviour switches.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Emit an `info` event with status and latency for every request
    pub log_requests: bool,
    /// Warn when a later route's result replaces an earlier envelope
    pub warn_on_replace: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            log_requests: false,
            warn_on_replace: true,
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    pub fn warn_on_replace(mut self, enabled: bool) -> Self {
        self.warn_on_replace = enabled;
        self
    }
}

/// The dispatcher: an immutable route table plus the synchronizers of its
/// synchronized routes.
pub struct RequestRouter {
    table: RouteTable,
    synchronizers: SynchronizerRegistry,
    config: DispatcherConfig,
}

impl RequestRouter {
    pub fn new(table: RouteTable, config: DispatcherConfig) -> Self {
        Self {
            table,
            synchronizers: SynchronizerRegistry::new(),
            config,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    pub fn synchronizers(&self) -> &SynchronizerRegistry {
        &self.synchronizers
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatch an owned request, parsing its body by content type.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let parser = BytesBodyParser::new(request.body.clone());
        self.handle_request(&request.method, &request.path, Some(&parser), &request.headers)
            .await
    }

    /// Dispatch one request. Never fails: every error becomes an envelope.
    pub async fn handle_request(
        &self,
        method: &str,
        raw_path: &str,
        body_parser: Option<&dyn BodyParser>,
        headers: &HeaderMap,
    ) -> HttpResponse {
        let span = tracing::info_span!("request", method = %method, path = %raw_path);
        let started = Instant::now();

        let response = match self
            .dispatch(method, raw_path, body_parser, headers)
            .instrument(span.clone())
            .await
        {
            Ok(response) => response,
            Err(err) => span.in_scope(|| error_response(err)),
        };

        if self.config.log_requests {
            info!(
                parent: &span,
                status = response.status,
                elapsed_us = started.elapsed().as_micros() as u64,
                "request handled"
            );
        }
        response
    }

    async fn dispatch(
        &self,
        method: &str,
        raw_path: &str,
        body_parser: Option<&dyn BodyParser>,
        headers: &HeaderMap,
    ) -> Result<HttpResponse, Error> {
        let mut ctx = RequestContext::parse(raw_path);

        let Some(matched) = self.table.get_route(&ctx.path) else {
            return Err(Error::UnknownPath(ctx.path));
        };
        let method_filter = HttpMethod::from_str(method);
        let routes: Vec<&Arc<RouteBinding>> = matched
            .bindings
            .iter()
            .filter(|route| method_filter.is_some_and(|m| route.answers(m)))
            .collect();
        if routes.is_empty() {
            return Err(Error::MethodNotAllowed(format!("{} {}", method, ctx.path)));
        }
        ctx.path_variables = matched.path_variables;
        debug!(routes = routes.len(), "matched routes");

        let body = match routes.iter().find(|route| route.body_required) {
            Some(route) => {
                let parser = body_parser.ok_or_else(|| {
                    Error::MissingBodyParser(format!("{} {}", route.controller.name(), route.operation))
                })?;
                Some(parser.parse(headers).await?)
            }
            None => None,
        };

        let mut attributes: HashMap<usize, AttributeCache> = HashMap::new();
        let mut request_info: Option<Arc<RequestInfo>> = None;
        let mut envelope: Option<HttpResponse> = None;

        for route in routes {
            let controller = &route.controller;
            let cache = attributes.entry(controller.index()).or_default();

            for name in route.attribute_names() {
                if cache.contains_key(name) {
                    continue;
                }
                let Some(producer) = controller.producer(name) else {
                    continue;
                };
                let info = request_info
                    .get_or_insert_with(|| Arc::new(RequestInfo::from_context(method, &ctx, headers)))
                    .clone();
                debug!(controller = controller.name(), attribute = name, "producing model attribute");
                let value = producer(info).await?;
                cache.insert(name.to_string(), value);
            }

            let args = resolve_arguments(
                &route.params,
                &RequestSources {
                    query: ctx.query.as_ref(),
                    path_variables: ctx.path_variables.as_ref(),
                    headers,
                    body: body.as_ref(),
                    attributes: Some(&*cache),
                },
            )?;

            let result = if route.synchronized {
                let synchronizer = self.synchronizers.get_or_create(&route.synchronization_key());
                synchronizer.run(route.handler.call(args)).await?
            } else {
                route.handler.call(args).await?
            };

            envelope = self.coerce(result, envelope, route);
        }

        Ok(envelope.unwrap_or_else(HttpResponse::no_content))
    }

    /// Fold one handler result into the accumulated envelope.
    fn coerce(
        &self,
        result: HandlerResult,
        prior: Option<HttpResponse>,
        route: &RouteBinding,
    ) -> Option<HttpResponse> {
        match result {
            HandlerResult::Empty => prior,
            HandlerResult::Status(status) => Some(HttpResponse::new(status)),
            HandlerResult::Error(err) => Some(HttpResponse::new(err.status).with_body(err.body)),
            HandlerResult::Envelope(response) => {
                if prior.is_some() {
                    self.warn_replaced(route);
                }
                Some(response)
            }
            HandlerResult::Json(value @ (Value::Array(_) | Value::Object(_))) => match prior {
                Some(mut response) => match (&mut response.body, value) {
                    (Value::Array(existing), Value::Array(more)) => {
                        existing.extend(more);
                        Some(response)
                    }
                    (Value::Object(existing), Value::Object(more)) => {
                        existing.extend(more);
                        Some(response)
                    }
                    (_, value) => {
                        self.warn_replaced(route);
                        Some(HttpResponse::json(value))
                    }
                },
                None => Some(HttpResponse::json(value)),
            },
            HandlerResult::Json(value) => {
                if prior.is_some() {
                    self.warn_replaced(route);
                }
                Some(HttpResponse::json(value))
            }
        }
    }

    fn warn_replaced(&self, route: &RouteBinding) {
        if self.config.warn_on_replace {
            warn!(
                controller = route.controller.name(),
                operation = %route.operation,
                "replacing response produced by an earlier route"
            );
        }
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("patterns", &self.table.patterns())
            .field("synchronizers", &self.synchronizers.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Map a pipeline failure to its envelope. Internal failures are logged in
/// full and answered with a fixed 500 body.
pub fn error_response(err: Error) -> HttpResponse {
    match err {
        Error::Request(RequestError { status, body }) => {
            let status = match status {
                404 => HttpStatus::NotFound.code(),
                400..=499 => status,
                _ => HttpStatus::InternalServerError.code(),
            };
            debug!(status, "request failed with application error");
            HttpResponse::new(status).with_body(body)
        }
        Error::UnknownPath(path) => {
            debug!(path = %path, "no route for path");
            HttpResponse::method_not_allowed().with_body(HttpStatus::MethodNotAllowed.error_body())
        }
        Error::MethodNotAllowed(detail) => {
            debug!(route = %detail, "no handler for method");
            HttpResponse::not_found().with_body(HttpStatus::NotFound.error_body())
        }
        Error::BodyParse(_) => {
            let err = RequestError::bad_request(err.to_string());
            HttpResponse::new(err.status).with_body(err.body)
        }
        internal => {
            error!(error = %internal, "internal error while dispatching request");
            HttpResponse::internal_server_error()
                .with_body(HttpStatus::InternalServerError.error_body())
        }
    }
}
