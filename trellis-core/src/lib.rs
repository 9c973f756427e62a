// Core library for the Trellis request dispatch engine
// Route table, argument resolution, FIFO synchronization and dispatch

pub mod binding;
pub mod body;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod headers;
pub mod http;
pub mod logging;
pub mod resolver;
pub mod route_table;
pub mod router;
pub mod status;
pub mod synchronizer;

// Re-export commonly used types
pub use binding::{
    Argument, Arguments, Controller, HeaderBinding, ParameterBinding, PathBinding, RouteBinding,
    ValueType,
};
pub use body::{BodyParser, BytesBodyParser, FnBodyParser};
pub use context::{RequestContext, RequestInfo};
pub use dispatcher::{DispatcherConfig, RequestRouter};
pub use error::*;
pub use handler::{BoxedHandler, HandlerResult, StatusCode, handler};
pub use headers::HeaderMap;
pub use http::*;
pub use route_table::{RouteLookup, RouteMatch, RouteTable};
pub use router::{RouteRegistration, Router};
pub use status::*;
pub use synchronizer::{AsyncSynchronizer, SynchronizerRegistry};

/// Everything needed to declare controllers and routes.
pub mod prelude {
    pub use crate::binding::{
        Argument, Arguments, Controller, ParameterBinding, RouteBinding, ValueType,
    };
    pub use crate::body::{BodyParser, BytesBodyParser, FnBodyParser};
    pub use crate::context::RequestInfo;
    pub use crate::dispatcher::{DispatcherConfig, RequestRouter};
    pub use crate::error::{Error, RequestError};
    pub use crate::handler::{HandlerResult, StatusCode, handler};
    pub use crate::headers::HeaderMap;
    pub use crate::http::{HttpMethod, HttpRequest, HttpResponse, MethodSet};
    pub use crate::route_table::RouteLookup;
    pub use crate::router::Router;
    pub use crate::status::HttpStatus;
}
