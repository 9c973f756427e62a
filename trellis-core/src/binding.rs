//! Route bindings: what a handler answers to and how its arguments are
//! sourced.
//!
//! A [`RouteBinding`] is one handler registration. Its parameter list is an
//! ordered sequence of [`ParameterBinding`]s, one per handler argument
//! position; a `None` slot is an ignored position that always resolves to
//! [`Argument::Undefined`].

use crate::context::RequestInfo;
use crate::handler::BoxedHandler;
use crate::headers::HeaderMap;
use crate::http::{HttpMethod, MethodSet};
use crate::{Error, RequestError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// ========== Value types ==========

/// How a raw string (query value, header value) is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    String,
    /// Base-10 integer; non-numeric input yields NaN
    Integer,
    /// Floating point; non-numeric input yields NaN
    Number,
    /// Parsed as a JSON document
    Json,
    /// The whole query map as an object (unnamed query bindings only)
    RawObject,
}

impl ValueType {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, ValueType::RawObject)
    }
}

// ========== Resolved arguments ==========

/// One resolved handler argument.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Argument {
    #[default]
    Undefined,
    Text(String),
    Integer(i64),
    /// May be NaN when an integer or number coercion failed
    Number(f64),
    Json(Value),
    Headers(HeaderMap),
}

impl Argument {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Argument::Undefined)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Argument::Number(n) if n.is_nan())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::Text(s) => Some(s),
            Argument::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Argument::Integer(n) => Some(*n),
            Argument::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Argument::Integer(n) => Some(*n as f64),
            Argument::Number(n) if !n.is_nan() => Some(*n),
            Argument::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Argument::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_headers(&self) -> Option<&HeaderMap> {
        match self {
            Argument::Headers(h) => Some(h),
            _ => None,
        }
    }

    /// JSON view of the argument. `Undefined` and NaN become `Null`; a header
    /// collection becomes an object of first values.
    pub fn to_value(&self) -> Value {
        match self {
            Argument::Undefined => Value::Null,
            Argument::Text(s) => Value::String(s.clone()),
            Argument::Integer(n) => Value::Number((*n).into()),
            Argument::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            Argument::Json(v) => v.clone(),
            Argument::Headers(h) => {
                let mut map = Map::new();
                for (name, value) in h.iter() {
                    map.entry(name.to_ascii_lowercase())
                        .or_insert_with(|| Value::String(value.to_string()));
                }
                Value::Object(map)
            }
        }
    }

    /// Deserialize the argument into `T`; a mismatch is the caller's fault.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.to_value())
            .map_err(|e| RequestError::bad_request(format!("Invalid argument: {}", e)).into())
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Argument::Text(s.to_string())
    }
}

impl From<String> for Argument {
    fn from(s: String) -> Self {
        Argument::Text(s)
    }
}

impl From<i64> for Argument {
    fn from(n: i64) -> Self {
        Argument::Integer(n)
    }
}

impl From<f64> for Argument {
    fn from(n: f64) -> Self {
        Argument::Number(n)
    }
}

impl From<Value> for Argument {
    fn from(v: Value) -> Self {
        Argument::Json(v)
    }
}

impl From<HeaderMap> for Argument {
    fn from(h: HeaderMap) -> Self {
        Argument::Headers(h)
    }
}

/// Positional arguments handed to a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Vec<Argument>);

static UNDEFINED: Argument = Argument::Undefined;

impl Arguments {
    /// Argument at `index`; out-of-range positions read as `Undefined`.
    pub fn get(&self, index: usize) -> &Argument {
        self.0.get(index).unwrap_or(&UNDEFINED)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Argument> {
        self.0
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(args: Vec<Argument>) -> Self {
        Self(args)
    }
}

// ========== Parameter bindings ==========

/// `RequestHeader` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBinding {
    pub name: String,
    pub required: bool,
    pub decode: bool,
    pub default: Argument,
    pub value_type: ValueType,
}

impl HeaderBinding {
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn decoded(mut self) -> Self {
        self.decode = true;
        self
    }

    /// Value used when the header is absent; implies optional.
    pub fn default_value(mut self, value: impl Into<Argument>) -> Self {
        self.required = false;
        self.default = value.into();
        self
    }

    pub fn typed(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }
}

impl From<HeaderBinding> for ParameterBinding {
    fn from(b: HeaderBinding) -> Self {
        ParameterBinding::RequestHeader(b)
    }
}

/// `PathVariable` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PathBinding {
    pub name: String,
    pub required: bool,
    pub decode: bool,
    pub default: Argument,
}

impl PathBinding {
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn decoded(mut self) -> Self {
        self.decode = true;
        self
    }

    /// Value used when the variable is absent or empty; implies optional.
    pub fn default_value(mut self, value: impl Into<Argument>) -> Self {
        self.required = false;
        self.default = value.into();
        self
    }
}

impl From<PathBinding> for ParameterBinding {
    fn from(b: PathBinding) -> Self {
        ParameterBinding::PathVariable(b)
    }
}

/// Where a handler argument comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBinding {
    /// The parsed request body, verbatim
    RequestBody,
    /// A query parameter, or the whole query map when `name` is `None`
    QueryParam {
        name: Option<String>,
        value_type: ValueType,
    },
    RequestHeader(HeaderBinding),
    /// All request headers layered over `defaults`
    RequestHeaderMap { defaults: HeaderMap },
    PathVariable(PathBinding),
    /// A per-request value computed by the controller's attribute producer
    ModelAttribute { attribute_name: String },
}

impl ParameterBinding {
    pub fn body() -> Self {
        ParameterBinding::RequestBody
    }

    pub fn query(name: impl Into<String>, value_type: ValueType) -> Self {
        ParameterBinding::QueryParam {
            name: Some(name.into()),
            value_type,
        }
    }

    /// The entire query map as a raw object
    pub fn query_object() -> Self {
        ParameterBinding::QueryParam {
            name: None,
            value_type: ValueType::RawObject,
        }
    }

    /// A required, undecoded string header
    pub fn header(name: impl Into<String>) -> HeaderBinding {
        HeaderBinding {
            name: name.into(),
            required: true,
            decode: false,
            default: Argument::Undefined,
            value_type: ValueType::String,
        }
    }

    pub fn header_map() -> Self {
        ParameterBinding::RequestHeaderMap {
            defaults: HeaderMap::new(),
        }
    }

    pub fn header_map_with(defaults: HeaderMap) -> Self {
        ParameterBinding::RequestHeaderMap { defaults }
    }

    /// A required, undecoded path variable
    pub fn path(name: impl Into<String>) -> PathBinding {
        PathBinding {
            name: name.into(),
            required: true,
            decode: false,
            default: Argument::Undefined,
        }
    }

    pub fn model_attribute(attribute_name: impl Into<String>) -> Self {
        ParameterBinding::ModelAttribute {
            attribute_name: attribute_name.into(),
        }
    }

    /// Checks that can be made before any request arrives.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            ParameterBinding::QueryParam {
                name: None,
                value_type,
            } if value_type.is_scalar() => Err(Error::InvalidBinding(format!(
                "unnamed query parameter must use the raw-object type, got {:?}",
                value_type
            ))),
            _ => Ok(()),
        }
    }
}

// ========== Controllers ==========

/// Boxed future returned by attribute producers.
pub type AttributeFuture = Pin<Box<dyn Future<Output = Result<Value, Error>> + Send>>;

/// Computes a model attribute from a snapshot of the request.
pub type AttributeProducer = Arc<dyn Fn(Arc<RequestInfo>) -> AttributeFuture + Send + Sync>;

static NEXT_CONTROLLER_INDEX: AtomicUsize = AtomicUsize::new(0);

/// A controller: the owner of a group of routes and of the model-attribute
/// producers those routes may reference.
///
/// Every controller gets a process-unique index when it is constructed.
/// The index is the controller's identity for the per-request attribute
/// cache and for synchronization keys.
pub struct Controller {
    pub(crate) index: usize,
    name: String,
    attributes: HashMap<String, AttributeProducer>,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            index: NEXT_CONTROLLER_INDEX.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    /// Register a model-attribute producer under `name`.
    pub fn attribute<F, Fut>(mut self, name: impl Into<String>, producer: F) -> Self
    where
        F: Fn(Arc<RequestInfo>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let producer: AttributeProducer =
            Arc::new(move |info: Arc<RequestInfo>| -> AttributeFuture { Box::pin(producer(info)) });
        self.attributes.insert(name.into(), producer);
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn producer(&self, attribute_name: &str) -> Option<&AttributeProducer> {
        self.attributes.get(attribute_name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.attribute_names().collect();
        names.sort_unstable();
        f.debug_struct("Controller")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("attributes", &names)
            .finish()
    }
}

// ========== Route bindings ==========

/// One handler registration. Immutable once the route table is built.
#[derive(Debug, Clone)]
pub struct RouteBinding {
    pub methods: MethodSet,
    pub path: String,
    pub controller: Arc<Controller>,
    pub operation: String,
    pub handler: BoxedHandler,
    pub params: Vec<Option<ParameterBinding>>,
    pub body_required: bool,
    pub synchronized: bool,
}

impl RouteBinding {
    pub fn new(
        methods: impl Into<MethodSet>,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> Self {
        Self {
            methods: methods.into(),
            path: path.into(),
            controller: Arc::clone(controller),
            operation: operation.into(),
            handler,
            params: Vec::new(),
            body_required: false,
            synchronized: false,
        }
    }

    /// Append the binding for the next argument position
    pub fn param(mut self, binding: impl Into<ParameterBinding>) -> Self {
        self.push_param(Some(binding.into()));
        self
    }

    /// Leave the next argument position unbound
    pub fn skip_param(mut self) -> Self {
        self.push_param(None);
        self
    }

    pub(crate) fn push_param(&mut self, binding: Option<ParameterBinding>) {
        if matches!(binding, Some(ParameterBinding::RequestBody)) {
            self.body_required = true;
        }
        self.params.push(binding);
    }

    pub fn require_body(mut self) -> Self {
        self.body_required = true;
        self
    }

    /// Serialize concurrent invocations of this route in arrival order
    pub fn synchronized(mut self) -> Self {
        self.synchronized = true;
        self
    }

    pub fn answers(&self, method: HttpMethod) -> bool {
        self.methods.contains(method)
    }

    /// Key of the FIFO mutex guarding this route
    pub fn synchronization_key(&self) -> String {
        format!("{}-method-{}", self.controller.index, self.operation)
    }

    /// Attribute names referenced by this route's parameters
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().flatten().filter_map(|b| match b {
            ParameterBinding::ModelAttribute { attribute_name } => Some(attribute_name.as_str()),
            _ => None,
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        for binding in self.params.iter().flatten() {
            binding.validate().map_err(|e| match e {
                Error::InvalidBinding(detail) => Error::InvalidBinding(format!(
                    "{} {}: {}",
                    self.controller.name(),
                    self.operation,
                    detail
                )),
                other => other,
            })?;
        }
        Ok(())
    }
}
