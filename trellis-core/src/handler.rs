// Handler contract: what a route invokes and what it may return
//
// Handlers are async closures over the resolved positional arguments. They
// are monomorphized per closure type and type-erased once, at registration,
// behind `BoxedHandler`.

use crate::binding::Arguments;
use crate::{Error, HttpResponse, RequestError};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by erased handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HandlerResult, Error>> + Send>>;

/// Bare status code returned by a handler, sent with an empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

/// Everything a handler may produce.
///
/// The dispatcher folds the results of every route matched for a request
/// into one response envelope; see `RequestRouter::handle_request`.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    /// Empty-body response with this status.
    Status(u16),
    /// A structured error returned (not raised) by the handler.
    Error(RequestError),
    /// A complete envelope, used verbatim.
    Envelope(HttpResponse),
    /// A value for the response body. Arrays and objects combine with a
    /// previous body of the same shape; anything else replaces it.
    Json(Value),
    /// The handler produced nothing.
    Empty,
}

impl From<StatusCode> for HandlerResult {
    fn from(status: StatusCode) -> Self {
        HandlerResult::Status(status.0)
    }
}

impl From<RequestError> for HandlerResult {
    fn from(err: RequestError) -> Self {
        HandlerResult::Error(err)
    }
}

impl From<HttpResponse> for HandlerResult {
    fn from(response: HttpResponse) -> Self {
        HandlerResult::Envelope(response)
    }
}

impl From<Value> for HandlerResult {
    fn from(value: Value) -> Self {
        HandlerResult::Json(value)
    }
}

impl From<&str> for HandlerResult {
    fn from(text: &str) -> Self {
        HandlerResult::Json(Value::String(text.to_string()))
    }
}

impl From<String> for HandlerResult {
    fn from(text: String) -> Self {
        HandlerResult::Json(Value::String(text))
    }
}

impl From<()> for HandlerResult {
    fn from(_: ()) -> Self {
        HandlerResult::Empty
    }
}

/// A request handler.
///
/// Implemented for every `Fn(Arguments) -> impl Future<Output = Result<R, Error>>`
/// where `R` converts into a [`HandlerResult`].
pub trait Handler: Send + Sync + 'static {
    type Output: Into<HandlerResult> + Send;
    type Future: Future<Output = Result<Self::Output, Error>> + Send + 'static;

    fn call(&self, args: Arguments) -> Self::Future;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: Into<HandlerResult> + Send,
{
    type Output = R;
    type Future = Fut;

    #[inline(always)]
    fn call(&self, args: Arguments) -> Self::Future {
        (self)(args)
    }
}

/// Type-erased handler stored in route bindings.
#[derive(Clone)]
pub struct BoxedHandler {
    inner: Arc<dyn ErasedHandler>,
}

impl BoxedHandler {
    pub fn new<H: Handler>(handler: H) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    #[inline]
    pub fn call(&self, args: Arguments) -> HandlerFuture {
        self.inner.call_erased(args)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedHandler")
    }
}

trait ErasedHandler: Send + Sync {
    fn call_erased(&self, args: Arguments) -> HandlerFuture;
}

impl<H: Handler> ErasedHandler for H {
    fn call_erased(&self, args: Arguments) -> HandlerFuture {
        let fut = self.call(args);
        Box::pin(async move { fut.await.map(Into::into) })
    }
}

/// Erase an async closure into a [`BoxedHandler`].
///
/// ```rust
/// use trellis_core::handler::handler;
///
/// let hello = handler(|_args| async move { Ok("Hello world") });
/// ```
pub fn handler<F, Fut, R>(f: F) -> BoxedHandler
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: Into<HandlerResult> + Send + 'static,
{
    BoxedHandler::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Argument;
    use serde_json::json;

    #[tokio::test]
    async fn test_string_result() {
        let h = handler(|_args| async move { Ok("Hello world") });
        let result = h.call(Arguments::default()).await.unwrap();
        assert_eq!(result, HandlerResult::Json(json!("Hello world")));
    }

    #[tokio::test]
    async fn test_handler_reads_arguments() {
        let h = handler(|args: Arguments| async move {
            let name = args.get(0).as_str().unwrap_or("nobody").to_string();
            Ok(json!({ "name": name }))
        });
        let args = Arguments::from(vec![Argument::Text("ada".into())]);
        let result = h.call(args).await.unwrap();
        assert_eq!(result, HandlerResult::Json(json!({ "name": "ada" })));
    }

    #[tokio::test]
    async fn test_unit_is_empty() {
        let h = handler(|_args| async move { Ok(()) });
        assert_eq!(
            h.call(Arguments::default()).await.unwrap(),
            HandlerResult::Empty
        );
    }

    #[tokio::test]
    async fn test_status_and_error_results() {
        let created = handler(|_args| async move { Ok(StatusCode(201)) });
        assert_eq!(
            created.call(Arguments::default()).await.unwrap(),
            HandlerResult::Status(201)
        );

        let refused = handler(|_args| async move { Ok(RequestError::forbidden("no")) });
        assert!(matches!(
            refused.call(Arguments::default()).await.unwrap(),
            HandlerResult::Error(e) if e.status == 403
        ));
    }

    #[tokio::test]
    async fn test_raised_error_passes_through() {
        let h = handler(|_args| async move {
            Err::<(), _>(Error::from(RequestError::not_found("gone")))
        });
        let err = h.call(Arguments::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_handler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoxedHandler>();
    }
}
