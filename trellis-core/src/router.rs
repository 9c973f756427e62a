// Route registration: an explicit builder producing the route table

use crate::binding::{Controller, ParameterBinding, RouteBinding};
use crate::dispatcher::{DispatcherConfig, RequestRouter};
use crate::handler::BoxedHandler;
use crate::http::{HttpMethod, MethodSet};
use crate::logging::{debug, info};
use crate::route_table::RouteTable;
use crate::Error;
use std::collections::HashMap;
use std::sync::Arc;

/// Collects controllers and route bindings, then compiles them into a
/// [`RequestRouter`].
///
/// ```rust
/// use trellis_core::prelude::*;
///
/// let mut router = Router::new();
/// let greeter = router.controller(Controller::new("Greeter"));
/// router
///     .get("/hello/{name}", &greeter, "hello", handler(|args: Arguments| async move {
///         Ok(format!("Hello {}", args.get(0).as_str().unwrap_or("stranger")))
///     }))
///     .param(ParameterBinding::path("name"));
///
/// let dispatcher = router.build(DispatcherConfig::default()).unwrap();
/// assert!(dispatcher.routes().is_parametrized());
/// ```
#[derive(Default)]
pub struct Router {
    controllers: Vec<Arc<Controller>>,
    routes: Vec<RouteBinding>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller and hand back the shared handle routes bind to.
    pub fn controller(&mut self, controller: Controller) -> Arc<Controller> {
        debug!(index = controller.index, name = controller.name(), "registering controller");
        let controller = Arc::new(controller);
        self.controllers.push(Arc::clone(&controller));
        controller
    }

    pub fn add_route(&mut self, route: RouteBinding) -> RouteRegistration<'_> {
        debug!(
            path = %route.path,
            operation = %route.operation,
            methods = ?route.methods,
            "registering route"
        );
        if !self.controllers.iter().any(|c| Arc::ptr_eq(c, &route.controller)) {
            self.controllers.push(Arc::clone(&route.controller));
        }
        self.routes.push(route);
        let last = self.routes.len() - 1;
        RouteRegistration {
            route: &mut self.routes[last],
        }
    }

    /// Register `handler` for `methods` at `path`.
    pub fn route(
        &mut self,
        methods: impl Into<MethodSet>,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> RouteRegistration<'_> {
        self.add_route(RouteBinding::new(methods, path, controller, operation, handler))
    }

    pub fn get(
        &mut self,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> RouteRegistration<'_> {
        self.route(HttpMethod::GET, path, controller, operation, handler)
    }

    pub fn post(
        &mut self,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> RouteRegistration<'_> {
        self.route(HttpMethod::POST, path, controller, operation, handler)
    }

    pub fn put(
        &mut self,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> RouteRegistration<'_> {
        self.route(HttpMethod::PUT, path, controller, operation, handler)
    }

    pub fn delete(
        &mut self,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> RouteRegistration<'_> {
        self.route(HttpMethod::DELETE, path, controller, operation, handler)
    }

    pub fn patch(
        &mut self,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> RouteRegistration<'_> {
        self.route(HttpMethod::PATCH, path, controller, operation, handler)
    }

    /// Register `handler` for every method at `path`.
    pub fn all(
        &mut self,
        path: impl Into<String>,
        controller: &Arc<Controller>,
        operation: impl Into<String>,
        handler: BoxedHandler,
    ) -> RouteRegistration<'_> {
        self.route(MethodSet::any(), path, controller, operation, handler)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Bindings grouped by exact path pattern, groups in order of first
    /// registration.
    fn grouped(self) -> Vec<(String, Vec<Arc<RouteBinding>>)> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(String, Vec<Arc<RouteBinding>>)> = Vec::new();

        for route in self.routes {
            let slot = *index.entry(route.path.clone()).or_insert_with(|| {
                groups.push((route.path.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(Arc::new(route));
        }
        groups
    }

    /// Validate every binding and compile the route table.
    pub fn build(self, config: DispatcherConfig) -> Result<RequestRouter, Error> {
        for route in &self.routes {
            route.validate()?;
        }

        let route_count = self.routes.len();
        let controller_count = self.controllers.len();
        let table = RouteTable::build(self.grouped());

        info!(
            routes = route_count,
            patterns = table.len(),
            controllers = controller_count,
            parametrized = table.is_parametrized(),
            "route table built"
        );

        Ok(RequestRouter::new(table, config))
    }
}

/// Handle on a just-registered route, for declaring its parameters.
pub struct RouteRegistration<'r> {
    route: &'r mut RouteBinding,
}

impl RouteRegistration<'_> {
    pub fn param(self, binding: impl Into<ParameterBinding>) -> Self {
        self.route.push_param(Some(binding.into()));
        self
    }

    pub fn skip_param(self) -> Self {
        self.route.push_param(None);
        self
    }

    pub fn require_body(self) -> Self {
        self.route.body_required = true;
        self
    }

    pub fn synchronized(self) -> Self {
        self.route.synchronized = true;
        self
    }

    pub fn binding(&self) -> &RouteBinding {
        self.route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ValueType;
    use crate::handler::handler;
    use crate::route_table::RouteLookup;

    fn noop() -> BoxedHandler {
        handler(|_args| async move { Ok(()) })
    }

    #[test]
    fn test_controller_indices() {
        let mut router = Router::new();
        let a = router.controller(Controller::new("A"));
        let b = router.controller(Controller::new("B"));
        assert!(b.index() > a.index());
    }

    #[test]
    fn test_registration_builder() {
        let mut router = Router::new();
        let c = router.controller(Controller::new("Items"));
        let reg = router
            .post("/items", &c, "create", noop())
            .skip_param()
            .param(ParameterBinding::body())
            .synchronized();
        assert_eq!(reg.binding().params.len(), 2);
        assert!(reg.binding().body_required);
        assert!(reg.binding().synchronized);
        assert_eq!(
            reg.binding().synchronization_key(),
            format!("{}-method-create", c.index())
        );
    }

    #[test]
    fn test_groups_keep_first_registration_order() {
        let mut router = Router::new();
        let c = router.controller(Controller::new("C"));
        router.get("/b", &c, "get_b", noop());
        router.get("/a", &c, "get_a", noop());
        router.post("/b", &c, "post_b", noop());

        let groups = router.grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "/b");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].operation, "post_b");
        assert_eq!(groups[1].0, "/a");
    }

    #[test]
    fn test_build_rejects_unnamed_scalar_query() {
        let mut router = Router::new();
        let c = router.controller(Controller::new("Search"));
        router.get("/search", &c, "search", noop()).param(ParameterBinding::QueryParam {
            name: None,
            value_type: ValueType::Integer,
        });
        let err = router.build(DispatcherConfig::default()).err().unwrap();
        assert!(matches!(err, Error::InvalidBinding(_)));
    }

    #[test]
    fn test_build_static_and_param_tables() {
        let mut router = Router::new();
        let c = router.controller(Controller::new("C"));
        router.get("/hello", &c, "hello", noop());
        let dispatcher = router.build(DispatcherConfig::default()).unwrap();
        assert!(!dispatcher.routes().is_parametrized());
        assert!(dispatcher.routes().has_route("/HELLO"));

        let mut router = Router::new();
        let c = router.controller(Controller::new("C"));
        router.get("/hello", &c, "hello", noop());
        router.all("/users/{id}", &c, "user", noop());
        let dispatcher = router.build(DispatcherConfig::default()).unwrap();
        assert!(dispatcher.routes().is_parametrized());
        assert_eq!(dispatcher.routes().patterns(), vec!["/hello", "/users/{id}"]);
    }
}
