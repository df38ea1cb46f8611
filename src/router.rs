use std::{collections::HashMap, sync::Arc};

use http::Method;

use crate::{
    error::OpaleError,
    handler::Handler,
    middleware::{self, Middleware},
    utils::RoutePattern,
};

/// What the router resolves a request to: the handler of one method of one
/// route, with the middlewares that precede it.
pub struct Endpoint {
    handler: Arc<dyn Handler>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Endpoint {
    #[inline]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Default middlewares known at registration, then the route middleware
    #[inline]
    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }
}

struct Route {
    path: String,
    pattern: RoutePattern,
    endpoints: HashMap<Method, Endpoint>,
}

/// Builder for the router. Routes are matched in the order they were first
/// registered.
#[derive(Default)]
pub struct Builder {
    routes: Vec<Route>,
    default_middlewares: Vec<Arc<dyn Middleware>>,
    errors: Vec<OpaleError>,
}

impl Builder {
    /// Add a route handling `method` on `path`.
    ///
    /// Registering the same path and method again replaces the previous
    /// handler and its middlewares. The endpoint captures the default
    /// middlewares added so far; those added later will not apply to it.
    ///
    /// ```rust
    /// # use opale::prelude::*;
    /// # use opale::router::Builder;
    /// async fn show_user(req: Request, mut res: Response) -> Result<Response, OpaleError> {
    ///     res.send(format!("user {}", req.param("id").unwrap_or_default()))?;
    ///     Ok(res)
    /// }
    ///
    /// let router = Builder::default().route(Method::GET, "/users/:id", None, show_user);
    /// ```
    pub fn route<H>(mut self, method: Method, path: &str, middleware: Option<Arc<dyn Middleware>>, handler: H) -> Self
    where
        H: 'static + Handler,
    {
        let method = normalize_method(&method);

        let idx = match self.routes.iter().position(|r| r.path == path) {
            Some(idx) => idx,
            None => match RoutePattern::new(path) {
                Ok(pattern) => {
                    self.routes.push(Route {
                        path: path.to_string(),
                        pattern,
                        endpoints: HashMap::new(),
                    });
                    self.routes.len() - 1
                }
                Err(e) => {
                    self.errors.push(OpaleError::InvalidRoute(path.to_string(), e));
                    return self;
                }
            },
        };

        let mut middlewares = self.default_middlewares.clone();
        middlewares.extend(middleware);

        self.routes[idx].endpoints.insert(
            method,
            Endpoint {
                handler: Arc::new(handler),
                middlewares,
            },
        );

        self
    }

    #[inline]
    pub fn get<H: 'static + Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::GET, path, None, handler)
    }

    #[inline]
    pub fn get_with<M: 'static + Middleware, H: 'static + Handler>(self, path: &str, middleware: M, handler: H) -> Self {
        self.route(Method::GET, path, Some(Arc::new(middleware)), handler)
    }

    #[inline]
    pub fn post<H: 'static + Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::POST, path, None, handler)
    }

    #[inline]
    pub fn post_with<M: 'static + Middleware, H: 'static + Handler>(self, path: &str, middleware: M, handler: H) -> Self {
        self.route(Method::POST, path, Some(Arc::new(middleware)), handler)
    }

    #[inline]
    pub fn put<H: 'static + Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::PUT, path, None, handler)
    }

    #[inline]
    pub fn put_with<M: 'static + Middleware, H: 'static + Handler>(self, path: &str, middleware: M, handler: H) -> Self {
        self.route(Method::PUT, path, Some(Arc::new(middleware)), handler)
    }

    #[inline]
    pub fn delete<H: 'static + Handler>(self, path: &str, handler: H) -> Self {
        self.route(Method::DELETE, path, None, handler)
    }

    #[inline]
    pub fn delete_with<M: 'static + Middleware, H: 'static + Handler>(self, path: &str, middleware: M, handler: H) -> Self {
        self.route(Method::DELETE, path, Some(Arc::new(middleware)), handler)
    }

    /// Append a middleware to the default chain of every route registered
    /// from now on
    pub fn default_middleware<M: 'static + Middleware>(mut self, middleware: M) -> Self {
        self.default_middlewares.push(Arc::new(middleware));
        self
    }

    /// Append the access log middleware to the default chain
    pub fn use_logger(self) -> Self {
        self.default_middleware(middleware::logger)
    }

    pub(crate) fn build(self) -> Result<Router, OpaleError> {
        let Builder { routes, errors, .. } = self;
        if let Some(e) = errors.into_iter().next() {
            return Err(e);
        }

        Ok(Router { routes: Arc::new(routes) })
    }
}

/// A Struct responsible of resolving a request path and method to an endpoint
#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<Route>>,
}

impl Router {
    /// First route, in registration order, whose pattern matches `path` and
    /// which handles `method`, with the captured path variables
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&Endpoint, HashMap<String, String>)> {
        let method = normalize_method(method);
        self.routes.iter().find_map(|route| {
            let endpoint = route.endpoints.get(&method)?;
            route.pattern.captures(path).map(|captures| (endpoint, captures))
        })
    }

    /// Registered paths, in match order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.path.as_str())
    }
}

/// Method names are matched case-insensitively
pub(crate) fn normalize_method(method: &Method) -> Method {
    let upper = method.as_str().to_ascii_uppercase();
    if upper == method.as_str() {
        method.clone()
    } else {
        Method::from_bytes(upper.as_bytes()).unwrap_or_else(|_| method.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http_context::{HttpContext, RequestContinuation},
        request::Request,
        response::Response,
    };

    async fn ok(_req: Request, res: Response) -> Result<Response, OpaleError> {
        Ok(res)
    }

    async fn pass(ctx: HttpContext) -> Result<RequestContinuation, OpaleError> {
        Ok(RequestContinuation::Continue(ctx))
    }

    #[test]
    fn first_match_wins() {
        let router = Builder::default().get("/users/:id", ok).get("/users/me", ok).build().unwrap();
        let (_, captures) = router.resolve(&Method::GET, "/users/me").unwrap();
        assert_eq!(captures["id"], "me");
    }

    #[test]
    fn route_without_method_is_skipped() {
        let router = Builder::default().post("/items/:id", ok).get("/items/:name", ok).build().unwrap();
        let (_, captures) = router.resolve(&Method::GET, "/items/7").unwrap();
        assert_eq!(captures["name"], "7");
        assert!(router.resolve(&Method::PUT, "/items/7").is_none());
    }

    #[test]
    fn method_is_case_insensitive() {
        let router = Builder::default().delete("/items/:id", ok).build().unwrap();
        let lower = Method::from_bytes(b"delete").unwrap();
        assert!(router.resolve(&lower, "/items/1").is_some());
    }

    #[test]
    fn re_registration_replaces_endpoint() {
        let router = Builder::default()
            .get_with("/a", pass, ok)
            .get("/b", ok)
            .get("/a", ok)
            .build()
            .unwrap();

        assert_eq!(router.paths().collect::<Vec<_>>(), vec!["/a", "/b"]);
        let (endpoint, _) = router.resolve(&Method::GET, "/a").unwrap();
        assert!(endpoint.middlewares().is_empty());
    }

    #[test]
    fn default_middleware_is_not_retroactive() {
        let router = Builder::default()
            .get("/before", ok)
            .default_middleware(pass)
            .get_with("/after", pass, ok)
            .build()
            .unwrap();

        assert_eq!(router.resolve(&Method::GET, "/before").unwrap().0.middlewares().len(), 0);
        assert_eq!(router.resolve(&Method::GET, "/after").unwrap().0.middlewares().len(), 2);
    }

    #[test]
    fn invalid_route_fails_build() {
        let result = Builder::default().get("/ok", ok).get("/bad/:", ok).build();
        assert!(matches!(result, Err(OpaleError::InvalidRoute(path, _)) if path == "/bad/:"));
    }
}
