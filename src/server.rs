//! Server is the centerpiece of opale, it owns the routing stack and
//! dispatches every request through it.
//!
//! The stack is built once by the [`Builder`] and shared between connections
//! behind an `Arc`; it is never mutated while serving.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{
    future::BoxFuture,
    task::{Context, Poll},
    FutureExt,
};
use http::{
    header::{HeaderName, CONTENT_TYPE},
    HeaderMap, HeaderValue, Request as RawRequest, Response as RawResponse, StatusCode,
};
use hyper::{body::Body as RawBody, server::conn::Http, service::Service};
use tokio::net::TcpListener;

use crate::{
    body::{self, BodyParse},
    cors::{Cors, CorsBuilder},
    error::OpaleError,
    http_context::{HttpContext, RequestContinuation},
    middleware,
    request::Request,
    response::Response,
    router::{Builder as RouterBuilder, Router},
    utils::parse_query_string,
};

/// Default time for a connection to be served is 30 seconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default time for the request body to be received
pub const DEFAULT_BODY_TIMEOUT_MS: u64 = 10_000;
/// Default time for a single middleware to resolve
pub const DEFAULT_MIDDLEWARE_TIMEOUT_MS: u64 = 10_000;
/// Default listener ip addr is AnyAddr (0.0.0.0)
pub const DEFAULT_LISTENER_IFACE: &str = "0.0.0.0:0";
pub const DEFAULT_SERVER_NAME: &str = "Opale";

#[derive(Default)]
pub struct ListenerBuilder {
    iface: Option<String>,
    server_name: Option<String>,
    request_timeout_ms: Option<u64>,
    body_timeout_ms: Option<u64>,
    middleware_timeout_ms: Option<u64>,
    body_limit: Option<usize>,
}

impl ListenerBuilder {
    #[inline]
    pub fn new() -> Self {
        ListenerBuilder {
            request_timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
            body_timeout_ms: Some(DEFAULT_BODY_TIMEOUT_MS),
            middleware_timeout_ms: Some(DEFAULT_MIDDLEWARE_TIMEOUT_MS),
            ..Default::default()
        }
    }

    #[inline]
    pub fn interface(mut self, s: &str) -> Self {
        self.iface = Some(s.to_string());
        self
    }

    /// Bound on the whole connection, `None` to disable
    #[inline]
    pub fn request_timeout<T: Into<Option<u64>>>(mut self, timeout_ms: T) -> Self {
        self.request_timeout_ms = timeout_ms.into();
        self
    }

    /// Bound on reading the request body, `None` to disable
    #[inline]
    pub fn body_timeout<T: Into<Option<u64>>>(mut self, timeout_ms: T) -> Self {
        self.body_timeout_ms = timeout_ms.into();
        self
    }

    /// Bound on every single middleware call, `None` to disable
    #[inline]
    pub fn middleware_timeout<T: Into<Option<u64>>>(mut self, timeout_ms: T) -> Self {
        self.middleware_timeout_ms = timeout_ms.into();
        self
    }

    /// Maximum size of a request body, in bytes
    #[inline]
    pub fn body_limit<T: Into<Option<usize>>>(mut self, bytes: T) -> Self {
        self.body_limit = bytes.into();
        self
    }

    #[inline]
    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = Some(name.to_string());
        self
    }

    #[doc(hidden)]
    pub(crate) fn build(self) -> Result<ListenerConfig, OpaleError> {
        let ListenerBuilder {
            iface,
            server_name,
            request_timeout_ms,
            body_timeout_ms,
            middleware_timeout_ms,
            body_limit,
        } = self;

        let server_name = server_name.unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());

        Ok(ListenerConfig {
            iface: iface.unwrap_or_else(|| DEFAULT_LISTENER_IFACE.to_string()),
            request_timeout: request_timeout_ms.map(Duration::from_millis),
            server_value: HeaderValue::from_str(&server_name)?,
            server_name,
            limits: Limits {
                body_timeout: body_timeout_ms.map(Duration::from_millis),
                middleware_timeout: middleware_timeout_ms.map(Duration::from_millis),
                body_limit,
            },
        })
    }
}

pub struct ListenerConfig {
    iface: String,
    request_timeout: Option<Duration>,
    server_name: String,
    server_value: HeaderValue,
    limits: Limits,
}

#[derive(Debug, Clone, Copy, Default)]
struct Limits {
    body_timeout: Option<Duration>,
    middleware_timeout: Option<Duration>,
    body_limit: Option<usize>,
}

pub struct Builder {
    listener: Option<ListenerBuilder>,
    router: RouterBuilder,
    cors: Option<CorsBuilder>,
    headers: Vec<(String, String)>,
    body_parse: BodyParse,
}

impl Builder {
    #[inline]
    pub fn configure_listener<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ListenerBuilder) -> ListenerBuilder,
    {
        let l = if let Some(builder) = self.listener.take() {
            builder
        } else {
            ListenerBuilder::new()
        };

        self.listener = Some(f(l));

        self
    }

    #[inline]
    pub fn configure_router<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RouterBuilder) -> RouterBuilder,
    {
        self.router = f(self.router);
        self
    }

    /// Enable CORS and configure its policy
    #[inline]
    pub fn configure_cors<F>(mut self, f: F) -> Self
    where
        F: FnOnce(CorsBuilder) -> CorsBuilder,
    {
        self.cors = Some(f(self.cors.take().unwrap_or_default()));
        self
    }

    /// Enable CORS. `methods` is a comma separated allow-list which defaults
    /// to `GET, POST, PUT, PATCH, OPTIONS, DELETE`.
    pub fn use_cors(self, origin: Option<&str>, methods: Option<&str>, max_age: Option<u64>) -> Self {
        self.configure_cors(|c| {
            let c = match origin {
                Some(o) => c.origin(o),
                None => c,
            };
            let c = match methods {
                Some(m) => c.methods(m),
                None => c,
            };
            match max_age {
                Some(a) => c.max_age(a),
                None => c,
            }
        })
    }

    /// Add a header to every response
    #[inline]
    pub fn add_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// How request bodies are parsed before reaching middlewares and handlers
    #[inline]
    pub fn body_parse(mut self, mode: BodyParse) -> Self {
        self.body_parse = mode;
        self
    }

    /// Validate the whole configuration and produce the server
    pub fn build(self) -> Result<Server, OpaleError> {
        let Builder {
            listener,
            router,
            cors,
            headers,
            body_parse,
        } = self;

        let listener_config = listener.unwrap_or_else(ListenerBuilder::new).build()?;
        let router = router.build()?;
        let cors = match cors {
            Some(c) => c.build()?,
            None => Cors::disabled(),
        };

        let mut default_headers = HeaderMap::new();
        for (key, value) in headers {
            default_headers.insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(&value)?);
        }
        for (key, value) in cors.headers() {
            default_headers.insert(key.clone(), value.clone());
        }

        let limits = listener_config.limits;

        Ok(Server {
            listener_config,
            stack: Arc::new(Stack {
                router,
                cors,
                default_headers,
                body_parse,
                limits,
            }),
        })
    }
}

pub struct Server {
    listener_config: ListenerConfig,
    stack: Arc<Stack>,
}

impl Server {
    /// Produce a server builder
    #[inline]
    pub fn builder() -> Builder {
        Builder {
            listener: None,
            router: RouterBuilder::default(),
            cors: None,
            headers: Vec::new(),
            body_parse: BodyParse::default(),
        }
    }

    /// Return a future with will run the server on the configured interface.
    /// Simply run this future inside the tokio executor or await it in a
    /// async context
    pub async fn run(self) -> Result<(), OpaleError> {
        self.serve(|_| {}).await
    }

    /// Run the server on `port` of every interface, calling `callback` once the
    /// listener is bound
    pub async fn listen<F>(mut self, port: u16, callback: F) -> Result<(), OpaleError>
    where
        F: FnOnce(SocketAddr),
    {
        self.listener_config.iface = format!("0.0.0.0:{}", port);
        self.serve(callback).await
    }

    async fn serve<F>(self, callback: F) -> Result<(), OpaleError>
    where
        F: FnOnce(SocketAddr),
    {
        let Server { listener_config, stack } = self;

        let listener = TcpListener::bind(listener_config.iface.as_str()).await?;
        let local_addr = listener.local_addr()?;

        info!("{} started and listening on : http://{}", &listener_config.server_name, local_addr);
        callback(local_addr);

        let http = Http::new();

        loop {
            match listener.accept().await {
                Ok((client_socket, peer_addr)) => {
                    let handler = StackHandler {
                        stack: stack.clone(),
                        server_value: listener_config.server_value.clone(),
                        peer_addr: Some(peer_addr),
                    };
                    let http_handler = http.serve_connection(client_socket, handler);

                    if let Some(request_timeout) = listener_config.request_timeout {
                        tokio::spawn(async move {
                            match tokio::time::timeout(request_timeout, http_handler).await {
                                Ok(Err(e)) => debug!("connection with {} ended with an error: {}", peer_addr, e),
                                Err(_) => debug!("connection with {} timed out", peer_addr),
                                Ok(Ok(())) => {}
                            }
                        });
                    } else {
                        tokio::spawn(async move {
                            if let Err(e) = http_handler.await {
                                debug!("connection with {} ended with an error: {}", peer_addr, e);
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!("incoming connection encountered an error: {}", e);
                }
            }
        }
    }

    /// Inject a http request into the server without going through a socket
    pub async fn inject(&self, req: RawRequest<RawBody>) -> RawResponse<RawBody> {
        self.stack.invoke(Request::new(req, None)).await.into_raw()
    }
}

#[doc(hidden)]
pub struct Stack {
    router: Router,
    cors: Cors,
    default_headers: HeaderMap,
    body_parse: BodyParse,
    limits: Limits,
}

impl Stack {
    async fn invoke(&self, req: Request) -> Response {
        let req_iat = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let res = match self.dispatch(req).await {
            Ok(res) => res,
            Err(e) => e.respond(Response::with_headers(&self.default_headers)),
        };

        debug!("{} {} {} - {:.3}ms", method, path, res.status(), req_iat.elapsed().as_secs_f64() * 1000.0);

        res
    }

    async fn dispatch(&self, mut req: Request) -> Result<Response, OpaleError> {
        let mut res = Response::with_headers(&self.default_headers);

        if !self.cors.allows(req.method()) {
            res.set_status(StatusCode::METHOD_NOT_ALLOWED);
            res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
            res.send(format!("{} is not allowed for the request.", req.method()))?;
            return Ok(res);
        }

        let (endpoint, captures) = match self.router.resolve(req.method(), req.uri().path()) {
            Some(resolved) => resolved,
            None => {
                res.set_status(StatusCode::NOT_FOUND);
                res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
                res.send("Not found")?;
                return Ok(res);
            }
        };

        let query = req.uri().query().map(parse_query_string).unwrap_or_default();
        req.set_routing(captures, query);

        let read = body::read_body(req.body_mut().take(), self.limits.body_limit);
        let (bytes, text) = match self.limits.body_timeout {
            Some(t) => tokio::time::timeout(t, read).await.map_err(|_| OpaleError::BodyReadTimeout)??,
            None => read.await?,
        };
        let parsed = self.body_parse.parse(text)?;
        req.set_body(body::Body::Memory(bytes), parsed);

        match middleware::run(endpoint.middlewares(), HttpContext::new(req, res), self.limits.middleware_timeout).await? {
            RequestContinuation::Continue(ctx) => {
                let (req, res) = ctx.into_parts();
                endpoint.handler().handle(req, res).await
            }
            RequestContinuation::Stop(ctx) => Ok(ctx.response),
        }
    }
}

#[doc(hidden)]
#[derive(Clone)]
pub struct StackHandler {
    stack: Arc<Stack>,
    server_value: HeaderValue,
    peer_addr: Option<SocketAddr>,
}

impl Service<hyper::Request<RawBody>> for StackHandler {
    type Error = OpaleError;
    type Future = BoxFuture<'static, Result<hyper::Response<RawBody>, Self::Error>>;
    type Response = hyper::Response<RawBody>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: hyper::Request<RawBody>) -> Self::Future {
        let req = Request::new(req, self.peer_addr);
        let stack = self.stack.clone();
        let server_value = self.server_value.clone();

        async move {
            let mut res = stack.invoke(req).await.into_raw();
            res.headers_mut().insert(http::header::SERVER, server_value);
            Ok(res)
        }
        .boxed()
    }
}
