use crate::{request::Request, response::Response};

/// Context representing the relationship between a request and a response.
/// It is what a middleware receives, and what it hands back to tell the
/// dispatcher whether the request should reach its handler.
pub struct HttpContext {
    /// The incoming request, with captures, query and parsed body already set
    pub request: Request,
    /// The response being built, already decorated with the default headers
    pub response: Response,
}

impl HttpContext {
    pub fn new(request: Request, response: Response) -> Self {
        HttpContext { request, response }
    }

    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }
}

/// Enum representing whether or not a request should continue to be processed
/// by the rest of the middleware chain and the handler
pub enum RequestContinuation {
    /// Continue
    Continue(HttpContext),
    /// Stop, the response in the context is returned as is
    Stop(HttpContext),
}

impl RequestContinuation {
    pub fn into_context(self) -> HttpContext {
        match self {
            RequestContinuation::Continue(ctx) | RequestContinuation::Stop(ctx) => ctx,
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, RequestContinuation::Continue(_))
    }
}
