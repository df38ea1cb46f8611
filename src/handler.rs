use futures::{future::BoxFuture, Future, FutureExt};

use crate::{error::OpaleError, request::Request, response::Response};

/// Define a Handler of a potential http request
///
/// Implemented by default on any `async fn(Request, Response) ->
/// Result<Response, OpaleError>`. The handler receives the response already
/// decorated by the dispatcher and the middlewares, and returns it once
/// written.
pub trait Handler: Send + Sync {
    /// Handle the http request, returning a future of the final response
    fn handle(&self, req: Request, res: Response) -> BoxFuture<'static, Result<Response, OpaleError>>;
}

impl<Fun, Fut> Handler for Fun
where
    Fun: Fn(Request, Response) -> Fut + Send + Sync,
    Fut: 'static + Future<Output = Result<Response, OpaleError>> + Send,
{
    #[inline]
    fn handle(&self, req: Request, res: Response) -> BoxFuture<'static, Result<Response, OpaleError>> {
        (*self)(req, res).boxed()
    }
}
