//! A middleware is called after the request was routed and its body parsed,
//! but before the handler. It can modify the request, write the response, or
//! stop request processing by returning `RequestContinuation::Stop`.

use std::{sync::Arc, time::Duration};

use futures::{future::BoxFuture, Future, FutureExt};

use crate::{
    error::OpaleError,
    http_context::{HttpContext, RequestContinuation},
};

/// Auto trait implementation over every function that match the definition of
/// a middleware.
pub trait Middleware: Send + Sync {
    fn resolve(&self, ctx: HttpContext) -> BoxFuture<'static, Result<RequestContinuation, OpaleError>>;
}

impl<Fun, Fut> Middleware for Fun
where
    Fun: Fn(HttpContext) -> Fut + Send + Sync,
    Fut: 'static + Future<Output = Result<RequestContinuation, OpaleError>> + Send,
{
    #[inline]
    fn resolve(&self, ctx: HttpContext) -> BoxFuture<'static, Result<RequestContinuation, OpaleError>> {
        (*self)(ctx).boxed()
    }
}

/// Run `middlewares` one after the other.
///
/// The chain ends early when a middleware returns `Stop` or sends the
/// response. Each call is bounded by `timeout` when one is given.
pub async fn run(middlewares: &[Arc<dyn Middleware>], mut ctx: HttpContext, timeout: Option<Duration>) -> Result<RequestContinuation, OpaleError> {
    for middleware in middlewares {
        let fut = middleware.resolve(ctx);
        let continuation = match timeout {
            Some(t) => tokio::time::timeout(t, fut).await.map_err(|_| OpaleError::MiddlewareTimeout)??,
            None => fut.await?,
        };

        ctx = match continuation {
            RequestContinuation::Continue(c) if !c.response.is_sent() => c,
            RequestContinuation::Continue(c) | RequestContinuation::Stop(c) => return Ok(RequestContinuation::Stop(c)),
        };
    }

    Ok(RequestContinuation::Continue(ctx))
}

/// Access log middleware, logging the method and target of every request
/// reaching a route
pub async fn logger(ctx: HttpContext) -> Result<RequestContinuation, OpaleError> {
    let req = &ctx.request;
    match req.peer_addr() {
        Some(peer) => info!("{} {} {}", peer, req.method(), req.uri()),
        None => info!("{} {}", req.method(), req.uri()),
    }

    Ok(RequestContinuation::Continue(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{request::Request, response::Response};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> HttpContext {
        let raw = http::Request::builder().uri("/").body(hyper::Body::empty()).unwrap();
        HttpContext::new(Request::new(raw, None), Response::new())
    }

    fn tag(name: &'static str) -> Arc<dyn Middleware> {
        Arc::new(move |mut ctx: HttpContext| async move {
            let seen = ctx.response.headers().get("x-seen").map(|v| format!("{},{}", v.to_str().unwrap(), name)).unwrap_or_else(|| name.to_string());
            ctx.response.header("x-seen", seen)?;
            Ok::<_, OpaleError>(RequestContinuation::Continue(ctx))
        })
    }

    async fn stop(mut ctx: HttpContext) -> Result<RequestContinuation, OpaleError> {
        ctx.response.set_status(http::StatusCode::UNAUTHORIZED);
        Ok(RequestContinuation::Stop(ctx))
    }

    async fn fail(_ctx: HttpContext) -> Result<RequestContinuation, OpaleError> {
        Err(OpaleError::custom("middleware failure"))
    }

    async fn never(ctx: HttpContext) -> Result<RequestContinuation, OpaleError> {
        futures::future::pending::<()>().await;
        Ok(RequestContinuation::Continue(ctx))
    }

    async fn send_early(mut ctx: HttpContext) -> Result<RequestContinuation, OpaleError> {
        ctx.response.send("early")?;
        Ok(RequestContinuation::Continue(ctx))
    }

    #[tokio::test]
    async fn empty_chain_continues() {
        assert!(run(&[], context(), None).await.unwrap().is_continue());
    }

    #[tokio::test]
    async fn chain_runs_in_order() {
        let chain = vec![tag("a"), tag("b"), tag("c")];
        let ctx = run(&chain, context(), None).await.unwrap();
        assert!(ctx.is_continue());
        assert_eq!(ctx.into_context().response.headers()["x-seen"], "a,b,c");
    }

    #[tokio::test]
    async fn stop_short_circuits() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let count: Arc<dyn Middleware> = Arc::new(move |ctx: HttpContext| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, OpaleError>(RequestContinuation::Continue(ctx)) }
        });

        let chain: Vec<Arc<dyn Middleware>> = vec![count.clone(), Arc::new(stop), count];
        let result = run(&chain, context(), None).await.unwrap();
        assert!(!result.is_continue());
        assert_eq!(result.into_context().response.status(), http::StatusCode::UNAUTHORIZED);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sent_response_ends_chain() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(send_early), tag("late")];
        let result = run(&chain, context(), None).await.unwrap();
        assert!(!result.is_continue());
        assert!(result.into_context().response.headers().get("x-seen").is_none());
    }

    #[tokio::test]
    async fn failure_is_propagated() {
        let chain: Vec<Arc<dyn Middleware>> = vec![tag("a"), Arc::new(fail)];
        assert!(matches!(run(&chain, context(), None).await, Err(OpaleError::Custom(_))));
    }

    #[tokio::test]
    async fn unresponsive_middleware_times_out() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(never)];
        let result = run(&chain, context(), Some(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(OpaleError::MiddlewareTimeout)));
    }
}
