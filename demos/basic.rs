#[macro_use]
extern crate log;

use std::sync::atomic::{AtomicU32, Ordering};

use futures::{future::BoxFuture, FutureExt};
use opale::prelude::*;
use serde_derive::{Deserialize, Serialize};

// == handlers == //

async fn hello_world(_req: Request, mut res: Response) -> Result<Response, OpaleError> {
    res.send("Hello, World!")?;
    Ok(res)
}

async fn get_user(req: Request, mut res: Response) -> Result<Response, OpaleError> {
    let id = req.param("id").unwrap_or_default();
    res.json(&User {
        username: format!("user-{}@example.net", id),
        age: 42,
    })?;
    Ok(res)
}

async fn create_user(req: Request, mut res: Response) -> Result<Response, OpaleError> {
    match req.json::<User>() {
        Ok(user) => {
            res.set_status(StatusCode::CREATED);
            res.send(format!("New user with username: {} and age: {}", user.username, user.age))?;
        }
        Err(_) => {
            res.set_status(StatusCode::BAD_REQUEST);
            res.send("Bad user format")?;
        }
    }
    Ok(res)
}

async fn search(req: Request, mut res: Response) -> Result<Response, OpaleError> {
    res.json(req.query())?;
    Ok(res)
}

#[derive(Serialize, Deserialize)]
struct User {
    username: String,
    age: i64,
}

// == middleware == //

struct StatsData {
    entered: AtomicU32,
}

impl Middleware for StatsData {
    fn resolve(&self, ctx: HttpContext) -> BoxFuture<'static, Result<RequestContinuation, OpaleError>> {
        let entered = self.entered.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            info!("entered stats middleware! Current data: entered={}", entered);
            Ok(RequestContinuation::Continue(ctx))
        }
        .boxed()
    }
}

async fn api_key_middleware(mut ctx: HttpContext) -> Result<RequestContinuation, OpaleError> {
    if ctx.request.headers().get("x-api-key").map(|v| v == "secret").unwrap_or(false) {
        return Ok(RequestContinuation::Continue(ctx));
    }

    ctx.response.set_status(StatusCode::UNAUTHORIZED);
    ctx.response.send("Missing or invalid api key")?;
    Ok(RequestContinuation::Stop(ctx))
}

#[tokio::main]
async fn main() -> Result<(), OpaleError> {
    env_logger::init();

    let server = Server::builder()
        .configure_listener(|l| l.server_name("Opale demo").body_limit(64 * 1024))
        .configure_router(|r| {
            r.get("/", hello_world)
                .use_logger()
                .default_middleware(StatsData { entered: AtomicU32::new(0) })
                .get("/users/:id", get_user)
                .post_with("/users", api_key_middleware, create_user)
                .get("/search", search)
        })
        .use_cors(Some("*"), Some("GET, POST, OPTIONS"), Some(3600))
        .add_header("X-Powered-By", "opale")
        .build()?;

    server.listen(12345, |addr| info!("demo ready on {}", addr)).await
}
