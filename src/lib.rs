//! ### Opale is a minimal async http routing layer for rust
//! Routes are declared as path patterns (`/users/:id`), every route carries
//! its own middleware chain, request bodies are parsed before reaching the
//! handler, and an optional CORS policy gates the allowed methods.
//!
//! Just `use` the prelude module, and you're ready to go!
//!
//! ## Quick server setup
//! ```ignore
//! use opale::prelude::*;
//!
//! async fn show_user(req: Request, mut res: Response) -> Result<Response, OpaleError> {
//!     res.json(&serde_json::json!({ "id": req.param("id") }))?;
//!     Ok(res)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), OpaleError> {
//!     env_logger::init();
//!
//!     let server = Server::builder()
//!         .configure_router(|r| r.use_logger().get("/users/:id", show_user))
//!         .use_cors(Some("*"), Some("GET, POST"), Some(3600))
//!         .build()?;
//!
//!     server.listen(3000, |addr| println!("listening on {}", addr)).await
//! }
//! ```

#[macro_use]
extern crate log;

/// Request body reading and parsing
pub mod body;
/// Cross-Origin Resource Sharing policy
pub mod cors;
/// Error definitions
pub mod error;
/// Definition of types which can handle an http request
pub mod handler;
/// Context enveloping every request <-> response
pub mod http_context;
///
pub mod middleware;
/// The Http Request type
pub mod request;
/// The Http Response type
pub mod response;
///
pub mod router;
/// Server implementation and request dispatch
pub mod server;
/// Route path patterns and query string parsing
pub mod utils;
///
pub use http;
///
pub use hyper;

/// Contains everything you need to bootstrap your http server
///
/// ```rust
/// use opale::prelude::*;
///
/// // implement magic
/// ```
pub mod prelude {
    ///
    pub use crate::body::Body;
    ///
    pub use crate::body::BodyParse;
    ///
    pub use crate::body::Bytes;
    ///
    pub use crate::body::ParsedBody;
    ///
    pub use crate::cors::CorsBuilder;
    ///
    pub use crate::error::OpaleError;
    ///
    pub use crate::handler::Handler;
    ///
    pub use crate::http_context::HttpContext;
    ///
    pub use crate::http_context::RequestContinuation;
    ///
    pub use crate::middleware::Middleware;
    ///
    pub use crate::request::Request;
    ///
    pub use crate::response::Response;
    ///
    pub use crate::server::Server;
    ///
    pub use http::header;
    ///
    pub use http::Method;
    ///
    pub use http::StatusCode;
    ///
    pub use http::Uri;
}
