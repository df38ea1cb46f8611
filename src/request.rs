use std::{
    collections::HashMap,
    net::SocketAddr,
    ops::{Deref, DerefMut},
};

use http::Request as RawRequest;
use hyper::body::Body as RawBody;
use serde::de::DeserializeOwned;

use crate::{
    body::{Body, ParsedBody},
    error::OpaleError,
};

/// Struct that wraps a http request + the routing context filled by the
/// dispatcher: path captures, query parameters and the parsed body.
pub struct Request {
    #[doc(hidden)]
    inner: RawRequest<Body>,
    #[doc(hidden)]
    captures: HashMap<String, String>,
    #[doc(hidden)]
    query: HashMap<String, String>,
    #[doc(hidden)]
    parsed_body: ParsedBody,
    #[doc(hidden)]
    peer_addr: Option<SocketAddr>,
}

impl Request {
    #[doc(hidden)]
    pub fn new(raw: RawRequest<RawBody>, peer_addr: Option<SocketAddr>) -> Self {
        Request {
            inner: raw.map(Body::from_raw),
            captures: Default::default(),
            query: Default::default(),
            parsed_body: Default::default(),
            peer_addr,
        }
    }

    /// Return the Peer SocketAddr if one was available when receiving the
    /// request
    #[inline]
    pub fn peer_addr(&self) -> Option<&SocketAddr> {
        self.peer_addr.as_ref()
    }

    /// Access the captured variables from the request path. E.g. a path
    /// composed as `/user/:user_id/profile` will store a capture named
    /// `"user_id"`.
    ///
    /// ```rust
    /// # use opale::prelude::*;
    /// # let req = Request::new(http::Request::builder().uri("/user/42/profile").body(hyper::Body::empty()).unwrap(), None);
    /// let user_id = req.captures().get("user_id");
    /// // retrieve user by id
    /// ```
    #[inline]
    pub fn captures(&self) -> &HashMap<String, String> {
        &self.captures
    }

    /// Access the captured variables from the request path, in a mutable way.
    #[inline]
    pub fn captures_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.captures
    }

    /// Shorthand for `captures().get(name)`
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    /// Query parameters of the request, last value wins on repeated keys
    #[inline]
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    #[inline]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// The body as parsed by the configured `BodyParse` mode
    #[inline]
    pub fn parsed_body(&self) -> &ParsedBody {
        &self.parsed_body
    }

    /// Deserialize the parsed body into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, OpaleError> {
        self.parsed_body.deserialize()
    }

    pub(crate) fn set_routing(&mut self, captures: HashMap<String, String>, query: HashMap<String, String>) {
        self.captures = captures;
        self.query = query;
    }

    pub(crate) fn set_body(&mut self, raw: Body, parsed: ParsedBody) {
        *self.inner.body_mut() = raw;
        self.parsed_body = parsed;
    }
}

impl Deref for Request {
    type Target = RawRequest<Body>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
