use std::{
    convert::TryFrom,
    ops::{Deref, DerefMut},
};

use http::{
    header::{HeaderName, CONTENT_TYPE},
    HeaderMap, HeaderValue, Response as RawResponse, StatusCode,
};
use hyper::body::{Body as RawBody, Bytes};
use serde::Serialize;

use crate::error::OpaleError;

/// Struct that wraps a http response + the terminal `send` / `json` helpers
///
/// A response is handed to middlewares and to the route handler. It can be
/// sent only once; any later call to `send` or `json` fails with
/// `OpaleError::ResponseAlreadySent`.
pub struct Response {
    #[doc(hidden)]
    inner: RawResponse<Bytes>,
    #[doc(hidden)]
    sent: bool,
}

impl Response {
    /// Create a new empty response with status `200`
    pub fn new() -> Self {
        Response {
            inner: RawResponse::new(Bytes::new()),
            sent: false,
        }
    }

    pub(crate) fn with_headers(headers: &HeaderMap) -> Self {
        let mut res = Response::new();
        res.headers_mut().extend(headers.clone());
        res
    }

    /// Set the status of the response
    #[inline]
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        *self.inner.status_mut() = status;
        self
    }

    /// Insert a header, replacing any previous value of the same name
    ///
    /// ```rust
    /// # use opale::prelude::*;
    /// let mut res = Response::new();
    /// res.header("X-Custom-Foo", "bar").unwrap();
    /// assert_eq!(res.headers()["X-Custom-Foo"], "bar");
    /// ```
    pub fn header<K, V>(&mut self, key: K, value: V) -> Result<&mut Self, OpaleError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(key).map_err(|e| OpaleError::from(Into::<http::Error>::into(e)))?;
        let value = HeaderValue::try_from(value).map_err(|e| OpaleError::from(Into::<http::Error>::into(e)))?;
        self.inner.headers_mut().insert(name, value);
        Ok(self)
    }

    /// Terminate the response with a literal body
    pub fn send<B: Into<Bytes>>(&mut self, body: B) -> Result<(), OpaleError> {
        if self.sent {
            return Err(OpaleError::ResponseAlreadySent);
        }

        *self.inner.body_mut() = body.into();
        self.sent = true;
        Ok(())
    }

    /// Terminate the response with `data` serialized as json, setting the
    /// `Content-Type` header accordingly
    ///
    /// ```rust
    /// # use opale::prelude::*;
    /// let mut res = Response::new();
    /// res.json(&serde_json::json!({ "id": 42 })).unwrap();
    /// assert_eq!(res.headers()["Content-Type"], "application/json");
    /// assert_eq!(res.body().as_ref(), br#"{"id":42}"#);
    /// ```
    pub fn json<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<(), OpaleError> {
        if self.sent {
            return Err(OpaleError::ResponseAlreadySent);
        }

        let payload = serde_json::to_vec(data).map_err(OpaleError::Serialize)?;
        self.inner.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send(payload)
    }

    /// Whether `send` or `json` has been called
    #[inline]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub(crate) fn reset(&mut self) {
        *self.inner.body_mut() = Bytes::new();
        self.sent = false;
    }

    pub(crate) fn into_raw(self) -> RawResponse<RawBody> {
        self.inner.map(RawBody::from)
    }
}

impl Default for Response {
    fn default() -> Self {
        Response::new()
    }
}

impl Deref for Response {
    type Target = RawResponse<Bytes>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
