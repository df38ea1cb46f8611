use crate::{body::Bytes, response::Response};
use http::{
    header::{InvalidHeaderName, InvalidHeaderValue, CONTENT_TYPE},
    Error as HttpCrateError, HeaderValue, StatusCode,
};
use hyper::Error as HyperError;
use std::{error::Error as StdError, io::Error as IoError};
use thiserror::Error;

/// Type representing an internal error inerrant to the underlining logic behind
/// opale
#[derive(Error, Debug)]
pub enum InternalError {
    #[error("http error: {0}")]
    Http(#[from] HttpCrateError),
    #[error("hyper error: {0}")]
    Hyper(#[from] HyperError),
}

/// Error type throughout the opale stack
#[derive(Error, Debug)]
pub enum OpaleError {
    ///
    #[error(transparent)]
    Internal(#[from] InternalError),
    ///
    #[error("io error: {0}")]
    Io(#[from] IoError),
    /// The request body stream failed before reaching its end
    #[error("unable to read request body: {0}")]
    Stream(HyperError),
    /// The request body was not valid for the configured parse mode
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),
    /// A response payload could not be serialized
    #[error("unable to serialize response body: {0}")]
    Serialize(serde_json::Error),
    /// The request body exceeded the configured limit (in bytes)
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
    /// Reading the request body took longer than the configured timeout
    #[error("request body was not received in time")]
    BodyReadTimeout,
    /// A middleware did not resolve within the configured timeout
    #[error("middleware did not resolve in time")]
    MiddlewareTimeout,
    /// `send` or `json` was called on a response that was already sent
    #[error("response was already sent")]
    ResponseAlreadySent,
    /// A route pattern was rejected at registration
    #[error("invalid route `{0}`: {1}")]
    InvalidRoute(String, String),
    ///
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Custom error type to map any other error, usually returned by a
    /// middleware or a handler
    #[error(transparent)]
    Custom(Box<dyn StdError + Send + Sync + 'static>),
    ///
    #[error("{0}")]
    Other(String),
}

impl From<HttpCrateError> for OpaleError {
    fn from(e: HttpCrateError) -> Self {
        OpaleError::Internal(InternalError::Http(e))
    }
}

impl From<HyperError> for OpaleError {
    fn from(e: HyperError) -> Self {
        OpaleError::Internal(InternalError::Hyper(e))
    }
}

impl From<InvalidHeaderValue> for OpaleError {
    fn from(e: InvalidHeaderValue) -> Self {
        OpaleError::InvalidHeader(e.to_string())
    }
}

impl From<InvalidHeaderName> for OpaleError {
    fn from(e: InvalidHeaderName) -> Self {
        OpaleError::InvalidHeader(e.to_string())
    }
}

impl OpaleError {
    /// Wrap any error into `OpaleError::Custom`
    pub fn custom<E: Into<Box<dyn StdError + Send + Sync + 'static>>>(e: E) -> Self {
        OpaleError::Custom(e.into())
    }

    /// The http status this error is answered with
    pub fn status_code(&self) -> StatusCode {
        match self {
            OpaleError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            OpaleError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            OpaleError::BodyReadTimeout => StatusCode::REQUEST_TIMEOUT,
            OpaleError::MiddlewareTimeout => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Turn the error into the final response, keeping the headers already
    /// present on `res` but discarding any body it had.
    pub fn respond(self, mut res: Response) -> Response {
        match &self {
            OpaleError::MalformedBody(e) => debug!("Unable to deserialize json body: {}", e),
            OpaleError::PayloadTooLarge(limit) => debug!("Request body exceeded the limit of {} bytes", limit),
            OpaleError::BodyReadTimeout => debug!("Request body was not received before the timeout"),
            OpaleError::Stream(e) => warn!("Request body stream failed: {}", e),
            OpaleError::MiddlewareTimeout => warn!("A middleware did not resolve before the timeout"),
            OpaleError::ResponseAlreadySent => warn!("A middleware or handler attempted to send the response more than once"),
            OpaleError::Serialize(e) => warn!("Unable to serialize the response body: {}", e),
            OpaleError::Custom(e) => warn!("A custom error was returned while handling the request: {}", e),
            e => warn!("Opale encountered an error while handling the request: {}", e),
        }

        let status = self.status_code();
        res.reset();
        res.set_status(status);
        res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        *res.body_mut() = Bytes::from_static(status.canonical_reason().unwrap_or("Error").as_bytes());
        res
    }
}
