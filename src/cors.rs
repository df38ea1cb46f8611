//! Cross-Origin Resource Sharing policy: an allow-list of methods enforced
//! before routing, plus the `Access-Control-*` headers added to every
//! response.

use http::{
    header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE},
    HeaderMap, HeaderValue, Method,
};

use crate::error::OpaleError;

/// Methods allowed when no explicit list is configured
pub const DEFAULT_ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, OPTIONS, DELETE";

/// Builder of the CORS policy. Configuring it, even with no value, enables
/// CORS.
#[derive(Default, Clone)]
pub struct CorsBuilder {
    origin: Option<String>,
    methods: Option<String>,
    max_age: Option<u64>,
}

impl CorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `Access-Control-Allow-Origin`
    #[inline]
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    /// Comma separated list of allowed methods, sent as
    /// `Access-Control-Allow-Methods` and used as the allow-list
    #[inline]
    pub fn methods(mut self, methods: &str) -> Self {
        self.methods = Some(methods.to_string());
        self
    }

    /// Value of `Access-Control-Max-Age`, in seconds
    #[inline]
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub(crate) fn build(self) -> Result<Cors, OpaleError> {
        let CorsBuilder { origin, methods, max_age } = self;

        let methods = methods.unwrap_or_else(|| DEFAULT_ALLOWED_METHODS.to_string());
        let allowed_methods = methods
            .split(',')
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>();

        let mut headers = HeaderMap::new();
        if let Some(origin) = origin {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_str(&origin)?);
        }
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_str(&methods)?);
        if let Some(max_age) = max_age {
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
        }

        Ok(Cors {
            enabled: true,
            headers,
            allowed_methods,
        })
    }
}

/// Immutable CORS policy, built once by the server builder
#[derive(Debug, Clone, Default)]
pub struct Cors {
    enabled: bool,
    headers: HeaderMap,
    allowed_methods: Vec<String>,
}

impl Cors {
    /// A policy that lets every request through and adds no header
    pub fn disabled() -> Self {
        Cors::default()
    }

    /// Headers to add to every response
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether `method` passes the allow-list. Always true when disabled.
    pub fn allows(&self, method: &Method) -> bool {
        !self.enabled || self.allowed_methods.iter().any(|m| m.eq_ignore_ascii_case(method.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_enforced() {
        let cors = CorsBuilder::new().origin("*").methods("GET, POST").build().unwrap();
        assert!(cors.allows(&Method::GET));
        assert!(cors.allows(&Method::POST));
        assert!(!cors.allows(&Method::DELETE));
        assert!(!cors.allows(&Method::PUT));
    }

    #[test]
    fn default_methods() {
        let cors = CorsBuilder::new().build().unwrap();
        assert_eq!(cors.headers()[ACCESS_CONTROL_ALLOW_METHODS], DEFAULT_ALLOWED_METHODS);
        assert!(cors.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        for m in &[Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS, Method::DELETE] {
            assert!(cors.allows(m));
        }
        assert!(!cors.allows(&Method::HEAD));
    }

    #[test]
    fn headers_are_emitted() {
        let cors = CorsBuilder::new().origin("https://example.com").methods("GET").max_age(600).build().unwrap();
        assert_eq!(cors.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://example.com");
        assert_eq!(cors.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET");
        assert_eq!(cors.headers()[ACCESS_CONTROL_MAX_AGE], "600");
    }

    #[test]
    fn disabled_lets_everything_through() {
        let cors = Cors::disabled();
        assert!(cors.allows(&Method::DELETE));
        assert!(cors.headers().is_empty());
    }

    #[test]
    fn lowercase_methods_match() {
        let cors = CorsBuilder::new().methods("get,post").build().unwrap();
        assert!(cors.allows(&Method::GET));
        assert!(cors.allows(&Method::from_bytes(b"post").unwrap()));
    }

    #[test]
    fn invalid_origin_is_rejected() {
        assert!(CorsBuilder::new().origin("bad\norigin").build().is_err());
    }
}
