use crate::error::OpaleError;
use futures::StreamExt;
use hyper::body::{Body as RawBody, HttpBody};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use hyper::body::Bytes;

/// Upper bound of the buffer reserved up front when reading a body
const MAX_PREALLOCATED_BYTES: usize = 64 * 1024;

/// Body of an incoming request. It starts as the raw hyper stream and is
/// replaced by its loaded bytes once the dispatcher has read it.
pub enum Body {
    Raw(RawBody),
    Memory(Bytes),
}

impl Body {
    pub fn empty() -> Self {
        Body::Memory(Bytes::new())
    }

    #[inline]
    pub(crate) fn from_raw(raw: RawBody) -> Self {
        Body::Raw(raw)
    }

    /// Performing `take` will give your a owned version of the body, leaving
    /// a empty one behind
    #[inline]
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Body::empty())
    }

    /// Accumulate every chunk of the body. Fails with
    /// `OpaleError::PayloadTooLarge` when the declared length, or the bytes
    /// received so far, exceed `limit`.
    pub async fn load(self, limit: Option<usize>) -> Result<Bytes, OpaleError> {
        match self {
            Body::Raw(mut r) => {
                let declared = usize::try_from(r.size_hint().lower()).unwrap_or(usize::MAX);
                if let Some(limit) = limit.filter(|l| declared > *l) {
                    return Err(OpaleError::PayloadTooLarge(limit));
                }

                // the declared length is client input
                let mut vec = Vec::with_capacity(declared.min(MAX_PREALLOCATED_BYTES));

                while let Some(buf) = r.next().await.transpose().map_err(OpaleError::Stream)? {
                    vec.extend_from_slice(buf.as_ref());
                    if let Some(limit) = limit.filter(|l| vec.len() > *l) {
                        return Err(OpaleError::PayloadTooLarge(limit));
                    }
                }

                Ok(vec.into())
            }
            Body::Memory(b) => match limit {
                Some(limit) if b.len() > limit => Err(OpaleError::PayloadTooLarge(limit)),
                _ => Ok(b),
            },
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl From<RawBody> for Body {
    fn from(raw: RawBody) -> Self {
        Body::from_raw(raw)
    }
}

/// Read a whole request body, returning the raw bytes along with their text.
/// Invalid utf-8 sequences are replaced rather than rejected.
pub async fn read_body(body: Body, limit: Option<usize>) -> Result<(Bytes, String), OpaleError> {
    let bytes = body.load(limit).await?;
    let text = String::from_utf8_lossy(bytes.as_ref()).into_owned();
    Ok((bytes, text))
}

/// How the dispatcher turns the request body into `ParsedBody`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BodyParse {
    /// An empty body becomes `{}`, anything else must be valid json
    Json,
    /// The body is kept as a string
    Raw,
}

impl Default for BodyParse {
    fn default() -> Self {
        BodyParse::Json
    }
}

impl BodyParse {
    pub fn parse(self, text: String) -> Result<ParsedBody, OpaleError> {
        match self {
            BodyParse::Json if text.is_empty() => Ok(ParsedBody::Json(Value::Object(Map::new()))),
            BodyParse::Json => Ok(ParsedBody::Json(serde_json::from_str(&text)?)),
            BodyParse::Raw => Ok(ParsedBody::Text(text)),
        }
    }
}

/// Request body once read and parsed by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// Body was not parsed (the request did not reach a route)
    None,
    Json(Value),
    Text(String),
}

impl Default for ParsedBody {
    fn default() -> Self {
        ParsedBody::None
    }
}

impl ParsedBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParsedBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParsedBody::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Deserialize the body into `T`. A raw text body is parsed as json first.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, OpaleError> {
        match self {
            ParsedBody::Json(v) => Ok(T::deserialize(v)?),
            ParsedBody::Text(s) => Ok(serde_json::from_str(s)?),
            ParsedBody::None => Ok(T::deserialize(Value::Null)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_every_chunk() {
        let chunks: Vec<Result<_, std::io::Error>> = vec![Ok("hello "), Ok("wor"), Ok("ld")];
        let raw = RawBody::wrap_stream(futures::stream::iter(chunks));
        let (bytes, text) = read_body(Body::from_raw(raw), None).await.unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(bytes.len(), 11);
    }

    #[tokio::test]
    async fn stream_error_is_reported() {
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("partial"), Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))];
        let raw = RawBody::wrap_stream(futures::stream::iter(chunks));
        let err = read_body(Body::from_raw(raw), None).await.unwrap_err();
        assert!(matches!(err, OpaleError::Stream(_)));
    }

    #[tokio::test]
    async fn limit_is_enforced() {
        let raw = RawBody::from("0123456789");
        let err = read_body(Body::from_raw(raw), Some(4)).await.unwrap_err();
        assert!(matches!(err, OpaleError::PayloadTooLarge(4)));

        let raw = RawBody::from("0123");
        assert_eq!(read_body(Body::from_raw(raw), Some(4)).await.unwrap().1, "0123");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let raw = RawBody::from(vec![b'o', b'k', 0xff]);
        let (bytes, text) = read_body(Body::from_raw(raw), None).await.unwrap();
        assert_eq!(bytes.as_ref(), &[b'o', b'k', 0xff]);
        assert_eq!(text, "ok\u{fffd}");
    }

    #[test]
    fn empty_json_body_is_an_object() {
        assert_eq!(BodyParse::Json.parse(String::new()).unwrap(), ParsedBody::Json(json!({})));
    }

    #[test]
    fn json_body_is_parsed() {
        let parsed = BodyParse::Json.parse(r#"{"x":1}"#.to_string()).unwrap();
        assert_eq!(parsed.as_json(), Some(&json!({ "x": 1 })));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = BodyParse::Json.parse("{x:".to_string()).unwrap_err();
        assert!(matches!(err, OpaleError::MalformedBody(_)));
    }

    #[test]
    fn raw_mode_keeps_text() {
        let parsed = BodyParse::Raw.parse("{x:".to_string()).unwrap();
        assert_eq!(parsed.as_text(), Some("{x:"));
    }

    #[test]
    fn typed_deserialization() {
        #[derive(serde_derive::Deserialize)]
        struct Point {
            x: i32,
        }

        let parsed = BodyParse::Json.parse(r#"{"x":7}"#.to_string()).unwrap();
        assert_eq!(parsed.deserialize::<Point>().unwrap().x, 7);
    }
}
