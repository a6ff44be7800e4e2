//! Conversion of handler results into responses.
//!
//! The [`Responder`] trait is what a function passed to
//! [`handler_fn`](crate::handler::handler_fn) returns. Plain values become
//! `text/plain` responses, [`Encoded`] serializes through a [`Codec`].

use crate::codec::Codec;
use crate::error::BindError;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use tracing::error;

/// A type that can be turned into a response.
pub trait Responder {
    fn response_to(self) -> Response<Bytes>;
}

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

fn with_content_type(body: Bytes, content_type: &'static str) -> Response<Bytes> {
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self) -> Response<Bytes> {
        match self {
            Ok(t) => t.response_to(),
            Err(e) => e.response_to(),
        }
    }
}

/// `None` is a `404 Not Found` with an empty body.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self) -> Response<Bytes> {
        match self {
            Some(t) => t.response_to(),
            None => (StatusCode::NOT_FOUND, ()).response_to(),
        }
    }
}

impl Responder for Response<Bytes> {
    fn response_to(self) -> Response<Bytes> {
        self
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self) -> Response<Bytes> {
        let (status, responder) = self;
        let mut response = responder.response_to();
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for Box<T> {
    fn response_to(self) -> Response<Bytes> {
        (*self).response_to()
    }
}

impl Responder for () {
    fn response_to(self) -> Response<Bytes> {
        Response::new(Bytes::new())
    }
}

impl Responder for &'static str {
    fn response_to(self) -> Response<Bytes> {
        with_content_type(Bytes::from_static(self.as_bytes()), TEXT_PLAIN)
    }
}

impl Responder for String {
    fn response_to(self) -> Response<Bytes> {
        with_content_type(Bytes::from(self), TEXT_PLAIN)
    }
}

impl Responder for Bytes {
    fn response_to(self) -> Response<Bytes> {
        with_content_type(self, "application/octet-stream")
    }
}

/// The error message with the status of [`BindError::status_code`].
impl Responder for BindError {
    fn response_to(self) -> Response<Bytes> {
        (self.status_code(), self.to_string()).response_to()
    }
}

impl Responder for Infallible {
    fn response_to(self) -> Response<Bytes> {
        match self {}
    }
}

/// A value serialized with a codec, e.g. `Encoded::json(user)`.
#[derive(Debug, Clone)]
pub struct Encoded<T> {
    value: T,
    codec: Codec,
}

impl<T: Serialize> Encoded<T> {
    pub fn new(value: T, codec: Codec) -> Self {
        Self { value, codec }
    }

    pub fn json(value: T) -> Self {
        Self::new(value, Codec::Json)
    }

    pub fn xml(value: T) -> Self {
        Self::new(value, Codec::Xml)
    }

    pub fn yaml(value: T) -> Self {
        Self::new(value, Codec::Yaml)
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Serialize> Responder for Encoded<T> {
    fn response_to(self) -> Response<Bytes> {
        match self.codec.encode(&self.value) {
            Ok(bytes) => with_content_type(Bytes::from(bytes), self.codec.content_type()),
            Err(e) => {
                error!(codec = %self.codec, cause = %e, "failed to encode response");
                (StatusCode::INTERNAL_SERVER_ERROR, ()).response_to()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SourceKind;
    use crate::error::CoerceError;

    #[derive(Serialize)]
    struct User {
        name: &'static str,
    }

    #[test]
    fn text() {
        let response = "hi".response_to();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.body().as_ref(), b"hi");

        let response = (StatusCode::CREATED, String::from("made")).response_to();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body().as_ref(), b"made");
    }

    #[test]
    fn option_and_result() {
        assert_eq!(None::<String>.response_to().status(), StatusCode::NOT_FOUND);
        assert_eq!(Some(()).response_to().status(), StatusCode::OK);

        let failed: Result<&'static str, BindError> =
            Err(BindError::coerce("id", SourceKind::Path, CoerceError::new("u64", "x")));
        let response = failed.response_to();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.body().is_empty());
    }

    #[test]
    fn encoded() {
        let response = Encoded::json(User { name: "joe" }).response_to();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.body().as_ref(), br#"{"name":"joe"}"#);

        let response = Encoded::xml(User { name: "joe" }).response_to();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/xml");
        assert_eq!(response.body().as_ref(), b"<User><name>joe</name></User>");
    }

    #[test]
    fn encoding_failure_is_a_server_error() {
        // path values have no body representation
        let response = Encoded::new(User { name: "joe" }, Codec::Path).response_to();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
