//! Endpoint descriptors.
//!
//! An [`Endpoint`] describes one logical call: where it goes, how, and with
//! what. It is turned into a concrete [`Request`](crate::Request) by
//! [`materialize`](crate::request::materialize) once per attempt.

use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Bytes sent as-is.
    Raw(Bytes),

    /// A JSON document. Objects receive the client's default body parameters.
    Json(Value),

    /// `application/x-www-form-urlencoded` pairs. Default body parameters are
    /// prepended, endpoint keys win.
    Form(Vec<(String, String)>),
}

/// Immutable description of one logical HTTP call.
///
/// # Examples
///
/// ```
/// use reqflow::Endpoint;
/// use http::Method;
///
/// let endpoint = Endpoint::new(Method::GET, "/users/42")
///     .with_header("Accept", "application/json")?
///     .with_query_param("expand", "groups");
///
/// assert_eq!(endpoint.path(), "/users/42");
/// assert!(endpoint.allow_middlewares());
/// # Ok::<(), reqflow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    path: String,
    is_full_path: bool,
    method: Method,
    headers: HeaderMap,
    use_endpoint_headers_only: bool,
    query_params: Option<Vec<(String, String)>>,
    body: Option<Body>,
    allow_middlewares: bool,
}

impl Endpoint {
    /// Creates an endpoint with the given method and path relative to the base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_full_path: false,
            method,
            headers: HeaderMap::new(),
            use_endpoint_headers_only: false,
            query_params: None,
            body: None,
            allow_middlewares: true,
        }
    }

    /// A `GET` endpoint.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A `POST` endpoint.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A `PUT` endpoint.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A `PATCH` endpoint.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// A `DELETE` endpoint.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Marks the path as an absolute URL; the base URL is then ignored.
    pub fn full_path(mut self) -> Self {
        self.is_full_path = true;
        self
    }

    /// Adds a header, replacing any previous value for the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::RequestConstruction(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::RequestConstruction(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sends only this endpoint's headers, skipping the client defaults.
    pub fn endpoint_headers_only(mut self) -> Self {
        self.use_endpoint_headers_only = true;
        self
    }

    /// Adds a query parameter, replacing an earlier one with the same key.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let params = self.query_params.get_or_insert_with(Vec::new);
        upsert(params, key.into(), value.into());
        self
    }

    /// Adds every field of a serializable struct or map as a query parameter.
    ///
    /// Strings are used verbatim, `null` fields are skipped and other values
    /// use their JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if `query` does not serialize to a JSON object.
    pub fn with_query<Q: Serialize>(mut self, query: &Q) -> Result<Self> {
        let Value::Object(fields) = to_json(query)? else {
            return Err(Error::RequestConstruction(
                "query parameters must serialize to an object".to_string(),
            ));
        };
        let params = self.query_params.get_or_insert_with(Vec::new);
        for (key, value) in fields {
            if let Some(value) = value_to_param(value) {
                upsert(params, key, value);
            }
        }
        Ok(self)
    }

    /// Sets a raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Raw(body.into()));
        self
    }

    /// Sets a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(Body::Json(to_json(body)?));
        Ok(self)
    }

    /// Sets a URL-encoded form body.
    pub fn with_form(
        mut self,
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut pairs = Vec::new();
        for (key, value) in fields {
            upsert(&mut pairs, key.into(), value.into());
        }
        self.body = Some(Body::Form(pairs));
        self
    }

    /// Disables every middleware hook for this endpoint.
    pub fn without_middlewares(mut self) -> Self {
        self.allow_middlewares = false;
        self
    }

    /// The path, relative to the base URL unless [`is_full_path`](Self::is_full_path).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether [`path`](Self::path) is an absolute URL.
    pub fn is_full_path(&self) -> bool {
        self.is_full_path
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Headers specific to this endpoint.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the client's default headers are skipped.
    pub fn use_endpoint_headers_only(&self) -> bool {
        self.use_endpoint_headers_only
    }

    /// Query parameters, in insertion order.
    pub fn query_params(&self) -> Option<&[(String, String)]> {
        self.query_params.as_deref()
    }

    /// The body, if any.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Whether middleware hooks run for this endpoint.
    pub fn allow_middlewares(&self) -> bool {
        self.allow_middlewares
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

/// Inserts `key`, overwriting the value in place when the key already exists.
pub(crate) fn upsert(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter_mut().find(|(existing, _)| *existing == key) {
        Some(slot) => slot.1 = value,
        None => pairs.push((key, value)),
    }
}

pub(crate) fn value_to_param(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::RequestConstruction(format!("Failed to serialize: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Page {
        page: u32,
        filter: Option<String>,
        sort: &'static str,
    }

    #[test]
    fn query_from_struct_skips_null_fields() {
        let endpoint = Endpoint::get("/items")
            .with_query(&Page {
                page: 2,
                filter: None,
                sort: "name",
            })
            .unwrap();

        let params = endpoint.query_params().unwrap();
        assert!(params.contains(&("page".to_string(), "2".to_string())));
        assert!(params.contains(&("sort".to_string(), "name".to_string())));
        assert!(!params.iter().any(|(k, _)| k == "filter"));
    }

    #[test]
    fn query_must_be_an_object() {
        let err = Endpoint::get("/items").with_query(&[1, 2]).unwrap_err();
        assert!(matches!(err, Error::RequestConstruction(_)));
    }

    #[test]
    fn repeated_query_key_keeps_its_position() {
        let endpoint = Endpoint::get("/")
            .with_query_param("a", "1")
            .with_query_param("b", "2")
            .with_query_param("a", "3");

        assert_eq!(
            endpoint.query_params().unwrap(),
            &[
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn invalid_header_is_rejected() {
        assert!(Endpoint::get("/").with_header("bad header", "x").is_err());
        assert!(Endpoint::get("/").with_header("x-ok", "bad\nvalue").is_err());
    }

    #[test]
    fn defaults() {
        let endpoint = Endpoint::default();
        assert_eq!(*endpoint.method(), Method::GET);
        assert!(endpoint.allow_middlewares());
        assert!(!endpoint.is_full_path());
        assert!(!endpoint.use_endpoint_headers_only());
        assert!(endpoint.body().is_none());
        assert!(!endpoint.without_middlewares().allow_middlewares());
    }
}
