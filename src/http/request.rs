//! HTTP request as seen by the envelope layer.

use bytes::Bytes;

/// HTTP method, as far as routing cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<&hyper::Method> for Method {
    fn from(method: &hyper::Method) -> Self {
        match *method {
            hyper::Method::GET => Method::Get,
            hyper::Method::POST => Method::Post,
            ref other => Method::Other(other.as_str().to_string()),
        }
    }
}

/// Method and body of an incoming request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Request body, `None` when empty.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Create a request without a body.
    pub fn new(method: Method) -> Self {
        Self { method, body: None }
    }

    /// Set the request body. An empty body is stored as `None`.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    /// Parse the body as JSON if present.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.body.as_ref().map(|b| serde_json::from_slice(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_absent() {
        let request = HttpRequest::new(Method::Post).body("");
        assert!(request.body.is_none());
        assert!(request.json::<serde_json::Value>().is_none());
    }

    #[test]
    fn method_from_hyper() {
        assert_eq!(Method::from(&hyper::Method::POST), Method::Post);
        assert_eq!(Method::from(&hyper::Method::PUT).to_string(), "PUT");
    }
}
