//! HTTP response values.
//!
//! [`Response`] is an immutable value with status, ordered headers, and a
//! byte body. It is produced once per deferred computation and never
//! mutated; handler transforms only read it.
//!
//! # Example
//!
//! ```ignore
//! let user: User = response.json()?;
//! ```

use bytes::Bytes;

use crate::Headers;

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Single header value by name, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (u16, Headers, Bytes) {
        (self.status, self.headers, self.body)
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 3xx.
    #[must_use]
    pub const fn is_redirection(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Deserialize the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// Get the response body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_basic() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "application/json");

        let response = Response::new(200, headers, Bytes::from(r#"{"id":1}"#));

        assert_eq!(response.status(), 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert!(response.is_success());
        assert!(!response.is_client_error());
        assert!(!response.is_server_error());
    }

    #[test]
    fn response_status_checks() {
        let response = Response::new(301, Headers::new(), Bytes::new());
        assert!(response.is_redirection());

        let response = Response::new(404, Headers::new(), Bytes::new());
        assert!(response.is_client_error());

        let response = Response::new(500, Headers::new(), Bytes::new());
        assert!(response.is_server_error());
    }

    #[test]
    fn response_json() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct User {
            id: u64,
            name: String,
        }

        let body = Bytes::from(r#"{"id":1,"name":"test"}"#);
        let response = Response::new(200, Headers::new(), body);

        let user: User = response.json().expect("deserialize");
        assert_eq!(
            user,
            User {
                id: 1,
                name: "test".to_string()
            }
        );
    }

    #[test]
    fn response_text() {
        let response = Response::new(200, Headers::new(), Bytes::from("Hello, World!"));

        let text = response.text().expect("text");
        assert_eq!(text, "Hello, World!");
    }

    #[test]
    fn response_into_parts() {
        let mut headers = Headers::new();
        headers.append("X-Id", "7");
        let response = Response::new(204, headers, Bytes::new());

        let (status, headers, body) = response.into_parts();
        assert_eq!(status, 204);
        assert_eq!(headers.get("x-id"), Some("7"));
        assert!(body.is_empty());
    }
}
