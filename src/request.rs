//! HTTP request building.
//!
//! Use [`Request::builder`] to construct requests with headers, query
//! parameters, and bodies. A built [`Request`] is an immutable value; the
//! builder is the only place mutation happens.
//!
//! # Example
//!
//! ```
//! use talon::{Request, Method};
//!
//! let request = Request::builder(Method::Get, "https://api.example.com".parse().unwrap())
//!     .header("Accept", "application/json")
//!     .query("page", "1")
//!     .build();
//! ```

use bytes::Bytes;

use crate::{Headers, Method};

/// An HTTP request with method, URL, headers, and optional body.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: url::Url,
    headers: Headers,
    body: Option<Bytes>,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: url::Url) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Creates a GET request for the given URL, with no headers or body.
    #[must_use]
    pub fn get(url: url::Url) -> Self {
        Self::builder(Method::Get, url).build()
    }

    /// Creates a HEAD request for the given URL, with no headers or body.
    #[must_use]
    pub fn head(url: url::Url) -> Self {
        Self::builder(Method::Head, url).build()
    }

    /// Creates a DELETE request for the given URL, with no headers or body.
    #[must_use]
    pub fn delete(url: url::Url) -> Self {
        Self::builder(Method::Delete, url).build()
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL.
    #[must_use]
    pub const fn url(&self) -> &url::Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Single header value by name, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, url::Url, Headers, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: url::Url,
    headers: Headers,
    body: Option<Bytes>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends multiple headers.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Appends multiple query parameters to the URL.
    #[must_use]
    pub fn query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        {
            let mut query = self.url.query_pairs_mut();
            for (name, value) in pairs {
                query.append_pair(&name, &value);
            }
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: serde::Serialize>(self, value: &T) -> crate::Result<Self> {
        let body = crate::to_json(value)?;
        Ok(self.header("Content-Type", "application/json").body(body))
    }

    /// Set a form-urlencoded body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn form<T: serde::Serialize>(self, value: &T) -> crate::Result<Self> {
        let body = crate::to_form(value)?;
        Ok(self
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body))
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}
