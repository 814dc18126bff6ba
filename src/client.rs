//! HTTP client traits.
//!
//! [`HttpClient`] is the transport collaborator seam: this crate ships no
//! transport of its own, only the contract an implementation must satisfy.
//! [`Call`] bridges a client and a request into a deferred
//! [`ResponseSource`], so a handler chain can start straight from a client:
//!
//! ```ignore
//! let user: User = client.get("https://api.example.com/users/1")?.json().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::{Request, Response, ResponseSource, Result};

/// Core HTTP client trait.
///
/// Implementations perform the actual I/O. Failures are reported as error
/// values; an implementation must not panic on network trouble.
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason: network
    /// errors, TLS errors, timeouts, or an invalid response.
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<C: HttpClient> HttpClient for &C {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).execute(request)
    }
}

impl<C: HttpClient> HttpClient for Arc<C> {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).execute(request)
    }
}

/// A client paired with a request: a deferred call.
///
/// Nothing is sent at construction; the request goes out when a chain built
/// on this source is awaited. Each run sends the request again.
#[derive(Debug, Clone)]
pub struct Call<C> {
    client: C,
    request: Request,
}

impl<C> Call<C> {
    /// Pairs a client with a request.
    #[must_use]
    pub const fn new(client: C, request: Request) -> Self {
        Self { client, request }
    }

    /// The request this call will send.
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }
}

impl<C: HttpClient> ResponseSource for Call<C> {
    fn produce(&self) -> impl Future<Output = Result<Response>> + Send {
        self.client.execute(self.request.clone())
    }
}

/// Extension trait for [`HttpClient`] with convenience constructors.
///
/// Every method returns a deferred [`Call`]; nothing is sent until the
/// resulting chain is awaited. The methods take `self` by value; pass a
/// reference (or an [`Arc`]) to keep using the client afterwards.
pub trait HttpClientExt: HttpClient + Sized {
    /// Pair this client with an already-built request.
    fn call(self, request: Request) -> Call<Self> {
        Call::new(self, request)
    }

    /// Build a deferred GET call.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    fn get(self, url: &str) -> Result<Call<Self>> {
        let url = url::Url::parse(url)?;
        Ok(self.call(Request::get(url)))
    }

    /// Build a deferred HEAD call.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    fn head(self, url: &str) -> Result<Call<Self>> {
        let url = url::Url::parse(url)?;
        Ok(self.call(Request::head(url)))
    }

    /// Build a deferred DELETE call.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    fn delete(self, url: &str) -> Result<Call<Self>> {
        let url = url::Url::parse(url)?;
        Ok(self.call(Request::delete(url)))
    }

    /// Build a deferred POST call with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or serialization fails.
    fn post_json<T: serde::Serialize>(self, url: &str, body: &T) -> Result<Call<Self>> {
        let url = url::Url::parse(url)?;
        let request = Request::builder(crate::Method::Post, url).json(body)?.build();
        Ok(self.call(request))
    }

    /// Build a deferred PUT call with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or serialization fails.
    fn put_json<T: serde::Serialize>(self, url: &str, body: &T) -> Result<Call<Self>> {
        let url = url::Url::parse(url)?;
        let request = Request::builder(crate::Method::Put, url).json(body)?.build();
        Ok(self.call(request))
    }
}

impl<C: HttpClient + Sized> HttpClientExt for C {}
