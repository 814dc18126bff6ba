//! Deferred response sources and handler chain sealing.
//!
//! A [`ResponseSource`] is a suspended, possibly side-effecting computation
//! that yields a [`Response`] when invoked - typically "perform the HTTP
//! call". [`Handled`] couples a source with a [`Handlers`] registry;
//! nothing runs until the chain is sealed by awaiting it (or calling
//! [`Handled::run`]), at which point the source is invoked once, any
//! acquisition failure is captured as the outcome's error value, and the
//! response is dispatched against the registry.
//!
//! [`HandleExt`] lets a chain start directly from any source, so callers
//! never construct an empty registry by hand:
//!
//! ```
//! use bytes::Bytes;
//! use talon::{HandleExt, Headers, Response};
//!
//! #[derive(Debug, PartialEq, serde::Deserialize)]
//! struct User { id: u64 }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> talon::Result<()> {
//! let source = || async {
//!     Ok(Response::new(200, Headers::new(), Bytes::from(r#"{"id":1}"#)))
//! };
//!
//! let user: User = source.json().await?;
//! assert_eq!(user, User { id: 1 });
//! # Ok(())
//! # }
//! ```

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use tracing::debug;

use crate::{Handlers, Response, Result};

/// A deferred computation producing a [`Response`].
///
/// Implementations are invoked only when a sealed chain is awaited, never
/// during chain construction. Running a chain again re-invokes the source;
/// caching, if desired, belongs to the source itself.
///
/// Any `Fn() -> Future<Output = Result<Response>>` closure is a source, so
/// an async block factory works directly.
pub trait ResponseSource {
    /// Performs the computation, yielding a response or a failure.
    fn produce(&self) -> impl Future<Output = Result<Response>> + Send;
}

impl<F, Fut> ResponseSource for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    fn produce(&self) -> impl Future<Output = Result<Response>> + Send {
        (self)()
    }
}

/// A deferred response source paired with a handler registry.
///
/// Combinators consume `self` and return a new chain; cloning a chain (when
/// the source is `Clone`) forks it, and siblings never share handler state.
#[derive(Debug)]
pub struct Handled<T, S> {
    source: S,
    handlers: Handlers<T>,
}

impl<T, S: Clone> Clone for Handled<T, S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<T, S> Handled<T, S>
where
    S: ResponseSource,
{
    /// Starts a chain with an empty registry.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            handlers: Handlers::new(),
        }
    }

    /// Wraps a source with an existing registry.
    #[must_use]
    pub fn with_handlers(source: S, handlers: Handlers<T>) -> Self {
        Self { source, handlers }
    }

    /// The registry accumulated so far.
    #[must_use]
    pub const fn handlers(&self) -> &Handlers<T> {
        &self.handlers
    }

    /// Adds a general `(predicate, transform)` handler.
    #[must_use]
    pub fn on<P, F>(self, predicate: P, transform: F) -> Self
    where
        P: Fn(u16) -> bool + Send + Sync + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            handlers: self.handlers.on(predicate, transform),
            source: self.source,
        }
    }

    /// Adds a handler for one exact status code.
    #[must_use]
    pub fn on_status<F>(self, status: u16, transform: F) -> Self
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            handlers: self.handlers.on_status(status, transform),
            source: self.source,
        }
    }

    /// Adds a handler for any of the given status codes.
    #[must_use]
    pub fn on_statuses<F>(self, statuses: impl IntoIterator<Item = u16>, transform: F) -> Self
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            handlers: self.handlers.on_statuses(statuses, transform),
            source: self.source,
        }
    }

    /// Adds a handler for every error status (4xx and 5xx).
    #[must_use]
    pub fn on_errors<F>(self, transform: F) -> Self
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            handlers: self.handlers.on_errors(transform),
            source: self.source,
        }
    }

    /// Adds a handler for `status` succeeding with a constant value.
    #[must_use]
    pub fn value_for<V>(self, status: u16, value: V) -> Self
    where
        V: Into<T> + Clone + Send + Sync + 'static,
    {
        Self {
            handlers: self.handlers.value_for(status, value),
            source: self.source,
        }
    }

    /// Adds a handler for 204 No Content succeeding with `value`.
    #[must_use]
    pub fn no_content<V>(self, value: V) -> Self
    where
        V: Into<T> + Clone + Send + Sync + 'static,
    {
        Self {
            handlers: self.handlers.no_content(value),
            source: self.source,
        }
    }

    /// Seals the chain: invokes the source, then dispatches.
    ///
    /// This is the single boundary where an acquisition failure becomes the
    /// outcome's error value; nothing past it raises.
    ///
    /// # Errors
    ///
    /// Returns the acquisition failure, the matching transform's failure,
    /// or [`crate::Error::UnhandledStatus`] if no handler matched.
    pub async fn run(self) -> Result<T> {
        let response = match self.source.produce().await {
            Ok(response) => response,
            Err(error) => {
                debug!(%error, "response acquisition failed");
                return Err(error);
            }
        };
        self.handlers.dispatch(&response)
    }
}

impl<T, S> Handled<T, S>
where
    T: serde::de::DeserializeOwned,
    S: ResponseSource,
{
    /// Adds a JSON body handler for `status`.
    #[must_use]
    pub fn json_for(self, status: u16) -> Self {
        Self {
            handlers: self.handlers.json_for(status),
            source: self.source,
        }
    }

    /// Adds a JSON body handler for 200 OK.
    #[must_use]
    pub fn json(self) -> Self {
        self.json_for(200)
    }
}

impl<T, S> IntoFuture for Handled<T, S>
where
    T: Send + 'static,
    S: ResponseSource + Send + Sync + 'static,
{
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

/// Starts a handler chain directly from any [`ResponseSource`].
///
/// Blanket-implemented, so `source.json::<User>()` works without going
/// through [`Handled::new`] by hand.
pub trait HandleExt: ResponseSource + Sized {
    /// Wraps this source in a chain with an empty registry.
    fn handling<T>(self) -> Handled<T, Self> {
        Handled::new(self)
    }

    /// Starts a chain with a general `(predicate, transform)` handler.
    fn on<T, P, F>(self, predicate: P, transform: F) -> Handled<T, Self>
    where
        P: Fn(u16) -> bool + Send + Sync + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        self.handling().on(predicate, transform)
    }

    /// Starts a chain with a handler for one exact status code.
    fn on_status<T, F>(self, status: u16, transform: F) -> Handled<T, Self>
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        self.handling().on_status(status, transform)
    }

    /// Starts a chain with a handler for any of the given status codes.
    fn on_statuses<T, F>(
        self,
        statuses: impl IntoIterator<Item = u16>,
        transform: F,
    ) -> Handled<T, Self>
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        self.handling().on_statuses(statuses, transform)
    }

    /// Starts a chain with a handler for every error status.
    fn on_errors<T, F>(self, transform: F) -> Handled<T, Self>
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        self.handling().on_errors(transform)
    }

    /// Starts a chain with a JSON body handler for `status`.
    fn json_for<T>(self, status: u16) -> Handled<T, Self>
    where
        T: serde::de::DeserializeOwned,
    {
        self.handling().json_for(status)
    }

    /// Starts a chain with a JSON body handler for 200 OK.
    fn json<T>(self) -> Handled<T, Self>
    where
        T: serde::de::DeserializeOwned,
    {
        self.handling().json()
    }

    /// Starts a chain with a 204 No Content handler succeeding with `value`.
    fn no_content<T, V>(self, value: V) -> Handled<T, Self>
    where
        V: Into<T> + Clone + Send + Sync + 'static,
    {
        self.handling().no_content(value)
    }
}

impl<S: ResponseSource + Sized> HandleExt for S {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::{Error, Headers};

    fn counting_source(
        status: u16,
        body: &str,
        calls: Arc<AtomicUsize>,
    ) -> impl ResponseSource + Clone + use<> {
        let body = body.to_string();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let response = Response::new(status, Headers::new(), Bytes::from(body.clone()));
            async move { Ok(response) }
        }
    }

    #[tokio::test]
    async fn source_not_invoked_before_await() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = counting_source(200, "", Arc::clone(&calls)).on_status(200, |_| Ok(()));

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        chain.run().await.expect("handled");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rerun_reinvokes_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = counting_source(200, "", Arc::clone(&calls)).on_status(200, |_| Ok(()));

        chain.clone().run().await.expect("first run");
        chain.run().await.expect("second run");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn acquisition_failure_becomes_outcome_error() {
        let source = || async { Err::<Response, _>(Error::connection("boom")) };
        let chain = source.on_status::<(), _>(200, |_| Ok(()));

        let err = chain.run().await.expect_err("source failed");
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn await_seals_the_chain() {
        let source =
            || async { Ok(Response::new(200, Headers::new(), Bytes::from_static(b"ok"))) };

        let text = source
            .on_status(200, |res| {
                res.text().map_err(|e| Error::invalid_request(e.to_string()))
            })
            .await
            .expect("sealed");
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn forked_chains_do_not_share_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parent = counting_source(404, "", Arc::clone(&calls)).on_status(200, |_| Ok("parent"));

        let left = parent.clone().on_status(404, |_| Ok("left"));
        let right = parent.clone().on_status(404, |_| Ok("right"));

        assert_eq!(left.run().await.expect("left"), "left");
        assert_eq!(right.run().await.expect("right"), "right");
        assert!(
            parent
                .run()
                .await
                .expect_err("parent has no 404 handler")
                .is_unhandled()
        );
    }

    #[tokio::test]
    async fn no_content_from_source() {
        let source =
            || async { Ok(Response::new(204, Headers::new(), Bytes::from_static(b"junk"))) };

        let value: &str = source.no_content("created").await.expect("no content");
        assert_eq!(value, "created");
    }
}
