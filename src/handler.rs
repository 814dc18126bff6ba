//! Handler registry and dispatch.
//!
//! [`Handlers`] is an ordered, immutable registry of
//! `(status predicate, response transform)` pairs. Every combinator returns
//! a new registry value; the receiver is never mutated, so a registry can
//! be forked into divergent chains without interference.
//!
//! Dispatch scans the registry in reverse registration order: the most
//! recently added handler whose predicate matches the response status wins.
//! This gives "last rule wins" override semantics, so a broad handler
//! registered early (say, `on_errors`) can be overridden later by a handler
//! for one specific status.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use talon::{Error, Handlers, Headers, Response};
//!
//! let handlers = Handlers::new()
//!     .on_errors(|res| Err(Error::http(res.status(), "request failed")))
//!     .on_status(200, |res| res.text().map_err(|e| Error::invalid_request(e.to_string())));
//!
//! let response = Response::new(200, Headers::new(), Bytes::from("ok"));
//! assert_eq!(handlers.dispatch(&response).unwrap(), "ok");
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::{Error, Response, Result};

type Predicate = Arc<dyn Fn(u16) -> bool + Send + Sync>;
type Transform<T> = Arc<dyn Fn(&Response) -> Result<T> + Send + Sync>;

struct Entry<T> {
    predicate: Predicate,
    transform: Transform<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            transform: Arc::clone(&self.transform),
        }
    }
}

/// Ordered registry of status predicates and response transforms.
///
/// `T` is the success type every transform produces. Registries are value
/// types: combinators take `&self` and return a new registry, sharing the
/// existing entries via cheap [`Arc`] clones.
pub struct Handlers<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Clone for Handlers<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> Default for Handlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Handlers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<T> Handlers<T> {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a new registry with one more handler appended.
    ///
    /// The general form every other combinator derives from. No predicate
    /// uniqueness is enforced; a later handler for the same status simply
    /// wins at dispatch.
    #[must_use]
    pub fn on<P, F>(&self, predicate: P, transform: F) -> Self
    where
        P: Fn(u16) -> bool + Send + Sync + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        let mut entries = self.entries.clone();
        entries.push(Entry {
            predicate: Arc::new(predicate),
            transform: Arc::new(transform),
        });
        Self { entries }
    }

    /// Registers a handler for one exact status code.
    #[must_use]
    pub fn on_status<F>(&self, status: u16, transform: F) -> Self
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        self.on(move |code| code == status, transform)
    }

    /// Registers a handler for any of the given status codes.
    #[must_use]
    pub fn on_statuses<F>(&self, statuses: impl IntoIterator<Item = u16>, transform: F) -> Self
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        let statuses: Vec<u16> = statuses.into_iter().collect();
        self.on(move |code| statuses.contains(&code), transform)
    }

    /// Registers a handler for every error status (4xx and 5xx).
    #[must_use]
    pub fn on_errors<F>(&self, transform: F) -> Self
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        self.on(|code| code >= 400, transform)
    }

    /// Registers a handler for `status` that succeeds with a constant,
    /// ignoring the response body.
    #[must_use]
    pub fn value_for<V>(&self, status: u16, value: V) -> Self
    where
        V: Into<T> + Clone + Send + Sync + 'static,
    {
        self.on_status(status, move |_| Ok(value.clone().into()))
    }

    /// Registers a handler for 204 No Content that succeeds with `value`,
    /// ignoring the response body.
    #[must_use]
    pub fn no_content<V>(&self, value: V) -> Self
    where
        V: Into<T> + Clone + Send + Sync + 'static,
    {
        self.value_for(204, value)
    }

    /// Applies the first matching handler, most recently registered first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnhandledStatus`] if no predicate matches the
    /// response status, or whatever failure the matching transform returns.
    pub fn dispatch(&self, response: &Response) -> Result<T> {
        let status = response.status();
        for (index, entry) in self.entries.iter().enumerate().rev() {
            if (entry.predicate)(status) {
                trace!(status, handler = index, "dispatching to handler");
                return (entry.transform)(response);
            }
        }
        debug!(status, "no handler matched response status");
        Err(Error::unhandled_status(status))
    }
}

impl<T: serde::de::DeserializeOwned> Handlers<T> {
    /// Registers a handler for `status` that parses the response body as
    /// JSON into `T`.
    ///
    /// A decode failure surfaces as [`Error::JsonDeserialization`] with the
    /// path to the offending field and the underlying cause message.
    #[must_use]
    pub fn json_for(&self, status: u16) -> Self {
        self.on_status(status, |response| response.json())
    }

    /// Registers a JSON body handler for 200 OK.
    ///
    /// Sugar for `json_for(200)`.
    #[must_use]
    pub fn json(&self) -> Self {
        self.json_for(200)
    }
}

#[cfg(test)]
mod tests {
    use assert2::let_assert;
    use bytes::Bytes;

    use super::*;
    use crate::Headers;

    fn response(status: u16, body: &str) -> Response {
        Response::new(status, Headers::new(), Bytes::from(body.to_string()))
    }

    #[test]
    fn empty_registry_yields_unhandled_status() {
        let handlers: Handlers<String> = Handlers::new();

        let err = handlers
            .dispatch(&response(200, ""))
            .expect_err("no handler");
        let_assert!(Error::UnhandledStatus { status: 200 } = err);

        let err = handlers
            .dispatch(&response(503, ""))
            .expect_err("no handler");
        let_assert!(Error::UnhandledStatus { status: 503 } = err);
    }

    #[test]
    fn matching_handler_applies_transform() {
        let handlers = Handlers::new().on_status(200, |res| Ok(res.body().len()));

        let result = handlers.dispatch(&response(200, "four")).expect("handled");
        assert_eq!(result, 4);
    }

    #[test]
    fn last_registered_handler_wins() {
        let handlers = Handlers::new()
            .on_status(200, |_| Ok("first"))
            .on_status(200, |_| Ok("second"));

        let result = handlers.dispatch(&response(200, "")).expect("handled");
        assert_eq!(result, "second");
    }

    #[test]
    fn specific_handler_overrides_earlier_broad_one() {
        let handlers = Handlers::new()
            .on_errors(|res| Err(Error::http(res.status(), "generic failure")))
            .on_status(404, |_| Ok("missing, but fine"));

        let result = handlers.dispatch(&response(404, "")).expect("override");
        assert_eq!(result, "missing, but fine");

        let err = handlers.dispatch(&response(500, "")).expect_err("generic");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn broad_handler_registered_later_shadows_specific_one() {
        // Reverse scan is strictly positional, not specificity-based.
        let handlers = Handlers::new()
            .on_status(404, |_| Ok("specific"))
            .on_errors(|_| Ok("broad"));

        let result = handlers.dispatch(&response(404, "")).expect("handled");
        assert_eq!(result, "broad");
    }

    #[test]
    fn on_statuses_matches_membership() {
        let handlers = Handlers::new().on_statuses([200, 201, 202], |res| Ok(res.status()));

        assert_eq!(handlers.dispatch(&response(201, "")).expect("member"), 201);
        let err = handlers.dispatch(&response(203, "")).expect_err("outside");
        assert!(err.is_unhandled());
    }

    #[test]
    fn on_errors_covers_client_and_server_errors() {
        let handlers = Handlers::new().on_errors(|res| Ok(res.status()));

        assert_eq!(handlers.dispatch(&response(400, "")).expect("4xx"), 400);
        assert_eq!(handlers.dispatch(&response(599, "")).expect("5xx"), 599);
        assert!(
            handlers
                .dispatch(&response(399, ""))
                .expect_err("not an error status")
                .is_unhandled()
        );
    }

    #[test]
    fn no_content_ignores_body() {
        let handlers: Handlers<&str> = Handlers::new().no_content("done");

        let result = handlers
            .dispatch(&response(204, "unexpected body"))
            .expect("no content");
        assert_eq!(result, "done");
    }

    #[test]
    fn json_for_parses_body() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct User {
            id: u64,
        }

        let handlers: Handlers<User> = Handlers::new().json_for(200);

        let user = handlers
            .dispatch(&response(200, r#"{"id":7}"#))
            .expect("decoded");
        assert_eq!(user, User { id: 7 });
    }

    #[test]
    fn json_for_decode_failure_preserves_cause() {
        #[derive(Debug, serde::Deserialize)]
        struct User {
            #[allow(dead_code)]
            id: u64,
        }

        let handlers: Handlers<User> = Handlers::new().json();

        let err = handlers
            .dispatch(&response(200, "not json"))
            .expect_err("decode failure");
        let_assert!(Error::JsonDeserialization { .. } = &err);
        assert!(err.to_string().contains("JSON deserialization error"));
    }

    #[test]
    fn transform_failure_passes_through() {
        let handlers: Handlers<()> = Handlers::new().on_status(409, |_| Err(Error::Timeout));

        let err = handlers.dispatch(&response(409, "")).expect_err("failure");
        assert!(err.is_timeout());
    }

    #[test]
    fn forked_registries_do_not_interfere() {
        let parent: Handlers<&str> = Handlers::new().on_status(200, |_| Ok("parent"));

        let left = parent.on_status(404, |_| Ok("left"));
        let right = parent.on_status(404, |_| Ok("right"));

        assert_eq!(left.dispatch(&response(404, "")).expect("left"), "left");
        assert_eq!(right.dispatch(&response(404, "")).expect("right"), "right");
        assert!(
            parent
                .dispatch(&response(404, ""))
                .expect_err("parent unchanged")
                .is_unhandled()
        );
        assert_eq!(parent.len(), 1);
    }
}
