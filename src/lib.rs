//! Functional response-handling combinators for HTTP clients.
//!
//! Build immutable requests, pair them with a transport collaborator, and
//! describe what to do with each response status through a fluent chain of
//! handlers. Nothing runs until the chain is sealed by awaiting it; every
//! failure - unhandled status, decode error, transport trouble - comes back
//! as an error value, never a panic.
//!
//! # Example
//!
//! ```ignore
//! use talon::prelude::*;
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let user: User = client
//!     .get("https://api.example.com/users/1")?
//!     .json()
//!     .on_errors(|res| Err(Error::http(res.status(), "lookup failed")))
//!     .await?;
//! ```
//!
//! Handlers are scanned most-recently-registered first, so a broad rule can
//! be overridden later by a specific one. Chains are immutable values: a
//! parent chain can be cloned into divergent children that never share
//! handler state.

mod body;
mod client;
mod error;
mod handled;
mod handler;
mod headers;
mod method;
pub mod prelude;
mod request;
mod response;

pub use body::{ContentType, from_json, to_form, to_json};
pub use client::{Call, HttpClient, HttpClientExt};
pub use error::{Error, Result};
pub use handled::{HandleExt, Handled, ResponseSource};
pub use handler::Handlers;
pub use headers::Headers;
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::Response;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
