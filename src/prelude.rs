//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use talon::prelude::*;
//! ```

pub use crate::{
    Call, ContentType, Error, HandleExt, Handled, Handlers, Headers, HttpClient, HttpClientExt,
    Method, Request, RequestBuilder, Response, ResponseSource, Result, from_json, to_form, to_json,
};
