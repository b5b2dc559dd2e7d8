//! HTTP client module
//!
//! Replays captured requests against the target. [`Transport`] is the seam
//! scan actions depend on; [`HttpClient`] is the live implementation.

mod client;
mod request;
mod response;

pub use client::{HttpClient, Transport};
pub use request::Request;
pub use response::Response;
