//! Network seam: request/response values and the fetch capability.

mod client;
mod error;
mod types;

pub use client::{Fetcher, HttpFetcher};
pub use error::FetchError;
pub use types::{Destination, Request, Response};
