//! HTTP client for the remote document store: a single `reqwest::Client`,
//! bearer-token auth, and typed JSON request/response shapes.

mod client;
mod constants;
mod error;

pub use client::ApiClient;
pub use constants::NBYTES;
pub use error::ApiError;
