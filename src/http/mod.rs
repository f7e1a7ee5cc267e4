//! HTTP layer — retry policies, and the `ApiHttp` client used by the web login
//! and document downloads.

#[cfg(feature = "native")]
pub mod client;
pub mod retry;

#[cfg(feature = "native")]
pub use client::ApiHttp;
pub use retry::{RetryConfig, RetryPolicy};
