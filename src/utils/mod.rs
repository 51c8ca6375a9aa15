//! Utility modules.

pub mod retry;
pub mod text;

pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
pub use text::{ascii_slug, ascii_stem, preview};
