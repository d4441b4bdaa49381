//! Explorer data access: HTTP client, retry policy and pagination.

pub mod client;
pub mod paginate;
pub mod retry;

pub use client::*;
pub use paginate::*;
pub use retry::*;
