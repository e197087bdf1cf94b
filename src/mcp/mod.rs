pub mod client;
pub mod collector;
pub mod types;

pub use client::{McpClient, McpError, DEFAULT_TIMEOUT_SECS};
pub use collector::{
    collect, collect_async, McpCategory, McpCollection, McpOptions, DEFAULT_ALLOWED_MIME,
    DEFAULT_MAX_RESOURCE_BYTES,
};
