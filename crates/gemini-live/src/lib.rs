//! Client for the Gemini Live bidirectional streaming API.

mod client;
pub mod types;

pub use client::config::{Config, ConfigBuilder};
pub use client::consts;
pub use client::{Client, ServerRx, UsageStats, connect_with_config};
