//! botsrv basic library
//!
//! Provides plumbing shared by the bot service binaries, including:
//! - logging initialization
//! - startup banner and environment bootstrap
//! - graceful shutdown signal handling
//! - lenient serde deserializers for env-sourced configuration

pub mod logging;
pub mod serde_helpers;
pub mod service_bootstrap;
pub mod shutdown;

// Re-export common dependencies
pub use anyhow;
pub use serde;
pub use tokio;
