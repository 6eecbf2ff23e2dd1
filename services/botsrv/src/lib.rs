//! botsrv: SeaTalk bot webhook server and stuckup sheet synchronization
//!
//! The HTTP side answers SeaTalk callbacks and chat commands. The stuckup
//! side keeps a target worksheet in line with a filtered source worksheet
//! through a relational table store, driven by a background monitor.

pub mod api;
pub mod app_state;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod error;
pub mod integrations;
pub mod routes;
pub mod seatalk;
pub mod stuckup;
pub mod table_image;
pub mod workflows;

pub use error::{BotError, Result};
