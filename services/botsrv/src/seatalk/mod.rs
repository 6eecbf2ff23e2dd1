//! SeaTalk open platform: callback verification, event payloads and the
//! outbound message clients

pub mod client;
pub mod events;
pub mod signature;
pub mod system_account;

use async_trait::async_trait;

use crate::error::Result;

pub use client::SeaTalkClient;
pub use events::{CallbackEnvelope, CallbackEvent, EventKind};
pub use signature::is_valid_signature;
pub use system_account::SystemAccountClient;

/// Replies to a single employee through the bot
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text_message(
        &self,
        employee_code: &str,
        content: &str,
        thread_id: Option<&str>,
    ) -> Result<()>;
}
