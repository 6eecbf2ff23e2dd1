//! Callback payloads
//!
//! Every field is optional; SeaTalk adds fields freely and unknown ones are
//! ignored.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    EventVerification,
    MessageFromBotSubscriber,
    UserEnterChatroomWithBot,
    InteractiveMessageClick,
    BotAddedToGroupChat,
    NewMentionedMessageReceivedFromGroupChat,
    NewMessageReceivedFromThread,
    Unknown,
}

impl EventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "event_verification" => EventKind::EventVerification,
            "message_from_bot_subscriber" => EventKind::MessageFromBotSubscriber,
            "user_enter_chatroom_with_bot" => EventKind::UserEnterChatroomWithBot,
            "interactive_message_click" => EventKind::InteractiveMessageClick,
            "bot_added_to_group_chat" => EventKind::BotAddedToGroupChat,
            "new_mentioned_message_received_from_group_chat" => {
                EventKind::NewMentionedMessageReceivedFromGroupChat
            },
            "new_message_received_from_thread" => EventKind::NewMessageReceivedFromThread,
            _ => EventKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallbackEnvelope {
    pub event_id: Option<String>,
    pub event_type: String,
    pub timestamp: Option<i64>,
    pub app_id: Option<String>,
    pub event: Option<CallbackEvent>,
}

impl CallbackEnvelope {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event_type)
    }

    pub fn event_id(&self) -> &str {
        self.event_id.as_deref().unwrap_or("-")
    }

    /// The event body, or an empty one
    pub fn event(&self) -> CallbackEvent {
        self.event.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallbackEvent {
    pub seatalk_challenge: Option<String>,
    pub seatalk_id: Option<String>,
    pub employee_code: Option<String>,
    pub email: Option<String>,
    pub group_id: Option<String>,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub value: Option<String>,
    pub message: Option<IncomingMessage>,
}

impl CallbackEvent {
    /// Employee code, when present and non-blank
    pub fn employee(&self) -> Option<&str> {
        self.employee_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IncomingMessage {
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub tag: Option<String>,
    pub text: Option<IncomingText>,
}

impl IncomingMessage {
    /// Trimmed text of a `text` message; `None` for other tags or blank text
    pub fn text_content(&self) -> Option<&str> {
        if self.tag.as_deref() != Some("text") {
            return None;
        }
        let text = self.text.as_ref()?;
        text.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or(text.plain_text.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IncomingText {
    pub content: Option<String>,
    pub plain_text: Option<String>,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscriber_message() {
        let raw = r#"{
            "event_id": "evt-9",
            "event_type": "message_from_bot_subscriber",
            "timestamp": 1700000000,
            "event": {
                "employee_code": "e_1",
                "seatalk_id": "s_1",
                "message": {"tag": "text", "thread_id": "t-1", "text": {"content": "  /stuckup help "}},
                "extra_field": {"ignored": true}
            }
        }"#;
        let envelope: CallbackEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.kind(), EventKind::MessageFromBotSubscriber);

        let event = envelope.event();
        assert_eq!(event.employee(), Some("e_1"));
        let message = event.message.unwrap();
        assert_eq!(message.text_content(), Some("/stuckup help"));
        assert_eq!(message.thread_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn test_non_text_message_has_no_content() {
        let message = IncomingMessage {
            tag: Some("image".into()),
            ..Default::default()
        };
        assert_eq!(message.text_content(), None);
    }

    #[test]
    fn test_plain_text_fallback_and_unknown_kind() {
        let message = IncomingMessage {
            tag: Some("text".into()),
            text: Some(IncomingText {
                content: None,
                plain_text: Some("hi".into()),
            }),
            ..Default::default()
        };
        assert_eq!(message.text_content(), Some("hi"));
        assert_eq!(EventKind::parse("something_new"), EventKind::Unknown);
    }
}
