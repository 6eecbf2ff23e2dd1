//! SeaTalk event callback
//!
//! Every recognized event is acknowledged with `{"code":0}` so SeaTalk does
//! not retry; failures to reply are logged, not returned.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::error::{BotError, Result};
use crate::seatalk::{is_valid_signature, CallbackEnvelope, EventKind};
use crate::workflows::WorkflowContext;

pub const SIGNATURE_HEADER: &str = "signature";

pub const GREETING_TEXT: &str = "Bot is online.\n\
Stuckup workflow is auto-triggered when source sheet reference row changes.";

/// @route POST /callbacks/seatalk
pub async fn seatalk_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let settings = &state.settings;
    if settings.seatalk_verify_signature {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !is_valid_signature(&settings.seatalk_signing_secret, &body, signature) {
            warn!("Rejected callback with invalid signature");
            return Err(BotError::Auth("invalid callback signature".to_string()));
        }
    }

    let envelope: CallbackEnvelope = serde_json::from_slice(&body).map_err(|e| {
        warn!("Invalid callback payload: {}", e);
        BotError::InvalidInput("invalid payload".to_string())
    })?;

    let ack = Json(json!({"code": 0}));
    match envelope.kind() {
        EventKind::EventVerification => {
            let challenge = envelope.event().seatalk_challenge.unwrap_or_default();
            Ok(Json(json!({"seatalk_challenge": challenge})))
        },
        EventKind::MessageFromBotSubscriber => {
            handle_subscriber_message(&state, &envelope).await;
            Ok(ack)
        },
        EventKind::UserEnterChatroomWithBot => {
            handle_user_enter(&state, &envelope).await;
            Ok(ack)
        },
        EventKind::InteractiveMessageClick => {
            let event = envelope.event();
            info!(
                "interactive_message_click: event_id={} employee_code={:?} message_id={:?} value={:?}",
                envelope.event_id(),
                event.employee_code,
                event.message_id,
                event.value
            );
            Ok(ack)
        },
        EventKind::BotAddedToGroupChat => {
            info!(
                "bot_added_to_group_chat: event_id={} group_id={:?}",
                envelope.event_id(),
                envelope.event().group_id
            );
            Ok(ack)
        },
        EventKind::NewMentionedMessageReceivedFromGroupChat
        | EventKind::NewMessageReceivedFromThread => {
            let event = envelope.event();
            let message = event.message.unwrap_or_default();
            info!(
                "{}: event_id={} group_id={:?} message_id={:?} thread_id={:?}",
                envelope.event_type,
                envelope.event_id(),
                event.group_id,
                message.message_id,
                message.thread_id
            );
            Ok(ack)
        },
        EventKind::Unknown => Ok(Json(json!({
            "code": 0,
            "message": format!("ignored event_type={}", envelope.event_type),
        }))),
    }
}

async fn handle_subscriber_message(state: &AppState, envelope: &CallbackEnvelope) {
    let event = envelope.event();
    let Some(employee_code) = event.employee() else {
        warn!("employee_code missing in callback event_id={}", envelope.event_id());
        return;
    };
    let Some(message) = event.message.as_ref() else {
        info!("Ignored event without message event_id={}", envelope.event_id());
        return;
    };
    let Some(text) = message.text_content() else {
        info!("Ignored non-text message event_id={}", envelope.event_id());
        return;
    };

    let context = WorkflowContext {
        employee_code: employee_code.to_string(),
        seatalk_id: event.seatalk_id.clone(),
        thread_id: message.thread_id.clone(),
        text: text.to_string(),
    };
    let result = state.router.route(&context).await;

    if let Some(reply) = result.response_text {
        if let Err(e) = state
            .sender
            .send_text_message(employee_code, &reply, context.thread_id.as_deref())
            .await
        {
            error!("Reply to {} failed: {}", employee_code, e);
        }
    }
}

async fn handle_user_enter(state: &AppState, envelope: &CallbackEnvelope) {
    let event = envelope.event();
    let Some(employee_code) = event.employee() else {
        warn!(
            "employee_code missing for user_enter_chatroom_with_bot event_id={}",
            envelope.event_id()
        );
        return;
    };
    if let Err(e) = state
        .sender
        .send_text_message(employee_code, GREETING_TEXT, None)
        .await
    {
        error!("Greeting to {} failed: {}", employee_code, e);
    }
}
