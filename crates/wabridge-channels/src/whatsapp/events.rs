//! Translating transport message events into inbound messages.

use super::address::canonical_address;
use tracing::debug;
use wabridge_core::message::InboundMessage;

/// Turn a transport message into an [`InboundMessage`], or `None` when it
/// must not be relayed (own echo, status broadcast, no text).
pub(super) fn translate_message(
    msg: &waproto::whatsapp::Message,
    info: &wacore::types::message::MessageInfo,
) -> Option<InboundMessage> {
    if info.source.is_from_me {
        debug!("WA filtered: own message {}", info.id);
        return None;
    }
    if info.source.chat.user == "status" {
        debug!("WA filtered: status broadcast");
        return None;
    }

    let text = message_text(msg)?;

    let sender_name = if info.push_name.is_empty() {
        None
    } else {
        Some(info.push_name.clone())
    };

    Some(InboundMessage::new(
        canonical_address(&info.source.chat),
        sender_name,
        text,
    ))
}

/// Text of a message, unwrapping device-sent, ephemeral and view-once wrappers.
pub(super) fn message_text(msg: &waproto::whatsapp::Message) -> Option<String> {
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg);

    let text = inner
        .conversation
        .as_deref()
        .or_else(|| {
            inner
                .extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .or_else(|| {
            inner
                .image_message
                .as_ref()
                .and_then(|i| i.caption.as_deref())
        })
        .unwrap_or("");

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
