//! Worker protocol envelopes.
//!
//! Requests and replies exchanged with the script context running inside a
//! loaded page. The wire format is tagged JSON; unknown tags fail
//! deserialization at the boundary instead of falling through silently.

use serde::{Deserialize, Serialize};

/// Request sent to a tab's worker context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerRequest {
    /// Type the message text into the conversation input and submit it
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        text: String,
    },
    /// Return the cleaned outer HTML of the page at `url`
    FetchHtml { url: String },
    /// List the chat entries visible on the current page
    ListChats,
}

/// Reply from a tab's worker context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerResponse {
    SendResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    HtmlResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        html: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ChatList {
        success: bool,
        #[serde(default)]
        chats: Vec<ChatEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl WorkerResponse {
    /// Whether the worker reported success
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::SendResult { success, .. }
            | Self::HtmlResult { success, .. }
            | Self::ChatList { success, .. } => *success,
        }
    }

    /// Error string reported by the worker, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::SendResult { error, .. }
            | Self::HtmlResult { error, .. }
            | Self::ChatList { error, .. } => error.as_deref(),
        }
    }
}

/// One conversation visible in the chat list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default, rename = "isActive")]
    pub is_active: bool,
}

/// Unsolicited announcement from a worker context that its page is
/// interactive and on a conversation page.
///
/// Not a request/response pair; routed to the send orchestrator's readiness
/// handler, which correlates it with a pending delivery by tab id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadyAnnouncement {
    #[serde(rename = "tabId")]
    pub tab_id: u64,
    #[serde(rename = "chatId")]
    pub chat_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let req = WorkerRequest::SendMessage {
            chat_id: "42".into(),
            text: "hello".into(),
        };
        let json = serde_json::to_value(&req).expect("serializes");
        assert_eq!(json["type"], "send-message");
        assert_eq!(json["chatId"], "42");

        let back: WorkerRequest = serde_json::from_value(json).expect("round-trips");
        assert_eq!(back, req);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let raw = r#"{"type":"self-destruct"}"#;
        assert!(serde_json::from_str::<WorkerRequest>(raw).is_err());
        assert!(serde_json::from_str::<WorkerResponse>(raw).is_err());
    }

    #[test]
    fn test_response_error_accessors() {
        let raw = r#"{"type":"html-result","success":false,"error":"resume wall hit"}"#;
        let resp: WorkerResponse = serde_json::from_str(raw).expect("deserializes");
        assert!(!resp.success());
        assert_eq!(resp.error(), Some("resume wall hit"));
    }

    #[test]
    fn test_chat_list_defaults() {
        let raw = r#"{"type":"chat-list","success":true}"#;
        let resp: WorkerResponse = serde_json::from_str(raw).expect("deserializes");
        match resp {
            WorkerResponse::ChatList { chats, .. } => assert!(chats.is_empty()),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
