//! Types for the send queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::automation::TabId;

/// Where a send task drives its delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendMode {
    /// Navigate the operator's active tab to the conversation
    CurrentTab,
    /// Open a disposable background tab, closed after delivery
    BackgroundTab,
}

/// One unit of outbound chat work.
///
/// Processed exactly once by the single consumer loop; discarded after
/// execution whether it succeeded or not. Nothing survives a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTask {
    pub id: Uuid,
    pub chat_id: String,
    pub message_text: String,
    pub mode: SendMode,
    pub created_at: DateTime<Utc>,
}

impl SendTask {
    #[must_use]
    pub fn new(chat_id: String, message_text: String, mode: SendMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            message_text,
            mode,
            created_at: Utc::now(),
        }
    }
}

/// Recorded intent to deliver a message in a specific tab once its worker
/// context announces readiness.
///
/// Keyed by tab id; a new navigation on the same tab overwrites the entry.
/// Entries older than the configured max age are garbage-collected by the
/// periodic sweep.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub tab_id: TabId,
    pub chat_id: String,
    pub message_text: String,
    pub created_at: DateTime<Utc>,
    /// Close the tab after a successful send (background-tab mode)
    pub close_after_send: bool,
}

/// Immediate acknowledgment returned by `enqueue_send`.
///
/// Delivery is asynchronous and its outcome is not reported back here;
/// failures surface in logs only. Known limitation of the operator
/// protocol, preserved deliberately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Accepted {
    pub accepted: bool,
}
