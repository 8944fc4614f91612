//! Page automation surface.
//!
//! Everything the relay does to a browser goes through [`PageAutomation`]:
//! navigation, load waits, worker script injection, worker protocol
//! round-trips and tab lifecycle. The trait keeps the orchestration logic
//! independent of the concrete browser; production uses the chromiumoxide
//! implementation in [`chrome`], tests use a scripted mock.
//!
//! Timeout discipline: every call that crosses into a page carries an
//! explicit bound. `wait_for_load` resolves after its timeout at the latest
//! and never errors (load-complete signals are not trusted on single-page
//! apps); `send_to_worker` errors on an unanswered request.

pub mod chrome;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::worker::{ReadyAnnouncement, WorkerRequest, WorkerResponse};

/// Opaque identifier for a browser tab.
///
/// Unique and stable for the lifetime of the tab, supplied by the
/// automation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// Errors from the automation surface
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The tab no longer exists (closed or navigated away concurrently)
    #[error("tab {0} is gone")]
    TabGone(TabId),
    /// No active tab in the active window
    #[error("no active tab")]
    NoActiveTab,
    /// Worker did not answer within the timeout
    #[error("worker reply timeout after {0:?}")]
    WorkerTimeout(Duration),
    /// Worker replied with something that does not parse as a response
    #[error("malformed worker reply: {0}")]
    MalformedReply(String),
    /// Underlying browser failure
    #[error("browser error: {0}")]
    Browser(String),
}

/// Result alias for automation calls
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Browser primitives the relay depends on
#[async_trait]
pub trait PageAutomation: Send + Sync {
    /// Point an existing tab at a URL. Returns once navigation is initiated,
    /// not once the page has loaded.
    async fn navigate(&self, tab: TabId, url: &str) -> AutomationResult<()>;

    /// Wait until the tab reports load-complete, or until `timeout` elapses.
    /// Never errors; timing out is the proceed-anyway fallback.
    async fn wait_for_load(&self, tab: TabId, timeout: Duration);

    /// Install the worker script into the tab's page context. Fails if the
    /// tab was closed or navigated away concurrently.
    async fn inject(&self, tab: TabId) -> AutomationResult<()>;

    /// Wait until the tab's worker context announces that its page is
    /// interactive and on a conversation page. Resolves to `None` when the
    /// timeout elapses without an announcement; never errors.
    async fn wait_for_ready(&self, tab: TabId, timeout: Duration) -> Option<ReadyAnnouncement>;

    /// Send a typed request to the tab's worker context and await the typed
    /// reply, bounded by `timeout`.
    async fn send_to_worker(
        &self,
        tab: TabId,
        request: WorkerRequest,
        timeout: Duration,
    ) -> AutomationResult<WorkerResponse>;

    /// Open a new tab at `url`. Inactive tabs open in the background.
    async fn create_tab(&self, url: &str, active: bool) -> AutomationResult<TabId>;

    /// Close a tab. Idempotent: closing an already-closed tab is a no-op.
    async fn close_tab(&self, tab: TabId);

    /// The active tab in the active window, if any.
    async fn query_active_tab(&self) -> Option<TabId>;
}
