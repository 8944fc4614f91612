//! chromiumoxide-backed implementation of the automation surface.
//!
//! Owns one Chrome instance for the lifetime of the relay. Tabs map 1:1 to
//! CDP pages; the relay-side [`TabId`] stays stable even though Chrome's
//! target ids churn on navigation. The worker protocol rides on JavaScript
//! evaluation: `inject` installs a dispatch hook on `window`, and
//! `send_to_worker` calls it with the request envelope and parses the JSON
//! reply.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::page::Page;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::{AutomationError, AutomationResult, PageAutomation, TabId};
use crate::worker::{ReadyAnnouncement, WorkerRequest, WorkerResponse};

/// Upper bound on `page.goto` itself, separate from the caller's
/// wait-for-load budget. Navigation that has not even started by then is a
/// browser problem, not a slow page.
const NAVIGATE_TIMEOUT: Duration = Duration::from_secs(30);

/// How often `wait_for_ready` re-checks the page's readiness flag.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Script installed into every driven page.
///
/// Exposes `window.__hirescrapeDispatch(request)` returning a promise of the
/// serialized response envelope, and maintains
/// `window.__hirescrapeReadyChat`: set to the chat id once the page is on a
/// conversation URL and the composer exists, which is what
/// `wait_for_ready` polls for. Selectors mirror the job site's chat
/// composer; `fetch-html` returns the live DOM rather than re-fetching the
/// URL so authenticated content survives.
const WORKER_SCRIPT: &str = r#"
(() => {
  if (window.__hirescrapeDispatch) return;

  const announceReady = () => {
    const m = location.pathname.match(/\/chat\/(\d+)/);
    const composer = document.querySelector('textarea[data-qa="chatik-new-message-text"]');
    if (m && composer) {
      window.__hirescrapeReadyChat = m[1];
      return true;
    }
    return false;
  };
  if (!announceReady()) {
    const readyTimer = setInterval(() => {
      if (announceReady()) clearInterval(readyTimer);
    }, 500);
  }

  const sendMessage = async (chatId, text) => {
    const input = document.querySelector('textarea[data-qa="chatik-new-message-text"]');
    if (!input) throw new Error('Message input not found');
    input.focus();
    input.value = text;
    input.dispatchEvent(new Event('input', { bubbles: true }));
    const btn = document.querySelector('button[data-qa="chatik-do-send-message"]');
    if (!btn) throw new Error('Send button not found');
    btn.click();
  };

  const listChats = () => {
    const chats = [];
    const seen = new Set();
    document.querySelectorAll('a[href*="/chat/"]').forEach((link) => {
      const m = link.href.match(/\/chat\/(\d+)/);
      if (!m || seen.has(m[1])) return;
      seen.add(m[1]);
      chats.push({
        id: m[1],
        name: link.textContent.trim() || ('Chat ' + m[1]),
        url: link.href,
        isActive: location.href.includes('/chat/' + m[1]),
      });
    });
    return chats;
  };

  window.__hirescrapeDispatch = async (request) => {
    try {
      switch (request.type) {
        case 'send-message':
          await sendMessage(request.chatId, request.text);
          return JSON.stringify({ type: 'send-result', success: true });
        case 'fetch-html':
          return JSON.stringify({
            type: 'html-result',
            success: true,
            html: document.documentElement.outerHTML,
          });
        case 'list-chats':
          return JSON.stringify({ type: 'chat-list', success: true, chats: listChats() });
        default:
          return JSON.stringify({
            type: 'send-result',
            success: false,
            error: 'Unknown request type: ' + request.type,
          });
      }
    } catch (err) {
      return JSON.stringify({
        type: request.type === 'fetch-html' ? 'html-result' : 'send-result',
        success: false,
        error: String(err && err.message || err),
      });
    }
  };
})();
"#;

/// One Chrome instance driving all relay tabs
pub struct ChromeAutomation {
    browser: Mutex<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    tabs: DashMap<u64, Page>,
    next_tab_id: AtomicU64,
    active_tab: AtomicU64,
}

impl ChromeAutomation {
    /// Launch Chrome and spawn the CDP handler task.
    ///
    /// `CHROMIUM_PATH` overrides executable discovery, matching the rest of
    /// the tooling around this crate.
    ///
    /// # Errors
    ///
    /// Fails when no executable can be found or the browser refuses to
    /// start.
    pub async fn launch(headless: bool) -> AutomationResult<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-hang-monitor")
            .arg("--disable-popup-blocking")
            .arg("--mute-audio");

        builder = if headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        if let Ok(path) = std::env::var("CHROMIUM_PATH") {
            info!("Using browser from CHROMIUM_PATH: {path}");
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| AutomationError::Browser(format!("Failed to build browser config: {e}")))?;

        info!("Launching browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationError::Browser(format!("Failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    let msg = e.to_string();
                    // Chrome emits CDP events chromiumoxide does not know;
                    // those deserialization failures are benign noise.
                    let benign = msg.contains("data did not match any variant of untagged enum")
                        || msg.contains("Failed to deserialize WS response");
                    if benign {
                        trace!("Suppressed benign CDP error: {msg}");
                    } else {
                        error!("Browser handler error: {msg}");
                    }
                }
            }
            info!("Browser handler task completed");
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            tabs: DashMap::new(),
            next_tab_id: AtomicU64::new(1),
            active_tab: AtomicU64::new(0),
        })
    }

    fn page(&self, tab: TabId) -> AutomationResult<Page> {
        self.tabs
            .get(&tab.0)
            .map(|entry| entry.value().clone())
            .ok_or(AutomationError::TabGone(tab))
    }

    /// Close the browser and tear down the handler task.
    ///
    /// Order matters: close the browser, wait for the process to exit, then
    /// abort the handler so it never loses its CDP connection mid-close.
    pub async fn shutdown(&self) {
        self.tabs.clear();

        if let Some(mut browser) = self.browser.lock().await.take() {
            debug!("Closing browser");
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {e}");
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {e}");
            }
        }

        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                warn!("Handler task failed during abort: {e}");
            }
        }
    }
}

#[async_trait]
impl PageAutomation for ChromeAutomation {
    async fn navigate(&self, tab: TabId, url: &str) -> AutomationResult<()> {
        let page = self.page(tab)?;
        debug!("Navigating {tab} to {url}");
        match tokio::time::timeout(NAVIGATE_TIMEOUT, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AutomationError::Browser(format!(
                "Navigation to {url} failed: {e}"
            ))),
            // goto blocking this long means the load-event never fired; the
            // caller's wait_for_load fallback covers that case.
            Err(_) => {
                warn!("Navigation to {url} still pending after {NAVIGATE_TIMEOUT:?}, proceeding");
                Ok(())
            }
        }
    }

    async fn wait_for_load(&self, tab: TabId, timeout: Duration) {
        let Ok(page) = self.page(tab) else {
            return;
        };
        match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => debug!("{tab} finished loading"),
            Ok(Err(e)) => warn!("{tab} navigation wait errored, proceeding: {e}"),
            Err(_) => warn!("{tab} load timeout after {timeout:?}, proceeding anyway"),
        }
    }

    async fn inject(&self, tab: TabId) -> AutomationResult<()> {
        let page = self.page(tab)?;
        page.evaluate(WORKER_SCRIPT)
            .await
            .map_err(|e| AutomationError::Browser(format!("Worker injection failed: {e}")))?;
        debug!("Worker script injected into {tab}");
        Ok(())
    }

    async fn wait_for_ready(&self, tab: TabId, timeout: Duration) -> Option<ReadyAnnouncement> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let Ok(page) = self.page(tab) else {
                return None;
            };
            match page.evaluate("window.__hirescrapeReadyChat || null").await {
                Ok(evaluation) => {
                    if let Ok(Some(chat_id)) = evaluation.into_value::<Option<String>>() {
                        debug!("{tab} announced readiness for chat {chat_id}");
                        return Some(ReadyAnnouncement {
                            tab_id: tab.0,
                            chat_id,
                        });
                    }
                }
                Err(e) => trace!("Readiness poll on {tab} failed: {e}"),
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("{tab} never announced readiness within {timeout:?}");
                return None;
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn send_to_worker(
        &self,
        tab: TabId,
        request: WorkerRequest,
        timeout: Duration,
    ) -> AutomationResult<WorkerResponse> {
        let page = self.page(tab)?;
        let request_json = serde_json::to_string(&request)
            .map_err(|e| AutomationError::MalformedReply(format!("request encode: {e}")))?;
        let expr = format!("window.__hirescrapeDispatch({request_json})");

        let evaluation = tokio::time::timeout(timeout, page.evaluate(expr.as_str()))
            .await
            .map_err(|_| AutomationError::WorkerTimeout(timeout))?
            .map_err(|e| AutomationError::Browser(format!("Worker evaluation failed: {e}")))?;

        let raw: String = evaluation
            .into_value()
            .map_err(|e| AutomationError::MalformedReply(format!("non-string reply: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| AutomationError::MalformedReply(e.to_string()))
    }

    async fn create_tab(&self, url: &str, active: bool) -> AutomationResult<TabId> {
        let browser_guard = self.browser.lock().await;
        let browser = browser_guard
            .as_ref()
            .ok_or_else(|| AutomationError::Browser("browser already shut down".into()))?;

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| AutomationError::Browser(format!("Failed to create tab: {e}")))?;

        let id = self.next_tab_id.fetch_add(1, Ordering::Relaxed);
        let tab = TabId(id);
        if active {
            if let Err(e) = page.bring_to_front().await {
                warn!("Failed to focus {tab}: {e}");
            }
            self.active_tab.store(id, Ordering::Relaxed);
        }
        self.tabs.insert(id, page);
        debug!("Created {tab} at {url} (active: {active})");
        Ok(tab)
    }

    async fn close_tab(&self, tab: TabId) {
        let Some((_, page)) = self.tabs.remove(&tab.0) else {
            trace!("close_tab on already-closed {tab}");
            return;
        };
        if let Err(e) = page.close().await {
            warn!("Failed to close {tab}: {e}");
        } else {
            debug!("Closed {tab}");
        }
    }

    async fn query_active_tab(&self) -> Option<TabId> {
        let id = self.active_tab.load(Ordering::Relaxed);
        if id != 0 && self.tabs.contains_key(&id) {
            Some(TabId(id))
        } else {
            None
        }
    }
}
