//! Test utilities for the hirescrape test suite.
//!
//! `MockAutomation` is a scripted, call-recording implementation of the
//! automation surface so orchestration logic can be exercised without a
//! browser. Behavior knobs cover the failure modes the components must
//! isolate: pages that never finish loading, workers that refuse a fetch,
//! and missing active tabs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use hirescrape::automation::{AutomationError, AutomationResult, PageAutomation, TabId};
use hirescrape::util::extract_chat_id;
use hirescrape::worker::{ReadyAnnouncement, WorkerRequest, WorkerResponse};

/// One recorded call against the mock surface
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Call {
    Navigate(u64, String),
    WaitForLoad(u64),
    Inject(u64),
    WaitForReady(u64),
    SendToWorker(u64, WorkerRequest),
    CreateTab(String, bool),
    CloseTab(u64),
    QueryActiveTab,
}

pub struct MockAutomation {
    calls: Mutex<Vec<Call>>,
    open_tabs: Mutex<HashSet<u64>>,
    next_tab: AtomicU64,
    max_open: AtomicUsize,
    /// Tab returned by `query_active_tab`; `None` simulates no active tab
    active_tab: Mutex<Option<u64>>,
    /// Simulated time until a page reports load-complete; longer than the
    /// caller's timeout means the load signal never arrives in time
    load_delay: Mutex<Duration>,
    /// URLs whose fetch-html request the worker refuses
    failing_urls: Mutex<HashSet<String>>,
    /// Last URL each tab was pointed at; readiness derives its chat id
    /// from here
    tab_urls: Mutex<HashMap<u64, String>>,
    /// When set, no page ever announces readiness
    ready_suppressed: AtomicBool,
    /// When set, `create_tab` fails
    create_tab_fails: AtomicBool,
}

#[allow(dead_code)]
impl MockAutomation {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            open_tabs: Mutex::new(HashSet::new()),
            next_tab: AtomicU64::new(1),
            max_open: AtomicUsize::new(0),
            active_tab: Mutex::new(None),
            load_delay: Mutex::new(Duration::ZERO),
            failing_urls: Mutex::new(HashSet::new()),
            tab_urls: Mutex::new(HashMap::new()),
            ready_suppressed: AtomicBool::new(false),
            create_tab_fails: AtomicBool::new(false),
        }
    }

    pub fn with_active_tab(self) -> Self {
        let id = self.next_tab.fetch_add(1, Ordering::Relaxed);
        self.open_tabs.lock().expect("open_tabs lock").insert(id);
        *self.active_tab.lock().expect("active_tab lock") = Some(id);
        self
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock().expect("load_delay lock") = delay;
    }

    pub fn suppress_ready(&self) {
        self.ready_suppressed.store(true, Ordering::Relaxed);
    }

    pub fn fail_create_tab(&self) {
        self.create_tab_fails.store(true, Ordering::Relaxed);
    }

    pub fn fail_fetch_for(&self, url: &str) {
        self.failing_urls
            .lock()
            .expect("failing_urls lock")
            .insert(url.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_matching(&self, predicate: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls().into_iter().filter(|c| predicate(c)).collect()
    }

    pub fn navigated_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Navigate(_, url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn created_tab_count(&self) -> usize {
        self.calls_matching(|c| matches!(c, Call::CreateTab(..))).len()
    }

    pub fn closed_tab_ids(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CloseTab(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn open_tab_count(&self) -> usize {
        self.open_tabs.lock().expect("open_tabs lock").len()
    }

    /// High-water mark of simultaneously open tabs
    pub fn max_open_tabs(&self) -> usize {
        self.max_open.load(Ordering::Relaxed)
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl PageAutomation for MockAutomation {
    async fn navigate(&self, tab: TabId, url: &str) -> AutomationResult<()> {
        self.record(Call::Navigate(tab.0, url.to_string()));
        if !self.open_tabs.lock().expect("open_tabs lock").contains(&tab.0) {
            return Err(AutomationError::TabGone(tab));
        }
        self.tab_urls
            .lock()
            .expect("tab_urls lock")
            .insert(tab.0, url.to_string());
        Ok(())
    }

    async fn wait_for_load(&self, tab: TabId, timeout: Duration) {
        self.record(Call::WaitForLoad(tab.0));
        let delay = *self.load_delay.lock().expect("load_delay lock");
        // The contract: resolve at the timeout at the latest.
        tokio::time::sleep(delay.min(timeout)).await;
    }

    async fn inject(&self, tab: TabId) -> AutomationResult<()> {
        self.record(Call::Inject(tab.0));
        if !self.open_tabs.lock().expect("open_tabs lock").contains(&tab.0) {
            return Err(AutomationError::TabGone(tab));
        }
        Ok(())
    }

    async fn wait_for_ready(&self, tab: TabId, timeout: Duration) -> Option<ReadyAnnouncement> {
        self.record(Call::WaitForReady(tab.0));
        if self.ready_suppressed.load(Ordering::Relaxed) {
            tokio::time::sleep(timeout).await;
            return None;
        }
        let url = self
            .tab_urls
            .lock()
            .expect("tab_urls lock")
            .get(&tab.0)
            .cloned()?;
        extract_chat_id(&url).map(|chat_id| ReadyAnnouncement {
            tab_id: tab.0,
            chat_id,
        })
    }

    async fn send_to_worker(
        &self,
        tab: TabId,
        request: WorkerRequest,
        _timeout: Duration,
    ) -> AutomationResult<WorkerResponse> {
        self.record(Call::SendToWorker(tab.0, request.clone()));
        match request {
            WorkerRequest::SendMessage { .. } => Ok(WorkerResponse::SendResult {
                success: true,
                error: None,
            }),
            WorkerRequest::FetchHtml { url } => {
                if self.failing_urls.lock().expect("failing_urls lock").contains(&url) {
                    Ok(WorkerResponse::HtmlResult {
                        success: false,
                        html: None,
                        error: Some("captcha wall".to_string()),
                    })
                } else {
                    Ok(WorkerResponse::HtmlResult {
                        success: true,
                        html: Some(format!(
                            "<html><body><script>track()</script><p>resume {url}</p></body></html>"
                        )),
                        error: None,
                    })
                }
            }
            WorkerRequest::ListChats => Ok(WorkerResponse::ChatList {
                success: true,
                chats: Vec::new(),
                error: None,
            }),
        }
    }

    async fn create_tab(&self, url: &str, active: bool) -> AutomationResult<TabId> {
        self.record(Call::CreateTab(url.to_string(), active));
        if self.create_tab_fails.load(Ordering::Relaxed) {
            return Err(AutomationError::Browser("tab creation refused".to_string()));
        }
        let id = self.next_tab.fetch_add(1, Ordering::Relaxed);
        let open_now = {
            let mut open = self.open_tabs.lock().expect("open_tabs lock");
            open.insert(id);
            open.len()
        };
        self.max_open.fetch_max(open_now, Ordering::Relaxed);
        self.tab_urls
            .lock()
            .expect("tab_urls lock")
            .insert(id, url.to_string());
        if active {
            *self.active_tab.lock().expect("active_tab lock") = Some(id);
        }
        Ok(TabId(id))
    }

    async fn close_tab(&self, tab: TabId) {
        self.record(Call::CloseTab(tab.0));
        // Idempotent: closing an unknown or already-closed tab is a no-op.
        self.open_tabs.lock().expect("open_tabs lock").remove(&tab.0);
    }

    async fn query_active_tab(&self) -> Option<TabId> {
        self.record(Call::QueryActiveTab);
        self.active_tab.lock().expect("active_tab lock").map(TabId)
    }
}

/// Poll until `condition` holds or `deadline` elapses; panics on timeout.
#[allow(dead_code)]
pub async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) {
    let start = std::time::Instant::now();
    while !condition() {
        assert!(
            start.elapsed() < deadline,
            "condition not met within {deadline:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
