//! Message send orchestration.
//!
//! Accepts send requests from the operator surface, serializes them into a
//! single FIFO queue, and executes each by driving a browser tab to the
//! target conversation. Delivery itself is completed by the readiness
//! handshake: the injected worker announces when its page is actually
//! interactive, and only then is the send primitive invoked. That decouples
//! "script injected" from "page usable", which is what single-page-app
//! navigation timing requires.
//!
//! Concurrency model: one consumer loop, never re-entrant. The loop is
//! level-triggered; it exits when the queue drains and the next enqueue that
//! finds it idle restarts it.

pub mod types;

use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::automation::{AutomationError, PageAutomation, TabId};
use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::util::chat_url;
use crate::worker::{ReadyAnnouncement, WorkerRequest};

pub use types::{Accepted, PendingDelivery, SendMode, SendTask};

/// Single-consumer FIFO orchestrator for outbound chat messages
#[derive(Clone)]
pub struct SendOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    automation: Arc<dyn PageAutomation>,
    config: RelayConfig,
    queue: Mutex<VecDeque<SendTask>>,
    /// Loop guard. Set before the consumer task is spawned, cleared when it
    /// drains; checked-and-set without suspension in between so two loops
    /// can never run at once.
    processing: AtomicBool,
    pending: dashmap::DashMap<u64, PendingDelivery>,
    loop_starts: AtomicUsize,
}

impl SendOrchestrator {
    #[must_use]
    pub fn new(automation: Arc<dyn PageAutomation>, config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                automation,
                config,
                queue: Mutex::new(VecDeque::new()),
                processing: AtomicBool::new(false),
                pending: dashmap::DashMap::new(),
                loop_starts: AtomicUsize::new(0),
            }),
        }
    }

    /// Append a send task and wake the consumer loop if it is idle.
    ///
    /// Fire-and-forget: the returned ack only means the task was queued.
    /// The eventual delivery outcome is observable via logs, not here.
    ///
    /// # Errors
    ///
    /// Rejects empty chat ids or message texts before anything is queued.
    pub async fn enqueue_send(
        &self,
        chat_id: impl Into<String>,
        message_text: impl Into<String>,
        mode: SendMode,
    ) -> RelayResult<Accepted> {
        let chat_id = chat_id.into();
        let message_text = message_text.into();
        if chat_id.is_empty() {
            return Err(RelayError::Config("chat id must be non-empty".into()));
        }
        if message_text.is_empty() {
            return Err(RelayError::Config("message text must be non-empty".into()));
        }

        let task = SendTask::new(chat_id, message_text, mode);
        let queue_len = {
            let mut queue = self.inner.queue.lock().await;
            queue.push_back(task);
            queue.len()
        };
        debug!("Send task queued, queue length: {queue_len}");

        self.maybe_start_loop();
        Ok(Accepted { accepted: true })
    }

    /// Handle a worker context's readiness announcement.
    ///
    /// No pending delivery for the announcing tab, or a chat-id mismatch, is
    /// a safe no-op: readiness can arrive for tabs the operator navigated
    /// manually, or after the sweep already expired the entry.
    pub async fn handle_ready(&self, announcement: ReadyAnnouncement) {
        let tab = TabId(announcement.tab_id);
        let Some(delivery) = self
            .inner
            .pending
            .get(&announcement.tab_id)
            .map(|entry| entry.value().clone())
        else {
            debug!("Ready from {tab} with no pending delivery, ignoring");
            return;
        };
        if delivery.chat_id != announcement.chat_id {
            warn!(
                "Ready from {tab} for chat {} but pending delivery targets chat {}, ignoring",
                announcement.chat_id, delivery.chat_id
            );
            return;
        }

        let request = WorkerRequest::SendMessage {
            chat_id: delivery.chat_id.clone(),
            text: delivery.message_text.clone(),
        };
        match self
            .inner
            .automation
            .send_to_worker(tab, request, self.inner.config.worker_timeout())
            .await
        {
            Ok(response) if response.success() => {
                info!("Message delivered to chat {} in {tab}", delivery.chat_id);
                self.inner.pending.remove(&announcement.tab_id);
                if delivery.close_after_send {
                    self.schedule_tab_close(tab);
                }
            }
            Ok(response) => {
                // Entry stays; a later ready may succeed, and the sweep
                // reclaims it otherwise.
                warn!(
                    "Worker refused send to chat {} in {tab}: {}",
                    delivery.chat_id,
                    response.error().unwrap_or("no error detail")
                );
            }
            Err(e) => {
                warn!("Send to chat {} in {tab} failed: {e}", delivery.chat_id);
            }
        }
    }

    /// Drop pending deliveries older than the configured max age.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_stale(&self) -> usize {
        let max_age = chrono::Duration::from_std(self.inner.config.pending_max_age())
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let cutoff = chrono::Utc::now() - max_age;
        // Count inside the retain: inserts racing the sweep must not skew
        // the removal count.
        let mut removed = 0;
        self.inner.pending.retain(|_, delivery| {
            let keep = delivery.created_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            info!("Sweep removed {removed} stale pending deliveries");
        }
        removed
    }

    /// Start the periodic sweep of stale pending deliveries.
    ///
    /// Tabs that never announce readiness would otherwise leak entries
    /// forever. The task runs until aborted.
    pub fn start_sweep_task(&self) -> JoinHandle<()> {
        let orchestrator = self.clone();
        let interval = self.inner.config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                orchestrator.sweep_stale();
            }
        })
    }

    /// Number of tasks currently queued
    pub async fn queue_len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Number of deliveries awaiting a readiness announcement
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    /// How many times the consumer loop has been started. One start can
    /// serve any number of tasks; a busy loop is never started again.
    #[must_use]
    pub fn loop_starts(&self) -> usize {
        self.inner.loop_starts.load(Ordering::Acquire)
    }

    fn maybe_start_loop(&self) {
        // Atomic check-and-set with no await in between; the scheduler can
        // never interleave a second start.
        if self
            .inner
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.inner.loop_starts.fetch_add(1, Ordering::AcqRel);
            let orchestrator = self.clone();
            tokio::spawn(async move {
                orchestrator.run_loop().await;
            });
        }
    }

    async fn run_loop(&self) {
        debug!("Send queue consumer loop started");
        loop {
            let task = { self.inner.queue.lock().await.pop_front() };
            let Some(task) = task else {
                break;
            };

            if let Err(e) = self.execute_task(&task).await {
                // One failed task never stalls the queue.
                error!("Send task {} for chat {} failed: {e:#}", task.id, task.chat_id);
            }

            // Fixed pacing between navigations so rapid sends do not hammer
            // the target site.
            tokio::time::sleep(self.inner.config.inter_task_delay()).await;
        }
        self.inner.processing.store(false, Ordering::Release);
        debug!("Send queue consumer loop drained");

        // An enqueue may have landed between the final pop and clearing the
        // guard; restart rather than strand it.
        if !self.inner.queue.lock().await.is_empty() {
            self.maybe_start_loop();
        }
    }

    async fn execute_task(&self, task: &SendTask) -> anyhow::Result<()> {
        let url = chat_url(self.inner.config.chat_url_base(), &task.chat_id);
        info!("Executing send task {} for chat {} ({:?})", task.id, task.chat_id, task.mode);

        let (tab, close_after_send) = match task.mode {
            SendMode::CurrentTab => {
                let tab = self
                    .inner
                    .automation
                    .query_active_tab()
                    .await
                    .ok_or(AutomationError::NoActiveTab)?;
                self.record_pending(tab, task, false);
                self.inner.automation.navigate(tab, &url).await?;
                (tab, false)
            }
            SendMode::BackgroundTab => {
                let tab = self.inner.automation.create_tab(&url, false).await?;
                self.record_pending(tab, task, true);
                (tab, true)
            }
        };

        // Proceed-anyway wait: single-page apps fire load-complete
        // unreliably, so after the timeout we inject regardless and let the
        // readiness handshake decide when the page is usable.
        self.inner
            .automation
            .wait_for_load(tab, self.inner.config.tab_load_timeout())
            .await;
        self.inner.automation.inject(tab).await?;
        self.spawn_ready_watch(tab);

        debug!(
            "Worker injected for chat {} in {tab} (background: {close_after_send}), awaiting readiness",
            task.chat_id
        );
        Ok(())
    }

    /// Route the tab's readiness announcement into `handle_ready` once it
    /// arrives. A page that never becomes ready leaves its pending entry to
    /// the sweep.
    fn spawn_ready_watch(&self, tab: TabId) {
        let orchestrator = self.clone();
        let timeout = self.inner.config.ready_timeout();
        tokio::spawn(async move {
            match orchestrator
                .inner
                .automation
                .wait_for_ready(tab, timeout)
                .await
            {
                Some(announcement) => orchestrator.handle_ready(announcement).await,
                None => warn!("{tab} not ready within {timeout:?}, delivery abandoned"),
            }
        });
    }

    fn record_pending(&self, tab: TabId, task: &SendTask, close_after_send: bool) {
        // Latest write wins: a new navigation on the same tab replaces any
        // previous pending delivery.
        self.inner.pending.insert(
            tab.0,
            PendingDelivery {
                tab_id: tab,
                chat_id: task.chat_id.clone(),
                message_text: task.message_text.clone(),
                created_at: task.created_at,
                close_after_send,
            },
        );
    }

    fn schedule_tab_close(&self, tab: TabId) {
        let automation = Arc::clone(&self.inner.automation);
        let grace = self.inner.config.close_grace();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            debug!("Closing background {tab} after successful send");
            automation.close_tab(tab).await;
        });
    }

    #[cfg(test)]
    pub(crate) fn insert_pending(&self, delivery: PendingDelivery) {
        self.inner.pending.insert(delivery.tab_id.0, delivery);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::AutomationResult;
    use crate::worker::{WorkerRequest, WorkerResponse};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct NullAutomation {
        sends: StdMutex<Vec<WorkerRequest>>,
    }

    impl NullAutomation {
        fn new() -> Self {
            Self {
                sends: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageAutomation for NullAutomation {
        async fn navigate(&self, _tab: TabId, _url: &str) -> AutomationResult<()> {
            Ok(())
        }

        async fn wait_for_load(&self, _tab: TabId, _timeout: Duration) {}

        async fn inject(&self, _tab: TabId) -> AutomationResult<()> {
            Ok(())
        }

        async fn wait_for_ready(
            &self,
            _tab: TabId,
            _timeout: Duration,
        ) -> Option<ReadyAnnouncement> {
            None
        }

        async fn send_to_worker(
            &self,
            _tab: TabId,
            request: WorkerRequest,
            _timeout: Duration,
        ) -> AutomationResult<WorkerResponse> {
            self.sends.lock().expect("sends lock").push(request);
            Ok(WorkerResponse::SendResult {
                success: true,
                error: None,
            })
        }

        async fn create_tab(&self, _url: &str, _active: bool) -> AutomationResult<TabId> {
            Ok(TabId(1))
        }

        async fn close_tab(&self, _tab: TabId) {}

        async fn query_active_tab(&self) -> Option<TabId> {
            Some(TabId(1))
        }
    }

    fn test_config() -> RelayConfig {
        RelayConfig::builder()
            .registry_url("http://localhost:3100")
            .chat_url_base("https://hh.example")
            .inter_task_delay(Duration::from_millis(1))
            .build()
            .expect("valid test config")
    }

    fn orchestrator() -> SendOrchestrator {
        SendOrchestrator::new(Arc::new(NullAutomation::new()), test_config())
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_inputs() {
        let orch = orchestrator();
        assert!(orch.enqueue_send("", "hi", SendMode::CurrentTab).await.is_err());
        assert!(orch.enqueue_send("42", "", SendMode::CurrentTab).await.is_err());
        assert_eq!(orch.queue_len().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_expiry_removes_old_entries_only() {
        let orch = orchestrator();
        orch.insert_pending(PendingDelivery {
            tab_id: TabId(7),
            chat_id: "7".into(),
            message_text: "old".into(),
            created_at: chrono::Utc::now() - chrono::Duration::hours(2),
            close_after_send: false,
        });
        orch.insert_pending(PendingDelivery {
            tab_id: TabId(8),
            chat_id: "8".into(),
            message_text: "fresh".into(),
            created_at: chrono::Utc::now(),
            close_after_send: false,
        });

        assert_eq!(orch.sweep_stale(), 1);
        assert_eq!(orch.pending_len(), 1);

        // A late ready for the swept tab must be a no-op.
        orch.handle_ready(ReadyAnnouncement {
            tab_id: 7,
            chat_id: "7".into(),
        })
        .await;
        assert_eq!(orch.pending_len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sweep_counts_removals_despite_concurrent_inserts() {
        let orch = orchestrator();
        for i in 0..50 {
            orch.insert_pending(PendingDelivery {
                tab_id: TabId(i),
                chat_id: i.to_string(),
                message_text: "stale".into(),
                created_at: chrono::Utc::now() - chrono::Duration::hours(2),
                close_after_send: false,
            });
        }

        // Fresh entries landing mid-sweep must neither panic the sweep nor
        // inflate its removal count.
        let inserter = {
            let orch = orch.clone();
            tokio::spawn(async move {
                for i in 1000..2000u64 {
                    orch.insert_pending(PendingDelivery {
                        tab_id: TabId(i),
                        chat_id: i.to_string(),
                        message_text: "fresh".into(),
                        created_at: chrono::Utc::now(),
                        close_after_send: false,
                    });
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut removed = 0;
        while removed < 50 {
            removed += orch.sweep_stale();
            tokio::task::yield_now().await;
        }
        inserter.await.expect("inserter task");

        assert_eq!(removed, 50, "only the stale entries may be counted");
        assert_eq!(orch.sweep_stale(), 0);
        assert_eq!(orch.pending_len(), 1000);
    }

    #[tokio::test]
    async fn test_ready_chat_mismatch_is_noop() {
        let orch = orchestrator();
        orch.insert_pending(PendingDelivery {
            tab_id: TabId(3),
            chat_id: "expected".into(),
            message_text: "text".into(),
            created_at: chrono::Utc::now(),
            close_after_send: false,
        });

        orch.handle_ready(ReadyAnnouncement {
            tab_id: 3,
            chat_id: "other".into(),
        })
        .await;

        // Entry survives and nothing was delivered.
        assert_eq!(orch.pending_len(), 1);
    }
}
