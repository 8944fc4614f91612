//! Configuration for relay operations.
//!
//! `RelayConfig` carries every tunable the send queue, extractor and browser
//! layer consume. Constructed through the builder, which validates the
//! registry URL up front so misconfiguration fails at startup instead of
//! mid-batch.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::constants::{
    DEFAULT_CLOSE_GRACE, DEFAULT_FANOUT_WINDOW, DEFAULT_INTER_LINK_DELAY,
    DEFAULT_INTER_TASK_DELAY, DEFAULT_PENDING_MAX_AGE, DEFAULT_READY_TIMEOUT,
    DEFAULT_SWEEP_INTERVAL, DEFAULT_TAB_LOAD_TIMEOUT, DEFAULT_WORKER_TIMEOUT, MAX_BATCH_SIZE,
};

/// How the batch extractor allocates tabs to links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum TabStrategy {
    /// One tab reused serially across the whole batch (O(1) tabs)
    SharedTab,
    /// One disposable tab per link, processed in windows of `window` links.
    /// Windows run in order; links inside a window run concurrently.
    DisposableTabs { window: usize },
}

impl Default for TabStrategy {
    fn default() -> Self {
        Self::SharedTab
    }
}

/// Configuration for the send orchestrator and batch extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub(crate) registry_url: String,
    pub(crate) chat_url_base: String,
    pub(crate) headless: bool,
    pub(crate) tab_load_timeout: Duration,
    pub(crate) worker_timeout: Duration,
    pub(crate) ready_timeout: Duration,
    pub(crate) inter_task_delay: Duration,
    pub(crate) inter_link_delay: Duration,
    pub(crate) pending_max_age: Duration,
    pub(crate) sweep_interval: Duration,
    pub(crate) close_grace: Duration,
    pub(crate) max_batch_size: usize,
    pub(crate) tab_strategy: TabStrategy,
}

impl RelayConfig {
    /// Start building a config; `registry_url` and `chat_url_base` are
    /// required, everything else has documented defaults.
    #[must_use]
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    pub fn chat_url_base(&self) -> &str {
        &self.chat_url_base
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn tab_load_timeout(&self) -> Duration {
        self.tab_load_timeout
    }

    pub fn worker_timeout(&self) -> Duration {
        self.worker_timeout
    }

    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    pub fn inter_task_delay(&self) -> Duration {
        self.inter_task_delay
    }

    pub fn inter_link_delay(&self) -> Duration {
        self.inter_link_delay
    }

    pub fn pending_max_age(&self) -> Duration {
        self.pending_max_age
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn close_grace(&self) -> Duration {
        self.close_grace
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn tab_strategy(&self) -> TabStrategy {
        self.tab_strategy
    }
}

/// Fluent builder for [`RelayConfig`]
#[derive(Debug, Clone)]
pub struct RelayConfigBuilder {
    registry_url: Option<String>,
    chat_url_base: Option<String>,
    headless: bool,
    tab_load_timeout: Duration,
    worker_timeout: Duration,
    ready_timeout: Duration,
    inter_task_delay: Duration,
    inter_link_delay: Duration,
    pending_max_age: Duration,
    sweep_interval: Duration,
    close_grace: Duration,
    max_batch_size: usize,
    tab_strategy: TabStrategy,
}

impl Default for RelayConfigBuilder {
    fn default() -> Self {
        Self {
            registry_url: None,
            chat_url_base: None,
            headless: true,
            tab_load_timeout: DEFAULT_TAB_LOAD_TIMEOUT,
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            inter_task_delay: DEFAULT_INTER_TASK_DELAY,
            inter_link_delay: DEFAULT_INTER_LINK_DELAY,
            pending_max_age: DEFAULT_PENDING_MAX_AGE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            close_grace: DEFAULT_CLOSE_GRACE,
            max_batch_size: MAX_BATCH_SIZE,
            tab_strategy: TabStrategy::SharedTab,
        }
    }
}

impl RelayConfigBuilder {
    #[must_use]
    pub fn registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn chat_url_base(mut self, url: impl Into<String>) -> Self {
        self.chat_url_base = Some(url.into());
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn tab_load_timeout(mut self, timeout: Duration) -> Self {
        self.tab_load_timeout = timeout;
        self
    }

    #[must_use]
    pub fn worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = timeout;
        self
    }

    #[must_use]
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    #[must_use]
    pub fn inter_task_delay(mut self, delay: Duration) -> Self {
        self.inter_task_delay = delay;
        self
    }

    #[must_use]
    pub fn inter_link_delay(mut self, delay: Duration) -> Self {
        self.inter_link_delay = delay;
        self
    }

    #[must_use]
    pub fn pending_max_age(mut self, age: Duration) -> Self {
        self.pending_max_age = age;
        self
    }

    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    #[must_use]
    pub fn max_batch_size(mut self, cap: usize) -> Self {
        self.max_batch_size = cap;
        self
    }

    #[must_use]
    pub fn tab_strategy(mut self, strategy: TabStrategy) -> Self {
        self.tab_strategy = strategy;
        self
    }

    /// Validate and build the config.
    ///
    /// # Errors
    ///
    /// Fails when a required URL is missing or not http(s), when the batch
    /// cap is zero, or when a disposable-tab window of zero is requested.
    pub fn build(self) -> Result<RelayConfig> {
        let registry_url = self
            .registry_url
            .ok_or_else(|| anyhow!("registry_url is required"))?;
        let chat_url_base = self
            .chat_url_base
            .ok_or_else(|| anyhow!("chat_url_base is required"))?;

        for (name, value) in [
            ("registry_url", &registry_url),
            ("chat_url_base", &chat_url_base),
        ] {
            let parsed =
                url::Url::parse(value).map_err(|e| anyhow!("Invalid {name} '{value}': {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!("{name} must be http(s), got '{value}'"));
            }
        }

        if self.max_batch_size == 0 {
            return Err(anyhow!("max_batch_size must be positive"));
        }
        if let TabStrategy::DisposableTabs { window } = self.tab_strategy
            && window == 0
        {
            return Err(anyhow!("disposable-tab window must be positive"));
        }

        Ok(RelayConfig {
            registry_url: registry_url.trim_end_matches('/').to_string(),
            chat_url_base: chat_url_base.trim_end_matches('/').to_string(),
            headless: self.headless,
            tab_load_timeout: self.tab_load_timeout,
            worker_timeout: self.worker_timeout,
            ready_timeout: self.ready_timeout,
            inter_task_delay: self.inter_task_delay,
            inter_link_delay: self.inter_link_delay,
            pending_max_age: self.pending_max_age,
            sweep_interval: self.sweep_interval,
            close_grace: self.close_grace,
            max_batch_size: self.max_batch_size,
            tab_strategy: self.tab_strategy,
        })
    }
}

/// Default window size used when callers ask for disposable tabs without
/// picking a width.
#[must_use]
pub fn default_fanout_window() -> usize {
    DEFAULT_FANOUT_WINDOW
}
