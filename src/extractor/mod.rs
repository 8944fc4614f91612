//! Resume batch extraction.
//!
//! Drains a bounded number of pending resume links from the registry,
//! fetches each resource's HTML through a controlled tab, persists the
//! cleaned content, and reports an aggregate outcome with partial-failure
//! detail.
//!
//! Failure isolation is the governing rule: one bad link degrades the
//! outcome, never the run. Only the very first step (listing the backlog)
//! can fail the whole call, because at that point nothing has been
//! attempted. Tabs opened here are closed on every path; tab leakage under
//! repeated failures is the failure mode this module is built to avoid.

pub mod outcome;

use anyhow::{Context, Result, anyhow};
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::automation::{PageAutomation, TabId};
use crate::cleaner::clean_html;
use crate::config::{RelayConfig, TabStrategy};
use crate::error::{RelayError, RelayResult};
use crate::registry::{ExtractionLink, RegistryClient, ResumeHtmlRecord};
use crate::util::extract_resume_id;
use crate::worker::{WorkerRequest, WorkerResponse};

pub use outcome::{ExtractionOutcome, LinkError};

/// Pulls pending resume links and extracts their HTML through browser tabs
pub struct BatchExtractor {
    automation: Arc<dyn PageAutomation>,
    registry: RegistryClient,
    config: RelayConfig,
}

impl BatchExtractor {
    #[must_use]
    pub fn new(
        automation: Arc<dyn PageAutomation>,
        registry: RegistryClient,
        config: RelayConfig,
    ) -> Self {
        Self {
            automation,
            registry,
            config,
        }
    }

    /// Process up to `requested` pending links and report the outcome.
    ///
    /// An empty backlog is a normal terminal condition and yields an
    /// all-zero outcome without any tab operation. Failed links are marked
    /// processed with their error and are not retried; re-running the batch
    /// manually is the recovery path.
    ///
    /// # Errors
    ///
    /// Fails only when the initial backlog listing fails (registry
    /// unreachable) — nothing has been attempted at that point. Every later
    /// failure is scoped to its link.
    pub async fn run_batch(&self, requested: usize) -> RelayResult<ExtractionOutcome> {
        if requested == 0 {
            return Err(RelayError::Config("batch size must be positive".into()));
        }
        let capped = requested.min(self.config.max_batch_size());
        if capped < requested {
            warn!(
                "Requested batch of {requested} capped to {capped} (configured maximum)"
            );
        }

        let links = self
            .registry
            .list_unprocessed(capped)
            .await
            .map_err(|e| RelayError::Registry(format!("{e:#}")))?;

        let mut outcome = ExtractionOutcome::new(requested);
        if links.is_empty() {
            info!("No unprocessed resume links, nothing to do");
            return Ok(outcome);
        }
        info!("Extracting {} resume links", links.len());

        match self.config.tab_strategy() {
            TabStrategy::SharedTab => self.run_shared_tab(&links, &mut outcome).await,
            TabStrategy::DisposableTabs { window } => {
                self.run_disposable_tabs(&links, window, &mut outcome).await;
            }
        }

        info!(
            "Batch done: {} processed, {} succeeded, {} failed",
            outcome.processed, outcome.succeeded, outcome.failed
        );
        Ok(outcome)
    }

    /// Serial strategy: one tab reused for every link, O(1) tabs no matter
    /// the batch size.
    async fn run_shared_tab(&self, links: &[ExtractionLink], outcome: &mut ExtractionOutcome) {
        let tab = match self.automation.create_tab("about:blank", false).await {
            Ok(tab) => tab,
            Err(e) => {
                // The listing already succeeded, so this failure belongs to
                // the links, not to the whole call.
                warn!("Could not open the shared extraction tab: {e}");
                for link in links {
                    self.finish_link(
                        link,
                        Err(anyhow!("Could not open the shared extraction tab: {e}")),
                        outcome,
                    )
                    .await;
                }
                return;
            }
        };

        for (index, link) in links.iter().enumerate() {
            let result = self.process_link(tab, link, true).await;
            self.finish_link(link, result, outcome).await;

            if index + 1 < links.len() {
                tokio::time::sleep(self.config.inter_link_delay()).await;
            }
        }

        // The tab is ours; close it no matter how the links went.
        self.automation.close_tab(tab).await;
    }

    /// Fan-out strategy: one disposable tab per link, `window` links in
    /// flight at once. Windows complete in order; links within a window are
    /// unordered relative to each other.
    async fn run_disposable_tabs(
        &self,
        links: &[ExtractionLink],
        window: usize,
        outcome: &mut ExtractionOutcome,
    ) {
        let window = window.max(1);
        let total_windows = links.len().div_ceil(window);
        for (window_index, chunk) in links.chunks(window).enumerate() {
            debug!("Processing window {}/{total_windows}", window_index + 1);

            let results = join_all(chunk.iter().map(|link| self.process_disposable(link))).await;
            for (link, result) in chunk.iter().zip(results) {
                self.finish_link(link, result, outcome).await;
            }

            if window_index + 1 < total_windows {
                tokio::time::sleep(self.config.inter_link_delay()).await;
            }
        }
    }

    /// Open a tab for one link, extract, and close the tab on every path.
    async fn process_disposable(&self, link: &ExtractionLink) -> Result<()> {
        // Parse before spending a tab on a link that can never succeed.
        if extract_resume_id(&link.url).is_none() {
            return Err(anyhow!("URL does not contain a resume id: {}", link.url));
        }

        let tab = self
            .automation
            .create_tab(&link.url, false)
            .await
            .context("Failed to open tab")?;
        let result = self.process_link(tab, link, false).await;
        self.automation.close_tab(tab).await;
        result
    }

    /// Per-link pipeline through an already-open tab: navigate (shared tab
    /// only), wait for load, inject, fetch HTML, clean, persist.
    async fn process_link(
        &self,
        tab: TabId,
        link: &ExtractionLink,
        needs_navigation: bool,
    ) -> Result<()> {
        let resume_id = extract_resume_id(&link.url)
            .ok_or_else(|| anyhow!("URL does not contain a resume id: {}", link.url))?;
        debug!("Fetching resume {resume_id} from {} via {tab}", link.url);

        if needs_navigation {
            self.automation
                .navigate(tab, &link.url)
                .await
                .context("Navigation failed")?;
        }
        self.automation
            .wait_for_load(tab, self.config.tab_load_timeout())
            .await;
        self.automation
            .inject(tab)
            .await
            .context("Worker injection failed")?;

        let response = self
            .automation
            .send_to_worker(
                tab,
                WorkerRequest::FetchHtml {
                    url: link.url.clone(),
                },
                self.config.worker_timeout(),
            )
            .await
            .context("Worker fetch-html failed")?;

        let html = match response {
            WorkerResponse::HtmlResult {
                success: true,
                html: Some(html),
                ..
            } => html,
            WorkerResponse::HtmlResult { error, .. } => {
                return Err(anyhow!(
                    "Worker could not fetch HTML: {}",
                    error.unwrap_or_else(|| "no error detail".into())
                ));
            }
            other => return Err(anyhow!("Unexpected worker reply: {other:?}")),
        };

        let cleaned = clean_html(&html);
        debug!(
            "Cleaned resume {resume_id}: {} -> {} bytes (-{}%)",
            cleaned.original_size, cleaned.cleaned_size, cleaned.reduction_percent
        );

        self.registry
            .upsert_html(&ResumeHtmlRecord {
                resume_id,
                source_url: link.url.clone(),
                html_content: cleaned.html,
                original_size: cleaned.original_size,
                cleaned_size: cleaned.cleaned_size,
                reduction_percent: cleaned.reduction_percent,
            })
            .await
            .context("Failed to persist HTML")?;
        Ok(())
    }

    /// Mark the link processed and fold the result into the outcome.
    ///
    /// A link whose extraction succeeded but whose mark-processed call fails
    /// counts as failed: the registry would hand it out again next batch,
    /// and the upsert makes the re-extraction harmless.
    async fn finish_link(
        &self,
        link: &ExtractionLink,
        result: Result<()>,
        outcome: &mut ExtractionOutcome,
    ) {
        match result {
            Ok(()) => match self.registry.mark_processed(link.id, None).await {
                Ok(()) => outcome.record_success(),
                Err(e) => {
                    warn!("Extracted {} but could not mark it processed: {e:#}", link.url);
                    outcome.record_failure(&link.url, &format!("mark-processed failed: {e:#}"));
                }
            },
            Err(error) => {
                let message = format!("{error:#}");
                warn!("Link {} failed: {message}", link.url);
                if let Err(e) = self
                    .registry
                    .mark_processed(link.id, Some(&message))
                    .await
                {
                    warn!("Could not record failure for {}: {e:#}", link.url);
                }
                outcome.record_failure(&link.url, &message);
            }
        }
    }
}
