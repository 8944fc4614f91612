//! HTTP client for the resource registry.
//!
//! The registry is a small REST service in front of the relational store. It
//! owns the backlog of resume links and the extracted HTML. This client
//! covers the endpoints the relay depends on:
//! - `GET /links/unprocessed?limit=N`
//! - `POST /links/:id/processed`
//! - `POST /resource/html` (upsert by resume id)
//! - `GET /health`

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A candidate resume link owned by the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionLink {
    pub id: i64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnprocessedLinksBody {
    links: Vec<ExtractionLink>,
}

/// Payload for the HTML upsert endpoint.
///
/// Re-submitting the same `resume_id` overwrites the prior content; the size
/// fields travel along so the registry can track cleaning effectiveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeHtmlRecord {
    #[serde(rename = "resourceId")]
    pub resume_id: String,
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
    #[serde(rename = "htmlContent")]
    pub html_content: String,
    #[serde(rename = "originalSize")]
    pub original_size: usize,
    #[serde(rename = "cleanedSize")]
    pub cleaned_size: usize,
    #[serde(rename = "reductionPercent")]
    pub reduction_percent: u8,
}

#[derive(Debug, Serialize)]
struct MarkProcessedBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Client for the registry REST surface
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url`.
    ///
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build registry HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Fetch up to `limit` unprocessed links, oldest first.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or non-2xx responses; the caller treats
    /// this as fatal for the whole batch since nothing was attempted yet.
    pub async fn list_unprocessed(&self, limit: usize) -> Result<Vec<ExtractionLink>> {
        let url = format!("{}/links/unprocessed", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await
            .context("Failed to reach registry for unprocessed links")?
            .error_for_status()
            .context("Registry rejected unprocessed-links request")?;

        let body: UnprocessedLinksBody = response
            .json()
            .await
            .context("Failed to decode unprocessed-links response")?;
        debug!("Registry returned {} unprocessed links", body.links.len());
        Ok(body.links)
    }

    /// Mark a link processed, optionally recording the error that failed it.
    ///
    /// Failed links are still marked processed; the registry keeps the error
    /// string and the operator decides whether to re-queue manually.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or non-2xx responses.
    pub async fn mark_processed(&self, link_id: i64, error: Option<&str>) -> Result<()> {
        let url = format!("{}/links/{}/processed", self.base_url, link_id);
        self.http
            .post(&url)
            .json(&MarkProcessedBody { error })
            .send()
            .await
            .with_context(|| format!("Failed to reach registry to mark link {link_id}"))?
            .error_for_status()
            .with_context(|| format!("Registry rejected mark-processed for link {link_id}"))?;
        Ok(())
    }

    /// Upsert extracted HTML for a resume.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or non-2xx responses.
    pub async fn upsert_html(&self, record: &ResumeHtmlRecord) -> Result<()> {
        let url = format!("{}/resource/html", self.base_url);
        self.http
            .post(&url)
            .json(record)
            .send()
            .await
            .with_context(|| {
                format!("Failed to reach registry to store HTML for {}", record.resume_id)
            })?
            .error_for_status()
            .with_context(|| format!("Registry rejected HTML for {}", record.resume_id))?;
        debug!(
            "Stored HTML for resume {} ({} -> {} bytes, -{}%)",
            record.resume_id, record.original_size, record.cleaned_size, record.reduction_percent
        );
        Ok(())
    }

    /// Check that the registry answers at all. Used by the CLI before
    /// starting work so a dead backend fails fast with a clear message.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
