//! hirescrape — chat-send queue and resume HTML extraction orchestrator.
//!
//! Two cores, glued by a browser automation surface and a REST registry:
//!
//! - [`send_queue::SendOrchestrator`]: a single-consumer FIFO of outbound
//!   chat messages, delivered tab-by-tab via a readiness handshake.
//! - [`extractor::BatchExtractor`]: drains pending resume links from the
//!   registry, fetches each page's HTML through a controlled tab, and
//!   persists the cleaned content with partial-failure accounting.
//!
//! The automation surface is a trait ([`automation::PageAutomation`]); the
//! chromiumoxide-backed implementation lives in [`automation::chrome`] and
//! tests substitute scripted mocks.

pub mod automation;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod extractor;
pub mod registry;
pub mod send_queue;
pub mod util;
pub mod worker;

pub use automation::chrome::ChromeAutomation;
pub use automation::{AutomationError, PageAutomation, TabId};
pub use cleaner::{CleanedHtml, clean_html};
pub use config::{RelayConfig, RelayConfigBuilder, TabStrategy};
pub use error::{RelayError, RelayResult};
pub use extractor::{BatchExtractor, ExtractionOutcome, LinkError};
pub use registry::{ExtractionLink, RegistryClient, ResumeHtmlRecord};
pub use send_queue::{Accepted, PendingDelivery, SendMode, SendOrchestrator, SendTask};
pub use worker::{ChatEntry, ReadyAnnouncement, WorkerRequest, WorkerResponse};
