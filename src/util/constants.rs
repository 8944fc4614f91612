//! Shared configuration constants for hirescrape
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

use std::time::Duration;

/// Default timeout for a tab to report load-complete: 10 seconds
///
/// Load-complete signals are unreliable on single-page apps, so this is a
/// fallback bound, not a failure condition. When it elapses the caller
/// proceeds anyway and relies on the worker readiness handshake.
pub const DEFAULT_TAB_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a worker protocol round-trip: 15 seconds
///
/// Every cross-context message must be bounded; an unanswered request is
/// treated as a failure for that single task or link.
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(15);

/// Default time to wait for a page's worker context to announce readiness:
/// 30 seconds
///
/// Readiness requires the conversation page to render its composer, which on
/// a slow single-page app can lag well behind the load event. A delivery
/// whose page never becomes ready is abandoned to the sweep.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between consecutive send tasks: 1 second
///
/// Deliberate backpressure so rapid navigations do not overwhelm the target
/// site or trip its anti-automation defenses.
pub const DEFAULT_INTER_TASK_DELAY: Duration = Duration::from_secs(1);

/// Delay between extraction links within a batch: 1 second
///
/// Same rationale as the send-queue pacing.
pub const DEFAULT_INTER_LINK_DELAY: Duration = Duration::from_secs(1);

/// Maximum age of a pending delivery before the sweep drops it: 1 hour
///
/// Tabs that never announce readiness would otherwise accumulate entries
/// forever.
pub const DEFAULT_PENDING_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Interval between pending-delivery sweeps: 5 minutes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Grace delay before closing a background tab after a successful send: 2 seconds
///
/// Gives the page time to finish its own post-send requests before the tab
/// disappears.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Hard cap on links per extraction batch: 1000
///
/// Bounds worst-case runtime of a single `run_batch` call.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Default window size for the disposable-tab extraction strategy: 3 tabs
pub const DEFAULT_FANOUT_WINDOW: usize = 3;

/// Maximum number of error samples carried in an extraction outcome
pub const MAX_ERROR_SAMPLES: usize = 5;
