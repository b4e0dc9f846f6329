//! Enrichment Poller
//!
//! Background polling for deferred insights attached to a query result.
//!
//! # Design Philosophy
//!
//! The primary reply is rendered as soon as it arrives. When it carries a
//! `request_id`, insights are generated server-side and this module checks on
//! them at a fixed cadence until they are ready, fail, or the attempt budget
//! runs out. Each job renders exactly one terminal state into the result group
//! it belongs to and never touches conversation history.
//!
//! Two timers run per job:
//! - the poll loop, on `interval` (first check after one interval)
//! - a cosmetic progress ticker cycling [`PROGRESS_PHASES`] on
//!   `progress_interval`, stopped whenever the poll loop stops
//!
//! Jobs are not externally cancellable; they stop only on their own terminal
//! conditions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::backend::{InsightsStatus, QueryBackend};
use crate::error::ChatError;
use crate::presenter::{EnrichmentNotice, GroupRef, Presenter};

/// Default maximum status checks per job
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Default delay between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default progress phase rotation period
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(900);

/// Phases shown while insights are being generated
pub const PROGRESS_PHASES: &[&str] = &[
    "Analyzing results",
    "Finding patterns",
    "Generating insights",
    "Preparing follow-up questions",
];

/// Insights polling settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentConfig {
    /// Maximum status checks before giving up
    pub max_attempts: u32,
    /// Delay between status checks
    pub interval: Duration,
    /// Progress phase rotation period
    pub progress_interval: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// A deferred insights job being tracked
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentJob {
    /// Server-side job handle
    pub request_id: String,
    /// Result group the insights belong to
    pub group: GroupRef,
    /// Status checks made so far
    pub attempts: u32,
    /// Check budget
    pub max_attempts: u32,
}

impl EnrichmentJob {
    /// Create a job with no checks made yet
    #[must_use]
    pub fn new(request_id: impl Into<String>, group: GroupRef, max_attempts: u32) -> Self {
        Self {
            request_id: request_id.into(),
            group,
            attempts: 0,
            max_attempts,
        }
    }

    /// Whether the check budget is spent
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Terminal state of an enrichment job
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Insights were rendered
    Ready {
        /// Insights text (empty when the job produced none)
        insights: String,
        /// Suggested follow-up questions
        follow_up_questions: Vec<String>,
    },
    /// The job reported an error
    Unavailable {
        /// Server-provided reason, if any
        reason: Option<String>,
    },
    /// The check budget ran out
    TimedOut {
        /// Checks made
        attempts: u32,
    },
}

impl EnrichmentOutcome {
    /// The error this outcome represents, if it is not `Ready`
    #[must_use]
    pub fn error(&self) -> Option<ChatError> {
        match self {
            Self::Ready { .. } => None,
            Self::Unavailable { reason } => Some(ChatError::EnrichmentError(
                reason.clone().unwrap_or_else(|| "insights job failed".to_string()),
            )),
            Self::TimedOut { attempts } => Some(ChatError::EnrichmentTimeout {
                attempts: *attempts,
            }),
        }
    }
}

/// Handle to a running enrichment job
#[derive(Debug)]
pub struct EnrichmentHandle {
    request_id: String,
    task: JoinHandle<EnrichmentOutcome>,
}

impl EnrichmentHandle {
    /// Server-side job handle
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the job's terminal state
    pub async fn join(self) -> EnrichmentOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(request_id = %self.request_id, error = %err, "Enrichment task aborted");
                EnrichmentOutcome::Unavailable {
                    reason: Some(err.to_string()),
                }
            }
        }
    }
}

/// Starts enrichment jobs
pub struct EnrichmentPoller<B: QueryBackend> {
    backend: Arc<B>,
    presenter: Arc<dyn Presenter>,
    config: EnrichmentConfig,
}

impl<B: QueryBackend + 'static> EnrichmentPoller<B> {
    /// Create a poller that checks `backend` and renders through `presenter`
    pub fn new(backend: Arc<B>, presenter: Arc<dyn Presenter>, config: EnrichmentConfig) -> Self {
        Self {
            backend,
            presenter,
            config,
        }
    }

    /// Spawn a job for `request_id`, rendering into `group`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request_id: impl Into<String>, group: GroupRef) -> EnrichmentHandle {
        let job = EnrichmentJob::new(request_id, group, self.config.max_attempts);
        let request_id = job.request_id.clone();
        tracing::debug!(request_id = %request_id, ?group, "Starting enrichment job");

        let task = tokio::spawn(run_job(
            Arc::clone(&self.backend),
            Arc::clone(&self.presenter),
            self.config.clone(),
            job,
        ));

        EnrichmentHandle { request_id, task }
    }
}

/// Poll until a terminal state, render it, and return it
async fn run_job<B: QueryBackend>(
    backend: Arc<B>,
    presenter: Arc<dyn Presenter>,
    config: EnrichmentConfig,
    mut job: EnrichmentJob,
) -> EnrichmentOutcome {
    let progress = spawn_progress_ticker(Arc::clone(&presenter), job.group, config.progress_interval);

    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        ticker.tick().await;
        job.attempts += 1;

        match backend.insights_status(&job.request_id).await {
            Ok(InsightsStatus::Ready {
                insights,
                follow_up_questions,
            }) => {
                break EnrichmentOutcome::Ready {
                    insights: insights.unwrap_or_default(),
                    follow_up_questions,
                };
            }
            Ok(InsightsStatus::Error { error }) => {
                break EnrichmentOutcome::Unavailable { reason: error };
            }
            Ok(status) => {
                tracing::debug!(
                    request_id = %job.request_id,
                    attempt = job.attempts,
                    ?status,
                    "Insights not ready"
                );
            }
            Err(err) => {
                tracing::debug!(
                    request_id = %job.request_id,
                    attempt = job.attempts,
                    error = %err,
                    "Insights status check failed"
                );
            }
        }

        if job.is_exhausted() {
            break EnrichmentOutcome::TimedOut {
                attempts: job.attempts,
            };
        }
    };

    drop(progress);

    match outcome {
        EnrichmentOutcome::Ready {
            ref insights,
            ref follow_up_questions,
        } => {
            tracing::info!(
                request_id = %job.request_id,
                attempts = job.attempts,
                follow_ups = follow_up_questions.len(),
                "Insights ready"
            );
            presenter.render_enrichment(job.group, insights, follow_up_questions);
        }
        EnrichmentOutcome::Unavailable { .. } => {
            if let Some(err) = outcome.error() {
                tracing::warn!(request_id = %job.request_id, error = %err, "Insights unavailable");
            }
            presenter.render_enrichment_notice(job.group, EnrichmentNotice::Unavailable);
        }
        EnrichmentOutcome::TimedOut { .. } => {
            if let Some(err) = outcome.error() {
                tracing::warn!(request_id = %job.request_id, error = %err, "Giving up on insights");
            }
            presenter.render_enrichment_notice(job.group, EnrichmentNotice::TookTooLong);
        }
    }

    outcome
}

/// Spawn the progress ticker; dropping the guard stops it
fn spawn_progress_ticker(
    presenter: Arc<dyn Presenter>,
    group: GroupRef,
    period: Duration,
) -> DropGuard {
    let token = CancellationToken::new();
    let stop = token.clone();

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for phase in PROGRESS_PHASES.iter().cycle() {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    if stop.is_cancelled() {
                        break;
                    }
                    presenter.render_enrichment_progress(group, phase);
                }
            }
        }
    });

    token.drop_guard()
}
