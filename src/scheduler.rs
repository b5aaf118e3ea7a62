//! Analysis request scheduler
//!
//! Turns a stream of edits into at most one authoritative analysis at a
//! time. Each scheduled request gets a fresh [`RequestId`] and its own
//! `CancellationToken`; scheduling again cancels the previous one. Results
//! travel back over a channel and are delivered only if they still belong to
//! the current request, so a slow response can never overwrite a newer one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::analysis::{
    AnalysisBackend, AnalysisOptions, AnalysisRequest, AnalysisResult, RequestId, RetryPolicy,
    call_with_retry, parse_analysis,
};
use crate::cache::SuggestionCache;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ValidationError};
use crate::hasher::{cache_key, content_hash};
use crate::lock::mutex_lock;
use crate::quota::{QuotaDecision, QuotaTier, QuotaTracker};

const SOURCE: &str = "scheduler";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// Waiting for the debounce delay
    Pending,
    Analyzing,
    Complete,
    Error,
    Cancelled,
}

#[derive(Debug)]
pub enum AnalysisEvent {
    Completed {
        request_id: RequestId,
        result: AnalysisResult,
        cache_hit: bool,
        /// Backend entries dropped during validation
        dropped_entries: usize,
    },
    Failed {
        request_id: RequestId,
        error: AnalysisError,
    },
}

impl AnalysisEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            AnalysisEvent::Completed { request_id, .. } => *request_id,
            AnalysisEvent::Failed { request_id, .. } => *request_id,
        }
    }
}

/// Collaborators shared by every request.
pub struct AnalysisServices {
    pub backend: Arc<dyn AnalysisBackend>,
    pub quota: QuotaTracker,
    pub cache: Arc<SuggestionCache>,
}

#[derive(Debug)]
struct Shared {
    state: SchedulerState,
    current: Option<RequestId>,
    current_hash: Option<String>,
}

impl Shared {
    fn is_current(&self, request_id: RequestId) -> bool {
        self.current == Some(request_id)
    }
}

/// In-flight handle of the authoritative request
struct InFlight {
    request_id: RequestId,
    token: CancellationToken,
}

pub struct AnalysisScheduler {
    services: Arc<AnalysisServices>,
    identity: String,
    options: AnalysisOptions,
    config: AnalysisConfig,
    retry: RetryPolicy,
    shared: Arc<Mutex<Shared>>,
    in_flight: Option<InFlight>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<AnalysisEvent>,
    events_rx: mpsc::UnboundedReceiver<AnalysisEvent>,
}

impl AnalysisScheduler {
    pub fn new(
        services: Arc<AnalysisServices>,
        identity: impl Into<String>,
        config: AnalysisConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            services,
            identity: identity.into(),
            options: config.options.clone(),
            retry: RetryPolicy::from_config(&config),
            config,
            shared: Arc::new(Mutex::new(Shared {
                state: SchedulerState::Idle,
                current: None,
                current_hash: None,
            })),
            in_flight: None,
            next_id: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> SchedulerState {
        mutex_lock(&self.shared, SOURCE, "state").state
    }

    /// The request whose result will be delivered, if any.
    pub fn current_request(&self) -> Option<RequestId> {
        mutex_lock(&self.shared, SOURCE, "current_request").current
    }

    /// Schedule a debounced real-time analysis of `text`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, text: &str) -> Result<RequestId, ValidationError> {
        let delay = Duration::from_millis(self.config.debounce_ms);
        self.start(text, delay, QuotaTier::RealTime)
    }

    /// Analyze `text` immediately as a full analysis.
    pub fn analyze_now(&mut self, text: &str) -> Result<RequestId, ValidationError> {
        self.start(text, Duration::ZERO, QuotaTier::FullAnalysis)
    }

    /// Forget the current request. A running backend call may still finish,
    /// but its result is discarded.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            log::debug!("Cancelling analysis request {}", in_flight.request_id);
            in_flight.token.cancel();
        }

        let mut shared = mutex_lock(&self.shared, SOURCE, "cancel");
        shared.current = None;
        shared.current_hash = None;
        shared.state = SchedulerState::Cancelled;
    }

    /// Wait for the current request's outcome.
    ///
    /// Returns `None` when nothing is in flight. Stale outcomes are skipped.
    pub async fn next_event(&mut self) -> Option<AnalysisEvent> {
        loop {
            if self.current_request().is_none() {
                return None;
            }
            let event = self.events_rx.recv().await?;
            if let Some(event) = self.deliver(event) {
                return Some(event);
            }
        }
    }

    /// Non-blocking variant of [`next_event`](Self::next_event) for UI loops.
    pub fn try_next_event(&mut self) -> Option<AnalysisEvent> {
        while let Ok(event) = self.events_rx.try_recv() {
            if let Some(event) = self.deliver(event) {
                return Some(event);
            }
        }
        None
    }

    fn deliver(&mut self, event: AnalysisEvent) -> Option<AnalysisEvent> {
        let request_id = event.request_id();
        let mut shared = mutex_lock(&self.shared, SOURCE, "deliver");

        if !shared.is_current(request_id) {
            log::debug!("Discarding stale analysis event for {}", request_id);
            return None;
        }

        shared.state = SchedulerState::Idle;
        shared.current = None;
        shared.current_hash = None;
        self.in_flight = None;
        Some(event)
    }

    fn start(
        &mut self,
        text: &str,
        delay: Duration,
        tier: QuotaTier,
    ) -> Result<RequestId, ValidationError> {
        validate_text(text, self.config.max_text_chars)?;
        let hash = content_hash(text, &self.options);

        {
            let shared = mutex_lock(&self.shared, SOURCE, "start.dedup");
            if shared.state == SchedulerState::Analyzing
                && shared.current_hash.as_deref() == Some(hash.as_str())
            {
                if let Some(current) = shared.current {
                    log::debug!("Identical content already analyzing as {}", current);
                    return Ok(current);
                }
            }
        }

        if let Some(previous) = self.in_flight.take() {
            log::debug!("Superseding analysis request {}", previous.request_id);
            previous.token.cancel();
        }

        self.next_id = self.next_id.wrapping_add(1);
        let request_id = RequestId(self.next_id);
        let token = CancellationToken::new();

        {
            let mut shared = mutex_lock(&self.shared, SOURCE, "start");
            shared.state = SchedulerState::Pending;
            shared.current = Some(request_id);
            shared.current_hash = Some(hash.clone());
        }
        self.in_flight = Some(InFlight {
            request_id,
            token: token.clone(),
        });

        let job = Job {
            services: Arc::clone(&self.services),
            shared: Arc::clone(&self.shared),
            identity: self.identity.clone(),
            request: AnalysisRequest {
                text: text.to_string(),
                options: self.options.clone(),
                request_id,
            },
            hash,
            delay,
            tier,
            retry: self.retry,
            cache_ttl_hours: self.config.cache_ttl_hours,
        };
        let events_tx = self.events_tx.clone();

        log::debug!(
            "Scheduled analysis {} ({:?}, delay {:?})",
            request_id,
            tier,
            delay
        );
        tokio::spawn(async move {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::debug!("Analysis {} cancelled", request_id);
                    return;
                }
                event = job.run() => event,
            };

            if token.is_cancelled() || !job.finish(&event) {
                log::debug!("Analysis {} finished after being superseded", request_id);
                return;
            }
            let _ = events_tx.send(event);
        });

        Ok(request_id)
    }
}

/// Reject text that must never reach the backend.
pub fn validate_text(text: &str, max_chars: usize) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let length = text.chars().count();
    if length > max_chars {
        return Err(ValidationError::TooLong {
            length,
            limit: max_chars,
        });
    }
    Ok(())
}

/// Everything one request needs once it leaves the scheduler
struct Job {
    services: Arc<AnalysisServices>,
    shared: Arc<Mutex<Shared>>,
    identity: String,
    request: AnalysisRequest,
    hash: String,
    delay: Duration,
    tier: QuotaTier,
    retry: RetryPolicy,
    cache_ttl_hours: u64,
}

impl Job {
    async fn run(&self) -> AnalysisEvent {
        let request_id = self.request.request_id;
        match self.analyze().await {
            Ok((result, cache_hit, dropped_entries)) => AnalysisEvent::Completed {
                request_id,
                result,
                cache_hit,
                dropped_entries,
            },
            Err(error) => {
                log::debug!("Analysis {} failed: {}", request_id, error);
                AnalysisEvent::Failed { request_id, error }
            }
        }
    }

    async fn analyze(&self) -> Result<(AnalysisResult, bool, usize), AnalysisError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.set_state(SchedulerState::Analyzing);

        let cost = self.request.text.chars().count() as u64;
        let decision = self
            .services
            .quota
            .check_and_consume(&self.identity, cost, self.tier)
            .await;
        if let QuotaDecision::Denied {
            retry_after_secs, ..
        } = decision
        {
            return Err(AnalysisError::QuotaExceeded { retry_after_secs });
        }

        let key = cache_key(&self.hash);
        if let Some(result) = self.services.cache.get(&key).await {
            log::debug!("Analysis {} served from cache", self.request.request_id);
            return Ok((result, true, 0));
        }

        let raw = call_with_retry(self.services.backend.as_ref(), &self.request, &self.retry).await?;
        let parsed = parse_analysis(&raw);
        if parsed.is_parsed() {
            self.services
                .cache
                .set(&key, &parsed.result, self.cache_ttl_hours)
                .await;
        } else {
            log::warn!(
                "Backend payload for {} could not be parsed, not caching",
                self.request.request_id
            );
        }

        Ok((parsed.result, false, parsed.dropped))
    }

    fn set_state(&self, state: SchedulerState) {
        let mut shared = mutex_lock(&self.shared, SOURCE, "job.set_state");
        if shared.is_current(self.request.request_id) {
            shared.state = state;
        }
    }

    /// Record the terminal state. Returns `false` if the request is no longer current.
    fn finish(&self, event: &AnalysisEvent) -> bool {
        let mut shared = mutex_lock(&self.shared, SOURCE, "job.finish");
        if !shared.is_current(self.request.request_id) {
            return false;
        }
        shared.state = match event {
            AnalysisEvent::Completed { .. } => SchedulerState::Complete,
            AnalysisEvent::Failed { .. } => SchedulerState::Error,
        };
        true
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
