//! Research orchestrator implementation.
//!
//! One orchestrator owns one session at a time, together with the fetch
//! cache and rate limiter that session uses. Rounds never overlap: round
//! N+1 starts only after round N's refinement has returned.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ExtractorConfig, SearchConfig};
use crate::fetcher::{ContentExtractor, ContentFetcher, FetchCache, ScrapingResult};
use crate::metrics::{REFINEMENT_REQUESTS, ROUNDS_STARTED, ROUND_RESULTS, SESSIONS_FINISHED};
use crate::refiner::{
    Refinement, RefinementError, RefinementRequest, Refiner, ResultDigest, DEFAULT_EXCERPT_CHARS,
};
use crate::resolver::{ResolveOptions, SearchBackend, SearchResolver};
use crate::scheduler::BatchScheduler;
use crate::target::{ResolvedUrl, SearchTarget, TargetClassifier};
use crate::throttle::{with_timeout, RateLimiter, RetryPolicy};

use super::config::ResearchConfig;
use super::events::ResearchEvent;
use super::types::{
    IterationSummary, ResearchError, ResearchIteration, ResearchOutcome, ResearchParams,
    SessionSnapshot, SessionState,
};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

/// The external services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn SearchBackend>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub refiner: Arc<dyn Refiner>,
}

/// Mutable session state. Only the running session writes to it.
#[derive(Default)]
struct Session {
    state: SessionState,
    iteration: u32,
    results: Vec<ScrapingResult>,
    history: Vec<ResearchIteration>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

/// Drives a research session through resolve, fetch and review rounds.
pub struct ResearchOrchestrator {
    id: String,
    config: ResearchConfig,
    classifier: TargetClassifier,
    search: Arc<dyn SearchBackend>,
    resolver: SearchResolver,
    fetcher: ContentFetcher,
    refiner: Arc<dyn Refiner>,
    retry: RetryPolicy,

    // Runtime state
    session: RwLock<Session>,
    cancel: RwLock<CancellationToken>,
    running: AtomicBool,
    events: broadcast::Sender<ResearchEvent>,
}

impl ResearchOrchestrator {
    /// Create an orchestrator with its own cache and rate limiter.
    pub fn new(config: ResearchConfig, collaborators: Collaborators) -> Self {
        let retry = RetryPolicy::new(config.retry.clone());
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let cache = Arc::new(FetchCache::new());
        let resolver =
            SearchResolver::new(collaborators.search.clone()).with_retry(retry.clone());
        let fetcher =
            ContentFetcher::new(collaborators.extractor, limiter, cache).with_retry(retry.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            id: Uuid::new_v4().to_string(),
            classifier: TargetClassifier::new(&config.extra_tlds),
            config,
            search: collaborators.search,
            resolver,
            fetcher,
            refiner: collaborators.refiner,
            retry,
            session: RwLock::new(Session::default()),
            cancel: RwLock::new(CancellationToken::new()),
            running: AtomicBool::new(false),
            events,
        }
    }

    /// Apply the host rules, fallbacks and limits of the search section.
    pub fn with_search_config(mut self, search: &SearchConfig) -> Self {
        self.resolver = SearchResolver::from_config(self.search.clone(), search, self.retry.clone());
        let rules = self.resolver.block_rules().to_vec();
        self.fetcher = self.fetcher.with_block_rules(rules);
        self
    }

    /// Apply the page limit and formats of the extractor section.
    pub fn with_extractor_config(mut self, extractor: &ExtractorConfig) -> Self {
        self.fetcher = self
            .fetcher
            .with_page_limit(extractor.page_limit)
            .with_formats(extractor.formats.clone());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to progress events. Lagging subscribers miss events; the
    /// session itself is never slowed down.
    pub fn subscribe(&self) -> broadcast::Receiver<ResearchEvent> {
        self.events.subscribe()
    }

    /// Ask the running session to stop at the next unit-of-work boundary.
    ///
    /// In-flight fetches finish or time out on their own. A cancel issued
    /// before the first run applies to that run; once a session has
    /// finished there is nothing to cancel and the call is ignored.
    pub async fn cancel(&self) {
        let token = self.cancel.read().await;
        if !self.is_running() && self.session.read().await.state.is_terminal() {
            debug!(session_id = %self.id, "Cancel ignored, no session running");
            return;
        }
        if !token.is_cancelled() {
            info!(session_id = %self.id, "Cancel requested");
            token.cancel();
        }
    }

    /// Drop results, history, cache and limiter state and clear the cancel
    /// flag. Refused while a session is running.
    pub async fn reset(&self) -> Result<(), ResearchError> {
        if self.is_running() {
            return Err(ResearchError::AlreadyRunning);
        }
        *self.cancel.write().await = CancellationToken::new();
        self.fetcher.cache().clear().await;
        self.fetcher.limiter().reset().await;
        *self.session.write().await = Session::default();
        info!(session_id = %self.id, "Session reset");
        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        self.session.read().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.read().await;
        SessionSnapshot {
            session_id: self.id.clone(),
            state: session.state,
            iteration: session.iteration,
            max_iterations: self.config.max_iterations,
            result_count: session.results.len(),
            started_at: session.started_at,
            finished_at: session.finished_at,
            error: session.error.clone(),
            iterations: session.history.iter().map(IterationSummary::from).collect(),
        }
    }

    /// Everything accumulated so far, in fetch submission order.
    pub async fn results(&self) -> Vec<ScrapingResult> {
        self.session.read().await.results.clone()
    }

    pub async fn history(&self) -> Vec<ResearchIteration> {
        self.session.read().await.history.clone()
    }

    /// Run a session to a terminal state.
    ///
    /// Results from a previous session are discarded; the fetch cache is
    /// kept until `reset()`. On error the partial results stay available
    /// through `results()` and `history()`.
    pub async fn run(&self, params: ResearchParams) -> Result<ResearchOutcome, ResearchError> {
        let targets: Vec<String> = params
            .search_targets
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if targets.is_empty() {
            return Err(ResearchError::NoTargets);
        }
        // Held across the swap so a concurrent cancel() lands on this
        // session's token.
        let cancel = {
            let mut token = self.cancel.write().await;
            if self.running.swap(true, Ordering::SeqCst) {
                return Err(ResearchError::AlreadyRunning);
            }
            if self.session.read().await.state.is_terminal() {
                *token = CancellationToken::new();
            }
            token.clone()
        };
        *self.session.write().await = Session {
            started_at: Some(Utc::now()),
            ..Session::default()
        };

        info!(
            session_id = %self.id,
            targets = targets.len(),
            goals = params.research_goals.len(),
            max_iterations = self.config.max_iterations,
            "Starting research session"
        );
        self.emit(ResearchEvent::SessionStarted {
            session_id: self.id.clone(),
            targets: targets.clone(),
        });

        // The session deadline behaves exactly like cancel().
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = self.config.session_timeout().map(|timeout| {
            let cancel = cancel.clone();
            let timed_out = timed_out.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        timed_out.store(true, Ordering::SeqCst);
                        cancel.cancel();
                    }
                }
            })
        });

        let result = self.run_rounds(targets, &params, &cancel).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        let timeout_error = timed_out
            .load(Ordering::SeqCst)
            .then(|| ResearchError::SessionTimeout(self.config.session_timeout().unwrap_or_default()));

        let (state, error) = match &result {
            Ok(state) => (*state, timeout_error.as_ref().map(|e| e.to_string())),
            Err(e) => (SessionState::Failed, Some(e.to_string())),
        };
        self.finish(state, error).await;

        match (result, timeout_error) {
            (Err(e), _) => Err(e),
            (Ok(_), Some(e)) => Err(e),
            (Ok(state), None) => Ok(self.outcome(state).await),
        }
    }

    async fn finish(&self, state: SessionState, error: Option<String>) {
        self.set_state(state).await;
        let (iterations, total_results) = {
            let mut session = self.session.write().await;
            session.finished_at = Some(Utc::now());
            session.error = error.clone();
            (session.iteration, session.results.len())
        };

        SESSIONS_FINISHED.with_label_values(&[state.as_str()]).inc();
        match &error {
            Some(error) => warn!(
                session_id = %self.id,
                %state,
                iterations,
                total_results,
                error = %error,
                "Research session ended with error"
            ),
            None => info!(
                session_id = %self.id,
                %state,
                iterations,
                total_results,
                "Research session finished"
            ),
        }
        self.emit(ResearchEvent::SessionFinished {
            session_id: self.id.clone(),
            state,
            iterations,
            total_results,
            error,
        });
        self.running.store(false, Ordering::SeqCst);
    }

    async fn outcome(&self, state: SessionState) -> ResearchOutcome {
        let session = self.session.read().await;
        ResearchOutcome {
            session_id: self.id.clone(),
            state,
            iterations: session.iteration,
            results: session.results.clone(),
            history: session.history.clone(),
            final_analysis: session
                .history
                .iter()
                .rev()
                .find_map(|i| i.analysis.clone()),
        }
    }

    async fn run_rounds(
        &self,
        mut targets: Vec<String>,
        params: &ResearchParams,
        cancel: &CancellationToken,
    ) -> Result<SessionState, ResearchError> {
        let context = params
            .context
            .clone()
            .or_else(|| self.config.research_context.clone());
        let opts = ResolveOptions::new(self.config.max_urls_per_target)
            .with_date_window(
                params
                    .date_window
                    .clone()
                    .or_else(|| self.config.date_window.clone()),
            )
            .with_context(context.clone());
        let scheduler = BatchScheduler::new(self.config.batch_size, self.config.inter_batch_delay());
        let mut iteration = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(SessionState::Canceled);
            }

            iteration += 1;
            let started_at = Utc::now();
            let round_targets: Vec<SearchTarget> =
                targets.iter().map(|t| self.classifier.target(t)).collect();

            self.session.write().await.iteration = iteration;
            self.set_state(SessionState::Resolving).await;
            ROUNDS_STARTED.inc();
            info!(
                session_id = %self.id,
                iteration,
                targets = round_targets.len(),
                "Round started"
            );
            self.emit(ResearchEvent::RoundStarted {
                iteration,
                targets: targets.clone(),
            });

            let urls = self
                .resolve_round(iteration, &round_targets, &opts, cancel)
                .await;

            let round_results = if cancel.is_cancelled() {
                Vec::new()
            } else {
                self.set_state(SessionState::Fetching).await;
                self.fetch_round(iteration, urls, &scheduler, cancel).await
            };
            ROUND_RESULTS.observe(round_results.len() as f64);

            let total_results = {
                let mut session = self.session.write().await;
                session.results.extend(round_results.iter().cloned());
                session.results.len()
            };

            let mut record = ResearchIteration {
                iteration,
                targets: round_targets,
                results: round_results,
                analysis: None,
                extraction_focus: None,
                improved_targets: None,
                started_at,
                finished_at: started_at,
            };

            if cancel.is_cancelled() {
                self.push_history(record).await;
                return Ok(SessionState::Canceled);
            }

            self.set_state(SessionState::Reviewing).await;
            let refinement = match self
                .refine(iteration, &targets, &params.research_goals, context.clone(), cancel)
                .await
            {
                Ok(refinement) => refinement,
                Err(source) => {
                    self.push_history(record).await;
                    if cancel.is_cancelled() {
                        return Ok(SessionState::Canceled);
                    }
                    return Err(ResearchError::Refinement { iteration, source });
                }
            };

            info!(
                session_id = %self.id,
                iteration,
                results = record.results.len(),
                total_results,
                improved_targets = refinement.improved_targets.len(),
                "Round finished"
            );
            self.emit(ResearchEvent::RoundFinished {
                iteration,
                results: record.results.len(),
                total_results,
                improved_targets: refinement.improved_targets.clone(),
            });

            record.analysis = Some(refinement.analysis);
            record.extraction_focus = refinement.extraction_focus;
            record.improved_targets = Some(refinement.improved_targets.clone());
            self.push_history(record).await;

            if cancel.is_cancelled() {
                return Ok(SessionState::Canceled);
            }
            if refinement.improved_targets.is_empty() {
                return Ok(SessionState::Done);
            }
            if iteration >= self.config.max_iterations {
                return Ok(SessionState::Exhausted);
            }
            if total_results >= self.config.max_results_total {
                info!(
                    session_id = %self.id,
                    total_results,
                    "Result cap reached, not starting another round"
                );
                return Ok(SessionState::Exhausted);
            }
            targets = refinement.improved_targets;
        }
    }

    /// Resolve every target of a round, skipping the ones that fail.
    ///
    /// URLs are deduplicated across the round and against results already
    /// accumulated in earlier rounds.
    async fn resolve_round(
        &self,
        iteration: u32,
        targets: &[SearchTarget],
        opts: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Vec<ResolvedUrl> {
        let mut seen: HashSet<String> = self
            .session
            .read()
            .await
            .results
            .iter()
            .map(|r| r.url.clone())
            .collect();
        let mut urls = Vec::new();
        let mut searched = false;
        let delay = self.config.inter_target_delay();

        for target in targets {
            if searched && target.kind.needs_search() && !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                debug!(session_id = %self.id, iteration, "Cancelled during resolution");
                break;
            }
            searched |= target.kind.needs_search();

            match self.resolver.resolve_target(target, opts, cancel).await {
                Ok(resolved) => {
                    let before = urls.len();
                    urls.extend(
                        resolved
                            .into_iter()
                            .take(self.config.max_urls_per_target)
                            .filter(|u| seen.insert(u.url.clone())),
                    );
                    let added = urls.len() - before;
                    debug!(
                        search_target = %target.text,
                        kind = target.kind.as_str(),
                        urls = added,
                        "Target resolved"
                    );
                    self.emit(ResearchEvent::TargetResolved {
                        iteration,
                        target: target.text.clone(),
                        kind: target.kind,
                        urls: added,
                    });
                }
                Err(e) => {
                    warn!(
                        search_target = %target.text,
                        error = %e,
                        "Resolution failed, skipping target"
                    );
                    self.emit(ResearchEvent::TargetSkipped {
                        iteration,
                        target: target.text.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        urls
    }

    /// Fetch a round's URLs in batches, stopping at the session result cap.
    async fn fetch_round(
        &self,
        iteration: u32,
        urls: Vec<ResolvedUrl>,
        scheduler: &BatchScheduler,
        cancel: &CancellationToken,
    ) -> Vec<ScrapingResult> {
        let accumulated = self.session.read().await.results.len();
        let remaining = self.config.max_results_total.saturating_sub(accumulated);
        if urls.is_empty() || remaining == 0 {
            return Vec::new();
        }

        let timeout = self.config.per_fetch_timeout();
        let fetcher = &self.fetcher;
        let outcome = scheduler
            .run_batches(
                urls,
                cancel,
                Some(remaining),
                |url: ResolvedUrl| async move { fetcher.fetch(&url, timeout, cancel).await },
                |report| {
                    self.emit(ResearchEvent::BatchCompleted {
                        iteration,
                        index: report.index,
                        total_batches: report.total_batches,
                        succeeded: report.succeeded,
                        failed: report.failed,
                    })
                },
            )
            .await;

        debug!(
            session_id = %self.id,
            iteration,
            batches = outcome.batches_run,
            results = outcome.results.len(),
            failures = outcome.failures,
            stopped_early = outcome.stopped_early,
            "Fetching finished"
        );
        outcome.results
    }

    async fn refine(
        &self,
        iteration: u32,
        targets: &[String],
        goals: &[String],
        context: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Refinement, RefinementError> {
        let request = RefinementRequest {
            search_targets: targets.to_vec(),
            current_results: self
                .session
                .read()
                .await
                .results
                .iter()
                .map(|r| ResultDigest::from_result(r, DEFAULT_EXCERPT_CHARS))
                .collect(),
            research_goals: goals.to_vec(),
            iteration,
            context,
        };

        let timeout = self.config.refinement_timeout();
        let result = self
            .retry
            .execute("refine", cancel, || {
                with_timeout(timeout, self.refiner.refine(&request), || {
                    RefinementError::Timeout(timeout)
                })
            })
            .await;

        match &result {
            Ok(refinement) => {
                REFINEMENT_REQUESTS.with_label_values(&["success"]).inc();
                debug!(
                    refiner = self.refiner.name(),
                    iteration,
                    improved_targets = refinement.improved_targets.len(),
                    "Refinement received"
                );
            }
            Err(e) => {
                REFINEMENT_REQUESTS.with_label_values(&["error"]).inc();
                warn!(refiner = self.refiner.name(), iteration, error = %e, "Refinement failed");
            }
        }
        result
    }

    async fn push_history(&self, mut record: ResearchIteration) {
        record.finished_at = Utc::now();
        self.session.write().await.history.push(record);
    }

    async fn set_state(&self, to: SessionState) {
        let from = std::mem::replace(&mut self.session.write().await.state, to);
        if from != to {
            debug!(session_id = %self.id, %from, %to, "State changed");
            self.emit(ResearchEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: ResearchEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
