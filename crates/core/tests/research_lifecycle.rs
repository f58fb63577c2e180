//! Research session lifecycle integration tests.
//!
//! These tests drive the orchestrator end to end against the mock
//! collaborators: resolve -> fetch -> review, repeated until a terminal state.

use std::sync::Arc;
use std::time::Duration;

use delver_core::{
    config::SearchConfig,
    resolver::SearchResponse,
    testing::{fixtures, MockExtractor, MockRefiner, MockSearchBackend},
    Collaborators, ResearchConfig, ResearchEvent, ResearchOrchestrator, SessionState,
};

/// Test helper holding the mocks behind one orchestrator.
struct TestHarness {
    search: Arc<MockSearchBackend>,
    extractor: Arc<MockExtractor>,
    refiner: Arc<MockRefiner>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            search: Arc::new(MockSearchBackend::new()),
            extractor: Arc::new(MockExtractor::new()),
            refiner: Arc::new(MockRefiner::new()),
        }
    }

    fn orchestrator(&self, config: ResearchConfig) -> ResearchOrchestrator {
        ResearchOrchestrator::new(
            config,
            Collaborators {
                search: self.search.clone(),
                extractor: self.extractor.clone(),
                refiner: self.refiner.clone(),
            },
        )
        .with_search_config(&SearchConfig {
            url: "http://search.test".to_string(),
            ..SearchConfig::default()
        })
    }
}

#[tokio::test]
async fn test_end_to_end_results_keep_their_source_target() {
    let harness = TestHarness::new();
    harness
        .search
        .set_handler(|query| {
            (query == "industry trends 2024").then(|| {
                SearchResponse::from_links([
                    "https://news.example.net/trends",
                    "https://blog.example.org/2024",
                ])
            })
        })
        .await;
    harness
        .extractor
        .set_content("https://example.com/", "Example home page")
        .await;
    harness
        .extractor
        .set_content("https://news.example.net/trends", "Trends for 2024")
        .await;
    // The blog post has nothing configured, so its fetch fails.

    let orchestrator = harness.orchestrator(fixtures::fast_research_config());
    let outcome = orchestrator
        .run(fixtures::research_params(&["example.com", "industry trends 2024"]))
        .await
        .expect("session should finish");

    assert_eq!(outcome.state, SessionState::Done);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(harness.extractor.call_count().await, 3);

    let home = &outcome.results[0];
    assert_eq!(home.url, "https://example.com/");
    assert_eq!(home.source_target, "example.com");

    let trends = &outcome.results[1];
    assert_eq!(trends.url, "https://news.example.net/trends");
    assert_eq!(trends.source_target, "industry trends 2024");

    assert_eq!(outcome.results_for("industry trends 2024").count(), 1);
    assert_eq!(harness.search.request_count().await, 1);
}

#[tokio::test]
async fn test_session_exhausts_after_max_iterations() {
    let harness = TestHarness::new();
    harness.extractor.set_default_content("page").await;
    for round in 0..5 {
        harness
            .refiner
            .push_targets(&[&format!("round{}.com", round)])
            .await;
    }

    let mut config = fixtures::fast_research_config();
    config.max_iterations = 2;
    let orchestrator = harness.orchestrator(config);

    let outcome = orchestrator
        .run(fixtures::research_params(&["start.com"]))
        .await
        .expect("session should finish");

    assert_eq!(outcome.state, SessionState::Exhausted);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.history.len(), 2);
    assert_eq!(harness.refiner.recorded_requests().await.len(), 2);

    // Round 2 used round 1's improved targets; round 3 never started.
    assert_eq!(
        harness.extractor.requested_urls().await,
        vec!["https://start.com/", "https://round0.com/"]
    );
}

#[tokio::test]
async fn test_cancel_during_fetching_keeps_completed_results() {
    let harness = TestHarness::new();
    harness.extractor.set_default_content("page").await;
    harness.refiner.push_targets(&["never-resolved.com"]).await;

    let mut config = fixtures::fast_research_config();
    config.batch_size = 1;
    config.inter_batch_delay_ms = 300;
    let orchestrator = Arc::new(harness.orchestrator(config));
    let mut events = orchestrator.subscribe();

    let session = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .run(fixtures::research_params(&["a.com", "b.com", "c.com"]))
                .await
        }
    });

    // Cancel as soon as the first batch has settled.
    loop {
        match events.recv().await.expect("event stream closed early") {
            ResearchEvent::BatchCompleted { index: 0, .. } => break,
            _ => continue,
        }
    }
    orchestrator.cancel().await;

    let outcome = session
        .await
        .expect("task panicked")
        .expect("cancel is not an error");

    assert_eq!(outcome.state, SessionState::Canceled);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].source_target, "a.com");
    assert_eq!(harness.extractor.call_count().await, 1);
    // No refinement, so no second round.
    assert!(harness.refiner.recorded_requests().await.is_empty());
    assert_eq!(orchestrator.history().await.len(), 1);
}

#[tokio::test]
async fn test_cache_survives_runs_until_reset() {
    let harness = TestHarness::new();
    harness
        .extractor
        .set_content("https://a.com/", "alpha")
        .await;
    let orchestrator = harness.orchestrator(fixtures::fast_research_config());

    let first = orchestrator
        .run(fixtures::research_params(&["a.com"]))
        .await
        .unwrap();
    let second = orchestrator
        .run(fixtures::research_params(&["https://a.com"]))
        .await
        .unwrap();

    assert_eq!(harness.extractor.call_count().await, 1);
    assert_eq!(first.results[0].content, "alpha");
    assert_eq!(second.results[0].content, "alpha");
    assert_eq!(second.results[0].source_target, "https://a.com");

    orchestrator.reset().await.unwrap();
    orchestrator
        .run(fixtures::research_params(&["a.com"]))
        .await
        .unwrap();
    assert_eq!(harness.extractor.call_count().await, 2);
}

#[tokio::test]
async fn test_sessions_do_not_share_rate_limits() {
    let search = Arc::new(MockSearchBackend::new());
    let extractor = Arc::new(MockExtractor::new());
    extractor.set_default_content("page").await;

    let mut config = fixtures::fast_research_config();
    config.rate_limit.max_calls_per_window = 1;
    config.retry.max_retries = 0;

    let build = || {
        ResearchOrchestrator::new(
            config.clone(),
            Collaborators {
                search: search.clone(),
                extractor: extractor.clone(),
                refiner: Arc::new(MockRefiner::new()),
            },
        )
    };
    let first = build();
    let second = build();

    let a = first
        .run(fixtures::research_params(&["a.com", "b.com"]))
        .await
        .unwrap();
    // The second URL hit the limiter of the first session.
    assert_eq!(a.results.len(), 1);

    // A separate session has a fresh window.
    let b = second
        .run(fixtures::research_params(&["c.com"]))
        .await
        .unwrap();
    assert_eq!(b.results.len(), 1);
}

#[tokio::test]
async fn test_session_timeout_surfaces_as_error() {
    let harness = TestHarness::new();
    harness.extractor.set_default_content("page").await;
    harness.extractor.set_delay(Duration::from_millis(60)).await;

    let mut config = fixtures::fast_research_config();
    config.session_timeout_ms = Some(20);
    let orchestrator = harness.orchestrator(config);

    let err = orchestrator
        .run(fixtures::research_params(&["a.com"]))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("timed out"));
    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Canceled);
    assert_eq!(snapshot.result_count, 1);
    assert!(snapshot.error.is_some());
}
