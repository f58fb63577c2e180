//! Research API tests against an in-process router with mock collaborators.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;
use delver_core::refiner::ResearchPlan;
use delver_core::resolver::SearchResponse;

async fn start_session(fixture: &TestFixture, body: serde_json::Value) -> String {
    let response = fixture.post("/api/v1/research", body).await;
    assert_status!(response, StatusCode::ACCEPTED);
    response.body["session_id"]
        .as_str()
        .expect("session_id missing")
        .to_string()
}

#[tokio::test]
async fn test_create_session_runs_to_done() {
    let fixture = TestFixture::new();
    fixture
        .search
        .set_handler(|query| {
            (query == "rust async runtimes")
                .then(|| SearchResponse::from_links(["https://blog.example.org/tokio"]))
        })
        .await;
    fixture
        .extractor
        .set_content("https://docs.example.com/", "Docs home")
        .await;
    fixture
        .extractor
        .set_content("https://blog.example.org/tokio", "All about tokio")
        .await;

    let session_id = start_session(
        &fixture,
        json!({
            "targets": ["docs.example.com", "rust async runtimes"],
            "goals": ["Compare runtimes"]
        }),
    )
    .await;

    let detail = fixture.wait_for_terminal(&session_id).await;
    assert_eq!(detail["state"], "done");
    assert_eq!(detail["session_id"], session_id.as_str());
    assert_eq!(detail["result_count"], 2);
    assert_eq!(detail["history"].as_array().unwrap().len(), 1);

    let results = fixture
        .get(&format!("/api/v1/research/{}/results", session_id))
        .await;
    assert_status!(results, StatusCode::OK);
    assert_eq!(results.body["total"], 2);

    let grouped = fixture
        .get(&format!(
            "/api/v1/research/{}/results?source_target=rust%20async%20runtimes",
            session_id
        ))
        .await;
    assert_eq!(grouped.body["total"], 1);
    assert_eq!(
        grouped.body["results"][0]["url"],
        "https://blog.example.org/tokio"
    );

    let goals = &fixture.refiner.recorded_requests().await[0].research_goals;
    assert_eq!(goals, &vec!["Compare runtimes".to_string()]);
}

#[tokio::test]
async fn test_question_only_uses_planner() {
    let fixture = TestFixture::new();
    fixture
        .refiner
        .set_plan(ResearchPlan {
            search_targets: vec!["planned.example.com".to_string()],
            research_goals: vec!["Find the planned page".to_string()],
        })
        .await;
    fixture.extractor.set_default_content("planned").await;

    let response = fixture
        .post(
            "/api/v1/research",
            json!({ "question": "What does the planned page say?" }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(
        response.body["search_targets"],
        json!(["planned.example.com"])
    );
    assert_eq!(
        response.body["research_goals"],
        json!(["Find the planned page"])
    );

    let session_id = response.body["session_id"].as_str().unwrap().to_string();
    fixture.wait_for_terminal(&session_id).await;
    assert_eq!(
        fixture.extractor.requested_urls().await,
        vec!["https://planned.example.com/"]
    );
}

#[tokio::test]
async fn test_question_becomes_goal_when_none_given() {
    let fixture = TestFixture::new();
    fixture.extractor.set_default_content("page").await;

    let response = fixture
        .post(
            "/api/v1/research",
            json!({ "targets": ["example.com"], "question": "What is example.com?" }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(
        response.body["research_goals"],
        json!(["What is example.com?"])
    );
}

#[tokio::test]
async fn test_create_without_targets_or_question_is_bad_request() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/api/v1/research", json!({ "targets": ["  "], "goals": ["x"] }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().is_some());
    assert!(fixture.state.sessions().await.is_empty());
}

#[tokio::test]
async fn test_unconfigured_collaborators_are_unavailable() {
    let fixture = TestFixture::unconfigured();

    let response = fixture
        .post("/api/v1/research", json!({ "targets": ["example.com"] }))
        .await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let fixture = TestFixture::new();
    let id = "00000000-0000-0000-0000-000000000000";

    assert_status!(
        fixture.get(&format!("/api/v1/research/{}", id)).await,
        StatusCode::NOT_FOUND
    );
    assert_status!(
        fixture
            .get(&format!("/api/v1/research/{}/results", id))
            .await,
        StatusCode::NOT_FOUND
    );
    assert_status!(
        fixture
            .post_empty(&format!("/api/v1/research/{}/cancel", id))
            .await,
        StatusCode::NOT_FOUND
    );
    assert_status!(
        fixture.delete(&format!("/api/v1/research/{}", id)).await,
        StatusCode::NOT_FOUND
    );
    assert_status!(
        fixture
            .get(&format!("/api/v1/research/{}/events", id))
            .await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_events_endpoint_requires_upgrade() {
    let fixture = TestFixture::new();
    fixture.extractor.set_default_content("page").await;
    let session_id = start_session(&fixture, json!({ "targets": ["example.com"] })).await;

    let response = fixture
        .get(&format!("/api/v1/research/{}/events", session_id))
        .await;
    assert_ne!(response.status, StatusCode::NOT_FOUND);
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_cancel_stops_running_session() {
    let fixture = TestFixture::new();
    fixture.extractor.set_default_content("page").await;
    fixture
        .extractor
        .set_delay(Duration::from_millis(200))
        .await;
    fixture.refiner.push_targets(&["next.example.com"]).await;

    let session_id = start_session(&fixture, json!({ "targets": ["example.com"] })).await;

    // Let the session reach the fetch before canceling.
    for _ in 0..100 {
        if fixture.extractor.call_count().await > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let response = fixture
        .post_empty(&format!("/api/v1/research/{}/cancel", session_id))
        .await;
    assert_status!(response, StatusCode::OK);

    let detail = fixture.wait_for_terminal(&session_id).await;
    assert_eq!(detail["state"], "canceled");
    assert_eq!(detail["iteration"], 1);
    assert!(fixture.refiner.recorded_requests().await.is_empty());
}

#[tokio::test]
async fn test_list_and_delete_sessions() {
    let fixture = TestFixture::new();
    fixture.extractor.set_default_content("page").await;

    let first = start_session(&fixture, json!({ "targets": ["a.example.com"] })).await;
    let second = start_session(&fixture, json!({ "targets": ["b.example.com"] })).await;
    fixture.wait_for_terminal(&first).await;
    fixture.wait_for_terminal(&second).await;

    let listed = fixture.get("/api/v1/research").await;
    assert_status!(listed, StatusCode::OK);
    assert_eq!(listed.body["total"], 2);

    let deleted = fixture
        .delete(&format!("/api/v1/research/{}", first))
        .await;
    assert_status!(deleted, StatusCode::OK);
    assert_eq!(deleted.body["session_id"], first.as_str());

    let listed = fixture.get("/api/v1/research").await;
    assert_eq!(listed.body["total"], 1);
    assert_eq!(listed.body["sessions"][0]["session_id"], second.as_str());
    assert_status!(
        fixture.get(&format!("/api/v1/research/{}", first)).await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_sessions_have_independent_caches() {
    let fixture = TestFixture::new();
    fixture
        .extractor
        .set_content("https://shared.example.com/", "shared")
        .await;

    let first = start_session(&fixture, json!({ "targets": ["shared.example.com"] })).await;
    fixture.wait_for_terminal(&first).await;
    let second = start_session(&fixture, json!({ "targets": ["shared.example.com"] })).await;
    fixture.wait_for_terminal(&second).await;

    // Each session fetched the page itself.
    assert_eq!(fixture.extractor.call_count().await, 2);
}

#[tokio::test]
async fn test_health_and_sanitized_config() {
    let fixture = TestFixture::new();

    let health = fixture.get("/api/v1/health").await;
    assert_status!(health, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");

    let config = fixture.get("/api/v1/config").await;
    assert_status!(config, StatusCode::OK);
    assert_eq!(config.body["research"]["batch_size"], 3);
    assert!(config.body.get("search").is_none());
}
