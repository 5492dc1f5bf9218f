//! Integration tests for async renders (`?async=true`) and job polling.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::*;
use imprint_api::jobs::{recover_interrupted_jobs, INTERRUPTED_JOB_ERROR};
use imprint_core::output::RenderOptions;
use imprint_db::models::job::CreateRenderJob;
use imprint_db::models::status::JobStatus;
use serde_json::json;

const ASYNC_IMAGES: &str = "/api/v1/images?async=true";

fn job_uri(job_id: i64) -> String {
    format!("/api/v1/jobs/{job_id}")
}

#[tokio::test]
async fn async_job_is_pending_then_done() {
    let (engine, gate) = StubEngine::gated();
    let app = build_test_app(engine.clone());
    let tenant = seed_tenant(&app.store, Some(5)).await;
    let template_id = seed_template(&app.store, tenant.account_id, hello_scene()).await;

    let (status, accepted) = send(
        &app.router,
        post_json(
            ASYNC_IMAGES,
            Some(&tenant.api_key),
            &json!({ "template_id": template_id, "modifications": { "name": "Sarah" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{accepted}");
    assert_eq!(accepted["status"], "pending");
    let job_id = accepted["job_id"].as_i64().unwrap();

    // The engine is blocked, so the job cannot have finished.
    let (status, polled) = send(&app.router, get(&job_uri(job_id), Some(&tenant.api_key))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        polled["status"] == "pending" || polled["status"] == "processing",
        "{polled}"
    );
    assert!(polled["image_url"].is_null());
    assert!(polled["error"].is_null());

    let account_before = account(&app.store, tenant.account_id).await;
    assert_eq!(account_before.api_calls_this_month, 0);
    assert_eq!(account_before.api_calls_reserved, 1);

    gate.add_permits(1);
    let done = wait_for_terminal(&app.router, job_id, &tenant.api_key).await;
    assert_eq!(done["status"], "done");
    assert!(done["image_url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert!(done["error"].is_null());
    assert_eq!(engine.last_text().as_deref(), Some("Hello Sarah"));

    let account_after = account(&app.store, tenant.account_id).await;
    assert_eq!(account_after.api_calls_this_month, 1);
    assert_eq!(account_after.api_calls_reserved, 0);
    assert_eq!(app.store.image_count(tenant.account_id).await, 1);

    // Terminal states are final.
    let (_, again) = send(&app.router, get(&job_uri(job_id), Some(&tenant.api_key))).await;
    assert_eq!(again["status"], "done");
    assert_eq!(again["image_url"], done["image_url"]);
}

#[tokio::test]
async fn failed_async_job_reports_error_and_releases_quota() {
    let app = build_test_app(Arc::new(FailingEngine));
    let tenant = seed_tenant(&app.store, Some(5)).await;
    let template_id = seed_template(&app.store, tenant.account_id, hello_scene()).await;

    let (status, accepted) = send(
        &app.router,
        post_json(ASYNC_IMAGES, Some(&tenant.api_key), &json!({ "template_id": template_id })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = accepted["job_id"].as_i64().unwrap();

    let failed = wait_for_terminal(&app.router, job_id, &tenant.api_key).await;
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error"], "Image rendering failed");
    assert!(failed["image_url"].is_null());

    let account = account(&app.store, tenant.account_id).await;
    assert_eq!(account.api_calls_this_month, 0);
    assert_eq!(account.api_calls_reserved, 0);
    assert_eq!(app.store.image_count(tenant.account_id).await, 0);
}

#[tokio::test]
async fn async_request_checks_quota_and_ownership_up_front() {
    let engine = StubEngine::new();
    let app = build_test_app(engine.clone());
    let owner = seed_tenant(&app.store, Some(1)).await;
    let other = seed_tenant(&app.store, Some(5)).await;
    let template_id = seed_template(&app.store, owner.account_id, hello_scene()).await;
    let body = json!({ "template_id": template_id });

    let (status, json) =
        send(&app.router, post_json(ASYNC_IMAGES, Some(&other.api_key), &body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");
    assert_eq!(account(&app.store, other.account_id).await.api_calls_reserved, 0);

    app.store.set_calls_used(owner.account_id, 1).await;
    let (status, json) =
        send(&app.router, post_json(ASYNC_IMAGES, Some(&owner.api_key), &body)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["used"], 1);
    assert_eq!(json["limit"], 1);

    assert_eq!(engine.call_count(), 0);
    assert_eq!(app.jobs.in_flight(), 0);
}

#[tokio::test]
async fn jobs_are_private_to_their_account() {
    let (engine, gate) = StubEngine::gated();
    let app = build_test_app(engine);
    let owner = seed_tenant(&app.store, None).await;
    let other = seed_tenant(&app.store, None).await;
    let template_id = seed_template(&app.store, owner.account_id, hello_scene()).await;

    let (_, accepted) = send(
        &app.router,
        post_json(ASYNC_IMAGES, Some(&owner.api_key), &json!({ "template_id": template_id })),
    )
    .await;
    let job_id = accepted["job_id"].as_i64().unwrap();

    let (status, body) = send(&app.router, get(&job_uri(job_id), Some(&other.api_key))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = send(&app.router, get(&job_uri(987_654), Some(&owner.api_key))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    gate.add_permits(1);
    let done = wait_for_terminal(&app.router, job_id, &owner.api_key).await;
    assert_eq!(done["status"], "done");
}

#[tokio::test]
async fn restart_recovery_fails_orphaned_jobs() {
    let app = build_test_app(StubEngine::new());
    let tenant = seed_tenant(&app.store, Some(5)).await;
    let template_id = seed_template(&app.store, tenant.account_id, hello_scene()).await;

    let input = CreateRenderJob {
        account_id: tenant.account_id,
        template_id,
        variables: Default::default(),
        options: RenderOptions::default(),
    };
    let pending = app
        .store
        .insert_job_with_status(&input, JobStatus::Pending)
        .await;
    let processing = app
        .store
        .insert_job_with_status(&input, JobStatus::Processing)
        .await;
    let done = app.store.insert_job_with_status(&input, JobStatus::Done).await;

    let report = recover_interrupted_jobs(app.store.as_ref()).await.unwrap();
    assert_eq!(report.failed_jobs, 2);

    for job_id in [pending.id, processing.id] {
        let (status, body) = send(&app.router, get(&job_uri(job_id), Some(&tenant.api_key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], INTERRUPTED_JOB_ERROR);
    }
    let (_, body) = send(&app.router, get(&job_uri(done.id), Some(&tenant.api_key))).await;
    assert_eq!(body["status"], "done");
}
