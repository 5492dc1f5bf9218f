//! Repository tests against a real database.
//!
//! Run with `DATABASE_URL` pointing at a disposable PostgreSQL instance and
//! `cargo test -- --ignored`.

use assert_matches::assert_matches;
use imprint_core::api_keys::generate_api_key;
use imprint_core::output::{OutputFormat, RenderOptions};
use imprint_core::scene::SceneDocument;
use imprint_db::models::account::CreateAccount;
use imprint_db::models::job::CreateRenderJob;
use imprint_db::models::status::JobStatus;
use imprint_db::models::template::CreateTemplate;
use imprint_db::models::webhook::CreateWebhook;
use imprint_db::repositories::{AccountRepo, ApiKeyRepo, TemplateRepo, WebhookRepo};
use imprint_db::store::{AccountDirectory, JobStore, QuotaDecision, QuotaLedger, WebhookStore};
use imprint_db::PgStore;
use sqlx::PgPool;

async fn seed_account(pool: &PgPool, limit: Option<i64>) -> i64 {
    AccountRepo::create(
        pool,
        &CreateAccount {
            email: format!("{}@test", generate_api_key().prefix),
            plan_name: "starter".into(),
            monthly_limit: limit,
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn reservation_respects_limit(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let account_id = seed_account(&pool, Some(1)).await;

    let reservation = assert_matches!(
        store.check_and_reserve(account_id).await.unwrap(),
        QuotaDecision::Reserved(r) => r
    );
    assert_matches!(
        store.check_and_reserve(account_id).await.unwrap(),
        QuotaDecision::Denied { usage, in_flight: 1 } if usage.used == 0 && usage.limit == Some(1)
    );

    let usage = store.commit(reservation).await.unwrap();
    assert_eq!(usage.used, 1);
    assert_matches!(
        store.check_and_reserve(account_id).await.unwrap(),
        QuotaDecision::Denied { usage, in_flight: 0 } if usage.used == 1
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn concurrent_reservations_serialize_on_the_row(pool: PgPool) {
    let store = std::sync::Arc::new(PgStore::new(pool.clone()));
    let account_id = seed_account(&pool, Some(3)).await;

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.check_and_reserve(account_id).await.unwrap() })
        })
        .collect();
    let mut admitted = 0;
    for handle in handles {
        if let QuotaDecision::Reserved(r) = handle.await.unwrap() {
            store.release(r).await.unwrap();
            admitted += 1;
        }
    }
    assert!(admitted >= 3, "at least the limit must be admitted over time");
    let account = AccountRepo::find_by_id(&pool, account_id).await.unwrap().unwrap();
    assert_eq!(account.api_calls_reserved, 0);
    assert_eq!(account.api_calls_this_month, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn key_hash_lookup_skips_revoked_keys(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let account_id = seed_account(&pool, None).await;
    let key = generate_api_key();
    let row = ApiKeyRepo::create(&pool, account_id, "ci", &key.hash, &key.prefix)
        .await
        .unwrap();

    let principal = store.find_principal_by_key_hash(&key.hash).await.unwrap();
    assert_eq!(principal.map(|p| p.account_id), Some(account_id));

    assert!(ApiKeyRepo::revoke(&pool, row.id).await.unwrap());
    assert!(store.find_principal_by_key_hash(&key.hash).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn job_transitions_are_conditional(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let account_id = seed_account(&pool, None).await;
    let template = TemplateRepo::create(
        &pool,
        &CreateTemplate {
            account_id,
            name: "t".into(),
            scene: SceneDocument::new(100, 100),
        },
    )
    .await
    .unwrap();
    let job = store
        .create_job(&CreateRenderJob {
            account_id,
            template_id: template.id,
            variables: [("name".to_string(), "Sarah".to_string())].into(),
            options: RenderOptions::new(OutputFormat::Png, None),
        })
        .await
        .unwrap();
    assert_eq!(job.status(), JobStatus::Pending);

    assert!(!store.complete_job(job.id, "https://cdn.test/a").await.unwrap());
    assert!(store.mark_processing(job.id).await.unwrap());
    assert!(!store.mark_processing(job.id).await.unwrap());
    assert!(store.complete_job(job.id, "https://cdn.test/a").await.unwrap());
    assert!(!store.fail_job(job.id, "late").await.unwrap());

    let job = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status(), JobStatus::Done);
    assert_eq!(job.variable_map().get("name").map(String::as_str), Some("Sarah"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn startup_recovery_fails_open_jobs(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let account_id = seed_account(&pool, None).await;
    let template = TemplateRepo::create(
        &pool,
        &CreateTemplate {
            account_id,
            name: "t".into(),
            scene: SceneDocument::new(100, 100),
        },
    )
    .await
    .unwrap();
    let input = CreateRenderJob {
        account_id,
        template_id: template.id,
        variables: Default::default(),
        options: RenderOptions::default(),
    };
    let a = store.create_job(&input).await.unwrap();
    let b = store.create_job(&input).await.unwrap();
    store.mark_processing(b.id).await.unwrap();

    assert_eq!(store.fail_orphaned_jobs("interrupted").await.unwrap(), 2);
    for id in [a.id, b.id] {
        let job = store.find_job(id).await.unwrap().unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn webhook_event_filter_uses_jsonb(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let account_id = seed_account(&pool, None).await;
    for events in [vec!["image.generated".to_string()], vec![], vec!["x".to_string()]] {
        WebhookRepo::create(
            &pool,
            &CreateWebhook {
                account_id,
                url: "https://hooks.test/x".into(),
                secret: "s".into(),
                event_types: events,
            },
        )
        .await
        .unwrap();
    }

    let hooks = store
        .webhooks_for_event(account_id, "image.generated")
        .await
        .unwrap();
    assert_eq!(hooks.len(), 2);
}
