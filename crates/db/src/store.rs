//! Storage traits consumed by the API layer.
//!
//! Handlers, the orchestrator and the job queue depend on these traits
//! rather than on `PgPool`, so the HTTP surface can be exercised against
//! [`crate::MemoryStore`] without a database. [`PgStore`] delegates to the
//! repositories.

use async_trait::async_trait;
use imprint_core::quota::Usage;
use imprint_core::types::DbId;

use crate::models::account::ApiKeyPrincipal;
use crate::models::generated_image::{CreateGeneratedImage, GeneratedImage};
use crate::models::job::{CreateRenderJob, RenderJob};
use crate::models::template::Template;
use crate::models::webhook::Webhook;
use crate::repositories::{
    AccountRepo, ApiKeyRepo, GeneratedImageRepo, RenderJobRepo, TemplateRepo, WebhookRepo,
};
use crate::DbPool;

pub type StoreResult<T> = Result<T, sqlx::Error>;

// ---------------------------------------------------------------------------
// Quota reservation types
// ---------------------------------------------------------------------------

/// One admitted call that has not been counted yet.
///
/// Deliberately neither `Clone` nor `Copy`: it must be handed back to exactly
/// one of [`QuotaLedger::commit`] or [`QuotaLedger::release`].
#[derive(Debug)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    pub account_id: DbId,
}

/// Outcome of [`QuotaLedger::check_and_reserve`].
#[derive(Debug)]
pub enum QuotaDecision {
    Reserved(Reservation),
    /// The account is at its limit. `in_flight` is the number of calls
    /// reserved by renders that have not finished yet.
    Denied { usage: Usage, in_flight: i64 },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// API key authentication.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolve the SHA-256 hash of a presented key to its principal.
    async fn find_principal_by_key_hash(
        &self,
        key_hash: &str,
    ) -> StoreResult<Option<ApiKeyPrincipal>>;

    async fn touch_api_key(&self, api_key_id: DbId) -> StoreResult<()>;
}

/// Per-account monthly call accounting.
///
/// `check_and_reserve` is atomic per account: with `limit - used = n`,
/// at most `n` concurrent callers are admitted.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    async fn check_and_reserve(&self, account_id: DbId) -> StoreResult<QuotaDecision>;

    /// Count the reserved call. Returns usage after the increment.
    async fn commit(&self, reservation: Reservation) -> StoreResult<Usage>;

    /// Give the reserved call back uncounted.
    async fn release(&self, reservation: Reservation) -> StoreResult<()>;

    async fn usage(&self, account_id: DbId) -> StoreResult<Option<Usage>>;

    /// Zero the committed counter for a new billing cycle.
    async fn reset_cycle(&self, account_id: DbId) -> StoreResult<bool>;

    /// Drop reservations left behind by a previous process.
    async fn clear_reservations(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find_template(&self, id: DbId) -> StoreResult<Option<Template>>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn insert_image(&self, input: &CreateGeneratedImage) -> StoreResult<GeneratedImage>;

    async fn find_image(&self, id: DbId) -> StoreResult<Option<GeneratedImage>>;

    /// Newest first, plus the account's total count.
    async fn list_images(
        &self,
        account_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<GeneratedImage>, i64)>;

    async fn delete_image(&self, id: DbId, account_id: DbId) -> StoreResult<bool>;
}

/// Render job persistence. Transition methods return `false` when the job
/// was not in the state the transition requires.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, input: &CreateRenderJob) -> StoreResult<RenderJob>;

    async fn find_job(&self, id: DbId) -> StoreResult<Option<RenderJob>>;

    async fn mark_processing(&self, id: DbId) -> StoreResult<bool>;

    async fn complete_job(&self, id: DbId, image_url: &str) -> StoreResult<bool>;

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<bool>;

    async fn fail_orphaned_jobs(&self, error: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn webhooks_for_event(&self, account_id: DbId, event: &str)
        -> StoreResult<Vec<Webhook>>;
}

/// Everything the API layer needs from storage.
pub trait Store:
    AccountDirectory + QuotaLedger + TemplateStore + ImageStore + JobStore + WebhookStore
{
}

impl<T> Store for T where
    T: AccountDirectory + QuotaLedger + TemplateStore + ImageStore + JobStore + WebhookStore
{
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

/// [`Store`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl AccountDirectory for PgStore {
    async fn find_principal_by_key_hash(
        &self,
        key_hash: &str,
    ) -> StoreResult<Option<ApiKeyPrincipal>> {
        ApiKeyRepo::find_principal_by_hash(&self.pool, key_hash).await
    }

    async fn touch_api_key(&self, api_key_id: DbId) -> StoreResult<()> {
        ApiKeyRepo::touch_last_used(&self.pool, api_key_id).await
    }
}

#[async_trait]
impl QuotaLedger for PgStore {
    async fn check_and_reserve(&self, account_id: DbId) -> StoreResult<QuotaDecision> {
        if AccountRepo::reserve_call(&self.pool, account_id).await? {
            return Ok(QuotaDecision::Reserved(Reservation { account_id }));
        }
        match AccountRepo::usage(&self.pool, account_id).await? {
            Some(row) => Ok(QuotaDecision::Denied {
                usage: row.into(),
                in_flight: row.api_calls_reserved,
            }),
            None => Err(sqlx::Error::RowNotFound),
        }
    }

    async fn commit(&self, reservation: Reservation) -> StoreResult<Usage> {
        AccountRepo::commit_call(&self.pool, reservation.account_id)
            .await?
            .map(Usage::from)
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn release(&self, reservation: Reservation) -> StoreResult<()> {
        AccountRepo::release_call(&self.pool, reservation.account_id).await
    }

    async fn usage(&self, account_id: DbId) -> StoreResult<Option<Usage>> {
        Ok(AccountRepo::usage(&self.pool, account_id)
            .await?
            .map(Usage::from))
    }

    async fn reset_cycle(&self, account_id: DbId) -> StoreResult<bool> {
        AccountRepo::reset_cycle(&self.pool, account_id).await
    }

    async fn clear_reservations(&self) -> StoreResult<u64> {
        AccountRepo::clear_reservations(&self.pool).await
    }
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn find_template(&self, id: DbId) -> StoreResult<Option<Template>> {
        TemplateRepo::find_by_id(&self.pool, id).await
    }
}

#[async_trait]
impl ImageStore for PgStore {
    async fn insert_image(&self, input: &CreateGeneratedImage) -> StoreResult<GeneratedImage> {
        GeneratedImageRepo::create(&self.pool, input).await
    }

    async fn find_image(&self, id: DbId) -> StoreResult<Option<GeneratedImage>> {
        GeneratedImageRepo::find_by_id(&self.pool, id).await
    }

    async fn list_images(
        &self,
        account_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<GeneratedImage>, i64)> {
        let items = GeneratedImageRepo::list_by_account(&self.pool, account_id, limit, offset).await?;
        let total = GeneratedImageRepo::count_by_account(&self.pool, account_id).await?;
        Ok((items, total))
    }

    async fn delete_image(&self, id: DbId, account_id: DbId) -> StoreResult<bool> {
        GeneratedImageRepo::delete(&self.pool, id, account_id).await
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, input: &CreateRenderJob) -> StoreResult<RenderJob> {
        RenderJobRepo::create(&self.pool, input).await
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<RenderJob>> {
        RenderJobRepo::find_by_id(&self.pool, id).await
    }

    async fn mark_processing(&self, id: DbId) -> StoreResult<bool> {
        RenderJobRepo::mark_processing(&self.pool, id).await
    }

    async fn complete_job(&self, id: DbId, image_url: &str) -> StoreResult<bool> {
        RenderJobRepo::complete(&self.pool, id, image_url).await
    }

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<bool> {
        RenderJobRepo::fail(&self.pool, id, error).await
    }

    async fn fail_orphaned_jobs(&self, error: &str) -> StoreResult<u64> {
        RenderJobRepo::fail_orphaned(&self.pool, error).await
    }
}

#[async_trait]
impl WebhookStore for PgStore {
    async fn webhooks_for_event(
        &self,
        account_id: DbId,
        event: &str,
    ) -> StoreResult<Vec<Webhook>> {
        WebhookRepo::list_enabled_for_event(&self.pool, account_id, event).await
    }
}
