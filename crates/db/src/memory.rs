//! In-process [`Store`](crate::Store) used by tests and local tooling.
//!
//! State sits behind one `tokio::sync::Mutex`, which makes every operation
//! (including quota reservation) trivially atomic. Ids are assigned from a
//! shared counter, mirroring `BIGSERIAL`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use imprint_core::api_keys::generate_api_key;
use imprint_core::quota::{has_capacity, Usage};
use imprint_core::types::DbId;
use tokio::sync::Mutex;

use crate::models::account::{Account, ApiKey, ApiKeyPrincipal, CreateAccount};
use crate::models::generated_image::{CreateGeneratedImage, GeneratedImage};
use crate::models::job::{CreateRenderJob, RenderJob};
use crate::models::status::JobStatus;
use crate::models::template::{CreateTemplate, Template};
use crate::models::webhook::{CreateWebhook, Webhook};
use crate::store::{
    AccountDirectory, ImageStore, JobStore, QuotaDecision, QuotaLedger, Reservation, StoreResult,
    TemplateStore, WebhookStore,
};

#[derive(Default)]
struct Inner {
    next_id: DbId,
    accounts: BTreeMap<DbId, Account>,
    api_keys: BTreeMap<DbId, ApiKey>,
    templates: BTreeMap<DbId, Template>,
    images: BTreeMap<DbId, GeneratedImage>,
    jobs: BTreeMap<DbId, RenderJob>,
    webhooks: BTreeMap<DbId, Webhook>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    /// Move a job to `to` if that is a legal step from its current status.
    fn transition(
        &mut self,
        id: DbId,
        to: JobStatus,
        apply: impl FnOnce(&mut RenderJob),
    ) -> bool {
        match self.jobs.get_mut(&id) {
            Some(job) if job.status().can_transition_to(to) => {
                job.status_id = to.id();
                apply(job);
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

/// Memory-backed store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Seeding ------------------------------------------------------------

    pub async fn create_account(&self, input: CreateAccount) -> Account {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let account = Account {
            id: inner.next_id(),
            email: input.email,
            plan_name: input.plan_name,
            monthly_limit: input.monthly_limit,
            api_calls_this_month: 0,
            api_calls_reserved: 0,
            api_calls_reset_at: now,
            created_at: now,
            updated_at: now,
        };
        inner.accounts.insert(account.id, account.clone());
        account
    }

    /// Issue a key for `account_id` and return its plaintext.
    pub async fn issue_api_key(&self, account_id: DbId) -> String {
        let generated = generate_api_key();
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let key = ApiKey {
            id: inner.next_id(),
            account_id,
            name: "default".to_string(),
            key_hash: generated.hash,
            key_prefix: generated.prefix,
            is_active: true,
            last_used_at: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.api_keys.insert(key.id, key);
        generated.plaintext
    }

    /// Revoke every key of an account.
    pub async fn revoke_api_keys(&self, account_id: DbId) {
        let mut inner = self.inner.lock().await;
        for key in inner.api_keys.values_mut().filter(|k| k.account_id == account_id) {
            key.is_active = false;
            key.revoked_at = Some(Utc::now());
        }
    }

    pub async fn create_template(&self, input: CreateTemplate) -> Template {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let template = Template {
            id: inner.next_id(),
            account_id: input.account_id,
            name: input.name,
            scene: serde_json::to_value(&input.scene).unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        inner.templates.insert(template.id, template.clone());
        template
    }

    /// Insert a template whose scene is raw JSON, valid or not.
    pub async fn create_raw_template(
        &self,
        account_id: DbId,
        scene: serde_json::Value,
    ) -> Template {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let template = Template {
            id: inner.next_id(),
            account_id,
            name: "raw".to_string(),
            scene,
            created_at: now,
            updated_at: now,
        };
        inner.templates.insert(template.id, template.clone());
        template
    }

    pub async fn add_webhook(&self, input: CreateWebhook) -> Webhook {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let webhook = Webhook {
            id: inner.next_id(),
            account_id: input.account_id,
            url: input.url,
            secret: input.secret,
            event_types: serde_json::json!(input.event_types),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        };
        inner.webhooks.insert(webhook.id, webhook.clone());
        webhook
    }

    // -- Inspection ---------------------------------------------------------

    pub async fn account(&self, id: DbId) -> Option<Account> {
        self.inner.lock().await.accounts.get(&id).cloned()
    }

    /// Overwrite the committed counter (e.g. to start an account at its limit).
    pub async fn set_calls_used(&self, account_id: DbId, used: i64) {
        if let Some(account) = self.inner.lock().await.accounts.get_mut(&account_id) {
            account.api_calls_this_month = used;
        }
    }

    pub async fn image_count(&self, account_id: DbId) -> usize {
        self.inner
            .lock()
            .await
            .images
            .values()
            .filter(|i| i.account_id == account_id)
            .count()
    }

    /// Insert a job row in an arbitrary status (restart-recovery tests).
    pub async fn insert_job_with_status(
        &self,
        input: &CreateRenderJob,
        status: JobStatus,
    ) -> RenderJob {
        let mut job = self.create_job_row(input).await;
        let mut inner = self.inner.lock().await;
        if let Some(stored) = inner.jobs.get_mut(&job.id) {
            stored.status_id = status.id();
            job = stored.clone();
        }
        job
    }

    async fn create_job_row(&self, input: &CreateRenderJob) -> RenderJob {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let job = RenderJob {
            id: inner.next_id(),
            account_id: input.account_id,
            template_id: input.template_id,
            variables: input.variables_json(),
            format: input.options.format.as_str().to_string(),
            quality: input.quality(),
            status_id: JobStatus::Pending.id(),
            image_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.insert(job.id, job.clone());
        job
    }
}

#[async_trait]
impl AccountDirectory for MemoryStore {
    async fn find_principal_by_key_hash(
        &self,
        key_hash: &str,
    ) -> StoreResult<Option<ApiKeyPrincipal>> {
        let inner = self.inner.lock().await;
        let principal = inner
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash && k.is_active && k.revoked_at.is_none())
            .and_then(|key| {
                inner.accounts.get(&key.account_id).map(|account| ApiKeyPrincipal {
                    api_key_id: key.id,
                    account_id: account.id,
                    plan_name: account.plan_name.clone(),
                })
            });
        Ok(principal)
    }

    async fn touch_api_key(&self, api_key_id: DbId) -> StoreResult<()> {
        if let Some(key) = self.inner.lock().await.api_keys.get_mut(&api_key_id) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl QuotaLedger for MemoryStore {
    async fn check_and_reserve(&self, account_id: DbId) -> StoreResult<QuotaDecision> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&account_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        if !has_capacity(
            account.api_calls_this_month,
            account.api_calls_reserved,
            account.monthly_limit,
        ) {
            return Ok(QuotaDecision::Denied {
                usage: account.usage(),
                in_flight: account.api_calls_reserved,
            });
        }
        account.api_calls_reserved += 1;
        Ok(QuotaDecision::Reserved(Reservation { account_id }))
    }

    async fn commit(&self, reservation: Reservation) -> StoreResult<Usage> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(&reservation.account_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        account.api_calls_this_month += 1;
        account.api_calls_reserved = (account.api_calls_reserved - 1).max(0);
        Ok(account.usage())
    }

    async fn release(&self, reservation: Reservation) -> StoreResult<()> {
        if let Some(account) = self.inner.lock().await.accounts.get_mut(&reservation.account_id) {
            account.api_calls_reserved = (account.api_calls_reserved - 1).max(0);
        }
        Ok(())
    }

    async fn usage(&self, account_id: DbId) -> StoreResult<Option<Usage>> {
        Ok(self
            .inner
            .lock()
            .await
            .accounts
            .get(&account_id)
            .map(Account::usage))
    }

    async fn reset_cycle(&self, account_id: DbId) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(match inner.accounts.get_mut(&account_id) {
            Some(account) => {
                account.api_calls_this_month = 0;
                account.api_calls_reset_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn clear_reservations(&self) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let mut cleared = 0;
        for account in inner.accounts.values_mut().filter(|a| a.api_calls_reserved > 0) {
            account.api_calls_reserved = 0;
            cleared += 1;
        }
        Ok(cleared)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn find_template(&self, id: DbId) -> StoreResult<Option<Template>> {
        Ok(self.inner.lock().await.templates.get(&id).cloned())
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn insert_image(&self, input: &CreateGeneratedImage) -> StoreResult<GeneratedImage> {
        let mut inner = self.inner.lock().await;
        let image = GeneratedImage {
            id: inner.next_id(),
            account_id: input.account_id,
            template_id: input.template_id,
            variables: input.variables_json(),
            image_url: input.image_url.clone(),
            format: input.format.as_str().to_string(),
            created_at: Utc::now(),
        };
        inner.images.insert(image.id, image.clone());
        Ok(image)
    }

    async fn find_image(&self, id: DbId) -> StoreResult<Option<GeneratedImage>> {
        Ok(self.inner.lock().await.images.get(&id).cloned())
    }

    async fn list_images(
        &self,
        account_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<GeneratedImage>, i64)> {
        let inner = self.inner.lock().await;
        // Ids grow monotonically, so reverse id order is newest first.
        let owned: Vec<&GeneratedImage> = inner
            .images
            .values()
            .rev()
            .filter(|i| i.account_id == account_id)
            .collect();
        let total = owned.len() as i64;
        let page = owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn delete_image(&self, id: DbId, account_id: DbId) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.images.get(&id) {
            Some(image) if image.account_id == account_id => {
                inner.images.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, input: &CreateRenderJob) -> StoreResult<RenderJob> {
        Ok(self.create_job_row(input).await)
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<RenderJob>> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn mark_processing(&self, id: DbId) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.transition(id, JobStatus::Processing, |_| {}))
    }

    async fn complete_job(&self, id: DbId, image_url: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.transition(id, JobStatus::Done, |job| {
            job.image_url = Some(image_url.to_string());
        }))
    }

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.transition(id, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
        }))
    }

    async fn fail_orphaned_jobs(&self, error: &str) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let mut failed = 0;
        for job in inner.jobs.values_mut().filter(|j| !j.status().is_terminal()) {
            job.status_id = JobStatus::Failed.id();
            job.error = Some(error.to_string());
            job.updated_at = Utc::now();
            failed += 1;
        }
        Ok(failed)
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn webhooks_for_event(
        &self,
        account_id: DbId,
        event: &str,
    ) -> StoreResult<Vec<Webhook>> {
        Ok(self
            .inner
            .lock()
            .await
            .webhooks
            .values()
            .filter(|w| w.account_id == account_id && w.is_enabled && w.subscribes_to(event))
            .cloned()
            .collect())
    }
}
