// crates/makerboard/src/jobs/repo.rs

use crate::error::{MarketError, MarketResult};
use crate::jobs::filter::JobFilter;
use crate::jobs::lifecycle;
use crate::jobs::model::{Job, JobRow, JobStatus, NewJob};
use crate::jobs::terms::CURRENCY;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

pub const MAX_LIST_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ----------------------------
    // Posting
    // ----------------------------

    /// Validates and stores a new OPEN job for `poster_id`.
    pub async fn create(&self, poster_id: &str, input: NewJob) -> MarketResult<Job> {
        if poster_id.trim().is_empty() {
            return Err(MarketError::unauthorized("sign in to post a job"));
        }
        let input = input.validate(Utc::now())?;

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (
                id, title, category, description,
                payment_type, budget_cents, currency, in_kind_description,
                service_type, is_standard_rate,
                status, posted_by_id, posted_by_email, deadline_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(input.category.as_str())
        .bind(&input.description)
        .bind(input.payment_type.as_str())
        .bind(input.budget_cents)
        .bind(CURRENCY)
        .bind(&input.in_kind_description)
        .bind(input.service_type.map(|s| s.as_str()))
        .bind(input.is_standard_rate)
        .bind(JobStatus::Open.as_str())
        .bind(poster_id)
        .bind(&input.posted_by_email)
        .bind(input.deadline_at)
        .fetch_one(&self.pool)
        .await?;

        let job = Job::try_from(row)?;
        tracing::info!(job_id = %job.id, poster = %poster_id, category = job.category.as_str(), "job posted");
        Ok(job)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, job_id: Uuid) -> MarketResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    pub async fn require_job(&self, job_id: Uuid) -> MarketResult<Job> {
        self.get_job(job_id)
            .await?
            .ok_or_else(|| MarketError::job_not_found(job_id))
    }

    /// Newest first. `limit` is clamped to [1, 500].
    pub async fn list_jobs(&self, filter: &JobFilter, limit: i64) -> MarketResult<Vec<Job>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM jobs WHERE TRUE");
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(payment_type) = filter.payment_type {
            qb.push(" AND payment_type = ").push_bind(payment_type.as_str());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(poster) = filter.posted_by.as_deref() {
            qb.push(" AND posted_by_id = ").push_bind(poster.to_string());
        }
        if let Some(claimant) = filter.claimed_by.as_deref() {
            qb.push(" AND claimed_by_id = ").push_bind(claimant.to_string());
        }
        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", escape_like(&term));
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit);

        let rows = qb.build_query_as::<JobRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    pub async fn claim(&self, job_id: Uuid, actor: &str) -> MarketResult<Job> {
        let job = self
            .transition(job_id, |job, now| lifecycle::claim(job, actor, now))
            .await?;
        tracing::info!(job_id = %job_id, claimant = %actor, "job claimed");
        Ok(job)
    }

    pub async fn complete(
        &self,
        job_id: Uuid,
        actor: &str,
        deliverable_url: Option<String>,
    ) -> MarketResult<Job> {
        let job = self
            .transition(job_id, |job, now| {
                lifecycle::complete(job, actor, deliverable_url, now)
            })
            .await?;
        tracing::info!(job_id = %job_id, claimant = %actor, "job completed");
        Ok(job)
    }

    pub async fn cancel(&self, job_id: Uuid, actor: &str) -> MarketResult<Job> {
        let job = self
            .transition(job_id, |job, now| lifecycle::cancel(job, actor, now))
            .await?;
        tracing::info!(job_id = %job_id, poster = %actor, "job cancelled");
        Ok(job)
    }

    pub async fn release(&self, job_id: Uuid, actor: &str) -> MarketResult<Job> {
        let job = self
            .transition(job_id, |job, now| lifecycle::release(job, actor, now))
            .await?;
        tracing::info!(job_id = %job_id, claimant = %actor, "claim released");
        Ok(job)
    }

    /// Removes the job and, through the foreign key, its offers.
    pub async fn delete(&self, job_id: Uuid, actor: &str) -> MarketResult<Job> {
        let mut tx = self.pool.begin().await?;
        let job = lock_job(&mut tx, job_id).await?;
        lifecycle::ensure_deletable(&job, actor)?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(job_id = %job_id, poster = %actor, "job deleted");
        Ok(job)
    }

    /// Loads the job under a row lock, applies `apply` and writes the
    /// result back in the same transaction. A rejected transition rolls
    /// back without touching the row.
    async fn transition<F>(&self, job_id: Uuid, apply: F) -> MarketResult<Job>
    where
        F: FnOnce(&mut Job, DateTime<Utc>) -> MarketResult<()>,
    {
        let mut tx = self.pool.begin().await?;
        let mut job = lock_job(&mut tx, job_id).await?;

        apply(&mut job, Utc::now())?;

        let saved = save_job(&mut tx, &job).await?;
        tx.commit().await?;
        Ok(saved)
    }
}

/// `SELECT … FOR UPDATE` on one job. Shared with offer acceptance so both
/// paths serialize on the same row.
pub(crate) async fn lock_job(tx: &mut Transaction<'_, Postgres>, job_id: Uuid) -> MarketResult<Job> {
    let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1 FOR UPDATE")
        .bind(job_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| MarketError::job_not_found(job_id))?;
    Job::try_from(row)
}

/// Writes the lifecycle columns of `job`.
pub(crate) async fn save_job(tx: &mut Transaction<'_, Postgres>, job: &Job) -> MarketResult<Job> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs
        SET status = $2,
            claimed_by_id = $3,
            claimed_at = $4,
            completed_at = $5,
            deliverable_url = $6,
            updated_at = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job.id)
    .bind(job.status.as_str())
    .bind(&job.claimed_by_id)
    .bind(job.claimed_at)
    .bind(job.completed_at)
    .bind(&job.deliverable_url)
    .bind(job.updated_at)
    .fetch_one(&mut **tx)
    .await?;
    Job::try_from(row)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
