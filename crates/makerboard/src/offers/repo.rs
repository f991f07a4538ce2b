// crates/makerboard/src/offers/repo.rs

use crate::error::{MarketError, MarketResult};
use crate::jobs::model::Job;
use crate::jobs::repo::{lock_job, save_job, MAX_LIST_LIMIT};
use crate::offers::model::{NewOffer, Offer, OfferFilter, OfferRow, OfferStatus};
use crate::offers::negotiation;
use chrono::Utc;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

/// Result of a successful acceptance, all written in one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Acceptance {
    pub job: Job,
    pub offer: Offer,
    pub rejected_offer_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterOffer {
    pub original: Offer,
    pub counter: Offer,
}

#[derive(Clone)]
pub struct OffersRepo {
    pool: PgPool,
}

impl OffersRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_offer(&self, offer_id: Uuid) -> MarketResult<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferRow>("SELECT * FROM job_offers WHERE id = $1")
            .bind(offer_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Offer::try_from).transpose()
    }

    pub async fn list_for_job(&self, job_id: Uuid) -> MarketResult<Vec<Offer>> {
        self.list(&OfferFilter::for_job(job_id), MAX_LIST_LIMIT).await
    }

    /// Newest first. `limit` is clamped to [1, 500].
    pub async fn list(&self, filter: &OfferFilter, limit: i64) -> MarketResult<Vec<Offer>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM job_offers WHERE TRUE");
        if let Some(job_id) = filter.job_id {
            qb.push(" AND job_id = ").push_bind(job_id);
        }
        if let Some(who) = filter.offered_by.as_deref() {
            qb.push(" AND offered_by_id = ").push_bind(who.to_string());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(ids) = filter.job_ids.as_ref() {
            qb.push(" AND job_id = ANY(").push_bind(ids.clone()).push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit);

        let rows = qb.build_query_as::<OfferRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Offer::try_from).collect()
    }

    // ----------------------------
    // Negotiation
    // ----------------------------

    pub async fn submit(&self, job_id: Uuid, proposer: &str, input: NewOffer) -> MarketResult<Offer> {
        let mut tx = self.pool.begin().await?;
        let job = lock_job(&mut tx, job_id).await?;

        let input = negotiation::submit(&job, proposer, input)?;
        let offer = insert_offer(&mut tx, job_id, proposer, None, &input).await?;
        tx.commit().await?;

        tracing::info!(offer_id = %offer.id, job_id = %job_id, proposer = %proposer, "offer submitted");
        Ok(offer)
    }

    pub async fn withdraw(&self, offer_id: Uuid, actor: &str) -> MarketResult<Offer> {
        let mut tx = self.pool.begin().await?;
        let mut offer = lock_offer(&mut tx, offer_id).await?;

        negotiation::withdraw(&mut offer, actor, Utc::now())?;
        let offer = save_offer(&mut tx, &offer).await?;
        tx.commit().await?;

        tracing::info!(offer_id = %offer_id, proposer = %actor, "offer withdrawn");
        Ok(offer)
    }

    pub async fn reject(&self, offer_id: Uuid, actor: &str) -> MarketResult<Offer> {
        let mut tx = self.pool.begin().await?;
        let (job, mut offer) = lock_offer_and_job(&mut tx, offer_id).await?;

        negotiation::reject(&job, &mut offer, actor, Utc::now())?;
        let offer = save_offer(&mut tx, &offer).await?;
        tx.commit().await?;

        tracing::info!(offer_id = %offer_id, job_id = %job.id, "offer rejected");
        Ok(offer)
    }

    /// Accepts the offer, assigns the job to its beneficiary and rejects every
    /// other pending offer on the job, atomically. Concurrent acceptances on
    /// the same job serialize on the job row; the loser sees the job
    /// IN_PROGRESS and gets a state error.
    pub async fn accept(&self, offer_id: Uuid, actor: &str) -> MarketResult<Acceptance> {
        let mut tx = self.pool.begin().await?;
        let (mut job, mut offer) = lock_offer_and_job(&mut tx, offer_id).await?;

        let sibling_rows = sqlx::query_as::<_, OfferRow>(
            r#"
            SELECT *
            FROM job_offers
            WHERE job_id = $1 AND id <> $2 AND status = 'PENDING'
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#,
        )
        .bind(job.id)
        .bind(offer_id)
        .fetch_all(&mut *tx)
        .await?;
        let mut siblings = sibling_rows
            .into_iter()
            .map(Offer::try_from)
            .collect::<MarketResult<Vec<_>>>()?;

        let now = Utc::now();
        let rejected = negotiation::accept(&mut job, &mut offer, &mut siblings, actor, now)?;

        let offer = save_offer(&mut tx, &offer).await?;
        if !rejected.is_empty() {
            sqlx::query(
                r#"
                UPDATE job_offers
                SET status = 'REJECTED',
                    updated_at = $2
                WHERE id = ANY($1) AND status = 'PENDING'
                "#,
            )
            .bind(&rejected)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        let job = save_job(&mut tx, &job).await?;
        tx.commit().await?;

        tracing::info!(
            offer_id = %offer_id,
            job_id = %job.id,
            claimant = %offer.beneficiary(),
            rejected = rejected.len(),
            "offer accepted"
        );
        Ok(Acceptance {
            job,
            offer,
            rejected_offer_ids: rejected,
        })
    }

    /// Rejects `offer_id` and files the poster's own terms in its place.
    pub async fn counter(
        &self,
        offer_id: Uuid,
        actor: &str,
        input: NewOffer,
    ) -> MarketResult<CounterOffer> {
        let mut tx = self.pool.begin().await?;
        let (job, mut original) = lock_offer_and_job(&mut tx, offer_id).await?;

        let input = negotiation::counter(&job, &mut original, actor, input, Utc::now())?;
        let original = save_offer(&mut tx, &original).await?;
        let addressee = Some(original.offered_by_id.as_str());
        let counter = insert_offer(&mut tx, job.id, actor, addressee, &input).await?;
        tx.commit().await?;

        tracing::info!(offer_id = %offer_id, counter_id = %counter.id, job_id = %job.id, "counter-offer sent");
        Ok(CounterOffer { original, counter })
    }
}

async fn insert_offer(
    tx: &mut Transaction<'_, Postgres>,
    job_id: Uuid,
    proposer: &str,
    counter_to: Option<&str>,
    input: &NewOffer,
) -> MarketResult<Offer> {
    let row = sqlx::query_as::<_, OfferRow>(
        r#"
        INSERT INTO job_offers (
            id, job_id, offered_by_id, offered_by_email,
            payment_type, amount_cents, in_kind_description, message,
            counter_to_id, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job_id)
    .bind(proposer)
    .bind(&input.offered_by_email)
    .bind(input.payment_type.as_str())
    .bind(input.amount_cents)
    .bind(&input.in_kind_description)
    .bind(&input.message)
    .bind(counter_to)
    .bind(OfferStatus::Pending.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Offer::try_from(row)
}

async fn lock_offer(tx: &mut Transaction<'_, Postgres>, offer_id: Uuid) -> MarketResult<Offer> {
    let row = sqlx::query_as::<_, OfferRow>("SELECT * FROM job_offers WHERE id = $1 FOR UPDATE")
        .bind(offer_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| MarketError::offer_not_found(offer_id))?;
    Offer::try_from(row)
}

/// Locks the parent job before the offer, the same order acceptance uses.
async fn lock_offer_and_job(
    tx: &mut Transaction<'_, Postgres>,
    offer_id: Uuid,
) -> MarketResult<(Job, Offer)> {
    let job_id: Uuid = sqlx::query_scalar("SELECT job_id FROM job_offers WHERE id = $1")
        .bind(offer_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| MarketError::offer_not_found(offer_id))?;

    let job = lock_job(tx, job_id).await?;
    let offer = lock_offer(tx, offer_id).await?;
    Ok((job, offer))
}

async fn save_offer(tx: &mut Transaction<'_, Postgres>, offer: &Offer) -> MarketResult<Offer> {
    let row = sqlx::query_as::<_, OfferRow>(
        r#"
        UPDATE job_offers
        SET status = $2,
            updated_at = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(offer.id)
    .bind(offer.status.as_str())
    .bind(offer.updated_at)
    .fetch_one(&mut **tx)
    .await?;
    Offer::try_from(row)
}
