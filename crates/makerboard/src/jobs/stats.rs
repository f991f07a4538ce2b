use crate::error::MarketResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Board-wide counts for the dashboard.
#[derive(Debug, Serialize, FromRow, PartialEq, Eq)]
pub struct BoardStats {
    pub open: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    /// Cash currently on offer across OPEN jobs.
    pub open_value_cents: i64,
    pub pending_offers: i64,
}

/// One member's side of the board, as poster and as worker.
#[derive(Debug, Serialize, FromRow, PartialEq, Eq)]
pub struct MemberStats {
    pub posted: i64,
    pub posted_open: i64,
    pub posted_completed: i64,
    pub spent_cents: i64,

    pub active_claims: i64,
    pub claims_completed: i64,
    pub earned_cents: i64,

    pub pending_offers: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsSnapshot<T> {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: T,
}

#[derive(Clone)]
pub struct StatsRepo {
    pool: PgPool,
}

impl StatsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn board(&self) -> MarketResult<StatsSnapshot<BoardStats>> {
        let stats = sqlx::query_as::<_, BoardStats>(
            r#"
            SELECT
              COUNT(*) FILTER (WHERE status = 'OPEN')        AS open,
              COUNT(*) FILTER (WHERE status = 'IN_PROGRESS') AS in_progress,
              COUNT(*) FILTER (WHERE status = 'COMPLETED')   AS completed,
              COUNT(*) FILTER (WHERE status = 'CANCELLED')   AS cancelled,
              COALESCE(SUM(budget_cents) FILTER (WHERE status = 'OPEN'), 0)::bigint AS open_value_cents,
              (SELECT COUNT(*) FROM job_offers WHERE status = 'PENDING') AS pending_offers
            FROM jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StatsSnapshot {
            at: Utc::now(),
            stats,
        })
    }

    pub async fn member(&self, member_id: &str) -> MarketResult<StatsSnapshot<MemberStats>> {
        let stats = sqlx::query_as::<_, MemberStats>(
            r#"
            SELECT
              COUNT(*) FILTER (WHERE posted_by_id = $1) AS posted,
              COUNT(*) FILTER (WHERE posted_by_id = $1 AND status = 'OPEN') AS posted_open,
              COUNT(*) FILTER (WHERE posted_by_id = $1 AND status = 'COMPLETED') AS posted_completed,
              COALESCE(SUM(budget_cents) FILTER (WHERE posted_by_id = $1 AND status = 'COMPLETED'), 0)::bigint
                AS spent_cents,
              COUNT(*) FILTER (WHERE claimed_by_id = $1 AND status = 'IN_PROGRESS') AS active_claims,
              COUNT(*) FILTER (WHERE claimed_by_id = $1 AND status = 'COMPLETED') AS claims_completed,
              COALESCE(SUM(budget_cents) FILTER (WHERE claimed_by_id = $1 AND status = 'COMPLETED'), 0)::bigint
                AS earned_cents,
              (SELECT COUNT(*) FROM job_offers WHERE offered_by_id = $1 AND status = 'PENDING')
                AS pending_offers
            FROM jobs
            "#,
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(StatsSnapshot {
            at: Utc::now(),
            stats,
        })
    }
}
