use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MarketResult;
use crate::jobs::repo::MAX_LIST_LIMIT;
use crate::jobs::{Job, JobFilter, JobsRepo};
use crate::offers::{Offer, OfferFilter, OffersRepo};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where the live view gets its full listings from.
pub trait MarketSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_jobs<'a>(
        &'a self,
        filter: &'a JobFilter,
        limit: i64,
    ) -> BoxFuture<'a, MarketResult<Vec<Job>>>;

    fn fetch_offers<'a>(
        &'a self,
        filter: &'a OfferFilter,
        limit: i64,
    ) -> BoxFuture<'a, MarketResult<Vec<Offer>>>;
}

/// The Postgres tables.
#[derive(Clone)]
pub struct PgSource {
    jobs: JobsRepo,
    offers: OffersRepo,
}

impl PgSource {
    pub fn new(jobs: JobsRepo, offers: OffersRepo) -> Self {
        Self { jobs, offers }
    }
}

impl MarketSource for PgSource {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn fetch_jobs<'a>(
        &'a self,
        filter: &'a JobFilter,
        limit: i64,
    ) -> BoxFuture<'a, MarketResult<Vec<Job>>> {
        Box::pin(self.jobs.list_jobs(filter, limit))
    }

    fn fetch_offers<'a>(
        &'a self,
        filter: &'a OfferFilter,
        limit: i64,
    ) -> BoxFuture<'a, MarketResult<Vec<Offer>>> {
        Box::pin(self.offers.list(filter, limit))
    }
}

/// Read-only data set loaded once from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticSource {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

const DEMO_DATA: &str = include_str!("../../demo/jobs.json");

impl StaticSource {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The demo board shipped with the crate.
    pub fn demo() -> anyhow::Result<Self> {
        Self::from_json(DEMO_DATA)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn jobs_matching(&self, filter: &JobFilter, limit: i64) -> Vec<Job> {
        let mut out: Vec<Job> = self.jobs.iter().filter(|j| filter.matches(j)).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit.max(1) as usize);
        out
    }

    pub fn offers_matching(&self, filter: &OfferFilter, limit: i64) -> Vec<Offer> {
        let mut out: Vec<Offer> = self.offers.iter().filter(|o| filter.matches(o)).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit.max(1) as usize);
        out
    }
}

impl MarketSource for StaticSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn fetch_jobs<'a>(
        &'a self,
        filter: &'a JobFilter,
        limit: i64,
    ) -> BoxFuture<'a, MarketResult<Vec<Job>>> {
        Box::pin(async move { Ok(self.jobs_matching(filter, limit)) })
    }

    fn fetch_offers<'a>(
        &'a self,
        filter: &'a OfferFilter,
        limit: i64,
    ) -> BoxFuture<'a, MarketResult<Vec<Offer>>> {
        Box::pin(async move { Ok(self.offers_matching(filter, limit)) })
    }
}

/// Rows plus where they came from.
#[derive(Debug, Clone, Serialize)]
pub struct Fetched<T> {
    pub data: T,
    pub source: &'static str,
    /// Served by the fallback: read-only and possibly stale.
    pub degraded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub jobs: Vec<Job>,
    pub offers: Vec<Offer>,
}

/// Primary first; the fallback answers when the primary errors or the
/// caller already knows the primary is gone. The two are never merged.
#[derive(Clone)]
pub struct FallbackSource {
    primary: Arc<dyn MarketSource>,
    fallback: Arc<dyn MarketSource>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn MarketSource>, fallback: Arc<dyn MarketSource>) -> Self {
        Self { primary, fallback }
    }

    pub async fn jobs(&self, filter: &JobFilter, limit: i64) -> MarketResult<Fetched<Vec<Job>>> {
        match self.primary.fetch_jobs(filter, limit).await {
            Ok(data) => Ok(self.from_primary(data)),
            Err(e) => {
                tracing::warn!(error = %e, source = self.primary.name(), "job listing failed; using fallback");
                self.fallback_jobs(filter, limit).await.map_err(|_| e)
            }
        }
    }

    pub async fn offers(&self, filter: &OfferFilter, limit: i64) -> MarketResult<Fetched<Vec<Offer>>> {
        match self.primary.fetch_offers(filter, limit).await {
            Ok(data) => Ok(self.from_primary(data)),
            Err(e) => {
                tracing::warn!(error = %e, source = self.primary.name(), "offer listing failed; using fallback");
                let data = self.fallback.fetch_offers(filter, limit).await.map_err(|_| e)?;
                Ok(self.from_fallback(data))
            }
        }
    }

    /// Full reload for the live view: jobs through `filter`, then the
    /// offers on exactly those jobs. With `primary_lost` set the primary
    /// is not even tried.
    pub async fn snapshot(
        &self,
        filter: &JobFilter,
        limit: i64,
        primary_lost: bool,
    ) -> MarketResult<Fetched<Snapshot>> {
        if !primary_lost {
            match load_snapshot(self.primary.as_ref(), filter, limit).await {
                Ok(snapshot) => return Ok(self.from_primary(snapshot)),
                Err(e) => {
                    tracing::warn!(error = %e, source = self.primary.name(), "reload failed; using fallback")
                }
            }
        }

        let snapshot = load_snapshot(self.fallback.as_ref(), filter, limit).await?;
        Ok(self.from_fallback(snapshot))
    }

    async fn fallback_jobs(&self, filter: &JobFilter, limit: i64) -> MarketResult<Fetched<Vec<Job>>> {
        let data = self.fallback.fetch_jobs(filter, limit).await?;
        Ok(self.from_fallback(data))
    }

    fn from_primary<T>(&self, data: T) -> Fetched<T> {
        Fetched {
            data,
            source: self.primary.name(),
            degraded: false,
        }
    }

    fn from_fallback<T>(&self, data: T) -> Fetched<T> {
        Fetched {
            data,
            source: self.fallback.name(),
            degraded: true,
        }
    }
}

async fn load_snapshot(
    source: &dyn MarketSource,
    filter: &JobFilter,
    limit: i64,
) -> MarketResult<Snapshot> {
    let jobs = source.fetch_jobs(filter, limit).await?;
    if jobs.is_empty() {
        return Ok(Snapshot { jobs, offers: Vec::new() });
    }
    let on_visible = OfferFilter::on_jobs(jobs.iter().map(|j| j.id).collect());
    let offers = source.fetch_offers(&on_visible, MAX_LIST_LIMIT).await?;
    Ok(Snapshot { jobs, offers })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::MarketError;

    /// Primary that is always down.
    pub(crate) struct Unreachable;

    impl MarketSource for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn fetch_jobs<'a>(&'a self, _: &'a JobFilter, _: i64) -> BoxFuture<'a, MarketResult<Vec<Job>>> {
            Box::pin(async { Err(MarketError::Backend(sqlx::Error::PoolTimedOut)) })
        }

        fn fetch_offers<'a>(
            &'a self,
            _: &'a OfferFilter,
            _: i64,
        ) -> BoxFuture<'a, MarketResult<Vec<Offer>>> {
            Box::pin(async { Err(MarketError::Backend(sqlx::Error::PoolTimedOut)) })
        }
    }
}
