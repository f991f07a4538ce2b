// crates/makerboard/src/api/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::{standard_rates, JobCategory, JobFilter, JobStatus, PaymentType, StandardRate};
use crate::offers::{OfferFilter, OfferStatus};
use crate::sync::{Fetched, Notice, ViewSnapshot};

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub category: Option<JobCategory>,
    pub payment_type: Option<PaymentType>,
    pub status: Option<JobStatus>,
    pub q: Option<String>,
    pub posted_by: Option<String>,
    pub claimed_by: Option<String>,
    pub limit: Option<i64>,
}

impl ListJobsQuery {
    pub fn filter(&self) -> JobFilter {
        JobFilter {
            category: self.category,
            payment_type: self.payment_type,
            status: self.status,
            search: self.q.clone(),
            posted_by: self.posted_by.clone(),
            claimed_by: self.claimed_by.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOffersQuery {
    pub job_id: Option<Uuid>,
    pub offered_by: Option<String>,
    pub status: Option<OfferStatus>,
    pub limit: Option<i64>,
}

impl ListOffersQuery {
    pub fn filter(&self) -> OfferFilter {
        OfferFilter {
            job_id: self.job_id,
            offered_by: self.offered_by.clone(),
            status: self.status,
            job_ids: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub deliverable_url: Option<String>,
}

/// A listing plus the source that answered it.
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub source: &'static str,
    pub degraded: bool,
    /// Warning to show next to a degraded listing.
    pub notice: Option<Notice>,
}

impl<T> From<Fetched<Vec<T>>> for Listing<T> {
    fn from(fetched: Fetched<Vec<T>>) -> Self {
        Self {
            items: fetched.data,
            source: fetched.source,
            degraded: fetched.degraded,
            notice: fetched.degraded.then(Notice::degraded),
        }
    }
}

/// Every mutation answers with the stored record and a notice to show.
#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub data: T,
    pub notice: Notice,
}

#[derive(Debug, Serialize)]
pub struct CodeLabel {
    pub code: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Catalog {
    pub categories: Vec<CodeLabel>,
    pub payment_types: Vec<CodeLabel>,
    pub standard_rates: Vec<StandardRate>,
}

impl Catalog {
    pub fn current() -> Self {
        Self {
            categories: JobCategory::ALL
                .iter()
                .map(|c| CodeLabel {
                    code: c.as_str(),
                    label: c.label(),
                })
                .collect(),
            payment_types: PaymentType::ALL
                .iter()
                .map(|p| CodeLabel {
                    code: p.as_str(),
                    label: p.label(),
                })
                .collect(),
            standard_rates: standard_rates(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LiveListing<T> {
    pub items: Vec<T>,
    pub filter: JobFilter,
    pub source: Option<&'static str>,
    pub degraded: bool,
}

/// One websocket frame on `/live/ws`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveFrame {
    Notice(Notice),
    Snapshot(ViewSnapshot),
}
