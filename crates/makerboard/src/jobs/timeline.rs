use crate::error::MarketResult;
use crate::jobs::model::{Job, JobStatus};
use crate::jobs::JobsRepo;
use crate::offers::{Offer, OfferStatus, OffersRepo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct JobTimeline {
    pub job_id: Uuid,
    pub title: String,
    pub status: JobStatus,
    pub posted_by_id: String,
    pub claimed_by_id: Option<String>,
    pub pending_offers: usize,

    /// Ordered narrative of everything that happened to the job.
    pub story: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum TimelineEvent {
    Posted {
        at: DateTime<Utc>,
        by: String,
        terms: String,
    },
    OfferSubmitted {
        at: DateTime<Utc>,
        offer_id: Uuid,
        by: String,
        terms: String,
        message: Option<String>,
    },
    OfferResolved {
        at: DateTime<Utc>,
        offer_id: Uuid,
        by: String,
        outcome: OfferStatus,
    },
    Claimed {
        at: DateTime<Utc>,
        by: String,
    },
    Completed {
        at: DateTime<Utc>,
        by: Option<String>,
        deliverable_url: Option<String>,
    },
    Cancelled {
        at: DateTime<Utc>,
    },
}

impl TimelineEvent {
    fn at(&self) -> DateTime<Utc> {
        match self {
            TimelineEvent::Posted { at, .. }
            | TimelineEvent::OfferSubmitted { at, .. }
            | TimelineEvent::OfferResolved { at, .. }
            | TimelineEvent::Claimed { at, .. }
            | TimelineEvent::Completed { at, .. }
            | TimelineEvent::Cancelled { at } => *at,
        }
    }

    // tie-break for equal timestamps: an acceptance and the claim it causes
    // share `now`, and the claim reads better second
    fn rank(&self) -> u8 {
        match self {
            TimelineEvent::Posted { .. } => 0,
            TimelineEvent::OfferSubmitted { .. } => 1,
            TimelineEvent::OfferResolved { .. } => 2,
            TimelineEvent::Claimed { .. } => 3,
            TimelineEvent::Completed { .. } | TimelineEvent::Cancelled { .. } => 4,
        }
    }
}

/// Assembles the timeline from a job and the offers made on it.
///
/// Built from current row state only. A claim that was released is not
/// recorded anywhere, so it leaves no `Claimed` event; only the current
/// claim (if any) shows up.
pub fn assemble(job: &Job, offers: &[Offer]) -> JobTimeline {
    let mut story = vec![TimelineEvent::Posted {
        at: job.created_at,
        by: job.posted_by_id.clone(),
        terms: job.terms().summary(),
    }];

    for o in offers.iter().filter(|o| o.job_id == job.id) {
        story.push(TimelineEvent::OfferSubmitted {
            at: o.created_at,
            offer_id: o.id,
            by: o.offered_by_id.clone(),
            terms: o.terms().summary(),
            message: o.message.clone(),
        });

        let resolved_by = match o.status {
            OfferStatus::Pending => None,
            OfferStatus::Withdrawn => Some(o.offered_by_id.clone()),
            OfferStatus::Accepted => Some(
                o.counter_to_id
                    .clone()
                    .unwrap_or_else(|| job.posted_by_id.clone()),
            ),
            OfferStatus::Rejected => Some(job.posted_by_id.clone()),
        };
        if let Some(by) = resolved_by {
            story.push(TimelineEvent::OfferResolved {
                at: o.updated_at,
                offer_id: o.id,
                by,
                outcome: o.status,
            });
        }
    }

    if let (Some(at), Some(by)) = (job.claimed_at, job.claimed_by_id.as_ref()) {
        story.push(TimelineEvent::Claimed { at, by: by.clone() });
    }

    match job.status {
        JobStatus::Completed => story.push(TimelineEvent::Completed {
            at: job.completed_at.unwrap_or(job.updated_at),
            by: job.claimed_by_id.clone(),
            deliverable_url: job.deliverable_url.clone(),
        }),
        JobStatus::Cancelled => story.push(TimelineEvent::Cancelled { at: job.updated_at }),
        JobStatus::Open | JobStatus::InProgress => {}
    }

    // stable sort keeps offer order for identical timestamps
    story.sort_by(|a, b| a.at().cmp(&b.at()).then(a.rank().cmp(&b.rank())));

    JobTimeline {
        job_id: job.id,
        title: job.title.clone(),
        status: job.status,
        posted_by_id: job.posted_by_id.clone(),
        claimed_by_id: job.claimed_by_id.clone(),
        pending_offers: offers
            .iter()
            .filter(|o| o.job_id == job.id && o.status == OfferStatus::Pending)
            .count(),
        story,
    }
}

pub async fn build_timeline(
    jobs: &JobsRepo,
    offers: &OffersRepo,
    job_id: Uuid,
) -> MarketResult<Option<JobTimeline>> {
    let job = match jobs.get_job(job_id).await? {
        Some(j) => j,
        None => return Ok(None),
    };

    let mut job_offers = offers.list_for_job(job_id).await?;
    job_offers.reverse(); // oldest first

    Ok(Some(assemble(&job, &job_offers)))
}
