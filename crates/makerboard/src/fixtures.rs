use chrono::Utc;
use uuid::Uuid;

use crate::jobs::model::{Job, JobCategory, JobStatus};
use crate::jobs::terms::{PaymentTerms, PaymentType};
use crate::offers::model::{Offer, OfferStatus};

/// $50 laser-cutting bounty nobody has picked up yet.
pub(crate) fn open_job(poster: &str) -> Job {
    let now = Utc::now();
    Job {
        id: Uuid::new_v4(),
        title: "Laser cut box".into(),
        category: JobCategory::LaserCutting,
        description: "Finger-joint box, 3mm plywood".into(),
        payment_type: PaymentType::Monetary,
        budget_cents: Some(5000),
        currency: "USD".into(),
        in_kind_description: None,
        service_type: None,
        is_standard_rate: false,
        status: JobStatus::Open,
        posted_by_id: poster.into(),
        posted_by_email: Some(format!("{poster}@makers.test")),
        claimed_by_id: None,
        deliverable_url: None,
        deadline_at: None,
        claimed_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn pending_offer(job: &Job, proposer: &str, terms: PaymentTerms) -> Offer {
    let now = Utc::now();
    Offer {
        id: Uuid::new_v4(),
        job_id: job.id,
        offered_by_id: proposer.into(),
        offered_by_email: Some(format!("{proposer}@makers.test")),
        payment_type: terms.payment_type,
        amount_cents: terms.amount_cents,
        in_kind_description: terms.in_kind_description,
        message: None,
        counter_to_id: None,
        status: OfferStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}
