use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MarketError;
use crate::jobs::terms::{PaymentTerms, PaymentType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "PENDING",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Rejected => "REJECTED",
            OfferStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(OfferStatus::Pending),
            "ACCEPTED" => Some(OfferStatus::Accepted),
            "REJECTED" => Some(OfferStatus::Rejected),
            "WITHDRAWN" => Some(OfferStatus::Withdrawn),
            _ => None,
        }
    }
}

/// A counter-proposal against a job. Serialized with the `job_offers`
/// column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub job_id: Uuid,
    pub offered_by_id: String,
    pub offered_by_email: Option<String>,

    pub payment_type: PaymentType,
    pub amount_cents: Option<i64>,
    pub in_kind_description: Option<String>,
    pub message: Option<String>,
    /// Set on counter-offers: the member the poster is answering.
    #[serde(default)]
    pub counter_to_id: Option<String>,

    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    pub fn terms(&self) -> PaymentTerms {
        PaymentTerms {
            payment_type: self.payment_type,
            amount_cents: self.amount_cents,
            in_kind_description: self.in_kind_description.clone(),
        }
    }

    /// How the proposer is addressed in messages: email when known.
    pub fn proposer_contact(&self) -> &str {
        self.offered_by_email.as_deref().unwrap_or(&self.offered_by_id)
    }

    pub fn is_counter(&self) -> bool {
        self.counter_to_id.is_some()
    }

    /// Who gets the job if this offer is accepted.
    pub fn beneficiary(&self) -> &str {
        self.counter_to_id.as_deref().unwrap_or(&self.offered_by_id)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OfferRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub offered_by_id: String,
    pub offered_by_email: Option<String>,
    pub payment_type: String,
    pub amount_cents: Option<i64>,
    pub in_kind_description: Option<String>,
    pub message: Option<String>,
    pub counter_to_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = MarketError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let payment_type = PaymentType::parse(&row.payment_type).ok_or_else(|| {
            MarketError::MalformedRow(format!(
                "offer {}: unknown payment_type {:?}",
                row.id, row.payment_type
            ))
        })?;
        let status = OfferStatus::parse(&row.status).ok_or_else(|| {
            MarketError::MalformedRow(format!("offer {}: unknown status {:?}", row.id, row.status))
        })?;

        Ok(Offer {
            id: row.id,
            job_id: row.job_id,
            offered_by_id: row.offered_by_id,
            offered_by_email: row.offered_by_email,
            payment_type,
            amount_cents: row.amount_cents,
            in_kind_description: row.in_kind_description,
            message: row.message,
            counter_to_id: row.counter_to_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Terms a member proposes; job and proposer come from the route and the
/// caller's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOffer {
    pub payment_type: PaymentType,
    pub amount_cents: Option<i64>,
    pub in_kind_description: Option<String>,
    pub message: Option<String>,
    pub offered_by_email: Option<String>,
}

impl NewOffer {
    pub fn monetary(amount_cents: i64) -> Self {
        Self {
            payment_type: PaymentType::Monetary,
            amount_cents: Some(amount_cents),
            in_kind_description: None,
            message: None,
            offered_by_email: None,
        }
    }

    pub fn terms(&self) -> PaymentTerms {
        PaymentTerms {
            payment_type: self.payment_type,
            amount_cents: self.amount_cents,
            in_kind_description: self.in_kind_description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferFilter {
    pub job_id: Option<Uuid>,
    pub offered_by: Option<String>,
    pub status: Option<OfferStatus>,
    /// Restricts to offers on any of these jobs.
    #[serde(default)]
    pub job_ids: Option<Vec<Uuid>>,
}

impl OfferFilter {
    pub fn for_job(job_id: Uuid) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::default()
        }
    }

    /// Offers on the given jobs, e.g. whatever a filtered job listing kept.
    pub fn on_jobs(job_ids: Vec<Uuid>) -> Self {
        Self {
            job_ids: Some(job_ids),
            ..Self::default()
        }
    }

    pub fn matches(&self, offer: &Offer) -> bool {
        self.job_id.map_or(true, |id| offer.job_id == id)
            && self
                .offered_by
                .as_deref()
                .map_or(true, |who| offer.offered_by_id == who)
            && self.status.map_or(true, |s| offer.status == s)
            && self
                .job_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&offer.job_id))
    }
}
