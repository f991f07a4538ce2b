use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, ValidationError};
use crate::jobs::rates::ServiceType;
use crate::jobs::terms::{PaymentTerms, PaymentType, CURRENCY};

pub const MAX_TITLE_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobCategory {
    #[serde(rename = "3D_PRINTING")]
    ThreeDPrinting,
    #[serde(rename = "LASER_CUTTING")]
    LaserCutting,
    #[serde(rename = "DESIGN_HELP")]
    DesignHelp,
    #[serde(rename = "CONSULTATION")]
    Consultation,
    #[serde(rename = "OTHER")]
    Other,
}

impl JobCategory {
    pub const ALL: [JobCategory; 5] = [
        JobCategory::ThreeDPrinting,
        JobCategory::LaserCutting,
        JobCategory::DesignHelp,
        JobCategory::Consultation,
        JobCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobCategory::ThreeDPrinting => "3D_PRINTING",
            JobCategory::LaserCutting => "LASER_CUTTING",
            JobCategory::DesignHelp => "DESIGN_HELP",
            JobCategory::Consultation => "CONSULTATION",
            JobCategory::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "3D_PRINTING" => Some(JobCategory::ThreeDPrinting),
            "LASER_CUTTING" => Some(JobCategory::LaserCutting),
            "DESIGN_HELP" => Some(JobCategory::DesignHelp),
            "CONSULTATION" => Some(JobCategory::Consultation),
            "OTHER" => Some(JobCategory::Other),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobCategory::ThreeDPrinting => "3D Printing",
            JobCategory::LaserCutting => "Laser Cutting",
            JobCategory::DesignHelp => "Design Help",
            JobCategory::Consultation => "Consultation",
            JobCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "OPEN",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Some(JobStatus::Open),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "COMPLETED" => Some(JobStatus::Completed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Open => "Open",
            JobStatus::InProgress => "In Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Statuses in which the job has a claimant.
    pub fn is_claimed(&self) -> bool {
        matches!(self, JobStatus::InProgress | JobStatus::Completed)
    }
}

/// A posted unit of work. Serializes with the same field names and codes
/// as the `jobs` table, so change-feed rows decode straight into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub category: JobCategory,
    #[serde(default)]
    pub description: String,

    pub payment_type: PaymentType,
    pub budget_cents: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub in_kind_description: Option<String>,
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub is_standard_rate: bool,

    pub status: JobStatus,
    pub posted_by_id: String,
    pub posted_by_email: Option<String>,
    pub claimed_by_id: Option<String>,
    pub deliverable_url: Option<String>,

    pub deadline_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_currency() -> String {
    CURRENCY.to_string()
}

impl Job {
    pub fn terms(&self) -> PaymentTerms {
        PaymentTerms {
            payment_type: self.payment_type,
            amount_cents: self.budget_cents,
            in_kind_description: self.in_kind_description.clone(),
        }
    }

    pub fn is_posted_by(&self, member_id: &str) -> bool {
        self.posted_by_id == member_id
    }

    pub fn is_claimed_by(&self, member_id: &str) -> bool {
        self.claimed_by_id.as_deref() == Some(member_id)
    }

    /// Returns the first broken record invariant, if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        let claimed = self.status.is_claimed();
        if claimed != self.claimed_by_id.is_some() {
            return Err(format!(
                "status {} but claimant is {:?}",
                self.status.as_str(),
                self.claimed_by_id
            ));
        }
        if self.claimed_at.is_some() != self.claimed_by_id.is_some() {
            return Err("claimed_at set without claimant (or the reverse)".into());
        }
        let completed = self.status == JobStatus::Completed;
        if completed != self.completed_at.is_some() {
            return Err(format!(
                "status {} but completed_at is {:?}",
                self.status.as_str(),
                self.completed_at
            ));
        }
        if self.deliverable_url.is_some() && !completed {
            return Err("deliverable attached to a job that is not completed".into());
        }
        if self.payment_type.needs_amount() && self.budget_cents.is_none() {
            return Err("budget missing for a monetary job".into());
        }
        if self.payment_type.needs_in_kind() && self.in_kind_description.is_none() {
            return Err("in-kind description missing for a barter job".into());
        }
        if self.currency != CURRENCY {
            return Err(format!("unsupported currency {}", self.currency));
        }
        Ok(())
    }
}

/// Raw `jobs` row. Enumerations come back as their text codes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub payment_type: String,
    pub budget_cents: Option<i64>,
    pub currency: String,
    pub in_kind_description: Option<String>,
    pub service_type: Option<String>,
    pub is_standard_rate: bool,
    pub status: String,
    pub posted_by_id: String,
    pub posted_by_email: Option<String>,
    pub claimed_by_id: Option<String>,
    pub deliverable_url: Option<String>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = MarketError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let bad = |what: &str, value: &str| {
            MarketError::MalformedRow(format!("job {}: unknown {what} {value:?}", row.id))
        };

        let category = JobCategory::parse(&row.category).ok_or_else(|| bad("category", &row.category))?;
        let payment_type =
            PaymentType::parse(&row.payment_type).ok_or_else(|| bad("payment_type", &row.payment_type))?;
        let status = JobStatus::parse(&row.status).ok_or_else(|| bad("status", &row.status))?;
        let service_type = match row.service_type.as_deref() {
            Some(s) => Some(ServiceType::parse(s).ok_or_else(|| bad("service_type", s))?),
            None => None,
        };

        Ok(Job {
            id: row.id,
            title: row.title,
            category,
            description: row.description,
            payment_type,
            budget_cents: row.budget_cents,
            currency: row.currency,
            in_kind_description: row.in_kind_description,
            service_type,
            is_standard_rate: row.is_standard_rate,
            status,
            posted_by_id: row.posted_by_id,
            posted_by_email: row.posted_by_email,
            claimed_by_id: row.claimed_by_id,
            deliverable_url: row.deliverable_url,
            deadline_at: row.deadline_at,
            claimed_at: row.claimed_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// What a poster submits. The poster's id comes from the identity
/// provider, never from the request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub category: JobCategory,
    #[serde(default)]
    pub description: String,
    pub payment_type: PaymentType,
    pub budget_cents: Option<i64>,
    pub in_kind_description: Option<String>,
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub is_standard_rate: bool,
    pub deadline_at: Option<DateTime<Utc>>,
    pub posted_by_email: Option<String>,
}

impl NewJob {
    pub fn monetary(title: &str, category: JobCategory, budget_cents: i64) -> Self {
        Self {
            title: title.to_string(),
            category,
            description: String::new(),
            payment_type: PaymentType::Monetary,
            budget_cents: Some(budget_cents),
            in_kind_description: None,
            service_type: None,
            is_standard_rate: false,
            deadline_at: None,
            posted_by_email: None,
        }
    }

    /// Normalizes the submission or reports the first field that is wrong.
    ///
    /// Standard-rate jobs take the catalog base rate as their budget no
    /// matter what was typed in.
    pub fn validate(mut self, now: DateTime<Utc>) -> Result<NewJob, ValidationError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(ValidationError::missing("title"));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::invalid(
                "title",
                format!("must be at most {MAX_TITLE_LEN} characters"),
            ));
        }
        self.description = self.description.trim().to_string();

        self.posted_by_email = normalize_email(self.posted_by_email.take(), "posted_by_email")?;

        if let Some(deadline) = self.deadline_at {
            if deadline <= now {
                return Err(ValidationError::invalid("deadline_at", "must be in the future"));
            }
        }

        if let Some(service) = self.service_type {
            if service.category() != self.category {
                return Err(ValidationError::invalid(
                    "service_type",
                    format!("{} is not offered under {}", service.as_str(), self.category.label()),
                ));
            }
        }

        let standard_rate = if self.is_standard_rate {
            let service = self
                .service_type
                .ok_or_else(|| ValidationError::missing("service_type"))?;
            Some(service.base_rate_cents())
        } else {
            None
        };

        let terms = PaymentTerms {
            payment_type: self.payment_type,
            amount_cents: standard_rate.or(self.budget_cents),
            in_kind_description: self.in_kind_description.take(),
        }
        .normalized("budget_cents")?;

        self.budget_cents = standard_rate.or(terms.amount_cents);
        self.in_kind_description = terms.in_kind_description;
        Ok(self)
    }
}

/// Contact addresses are optional, but when given they have to look like one.
pub(crate) fn normalize_email(
    email: Option<String>,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    match email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(e) if !e.contains('@') => Err(ValidationError::invalid(field, "must be an email address")),
        other => Ok(other),
    }
}
