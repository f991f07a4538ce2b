use serde::{Deserialize, Serialize};

use crate::jobs::model::{Job, JobCategory, JobStatus};
use crate::jobs::terms::PaymentType;

/// Board filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFilter {
    pub category: Option<JobCategory>,
    pub payment_type: Option<PaymentType>,
    pub status: Option<JobStatus>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    pub posted_by: Option<String>,
    pub claimed_by: Option<String>,
}

impl JobFilter {
    pub fn is_empty(&self) -> bool {
        let normalized = JobFilter {
            search: self.search_term(),
            ..self.clone()
        };
        normalized == JobFilter::default()
    }

    /// Trimmed, lowercased search text; blank counts as no search.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    pub fn matches(&self, job: &Job) -> bool {
        if self.category.is_some_and(|c| c != job.category) {
            return false;
        }
        if self.payment_type.is_some_and(|p| p != job.payment_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != job.status) {
            return false;
        }
        if let Some(poster) = self.posted_by.as_deref() {
            if job.posted_by_id != poster {
                return false;
            }
        }
        if let Some(claimant) = self.claimed_by.as_deref() {
            if job.claimed_by_id.as_deref() != Some(claimant) {
                return false;
            }
        }
        match self.search_term() {
            Some(term) => {
                job.title.to_lowercase().contains(&term)
                    || job.description.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::open_job;

    #[test]
    fn empty_filter_matches_everything() {
        let filter = JobFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&open_job("poster")));

        let blank_search = JobFilter {
            search: Some("   ".into()),
            ..JobFilter::default()
        };
        assert!(blank_search.is_empty());
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let job = open_job("poster");
        let by_title = JobFilter {
            search: Some("LASER".into()),
            ..JobFilter::default()
        };
        let by_description = JobFilter {
            search: Some("plywood".into()),
            ..JobFilter::default()
        };
        let miss = JobFilter {
            search: Some("resin".into()),
            ..JobFilter::default()
        };
        assert!(by_title.matches(&job));
        assert!(by_description.matches(&job));
        assert!(!miss.matches(&job));
    }

    #[test]
    fn fields_combine_with_and() {
        let job = open_job("poster");
        let filter = JobFilter {
            category: Some(JobCategory::LaserCutting),
            status: Some(JobStatus::Open),
            posted_by: Some("poster".into()),
            ..JobFilter::default()
        };
        assert!(filter.matches(&job));

        let wrong_status = JobFilter {
            status: Some(JobStatus::Completed),
            ..filter.clone()
        };
        assert!(!wrong_status.matches(&job));

        let claimed_by = JobFilter {
            claimed_by: Some("maker".into()),
            ..JobFilter::default()
        };
        assert!(!claimed_by.matches(&job));
    }
}
