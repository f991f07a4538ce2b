//! Job status transitions.
//!
//! ```text
//!   OPEN ──claim / accept offer──▶ IN_PROGRESS ──complete──▶ COMPLETED
//!    │  ◀────────release─────────────┘
//!    └──cancel──▶ CANCELLED
//! ```
//!
//! Every function checks the current status first and the actor's
//! relationship to the job second, and only touches the job once both
//! checks pass.

use chrono::{DateTime, Utc};

use crate::error::{MarketError, MarketResult, ValidationError};
use crate::jobs::model::{Job, JobStatus};

fn require_status(job: &Job, expected: JobStatus, action: &'static str) -> MarketResult<()> {
    if job.status != expected {
        return Err(MarketError::InvalidState {
            entity: "job",
            id: job.id,
            status: job.status.as_str(),
            action,
        });
    }
    Ok(())
}

/// Direct claim by a member, no negotiation.
pub fn claim(job: &mut Job, actor: &str, now: DateTime<Utc>) -> MarketResult<()> {
    require_status(job, JobStatus::Open, "claim")?;
    if job.is_posted_by(actor) {
        return Err(MarketError::unauthorized("you cannot claim a job you posted"));
    }
    assign(job, actor, now);
    Ok(())
}

/// Hands an OPEN job to `claimant`. Guards are the caller's business.
pub(crate) fn assign(job: &mut Job, claimant: &str, now: DateTime<Utc>) {
    job.status = JobStatus::InProgress;
    job.claimed_by_id = Some(claimant.to_string());
    job.claimed_at = Some(now);
    job.updated_at = now;
}

pub fn complete(
    job: &mut Job,
    actor: &str,
    deliverable_url: Option<String>,
    now: DateTime<Utc>,
) -> MarketResult<()> {
    require_status(job, JobStatus::InProgress, "complete")?;
    if !job.is_claimed_by(actor) {
        return Err(MarketError::unauthorized("only the claimant can complete this job"));
    }
    let deliverable_url = deliverable_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .map(|u| validate_deliverable_url(&u).map(|_| u))
        .transpose()?;

    job.status = JobStatus::Completed;
    job.completed_at = Some(now);
    job.deliverable_url = deliverable_url;
    job.updated_at = now;
    Ok(())
}

/// Poster withdraws the bounty before anyone picked it up.
pub fn cancel(job: &mut Job, actor: &str, now: DateTime<Utc>) -> MarketResult<()> {
    require_status(job, JobStatus::Open, "cancel")?;
    if !job.is_posted_by(actor) {
        return Err(MarketError::unauthorized("only the poster can cancel this job"));
    }
    job.status = JobStatus::Cancelled;
    job.updated_at = now;
    Ok(())
}

/// Claimant gives the job back; it returns to the board.
pub fn release(job: &mut Job, actor: &str, now: DateTime<Utc>) -> MarketResult<()> {
    require_status(job, JobStatus::InProgress, "release")?;
    if !job.is_claimed_by(actor) {
        return Err(MarketError::unauthorized("only the claimant can release this claim"));
    }
    job.status = JobStatus::Open;
    job.claimed_by_id = None;
    job.claimed_at = None;
    job.updated_at = now;
    Ok(())
}

/// Jobs can be removed by their poster until someone is working on them.
pub fn ensure_deletable(job: &Job, actor: &str) -> MarketResult<()> {
    if !matches!(job.status, JobStatus::Open | JobStatus::Cancelled) {
        return Err(MarketError::InvalidState {
            entity: "job",
            id: job.id,
            status: job.status.as_str(),
            action: "delete",
        });
    }
    if !job.is_posted_by(actor) {
        return Err(MarketError::unauthorized("only the poster can delete this job"));
    }
    Ok(())
}

fn validate_deliverable_url(raw: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ValidationError::invalid("deliverable_url", e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::invalid(
            "deliverable_url",
            format!("unsupported scheme {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::open_job;

    fn claimed_job(poster: &str, claimant: &str) -> Job {
        let mut job = open_job(poster);
        claim(&mut job, claimant, Utc::now()).unwrap();
        job
    }

    #[test]
    fn claim_assigns_the_actor() {
        let job = claimed_job("poster", "maker");
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.claimed_by_id.as_deref(), Some("maker"));
        assert!(job.claimed_at.is_some());
        job.check_invariants().unwrap();
    }

    #[test]
    fn poster_cannot_claim_own_job() {
        let mut job = open_job("poster");
        let before = job.clone();
        let err = claim(&mut job, "poster", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
        assert_eq!(job, before);
    }

    #[test]
    fn claiming_a_taken_job_is_a_state_error() {
        let mut job = claimed_job("poster", "maker");
        let err = claim(&mut job, "someone-else", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::InvalidState { status: "IN_PROGRESS", .. }));
        assert_eq!(job.claimed_by_id.as_deref(), Some("maker"));
    }

    #[test]
    fn claimant_completes_with_deliverable() {
        let mut job = claimed_job("poster", "maker");
        complete(&mut job, "maker", Some("https://x".into()), Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.deliverable_url.as_deref(), Some("https://x"));
        job.check_invariants().unwrap();
    }

    #[test]
    fn non_claimant_cannot_complete() {
        let mut job = claimed_job("poster", "maker");
        let err = complete(&mut job, "poster", None, Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn deliverable_must_be_a_web_link() {
        let mut job = claimed_job("poster", "maker");
        let err = complete(&mut job, "maker", Some("ftp://files".into()), Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        assert_eq!(job.status, JobStatus::InProgress);

        // blank is treated as "no deliverable"
        complete(&mut job, "maker", Some("  ".into()), Utc::now()).unwrap();
        assert_eq!(job.deliverable_url, None);
    }

    #[test]
    fn poster_cancels_open_job() {
        let mut job = open_job("poster");
        cancel(&mut job, "poster", Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        job.check_invariants().unwrap();
    }

    #[test]
    fn cancel_requires_open_and_poster() {
        let mut job = open_job("poster");
        assert!(matches!(
            cancel(&mut job, "maker", Utc::now()).unwrap_err(),
            MarketError::Unauthorized(_)
        ));

        let mut taken = claimed_job("poster", "maker");
        assert!(matches!(
            cancel(&mut taken, "poster", Utc::now()).unwrap_err(),
            MarketError::InvalidState { .. }
        ));
    }

    #[test]
    fn release_returns_job_to_the_board() {
        let mut job = claimed_job("poster", "maker");
        assert!(release(&mut job, "poster", Utc::now()).is_err());

        release(&mut job, "maker", Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(job.claimed_by_id, None);
        assert_eq!(job.claimed_at, None);
        job.check_invariants().unwrap();

        // and it can be claimed again
        claim(&mut job, "other-maker", Utc::now()).unwrap();
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let mut done = claimed_job("poster", "maker");
        complete(&mut done, "maker", None, Utc::now()).unwrap();
        assert!(release(&mut done, "maker", Utc::now()).is_err());
        assert!(cancel(&mut done, "poster", Utc::now()).is_err());
        assert!(complete(&mut done, "maker", None, Utc::now()).is_err());

        let mut cancelled = open_job("poster");
        cancel(&mut cancelled, "poster", Utc::now()).unwrap();
        assert!(claim(&mut cancelled, "maker", Utc::now()).is_err());
    }

    #[test]
    fn only_open_or_cancelled_jobs_can_be_deleted() {
        let job = open_job("poster");
        ensure_deletable(&job, "poster").unwrap();
        assert!(ensure_deletable(&job, "maker").is_err());
        assert!(ensure_deletable(&claimed_job("poster", "maker"), "poster").is_err());
    }
}
