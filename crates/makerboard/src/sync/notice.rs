use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::jobs::model::{Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// Short user-facing message (a toast). Rendering is up to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: Level,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(level: Level, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Info, title, description)
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Success, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Warning, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Error, title, description)
    }

    pub fn job_posted(job: &Job) -> Self {
        Self::info("New job posted!", format!("\"{}\" just appeared on the board.", job.title))
    }

    pub fn job_removed(job: &Job) -> Self {
        Self::info("Job removed", format!("\"{}\" was removed from the board.", job.title))
    }

    /// Status-change notice for a live update.
    pub fn job_status_changed(job: &Job) -> Self {
        let description = match job.status {
            JobStatus::Open => format!("\"{}\" is open again.", job.title),
            JobStatus::InProgress => format!("\"{}\" is now in progress.", job.title),
            JobStatus::Completed => format!("\"{}\" has been completed!", job.title),
            JobStatus::Cancelled => format!("\"{}\" was cancelled.", job.title),
        };
        Self::info("Job status updated", description)
    }

    pub fn offer_received() -> Self {
        Self::info("New offer received!", "Someone made an offer on a job.")
    }

    pub fn degraded() -> Self {
        Self::warning(
            "Using demo data",
            "The marketplace is unreachable; showing read-only demo jobs.",
        )
    }

    pub fn reconnected() -> Self {
        Self::success("Back online", "Live marketplace updates resumed.")
    }

    pub fn from_error(err: &MarketError) -> Self {
        Self::error(err.kind().title(), err.user_message())
    }
}
