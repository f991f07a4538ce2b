pub mod filter;
pub mod lifecycle;
pub mod model;
pub mod poll;
pub mod rates;
pub mod repo;
pub mod stats;
pub mod terms;
pub mod timeline;

pub use filter::JobFilter;
pub use model::{Job, JobCategory, JobStatus, NewJob};
pub use poll::{poll_until, PollOutcome};
pub use rates::{standard_rates, ServiceType, StandardRate};
pub use repo::JobsRepo;
pub use stats::{BoardStats, MemberStats, StatsRepo};
pub use terms::{PaymentTerms, PaymentType};
