use serde::Serialize;
use uuid::Uuid;

use crate::jobs::{Job, JobFilter};
use crate::offers::Offer;
use crate::sync::event::{Change, ChangeEvent};
use crate::sync::notice::Notice;
use crate::sync::source::{Fetched, Snapshot};

pub trait Record: Clone {
    fn id(&self) -> Uuid;
}

impl Record for Job {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Offer {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Most-recent-first collection kept in step with a change stream.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct LiveList<T> {
    items: Vec<T>,
}

impl<T> Default for LiveList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Record> LiveList<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.items.iter().find(|r| r.id() == id)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|r| r.id() == id)
    }

    /// Prepends, or replaces in place when the id is already held (a
    /// reload can race the event that announced the same row).
    pub fn insert(&mut self, record: T) {
        match self.position(record.id()) {
            Some(i) => self.items[i] = record,
            None => self.items.insert(0, record),
        }
    }

    /// Replaces by id and returns the previous value. Unknown ids are
    /// ignored.
    pub fn update(&mut self, record: T) -> Option<T> {
        let i = self.position(record.id())?;
        Some(std::mem::replace(&mut self.items[i], record))
    }

    pub fn remove(&mut self, id: Uuid) -> Option<T> {
        let i = self.position(id)?;
        Some(self.items.remove(i))
    }

    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
    }
}

/// What applying one event did, beyond mutating the lists.
#[derive(Debug, Default, PartialEq)]
pub struct Applied {
    pub notices: Vec<Notice>,
    /// The event didn't carry enough to apply; reload everything.
    pub needs_reload: bool,
}

/// The client-facing marketplace: jobs matching the active filter plus
/// the offers on those jobs.
#[derive(Debug, Default, Serialize)]
pub struct MarketView {
    jobs: LiveList<Job>,
    offers: LiveList<Offer>,
    filter: JobFilter,
    source: Option<&'static str>,
    degraded: bool,
}

impl MarketView {
    pub fn new(filter: JobFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> &LiveList<Job> {
        &self.jobs
    }

    pub fn offers(&self) -> &LiveList<Offer> {
        &self.offers
    }

    pub fn filter(&self) -> &JobFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: JobFilter) {
        self.filter = filter;
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn source(&self) -> Option<&'static str> {
        self.source
    }

    /// Swaps in a full reload.
    pub fn replace_all(&mut self, fetched: Fetched<Snapshot>) {
        self.jobs.replace_all(fetched.data.jobs);
        self.offers.replace_all(fetched.data.offers);
        self.source = Some(fetched.source);
        self.degraded = fetched.degraded;
    }

    pub fn apply(&mut self, event: ChangeEvent) -> Applied {
        let mut applied = Applied::default();
        match event {
            ChangeEvent::Job(Change::Insert(job)) => {
                if self.filter.matches(&job) {
                    applied.notices.push(Notice::job_posted(&job));
                    self.jobs.insert(job);
                }
            }
            ChangeEvent::Job(Change::Update { old, new }) => {
                let notice = Notice::job_status_changed(&new);
                let new_status = new.status;
                if let Some(previous) = self.jobs.update(new) {
                    let before = old.map(|o| o.status).unwrap_or(previous.status);
                    if before != new_status {
                        applied.notices.push(notice);
                    }
                }
            }
            ChangeEvent::Job(Change::Delete(job)) => {
                if let Some(removed) = self.jobs.remove(job.id) {
                    applied.notices.push(Notice::job_removed(&removed));
                }
            }
            // only offers on jobs the view holds
            ChangeEvent::Offer(Change::Insert(offer)) => {
                if self.jobs.get(offer.job_id).is_some() {
                    applied.notices.push(Notice::offer_received());
                    self.offers.insert(offer);
                }
            }
            ChangeEvent::Offer(Change::Update { new, .. }) => {
                self.offers.update(new);
            }
            ChangeEvent::Offer(Change::Delete(offer)) => {
                self.offers.remove(offer.id);
            }
            ChangeEvent::Oversized { .. } => applied.needs_reload = true,
        }
        applied
    }
}
