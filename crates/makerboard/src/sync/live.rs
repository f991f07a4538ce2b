use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::jobs::{Job, JobFilter};
use crate::offers::Offer;
use crate::sync::feed::{run_change_feed, SyncMessage};
use crate::sync::notice::Notice;
use crate::sync::source::FallbackSource;
use crate::sync::view::MarketView;

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub filter: JobFilter,
    pub limit: i64,
    pub feed_retry: Duration,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            filter: JobFilter::default(),
            limit: 100,
            feed_retry: Duration::from_secs(2),
        }
    }
}

/// Owned copy of the view for readers that must not hold the lock.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub jobs: Vec<Job>,
    pub offers: Vec<Offer>,
    pub filter: JobFilter,
    pub source: Option<&'static str>,
    pub degraded: bool,
}

/// Applies change events and reloads to the shared view and broadcasts the
/// resulting notices.
struct Synchronizer {
    view: Arc<RwLock<MarketView>>,
    source: FallbackSource,
    notices: broadcast::Sender<Notice>,
    limit: i64,
    primary_lost: bool,
}

impl Synchronizer {
    async fn run(mut self, mut rx: mpsc::Receiver<SyncMessage>) {
        self.reload().await;
        while let Some(msg) = rx.recv().await {
            self.handle(msg).await;
        }
        tracing::debug!("synchronizer stopped");
    }

    async fn handle(&mut self, msg: SyncMessage) {
        match msg {
            SyncMessage::Connected => {
                let was_lost = std::mem::replace(&mut self.primary_lost, false);
                self.reload().await;
                if was_lost && !self.view.read().await.is_degraded() {
                    self.notify(Notice::reconnected());
                }
            }
            SyncMessage::Lost(reason) => {
                tracing::warn!(reason = %reason, "switching live view to fallback data");
                self.primary_lost = true;
                self.reload().await;
            }
            SyncMessage::Change(event) => {
                // fallback rows and live events are never mixed
                if self.view.read().await.is_degraded() {
                    self.reload().await;
                    return;
                }
                let applied = self.view.write().await.apply(event);
                for notice in applied.notices {
                    self.notify(notice);
                }
                if applied.needs_reload {
                    self.reload().await;
                }
            }
            SyncMessage::SetFilter(filter) => {
                self.view.write().await.set_filter(filter);
                self.reload().await;
            }
            SyncMessage::Reload => self.reload().await,
        }
    }

    async fn reload(&mut self) {
        let filter = self.view.read().await.filter().clone();
        match self.source.snapshot(&filter, self.limit, self.primary_lost).await {
            Ok(fetched) => {
                let mut view = self.view.write().await;
                let entering_degraded = fetched.degraded && !view.is_degraded();
                tracing::info!(
                    source = fetched.source,
                    jobs = fetched.data.jobs.len(),
                    offers = fetched.data.offers.len(),
                    degraded = fetched.degraded,
                    "live view reloaded"
                );
                view.replace_all(fetched);
                drop(view);
                if entering_degraded {
                    self.notify(Notice::degraded());
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "live view reload failed");
                self.notify(Notice::error(
                    "Connection error",
                    "Unable to load jobs. Please try again later.",
                ));
            }
        }
    }

    fn notify(&self, notice: Notice) {
        // no subscribers is fine
        let _ = self.notices.send(notice);
    }
}

/// Handle on a running live marketplace view. Dropping it stops the
/// change feed and the synchronizer.
pub struct LiveMarket {
    view: Arc<RwLock<MarketView>>,
    notices: broadcast::Sender<Notice>,
    control: mpsc::Sender<SyncMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveMarket {
    /// Listens on Postgres and keeps the view in sync with it.
    pub fn start(pool: PgPool, source: FallbackSource, opts: LiveOptions) -> Self {
        let retry = opts.feed_retry;
        let (mut market, feed_tx) = Self::with_feed(source, opts);
        market
            .tasks
            .push(tokio::spawn(run_change_feed(pool, feed_tx, retry)));
        market
    }

    /// Synchronizer only; the caller drives the returned sender as its
    /// change feed.
    pub fn with_feed(source: FallbackSource, opts: LiveOptions) -> (Self, mpsc::Sender<SyncMessage>) {
        let (tx, rx) = mpsc::channel(256);
        let (notices, _) = broadcast::channel(64);
        let view = Arc::new(RwLock::new(MarketView::new(opts.filter)));

        let sync = Synchronizer {
            view: view.clone(),
            source,
            notices: notices.clone(),
            limit: opts.limit,
            primary_lost: false,
        };
        let task = tokio::spawn(sync.run(rx));

        let market = Self {
            view,
            notices,
            control: tx.clone(),
            tasks: vec![task],
        };
        (market, tx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn view(&self) -> Arc<RwLock<MarketView>> {
        self.view.clone()
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let view = self.view.read().await;
        ViewSnapshot {
            jobs: view.jobs().items().to_vec(),
            offers: view.offers().items().to_vec(),
            filter: view.filter().clone(),
            source: view.source(),
            degraded: view.is_degraded(),
        }
    }

    pub async fn set_filter(&self, filter: JobFilter) -> anyhow::Result<()> {
        self.control
            .send(SyncMessage::SetFilter(filter))
            .await
            .map_err(|_| anyhow::anyhow!("live market stopped"))
    }

    pub async fn reload(&self) -> anyhow::Result<()> {
        self.control
            .send(SyncMessage::Reload)
            .await
            .map_err(|_| anyhow::anyhow!("live market stopped"))
    }
}

impl Drop for LiveMarket {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
