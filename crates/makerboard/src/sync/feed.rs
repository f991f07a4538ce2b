use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::db::NOTIFY_CHANNEL;
use crate::jobs::JobFilter;
use crate::sync::event::{parse_change, ChangeEvent};

/// Input of the synchronizer loop: change-feed traffic plus control
/// requests from the handle.
#[derive(Debug)]
pub enum SyncMessage {
    /// Listening (again). Anything may have happened meanwhile.
    Connected,
    /// The change feed is gone; the primary source is presumed down.
    Lost(String),
    Change(ChangeEvent),
    SetFilter(JobFilter),
    Reload,
}

/// Pumps `NOTIFY market_changes` into `tx` until the receiver goes away,
/// reconnecting every `retry` after a failure.
pub async fn run_change_feed(pool: PgPool, tx: mpsc::Sender<SyncMessage>, retry: Duration) {
    // start as "up" so a first failed connect is reported too
    let mut up = true;

    loop {
        let outcome = listen(&pool, &tx, &mut up).await;
        match outcome {
            Ok(Pump::ReceiverGone) => return,
            Ok(Pump::ConnectionLost) => report_lost(&tx, &mut up, "connection lost".into()).await,
            Err(e) => report_lost(&tx, &mut up, e.to_string()).await,
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(retry).await;
    }
}

enum Pump {
    ReceiverGone,
    ConnectionLost,
}

async fn listen(
    pool: &PgPool,
    tx: &mpsc::Sender<SyncMessage>,
    up: &mut bool,
) -> Result<Pump, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTIFY_CHANNEL).await?;

    tracing::info!(channel = NOTIFY_CHANNEL, "change feed listening");
    *up = true;
    if tx.send(SyncMessage::Connected).await.is_err() {
        return Ok(Pump::ReceiverGone);
    }

    loop {
        // Ok(None): the connection dropped. We rebuild the listener
        // ourselves so the reconnect is announced.
        let Some(notification) = listener.try_recv().await? else {
            return Ok(Pump::ConnectionLost);
        };

        match parse_change(notification.payload()) {
            Ok(event) => {
                if tx.send(SyncMessage::Change(event)).await.is_err() {
                    return Ok(Pump::ReceiverGone);
                }
            }
            Err(e) => tracing::warn!(error = %e, "ignoring malformed change event"),
        }
    }
}

async fn report_lost(tx: &mpsc::Sender<SyncMessage>, up: &mut bool, reason: String) {
    if !*up {
        return;
    }
    *up = false;
    tracing::warn!(reason = %reason, "change feed lost");
    let _ = tx.send(SyncMessage::Lost(reason)).await;
}
