use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::jobs::model::Job;
use crate::offers::model::Offer;

/// One row change on a watched table.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Insert(T),
    Update { old: Option<T>, new: T },
    Delete(T),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Job(Change<Job>),
    Offer(Change<Offer>),
    /// The row did not fit in a notification; only its id came through.
    Oversized { table: Table, id: Option<Uuid> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Jobs,
    Offers,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("change on unwatched table {0:?}")]
    UnknownTable(String),

    #[error("unknown operation {0:?}")]
    UnknownOp(String),

    #[error("{op} event without the {field} row")]
    MissingRow { op: &'static str, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct RawChange {
    table: String,
    op: String,
    #[serde(default)]
    old: Option<serde_json::Value>,
    #[serde(default)]
    new: Option<serde_json::Value>,
    #[serde(default)]
    oversized: bool,
    #[serde(default)]
    id: Option<Uuid>,
}

/// Decodes a `market_changes` notification payload.
pub fn parse_change(payload: &str) -> Result<ChangeEvent, EventError> {
    let raw: RawChange = serde_json::from_str(payload)?;

    let table = match raw.table.as_str() {
        "jobs" => Table::Jobs,
        "job_offers" => Table::Offers,
        other => return Err(EventError::UnknownTable(other.to_string())),
    };

    if raw.oversized {
        return Ok(ChangeEvent::Oversized { table, id: raw.id });
    }

    Ok(match table {
        Table::Jobs => ChangeEvent::Job(decode(&raw)?),
        Table::Offers => ChangeEvent::Offer(decode(&raw)?),
    })
}

fn decode<T: DeserializeOwned>(raw: &RawChange) -> Result<Change<T>, EventError> {
    let row = |value: &Option<serde_json::Value>, op: &'static str, field: &'static str| {
        value
            .clone()
            .ok_or(EventError::MissingRow { op, field })
            .and_then(|v| serde_json::from_value::<T>(v).map_err(EventError::from))
    };

    match raw.op.as_str() {
        "INSERT" => Ok(Change::Insert(row(&raw.new, "INSERT", "new")?)),
        "UPDATE" => Ok(Change::Update {
            // a stale or partial old image only costs us the status notice
            old: row(&raw.old, "UPDATE", "old").ok(),
            new: row(&raw.new, "UPDATE", "new")?,
        }),
        "DELETE" => Ok(Change::Delete(row(&raw.old, "DELETE", "old")?)),
        other => Err(EventError::UnknownOp(other.to_string())),
    }
}
