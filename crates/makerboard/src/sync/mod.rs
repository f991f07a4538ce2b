//! Live marketplace view: a Postgres change feed applied to in-memory
//! job and offer lists, with a static fallback when the database is away.

pub mod event;
pub mod feed;
pub mod live;
pub mod notice;
pub mod source;
pub mod view;

pub use event::{parse_change, Change, ChangeEvent};
pub use feed::SyncMessage;
pub use live::{LiveMarket, LiveOptions, ViewSnapshot};
pub use notice::{Level, Notice};
pub use source::{FallbackSource, Fetched, MarketSource, PgSource, StaticSource};
pub use view::{LiveList, MarketView};
