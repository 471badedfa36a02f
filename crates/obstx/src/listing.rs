//! 📜 Listing: turning one ListObjectsV2 response body into records, sizes, and a token.
//!
//! 🎬 COLD OPEN. INT. OBJECT STORAGE. A bucket with four million objects. The API hands
//! them out a thousand at a time, wrapped in XML, with a little note at the top that says
//! "there's more where this came from" (the continuation token). We read every note.
//! We never hold more than one tag in our hands at once.
//!
//! 🧠 Knowledge graph:
//! - `coerce`: raw text bytes -> String / u64 / bool, or a `Coercion` error naming the field
//! - `dispatch`: the state machine. One event in, one transition out. Generic over a `RecordPlan`
//! - `objects_lister`: the Full Lister. key + last_modified + size, handed to your callback
//! - `total_size_calculator`: the Size Aggregator. size only, summed into counters it owns
//! - Both consumers implement [`PageConsumer`], which is what the paginator talks to
//!
//! ```text
//! body bytes -> EventReader -> Dispatcher<Plan> -> Plan::complete(record) -> callback / counters
//!                                   \-> ListingPage { next_continuation_token, key_count, is_truncated }
//! ```
//!
//! ⚠️ Schema assumption: unknown elements are skipped by simply not reacting to them. That is only
//! safe because ListBucketResult never nests `Key`/`Size`/`Contents` inside something we ignore.
//! Point this at a different document shape and it WILL get confused. Don't.

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncBufRead;

use crate::errors::ListingError;

mod coerce;
pub mod dispatch;
mod objects_lister;
mod total_size_calculator;

#[cfg(test)]
pub(crate) mod fixtures;

pub use dispatch::{DispatchState, Dispatcher, ObjectField, PageField, RecordPlan, ScratchRecord};
pub use objects_lister::ObjectsLister;
pub use total_size_calculator::TotalSizeCalculator;

/// 📄 The per-page envelope. Rebuilt from scratch for every response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// 🎟️ Empty means "that was the last page". Self-closing `<NextContinuationToken/>` lands here as "".
    pub next_continuation_token: String,
    pub key_count: u64,
    pub is_truncated: bool,
}

/// 📦 One object, as the Full Lister sees it. `last_modified` stays ISO-8601 text, unparsed.
/// Serializes as one JSON object per line for `list --json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectRecord {
    pub key: String,
    pub last_modified: String,
    pub size: u64,
}

/// 📏 One object, as the Size Aggregator sees it. Everything else was never even decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeOnlyRecord {
    pub size: u64,
}

/// 🧮 Running totals for a whole listing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingTotals {
    pub object_count: u64,
    pub total_size: u64,
}

/// 🚦 What a record hook wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// 🏁 How one page's parse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEnd {
    /// The body ran out naturally.
    Exhausted,
    /// A record hook asked to stop. The rest of the body was drained, not parsed.
    StoppedEarly,
}

/// 📋 Everything a consumer reports back about one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub page: ListingPage,
    pub end: PageEnd,
}

/// 🍽️ Something that eats one response body per call.
///
/// # Contract 📜
/// - `consume` parses exactly one body and ALWAYS drains whatever it did not parse,
///   whether it finished, stopped early, or failed. The connection goes back clean.
/// - Parse errors abort the page immediately. No partial-page retry, no skipped records.
/// - `running_totals` is for progress reporting only. Consumers that keep no totals say `None`.
#[async_trait]
pub trait PageConsumer: Send {
    async fn consume<R>(&mut self, body: R) -> Result<PageSummary, ListingError>
    where
        R: AsyncBufRead + Unpin + Send;

    fn running_totals(&self) -> Option<ListingTotals> {
        None
    }
}
