//! 🔁 The pagination driver. Fetch, parse, look at the token, repeat.
//!
//! 🎬 "Are we there yet?" "Is the token empty?" "No." "Then we're not there yet."
//!
//! Strictly sequential: page N+1 is not even requested until page N is parsed AND drained.
//! The token alone decides whether there's another page. `IsTruncated` gets a second
//! opinion logged at warn when the two disagree, and is otherwise ignored.

use tracing::{debug, info, warn};

use super::list_objects_v2::ListObjectsV2Client;
use crate::errors::ListingError;
use crate::listing::{ListingPage, ListingTotals, PageConsumer, PageEnd};

pub const DEFAULT_PROGRESS_EVERY_PAGES: u64 = 100;

/// 👀 Gets told about every page as soon as it has been parsed.
pub trait PageObserver {
    fn on_page(&mut self, pages: u64, page: &ListingPage, totals: Option<ListingTotals>);

    /// 🏁 The run is over, for better or worse.
    fn on_finish(&mut self) {}
}

/// 🙈 For callers that don't care.
impl PageObserver for () {
    fn on_page(&mut self, _pages: u64, _page: &ListingPage, _totals: Option<ListingTotals>) {}
}

/// 📋 How a run went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Every page fetched, the last one included.
    pub pages: u64,
    /// `Exhausted` when the token ran dry, `StoppedEarly` when a consumer pulled the plug.
    pub end: PageEnd,
}

#[derive(Debug, Clone)]
pub struct Paginator {
    client: ListObjectsV2Client,
    progress_every_pages: u64,
}

impl Paginator {
    pub fn new(client: ListObjectsV2Client) -> Self {
        Self {
            client,
            progress_every_pages: DEFAULT_PROGRESS_EVERY_PAGES,
        }
    }

    /// 📊 Log a debug progress line every `pages` pages. Zero is treated as one.
    pub fn progress_every_pages(mut self, pages: u64) -> Self {
        self.progress_every_pages = pages.max(1);
        self
    }

    /// 🚀 List the whole bucket (or until `consumer` says stop) through `consumer`.
    ///
    /// The first error ends the run. Whatever the consumer accumulated stays in the consumer.
    pub async fn run<C, O>(&self, consumer: &mut C, observer: &mut O) -> Result<RunReport, ListingError>
    where
        C: PageConsumer,
        O: PageObserver + ?Sized,
    {
        let bucket = self.client.target().bucket();
        info!(bucket, "🚀 listing started");

        let mut token = String::new();
        let mut pages = 0u64;
        let outcome = loop {
            let summary = match self.client.fetch_page(&token, consumer).await {
                Ok(summary) => summary,
                Err(e) => break Err(e),
            };
            pages += 1;

            let totals = consumer.running_totals();
            observer.on_page(pages, &summary.page, totals);
            if pages % self.progress_every_pages == 0 {
                match totals {
                    Some(t) => debug!(
                        api_call_count = pages,
                        total_size = t.total_size,
                        obj_count = t.object_count,
                        "📊 progress"
                    ),
                    None => debug!(api_call_count = pages, "📊 progress"),
                }
            }
            warn_if_inconsistent(pages, &summary.page);

            if summary.end == PageEnd::StoppedEarly {
                info!(bucket, pages, "🛑 consumer stopped the listing early");
                break Ok(RunReport {
                    pages,
                    end: PageEnd::StoppedEarly,
                });
            }
            if summary.page.next_continuation_token.is_empty() {
                break Ok(RunReport {
                    pages,
                    end: PageEnd::Exhausted,
                });
            }
            token = summary.page.next_continuation_token;
        };

        observer.on_finish();
        outcome
    }
}

fn warn_if_inconsistent(pages: u64, page: &ListingPage) {
    let has_token = !page.next_continuation_token.is_empty();
    if page.is_truncated != has_token {
        warn!(
            page = pages,
            is_truncated = page.is_truncated,
            has_token,
            "⚠️ IsTruncated and NextContinuationToken disagree, following the token"
        );
    }
}
