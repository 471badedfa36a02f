//! 📊 progress.rs: "Are we there yet?" Every listing, every time, forever.
//!
//! 🚀 A spinner (we never know how many pages a bucket has until the token runs dry),
//! a comfy table of pages, objects, and bytes, and a 5-second sliding window so the
//! pages/s figure doesn't look like a seismograph.
//!
//! ⚠️  Watching this spinner will not make S3 answer faster. We've tried.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::client::PageObserver;
use crate::listing::{ListingPage, ListingTotals};

const KIB: f64 = 1024.0;

/// 📦 Bytes, scaled to whatever unit keeps the number under 1024.
/// Because "1073741824 bytes" is a war crime in a UI.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / KIB;
    let mut unit = 0;
    while value >= KIB && unit < UNITS.len() - 1 {
        value /= KIB;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS for the buckets that take a while. Call your mom.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// 📡 Throughput over the sliding window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rates {
    pages_per_sec: f64,
    objects_per_sec: f64,
}

/// 📊 The live listing display. Plug it into [`Paginator::run`](crate::client::Paginator::run)
/// as the observer.
pub struct ListingProgress {
    bucket: String,
    pages: u64,
    totals: Option<ListingTotals>,
    progress_bar: ProgressBar,
    /// 🔄 (timestamp, pages, objects) samples from the last 5 seconds
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ListingProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar doesn't do Debug, and printing a terminal widget is... a choice
        f.debug_struct("ListingProgress")
            .field("bucket", &self.bucket)
            .field("pages", &self.pages)
            .field("totals", &self.totals)
            .finish()
    }
}

impl ListingProgress {
    /// 🌀 Draws to stderr. indicatif hides it on its own when stderr isn't a terminal.
    pub fn new(bucket: impl Into<String>) -> Self {
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress_bar.enable_steady_tick(Duration::from_millis(120));
        Self::with_bar(bucket.into(), progress_bar)
    }

    /// 🙈 Same bookkeeping, nothing drawn. For tests and `--quiet`-ish callers.
    pub fn hidden(bucket: impl Into<String>) -> Self {
        Self::with_bar(bucket.into(), ProgressBar::hidden())
    }

    fn with_bar(bucket: String, progress_bar: ProgressBar) -> Self {
        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));
        Self {
            bucket,
            pages: 0,
            totals: None,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn totals(&self) -> Option<ListingTotals> {
        self.totals
    }

    fn object_count(&self) -> u64 {
        self.totals.map(|t| t.object_count).unwrap_or_default()
    }

    fn calculate_rates(&mut self, now: Instant) -> Rates {
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples
            .push_back((now, self.pages, self.object_count()));

        if let Some(&(oldest_time, oldest_pages, oldest_objects)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                return Rates {
                    pages_per_sec: self.pages.saturating_sub(oldest_pages) as f64 / elapsed,
                    objects_per_sec: self.object_count().saturating_sub(oldest_objects) as f64
                        / elapsed,
                };
            }
        }
        Rates {
            pages_per_sec: 0.0,
            objects_per_sec: 0.0,
        }
    }

    fn render(&self, rates: Rates) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec![
            Cell::new(format!("{:.1} pages/s", rates.pages_per_sec))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} pages", format_number(self.pages)))
                .set_alignment(CellAlignment::Right),
        ]);
        if let Some(totals) = self.totals {
            table.add_row(vec![
                Cell::new(format!("{} objects/s", format_number(rates.objects_per_sec as u64)))
                    .set_alignment(CellAlignment::Right),
                Cell::new(format!("{} objects", format_number(totals.object_count)))
                    .set_alignment(CellAlignment::Right),
            ]);
            table.add_row(vec![
                Cell::new("listed").set_alignment(CellAlignment::Right),
                Cell::new(format_bytes(totals.total_size)).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(self.start_time.elapsed())))
                .set_alignment(CellAlignment::Right),
            Cell::new(""),
        ]);

        self.progress_bar
            .set_message(format!("bucket: {}\n{}", self.bucket, table));
    }
}

impl PageObserver for ListingProgress {
    fn on_page(&mut self, pages: u64, _page: &ListingPage, totals: Option<ListingTotals>) {
        self.pages = pages;
        self.totals = totals;
        let rates = self.calculate_rates(Instant::now());
        self.render(rates);
    }

    fn on_finish(&mut self) {
        self.progress_bar.finish_and_clear();
    }
}

/// 🍽️ The final answer, as a table for stdout.
pub fn summary_table(bucket: &str, pages: u64, totals: ListingTotals, elapsed: Duration) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["bucket", "objects", "total size", "bytes", "api calls", "elapsed"]);
    table.add_row(vec![
        Cell::new(bucket),
        Cell::new(format_number(totals.object_count)).set_alignment(CellAlignment::Right),
        Cell::new(format_bytes(totals.total_size)).set_alignment(CellAlignment::Right),
        Cell::new(totals.total_size).set_alignment(CellAlignment::Right),
        Cell::new(pages).set_alignment(CellAlignment::Right),
        Cell::new(format_duration(elapsed)).set_alignment(CellAlignment::Right),
    ]);
    table
}
