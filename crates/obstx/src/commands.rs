//! 🎬 Commands: the two things you can actually ask obstx to do.
//!
//! - `summary`: Size Aggregator over the whole bucket. Count + total bytes, nothing else decoded.
//! - `list`: Full Lister. One `last_modified<TAB>size<TAB>key` line per object (or one JSON object
//!   per line with `--json`), optionally capped.
//!
//! Both build the same plumbing: config -> HTTP client -> target -> signed client -> paginator.
//! Errors leave here as `anyhow` with context, ready for the CLI to peel like an onion.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app_config::AppConfig;
use crate::client::{Credentials, ListObjectsV2Client, Paginator};
use crate::listing::{Flow, ListingTotals, ObjectRecord, ObjectsLister, PageEnd, TotalSizeCalculator};
use crate::profiles::ProfileLoader;
use crate::progress::ListingProgress;

/// 📋 What `summary` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryReport {
    pub bucket: String,
    pub pages: u64,
    pub totals: ListingTotals,
    pub elapsed: Duration,
}

/// 📋 What `list` printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListReport {
    pub pages: u64,
    pub objects: u64,
    pub end: PageEnd,
}

/// 🖨️ How `list` writes each object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// `last_modified<TAB>size<TAB>key`
    #[default]
    Tsv,
    /// `{"key":..,"last_modified":..,"size":..}`, one per line
    JsonLines,
}

fn write_record<W: Write>(out: &mut W, record: &ObjectRecord, format: ListFormat) -> Result<()> {
    match format {
        ListFormat::Tsv => {
            writeln!(out, "{}\t{}\t{}", record.last_modified, record.size, record.key)
                .context("💀 Failed to write a listing line")
        }
        ListFormat::JsonLines => {
            serde_json::to_writer(&mut *out, record)
                .context("💀 Failed to write a listing line as JSON")?;
            writeln!(out).context("💀 Failed to write a listing line")
        }
    }
}

/// 🔑 Profile name -> credentials, honoring the configured profile directory.
pub fn load_credentials(config: &AppConfig, profile: &str) -> Result<Credentials> {
    ProfileLoader::from_env(config.profile_dir.as_deref())?
        .load(profile)
        .with_context(|| format!("💀 Could not load credentials for profile '{profile}'"))
}

fn paginator(
    config: &AppConfig,
    credentials: Credentials,
    bucket: &str,
    cancel: CancellationToken,
) -> Result<Paginator> {
    let target = config
        .bucket_target(bucket)
        .with_context(|| format!("💀 Bucket '{bucket}' does not make a usable listing URL"))?;
    let client = ListObjectsV2Client::new(config.http_client()?, target, credentials, &config.region)
        .with_cancellation(cancel);
    Ok(Paginator::new(client).progress_every_pages(config.progress_every_pages))
}

/// 🧮 Count every object and add up every size.
pub async fn summary(
    config: &AppConfig,
    credentials: Credentials,
    bucket: &str,
    cancel: CancellationToken,
    show_progress: bool,
) -> Result<SummaryReport> {
    info!(bucket, endpoint = %config.endpoint, region = %config.region, "📏 summary command");
    let started = Instant::now();
    let paginator = paginator(config, credentials, bucket, cancel)?;

    let mut calculator = TotalSizeCalculator::new();
    let mut progress = if show_progress {
        ListingProgress::new(bucket)
    } else {
        ListingProgress::hidden(bucket)
    };
    let report = paginator
        .run(&mut calculator, &mut progress)
        .await
        .with_context(|| format!("💀 Listing bucket '{bucket}' failed, no totals for you"))?;

    let totals = calculator.totals();
    info!(
        "final: apiCallCount={}, totalSize={}, objCount={}",
        report.pages, totals.total_size, totals.object_count
    );
    Ok(SummaryReport {
        bucket: bucket.to_string(),
        pages: report.pages,
        totals,
        elapsed: started.elapsed(),
    })
}

/// 📜 Print every object (or the first `limit`) to `out`.
pub async fn list<W>(
    config: &AppConfig,
    credentials: Credentials,
    bucket: &str,
    limit: Option<u64>,
    format: ListFormat,
    out: &mut W,
    cancel: CancellationToken,
) -> Result<ListReport>
where
    W: Write + Send,
{
    info!(bucket, ?limit, ?format, "📜 list command");
    let paginator = paginator(config, credentials, bucket, cancel)?;

    let mut printed = 0u64;
    let report = {
        let mut lister = ObjectsLister::new(|record: ObjectRecord| {
            write_record(&mut *out, &record, format)?;
            printed += 1;
            match limit {
                Some(limit) if printed >= limit => Ok(Flow::Stop),
                _ => Ok(Flow::Continue),
            }
        });
        paginator
            .run(&mut lister, &mut ())
            .await
            .with_context(|| format!("💀 Listing bucket '{bucket}' failed"))?
    };
    out.flush().context("💀 Failed to flush the listing output")?;

    info!(pages = report.pages, objects = printed, "✅ list done");
    Ok(ListReport {
        pages: report.pages,
        objects: printed,
        end: report.end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::fixtures::{expected_records, listing_xml};
    use wiremock::matchers::{method, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn two_page_bucket() -> MockServer {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param_is_missing("continuation-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_xml(3, "", "page2")))
            .mount(&the_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("continuation-token", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_xml(2, "page2", "")))
            .mount(&the_server)
            .await;
        the_server
    }

    fn config_for(server: &MockServer) -> AppConfig {
        AppConfig {
            base_url: Some(format!("{}/", server.uri())),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn the_one_where_summary_adds_up_both_pages() {
        let the_server = two_page_bucket().await;
        let the_report = summary(
            &config_for(&the_server),
            Credentials::new("AKID", "secret"),
            "bucket-name",
            CancellationToken::new(),
            false,
        )
        .await
        .expect("💀 summary should succeed");

        assert_eq!(the_report.pages, 2);
        assert_eq!(
            the_report.totals,
            ListingTotals {
                object_count: 5,
                total_size: (1 + 2 + 3) + (1 + 2),
            }
        );
    }

    #[tokio::test]
    async fn the_one_where_list_prints_tab_separated_lines() {
        let the_server = two_page_bucket().await;
        let mut the_out = Vec::new();
        let the_report = list(
            &config_for(&the_server),
            Credentials::new("AKID", "secret"),
            "bucket-name",
            None,
            ListFormat::Tsv,
            &mut the_out,
            CancellationToken::new(),
        )
        .await
        .expect("💀 list should succeed");

        assert_eq!(the_report.objects, 5);
        assert_eq!(the_report.end, PageEnd::Exhausted);
        let the_text = String::from_utf8(the_out).expect("💀 utf8");
        let the_first = &expected_records(1)[0];
        assert_eq!(
            the_text.lines().next(),
            Some(format!("{}\t{}\t{}", the_first.last_modified, the_first.size, the_first.key).as_str())
        );
        assert_eq!(the_text.lines().count(), 5);
    }

    #[tokio::test]
    async fn the_one_where_the_limit_stops_after_the_first_page() {
        let the_server = two_page_bucket().await;
        let mut the_out = Vec::new();
        let the_report = list(
            &config_for(&the_server),
            Credentials::new("AKID", "secret"),
            "bucket-name",
            Some(2),
            ListFormat::Tsv,
            &mut the_out,
            CancellationToken::new(),
        )
        .await
        .expect("💀 a limited list should succeed");

        assert_eq!(
            the_report,
            ListReport {
                pages: 1,
                objects: 2,
                end: PageEnd::StoppedEarly,
            }
        );
        assert_eq!(String::from_utf8_lossy(&the_out).lines().count(), 2);
    }

    #[tokio::test]
    async fn the_one_where_list_speaks_json_lines() {
        let the_server = two_page_bucket().await;
        let mut the_out = Vec::new();
        let the_report = list(
            &config_for(&the_server),
            Credentials::new("AKID", "secret"),
            "bucket-name",
            None,
            ListFormat::JsonLines,
            &mut the_out,
            CancellationToken::new(),
        )
        .await
        .expect("💀 json list should succeed");

        assert_eq!(the_report.objects, 5);
        let the_text = String::from_utf8(the_out).expect("💀 utf8");
        let the_lines: Vec<serde_json::Value> = the_text
            .lines()
            .map(|line| serde_json::from_str(line).expect("💀 every line is its own JSON object"))
            .collect();
        assert_eq!(the_lines.len(), 5);
        let the_first = &expected_records(1)[0];
        assert_eq!(the_lines[0]["key"], the_first.key.as_str());
        assert_eq!(the_lines[0]["last_modified"], the_first.last_modified.as_str());
        assert_eq!(the_lines[0]["size"], the_first.size);
    }

    #[tokio::test]
    async fn the_one_where_a_forbidden_bucket_explains_itself() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&the_server)
            .await;
        let the_error = summary(
            &config_for(&the_server),
            Credentials::new("AKID", "secret"),
            "bucket-name",
            CancellationToken::new(),
            false,
        )
        .await
        .expect_err("💀 403 should fail the summary");
        let the_chain = format!("{the_error:#}");
        assert!(the_chain.contains("bucket-name"), "{the_chain}");
        assert!(the_chain.contains("403"), "{the_chain}");
    }

    #[test]
    fn the_one_where_credentials_come_from_the_configured_profile_dir() {
        let the_base = tempfile::tempdir().expect("💀 tempdir");
        let the_dir = the_base.path().join(".usacloud").join("work");
        std::fs::create_dir_all(&the_dir).expect("💀 mkdir");
        std::fs::write(
            the_dir.join("config.json"),
            r#"{"AccessToken":"tok","AccessTokenSecret":"sec"}"#,
        )
        .expect("💀 write");

        let the_config = AppConfig {
            profile_dir: Some(the_base.path().to_path_buf()),
            ..AppConfig::default()
        };
        // 🌍 SAKURACLOUD_ACCESS_TOKEN in the developer's shell would win here, so only check the key is non-empty
        let the_creds = load_credentials(&the_config, "work").expect("💀 load");
        assert!(!the_creds.access_key_id().is_empty());
    }
}
