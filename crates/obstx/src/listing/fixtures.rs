//! 🧪 Synthetic ListBucketResult bodies, shaped like the real thing down to the `&quot;` in the ETag.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

use super::{ListingTotals, ObjectRecord};

fn epoch_2024() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("💀 2024-01-01 exists, last I checked")
}

/// 📦 The records `listing_xml` will contain, in document order.
pub(crate) fn expected_records(object_count: usize) -> Vec<ObjectRecord> {
    (0..object_count)
        .map(|i| ObjectRecord {
            key: format!("key{:06}", i + 1),
            last_modified: (epoch_2024() + Duration::seconds(i as i64 + 1))
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            size: i as u64 + 1,
        })
        .collect()
}

/// 🧮 What a Size Aggregator should land on after eating `listing_xml(object_count, ..)`.
pub(crate) fn expected_totals(object_count: usize) -> ListingTotals {
    let n = object_count as u64;
    ListingTotals {
        object_count: n,
        total_size: n * (n + 1) / 2,
    }
}

/// 📜 One full page body. Empty tokens are written self-closing, like the real service does.
pub(crate) fn listing_xml(object_count: usize, continuation_token: &str, next_token: &str) -> String {
    listing_xml_from_records(continuation_token, next_token, &expected_records(object_count))
}

/// 📜 Same, but from hand-picked records. Keys are entity-escaped on the way out.
pub(crate) fn listing_xml_from_records(
    continuation_token: &str,
    next_token: &str,
    records: &[ObjectRecord],
) -> String {
    let mut b = String::new();
    b.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    b.push_str(r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#);
    b.push_str("<Name>bucket-name</Name>");
    b.push_str("<Prefix/>");
    b.push_str("<MaxKeys>1000</MaxKeys>");
    let _ = write!(b, "<IsTruncated>{}</IsTruncated>", !next_token.is_empty());
    b.push_str("<FetchOwner>false</FetchOwner>");
    if continuation_token.is_empty() {
        b.push_str("<ContinuationToken/>");
    } else {
        let _ = write!(b, "<ContinuationToken>{continuation_token}</ContinuationToken>");
    }
    if next_token.is_empty() {
        b.push_str("<NextContinuationToken/>");
    } else {
        let _ = write!(b, "<NextContinuationToken>{next_token}</NextContinuationToken>");
    }
    let _ = write!(b, "<KeyCount>{}</KeyCount>", records.len());
    for (i, record) in records.iter().enumerate() {
        b.push_str("<Contents>");
        let _ = write!(b, "<Key>{}</Key>", escape(&record.key));
        let _ = write!(b, "<LastModified>{}</LastModified>", record.last_modified);
        let _ = write!(b, "<ETag>&quot;{:032x}&quot;</ETag>", i as u64 + 0xabcd_0000_0000_0001);
        let _ = write!(b, "<Size>{}</Size>", record.size);
        b.push_str("<StorageClass>STANDARD</StorageClass>");
        b.push_str("</Contents>");
    }
    b.push_str("</ListBucketResult>");
    b
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
