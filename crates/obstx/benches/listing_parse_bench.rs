//! 🏎️ How fast can one 1000-object ListBucketResult page be chewed?
//!
//! Both consumers, same page. The Size Aggregator should win: it never decodes a key.
//!
//! Run with: `cargo bench --bench listing_parse_bench`

use std::fmt::Write as _;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use obstx::listing::{Flow, ObjectsLister, PageConsumer, TotalSizeCalculator};

fn page_xml(object_count: usize) -> String {
    let mut b = String::with_capacity(object_count * 300);
    b.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    b.push_str(r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#);
    b.push_str("<Name>bench</Name><Prefix/><MaxKeys>1000</MaxKeys><IsTruncated>true</IsTruncated>");
    b.push_str("<ContinuationToken/><NextContinuationToken>next</NextContinuationToken>");
    let _ = write!(b, "<KeyCount>{object_count}</KeyCount>");
    for i in 0..object_count {
        let _ = write!(
            b,
            "<Contents><Key>logs/2024/01/01/key{:06}.json.gz</Key>\
             <LastModified>2024-01-01T00:00:{:02}.000Z</LastModified>\
             <ETag>&quot;{:032x}&quot;</ETag><Size>{}</Size>\
             <StorageClass>STANDARD</StorageClass></Contents>",
            i + 1,
            i % 60,
            i as u64 + 0xabcd_0000_0000_0001,
            (i + 1) * 1024
        );
    }
    b.push_str("</ListBucketResult>");
    b
}

fn bench_one_page(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("💀 Failed to create Tokio runtime");
    let xml = page_xml(1000);

    let mut group = c.benchmark_group("listing_page_1000");
    group.throughput(Throughput::Bytes(xml.len() as u64));

    group.bench_function("total_size_calculator", |b| {
        b.to_async(&rt).iter(|| async {
            let mut calculator = TotalSizeCalculator::new();
            calculator
                .consume(xml.as_bytes())
                .await
                .expect("💀 bench page should parse");
            calculator.totals()
        })
    });

    group.bench_function("objects_lister", |b| {
        b.to_async(&rt).iter(|| async {
            let mut total_key_bytes = 0usize;
            let mut lister = ObjectsLister::new(|record| {
                total_key_bytes += record.key.len();
                Ok(Flow::Continue)
            });
            lister
                .consume(xml.as_bytes())
                .await
                .expect("💀 bench page should parse");
            drop(lister);
            total_key_bytes
        })
    });

    group.finish();
}

criterion_group!(benches, bench_one_page);
criterion_main!(benches);
