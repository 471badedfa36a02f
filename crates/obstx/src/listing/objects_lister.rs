//! 📋 The Full Lister. Every object, key + last-modified + size, straight into your callback.
//!
//! The callback decides the pace. Return `Flow::Stop` and the rest of the page is drained
//! unparsed, the summary comes back `StoppedEarly`, and the paginator knows to quit.
//! Return an error and it surfaces as `ListingError::Callback`, body drained all the same.

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

use super::dispatch::{RecordPlan, consume_page};
use super::{Flow, ObjectRecord, PageConsumer, PageSummary};
use crate::errors::ListingError;

pub struct ObjectsLister<F> {
    on_record: F,
}

impl<F> ObjectsLister<F>
where
    F: FnMut(ObjectRecord) -> anyhow::Result<Flow> + Send,
{
    pub fn new(on_record: F) -> Self {
        Self { on_record }
    }
}

impl<F> std::fmt::Debug for ObjectsLister<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectsLister").finish_non_exhaustive()
    }
}

impl<F> RecordPlan for ObjectsLister<F>
where
    F: FnMut(ObjectRecord) -> anyhow::Result<Flow> + Send,
{
    type Record = ObjectRecord;

    fn complete(&mut self, record: ObjectRecord) -> Result<Flow, ListingError> {
        (self.on_record)(record).map_err(ListingError::Callback)
    }
}

#[async_trait]
impl<F> PageConsumer for ObjectsLister<F>
where
    F: FnMut(ObjectRecord) -> anyhow::Result<Flow> + Send,
{
    async fn consume<R>(&mut self, body: R) -> Result<PageSummary, ListingError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        consume_page(body, self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::PageEnd;
    use crate::listing::fixtures::{expected_records, listing_xml, listing_xml_from_records};
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn the_one_where_every_page_shape_lists_every_object_in_order() {
        // 🎬 (object count, continuation token, next token), the same page shapes a real run sees
        let the_cases = [
            (1, "", ""),
            (2, "", ""),
            (1000, "", "token1"),
            (1000, "token1", "token2"),
            (500, "token2", ""),
        ];
        for (the_count, the_token, the_next) in the_cases {
            let the_xml = listing_xml(the_count, the_token, the_next);
            let mut the_records = Vec::new();
            let the_summary = {
                let mut the_lister = ObjectsLister::new(|record| {
                    the_records.push(record);
                    Ok(Flow::Continue)
                });
                the_lister
                    .consume(the_xml.as_bytes())
                    .await
                    .expect("💀 a well-formed page should parse")
            };

            assert_eq!(the_records, expected_records(the_count), "count={the_count}");
            assert_eq!(the_summary.end, PageEnd::Exhausted);
            assert_eq!(the_summary.page.next_continuation_token, the_next);
            assert_eq!(the_summary.page.key_count, the_count as u64);
            assert_eq!(the_summary.page.is_truncated, !the_next.is_empty());
        }
    }

    #[tokio::test]
    async fn the_one_where_tiny_reads_change_nothing() {
        let the_xml = listing_xml(37, "", "next");
        let mut the_records = Vec::new();
        {
            let mut the_lister = ObjectsLister::new(|record| {
                the_records.push(record);
                Ok(Flow::Continue)
            });
            // 🐌 7-byte reads split tags, text, and entities all over the place
            the_lister
                .consume(BufReader::with_capacity(7, the_xml.as_bytes()))
                .await
                .expect("💀 chunking must not matter");
        }
        assert_eq!(the_records, expected_records(37));
    }

    #[tokio::test]
    async fn the_one_where_keys_with_ampersands_come_back_decoded() {
        let the_weird_ones = vec![
            ObjectRecord {
                key: "tom&jerry/<1>.txt".to_string(),
                last_modified: "2024-05-05T05:05:05Z".to_string(),
                size: 5,
            },
            ObjectRecord {
                key: "日本語/ファイル.bin".to_string(),
                last_modified: "2024-05-05T05:05:06Z".to_string(),
                size: 0,
            },
        ];
        let the_xml = listing_xml_from_records("", "", &the_weird_ones);
        let mut the_records = Vec::new();
        {
            let mut the_lister = ObjectsLister::new(|record| {
                the_records.push(record);
                Ok(Flow::Continue)
            });
            the_lister
                .consume(the_xml.as_bytes())
                .await
                .expect("💀 escaped keys are still keys");
        }
        assert_eq!(the_records, the_weird_ones);
    }

    #[tokio::test]
    async fn the_one_where_the_callback_stops_after_three() {
        let the_xml = listing_xml(10, "", "more");
        let mut the_seen = 0usize;
        let the_summary = {
            let mut the_lister = ObjectsLister::new(|_| {
                the_seen += 1;
                Ok(if the_seen == 3 { Flow::Stop } else { Flow::Continue })
            });
            the_lister
                .consume(the_xml.as_bytes())
                .await
                .expect("💀 stopping is not failing")
        };
        assert_eq!(the_seen, 3);
        assert_eq!(the_summary.end, PageEnd::StoppedEarly);
        // 🎟️ the token sits before the first Contents, so it was already captured
        assert_eq!(the_summary.page.next_continuation_token, "more");
    }

    #[tokio::test]
    async fn the_one_where_the_callback_error_is_wrapped_not_swallowed() {
        let the_xml = listing_xml(4, "", "");
        let mut the_lister = ObjectsLister::new(|record: ObjectRecord| {
            if record.key == "key000002" {
                anyhow::bail!("stdout is closed, nobody is listening");
            }
            Ok(Flow::Continue)
        });
        let the_error = the_lister
            .consume(the_xml.as_bytes())
            .await
            .expect_err("💀 the callback failed, so the page fails");
        assert!(matches!(the_error, ListingError::Callback(_)));
        assert!(the_error.to_string().contains("nobody is listening"));
    }

    #[tokio::test]
    async fn the_one_where_a_bad_size_fails_the_whole_page() {
        let the_xml = listing_xml(3, "", "").replace("<Size>2</Size>", "<Size>two</Size>");
        let mut the_count = 0usize;
        let the_error = {
            let mut the_lister = ObjectsLister::new(|_| {
                the_count += 1;
                Ok(Flow::Continue)
            });
            the_lister
                .consume(the_xml.as_bytes())
                .await
                .expect_err("💀 'two' is not a size")
        };
        assert!(the_error.is_parse_error());
        assert_eq!(the_count, 1, "only the record before the bad one was delivered");
    }

    #[tokio::test]
    async fn the_one_where_stopping_on_the_first_record_still_empties_the_body() {
        let the_xml = listing_xml(50, "", "more");
        let mut the_body = BufReader::with_capacity(16, the_xml.as_bytes());
        let mut the_calls = 0usize;
        let the_summary = {
            let mut the_lister = ObjectsLister::new(|_| {
                the_calls += 1;
                Ok(Flow::Stop)
            });
            the_lister
                .consume(&mut the_body)
                .await
                .expect("💀 stopping is not failing")
        };

        assert_eq!(the_calls, 1);
        assert_eq!(the_summary.end, PageEnd::StoppedEarly);
        let the_leftovers = the_body.fill_buf().await.expect("💀 reading the drained body");
        assert!(the_leftovers.is_empty(), "{} bytes left unread", the_leftovers.len());
    }

    #[tokio::test]
    async fn the_one_where_a_bad_size_still_empties_the_body() {
        let the_xml = listing_xml(50, "", "").replace("<Size>2</Size>", "<Size>abc</Size>");
        let mut the_body = BufReader::with_capacity(16, the_xml.as_bytes());
        let the_error = {
            let mut the_lister = ObjectsLister::new(|_| Ok(Flow::Continue));
            the_lister
                .consume(&mut the_body)
                .await
                .expect_err("💀 'abc' is not a size")
        };

        assert!(
            matches!(the_error, ListingError::Coercion { field: "Size", .. }),
            "{the_error:?}"
        );
        let the_leftovers = the_body.fill_buf().await.expect("💀 reading the drained body");
        assert!(the_leftovers.is_empty(), "{} bytes left unread", the_leftovers.len());
    }
}
