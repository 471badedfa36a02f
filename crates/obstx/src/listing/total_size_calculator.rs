//! 🧮 The Size Aggregator. Counts objects, sums sizes, and refuses to look at anything else.

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

use super::dispatch::{RecordPlan, consume_page};
use super::{Flow, ListingTotals, PageConsumer, PageSummary, SizeOnlyRecord};
use crate::errors::ListingError;

/// Totals accumulate across every page this calculator is handed. One calculator, one run.
#[derive(Debug, Default)]
pub struct TotalSizeCalculator {
    totals: ListingTotals,
}

impl TotalSizeCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> ListingTotals {
        self.totals
    }
}

impl RecordPlan for TotalSizeCalculator {
    type Record = SizeOnlyRecord;

    fn complete(&mut self, record: SizeOnlyRecord) -> Result<Flow, ListingError> {
        let overflow = || ListingError::TotalsOverflow {
            object_count: self.totals.object_count,
        };
        let object_count = self.totals.object_count.checked_add(1).ok_or_else(overflow)?;
        let total_size = self.totals.total_size.checked_add(record.size).ok_or_else(overflow)?;
        self.totals = ListingTotals {
            object_count,
            total_size,
        };
        Ok(Flow::Continue)
    }
}

#[async_trait]
impl PageConsumer for TotalSizeCalculator {
    async fn consume<R>(&mut self, body: R) -> Result<PageSummary, ListingError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        consume_page(body, self).await
    }

    fn running_totals(&self) -> Option<ListingTotals> {
        Some(self.totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::PageEnd;
    use crate::listing::fixtures::{expected_totals, listing_xml};

    #[tokio::test]
    async fn the_one_where_each_page_shape_adds_up() {
        let the_cases = [
            (0, "", ""),
            (1, "", ""),
            (2, "", ""),
            (1000, "", "token1"),
            (1000, "token1", "token2"),
            (500, "token2", ""),
        ];
        for (the_count, the_token, the_next) in the_cases {
            let mut the_calculator = TotalSizeCalculator::new();
            let the_summary = the_calculator
                .consume(listing_xml(the_count, the_token, the_next).as_bytes())
                .await
                .expect("💀 a well-formed page should add up");

            assert_eq!(the_calculator.totals(), expected_totals(the_count));
            assert_eq!(the_summary.page.next_continuation_token, the_next);
            assert_eq!(the_summary.end, PageEnd::Exhausted);
        }
    }

    #[tokio::test]
    async fn the_one_where_totals_roll_over_from_page_to_page() {
        let mut the_calculator = TotalSizeCalculator::new();
        for (the_token, the_next) in [("", "t1"), ("t1", "t2"), ("t2", "")] {
            the_calculator
                .consume(listing_xml(10, the_token, the_next).as_bytes())
                .await
                .expect("💀 page should parse");
        }
        assert_eq!(
            the_calculator.totals(),
            ListingTotals {
                object_count: 30,
                total_size: 3 * 55,
            }
        );
        assert_eq!(the_calculator.running_totals(), Some(the_calculator.totals()));
    }

    #[tokio::test]
    async fn the_one_where_an_empty_bucket_is_zero_and_zero() {
        let mut the_calculator = TotalSizeCalculator::new();
        let the_summary = the_calculator
            .consume(listing_xml(0, "", "").as_bytes())
            .await
            .expect("💀 an empty bucket is still a bucket");
        assert_eq!(the_calculator.totals(), ListingTotals::default());
        assert!(!the_summary.page.is_truncated);
        assert!(the_summary.page.next_continuation_token.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_a_bare_contents_counts_as_an_object_of_size_zero() {
        let the_xml = "<ListBucketResult><Contents/><Contents><Size>4</Size></Contents></ListBucketResult>";
        let mut the_calculator = TotalSizeCalculator::new();
        the_calculator
            .consume(the_xml.as_bytes())
            .await
            .expect("💀 <Contents/> is weird but legal");
        assert_eq!(
            the_calculator.totals(),
            ListingTotals {
                object_count: 2,
                total_size: 4,
            }
        );
    }

    #[tokio::test]
    async fn the_one_where_the_sizes_outgrow_a_u64() {
        let the_xml = "<ListBucketResult>\
            <Contents><Size>18446744073709551615</Size></Contents>\
            <Contents><Size>1</Size></Contents>\
            </ListBucketResult>";
        let mut the_calculator = TotalSizeCalculator::new();
        let the_error = the_calculator
            .consume(the_xml.as_bytes())
            .await
            .expect_err("💀 u64::MAX + 1 has to go somewhere, and that somewhere is an error");

        assert!(
            matches!(the_error, ListingError::TotalsOverflow { object_count: 1 }),
            "{the_error:?}"
        );
        // 🧮 the first object still counts, the second one never landed
        assert_eq!(
            the_calculator.totals(),
            ListingTotals {
                object_count: 1,
                total_size: u64::MAX,
            }
        );
    }

    #[tokio::test]
    async fn the_one_where_a_negative_size_is_rejected() {
        let the_xml = listing_xml(2, "", "").replace("<Size>2</Size>", "<Size>-2</Size>");
        let mut the_calculator = TotalSizeCalculator::new();
        let the_error = the_calculator
            .consume(the_xml.as_bytes())
            .await
            .expect_err("💀 objects do not have negative sizes");
        assert!(matches!(the_error, ListingError::Coercion { field: "Size", .. }));
    }
}
