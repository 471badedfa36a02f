//! 🪣📡 One ListObjectsV2 call: build the URL, sign it, send it, check it, stream it.
//!
//! 🎬 INT. NETWORK STACK. The request leaves with a signature and a continuation token.
//! It comes back with a status code and a body that is, hopefully, a thousand objects of XML.
//! If it comes back with anything other than 200 we read the body anyway (all of it, into
//! the void) so the connection can go home to the pool, and then we complain.
//!
//! 🧠 Knowledge graph:
//! - `BucketTarget`: bucket name + base URL. Virtual-hosted style by default
//! - `ListObjectsV2Client`: reqwest client + target + creds + region + a cancel token
//! - `fetch_page`: the single page operation. Transport/status/parse errors all come back typed
//! - Body plumbing: `bytes_stream()` -> io errors -> `StreamReader`, an `AsyncBufRead`
//!   the lexer can chew on without ever buffering the whole page

use std::io;

use chrono::Utc;
use futures::TryStreamExt;
use reqwest::{Response, StatusCode, Url};
use tokio::io::AsyncBufRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::sigv4::{self, Credentials};
use crate::errors::ListingError;
use crate::listing::{PageConsumer, PageSummary};

/// 🪣 Where a bucket's listing lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTarget {
    bucket: String,
    base_url: Url,
}

impl BucketTarget {
    /// 🏠 `https://{bucket}.{endpoint}/`, the virtual-hosted style everybody expects.
    pub fn virtual_hosted(bucket: &str, endpoint: &str) -> Result<Self, ListingError> {
        Self::check_bucket(bucket)?;
        if endpoint.is_empty() {
            return Err(ListingError::InvalidTarget("endpoint is empty".to_string()));
        }
        Self::with_base_url(bucket, &format!("https://{bucket}.{endpoint}/"))
    }

    /// 🔧 Any base URL at all. Path-style gateways, local mocks, the weird proxy in staging.
    pub fn with_base_url(bucket: &str, base_url: &str) -> Result<Self, ListingError> {
        Self::check_bucket(bucket)?;
        let base_url = Url::parse(base_url)
            .map_err(|e| ListingError::InvalidTarget(format!("{base_url}: {e}")))?;
        if base_url.host_str().is_none() {
            return Err(ListingError::InvalidTarget(format!(
                "{base_url}: no host in URL"
            )));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            base_url,
        })
    }

    fn check_bucket(bucket: &str) -> Result<(), ListingError> {
        if bucket.is_empty() {
            return Err(ListingError::InvalidTarget("bucket name is empty".to_string()));
        }
        Ok(())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 🎟️ `list-type=2`, plus the token when there is one.
    pub fn page_url(&self, continuation_token: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(Some(&list_query(continuation_token)));
        url
    }
}

fn list_query(continuation_token: &str) -> String {
    if continuation_token.is_empty() {
        "list-type=2".to_string()
    } else {
        format!(
            "list-type=2&continuation-token={}",
            sigv4::uri_encode(continuation_token)
        )
    }
}

/// 📡 The ListObjectsV2 caller. One of these per run, reused for every page.
#[derive(Debug, Clone)]
pub struct ListObjectsV2Client {
    http: reqwest::Client,
    target: BucketTarget,
    credentials: Credentials,
    region: String,
    cancel: CancellationToken,
}

impl ListObjectsV2Client {
    pub fn new(
        http: reqwest::Client,
        target: BucketTarget,
        credentials: Credentials,
        region: impl Into<String>,
    ) -> Self {
        Self {
            http,
            target,
            credentials,
            region: region.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// 🛑 Cancelling this token aborts the in-flight HTTP call. Parsing is not interrupted.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn target(&self) -> &BucketTarget {
        &self.target
    }

    /// 📄 Fetch one page and feed its body to `consumer`.
    ///
    /// An empty `continuation_token` means "first page". Non-200 responses are drained
    /// and reported as `UnexpectedStatus`; the consumer never sees them.
    pub async fn fetch_page<C>(
        &self,
        continuation_token: &str,
        consumer: &mut C,
    ) -> Result<PageSummary, ListingError>
    where
        C: PageConsumer,
    {
        let mut request = self
            .http
            .get(self.target.page_url(continuation_token))
            .build()?;
        sigv4::sign(&mut request, &self.credentials, &self.region, Utc::now())?;
        debug!(
            bucket = %self.target.bucket,
            url = %request.url(),
            has_token = !continuation_token.is_empty(),
            "📡 GET ListObjectsV2"
        );

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ListingError::Cancelled),
            sent = self.http.execute(request) => sent?,
        };

        let status = response.status();
        let mut body = body_reader(response);
        if status != StatusCode::OK {
            let drained = discard(&mut body).await;
            return ListingError::with_drain(Err(ListingError::UnexpectedStatus { status }), drained);
        }

        consumer.consume(body).await
    }
}

/// 🔌 reqwest's chunk stream, dressed up as an `AsyncBufRead`. Errors become `io::Error`s
/// so the lexer can report them as `BodyRead`.
fn body_reader(response: Response) -> impl AsyncBufRead + Unpin + Send {
    StreamReader::new(Box::pin(response.bytes_stream().map_err(io::Error::other)))
}

async fn discard<R>(body: &mut R) -> io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let discarded = tokio::io::copy_buf(body, &mut tokio::io::sink()).await?;
    trace!(discarded, "🗑️ discarded error response body");
    Ok(discarded)
}
