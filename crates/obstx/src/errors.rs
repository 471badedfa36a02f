//! 💀 Errors: the many ways a bucket listing can go sideways.
//!
//! 🎬 Every page is a tiny heist. Sign the request, sneak past the status check,
//! stream the XML, grab the sizes, drain the vault on the way out. Any step can
//! trip an alarm, and each alarm gets its own variant so the caller knows
//! exactly which laser they walked through.
//!
//! 🧠 Knowledge graph:
//! - Parse-time: `Lex` (bad token), `Coercion` (bad field text), `BodyRead` (the wire died mid-page)
//! - Wire-time: `Transport`, `UnexpectedStatus`, `Signing`, `InvalidTarget`, `Cancelled`
//! - Cleanup-time: `Drain`, and `DrainAfterError` which keeps BOTH stories intact
//! - Consumer-time: `Callback`, when the per-record callback itself bails, and `TotalsOverflow`
//!
//! None of these are retried. A transient failure ends the run. Retry policy belongs
//! to whoever wraps the driver. 🦆

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// 💀 Everything the listing core can fail with.
#[derive(Error, Debug)]
pub enum ListingError {
    /// 🔤 The event stream tripped over a malformed tag or an unterminated construct.
    #[error("💀 malformed XML: {reason}")]
    Lex { reason: String },

    /// 🔢 Field text could not become the scalar it promised to be.
    #[error("💀 could not coerce <{field}> text {text:?}: {reason}")]
    Coercion {
        field: &'static str,
        text: String,
        reason: String,
    },

    /// 🚦 The server answered, but not with 200.
    #[error("💀 unexpected status code: {status}")]
    UnexpectedStatus { status: StatusCode },

    /// 📡 Building or sending the request failed before any body showed up.
    #[error("💀 listing request never made it: {0}")]
    Transport(#[from] reqwest::Error),

    /// 📡 The response body broke while we were still parsing it.
    #[error("💀 response body read failed mid-page: {0}")]
    BodyRead(#[source] io::Error),

    /// 🗑️ Discarding the unread tail of the body failed.
    #[error("💀 failed to discard the rest of the response body: {0}")]
    Drain(#[source] io::Error),

    /// 🗑️💀 A drain failure that happened while an earlier error was already in flight.
    /// Both are kept. The original is the headline, the drain is the footnote.
    #[error("{original}; additionally failed to discard the rest of the response body: {drain}")]
    DrainAfterError {
        original: Box<ListingError>,
        drain: io::Error,
    },

    /// 🙋 The per-record callback returned an error of its own.
    #[error("💀 record callback failed: {0}")]
    Callback(anyhow::Error),

    /// 🔐 The signature could not be computed or refused to become a header.
    #[error("💀 could not sign the listing request: {0}")]
    Signing(String),

    /// 🪣 The bucket/endpoint combination does not make a URL.
    #[error("💀 cannot build a listing URL: {0}")]
    InvalidTarget(String),

    /// 🧮 The running totals no longer fit in a u64. The totals are left as they were before this record.
    #[error("💀 running totals overflowed after {object_count} objects; refusing to wrap around")]
    TotalsOverflow { object_count: u64 },

    /// 🛑 Somebody pulled the cancel cord while the page fetch was in flight.
    #[error("💀 listing request cancelled")]
    Cancelled,
}

impl ListingError {
    /// 🧷 Glue a drain outcome onto a page outcome without letting either hide the other.
    pub(crate) fn with_drain<T>(
        outcome: Result<T, ListingError>,
        drained: io::Result<u64>,
    ) -> Result<T, ListingError> {
        match (outcome, drained) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(drain)) => Err(ListingError::Drain(drain)),
            (Err(original), Ok(_)) => Err(original),
            (Err(original), Err(drain)) => Err(ListingError::DrainAfterError {
                original: Box::new(original),
                drain,
            }),
        }
    }

    /// 🔎 True for the parse-time failures that mean "this page's XML was not what we expected".
    pub fn is_parse_error(&self) -> bool {
        match self {
            ListingError::Lex { .. } | ListingError::Coercion { .. } => true,
            ListingError::DrainAfterError { original, .. } => original.is_parse_error(),
            _ => false,
        }
    }
}
