//! 🪣 obstx counts and lists objects in S3-compatible buckets without ever holding a whole page in memory.
//!
//! 🧠 Knowledge graph:
//! - `lexer`: bytes -> StartTag / EndTag / Text events, one token at a time
//! - `listing`: events -> records -> your callback (Full Lister) or two counters (Size Aggregator)
//! - `client`: SigV4 signing, one ListObjectsV2 call, and the pagination loop
//! - `app_config` + `profiles`: where the endpoint and the credentials come from
//! - `progress`: the spinner and the final table
//! - `commands`: `summary` and `list`, glued together for the CLI

pub mod app_config;
pub mod client;
pub mod commands;
pub mod errors;
pub mod lexer;
pub mod listing;
pub mod profiles;
pub mod progress;

pub use errors::ListingError;
