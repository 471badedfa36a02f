//! 📡 Client: everything between "I have a bucket name" and "here is a response body".
//!
//! 🧠 Knowledge graph:
//! - `sigv4`: AWS Signature Version 4 header signing. Pure function of request + creds + clock
//! - `list_objects_v2`: one signed GET, one status check, one body streamed into a `PageConsumer`
//! - `paginator`: the loop. Token in, token out, until the token runs dry or a consumer says stop
//!
//! Nothing in here retries. Nothing in here runs two requests at once. One page, then the next.

pub mod list_objects_v2;
pub mod paginator;
pub mod sigv4;

pub use list_objects_v2::{BucketTarget, ListObjectsV2Client};
pub use paginator::{PageObserver, Paginator, RunReport};
pub use sigv4::Credentials;
