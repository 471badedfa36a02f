//! 🔐 SigV4 header signing for S3-compatible endpoints.
//!
//! Four layers of HMAC, like an onion that bites back. The payload is never hashed,
//! we send `UNSIGNED-PAYLOAD` and the server takes our word for it (GETs have no body anyway).
//! The path is signed literally, the way S3 wants it: no second round of escaping.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use crate::errors::ListingError;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

static X_AMZ_CONTENT_SHA256: HeaderName = HeaderName::from_static("x-amz-content-sha256");
static X_AMZ_DATE: HeaderName = HeaderName::from_static("x-amz-date");

/// 🔑 An access key pair. `Debug` never shows the secret, not even a little.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// ✍️ Add `x-amz-content-sha256`, `x-amz-date` and `Authorization` to `request`.
///
/// Deterministic for a fixed `now`. Pass `Utc::now()` in real life, a frozen clock in tests.
pub fn sign(
    request: &mut Request,
    credentials: &Credentials,
    region: &str,
    now: DateTime<Utc>,
) -> Result<(), ListingError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/{SERVICE}/aws4_request");

    let url = request.url();
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(ListingError::Signing(format!("request URL {url} has no host")));
        }
    };

    let canonical_request = format!(
        "{method}\n{path}\n{query}\nhost:{host}\nx-amz-content-sha256:{UNSIGNED_PAYLOAD}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{UNSIGNED_PAYLOAD}",
        method = request.method().as_str(),
        path = url.path(),
        query = canonical_query(url),
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credentials.secret_access_key, &date, region)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);
    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
        credentials.access_key_id
    );

    let headers = request.headers_mut();
    headers.insert(
        X_AMZ_CONTENT_SHA256.clone(),
        HeaderValue::from_static(UNSIGNED_PAYLOAD),
    );
    headers.insert(X_AMZ_DATE.clone(), header_value(&amz_date)?);
    headers.insert(AUTHORIZATION, header_value(&authorization)?);
    Ok(())
}

/// 🔤 RFC 3986 unreserved characters pass, everything else becomes `%XX`. `/` included.
pub fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => {
                let _ = write!(encoded, "%{byte:02X}");
            }
        }
    }
    encoded
}

fn canonical_query(url: &reqwest::Url) -> String {
    let mut pairs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        pairs
            .entry(uri_encode(&key))
            .or_default()
            .push(uri_encode(&value));
    }
    let mut canonical = String::new();
    for (key, mut values) in pairs {
        values.sort();
        for value in values {
            if !canonical.is_empty() {
                canonical.push('&');
            }
            let _ = write!(canonical, "{key}={value}");
        }
    }
    canonical
}

fn signing_key(secret: &str, date: &str, region: &str) -> Result<Vec<u8>, ListingError> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ListingError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| ListingError::Signing(format!("HMAC key rejected: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn header_value(value: &str) -> Result<HeaderValue, ListingError> {
    HeaderValue::from_str(value).map_err(|e| ListingError::Signing(e.to_string()))
}
