//! 🔢 Text coercion: raw field bytes -> the scalar the field promised to be.
//!
//! Strings get their XML entities decoded (so `a&amp;b` becomes the key `a&b`, same as any
//! real XML decoder would say). Integers and booleans get trimmed and parsed, and if they
//! don't parse, the error says which field lied and what it said.

use std::borrow::Cow;

use memchr::memchr;

use crate::errors::ListingError;

fn coercion_error(field: &'static str, raw: &[u8], reason: impl Into<String>) -> ListingError {
    ListingError::Coercion {
        field,
        text: String::from_utf8_lossy(raw).into_owned(),
        reason: reason.into(),
    }
}

/// 🔤 Entity-decoded UTF-8 text.
pub(crate) fn text_to_string(field: &'static str, raw: &[u8]) -> Result<String, ListingError> {
    let decoded = unescape(raw).map_err(|reason| coercion_error(field, raw, reason))?;
    String::from_utf8(decoded.into_owned())
        .map_err(|e| coercion_error(field, raw, format!("not valid UTF-8: {e}")))
}

/// 🔢 Base-10 unsigned 64-bit integer. No signs, no spaces inside, no creativity.
pub(crate) fn text_to_u64(field: &'static str, raw: &[u8]) -> Result<u64, ListingError> {
    let trimmed = raw.trim_ascii();
    if trimmed.first() == Some(&b'+') {
        return Err(coercion_error(field, raw, "explicit sign is not allowed"));
    }
    let text = std::str::from_utf8(trimmed)
        .map_err(|e| coercion_error(field, raw, format!("not valid UTF-8: {e}")))?;
    text.parse::<u64>()
        .map_err(|e| coercion_error(field, raw, e.to_string()))
}

/// ✅❌ The same spellings of truth the original tooling accepted, and not one more.
pub(crate) fn text_to_bool(field: &'static str, raw: &[u8]) -> Result<bool, ListingError> {
    match raw.trim_ascii() {
        b"1" | b"t" | b"T" | b"TRUE" | b"true" | b"True" => Ok(true),
        b"0" | b"f" | b"F" | b"FALSE" | b"false" | b"False" => Ok(false),
        _ => Err(coercion_error(field, raw, "expected a boolean")),
    }
}

/// 🧼 Decode the five predefined entities and numeric character references.
fn unescape(raw: &[u8]) -> Result<Cow<'_, [u8]>, String> {
    if memchr(b'&', raw).is_none() {
        return Ok(Cow::Borrowed(raw));
    }

    let mut decoded = Vec::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = memchr(b'&', rest) {
        decoded.extend_from_slice(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = memchr(b';', after).ok_or_else(|| "unterminated entity reference".to_string())?;
        let name = &after[..semi];
        match name {
            b"lt" => decoded.push(b'<'),
            b"gt" => decoded.push(b'>'),
            b"amp" => decoded.push(b'&'),
            b"quot" => decoded.push(b'"'),
            b"apos" => decoded.push(b'\''),
            _ if name.first() == Some(&b'#') => {
                let c = char_reference(&name[1..])
                    .ok_or_else(|| format!("bad character reference &{};", String::from_utf8_lossy(name)))?;
                let mut utf8 = [0u8; 4];
                decoded.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
            _ => {
                return Err(format!(
                    "unknown entity &{};",
                    String::from_utf8_lossy(name)
                ));
            }
        }
        rest = &after[semi + 1..];
    }
    decoded.extend_from_slice(rest);
    Ok(Cow::Owned(decoded))
}

fn char_reference(digits: &[u8]) -> Option<char> {
    let digits = std::str::from_utf8(digits).ok()?;
    let code = match digits.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}
