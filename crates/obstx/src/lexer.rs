//! 🔤 The lexical event stream: bytes in, one tag-or-text event out, nothing more.
//!
//! This is deliberately NOT an XML parser. It does not build trees, resolve namespaces,
//! validate anything, or remember what it saw two events ago. It hands out exactly one
//! event at a time, borrowed from its internal buffer, and forgets it the moment you ask
//! for the next one. The dispatch engine upstream does all the remembering.
//!
//! 🧠 Knowledge graph:
//! - `StartTag(raw)`: raw bytes INCLUDING `<` and `>`. `<Prefix/>` is one StartTag, no end event.
//! - `EndTag(raw)`: `</Name>`, brackets included.
//! - `Text(raw)`: character data between tags, as-is. CDATA arrives here too, unwrapped.
//! - `EndOfStream`: the body ran out. Not an error.
//! - Skipped without a trace: `<?xml ..?>`, `<!-- .. -->`, `<!DOCTYPE ..>`.
//! - Memory: one token + one read chunk. A 40 MB listing page never lives in RAM at once.
//!
//! 🦆 The duck asked for a DOM. The duck was told no.

use std::io;

use memchr::{memchr, memchr3, memmem};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::errors::ListingError;

const CDATA_OPEN: &[u8] = b"<![CDATA[";
const COMMENT_OPEN: &[u8] = b"<!--";

/// 📦 One lexical event, borrowed from the reader until the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    StartTag(&'a [u8]),
    EndTag(&'a [u8]),
    Text(&'a [u8]),
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Start,
    End,
    Text,
    Skip,
}

/// 🔍 What the classifier made of the bytes at the front of the window.
#[derive(Debug, PartialEq, Eq)]
enum Classified {
    /// `content` is relative to the window, `len` is how far to advance.
    Token {
        kind: TokenKind,
        content: (usize, usize),
        len: usize,
    },
    NeedMore,
}

enum Scanned {
    Token {
        kind: TokenKind,
        start: usize,
        end: usize,
    },
    EndOfStream,
}

/// 🚰 Forward-only event reader over any async buffered byte source.
///
/// The response body, a file, a `&[u8]` in a test. It does not care. It reads, it finds
/// the next `<` or `>`, it hands you a slice, it moves on.
pub struct EventReader<R> {
    inner: R,
    buf: Vec<u8>,
    // -- 📍 start of the not-yet-emitted bytes in `buf`
    pos: usize,
    // -- 📏 bytes already dropped off the front of `buf`, for error offsets
    discarded: u64,
    eof: bool,
}

impl<R> std::fmt::Debug for EventReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReader")
            .field("buffered", &(self.buf.len() - self.pos))
            .field("offset", &self.offset())
            .field("eof", &self.eof)
            .finish()
    }
}

impl<R> EventReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
            discarded: 0,
            eof: false,
        }
    }

    /// 📏 Absolute byte offset of the next unread byte.
    pub fn offset(&self) -> u64 {
        self.discarded + self.pos as u64
    }

    /// 🔙 Hand back the source. Whatever was buffered but not emitted is dropped with the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncBufRead + Unpin> EventReader<R> {

    /// 📤 Pull the next event. Comments, declarations and DOCTYPE are swallowed here.
    pub async fn next_event(&mut self) -> Result<Event<'_>, ListingError> {
        loop {
            match self.scan().await? {
                Scanned::EndOfStream => return Ok(Event::EndOfStream),
                Scanned::Token {
                    kind: TokenKind::Skip,
                    ..
                } => continue,
                Scanned::Token { kind, start, end } => {
                    let raw = &self.buf[start..end];
                    return Ok(match kind {
                        TokenKind::Start => Event::StartTag(raw),
                        TokenKind::End => Event::EndTag(raw),
                        _ => Event::Text(raw),
                    });
                }
            }
        }
    }

    /// 🗑️ Throw away everything not yet read, buffered or still on the wire.
    ///
    /// Returns how many bytes went into the void. Calling it twice is fine, the second
    /// call just finds an empty room and returns 0.
    pub async fn drain(&mut self) -> io::Result<u64> {
        let buffered = (self.buf.len() - self.pos) as u64;
        self.discarded += self.buf.len() as u64;
        self.buf.clear();
        self.pos = 0;
        if self.eof {
            return Ok(buffered);
        }
        let the_rest = tokio::io::copy_buf(&mut self.inner, &mut tokio::io::sink()).await?;
        self.discarded += the_rest;
        self.eof = true;
        Ok(buffered + the_rest)
    }

    async fn scan(&mut self) -> Result<Scanned, ListingError> {
        loop {
            if self.pos == self.buf.len() && !self.fill().await? {
                return Ok(Scanned::EndOfStream);
            }

            match classify(&self.buf[self.pos..], self.eof) {
                Classified::Token { kind, content, len } => {
                    let base = self.pos;
                    self.pos += len;
                    return Ok(Scanned::Token {
                        kind,
                        start: base + content.0,
                        end: base + content.1,
                    });
                }
                Classified::NeedMore => {
                    if !self.fill().await? && self.buf[self.pos] == b'<' {
                        // -- 💀 the body ended in the middle of a tag. no amount of waiting fixes that.
                        return Err(ListingError::Lex {
                            reason: format!(
                                "unterminated markup starting at byte {}",
                                self.offset()
                            ),
                        });
                    }
                }
            }
        }
    }

    /// 🔄 Append one more chunk from the source. `false` means the source is dry.
    async fn fill(&mut self) -> Result<bool, ListingError> {
        if self.eof {
            return Ok(false);
        }
        if self.pos > 0 {
            // -- 🧹 compact: the emitted prefix is dead weight now
            self.buf.drain(..self.pos);
            self.discarded += self.pos as u64;
            self.pos = 0;
        }
        let chunk = self.inner.fill_buf().await.map_err(ListingError::BodyRead)?;
        if chunk.is_empty() {
            self.eof = true;
            return Ok(false);
        }
        let n = chunk.len();
        self.buf.extend_from_slice(chunk);
        self.inner.consume(n);
        Ok(true)
    }
}

/// 🧮 Decide what token sits at the front of `window`, without touching any I/O.
fn classify(window: &[u8], eof: bool) -> Classified {
    if window[0] != b'<' {
        return match memchr(b'<', window) {
            Some(at) => text(0, at, at),
            None if eof => text(0, window.len(), window.len()),
            None => Classified::NeedMore,
        };
    }

    if window.starts_with(b"<?") {
        return match memmem::find(&window[2..], b"?>") {
            Some(at) => skip(2 + at + 2),
            None => Classified::NeedMore,
        };
    }

    if window.starts_with(b"<!") {
        // -- ⏳ "<!-" or "<![CD" might still become a comment or CDATA once more bytes land
        let could_grow = window.len() < CDATA_OPEN.len()
            && (CDATA_OPEN.starts_with(window) || COMMENT_OPEN.starts_with(window));
        if could_grow && !eof {
            return Classified::NeedMore;
        }
        if window.starts_with(COMMENT_OPEN) {
            return match memmem::find(&window[COMMENT_OPEN.len()..], b"-->") {
                Some(at) => skip(COMMENT_OPEN.len() + at + 3),
                None => Classified::NeedMore,
            };
        }
        if window.starts_with(CDATA_OPEN) {
            let open = CDATA_OPEN.len();
            return match memmem::find(&window[open..], b"]]>") {
                Some(at) => text(open, open + at, open + at + 3),
                None => Classified::NeedMore,
            };
        }
        return match find_tag_end(window) {
            Some(at) => skip(at + 1),
            None => Classified::NeedMore,
        };
    }

    let kind = if window.starts_with(b"</") {
        TokenKind::End
    } else {
        TokenKind::Start
    };
    match find_tag_end(window) {
        Some(at) => Classified::Token {
            kind,
            content: (0, at + 1),
            len: at + 1,
        },
        None => Classified::NeedMore,
    }
}

fn text(start: usize, end: usize, len: usize) -> Classified {
    Classified::Token {
        kind: TokenKind::Text,
        content: (start, end),
        len,
    }
}

fn skip(len: usize) -> Classified {
    Classified::Token {
        kind: TokenKind::Skip,
        content: (0, 0),
        len,
    }
}

/// 🔚 Index of the `>` closing the tag at the front of `window`, skipping quoted attribute values.
fn find_tag_end(window: &[u8]) -> Option<usize> {
    let mut i = 1;
    loop {
        let at = i + memchr3(b'>', b'"', b'\'', &window[i..])?;
        match window[at] {
            b'>' => return Some(at),
            quote => {
                let close = at + 1 + memchr(quote, &window[at + 1..])?;
                i = close + 1;
            }
        }
    }
}

/// ✂️ `/>` at the end of the raw tag bytes. Purely syntactic, name-agnostic.
pub fn is_self_closing(raw: &[u8]) -> bool {
    raw.ends_with(b"/>")
}

/// 🏷️ Local element name of a raw start/end tag. `<s3:Key a="b">` gives `Key`.
pub fn element_name(raw: &[u8]) -> Result<&[u8], ListingError> {
    let malformed = |why: &str| ListingError::Lex {
        reason: format!("{why} in tag {:?}", String::from_utf8_lossy(raw)),
    };

    let inner = raw
        .strip_prefix(b"</")
        .or_else(|| raw.strip_prefix(b"<"))
        .and_then(|rest| rest.strip_suffix(b">"))
        .ok_or_else(|| malformed("missing angle brackets"))?;

    let name_end = inner
        .iter()
        .position(|b| b.is_ascii_whitespace() || *b == b'/')
        .unwrap_or(inner.len());
    let qualified = &inner[..name_end];
    let local = match memchr(b':', qualified) {
        Some(colon) => &qualified[colon + 1..],
        None => qualified,
    };

    if local.is_empty() {
        return Err(malformed("empty element name"));
    }
    Ok(local)
}
