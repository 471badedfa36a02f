//! 🧭 The dispatch state machine. Events come in one at a time, the state says what they mean.
//!
//! There are exactly four places we can be:
//!
//! ```text
//!                 <NextContinuationToken>/<KeyCount>/<IsTruncated>
//!  AwaitingTopLevel ──────────────────────────────────────────► AwaitingFieldText{page field}
//!       │   ▲                                                        │ text        │ end tag
//!       │   │ </Contents>  (record complete, hook fires)             ▼             │ (empty value)
//!       │   │                                                  AwaitingEndTag ─────┘
//!  <Contents>                                                        │ end tag
//!       ▼   │                                                        ▼
//!  InsideContents ── <Key>/<LastModified>/<Size> ──► AwaitingFieldText{object field} ...
//! ```
//!
//! Which object fields are "interesting" is decided by the record type, via [`ScratchRecord::tracks`].
//! The Size Aggregator doesn't track `Key`, so a `<Key>` inside `<Contents>` is just noise to it,
//! and its text is never decoded. That's the whole performance trick, honestly.

use tokio::io::AsyncBufRead;
use tracing::trace;

use super::coerce::{text_to_bool, text_to_string, text_to_u64};
use super::{Flow, ListingPage, ObjectRecord, PageEnd, PageSummary, SizeOnlyRecord};
use crate::errors::ListingError;
use crate::lexer::{Event, EventReader, element_name, is_self_closing};

/// 📄 Top-level fields of `ListBucketResult` we care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    NextContinuationToken,
    KeyCount,
    IsTruncated,
}

impl PageField {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"NextContinuationToken" => Some(PageField::NextContinuationToken),
            b"KeyCount" => Some(PageField::KeyCount),
            b"IsTruncated" => Some(PageField::IsTruncated),
            _ => None,
        }
    }

    pub fn element_name(self) -> &'static str {
        match self {
            PageField::NextContinuationToken => "NextContinuationToken",
            PageField::KeyCount => "KeyCount",
            PageField::IsTruncated => "IsTruncated",
        }
    }
}

/// 📦 Fields inside `<Contents>` that some record type might want.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectField {
    Key,
    LastModified,
    Size,
}

impl ObjectField {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"Key" => Some(ObjectField::Key),
            b"LastModified" => Some(ObjectField::LastModified),
            b"Size" => Some(ObjectField::Size),
            _ => None,
        }
    }

    pub fn element_name(self) -> &'static str {
        match self {
            ObjectField::Key => "Key",
            ObjectField::LastModified => "LastModified",
            ObjectField::Size => "Size",
        }
    }
}

/// 🎯 Where the next text event is going to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Page(PageField),
    Object(ObjectField),
}

impl FieldTarget {
    fn element_name(self) -> &'static str {
        match self {
            FieldTarget::Page(field) => field.element_name(),
            FieldTarget::Object(field) => field.element_name(),
        }
    }
}

/// 🔙 Where to go back to once a field's end tag shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTo {
    TopLevel,
    InsideContents,
}

impl ReturnTo {
    fn state(self) -> DispatchState {
        match self {
            ReturnTo::TopLevel => DispatchState::AwaitingTopLevel,
            ReturnTo::InsideContents => DispatchState::InsideContents,
        }
    }
}

/// 🧭 The four states. `Copy`, tiny, and matched on by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    AwaitingTopLevel,
    AwaitingFieldText { target: FieldTarget, return_to: ReturnTo },
    AwaitingEndTag { return_to: ReturnTo },
    InsideContents,
}

/// 📝 A record type that knows which object fields it wants and how to store them.
pub trait ScratchRecord: Default + Send {
    fn tracks(field: ObjectField) -> bool;

    /// Coerce `text` into `field`. Only called for tracked fields.
    fn assign(&mut self, field: ObjectField, text: &[u8]) -> Result<(), ListingError>;

    /// The field was present but empty. Reset it to its zero value.
    fn clear(&mut self, field: ObjectField);
}

impl ScratchRecord for ObjectRecord {
    fn tracks(_field: ObjectField) -> bool {
        true
    }

    fn assign(&mut self, field: ObjectField, text: &[u8]) -> Result<(), ListingError> {
        let name = field.element_name();
        match field {
            ObjectField::Key => self.key = text_to_string(name, text)?,
            ObjectField::LastModified => self.last_modified = text_to_string(name, text)?,
            ObjectField::Size => self.size = text_to_u64(name, text)?,
        }
        Ok(())
    }

    fn clear(&mut self, field: ObjectField) {
        match field {
            ObjectField::Key => self.key.clear(),
            ObjectField::LastModified => self.last_modified.clear(),
            ObjectField::Size => self.size = 0,
        }
    }
}

impl ScratchRecord for SizeOnlyRecord {
    fn tracks(field: ObjectField) -> bool {
        field == ObjectField::Size
    }

    fn assign(&mut self, field: ObjectField, text: &[u8]) -> Result<(), ListingError> {
        if field == ObjectField::Size {
            self.size = text_to_u64(field.element_name(), text)?;
        }
        Ok(())
    }

    fn clear(&mut self, field: ObjectField) {
        if field == ObjectField::Size {
            self.size = 0;
        }
    }
}

/// 🎬 The per-consumer bit: what record to fill and what to do once it's full.
pub trait RecordPlan: Send {
    type Record: ScratchRecord;

    fn complete(&mut self, record: Self::Record) -> Result<Flow, ListingError>;
}

impl ListingPage {
    fn assign(&mut self, field: PageField, text: &[u8]) -> Result<(), ListingError> {
        let name = field.element_name();
        match field {
            PageField::NextContinuationToken => {
                self.next_continuation_token = text_to_string(name, text)?
            }
            PageField::KeyCount => self.key_count = text_to_u64(name, text)?,
            PageField::IsTruncated => self.is_truncated = text_to_bool(name, text)?,
        }
        Ok(())
    }

    fn clear(&mut self, field: PageField) {
        match field {
            PageField::NextContinuationToken => self.next_continuation_token.clear(),
            PageField::KeyCount => self.key_count = 0,
            PageField::IsTruncated => self.is_truncated = false,
        }
    }
}

/// 🧭 One page's worth of parsing state. Built fresh per body, thrown away after.
pub struct Dispatcher<'p, P: RecordPlan> {
    state: DispatchState,
    page: ListingPage,
    scratch: P::Record,
    plan: &'p mut P,
}

impl<'p, P: RecordPlan> Dispatcher<'p, P> {
    pub fn new(plan: &'p mut P) -> Self {
        Self {
            state: DispatchState::AwaitingTopLevel,
            page: ListingPage::default(),
            scratch: P::Record::default(),
            plan,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn page(&self) -> &ListingPage {
        &self.page
    }

    pub fn into_page(self) -> ListingPage {
        self.page
    }

    /// ⚙️ Apply one event. `Flow::Stop` means a record hook wants out.
    pub fn handle(&mut self, event: Event<'_>) -> Result<Flow, ListingError> {
        match (self.state, event) {
            (DispatchState::AwaitingTopLevel, Event::StartTag(raw)) => {
                let name = element_name(raw)?;
                if let Some(field) = PageField::from_name(name) {
                    if is_self_closing(raw) {
                        self.page.clear(field);
                    } else {
                        self.state = DispatchState::AwaitingFieldText {
                            target: FieldTarget::Page(field),
                            return_to: ReturnTo::TopLevel,
                        };
                    }
                } else if name == b"Contents" {
                    self.scratch = P::Record::default();
                    if is_self_closing(raw) {
                        return self.finish_record();
                    }
                    self.state = DispatchState::InsideContents;
                }
                Ok(Flow::Continue)
            }

            (DispatchState::InsideContents, Event::StartTag(raw)) => {
                let name = element_name(raw)?;
                if let Some(field) = ObjectField::from_name(name)
                    && P::Record::tracks(field)
                {
                    if is_self_closing(raw) {
                        self.scratch.clear(field);
                    } else {
                        self.state = DispatchState::AwaitingFieldText {
                            target: FieldTarget::Object(field),
                            return_to: ReturnTo::InsideContents,
                        };
                    }
                }
                Ok(Flow::Continue)
            }

            (DispatchState::InsideContents, Event::EndTag(raw)) => {
                if element_name(raw)? == b"Contents" {
                    self.state = DispatchState::AwaitingTopLevel;
                    return self.finish_record();
                }
                Ok(Flow::Continue)
            }

            (DispatchState::AwaitingFieldText { target, return_to }, Event::Text(text)) => {
                match target {
                    FieldTarget::Page(field) => self.page.assign(field, text)?,
                    FieldTarget::Object(field) => self.scratch.assign(field, text)?,
                }
                self.state = DispatchState::AwaitingEndTag { return_to };
                Ok(Flow::Continue)
            }

            (DispatchState::AwaitingFieldText { target, return_to }, Event::EndTag(_)) => {
                trace!(field = target.element_name(), "📭 empty field, zero value it is");
                match target {
                    FieldTarget::Page(field) => self.page.clear(field),
                    FieldTarget::Object(field) => self.scratch.clear(field),
                }
                self.state = return_to.state();
                Ok(Flow::Continue)
            }

            (DispatchState::AwaitingEndTag { return_to }, Event::EndTag(_)) => {
                self.state = return_to.state();
                Ok(Flow::Continue)
            }

            // 🙈 everything else is noise we don't react to
            _ => Ok(Flow::Continue),
        }
    }

    fn finish_record(&mut self) -> Result<Flow, ListingError> {
        let record = std::mem::take(&mut self.scratch);
        self.plan.complete(record)
    }
}

/// 🔁 Pump one body through a fresh dispatcher, then drain whatever is left. Always.
pub(crate) async fn consume_page<R, P>(body: R, plan: &mut P) -> Result<PageSummary, ListingError>
where
    R: AsyncBufRead + Unpin + Send,
    P: RecordPlan,
{
    let mut events = EventReader::new(body);
    let mut dispatcher = Dispatcher::new(plan);

    let outcome = pump(&mut events, &mut dispatcher).await;
    let drained = events.drain().await;
    if let Ok(discarded) = &drained
        && *discarded > 0
    {
        trace!(discarded, "🗑️ drained unparsed tail of the response body");
    }

    let end = ListingError::with_drain(outcome, drained)?;
    Ok(PageSummary {
        page: dispatcher.into_page(),
        end,
    })
}

async fn pump<R, P>(
    events: &mut EventReader<R>,
    dispatcher: &mut Dispatcher<'_, P>,
) -> Result<PageEnd, ListingError>
where
    R: AsyncBufRead + Unpin + Send,
    P: RecordPlan,
{
    loop {
        let event = events.next_event().await?;
        if event == Event::EndOfStream {
            return Ok(PageEnd::Exhausted);
        }
        if dispatcher.handle(event)? == Flow::Stop {
            return Ok(PageEnd::StoppedEarly);
        }
    }
}
