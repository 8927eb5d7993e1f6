//! Fixed-capacity diff storage and its read cursor

use super::span::{DiffSpan, ReadResult};
use crate::framebuffer::{Region, PANEL_HEIGHT, PANEL_WIDTH};

/// How the spans of a diff are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Layout {
    /// Stored spans. After an overflow, every row from `tail` down to the
    /// bottom of the panel is sent in full.
    Spans { tail: Option<u16> },
    /// One span per native row of a box, no comparison involved
    Rows(Region),
}

/// Lifecycle of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiffState {
    /// Consumed or never computed
    Invalid,
    /// Computed, cursor at the first span
    Ready,
    /// Being consumed by a transfer
    Reading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    index: usize,
    row: u16,
}

/// An ordered, single-pass sequence of [`DiffSpan`]s
///
/// Spans live in caller-provided storage so that no memory is allocated per
/// frame. A buffer with no storage can still hold dummy (full redraw) diffs.
pub struct DiffBuffer<'a> {
    storage: &'a mut [DiffSpan],
    len: usize,
    layout: Layout,
    state: DiffState,
    cursor: Cursor,
}

impl<'a> DiffBuffer<'a> {
    /// Storage-less buffer for full redraws
    pub fn dummy() -> Self {
        Self::new(Default::default())
    }

    pub fn new(storage: &'a mut [DiffSpan]) -> Self {
        Self {
            storage,
            len: 0,
            layout: Layout::Spans { tail: None },
            state: DiffState::Invalid,
            cursor: Cursor { index: 0, row: 0 },
        }
    }

    pub fn state(&self) -> DiffState {
        self.state
    }

    /// True if the storage ran out while encoding the last diff
    pub fn overflowed(&self) -> bool {
        matches!(self.layout, Layout::Spans { tail: Some(_) })
    }

    /// Make this a full redraw of a native box: one span per row
    pub fn set_rows(&mut self, native_box: Region) {
        self.len = 0;
        self.layout = Layout::Rows(native_box);
        self.mark_ready();
    }

    /// Restart the cursor of a computed diff
    pub fn rewind(&mut self) {
        if self.state != DiffState::Invalid {
            self.mark_ready();
        }
    }

    /// Drop the content
    pub fn invalidate(&mut self) {
        self.state = DiffState::Invalid;
    }

    /// First unread span without consuming it
    pub fn peek(&self) -> Option<DiffSpan> {
        if self.state == DiffState::Invalid {
            return None;
        }
        self.span_at(self.cursor)
    }

    /// Pull the next span if the beam has reached its row
    ///
    /// `max_scanline` is the beam's current row. A span on a later row is
    /// left unread and reported as [`ReadResult::MustWait`]. Reading past
    /// the last span invalidates the diff.
    pub fn read(&mut self, max_scanline: u32) -> ReadResult {
        if self.state == DiffState::Invalid {
            return ReadResult::Done;
        }
        self.state = DiffState::Reading;
        match self.span_at(self.cursor) {
            None => {
                self.state = DiffState::Invalid;
                ReadResult::Done
            }
            Some(span) if span.row as u32 > max_scanline => ReadResult::MustWait {
                until_scanline: span.row,
            },
            Some(span) => {
                self.cursor = self.advance(self.cursor);
                ReadResult::Span(span)
            }
        }
    }

    /// All spans from the start, without touching the cursor
    pub fn iter(&self) -> SpanIter<'_, 'a> {
        SpanIter {
            diff: self,
            cursor: if self.state == DiffState::Invalid {
                None
            } else {
                Some(self.start())
            },
        }
    }

    /// True if there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.state == DiffState::Invalid || self.span_at(self.start()).is_none()
    }

    /// Pixels covered by all spans
    pub fn pixel_count(&self) -> u32 {
        self.iter().map(|s| s.len as u32).sum()
    }

    pub(crate) fn begin_spans(&mut self) {
        self.len = 0;
        self.layout = Layout::Spans { tail: None };
        self.state = DiffState::Invalid;
    }

    /// Append a span; spans must arrive in ascending row order
    pub(crate) fn push(&mut self, span: DiffSpan) {
        let Layout::Spans { tail } = &mut self.layout else {
            return;
        };
        if tail.is_some() {
            // rows at or below the tail are already covered
            return;
        }
        if self.len < self.storage.len() {
            self.storage[self.len] = span;
            self.len += 1;
            return;
        }
        while self.len > 0 && self.storage[self.len - 1].row >= span.row {
            self.len -= 1;
        }
        *tail = Some(span.row);
    }

    pub(crate) fn finish_spans(&mut self) {
        self.mark_ready();
    }

    fn mark_ready(&mut self) {
        self.state = DiffState::Ready;
        self.cursor = self.start();
    }

    fn start(&self) -> Cursor {
        let row = match self.layout {
            Layout::Spans { tail } => tail.unwrap_or(PANEL_HEIGHT as u16),
            Layout::Rows(b) => b.y_min,
        };
        Cursor { index: 0, row }
    }

    fn span_at(&self, cursor: Cursor) -> Option<DiffSpan> {
        match self.layout {
            Layout::Spans { .. } if cursor.index < self.len => Some(self.storage[cursor.index]),
            Layout::Spans { .. } => ((cursor.row as usize) < PANEL_HEIGHT)
                .then(|| DiffSpan::new(cursor.row, 0, PANEL_WIDTH as u16)),
            Layout::Rows(b) => {
                (cursor.row <= b.y_max).then(|| DiffSpan::new(cursor.row, b.x_min, b.width() as u16))
            }
        }
    }

    fn advance(&self, cursor: Cursor) -> Cursor {
        match self.layout {
            Layout::Spans { .. } if cursor.index < self.len => Cursor {
                index: cursor.index + 1,
                ..cursor
            },
            _ => Cursor {
                row: cursor.row + 1,
                ..cursor
            },
        }
    }
}

/// Iterator over the spans of a [`DiffBuffer`]
pub struct SpanIter<'d, 'a> {
    diff: &'d DiffBuffer<'a>,
    cursor: Option<Cursor>,
}

impl Iterator for SpanIter<'_, '_> {
    type Item = DiffSpan;

    fn next(&mut self) -> Option<DiffSpan> {
        let cursor = self.cursor?;
        let span = self.diff.span_at(cursor);
        self.cursor = span.map(|_| self.diff.advance(cursor));
        span
    }
}
