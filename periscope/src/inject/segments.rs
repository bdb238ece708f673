//! Placeholder scanner for trace statements.
//!
//! A statement is plain text with `{name}` placeholders; `\{` and `\}` are
//! literal escapes. The scanner finds placeholder spans; it does not judge
//! the names inside them (the synthesizer validates those against the
//! target function's parameters).
//!
//! Placeholder interiors track nested-brace depth and single/double-quote
//! string state, so content like `{'a{'}` parses as one placeholder. All
//! scanning is byte-based: braces, quotes, and backslashes are ASCII, and a
//! UTF-8 continuation byte can never alias one of them.

use std::iter::FusedIterator;

use crate::domain::TraceError;

/// Half-open byte span of one placeholder's interior, braces excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    /// The placeholder text this span covers in `statement`.
    #[must_use]
    pub fn text<'a>(&self, statement: &'a str) -> &'a str {
        &statement[self.start..self.end]
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Outside,
    Single,
    Double,
}

/// Finds the byte offset of the `}` that closes the `{` at `block[0]`,
/// or `None` if the block never closes.
fn close_of_block(block: &[u8]) -> Option<usize> {
    let mut prev: Option<u8> = None;
    let mut state = QuoteState::Outside;
    let mut open = 0i32;
    for (idx, &byte) in block.iter().enumerate() {
        let escaped = prev == Some(b'\\');
        match state {
            QuoteState::Outside => {
                if !escaped && byte == b'\'' {
                    state = QuoteState::Single;
                } else if !escaped && byte == b'"' {
                    state = QuoteState::Double;
                } else if !escaped && byte == b'{' {
                    open += 1;
                } else if !escaped && byte == b'}' {
                    open -= 1;
                    if open == 0 {
                        return Some(idx);
                    }
                }
            }
            QuoteState::Single => {
                if !escaped && byte == b'\'' {
                    state = QuoteState::Outside;
                }
            }
            QuoteState::Double => {
                if !escaped && byte == b'"' {
                    state = QuoteState::Outside;
                }
            }
        }
        prev = Some(byte);
    }
    None
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|offset| from + offset)
}

/// Lazy left-to-right scan of `statement` for placeholder spans.
///
/// Fused: after the first error (or the end of the string) it yields
/// nothing further.
pub struct Segments<'a> {
    statement: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl Iterator for Segments<'_> {
    type Item = Result<Segment, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let found = find_byte(self.statement, b'{', self.cursor)?;
            if found != 0 && self.statement[found - 1] == b'\\' {
                self.cursor = found + 1;
                continue;
            }
            return match close_of_block(&self.statement[found..]) {
                Some(close) => {
                    self.cursor = found + close + 1;
                    Some(Ok(Segment { start: found + 1, end: found + close }))
                }
                None => {
                    self.failed = true;
                    Some(Err(TraceError::UnterminatedPlaceholder { at: found }))
                }
            };
        }
    }
}

impl FusedIterator for Segments<'_> {}

/// Scans `statement` for placeholders.
pub fn segments(statement: &str) -> Segments<'_> {
    Segments { statement: statement.as_bytes(), cursor: 0, failed: false }
}

/// Collects every placeholder span, stopping at the first scan error.
pub fn parse_segments(statement: &str) -> Result<Vec<Segment>, TraceError> {
    segments(statement).collect()
}

enum SectionState {
    /// No placeholders at all: the whole statement is one literal.
    Whole,
    /// Literal before the first placeholder.
    Leading,
    /// Placeholder at this index.
    Placeholder(usize),
    /// Literal between this placeholder and the next.
    Gap(usize),
    /// Literal after the last placeholder.
    Tail,
    Done,
}

/// Ordered walk of `statement` as alternating literal and placeholder
/// pieces; empty literal pieces between adjacent placeholders are skipped.
pub struct Sections<'s, 'g> {
    statement: &'s str,
    segments: &'g [Segment],
    state: SectionState,
}

impl<'s> Iterator for Sections<'s, '_> {
    type Item = (bool, &'s str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                SectionState::Whole => {
                    self.state = SectionState::Done;
                    return Some((false, self.statement));
                }
                SectionState::Leading => {
                    let literal = &self.statement[..self.segments[0].start - 1];
                    self.state = SectionState::Placeholder(0);
                    if !literal.is_empty() {
                        return Some((false, literal));
                    }
                }
                SectionState::Placeholder(idx) => {
                    self.state = if idx + 1 < self.segments.len() {
                        SectionState::Gap(idx)
                    } else {
                        SectionState::Tail
                    };
                    return Some((true, self.segments[idx].text(self.statement)));
                }
                SectionState::Gap(idx) => {
                    let literal =
                        &self.statement[self.segments[idx].end + 1..self.segments[idx + 1].start - 1];
                    self.state = SectionState::Placeholder(idx + 1);
                    if !literal.is_empty() {
                        return Some((false, literal));
                    }
                }
                SectionState::Tail => {
                    let last = self.segments[self.segments.len() - 1];
                    let literal = &self.statement[last.end + 1..];
                    self.state = SectionState::Done;
                    if !literal.is_empty() {
                        return Some((false, literal));
                    }
                }
                SectionState::Done => return None,
            }
        }
    }
}

impl FusedIterator for Sections<'_, '_> {}

/// Walks `statement` against its parsed placeholder spans, yielding
/// `(is_placeholder, text)` pairs that cover the whole string in order.
///
/// With no placeholders the entire statement comes back as one literal
/// pair, even when it is empty.
pub fn sections<'s, 'g>(statement: &'s str, segments: &'g [Segment]) -> Sections<'s, 'g> {
    let state = if segments.is_empty() {
        SectionState::Whole
    } else {
        SectionState::Leading
    };
    Sections { statement, segments, state }
}
