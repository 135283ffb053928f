//! Response protocol decoder.
//!
//! The child answers every query with one line made of zero or more records:
//!
//! ```text
//! {display text|action|description}
//! ```
//!
//! `action` and `description` are optional. A record without an action is a
//! title (section header) and cannot be selected. The delimiters `{`, `|`, `}`
//! and `\` can be escaped with a backslash. A backslash in front of any other
//! character is kept as-is, so markup escapes such as `\%` survive decoding.
//!
//! Decoding copies the unescaped field bodies into one owned arena and records
//! only byte ranges into it. The arena is never mutated after a set is built,
//! so a published [`ResultSet`] can be shared freely between the reader and
//! the renderer.

use std::fmt;
use std::ops::Range;

/// What went wrong while framing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// `{` while a record was already open.
    UnexpectedOpen,
    /// `|` outside of a record.
    UnexpectedSplit,
    /// `}` outside of a record.
    UnexpectedClose,
    /// The message ended inside a record.
    Unterminated,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyntaxErrorKind::UnexpectedOpen => "unexpected '{' inside a record",
            SyntaxErrorKind::UnexpectedSplit => "unexpected '|' outside of a record",
            SyntaxErrorKind::UnexpectedClose => "unexpected '}' outside of a record",
            SyntaxErrorKind::Unterminated => "message ended inside a record",
        };
        f.write_str(text)
    }
}

/// Malformed record framing. Carries the byte offset of the offending input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("syntax error at byte {offset}: {kind}")]
pub struct SyntaxError {
    pub offset: usize,
    pub kind: SyntaxErrorKind,
}

/// Borrowed view of one decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultRecord<'a> {
    pub text: &'a str,
    pub action: Option<&'a str>,
    pub description: Option<&'a str>,
}

impl ResultRecord<'_> {
    /// Titles have no action and are skipped by navigation.
    pub fn is_title(&self) -> bool {
        self.action.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordSpans {
    text: Range<usize>,
    action: Option<Range<usize>>,
    description: Option<Range<usize>>,
}

/// Ordered records decoded from a single message.
///
/// Immutable once built. Order is the order of appearance on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    arena: Box<str>,
    records: Vec<RecordSpans>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ResultRecord<'_>> {
        self.records.get(index).map(|spans| self.view(spans))
    }

    /// Returns true when the record at `index` exists and has an action.
    pub fn is_actionable(&self, index: usize) -> bool {
        self.records
            .get(index)
            .is_some_and(|spans| spans.action.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = ResultRecord<'_>> {
        self.records.iter().map(|spans| self.view(spans))
    }

    fn view(&self, spans: &RecordSpans) -> ResultRecord<'_> {
        ResultRecord {
            text: &self.arena[spans.text.clone()],
            action: spans.action.clone().map(|range| &self.arena[range]),
            description: spans.description.clone().map(|range| &self.arena[range]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Closed,
    AwaitingSplit1,
    AwaitingSplit2,
    AwaitingClose,
}

/// Decodes one message (without its line terminator) into a [`ResultSet`].
///
/// Framing is done on raw bytes; field bodies become text only when they are
/// copied into the arena, with invalid UTF-8 replaced. On any framing error
/// nothing is returned but the error; callers keep whatever set they
/// published before.
///
/// # Errors
/// Returns a [`SyntaxError`] with the byte offset into `buffer` of the first
/// framing violation, or of the end of input when a record is left open.
pub fn decode(buffer: &[u8]) -> Result<ResultSet, SyntaxError> {
    let mut arena = String::with_capacity(buffer.len());
    let mut records = Vec::new();

    let mut state = FrameState::Closed;
    let mut field = Vec::new();
    let mut text = 0..0;
    let mut action = None;

    let mut bytes = buffer.iter().copied().enumerate().peekable();
    while let Some((offset, byte)) = bytes.next() {
        match byte {
            b'\\' => {
                let escaped = match bytes.peek() {
                    Some(&(_, next @ (b'{' | b'|' | b'}' | b'\\'))) => {
                        bytes.next();
                        next
                    }
                    _ => b'\\',
                };
                if state != FrameState::Closed {
                    field.push(escaped);
                }
            }
            b'{' => {
                if state != FrameState::Closed {
                    return Err(SyntaxError {
                        offset,
                        kind: SyntaxErrorKind::UnexpectedOpen,
                    });
                }
                state = FrameState::AwaitingSplit1;
                field.clear();
            }
            b'|' => match state {
                FrameState::Closed => {
                    return Err(SyntaxError {
                        offset,
                        kind: SyntaxErrorKind::UnexpectedSplit,
                    });
                }
                FrameState::AwaitingSplit1 => {
                    text = push_field(&mut arena, &mut field);
                    state = FrameState::AwaitingSplit2;
                }
                FrameState::AwaitingSplit2 => {
                    action = Some(push_field(&mut arena, &mut field));
                    state = FrameState::AwaitingClose;
                }
                // Extra separators belong to the description.
                FrameState::AwaitingClose => field.push(b'|'),
            },
            b'}' => {
                let spans = match state {
                    FrameState::Closed => {
                        return Err(SyntaxError {
                            offset,
                            kind: SyntaxErrorKind::UnexpectedClose,
                        });
                    }
                    FrameState::AwaitingSplit1 => RecordSpans {
                        text: push_field(&mut arena, &mut field),
                        action: None,
                        description: None,
                    },
                    FrameState::AwaitingSplit2 => RecordSpans {
                        text: text.clone(),
                        action: Some(push_field(&mut arena, &mut field)),
                        description: None,
                    },
                    FrameState::AwaitingClose => RecordSpans {
                        text: text.clone(),
                        action: action.take(),
                        description: Some(push_field(&mut arena, &mut field)),
                    },
                };
                records.push(spans);
                action = None;
                state = FrameState::Closed;
            }
            // Anything between records is ignored.
            other => {
                if state != FrameState::Closed {
                    field.push(other);
                }
            }
        }
    }

    if state != FrameState::Closed {
        return Err(SyntaxError {
            offset: buffer.len(),
            kind: SyntaxErrorKind::Unterminated,
        });
    }

    Ok(ResultSet {
        arena: arena.into_boxed_str(),
        records,
    })
}

/// Appends the pending field body to the arena and returns its range.
fn push_field(arena: &mut String, field: &mut Vec<u8>) -> Range<usize> {
    let start = arena.len();
    arena.push_str(&String::from_utf8_lossy(field));
    field.clear();
    start..arena.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape_field(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for ch in text.chars() {
            if matches!(ch, '{' | '|' | '}' | '\\') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped
    }

    fn records(input: &str) -> Vec<(String, Option<String>, Option<String>)> {
        decode(input.as_bytes())
            .unwrap()
            .iter()
            .map(|r| {
                (
                    r.text.to_string(),
                    r.action.map(str::to_string),
                    r.description.map(str::to_string),
                )
            })
            .collect()
    }

    #[test]
    fn decodes_single_action_record() {
        let set = decode(b"{Open File|open ~/file}").unwrap();
        assert_eq!(set.len(), 1);
        let record = set.get(0).unwrap();
        assert_eq!(record.text, "Open File");
        assert_eq!(record.action, Some("open ~/file"));
        assert_eq!(record.description, None);
        assert!(!record.is_title());
    }

    #[test]
    fn title_record_has_no_action_or_description() {
        let set = decode(b"{Section header}{Item|run item}").unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.get(0).unwrap().is_title());
        assert_eq!(set.get(0).unwrap().description, None);
        assert!(set.is_actionable(1));
        assert!(!set.is_actionable(0));
        assert!(!set.is_actionable(2));
    }

    #[test]
    fn description_absent_versus_empty() {
        let got = records("{a|b}{c|d|}{e|f|g}");
        assert_eq!(
            got,
            vec![
                ("a".into(), Some("b".into()), None),
                ("c".into(), Some("d".into()), Some(String::new())),
                ("e".into(), Some("f".into()), Some("g".into())),
            ]
        );
    }

    #[test]
    fn empty_action_is_still_actionable() {
        let set = decode(b"{run nothing|}").unwrap();
        assert_eq!(set.get(0).unwrap().action, Some(""));
        assert!(set.is_actionable(0));
    }

    #[test]
    fn escapes_yield_literal_delimiters() {
        let set = decode(br"{a \{b\} \| c \\ d|act\|ion}").unwrap();
        let record = set.get(0).unwrap();
        assert_eq!(record.text, r"a {b} | c \ d");
        assert_eq!(record.action, Some("act|ion"));
    }

    #[test]
    fn lone_backslash_is_passed_through() {
        let set = decode(br"{100\% sure\n|x}").unwrap();
        assert_eq!(set.get(0).unwrap().text, r"100\% sure\n");
    }

    #[test]
    fn escaped_backslash_before_delimiter_closes_normally() {
        let set = decode(br"{path\\}").unwrap();
        assert_eq!(set.get(0).unwrap().text, r"path\");
    }

    #[test]
    fn extra_separator_stays_in_description() {
        let set = decode(b"{t|a|x|y}").unwrap();
        assert_eq!(set.get(0).unwrap().description, Some("x|y"));
    }

    #[test]
    fn text_between_records_is_ignored() {
        let got = records("  {a|b}\r junk {c}\r");
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].0, "c");
    }

    #[test]
    fn empty_message_decodes_to_empty_set() {
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn preserves_source_order() {
        let got = records("{3|c}{1|a}{2|b}");
        let texts: Vec<_> = got.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(texts, ["3", "1", "2"]);
    }

    #[test]
    fn stray_close_is_an_error() {
        let err = decode(b"{ok|fine}}").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedClose);
        assert_eq!(err.offset, 9);
    }

    #[test]
    fn split_while_closed_is_an_error() {
        let err = decode(b"|{a|b}").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedSplit);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn nested_open_is_an_error() {
        let err = decode(b"{a{b}").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedOpen);
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn unterminated_record_is_an_error() {
        let err = decode(b"{a|b}{c|d").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::Unterminated);
        assert_eq!(err.offset, 9);
    }

    #[test]
    fn utf8_fields_survive() {
        let set = decode("{café ☕|echo ü}".as_bytes()).unwrap();
        let record = set.get(0).unwrap();
        assert_eq!(record.text, "café ☕");
        assert_eq!(record.action, Some("echo ü"));
    }

    #[test]
    fn escape_field_makes_bodies_decodable() {
        let body = r"weird {text} | with \ slashes";
        let message = format!("{{{}|{}}}", escape_field(body), escape_field("x|y"));
        let set = decode(message.as_bytes()).unwrap();
        assert_eq!(set.get(0).unwrap().text, body);
        assert_eq!(set.get(0).unwrap().action, Some("x|y"));
    }

    #[test]
    fn offsets_index_the_raw_bytes() {
        let err = decode(b"\xff}").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedClose);
        assert_eq!(err.offset, 1);

        let err = decode(b"{\xfe\xff|a}}").unwrap_err();
        assert_eq!(err.offset, 6);

        let err = decode(b"{caf\xc3\xa9|x").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::Unterminated);
        assert_eq!(err.offset, 9);
    }

    #[test]
    fn invalid_utf8_is_replaced_inside_fields_only() {
        let set = decode(b"\xff{a\xffb|x}").unwrap();
        let record = set.get(0).unwrap();
        assert_eq!(record.text, "a\u{fffd}b");
        assert_eq!(record.action, Some("x"));
    }

    #[test]
    fn error_message_mentions_offset() {
        let err = decode(b"}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "syntax error at byte 0: unexpected '}' outside of a record"
        );
    }
}
