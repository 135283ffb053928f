//! Inline markup layout engine.
//!
//! Display text and descriptions may carry inline directives:
//!
//! | token      | meaning                                             |
//! |------------|-----------------------------------------------------|
//! | `%B`       | open a bold region                                  |
//! | `%C`       | open a centered region                              |
//! | `%` / `%\` | close the innermost open region                     |
//! | `%I<path>%`| draw an image                                       |
//! | `%L`       | draw a horizontal rule                              |
//! | `%N`       | line break                                          |
//! | `\%`       | a literal percent sign                              |
//!
//! A `%` followed by any other ASCII letter is literal text.
//!
//! [`next_directive`] is called repeatedly against the unconsumed rest of a
//! line. Each call yields one thing to draw and how many bytes it consumed,
//! so the caller can keep its own cursor and width budget.

use std::path::Path;

use crate::images::AssetError;

/// Measurement backend for the surface that will draw the layout.
pub trait TextMeasurer {
    /// Advance width of `text` in surface units.
    fn measure_width(&self, text: &str) -> u32;

    /// Native size of the image at `path` in surface units.
    ///
    /// # Errors
    /// Returns [`AssetError`] when the image cannot be read.
    fn image_intrinsic_size(&self, path: &Path) -> Result<(u32, u32), AssetError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Bold,
    Center,
}

/// Ordered, de-duplicated set of modifiers active for a run, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers(Vec<Modifier>);

impl Modifiers {
    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0.contains(&modifier)
    }

    pub fn is_bold(&self) -> bool {
        self.contains(Modifier::Bold)
    }

    pub fn is_centered(&self) -> bool {
        self.contains(Modifier::Center)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<T: IntoIterator<Item = Modifier>>(iter: T) -> Self {
        let mut set = Vec::new();
        for modifier in iter {
            if !set.contains(&modifier) {
                set.push(modifier);
            }
        }
        Self(set)
    }
}

/// Open `%B` / `%C` regions for the logical line being laid out.
///
/// Lives for one line: create (or [`reset`](Self::reset)) it at line start and
/// pass the same stack to every [`next_directive`] call for that line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierStack {
    open: Vec<Modifier>,
}

impl ModifierStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, modifier: Modifier) {
        self.open.push(modifier);
    }

    pub fn pop(&mut self) -> Option<Modifier> {
        self.open.pop()
    }

    pub fn reset(&mut self) {
        self.open.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Modifiers applying to text drawn now.
    pub fn active(&self) -> Modifiers {
        self.open.iter().copied().collect()
    }
}

/// One unit of drawing produced by [`next_directive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawDirective {
    /// A run of text. `width` is its measured width. `complete` is false when
    /// the run was cut to fit the budget and more text follows.
    ///
    /// An empty `content` means the budget is exhausted: not even one more
    /// character fits.
    Text {
        content: String,
        modifiers: Modifiers,
        width: u32,
        complete: bool,
    },
    Image {
        path: String,
    },
    HorizontalRule,
    LineBreak,
}

impl DrawDirective {
    fn exhausted(modifiers: Modifiers) -> Self {
        DrawDirective::Text {
            content: String::new(),
            modifiers,
            width: 0,
            complete: false,
        }
    }

    /// True for the "nothing more fits" sentinel.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, DrawDirective::Text { content, .. } if content.is_empty())
    }

    /// Space to skip before a centered run: `(line_budget - width) / 2`,
    /// measured from the current position and capped so the run still ends
    /// within `remaining`.
    ///
    /// Only whole runs are centered; a run that had to be cut is drawn where
    /// it starts.
    pub fn center_offset(&self, line_budget: u32, remaining: u32) -> u32 {
        match self {
            DrawDirective::Text {
                modifiers,
                width,
                complete: true,
                ..
            } if modifiers.is_centered() && *width <= line_budget => {
                ((line_budget - width) / 2).min(remaining.saturating_sub(*width))
            }
            _ => 0,
        }
    }
}

/// A directive plus the number of input bytes it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutStep {
    pub directive: DrawDirective,
    pub consumed: usize,
}

/// Produces the next thing to draw from `input`.
///
/// Region opens and closes are applied to `modifiers` and folded into the
/// consumed count of the directive that follows them. Returns `None` once
/// nothing drawable remains.
///
/// When even a single character of the next text run is wider than
/// `remaining_width` the exhausted sentinel is returned. Its `consumed`
/// covers only region tokens, so the caller resumes at the same text on the
/// next line.
pub fn next_directive(
    input: &str,
    remaining_width: u32,
    modifiers: &mut ModifierStack,
    measurer: &dyn TextMeasurer,
) -> Option<LayoutStep> {
    let mut pos = 0;
    loop {
        let rest = &input[pos..];
        if rest.is_empty() {
            return None;
        }

        if let Some(after) = rest.strip_prefix('%') {
            match after.chars().next() {
                Some('I') => {
                    let body = &after[1..];
                    let (path, used) = match body.find('%') {
                        Some(end) => (&body[..end], 2 + end + 1),
                        None => (body, 2 + body.len()),
                    };
                    return Some(LayoutStep {
                        directive: DrawDirective::Image {
                            path: path.to_string(),
                        },
                        consumed: pos + used,
                    });
                }
                Some('N') => {
                    return Some(LayoutStep {
                        directive: DrawDirective::LineBreak,
                        consumed: pos + 2,
                    });
                }
                Some('L') => {
                    return Some(LayoutStep {
                        directive: DrawDirective::HorizontalRule,
                        consumed: pos + 2,
                    });
                }
                Some('B') => {
                    modifiers.push(Modifier::Bold);
                    pos += 2;
                    continue;
                }
                Some('C') => {
                    modifiers.push(Modifier::Center);
                    pos += 2;
                    continue;
                }
                Some(letter) if letter.is_ascii_alphabetic() => {
                    // Unknown directive letters are plain text.
                }
                Some('\\') => {
                    close_region(modifiers);
                    pos += 2;
                    continue;
                }
                _ => {
                    close_region(modifiers);
                    pos += 1;
                    continue;
                }
            }
        }

        return Some(fit_text_run(rest, pos, remaining_width, modifiers, measurer));
    }
}

fn close_region(modifiers: &mut ModifierStack) {
    if modifiers.pop().is_none() {
        tracing::debug!("ignoring region close with nothing open");
    }
}

fn is_directive_letter(ch: char) -> bool {
    matches!(ch, 'I' | 'N' | 'L' | 'B' | 'C')
}

/// Unescaped characters of the text run at the start of `rest`, each paired
/// with the source offset just past it.
fn scan_text_run(rest: &str) -> Vec<(char, usize)> {
    let mut pieces = Vec::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' if matches!(chars.peek(), Some(&(_, '%'))) => {
                chars.next();
                pieces.push(('%', offset + 2));
            }
            '%' => match chars.peek() {
                Some(&(_, next)) if next.is_ascii_alphabetic() && !is_directive_letter(next) => {
                    pieces.push(('%', offset + 1));
                }
                _ => break,
            },
            other => pieces.push((other, offset + other.len_utf8())),
        }
    }
    pieces
}

fn fit_text_run(
    rest: &str,
    pos: usize,
    remaining_width: u32,
    modifiers: &ModifierStack,
    measurer: &dyn TextMeasurer,
) -> LayoutStep {
    let pieces = scan_text_run(rest);
    let active = modifiers.active();

    let content: String = pieces.iter().map(|(ch, _)| ch).collect();
    let width = measurer.measure_width(&content);
    if width <= remaining_width {
        let end = pieces.last().map_or(0, |(_, end)| *end);
        return LayoutStep {
            directive: DrawDirective::Text {
                content,
                modifiers: active,
                width,
                complete: true,
            },
            consumed: pos + end,
        };
    }

    // Grow the longest prefix that still fits.
    let mut prefix = String::new();
    let mut best = None;
    for (ch, end) in &pieces {
        prefix.push(*ch);
        let prefix_width = measurer.measure_width(&prefix);
        if prefix_width > remaining_width {
            break;
        }
        best = Some((prefix.len(), prefix_width, *end));
    }

    match best {
        Some((len, width, end)) => {
            prefix.truncate(len);
            LayoutStep {
                directive: DrawDirective::Text {
                    content: prefix,
                    modifiers: active,
                    width,
                    complete: false,
                },
                consumed: pos + end,
            }
        }
        None => LayoutStep {
            directive: DrawDirective::exhausted(active),
            consumed: pos,
        },
    }
}
