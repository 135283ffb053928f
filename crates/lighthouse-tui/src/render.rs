//! Pure view functions for the popup.
//!
//! Everything here reads a [`StoreSnapshot`] taken once per frame, so the
//! list, the highlight and the description always agree with each other.

use lighthouse_core::images;
use lighthouse_core::markup::{self, DrawDirective, ModifierStack, Modifiers, TextMeasurer};
use lighthouse_core::store::StoreSnapshot;
use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph};
use unicode_width::UnicodeWidthChar;

use crate::state::{AppState, ChildStatus, PopupSettings};

const RULE: &str = "─";
const IMAGE_CELL: &str = "▒";

/// Screen areas of the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupLayout {
    pub popup: Rect,
    pub query: Rect,
    pub results: Rect,
    pub description: Option<Rect>,
}

/// Places the popup on `screen`.
///
/// The anchor point is `x`/`y` percent of the screen and stays fixed while the
/// list grows or shrinks. The description panel extends the popup to the
/// right by `desc_width` columns when there is room.
pub fn popup_layout(
    screen: Rect,
    settings: &PopupSettings,
    visible_rows: u16,
    shown_rows: u16,
    with_description: bool,
) -> PopupLayout {
    let list_width = settings.width.min(screen.width);
    let desc_width = if with_description {
        settings
            .desc_width
            .min(screen.width.saturating_sub(list_width))
    } else {
        0
    };
    let total_width = list_width + desc_width;

    let full_height = visible_rows.saturating_add(1).min(screen.height);
    let height = if desc_width > 0 {
        full_height
    } else {
        shown_rows.saturating_add(1).min(full_height)
    };

    let anchor_x = (u32::from(screen.width) * u32::from(settings.x_percent) / 100) as u16;
    let anchor_y = (u32::from(screen.height) * u32::from(settings.y_percent) / 100) as u16;
    let left = anchor_x
        .saturating_sub(list_width / 2)
        .min(screen.width.saturating_sub(total_width));
    let top = anchor_y
        .saturating_sub(full_height / 2)
        .min(screen.height.saturating_sub(full_height));

    let x = screen.x + left;
    let y = screen.y + top;
    let popup = Rect::new(x, y, total_width, height);
    let query = Rect::new(x, y, list_width, height.min(1));
    let results = Rect::new(x, y + query.height, list_width, height - query.height);
    let description = (desc_width > 0).then(|| Rect::new(x + list_width, y, desc_width, height));

    PopupLayout {
        popup,
        query,
        results,
        description,
    }
}

/// Renders the popup.
pub fn render(app: &AppState, frame: &mut Frame, measurer: &dyn TextMeasurer) {
    let snapshot = app.results.snapshot();
    let settings = &app.settings;
    let theme = settings.theme;

    let description = snapshot
        .highlighted()
        .filter(|record| !record.is_title())
        .and_then(|record| record.description);
    let layout = popup_layout(
        frame.area(),
        settings,
        snapshot.visible_rows as u16,
        snapshot.shown_rows() as u16,
        description.is_some(),
    );
    if layout.popup.is_empty() {
        return;
    }

    frame.render_widget(Clear, layout.popup);
    render_query(app, frame, layout.query);
    render_results(&snapshot, settings, frame, layout.results, measurer);

    if let (Some(area), Some(text)) = (layout.description, description) {
        let inner = pad_horizontally(area, settings.horiz_padding);
        let lines = layout_panel(
            text,
            u32::from(inner.width),
            usize::from(inner.height),
            measurer,
        );
        let style = Style::default().fg(theme.result_fg).bg(theme.result_bg);
        frame.render_widget(Paragraph::new("").style(style), area);
        frame.render_widget(Paragraph::new(lines).style(style), inner);
    }
}

fn render_query(app: &AppState, frame: &mut Frame, area: Rect) {
    if area.is_empty() {
        return;
    }
    let theme = app.settings.theme;
    let style = Style::default().fg(theme.query_fg).bg(theme.query_bg);

    let (visible, cursor_col) = scroll_query(app.query.text(), app.query.before_cursor(), area.width);
    let mut spans = vec![Span::raw(visible.to_string())];
    if let ChildStatus::Stopped { .. } = app.child {
        spans.push(Span::styled(
            " [child exited]",
            style.add_modifier(Modifier::DIM),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).style(style), area);
    frame.set_cursor_position(Position::new(area.x + cursor_col, area.y));
}

/// Drops leading characters until the cursor fits inside `width` columns.
/// Returns the visible tail and the cursor column within it.
fn scroll_query<'a>(text: &'a str, before_cursor: &str, width: u16) -> (&'a str, u16) {
    let width = usize::from(width.max(1));
    let mut cursor_col: usize = before_cursor.chars().filter_map(|c| c.width()).sum();
    let mut start = 0;
    for (offset, ch) in text.char_indices() {
        if cursor_col < width || offset >= before_cursor.len() {
            break;
        }
        cursor_col -= ch.width().unwrap_or(0);
        start = offset + ch.len_utf8();
    }
    (&text[start..], cursor_col.min(width - 1) as u16)
}

fn render_results(
    snapshot: &StoreSnapshot,
    settings: &PopupSettings,
    frame: &mut Frame,
    area: Rect,
    measurer: &dyn TextMeasurer,
) {
    let theme = settings.theme;
    let normal = Style::default().fg(theme.result_fg).bg(theme.result_bg);
    let highlighted = Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg);

    let mut stack = ModifierStack::new();
    for (row, (index, record)) in snapshot.visible().enumerate() {
        let Ok(offset) = u16::try_from(row) else {
            break;
        };
        if offset >= area.height {
            break;
        }
        let row_area = Rect::new(area.x, area.y + offset, area.width, 1);
        let style = if record.is_title() {
            normal.add_modifier(Modifier::BOLD)
        } else if index == snapshot.selection.highlight {
            highlighted
        } else {
            normal
        };

        let inner = pad_horizontally(row_area, settings.horiz_padding);
        let line = layout_row(record.text, u32::from(inner.width), &mut stack, measurer);
        frame.render_widget(Paragraph::new("").style(style), row_area);
        frame.render_widget(Paragraph::new(line).style(style), inner);
    }
}

fn pad_horizontally(area: Rect, padding: u16) -> Rect {
    let padding = padding.min(area.width / 2);
    Rect::new(
        area.x + padding,
        area.y,
        area.width - padding * 2,
        area.height,
    )
}

fn run_style(modifiers: &Modifiers) -> Style {
    if modifiers.is_bold() {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn image_placeholder(width: u32) -> Span<'static> {
    Span::styled(
        IMAGE_CELL.repeat(width as usize),
        Style::default().add_modifier(Modifier::DIM),
    )
}

/// Lays out a result row. The row ends at a line break, a rule or the first
/// run that does not fit. `stack` is cleared first; regions never leak from
/// one row into the next.
pub fn layout_row(
    text: &str,
    budget: u32,
    stack: &mut ModifierStack,
    measurer: &dyn TextMeasurer,
) -> Line<'static> {
    stack.reset();
    let mut spans = Vec::new();
    let mut used = 0u32;
    let mut rest = text;

    loop {
        let remaining = budget.saturating_sub(used);
        let Some(step) = markup::next_directive(rest, remaining, stack, measurer) else {
            break;
        };
        rest = &rest[step.consumed..];
        let directive = step.directive;
        if directive.is_exhausted() {
            break;
        }

        match &directive {
            DrawDirective::Text {
                content,
                modifiers,
                width,
                complete,
            } => {
                let pad = directive.center_offset(budget, remaining);
                if pad > 0 {
                    spans.push(Span::raw(" ".repeat(pad as usize)));
                }
                spans.push(Span::styled(content.clone(), run_style(modifiers)));
                used += pad + width;
                if !complete {
                    break;
                }
            }
            DrawDirective::Image { path } => {
                let (width, _) = images::resolve_image(path, (remaining, 1), false, measurer);
                if width > 0 {
                    spans.push(image_placeholder(width));
                    used += width;
                }
            }
            DrawDirective::HorizontalRule => {
                spans.push(Span::raw(RULE.repeat(remaining as usize)));
                break;
            }
            DrawDirective::LineBreak => break,
        }
    }
    Line::from(spans)
}

/// Lays out a description into at most `max_lines` lines of `width` columns.
///
/// Unlike a row, the panel wraps: a run that does not fit continues on the
/// next line, and open regions carry over.
pub fn layout_panel(
    text: &str,
    width: u32,
    max_lines: usize,
    measurer: &dyn TextMeasurer,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0u32;
    let mut stack = ModifierStack::new();
    let mut rest = text;

    let flush = |lines: &mut Vec<Line<'static>>, current: &mut Vec<Span<'static>>, used: &mut u32| {
        lines.push(Line::from(std::mem::take(current)));
        *used = 0;
    };

    while lines.len() < max_lines {
        let remaining = width.saturating_sub(used);
        let Some(step) = markup::next_directive(rest, remaining, &mut stack, measurer) else {
            break;
        };
        rest = &rest[step.consumed..];
        let directive = step.directive;

        if directive.is_exhausted() {
            if used == 0 {
                // Not even one character fits on an empty line.
                break;
            }
            flush(&mut lines, &mut current, &mut used);
            continue;
        }

        match &directive {
            DrawDirective::Text {
                content,
                modifiers,
                width: run_width,
                complete,
            } => {
                let pad = directive.center_offset(width, remaining);
                if pad > 0 {
                    current.push(Span::raw(" ".repeat(pad as usize)));
                }
                current.push(Span::styled(content.clone(), run_style(modifiers)));
                used += pad + run_width;
                if !complete {
                    flush(&mut lines, &mut current, &mut used);
                }
            }
            DrawDirective::LineBreak => flush(&mut lines, &mut current, &mut used),
            DrawDirective::HorizontalRule => {
                if used > 0 {
                    flush(&mut lines, &mut current, &mut used);
                }
                lines.push(Line::from(RULE.repeat(width as usize)));
            }
            DrawDirective::Image { path } => {
                if used > 0 {
                    flush(&mut lines, &mut current, &mut used);
                }
                let rows_left = max_lines.saturating_sub(lines.len()) as u32;
                let (w, h) = images::resolve_image(path, (width, rows_left), false, measurer);
                if w > 0 {
                    for _ in 0..h {
                        lines.push(Line::from(image_placeholder(w)));
                    }
                }
            }
        }
    }

    if !current.is_empty() {
        flush(&mut lines, &mut current, &mut used);
    }
    lines.truncate(max_lines);
    lines
}
