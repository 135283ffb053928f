//! Popup state owned by the event loop.

use std::str::FromStr;

use lighthouse_core::config::{ColorsConfig, Config};
use lighthouse_core::store::SharedResults;
use ratatui::style::Color;

use crate::query::QueryBuffer;

/// Resolved popup colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub query_fg: Color,
    pub query_bg: Color,
    pub result_fg: Color,
    pub result_bg: Color,
    pub highlight_fg: Color,
    pub highlight_bg: Color,
}

impl Theme {
    /// Parses configured colors; unparseable values fall back to the default.
    pub fn from_config(colors: &ColorsConfig) -> Self {
        let defaults = ColorsConfig::default();
        let pick = |name: &str, value: &str, fallback: &str| {
            Color::from_str(value).unwrap_or_else(|_| {
                tracing::warn!(name, value, "invalid color, using default");
                Color::from_str(fallback).unwrap_or(Color::Reset)
            })
        };
        Self {
            query_fg: pick("query_fg", &colors.query_fg, &defaults.query_fg),
            query_bg: pick("query_bg", &colors.query_bg, &defaults.query_bg),
            result_fg: pick("result_fg", &colors.result_fg, &defaults.result_fg),
            result_bg: pick("result_bg", &colors.result_bg, &defaults.result_bg),
            highlight_fg: pick("highlight_fg", &colors.highlight_fg, &defaults.highlight_fg),
            highlight_bg: pick("highlight_bg", &colors.highlight_bg, &defaults.highlight_bg),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_config(&ColorsConfig::default())
    }
}

/// Geometry and behavior knobs taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupSettings {
    pub width: u16,
    pub max_results: u16,
    pub desc_width: u16,
    pub x_percent: u16,
    pub y_percent: u16,
    pub horiz_padding: u16,
    pub backspace_exit: bool,
    pub theme: Theme,
}

impl PopupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            width: config.width.max(1),
            max_results: config.max_results,
            desc_width: config.desc_width,
            x_percent: config.x.min(100),
            y_percent: config.y.min(100),
            horiz_padding: config.horiz_padding,
            backspace_exit: config.backspace_exit,
            theme: Theme::from_config(&config.colors),
        }
    }

    /// Result rows that fit on a screen `screen_height` rows tall.
    pub fn visible_rows(&self, screen_height: u16) -> usize {
        usize::from(self.max_results.min(screen_height.saturating_sub(1)))
    }
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Whether the child is still answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildStatus {
    Running,
    Stopped { reason: String },
}

/// Everything the reducer mutates and the renderer reads.
pub struct AppState {
    pub query: QueryBuffer,
    pub results: SharedResults,
    pub settings: PopupSettings,
    pub child: ChildStatus,
    /// Action chosen with Enter, printed after the terminal is restored.
    pub committed: Option<String>,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(settings: PopupSettings, results: SharedResults) -> Self {
        Self {
            query: QueryBuffer::default(),
            results,
            settings,
            child: ChildStatus::Running,
            committed: None,
            should_quit: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_accepts_hex_and_names() {
        let colors = ColorsConfig {
            query_fg: "#102030".into(),
            highlight_bg: "lightblue".into(),
            ..ColorsConfig::default()
        };
        let theme = Theme::from_config(&colors);
        assert_eq!(theme.query_fg, Color::Rgb(0x10, 0x20, 0x30));
        assert_eq!(theme.highlight_bg, Color::LightBlue);
    }

    #[test]
    fn invalid_color_falls_back_to_default() {
        let colors = ColorsConfig {
            result_bg: "not-a-color".into(),
            ..ColorsConfig::default()
        };
        let theme = Theme::from_config(&colors);
        assert_eq!(theme.result_bg, Theme::default().result_bg);
    }

    #[test]
    fn visible_rows_leave_room_for_query() {
        let settings = PopupSettings::default();
        assert_eq!(settings.visible_rows(50), 10);
        assert_eq!(settings.visible_rows(6), 5);
        assert_eq!(settings.visible_rows(0), 0);
    }
}
