//! Terminal-cell measurer for the markup engine.

use std::path::Path;

use lighthouse_core::images::{self, AssetError};
use lighthouse_core::markup::TextMeasurer;
use unicode_width::UnicodeWidthStr;

/// Cell size assumed when the terminal does not report pixel dimensions.
pub const FALLBACK_CELL_PX: (u32, u32) = (8, 16);

/// Measures text in columns and images in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMeasurer {
    cell_px: (u32, u32),
}

impl CellMeasurer {
    pub fn new(cell_px: (u32, u32)) -> Self {
        Self {
            cell_px: (cell_px.0.max(1), cell_px.1.max(1)),
        }
    }

    /// Reads the pixel size of one cell from the terminal.
    pub fn detect() -> Self {
        Self::new(cell_px_from_terminal().unwrap_or(FALLBACK_CELL_PX))
    }

    pub fn cell_px(&self) -> (u32, u32) {
        self.cell_px
    }

    /// Converts a pixel size to whole cells, rounding up.
    pub fn px_to_cells(&self, (w, h): (u32, u32)) -> (u32, u32) {
        (w.div_ceil(self.cell_px.0), h.div_ceil(self.cell_px.1))
    }
}

impl Default for CellMeasurer {
    fn default() -> Self {
        Self::new(FALLBACK_CELL_PX)
    }
}

impl TextMeasurer for CellMeasurer {
    fn measure_width(&self, text: &str) -> u32 {
        text.width() as u32
    }

    fn image_intrinsic_size(&self, path: &Path) -> Result<(u32, u32), AssetError> {
        images::pixel_dimensions(path).map(|px| self.px_to_cells(px))
    }
}

fn cell_px_from_terminal() -> Option<(u32, u32)> {
    let ws = crossterm::terminal::window_size().ok()?;
    if ws.width == 0 || ws.height == 0 || ws.columns == 0 || ws.rows == 0 {
        return None;
    }
    let cell_w = u32::from((ws.width / ws.columns).max(1));
    let cell_h = u32::from((ws.height / ws.rows).max(1));
    Some((cell_w, cell_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_chars_take_two_columns() {
        let m = CellMeasurer::default();
        assert_eq!(m.measure_width("abc"), 3);
        assert_eq!(m.measure_width("日本"), 4);
        assert_eq!(m.measure_width(""), 0);
    }

    #[test]
    fn pixels_round_up_to_cells() {
        let m = CellMeasurer::new((8, 16));
        assert_eq!(m.px_to_cells((64, 32)), (8, 2));
        assert_eq!(m.px_to_cells((65, 33)), (9, 3));
        assert_eq!(m.px_to_cells((0, 0)), (0, 0));
    }

    #[test]
    fn zero_cell_size_is_clamped() {
        assert_eq!(CellMeasurer::new((0, 0)).cell_px(), (1, 1));
    }

    #[test]
    fn missing_image_is_an_error() {
        let m = CellMeasurer::default();
        assert!(m.image_intrinsic_size(Path::new("/no/such/icon.png")).is_err());
    }
}
