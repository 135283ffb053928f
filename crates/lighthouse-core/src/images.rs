//! Image sizing for `%I` directives.
//!
//! Sizes are in whatever unit the [`TextMeasurer`] reports: pixels for a
//! graphical surface, cells for the terminal.

use std::path::{Path, PathBuf};

use crate::markup::TextMeasurer;

/// An image path could not be turned into a size.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("could not read image {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },
}

/// Scales `intrinsic` to fit inside `bounds`, keeping the aspect ratio.
///
/// Images are only ever shrunk unless `allow_upscale` is set. A zero-sized
/// image or box yields `(0, 0)`.
pub fn fit_image(intrinsic: (u32, u32), bounds: (u32, u32), allow_upscale: bool) -> (u32, u32) {
    let (iw, ih) = (u64::from(intrinsic.0), u64::from(intrinsic.1));
    let (bw, bh) = (u64::from(bounds.0), u64::from(bounds.1));
    if iw == 0 || ih == 0 || bw == 0 || bh == 0 {
        return (0, 0);
    }
    if !allow_upscale && iw <= bw && ih <= bh {
        return intrinsic;
    }

    // Width-limited when bw/iw <= bh/ih.
    let (w, h) = if bw * ih <= bh * iw {
        (bw, ih * bw / iw)
    } else {
        (iw * bh / ih, bh)
    };
    (w as u32, h as u32)
}

/// Measures the image at `path` and fits it inside `bounds`.
///
/// Missing or unreadable images resolve to `(0, 0)` so layout continues
/// without them.
pub fn resolve_image(
    path: &str,
    bounds: (u32, u32),
    allow_upscale: bool,
    measurer: &dyn TextMeasurer,
) -> (u32, u32) {
    let resolved = expand_home(path);
    match measurer.image_intrinsic_size(&resolved) {
        Ok(intrinsic) => fit_image(intrinsic, bounds, allow_upscale),
        Err(err) => {
            tracing::warn!(%err, "skipping image");
            (0, 0)
        }
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home_relative = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (home_relative, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Reads the pixel dimensions of an image file without decoding it fully.
///
/// # Errors
/// Returns [`AssetError`] if the file is missing or not a readable image.
pub fn pixel_dimensions(path: &Path) -> Result<(u32, u32), AssetError> {
    if !path.exists() {
        return Err(AssetError::NotFound(path.to_path_buf()));
    }
    image::image_dimensions(path).map_err(|e| AssetError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
