//! Frame export to floating point image files.

use std::path::Path;

use image::{ImageBuffer, ImageFormat, Rgb, Rgba};

use super::display::Frame;
use crate::util::{Error, Result};

/// Write `frame` to `path`; the format follows the extension.
///
/// `.exr` keeps all four channels, `.hdr` drops alpha.
pub fn save_frame(frame: &Frame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "exr" => {
            let img: ImageBuffer<Rgba<f32>, Vec<f32>> =
                ImageBuffer::from_raw(frame.width, frame.height, frame.rgba.clone())
                    .ok_or_else(|| Error::other("frame data does not match its size"))?;
            img.save_with_format(path, ImageFormat::OpenExr)?;
        }
        "hdr" => {
            let img = ImageBuffer::from_fn(frame.width, frame.height, |x, y| {
                let [r, g, b, _] = frame.pixel(x, y);
                Rgb([r, g, b])
            });
            img.save_with_format(path, ImageFormat::Hdr)?;
        }
        _ => return Err(Error::UnsupportedFormat(path.display().to_string())),
    }

    tracing::info!(path = %path.display(), width = frame.width, height = frame.height, "frame saved");
    Ok(())
}
