//! Export helpers for the context menu: file names and re-encoding.

#[cfg(feature = "png")]
use crate::error::{Error, Result};
#[cfg(feature = "png")]
use crate::types::PixelSnapshot;
#[cfg(feature = "png")]
use enough::Stop;
#[cfg(feature = "png")]
use whereat::*;

/// File name offered when the instance has no usable `src`.
pub const UNNAMED: &str = "Unnamed";

/// Suggest a file name for saving the image.
///
/// Uses the last path segment of `src` (query and fragment dropped). With
/// `extension`, the segment's own suffix is replaced; without, the name is
/// kept as is.
///
/// ```rust
/// use webpview::suggested_file_name;
///
/// let src = Some("http://example.com/img/cat.webp?x=1");
/// assert_eq!(suggested_file_name(src, Some("png")), "cat.png");
/// assert_eq!(suggested_file_name(src, None), "cat.webp");
/// assert_eq!(suggested_file_name(None, Some("png")), "Unnamed.png");
/// ```
pub fn suggested_file_name(src: Option<&str>, extension: Option<&str>) -> String {
    let name = src
        .map(|s| s.split(['?', '#']).next().unwrap_or(""))
        .and_then(|s| s.rsplit('/').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNNAMED);

    match extension {
        Some(ext) => {
            let stem = match name.rfind('.') {
                Some(pos) if pos > 0 => &name[..pos],
                _ => name,
            };
            format!("{}.{}", stem, ext)
        }
        None => name.to_owned(),
    }
}

/// Encode a pixel snapshot as PNG.
///
/// `stop` is checked before the encoder starts and before the bytes are
/// handed back, so an export abandoned by the user returns
/// [`Error::Stopped`].
#[cfg(feature = "png")]
pub fn encode_png(snapshot: &PixelSnapshot, stop: &dyn Stop) -> Result<Vec<u8>> {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    let expected = snapshot.size().area() * 3;
    if snapshot.size().is_empty() || snapshot.pixels.len() != expected {
        return Err(at!(Error::InvalidInput(format!(
            "snapshot {}x{} holds {} bytes",
            snapshot.width,
            snapshot.height,
            snapshot.pixels.len()
        ))));
    }

    stop.check().map_err(|reason| at!(Error::from(reason)))?;

    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            &snapshot.pixels,
            snapshot.width,
            snapshot.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| at!(Error::EncodeFailed(e.to_string())))?;

    stop.check().map_err(|reason| at!(Error::from(reason)))?;
    log::debug!(
        "encoded {}x{} PNG, {} bytes",
        snapshot.width,
        snapshot.height,
        out.len()
    );
    Ok(out)
}
