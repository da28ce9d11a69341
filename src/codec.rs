//! Decoding collaborator: turns the complete encoded stream into pixels.

use crate::config::DecodeLimits;
use crate::error::{DecodingError, Error, Result};
use crate::types::{DecodedImage, ImageInfo};
use whereat::*;

/// A stateless, decode-only image codec.
///
/// The session calls [`decode_with_limits`](Codec::decode_with_limits) at
/// most once, with the full accumulated stream and its configured limits,
/// after the host reported normal completion.
pub trait Codec: Send + Sync {
    /// Decode a complete encoded image into RGB pixels.
    fn decode(&self, data: &[u8]) -> Result<DecodedImage>;

    /// Decode, refusing images larger than `limits` allows.
    ///
    /// The default checks the decoded dimensions afterwards. Codecs that can
    /// read the dimensions up front should override this to fail before
    /// allocating.
    fn decode_with_limits(&self, data: &[u8], limits: &DecodeLimits) -> Result<DecodedImage> {
        let image = self.decode(data)?;
        check_dimensions(limits, image.width(), image.height())?;
        Ok(image)
    }
}

impl<C: Codec + ?Sized> Codec for &C {
    fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        (**self).decode(data)
    }

    fn decode_with_limits(&self, data: &[u8], limits: &DecodeLimits) -> Result<DecodedImage> {
        (**self).decode_with_limits(data, limits)
    }
}

impl<C: Codec + ?Sized> Codec for Box<C> {
    fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        (**self).decode(data)
    }

    fn decode_with_limits(&self, data: &[u8], limits: &DecodeLimits) -> Result<DecodedImage> {
        (**self).decode_with_limits(data, limits)
    }
}

fn check_dimensions(limits: &DecodeLimits, width: u32, height: u32) -> Result<()> {
    if limits.allows(width, height) {
        return Ok(());
    }
    Err(at!(Error::LimitExceeded(format!(
        "{}x{} exceeds {}x{}",
        width, height, limits.max_width, limits.max_height
    ))))
}

/// libwebp-backed codec producing RGB output.
///
/// # Example
///
/// ```rust,no_run
/// use webpview::{Codec, WebpCodec};
///
/// let webp_data: &[u8] = &[0u8; 100]; // placeholder
/// let image = WebpCodec::new().decode(webp_data)?;
/// println!("{}x{}", image.width(), image.height());
/// # Ok::<(), webpview::At<webpview::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec {
    limits: DecodeLimits,
}

impl WebpCodec {
    /// Create a codec with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec that refuses images beyond `limits`.
    pub fn with_limits(limits: DecodeLimits) -> Self {
        Self { limits }
    }
}

impl Codec for WebpCodec {
    fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        self.decode_within(data, &self.limits)
    }

    fn decode_with_limits(&self, data: &[u8], limits: &DecodeLimits) -> Result<DecodedImage> {
        self.decode_within(data, &self.limits.intersect(limits))
    }
}

impl WebpCodec {
    fn decode_within(&self, data: &[u8], limits: &DecodeLimits) -> Result<DecodedImage> {
        // Probe the header first so oversized images fail before allocating
        let info = ImageInfo::from_webp(data)?;
        check_dimensions(limits, info.width, info.height)?;

        let mut width: i32 = 0;
        let mut height: i32 = 0;

        let ptr = unsafe {
            libwebp_sys::WebPDecodeRGB(data.as_ptr(), data.len(), &mut width, &mut height)
        };

        if ptr.is_null() {
            return Err(at!(Error::DecodeFailed(DecodingError::BitstreamError)));
        }

        let size = (width as usize) * (height as usize) * 3;
        unsafe {
            let slice = core::slice::from_raw_parts(ptr, size);
            let image = DecodedImage::from_rgb_bytes(slice, width as u32, height as u32);
            libwebp_sys::WebPFree(ptr as *mut _);
            image
        }
    }
}
