//! Core types for image data and window geometry.

use crate::error::{DecodingError, Error, Result};
use imgref::{ImgRef, ImgVec};
use rgb::RGB8;
use whereat::*;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A position on a drawing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    /// Horizontal offset.
    pub x: i32,
    /// Vertical offset.
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangular region of a drawing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner.
    #[must_use]
    pub const fn origin(self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Dimensions of the rectangle.
    #[must_use]
    pub const fn size(self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A fully decoded RGB image.
///
/// Created at most once per session and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: ImgVec<RGB8>,
}

impl DecodedImage {
    /// Wrap an already decoded image.
    pub fn new(pixels: ImgVec<RGB8>) -> Self {
        Self { pixels }
    }

    /// Build an image from packed RGB bytes (`width * height * 3`).
    ///
    /// Fails when the buffer length does not match the dimensions, so a
    /// misbehaving codec can never publish a partially populated image.
    pub fn from_rgb_bytes(bytes: &[u8], width: u32, height: u32) -> Result<Self> {
        let size = Size::new(width, height);
        if size.is_empty() {
            return Err(at!(Error::InvalidInput(format!(
                "empty image dimensions {}x{}",
                width, height
            ))));
        }
        let expected = size.area() * 3;
        if bytes.len() != expected {
            return Err(at!(Error::InvalidInput(format!(
                "pixel buffer holds {} bytes, {}x{} RGB needs {}",
                bytes.len(),
                width,
                height,
                expected
            ))));
        }

        let buf: Vec<RGB8> = bytes
            .chunks_exact(3)
            .map(|c| RGB8::new(c[0], c[1], c[2]))
            .collect();
        Ok(Self::new(ImgVec::new(buf, width as usize, height as usize)))
    }

    /// A single-color image, handy for stubs and placeholders.
    pub fn solid(width: u32, height: u32, color: RGB8) -> Self {
        let buf = vec![color; width as usize * height as usize];
        Self::new(ImgVec::new(buf, width as usize, height as usize))
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width() as u32
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height() as u32
    }

    /// Image dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Borrow the pixel grid.
    pub fn as_img(&self) -> ImgRef<'_, RGB8> {
        self.pixels.as_ref()
    }

    /// Copy the pixels out as an owned snapshot.
    pub fn snapshot(&self) -> PixelSnapshot {
        PixelSnapshot::from_img(self.as_img())
    }
}

/// An owned copy of decoded pixels, detached from the session.
///
/// Export routines work on this copy so they never touch the live image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSnapshot {
    /// Packed RGB bytes, row-major, no padding.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSnapshot {
    /// Copy a pixel grid into packed RGB bytes, honoring its stride.
    pub fn from_img(img: ImgRef<'_, RGB8>) -> Self {
        let mut pixels = Vec::with_capacity(img.width() * img.height() * 3);
        for px in img.pixels() {
            pixels.extend_from_slice(&[px.r, px.g, px.b]);
        }
        Self {
            pixels,
            width: img.width() as u32,
            height: img.height() as u32,
        }
    }

    /// Snapshot dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Iterate over rows of packed RGB bytes.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks_exact((self.width as usize * 3).max(1))
    }
}

/// Header information about a WebP bitstream, read without decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Whether the image has an alpha channel.
    pub has_alpha: bool,
    /// Whether the image is animated.
    pub has_animation: bool,
}

impl ImageInfo {
    /// Get info from WebP data without decoding.
    pub fn from_webp(data: &[u8]) -> Result<Self> {
        let mut width: i32 = 0;
        let mut height: i32 = 0;

        let result =
            unsafe { libwebp_sys::WebPGetInfo(data.as_ptr(), data.len(), &mut width, &mut height) };

        if result == 0 {
            return Err(at!(Error::InvalidWebP));
        }

        let mut features = core::mem::MaybeUninit::<libwebp_sys::WebPBitstreamFeatures>::uninit();
        let status = unsafe {
            libwebp_sys::WebPGetFeatures(data.as_ptr(), data.len(), features.as_mut_ptr())
        };

        if status != libwebp_sys::VP8StatusCode::VP8_STATUS_OK {
            return Err(at!(Error::DecodeFailed(DecodingError::from(status as i32))));
        }

        // SAFETY: WebPGetFeatures filled the struct when it returned OK
        let features = unsafe { features.assume_init() };

        Ok(ImageInfo {
            width: width as u32,
            height: height as u32,
            has_alpha: features.has_alpha != 0,
            has_animation: features.has_animation != 0,
        })
    }

    /// Image dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
