//! Drawing collaborator: resampling and blitting onto a target.

use crate::config::ScaleFilter;
use crate::types::{Point, Rect, Size};
use image::{ImageBuffer, Rgb, RgbImage};
use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

/// An opaque drawing target.
///
/// The session calls [`scale`](Surface::scale) to build its presentation
/// copy when the viewport changes, and [`blit`](Surface::blit) on every
/// successful paint.
pub trait Surface {
    /// Produce a resampled copy of `image` with dimensions `size`.
    fn scale(&mut self, image: ImgRef<'_, RGB8>, size: Size) -> ImgVec<RGB8>;

    /// Draw `image` with its top-left corner at `offset`, clipped to `target`.
    fn blit(&mut self, image: ImgRef<'_, RGB8>, target: Rect, offset: Point);
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn scale(&mut self, image: ImgRef<'_, RGB8>, size: Size) -> ImgVec<RGB8> {
        (**self).scale(image, size)
    }

    fn blit(&mut self, image: ImgRef<'_, RGB8>, target: Rect, offset: Point) {
        (**self).blit(image, target, offset)
    }
}

/// In-memory RGB drawing target.
///
/// Useful for headless hosts that hand the finished frame to their own
/// compositor, and for tests.
///
/// # Example
///
/// ```rust
/// use webpview::{Framebuffer, Point, Rect, Size, Surface};
/// use imgref::ImgVec;
/// use rgb::RGB8;
///
/// let mut fb = Framebuffer::new(8, 8);
/// let red = ImgVec::new(vec![RGB8::new(255, 0, 0); 4], 2, 2);
/// let big = fb.scale(red.as_ref(), Size::new(4, 4));
/// fb.blit(big.as_ref(), Rect::new(0, 0, 8, 8), Point::new(2, 2));
/// assert_eq!(fb.pixel(2, 2), Some(RGB8::new(255, 0, 0)));
/// assert_eq!(fb.pixel(0, 0), Some(RGB8::new(0, 0, 0)));
/// ```
#[derive(Debug, Clone)]
pub struct Framebuffer {
    pixels: ImgVec<RGB8>,
    filter: ScaleFilter,
}

impl Framebuffer {
    /// Create a black framebuffer.
    pub fn new(width: u32, height: u32) -> Self {
        let buf = vec![RGB8::default(); width as usize * height as usize];
        Self {
            pixels: ImgVec::new(buf, width as usize, height as usize),
            filter: ScaleFilter::default(),
        }
    }

    /// Use `filter` for resampling.
    #[must_use]
    pub fn with_filter(mut self, filter: ScaleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Framebuffer dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.pixels.width() as u32, self.pixels.height() as u32)
    }

    /// Read one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<RGB8> {
        let (x, y) = (x as usize, y as usize);
        if x >= self.pixels.width() || y >= self.pixels.height() {
            return None;
        }
        Some(self.pixels.buf()[y * self.pixels.stride() + x])
    }

    /// Fill the whole framebuffer with one color.
    pub fn clear(&mut self, color: RGB8) {
        self.pixels.buf_mut().fill(color);
    }

    /// Borrow the framebuffer contents.
    pub fn as_img(&self) -> ImgRef<'_, RGB8> {
        self.pixels.as_ref()
    }
}

fn to_rgb_image(image: ImgRef<'_, RGB8>) -> RgbImage {
    let stride = image.stride();
    let buf = image.buf();
    ImageBuffer::from_fn(image.width() as u32, image.height() as u32, |x, y| {
        let px = buf[y as usize * stride + x as usize];
        Rgb([px.r, px.g, px.b])
    })
}

impl Surface for Framebuffer {
    fn scale(&mut self, image: ImgRef<'_, RGB8>, size: Size) -> ImgVec<RGB8> {
        let source = to_rgb_image(image);
        let scaled =
            image::imageops::resize(&source, size.width, size.height, self.filter.to_image());
        let buf: Vec<RGB8> = scaled
            .pixels()
            .map(|p| RGB8::new(p[0], p[1], p[2]))
            .collect();
        ImgVec::new(buf, size.width as usize, size.height as usize)
    }

    fn blit(&mut self, image: ImgRef<'_, RGB8>, target: Rect, offset: Point) {
        let fb_w = self.pixels.width() as i64;
        let fb_h = self.pixels.height() as i64;

        // Intersection of the target region and the framebuffer
        let left = (target.x as i64).max(0);
        let top = (target.y as i64).max(0);
        let right = (target.x as i64 + target.width as i64).min(fb_w);
        let bottom = (target.y as i64 + target.height as i64).min(fb_h);
        if left >= right || top >= bottom {
            return;
        }

        let src_stride = image.stride();
        let src = image.buf();
        let dst_stride = self.pixels.stride();
        let dst = self.pixels.buf_mut();

        for sy in 0..image.height() {
            let dy = offset.y as i64 + sy as i64;
            if dy < top || dy >= bottom {
                continue;
            }
            for sx in 0..image.width() {
                let dx = offset.x as i64 + sx as i64;
                if dx < left || dx >= right {
                    continue;
                }
                dst[dy as usize * dst_stride + dx as usize] = src[sy * src_stride + sx];
            }
        }
    }
}
