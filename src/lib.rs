//! # webpview
//!
//! Core of a browser-embedded WebP image viewer.
//!
//! A host delivers the encoded image through a sequence of stream callbacks.
//! This crate provides:
//! - [`StreamingImageSession`]: buffers the stream, decodes it exactly once,
//!   and paints a viewport-sized copy on demand while the three host contexts
//!   (data, paint, menu) run concurrently
//! - [`WebpCodec`]: libwebp-backed [`Codec`]
//! - [`Framebuffer`]: in-memory [`Surface`]
//! - [`PluginInstance`]: instance arguments, window geometry, event dispatch
//!   and the "Save as PNG" / "Save as WebP" / "About" menu
//!
//! ## Quick Start
//!
//! ```rust
//! use webpview::{Framebuffer, PaintOutcome, Rect, Size, StreamEnd, StreamId, StreamingImageSession, WebpCodec};
//!
//! let session = StreamingImageSession::new(WebpCodec::new());
//! let id = StreamId(1);
//!
//! assert!(session.open_stream(id, "image/webp", None).is_accepted());
//! session.append_bytes(id, b"not really a webp");
//! session.complete_stream(id, StreamEnd::Done);
//!
//! // Garbage never produces an image; painting stays a no-op
//! let mut fb = Framebuffer::new(16, 16);
//! let outcome = session.request_paint(&mut fb, Rect::new(0, 0, 16, 16), Size::new(16, 16));
//! assert_eq!(outcome, PaintOutcome::NoImage);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

mod codec;
mod config;
mod error;
mod export;
mod instance;
mod session;
mod surface;
mod types;

// Re-exports
pub use codec::{Codec, WebpCodec};
pub use config::{DecodeLimits, ScaleFilter, ViewerConfig, WEBP_MAX_DIMENSION, WEBP_MIME_TYPE};
pub use error::{DecodingError, Error, Result};
pub use export::{suggested_file_name, UNNAMED};
pub use instance::{
    EmbedMode, EventResponse, HostEvent, InstanceArgs, MenuAction, MenuOutcome, PluginInstance,
    SaveRequest, Window, CONTEXT_MENU_BUTTON,
};
pub use session::{
    OpenOutcome, PaintOutcome, RepaintNotifier, SessionState, StreamEnd, StreamId,
    StreamingImageSession,
};
pub use surface::{Framebuffer, Surface};
pub use types::{DecodedImage, ImageInfo, PixelSnapshot, Point, Rect, Size};

#[cfg(feature = "png")]
pub use export::encode_png;

pub use enough::{Stop, StopReason, Unstoppable};
pub use whereat::At;

whereat::define_at_crate_info!();

/// Plugin name reported to the host.
pub const PLUGIN_NAME: &str = "webp-npapi";

/// Plugin description reported to the host.
pub const PLUGIN_DESCRIPTION: &str = " (Image viewer for WebP)";

/// Plugin version reported to the host.
pub const PLUGIN_VERSION: &str = "1.0.0.0";

/// MIME description: `type:extensions:description`.
pub const MIME_DESCRIPTION: &str = "image/webp:webp:WebP image viewer";

/// Project homepage shown in the about text.
pub const HOMEPAGE: &str = "http://code.google.com/p/webp-npapi-linux/";

/// Text for the "About" menu entry.
pub fn about_text() -> String {
    format!(
        "{}{}\nHomepage: {}\nAuthors: Filip Reesalu, Johan Gustafsson, Jonas Bornold",
        PLUGIN_NAME, PLUGIN_DESCRIPTION, HOMEPAGE
    )
}

/// Version of the linked libwebp decoder.
pub fn libwebp_version() -> (u32, u32, u32) {
    let v = unsafe { libwebp_sys::WebPGetDecoderVersion() } as u32;
    ((v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
}
