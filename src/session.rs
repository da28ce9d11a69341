//! Streaming image session: accumulate, decode once, paint on demand.
//!
//! Three host contexts drive a session concurrently: data delivery
//! (`open_stream`, `append_bytes`, `complete_stream`), painting
//! (`request_paint`) and menu actions (`export_decoded`,
//! `export_raw_stream`). Two independent locks guard the two mutable
//! resources:
//!
//! - the stream lock owns the byte buffer and the lifecycle state;
//! - the image lock owns the decoded image and its scaled presentation.
//!
//! The lock order is always stream, then image. Painting only ever
//! try-locks the image, so it can never stall behind the decode.

use crate::codec::Codec;
use crate::config::ViewerConfig;
use crate::surface::Surface;
use crate::types::{DecodedImage, PixelSnapshot, Rect, Size};
use imgref::ImgVec;
use rgb::RGB8;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Host-assigned handle identifying one byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Lifecycle state of a session.
///
/// ```text
/// Empty -> StreamOpen -> PendingDecode -> { Decoded | DecodeFailed }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream accepted (yet, or ever after a rejection).
    Empty,
    /// Accepting bytes.
    StreamOpen,
    /// Stream finished, decode in progress.
    PendingDecode,
    /// Image decoded and published. Terminal.
    Decoded,
    /// Stream aborted or decode failed. Terminal.
    DecodeFailed,
}

/// Result of an `open_stream` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The stream is now the session's only source.
    Accepted,
    /// Wrong media type, a second stream, or the stream lock was unavailable.
    Rejected,
}

impl OpenOutcome {
    /// Whether the stream was accepted.
    pub fn is_accepted(self) -> bool {
        self == OpenOutcome::Accepted
    }
}

/// Why the host ended a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// All bytes delivered.
    Done,
    /// Transfer failed.
    NetworkError,
    /// The user navigated away or stopped the load.
    UserBreak,
}

/// What a paint request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOutcome {
    /// The image lock was held elsewhere; frame skipped.
    Busy,
    /// Nothing decoded yet; nothing drawn.
    NoImage,
    /// Zero-sized viewport; nothing drawn.
    EmptyViewport,
    /// Presentation blitted. `rescaled` is true when the cache was rebuilt.
    Drawn {
        /// Whether a fresh scale computation happened for this frame.
        rescaled: bool,
    },
}

/// Host hook raised once an image has been published.
///
/// Called after both locks are released, so an implementation may paint
/// synchronously from inside the callback.
pub trait RepaintNotifier: Send + Sync {
    /// The session's content changed; the host should repaint.
    fn content_changed(&self);
}

impl<F: Fn() + Send + Sync> RepaintNotifier for F {
    fn content_changed(&self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    Rejected,
    Open,
    PendingDecode,
    Decoded,
    Failed,
}

impl Phase {
    fn public(self) -> SessionState {
        match self {
            Phase::Empty | Phase::Rejected => SessionState::Empty,
            Phase::Open => SessionState::StreamOpen,
            Phase::PendingDecode => SessionState::PendingDecode,
            Phase::Decoded => SessionState::Decoded,
            Phase::Failed => SessionState::DecodeFailed,
        }
    }
}

struct StreamState {
    phase: Phase,
    id: Option<StreamId>,
    declared_size: Option<u64>,
    completed: bool,
    buffer: Vec<u8>,
}

impl StreamState {
    fn accepts(&self, id: StreamId) -> bool {
        self.phase == Phase::Open && self.id == Some(id)
    }
}

struct Presentation {
    size: Size,
    pixels: ImgVec<RGB8>,
}

#[derive(Default)]
struct ImageState {
    decoded: Option<DecodedImage>,
    presentation: Option<Presentation>,
}

/// One plugin instance's handling of a single image stream.
///
/// # Example
///
/// ```rust,no_run
/// use webpview::{Framebuffer, Rect, Size, StreamEnd, StreamId, StreamingImageSession, WebpCodec};
///
/// let webp_data: &[u8] = &[0u8; 100]; // placeholder
/// let session = StreamingImageSession::new(WebpCodec::new());
/// let id = StreamId(1);
///
/// assert!(session.open_stream(id, "image/webp", Some(webp_data.len() as u64)).is_accepted());
/// for chunk in webp_data.chunks(16) {
///     session.append_bytes(id, chunk);
/// }
/// session.complete_stream(id, StreamEnd::Done);
///
/// let mut fb = Framebuffer::new(320, 240);
/// session.request_paint(&mut fb, Rect::new(0, 0, 320, 240), Size::new(320, 240));
/// ```
pub struct StreamingImageSession<C> {
    codec: C,
    config: ViewerConfig,
    notifier: Option<Box<dyn RepaintNotifier>>,
    stream: Mutex<StreamState>,
    image: Mutex<ImageState>,
}

impl<C: Codec> StreamingImageSession<C> {
    /// Create a session with the default configuration.
    pub fn new(codec: C) -> Self {
        Self::with_config(codec, ViewerConfig::default())
    }

    /// Create a session with an explicit configuration.
    pub fn with_config(codec: C, config: ViewerConfig) -> Self {
        Self {
            codec,
            config,
            notifier: None,
            stream: Mutex::new(StreamState {
                phase: Phase::Empty,
                id: None,
                declared_size: None,
                completed: false,
                buffer: Vec::new(),
            }),
            image: Mutex::new(ImageState::default()),
        }
    }

    /// Register the host's repaint hook.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn RepaintNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The session configuration.
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    fn lock_stream(&self, op: &str) -> Option<MutexGuard<'_, StreamState>> {
        match self.stream.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                log::warn!("{}: failed to lock stream", op);
                None
            }
        }
    }

    fn lock_image(&self, op: &str) -> Option<MutexGuard<'_, ImageState>> {
        match self.image.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                log::warn!("{}: failed to lock image", op);
                None
            }
        }
    }

    /// Offer a new stream to the session.
    ///
    /// Accepted only for the first stream ever offered, and only if `mime`
    /// matches the configured type. Any rejection is final.
    pub fn open_stream(&self, id: StreamId, mime: &str, declared_size: Option<u64>) -> OpenOutcome {
        let Some(mut stream) = self.lock_stream("open_stream") else {
            return OpenOutcome::Rejected;
        };

        if stream.phase != Phase::Empty || !self.config.accepts_mime(mime) {
            log::debug!("ignoring stream {:?} ({})", id, mime);
            if stream.phase == Phase::Empty {
                stream.phase = Phase::Rejected;
            }
            return OpenOutcome::Rejected;
        }

        let declared_size = declared_size.filter(|&size| size > 0);
        if let Some(size) = declared_size {
            let hint = usize::try_from(size)
                .unwrap_or(usize::MAX)
                .min(self.config.limits.max_stream_bytes);
            stream.buffer.reserve(hint);
        }

        stream.phase = Phase::Open;
        stream.id = Some(id);
        stream.declared_size = declared_size;
        log::debug!("accepted stream {:?}, declared size {:?}", id, declared_size);
        OpenOutcome::Accepted
    }

    /// How many more bytes the session currently wants for `id`.
    ///
    /// Advisory only: writes beyond a declared size still succeed up to the
    /// configured stream limit.
    pub fn accepted_capacity(&self, id: StreamId) -> usize {
        let Some(stream) = self.lock_stream("accepted_capacity") else {
            return 0;
        };
        if !stream.accepts(id) {
            return 0;
        }

        let received = stream.buffer.len();
        let capacity = match stream.declared_size {
            Some(size) => usize::try_from(size)
                .unwrap_or(usize::MAX)
                .saturating_sub(received),
            None => self.config.limits.max_stream_bytes.saturating_sub(received),
        };
        log::trace!("accepting {} bytes", capacity);
        capacity
    }

    /// Append a chunk of the stream, returning how many bytes were consumed.
    ///
    /// Consumes all of `chunk` for the open stream `id`; zero otherwise.
    pub fn append_bytes(&self, id: StreamId, chunk: &[u8]) -> usize {
        let Some(mut stream) = self.lock_stream("append_bytes") else {
            return 0;
        };
        if !stream.accepts(id) {
            return 0;
        }

        let limit = self.config.limits.max_stream_bytes;
        if stream.buffer.len().saturating_add(chunk.len()) > limit {
            log::warn!(
                "stream {:?} would exceed {} bytes, dropping {} byte chunk",
                id,
                limit,
                chunk.len()
            );
            return 0;
        }

        stream.buffer.extend_from_slice(chunk);
        log::trace!("read {} bytes", chunk.len());
        chunk.len()
    }

    /// End the stream `id`.
    ///
    /// On [`StreamEnd::Done`] the codec runs exactly once over the whole
    /// buffer, bounded by the configured [`DecodeLimits`](crate::DecodeLimits).
    /// Any other reason, a codec error or a codec panic leaves the session
    /// permanently without an image.
    pub fn complete_stream(&self, id: StreamId, end: StreamEnd) {
        let published = {
            let Some(mut stream) = self.lock_stream("complete_stream") else {
                return;
            };
            if !stream.accepts(id) {
                return;
            }

            if end != StreamEnd::Done {
                log::debug!("stream {:?} ended without completing: {:?}", id, end);
                stream.phase = Phase::Failed;
                return;
            }

            stream.completed = true;
            stream.phase = Phase::PendingDecode;

            let Some(mut image) = self.lock_image("complete_stream") else {
                stream.phase = Phase::Failed;
                return;
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                self.codec
                    .decode_with_limits(&stream.buffer, &self.config.limits)
            }));
            match result {
                Ok(Ok(decoded)) => {
                    log::debug!(
                        "image decoded with size {}x{}",
                        decoded.width(),
                        decoded.height()
                    );
                    image.decoded = Some(decoded);
                    image.presentation = None;
                    stream.phase = Phase::Decoded;
                    true
                }
                Ok(Err(e)) => {
                    log::warn!("failed to decode image: {:?}", e);
                    stream.phase = Phase::Failed;
                    false
                }
                Err(_) => {
                    log::error!("codec panicked decoding stream {:?}", id);
                    stream.phase = Phase::Failed;
                    false
                }
            }
        };

        if published {
            if let Some(notifier) = &self.notifier {
                notifier.content_changed();
            }
        }
    }

    /// Paint the image into `target`, scaled to `viewport`.
    ///
    /// Best effort: if the image lock is busy the frame is skipped.
    pub fn request_paint(
        &self,
        surface: &mut dyn Surface,
        target: Rect,
        viewport: Size,
    ) -> PaintOutcome {
        let mut image = match self.image.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                log::trace!("paint skipped, image busy");
                return PaintOutcome::Busy;
            }
            Err(TryLockError::Poisoned(_)) => {
                log::warn!("request_paint: image lock poisoned");
                return PaintOutcome::Busy;
            }
        };

        let ImageState {
            decoded,
            presentation,
        } = &mut *image;

        let Some(decoded) = decoded.as_ref() else {
            return PaintOutcome::NoImage;
        };
        if viewport.is_empty() {
            return PaintOutcome::EmptyViewport;
        }

        let stale = presentation.as_ref().map_or(true, |p| p.size != viewport);
        if stale {
            log::debug!("scaling to {}x{}", viewport.width, viewport.height);
            let pixels = surface.scale(decoded.as_img(), viewport);
            *presentation = Some(Presentation {
                size: viewport,
                pixels,
            });
        }

        if let Some(presentation) = presentation.as_ref() {
            surface.blit(presentation.pixels.as_ref(), target, target.origin());
        }
        PaintOutcome::Drawn { rescaled: stale }
    }

    /// Owned copy of the decoded pixels, if any.
    pub fn export_decoded(&self) -> Option<PixelSnapshot> {
        let image = self.lock_image("export_decoded")?;
        image.decoded.as_ref().map(DecodedImage::snapshot)
    }

    /// Owned copy of the encoded stream, once it completed normally.
    pub fn export_raw_stream(&self) -> Option<Vec<u8>> {
        let stream = self.lock_stream("export_raw_stream")?;
        stream.completed.then(|| stream.buffer.clone())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        match self.stream.lock() {
            Ok(stream) => stream.phase.public(),
            // Poisoned by a panic while the stream was held
            Err(_) => SessionState::DecodeFailed,
        }
    }

    /// Whether a decoded image has been published.
    pub fn has_image(&self) -> bool {
        self.lock_image("has_image")
            .is_some_and(|image| image.decoded.is_some())
    }

    /// Number of stream bytes buffered so far.
    pub fn bytes_received(&self) -> usize {
        self.lock_stream("bytes_received")
            .map_or(0, |stream| stream.buffer.len())
    }
}

impl<C> Drop for StreamingImageSession<C> {
    fn drop(&mut self) {
        // Nothing to release unless a paint built the cache
        let image = self.image.get_mut().unwrap_or_else(PoisonError::into_inner);
        if image.presentation.take().is_some() {
            log::trace!("released presentation cache");
        }
    }
}
