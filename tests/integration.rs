//! Integration tests for webpview crate.

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use webpview::*;
use whereat::at;

whereat::define_at_crate_info!();

const ID: StreamId = StreamId(1);

/// Encode a lossless WebP whose pixels are a function of position.
fn encode_webp(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| pattern(x, y));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::WebP)
        .expect("webp encode failed");
    out.into_inner()
}

fn pattern(x: u32, y: u32) -> image::Rgb<u8> {
    image::Rgb([(x * 17) as u8, (y * 29) as u8, ((x + y) * 5) as u8])
}

/// Run a whole stream through a session in chunks of `chunk` bytes.
fn feed<C: Codec>(session: &StreamingImageSession<C>, data: &[u8], chunk: usize) {
    assert!(session
        .open_stream(ID, "image/webp", Some(data.len() as u64))
        .is_accepted());
    for part in data.chunks(chunk.max(1)) {
        assert_eq!(session.append_bytes(ID, part), part.len());
    }
    session.complete_stream(ID, StreamEnd::Done);
}

/// Codec stub returning a solid image and counting invocations.
struct StubCodec {
    width: u32,
    height: u32,
    color: RGB8,
    calls: AtomicUsize,
}

impl StubCodec {
    fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: RGB8::new(0, 0, 0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Codec for StubCodec {
    fn decode(&self, _data: &[u8]) -> webpview::Result<DecodedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DecodedImage::solid(self.width, self.height, self.color))
    }
}

/// Surface recording every scale and blit.
#[derive(Default)]
struct RecordingSurface {
    events: Vec<String>,
    scaled: Vec<Size>,
}

impl Surface for RecordingSurface {
    fn scale(&mut self, image: ImgRef<'_, RGB8>, size: Size) -> ImgVec<RGB8> {
        self.events.push(format!("scale {}x{}", size.width, size.height));
        self.scaled.push(size);
        let color = image.pixels().next().unwrap_or_default();
        ImgVec::new(
            vec![color; size.area()],
            size.width as usize,
            size.height as usize,
        )
    }

    fn blit(&mut self, image: ImgRef<'_, RGB8>, _target: Rect, _offset: Point) {
        self.events
            .push(format!("blit {}x{}", image.width(), image.height()));
    }
}

mod decode {
    use super::*;

    #[test]
    fn test_chunking_invariance() {
        let webp = encode_webp(23, 17);
        let mut reference: Option<PixelSnapshot> = None;

        for chunk in [1, 7, 64, 1000, webp.len()] {
            let session = StreamingImageSession::new(WebpCodec::new());
            feed(&session, &webp, chunk);
            assert_eq!(session.state(), SessionState::Decoded, "chunk {}", chunk);

            let snapshot = session.export_decoded().expect("decoded image");
            assert_eq!((snapshot.width, snapshot.height), (23, 17));
            match &reference {
                Some(first) => assert_eq!(first, &snapshot),
                None => reference = Some(snapshot),
            }
        }
    }

    #[test]
    fn test_lossless_pixels_survive() {
        let webp = encode_webp(8, 4);
        let session = StreamingImageSession::new(WebpCodec::new());
        feed(&session, &webp, 10);

        let snapshot = session.export_decoded().unwrap();
        assert_eq!(snapshot.pixels.len(), 8 * 4 * 3);
        for (y, row) in snapshot.rows().enumerate() {
            for (x, px) in row.chunks_exact(3).enumerate() {
                assert_eq!(px, pattern(x as u32, y as u32).0.as_slice());
            }
        }
    }

    #[test]
    fn test_raw_stream_is_concatenation() {
        let webp = encode_webp(5, 5);
        let session = StreamingImageSession::new(WebpCodec::new());
        feed(&session, &webp, 3);
        assert_eq!(session.export_raw_stream().as_deref(), Some(webp.as_slice()));
    }

    #[test]
    fn test_garbage_fails() {
        let session = StreamingImageSession::new(WebpCodec::new());
        feed(&session, b"RIFF\x10\x00\x00\x00WEBPVP8L garbage", 4);
        assert_eq!(session.state(), SessionState::DecodeFailed);
        assert!(session.export_decoded().is_none());
        assert!(!session.has_image());
    }

    #[test]
    fn test_truncated_stream_fails() {
        let webp = encode_webp(32, 32);
        let session = StreamingImageSession::new(WebpCodec::new());
        feed(&session, &webp[..webp.len() / 2], 16);
        assert_eq!(session.state(), SessionState::DecodeFailed);
        assert!(session.export_decoded().is_none());
    }

    #[test]
    fn test_codec_limits() {
        let webp = encode_webp(40, 10);
        let codec = WebpCodec::with_limits(DecodeLimits::new().max_dimensions(32, 32));
        assert!(codec.decode(&webp).is_err());
        assert!(WebpCodec::new().decode(&webp).is_ok());

        let info = ImageInfo::from_webp(&webp).unwrap();
        assert_eq!(info.size(), Size::new(40, 10));
        assert!(!info.has_animation);
    }

    #[test]
    fn test_viewer_limits_reach_codec() {
        let webp = encode_webp(40, 10);

        let small = ViewerConfig::new().limits(DecodeLimits::new().max_dimensions(8, 8));
        let session = StreamingImageSession::with_config(WebpCodec::new(), small);
        feed(&session, &webp, 64);
        assert_eq!(session.state(), SessionState::DecodeFailed);
        assert!(session.export_decoded().is_none());

        let roomy = ViewerConfig::new().limits(DecodeLimits::new().max_dimensions(64, 64));
        let session = StreamingImageSession::with_config(WebpCodec::new(), roomy);
        feed(&session, &webp, 64);
        assert_eq!(session.state(), SessionState::Decoded);

        // The stricter of codec and session limits wins
        let codec = WebpCodec::with_limits(DecodeLimits::new().max_dimensions(32, 32));
        let session = StreamingImageSession::with_config(codec, ViewerConfig::new());
        feed(&session, &webp, 64);
        assert_eq!(session.state(), SessionState::DecodeFailed);
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn test_declared_size_stream_then_paint() {
        let session = StreamingImageSession::new(StubCodec::black(10, 10));
        assert!(session
            .open_stream(ID, "image/webp", Some(1000))
            .is_accepted());
        assert_eq!(session.append_bytes(ID, &[0xAA; 400]), 400);
        assert_eq!(session.accepted_capacity(ID), 600);
        assert_eq!(session.append_bytes(ID, &[0xBB; 600]), 600);
        assert_eq!(session.accepted_capacity(ID), 0);
        session.complete_stream(ID, StreamEnd::Done);

        assert_eq!(session.state(), SessionState::Decoded);
        let snapshot = session.export_decoded().unwrap();
        assert_eq!(snapshot.pixels.len(), 300);
        assert!(snapshot.pixels.iter().all(|&b| b == 0));

        let mut surface = RecordingSurface::default();
        let outcome = session.request_paint(&mut surface, Rect::new(0, 0, 20, 20), Size::new(20, 20));
        assert_eq!(outcome, PaintOutcome::Drawn { rescaled: true });
        assert_eq!(surface.events, ["scale 20x20", "blit 20x20"]);
    }

    #[test]
    fn test_immediate_failure() {
        let session = StreamingImageSession::new(StubCodec::black(10, 10));
        assert!(session.open_stream(ID, "image/webp", None).is_accepted());
        session.complete_stream(ID, StreamEnd::NetworkError);

        assert_eq!(session.state(), SessionState::DecodeFailed);
        assert!(session.export_decoded().is_none());
        assert!(session.export_raw_stream().is_none());
    }

    #[test]
    fn test_completion_with_no_bytes_fails_without_codec() {
        let codec = StubCodec::black(10, 10);
        let session = StreamingImageSession::new(&codec);
        assert!(session.open_stream(ID, "image/webp", None).is_accepted());
        session.complete_stream(ID, StreamEnd::UserBreak);
        assert_eq!(session.state(), SessionState::DecodeFailed);
        assert_eq!(codec.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_viewport_changes_rescale_once_each() {
        let session = StreamingImageSession::new(StubCodec::black(4, 4));
        feed(&session, &[1, 2, 3], 1);
        let mut surface = RecordingSurface::default();

        for size in [(20, 20), (20, 20), (8, 6), (8, 6), (8, 6), (20, 20)] {
            let viewport = Size::new(size.0, size.1);
            session.request_paint(&mut surface, Rect::new(0, 0, size.0, size.1), viewport);
        }
        assert_eq!(
            surface.scaled,
            [Size::new(20, 20), Size::new(8, 6), Size::new(20, 20)]
        );
    }

    #[test]
    fn test_paint_into_framebuffer() {
        let webp = encode_webp(4, 4);
        let session = StreamingImageSession::new(WebpCodec::new());
        feed(&session, &webp, 8);

        // Same size viewport: the presentation equals the decoded image
        let mut fb = Framebuffer::new(10, 10).with_filter(ScaleFilter::Nearest);
        let outcome = session.request_paint(&mut fb, Rect::new(3, 2, 4, 4), Size::new(4, 4));
        assert_eq!(outcome, PaintOutcome::Drawn { rescaled: true });

        let expected = pattern(1, 2).0;
        assert_eq!(
            fb.pixel(3 + 1, 2 + 2),
            Some(RGB8::new(expected[0], expected[1], expected[2]))
        );
        assert_eq!(fb.pixel(0, 0), Some(RGB8::new(0, 0, 0)));
        assert_eq!(fb.pixel(7, 6), Some(RGB8::new(0, 0, 0)));
    }
}

mod concurrency {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    struct PanickingCodec;

    impl Codec for PanickingCodec {
        fn decode(&self, _data: &[u8]) -> webpview::Result<DecodedImage> {
            panic!("codec bug");
        }
    }

    /// Surface whose scaling step panics.
    struct PanickingSurface;

    impl Surface for PanickingSurface {
        fn scale(&mut self, _image: ImgRef<'_, RGB8>, _size: Size) -> ImgVec<RGB8> {
            panic!("surface bug");
        }

        fn blit(&mut self, _image: ImgRef<'_, RGB8>, _target: Rect, _offset: Point) {}
    }

    #[test]
    fn test_codec_panic_does_not_reach_host() {
        let session = StreamingImageSession::new(PanickingCodec);
        assert!(session.open_stream(ID, "image/webp", None).is_accepted());
        assert_eq!(session.append_bytes(ID, &[1, 2, 3, 4]), 4);
        session.complete_stream(ID, StreamEnd::Done);

        assert_eq!(session.state(), SessionState::DecodeFailed);
        assert_eq!(session.append_bytes(ID, &[5]), 0);
        assert_eq!(
            session.open_stream(StreamId(2), "image/webp", None),
            OpenOutcome::Rejected
        );
        let mut surface = RecordingSurface::default();
        let outcome = session.request_paint(&mut surface, Rect::new(0, 0, 4, 4), Size::new(4, 4));
        assert_eq!(outcome, PaintOutcome::NoImage);
    }

    #[test]
    fn test_poisoned_image_lock_skips_paint() {
        let session = StreamingImageSession::new(StubCodec::black(6, 6));
        feed(&session, &[1, 2, 3], 2);
        assert_eq!(session.state(), SessionState::Decoded);

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            session.request_paint(&mut PanickingSurface, Rect::new(0, 0, 4, 4), Size::new(4, 4))
        }));
        assert!(unwound.is_err());

        let mut surface = RecordingSurface::default();
        let outcome = session.request_paint(&mut surface, Rect::new(0, 0, 4, 4), Size::new(4, 4));
        assert_eq!(outcome, PaintOutcome::Busy);
        assert!(surface.events.is_empty());
        assert!(!session.has_image());
        assert!(session.export_decoded().is_none());

        // The stream lock is untouched
        assert_eq!(session.state(), SessionState::Decoded);
        assert_eq!(session.export_raw_stream(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_concurrent_open_accepts_exactly_one() {
        for _ in 0..20 {
            let session = StreamingImageSession::new(StubCodec::black(1, 1));
            let barrier = Barrier::new(8);
            let accepted = AtomicUsize::new(0);

            std::thread::scope(|s| {
                for i in 0..8u64 {
                    let (session, barrier, accepted) = (&session, &barrier, &accepted);
                    s.spawn(move || {
                        barrier.wait();
                        if session
                            .open_stream(StreamId(i), "image/webp", None)
                            .is_accepted()
                        {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });

            assert_eq!(accepted.load(Ordering::SeqCst), 1);
            assert_eq!(session.state(), SessionState::StreamOpen);
        }
    }

    /// Codec that parks inside decode until the test releases it.
    struct GatedCodec {
        entered: Barrier,
        release: Barrier,
    }

    impl Codec for GatedCodec {
        fn decode(&self, _data: &[u8]) -> webpview::Result<DecodedImage> {
            self.entered.wait();
            self.release.wait();
            Ok(DecodedImage::solid(2, 2, RGB8::new(9, 9, 9)))
        }
    }

    #[test]
    fn test_paint_skips_while_decoding() {
        let gate = GatedCodec {
            entered: Barrier::new(2),
            release: Barrier::new(2),
        };
        let session = StreamingImageSession::new(&gate);
        assert!(session.open_stream(ID, "image/webp", None).is_accepted());
        session.append_bytes(ID, &[0; 4]);

        std::thread::scope(|s| {
            let decoder = s.spawn(|| session.complete_stream(ID, StreamEnd::Done));

            gate.entered.wait();
            let mut surface = RecordingSurface::default();
            let outcome =
                session.request_paint(&mut surface, Rect::new(0, 0, 4, 4), Size::new(4, 4));
            assert_eq!(outcome, PaintOutcome::Busy);
            assert!(surface.events.is_empty());

            gate.release.wait();
            decoder.join().unwrap();
        });

        assert_eq!(session.state(), SessionState::Decoded);
        let mut surface = RecordingSurface::default();
        let outcome = session.request_paint(&mut surface, Rect::new(0, 0, 4, 4), Size::new(4, 4));
        assert_eq!(outcome, PaintOutcome::Drawn { rescaled: true });
    }

    #[test]
    fn test_exports_race_with_delivery() {
        let webp = encode_webp(16, 16);
        let session = Arc::new(StreamingImageSession::new(WebpCodec::new()));
        assert!(session.open_stream(ID, "image/webp", None).is_accepted());

        let seen = Arc::new(Mutex::new(Vec::new()));
        std::thread::scope(|s| {
            let reader = {
                let session = Arc::clone(&session);
                let seen = Arc::clone(&seen);
                s.spawn(move || {
                    while !matches!(
                        session.state(),
                        SessionState::Decoded | SessionState::DecodeFailed
                    ) {
                        if let Some(snapshot) = session.export_decoded() {
                            seen.lock().unwrap().push(snapshot.size());
                        }
                        let mut fb = Framebuffer::new(8, 8);
                        session.request_paint(&mut fb, Rect::new(0, 0, 8, 8), Size::new(8, 8));
                        std::thread::yield_now();
                    }
                })
            };

            for part in webp.chunks(5) {
                assert_eq!(session.append_bytes(ID, part), part.len());
            }
            session.complete_stream(ID, StreamEnd::Done);
            reader.join().unwrap();
        });

        // Anything observed before the loop ended was the complete image
        assert!(seen.lock().unwrap().iter().all(|&s| s == Size::new(16, 16)));
        assert_eq!(session.state(), SessionState::Decoded);
    }
}

mod instance {
    use super::*;

    fn instance_with_counter(
        src: &str,
    ) -> (PluginInstance<WebpCodec>, Arc<Mutex<Vec<Rect>>>) {
        let invalidated = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&invalidated);
        let args = InstanceArgs::from_pairs([("data", src), ("width", "6"), ("height", "4")]);
        let instance = PluginInstance::new(WebpCodec::new(), args, EmbedMode::Embedded, move |rect| {
            sink.lock().unwrap().push(rect);
        });
        (instance, invalidated)
    }

    #[test]
    fn test_events() {
        let (instance, _) = instance_with_counter("pic.webp");
        let mut fb = Framebuffer::new(6, 4);

        assert_eq!(
            instance.handle_event(HostEvent::ButtonPress { button: 3 }, &mut fb),
            EventResponse::ShowMenu
        );
        assert_eq!(
            instance.handle_event(HostEvent::ButtonPress { button: 1 }, &mut fb),
            EventResponse::Ignored
        );
        assert!(!instance.handle_event(HostEvent::Other, &mut fb).handled());
        assert_eq!(
            instance.handle_event(HostEvent::Expose, &mut fb),
            EventResponse::Painted(PaintOutcome::NoImage)
        );
    }

    #[test]
    fn test_decode_invalidates_window() {
        let (instance, invalidated) = instance_with_counter("pic.webp");
        instance.set_window(Window {
            x: 10,
            y: 20,
            width: 6,
            height: 4,
        });
        feed(instance.session(), &encode_webp(3, 2), 7);

        assert_eq!(*invalidated.lock().unwrap(), [Rect::new(0, 0, 6, 4)]);

        let mut fb = Framebuffer::new(40, 40);
        assert_eq!(
            instance.handle_event(HostEvent::Expose, &mut fb),
            EventResponse::Painted(PaintOutcome::Drawn { rescaled: true })
        );
    }

    #[test]
    fn test_menu_actions() {
        let (instance, _) = instance_with_counter("http://example.com/images/pic.webp");
        assert!(instance.activate(MenuAction::SaveAsPng, &Unstoppable).is_err());
        assert!(instance.activate(MenuAction::SaveAsWebp, &Unstoppable).is_err());

        let webp = encode_webp(7, 5);
        feed(instance.session(), &webp, 11);

        match instance.activate(MenuAction::SaveAsWebp, &Unstoppable).unwrap() {
            MenuOutcome::Save(req) => {
                assert_eq!(req.suggested_name, "pic.webp");
                assert_eq!(req.bytes, webp);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        match instance.activate(MenuAction::SaveAsPng, &Unstoppable).unwrap() {
            MenuOutcome::Save(req) => {
                assert_eq!(req.suggested_name, "pic.png");
                let png = image::load_from_memory_with_format(&req.bytes, image::ImageFormat::Png)
                    .expect("valid png");
                assert_eq!((png.width(), png.height()), (7, 5));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        assert_eq!(
            instance.activate(MenuAction::About, &Unstoppable).unwrap(),
            MenuOutcome::About(about_text())
        );
    }

    #[test]
    fn test_args() {
        let (instance, _) = instance_with_counter("a.webp");
        assert_eq!(instance.args().src(), Some("a.webp"));
        assert!(instance.args().has_size());
        assert_eq!(instance.mode(), EmbedMode::Embedded);
        assert_eq!(instance.window(), Window::default());
    }
}

#[test]
fn test_stub_codec_error_path() {
    struct Failing;
    impl Codec for Failing {
        fn decode(&self, _data: &[u8]) -> webpview::Result<DecodedImage> {
            Err(at!(Error::DecodeFailed(DecodingError::BitstreamError)))
        }
    }

    let session = StreamingImageSession::new(Failing);
    feed(&session, &[1, 2, 3], 2);
    assert_eq!(session.state(), SessionState::DecodeFailed);
    let mut surface = RecordingSurface::default();
    assert_eq!(
        session.request_paint(&mut surface, Rect::new(0, 0, 1, 1), Size::new(1, 1)),
        PaintOutcome::NoImage
    );
}
