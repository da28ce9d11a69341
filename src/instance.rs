//! Plugin instance glue between host callbacks and the session.
//!
//! Keeps what the host tells an instance about itself (arguments, window
//! geometry) and turns host events and context-menu activations into
//! session operations. Showing menus and dialogs and writing files stay
//! with the embedding toolkit.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::export::suggested_file_name;
use crate::session::{PaintOutcome, RepaintNotifier, StreamingImageSession};
use crate::surface::Surface;
use crate::types::{Rect, Size};
use enough::Stop;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use whereat::*;

/// Mouse button that opens the context menu.
pub const CONTEXT_MENU_BUTTON: u8 = 3;

/// How the host embedded the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedMode {
    /// Part of a page (`<embed>`/`<object>`).
    #[default]
    Embedded,
    /// The instance fills the whole document.
    Full,
}

/// Name/value arguments from the embedding element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceArgs {
    entries: BTreeMap<String, String>,
}

impl InstanceArgs {
    /// Collect arguments; a `data` attribute also becomes `src`.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Some(data) = entries.get("data").cloned() {
            entries.insert("src".to_owned(), data);
        }
        Self { entries }
    }

    /// Look up an argument.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Source URL of the image, if given.
    pub fn src(&self) -> Option<&str> {
        self.get("src")
    }

    /// Whether the element declared both `width` and `height`.
    pub fn has_size(&self) -> bool {
        self.entries.contains_key("width") && self.entries.contains_key("height")
    }
}

/// Where the host placed the instance on its drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    /// Left edge on the drawable.
    pub x: i32,
    /// Top edge on the drawable.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Window {
    /// Region the instance paints into.
    pub fn target(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Size the image is scaled to.
    pub fn viewport(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Rectangle to invalidate after new content, in instance coordinates.
    pub fn invalidation_rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// Window-system events forwarded by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A mouse button went down.
    ButtonPress {
        /// Button number, 1-based.
        button: u8,
    },
    /// Part of the drawable needs repainting.
    Expose,
    /// Anything the instance does not handle.
    Other,
}

/// What the instance did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    /// Not handled; the host may process it.
    Ignored,
    /// The host should pop up the context menu.
    ShowMenu,
    /// A paint was attempted.
    Painted(PaintOutcome),
}

impl EventResponse {
    /// Whether the event was consumed.
    pub fn handled(self) -> bool {
        self != EventResponse::Ignored
    }
}

/// Context-menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Re-encode the decoded image as PNG.
    SaveAsPng,
    /// Save the original WebP bytes.
    SaveAsWebp,
    /// Show plugin information.
    About,
}

impl MenuAction {
    /// Entries in menu order.
    pub const ALL: [MenuAction; 3] = [
        MenuAction::SaveAsPng,
        MenuAction::SaveAsWebp,
        MenuAction::About,
    ];

    /// Menu item label.
    pub fn label(self) -> &'static str {
        match self {
            MenuAction::SaveAsPng => "Save as PNG",
            MenuAction::SaveAsWebp => "Save as WebP",
            MenuAction::About => "About",
        }
    }
}

/// Bytes ready to be written wherever the user chooses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    /// Name to prefill in the save dialog.
    pub suggested_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Result of activating a menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    /// Offer a save dialog for these bytes.
    Save(SaveRequest),
    /// Show this text in an information dialog.
    About(String),
}

/// Hands the current invalidation rectangle to the host's repaint hook.
struct WindowNotifier<F> {
    window: Arc<Mutex<Window>>,
    invalidate: F,
}

impl<F: Fn(Rect) + Send + Sync> RepaintNotifier for WindowNotifier<F> {
    fn content_changed(&self) {
        let rect = match self.window.lock() {
            Ok(window) => window.invalidation_rect(),
            Err(_) => return,
        };
        (self.invalidate)(rect);
    }
}

/// One embedded viewer.
///
/// # Example
///
/// ```rust,no_run
/// use webpview::{EmbedMode, Framebuffer, HostEvent, InstanceArgs, PluginInstance, WebpCodec, Window};
///
/// let args = InstanceArgs::from_pairs([("src", "cat.webp"), ("width", "320"), ("height", "240")]);
/// let instance = PluginInstance::new(WebpCodec::new(), args, EmbedMode::Embedded, |_rect| {
///     // ask the browser to repaint
/// });
/// instance.set_window(Window { x: 0, y: 0, width: 320, height: 240 });
///
/// let mut fb = Framebuffer::new(320, 240);
/// instance.handle_event(HostEvent::Expose, &mut fb);
/// ```
pub struct PluginInstance<C> {
    session: StreamingImageSession<C>,
    args: InstanceArgs,
    mode: EmbedMode,
    window: Arc<Mutex<Window>>,
}

impl<C: Codec> PluginInstance<C> {
    /// Create an instance. `invalidate` receives the region to repaint once
    /// an image has been decoded.
    pub fn new(
        codec: C,
        args: InstanceArgs,
        mode: EmbedMode,
        invalidate: impl Fn(Rect) + Send + Sync + 'static,
    ) -> Self {
        Self::with_session(
            |notifier| StreamingImageSession::new(codec).with_notifier(notifier),
            args,
            mode,
            invalidate,
        )
    }

    /// Create an instance around a custom-built session.
    ///
    /// `build` receives the repaint notifier the session must be given.
    pub fn with_session(
        build: impl FnOnce(Box<dyn RepaintNotifier>) -> StreamingImageSession<C>,
        args: InstanceArgs,
        mode: EmbedMode,
        invalidate: impl Fn(Rect) + Send + Sync + 'static,
    ) -> Self {
        let window = Arc::new(Mutex::new(Window::default()));
        let notifier = WindowNotifier {
            window: Arc::clone(&window),
            invalidate,
        };
        Self {
            session: build(Box::new(notifier)),
            args,
            mode,
            window,
        }
    }

    /// The underlying session, for the stream callbacks.
    pub fn session(&self) -> &StreamingImageSession<C> {
        &self.session
    }

    /// Embedding arguments.
    pub fn args(&self) -> &InstanceArgs {
        &self.args
    }

    /// Embedding mode.
    pub fn mode(&self) -> EmbedMode {
        self.mode
    }

    /// Record new window geometry from the host.
    pub fn set_window(&self, window: Window) {
        log::debug!(
            "window set to {}x{} at ({}, {})",
            window.width,
            window.height,
            window.x,
            window.y
        );
        match self.window.lock() {
            Ok(mut current) => *current = window,
            Err(_) => log::warn!("set_window: failed to lock window"),
        }
    }

    /// Last geometry reported by the host.
    pub fn window(&self) -> Window {
        self.window
            .lock()
            .map(|window| *window)
            .unwrap_or_default()
    }

    /// Dispatch a host event, painting into `surface` on exposure.
    pub fn handle_event(&self, event: HostEvent, surface: &mut dyn Surface) -> EventResponse {
        match event {
            HostEvent::ButtonPress { button } if button == CONTEXT_MENU_BUTTON => {
                EventResponse::ShowMenu
            }
            HostEvent::Expose => {
                let window = self.window();
                let outcome =
                    self.session
                        .request_paint(surface, window.target(), window.viewport());
                EventResponse::Painted(outcome)
            }
            HostEvent::ButtonPress { .. } | HostEvent::Other => EventResponse::Ignored,
        }
    }

    /// Carry out a context-menu entry.
    ///
    /// Saving requires a decoded image; otherwise [`Error::NoImage`].
    pub fn activate(&self, action: MenuAction, stop: &dyn Stop) -> Result<MenuOutcome> {
        match action {
            MenuAction::About => Ok(MenuOutcome::About(crate::about_text())),
            MenuAction::SaveAsWebp => {
                if !self.session.has_image() {
                    return Err(at!(Error::NoImage));
                }
                let bytes = self
                    .session
                    .export_raw_stream()
                    .ok_or_else(|| at!(Error::NoImage))?;
                Ok(MenuOutcome::Save(SaveRequest {
                    suggested_name: suggested_file_name(self.args.src(), None),
                    bytes,
                }))
            }
            MenuAction::SaveAsPng => self.save_as_png(stop),
        }
    }

    #[cfg(feature = "png")]
    fn save_as_png(&self, stop: &dyn Stop) -> Result<MenuOutcome> {
        let snapshot = self
            .session
            .export_decoded()
            .ok_or_else(|| at!(Error::NoImage))?;
        let bytes = crate::export::encode_png(&snapshot, stop)?;
        Ok(MenuOutcome::Save(SaveRequest {
            suggested_name: suggested_file_name(self.args.src(), Some("png")),
            bytes,
        }))
    }

    #[cfg(not(feature = "png"))]
    fn save_as_png(&self, _stop: &dyn Stop) -> Result<MenuOutcome> {
        Err(at!(Error::EncodeFailed("built without PNG support".into())))
    }
}
