//! Viewer, decode-limit and scaling configuration.

/// Media type the viewer accepts by default.
pub const WEBP_MIME_TYPE: &str = "image/webp";

/// Largest width or height a WebP bitstream can carry.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

/// Resource limits applied to the incoming stream and the decoded image.
///
/// These are the decoder's own limits: a declared stream size is only a
/// capacity hint, but nothing past `max_stream_bytes` is ever buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub(crate) max_stream_bytes: usize,
    pub(crate) max_width: u32,
    pub(crate) max_height: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            // RIFF sizes are 32-bit
            max_stream_bytes: u32::MAX as usize,
            max_width: WEBP_MAX_DIMENSION,
            max_height: WEBP_MAX_DIMENSION,
        }
    }
}

impl DecodeLimits {
    /// Create limits with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of encoded bytes buffered for one stream.
    #[must_use]
    pub fn max_stream_bytes(mut self, bytes: usize) -> Self {
        self.max_stream_bytes = bytes;
        self
    }

    /// Maximum decoded dimensions.
    #[must_use]
    pub fn max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Configured stream byte ceiling.
    pub fn stream_bytes(&self) -> usize {
        self.max_stream_bytes
    }

    /// The stricter of two sets of limits, field by field.
    #[must_use]
    pub fn intersect(&self, other: &DecodeLimits) -> Self {
        Self {
            max_stream_bytes: self.max_stream_bytes.min(other.max_stream_bytes),
            max_width: self.max_width.min(other.max_width),
            max_height: self.max_height.min(other.max_height),
        }
    }

    /// Whether an image of the given dimensions is within limits.
    pub fn allows(&self, width: u32, height: u32) -> bool {
        width <= self.max_width && height <= self.max_height
    }
}

/// Configuration for a [`StreamingImageSession`](crate::StreamingImageSession).
///
/// # Example
///
/// ```rust
/// use webpview::{DecodeLimits, ViewerConfig};
///
/// let config = ViewerConfig::new()
///     .limits(DecodeLimits::new().max_stream_bytes(64 << 20));
/// assert!(config.accepts_mime("image/webp"));
/// assert!(!config.accepts_mime("image/png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub(crate) mime_type: String,
    pub(crate) limits: DecodeLimits,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            mime_type: WEBP_MIME_TYPE.to_owned(),
            limits: DecodeLimits::default(),
        }
    }
}

impl ViewerConfig {
    /// Create a new viewer configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Media type accepted by `open_stream`.
    #[must_use]
    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    /// Stream and image limits.
    #[must_use]
    pub fn limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The configured limits.
    pub fn decode_limits(&self) -> &DecodeLimits {
        &self.limits
    }

    /// Whether a declared media type matches the configured one.
    ///
    /// Comparison ignores ASCII case and any `;`-separated parameters.
    pub fn accepts_mime(&self, declared: &str) -> bool {
        let essence = declared.split(';').next().unwrap_or("").trim();
        essence.eq_ignore_ascii_case(self.mime_type.trim())
    }
}

/// Resampling filter used by [`Framebuffer`](crate::Framebuffer) when
/// building the presentation copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ScaleFilter {
    /// Nearest neighbour, fastest.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Bilinear,
    /// Cubic (Catmull-Rom).
    CatmullRom,
    /// Lanczos with a window of 3.
    Lanczos3,
}

impl ScaleFilter {
    pub(crate) fn to_image(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            ScaleFilter::Nearest => FilterType::Nearest,
            ScaleFilter::Bilinear => FilterType::Triangle,
            ScaleFilter::CatmullRom => FilterType::CatmullRom,
            ScaleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}
