use std::fmt;

use super::backend::BackendError;

/// Logs at error level and panics.
///
/// Used for conditions the renderer cannot continue from: exceeding a fixed
/// capacity or limit, or a backend refusing to release a resource.
macro_rules! fatal {
    ($($arg:tt)+) => {{
        log::error!($($arg)+);
        panic!($($arg)+)
    }};
}

pub(crate) use fatal;

/// Error returned by resource creation and asset loading.
///
/// The per-frame path (submit, flush, pass and frame transitions) never
/// returns errors.
#[derive(Debug, Clone, PartialEq)]
pub enum GfxError {
    /// The backend refused to create a resource.
    Backend(BackendError),
    /// Pixel data does not match the texture description.
    InvalidTexture {
        width: u32,
        height: u32,
        expected_bytes: usize,
        actual_bytes: usize,
    },
    Font(FontError),
    Image(String),
}

impl fmt::Display for GfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GfxError::Backend(e) => write!(f, "{e}"),
            GfxError::InvalidTexture { width, height, expected_bytes, actual_bytes } => write!(
                f,
                "invalid texture {width}x{height}: expected {expected_bytes} bytes of pixel data, got {actual_bytes}"
            ),
            GfxError::Font(e) => write!(f, "{e}"),
            GfxError::Image(msg) => write!(f, "image decode error: {msg}"),
        }
    }
}

impl std::error::Error for GfxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GfxError::Backend(e) => Some(e),
            GfxError::Font(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for GfxError {
    fn from(e: BackendError) -> Self {
        GfxError::Backend(e)
    }
}

impl From<FontError> for GfxError {
    fn from(e: FontError) -> Self {
        GfxError::Font(e)
    }
}

/// Error returned while building a font arrangement.
#[derive(Debug, Clone, PartialEq)]
pub struct FontError(pub String);

impl fmt::Display for FontError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font error: {}", self.0)
    }
}

impl std::error::Error for FontError {}
