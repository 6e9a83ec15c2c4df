use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::caption::measure::ParleyMeasure;
use crate::foundation::error::{ReelError, ReelResult};

/// Family name of the built-in face.
pub const BUILTIN_FAMILY: &str = "DejaVu Sans";

static BUILTIN_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// A font usable for caption measurement and rasterization.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionFont {
    /// Family name as registered in the font collection.
    pub family: String,
    /// Raw font file bytes, shared by measurement and rasterization.
    pub bytes: Arc<Vec<u8>>,
    /// File the bytes were read from. `None` for the built-in face.
    pub source: Option<PathBuf>,
}

impl CaptionFont {
    /// The built-in face, compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            family: BUILTIN_FAMILY.to_owned(),
            bytes: Arc::new(BUILTIN_FONT.to_vec()),
            source: None,
        }
    }
}

/// Outcome of resolving the preferred caption font.
///
/// Callers always get a usable font; the variant tells whether it is the one that was asked for.
#[derive(Clone, Debug, PartialEq)]
pub enum FontResolution {
    /// The preferred font file was loaded.
    Resolved(CaptionFont),
    /// The preferred font was unset or unusable; the built-in face is used instead.
    Fallback(CaptionFont),
}

impl FontResolution {
    /// The font to use, whichever variant this is.
    pub fn font(&self) -> &CaptionFont {
        match self {
            Self::Resolved(f) | Self::Fallback(f) => f,
        }
    }

    /// `true` for [`FontResolution::Fallback`].
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Resolve the preferred font file, degrading to the built-in face on any failure.
pub fn resolve_font(preferred: Option<&Path>) -> FontResolution {
    let Some(path) = preferred else {
        tracing::debug!("no caption font configured, using built-in face");
        return FontResolution::Fallback(CaptionFont::builtin());
    };

    match load_font(path) {
        Ok(font) => {
            tracing::debug!(family = %font.family, path = %path.display(), "caption font resolved");
            FontResolution::Resolved(font)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "caption font unusable, using built-in face");
            FontResolution::Fallback(CaptionFont::builtin())
        }
    }
}

fn load_font(path: &Path) -> ReelResult<CaptionFont> {
    let bytes = std::fs::read(path)
        .map_err(|e| ReelError::render(format!("failed to read font '{}': {e}", path.display())))?;
    let family = font_family_name(&bytes)?;
    Ok(CaptionFont {
        family,
        bytes: Arc::new(bytes),
        source: Some(path.to_path_buf()),
    })
}

/// Family name of the first face in `font_bytes`.
pub fn font_family_name(font_bytes: &[u8]) -> ReelResult<String> {
    Ok(ParleyMeasure::new(font_bytes, 16.0)?.family_name().to_owned())
}
