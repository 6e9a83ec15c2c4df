use crate::caption::font::FontResolution;
use crate::foundation::error::{ReelError, ReelResult};

/// Measures the rendered width of a single line of text.
pub trait TextMeasure {
    /// Width in pixels of `text` laid out on one line.
    fn width(&mut self, text: &str) -> f32;
}

/// Shaped measurement with Parley using a loaded font file.
pub struct ParleyMeasure {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    family_name: String,
    size_px: f32,
}

impl ParleyMeasure {
    /// Register `font_bytes` and measure at `size_px`.
    pub fn new(font_bytes: &[u8], size_px: f32) -> ReelResult<Self> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| ReelError::render("no font families registered from font bytes"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::render("registered font family has no name"))?
            .to_owned();

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            size_px,
        })
    }

    /// Family the measurement uses.
    pub fn family_name(&self) -> &str {
        &self.family_name
    }
}

impl TextMeasure for ParleyMeasure {
    fn width(&mut self, text: &str) -> f32 {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Borrowed(
                self.family_name.as_str(),
            )),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(self.size_px));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);
        layout.width()
    }
}

/// Shaped measurement over the same bytes the rasterizer draws with.
pub fn measure_for(font: &FontResolution, size_px: f32) -> ReelResult<ParleyMeasure> {
    ParleyMeasure::new(&font.font().bytes, size_px)
}

/// Every character advances by the same amount.
#[cfg(test)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ApproxMeasure {
    advance_px: f32,
}

#[cfg(test)]
impl ApproxMeasure {
    pub(crate) fn with_advance(advance_px: f32) -> Self {
        Self { advance_px }
    }
}

#[cfg(test)]
impl TextMeasure for ApproxMeasure {
    fn width(&mut self, text: &str) -> f32 {
        text.chars().count() as f32 * self.advance_px
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_counts_characters() {
        let mut m = ApproxMeasure::with_advance(10.0);
        assert_eq!(m.width(""), 0.0);
        assert_eq!(m.width("abc"), 30.0);
        assert_eq!(m.width("\u{1eeb}a"), 20.0);
    }

    #[test]
    fn builtin_face_is_shaped_not_fixed_advance() {
        let font = FontResolution::Fallback(crate::caption::font::CaptionFont::builtin());
        let mut m = measure_for(&font, 20.0).unwrap();
        let narrow = m.width("iiii");
        let wide = m.width("WWWW");
        assert!(narrow > 0.0);
        assert!(wide > narrow * 2.0);
        assert_eq!(m.width(""), 0.0);
    }

    #[test]
    fn width_scales_with_size() {
        let font = FontResolution::Fallback(crate::caption::font::CaptionFont::builtin());
        let small = measure_for(&font, 10.0).unwrap().width("captions");
        let large = measure_for(&font, 40.0).unwrap().width("captions");
        assert!((large / small - 4.0).abs() < 0.1);
    }

    #[test]
    fn parley_rejects_bad_size() {
        assert!(ParleyMeasure::new(b"", 0.0).is_err());
    }
}
