use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::caption::font::{BUILTIN_FAMILY, CaptionFont, FontResolution, resolve_font};
use crate::caption::measure::measure_for;
use crate::caption::wrap::wrap_lines;
use crate::config::CaptionStyle;
use crate::foundation::core::{Canvas, FrameRGBA};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::temp::TempAsset;

/// Rendered caption still for one segment, backed by a temporary PNG.
///
/// Dropping the asset deletes the file.
#[derive(Debug)]
pub struct CaptionAsset {
    image: TempAsset,
    canvas: Canvas,
    duration_secs: f64,
    lines: Vec<String>,
    font: FontResolution,
}

impl CaptionAsset {
    /// Path of the PNG file.
    pub fn path(&self) -> &Path {
        self.image.path()
    }

    /// Canvas the caption was drawn on.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Display duration, as dictated by the caller.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Wrapped lines that were drawn.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Font used for the caption.
    pub fn font(&self) -> &FontResolution {
        &self.font
    }

    /// Delete the backing file.
    pub fn release(self) -> ReelResult<()> {
        self.image.release()
    }
}

/// Lays out and rasterizes caption stills.
#[derive(Clone)]
pub struct CaptionRenderer {
    style: CaptionStyle,
    font: FontResolution,
    fontdb: Arc<usvg::fontdb::Database>,
    work_dir: PathBuf,
}

impl CaptionRenderer {
    /// Resolve the configured font and prepare the rasterizer's font database.
    pub fn new(style: &CaptionStyle, work_dir: impl Into<PathBuf>) -> Self {
        let font = resolve_font(style.font_path.as_deref());

        let mut db = usvg::fontdb::Database::new();
        if style.load_system_fonts {
            db.load_system_fonts();
        }
        let builtin = CaptionFont::builtin();
        db.load_font_data(Vec::clone(&builtin.bytes));
        if !font.is_fallback() {
            db.load_font_data(Vec::clone(&font.font().bytes));
        }
        db.set_sans_serif_family(BUILTIN_FAMILY);
        tracing::debug!(
            faces = db.len(),
            family = %font.font().family,
            fallback = font.is_fallback(),
            "caption font database ready"
        );

        Self {
            style: style.clone(),
            font,
            fontdb: Arc::new(db),
            work_dir: work_dir.into(),
        }
    }

    /// Font resolution in effect for every caption.
    pub fn font(&self) -> &FontResolution {
        &self.font
    }

    /// Wrap `text` into at most `max_lines` lines.
    pub fn layout(&self, text: &str) -> ReelResult<Vec<String>> {
        let mut measure = measure_for(&self.font, self.style.font_size_px)?;
        Ok(wrap_lines(
            text,
            &mut measure,
            self.style.max_text_width_px,
            self.style.max_lines,
        ))
    }

    /// Rasterize `lines` onto the canvas. The result is straight-alpha RGBA8.
    pub fn rasterize(&self, lines: &[String]) -> ReelResult<FrameRGBA> {
        let Canvas { width, height } = self.style.canvas;
        let svg = caption_svg(&self.style, &self.font.font().family, lines);

        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            font_family: BUILTIN_FAMILY.to_owned(),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .map_err(|e| ReelError::render(format!("failed to build caption scene: {e}")))?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| ReelError::render("failed to allocate caption pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::default(),
            &mut pixmap.as_mut(),
        );

        let mut data = pixmap.take();
        unpremultiply_rgba8_in_place(&mut data);
        Ok(FrameRGBA {
            width,
            height,
            data,
            premultiplied: false,
        })
    }

    /// Render `text` as a caption that lasts `duration_secs`.
    pub fn render(&self, text: &str, duration_secs: f64) -> ReelResult<CaptionAsset> {
        let lines = self.layout(text)?;
        let frame = self.rasterize(&lines)?;

        let image = TempAsset::create_in(&self.work_dir, "scriptreel-caption-", ".png")?;
        image::save_buffer_with_format(
            image.path(),
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| {
            ReelError::render(format!(
                "failed to write caption '{}': {e}",
                image.path().display()
            ))
        })?;

        Ok(CaptionAsset {
            image,
            canvas: self.style.canvas,
            duration_secs,
            lines,
            font: self.font.clone(),
        })
    }
}

fn caption_svg(style: &CaptionStyle, family: &str, lines: &[String]) -> String {
    let Canvas { width, height } = style.canvas;
    let bg = style.background;
    let fg = style.foreground;
    let family_attr = format!("'{}', sans-serif", escape_xml(&family.replace('\'', "")));

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    svg.push_str(&format!(
        r#"<rect x="0" y="0" width="{width}" height="{height}" fill="{}" fill-opacity="{}"/>"#,
        bg.to_hex_rgb(),
        bg.opacity()
    ));

    for (i, line) in lines.iter().enumerate() {
        // SVG positions text by its baseline; the style positions line tops.
        let baseline = style.origin_y_px + (i as f32) * style.line_height_px + style.font_size_px;
        svg.push_str(&format!(
            r#"<text x="{}" y="{baseline}" font-family="{family_attr}" font-size="{}" fill="{}" fill-opacity="{}" xml:space="preserve">{}</text>"#,
            style.origin_x_px,
            style.font_size_px,
            fg.to_hex_rgb(),
            fg.opacity(),
            escape_xml(line)
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Rgba8;

    fn small_style() -> CaptionStyle {
        CaptionStyle {
            canvas: Canvas {
                width: 64,
                height: 36,
            },
            background: Rgba8::rgb(10, 20, 30),
            font_size_px: 8.0,
            line_height_px: 10.0,
            origin_x_px: 2.0,
            origin_y_px: 2.0,
            max_text_width_px: 60.0,
            max_lines: 3,
            load_system_fonts: false,
            ..CaptionStyle::default()
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(escape_xml("x\ny"), "x y");
    }

    #[test]
    fn svg_has_one_text_node_per_line() {
        let style = small_style();
        let lines = vec!["one".to_owned(), "two & three".to_owned()];
        let svg = caption_svg(&style, BUILTIN_FAMILY, &lines);
        assert_eq!(svg.matches("<text ").count(), 2);
        assert!(svg.contains("two &amp; three"));
        assert!(svg.contains(r##"fill="#0a141e""##));
        usvg::Tree::from_str(&svg, &usvg::Options::default()).unwrap();
    }

    #[test]
    fn layout_respects_line_cap() {
        let dir = tempfile::tempdir().unwrap();
        let r = CaptionRenderer::new(&small_style(), dir.path());
        let long = vec!["word"; 200].join(" ");
        assert_eq!(r.layout(&long).unwrap().len(), 3);
    }

    #[test]
    fn render_fills_background_and_keeps_duration() {
        let dir = tempfile::tempdir().unwrap();
        let r = CaptionRenderer::new(&small_style(), dir.path());
        assert!(r.font().is_fallback());

        let asset = r.render("hello captions", 1.25).unwrap();
        assert_eq!(asset.duration_secs(), 1.25);
        assert_eq!(asset.lines(), ["hello captions"]);

        let img = image::open(asset.path()).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (64, 36));
        // Bottom-right corner is outside any text.
        assert_eq!(img.get_pixel(63, 35).0, [10, 20, 30, 255]);

        let p = asset.path().to_path_buf();
        asset.release().unwrap();
        assert!(!p.exists());
    }

    fn lit_pixels(img: &image::RgbaImage, bg: [u8; 4]) -> Vec<(u32, u32)> {
        img.enumerate_pixels()
            .filter(|(_, _, p)| p.0 != bg)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    fn large_style() -> CaptionStyle {
        CaptionStyle {
            canvas: Canvas {
                width: 400,
                height: 160,
            },
            background: Rgba8::rgb(10, 20, 30),
            font_size_px: 20.0,
            line_height_px: 24.0,
            origin_x_px: 10.0,
            origin_y_px: 10.0,
            max_text_width_px: 300.0,
            max_lines: 5,
            load_system_fonts: false,
            ..CaptionStyle::default()
        }
    }

    #[test]
    fn glyphs_are_drawn_without_system_fonts() {
        let dir = tempfile::tempdir().unwrap();
        let r = CaptionRenderer::new(&large_style(), dir.path());
        assert!(r.font().is_fallback());

        let asset = r.render("Hello captions", 1.0).unwrap();
        let img = image::open(asset.path()).unwrap().to_rgba8();
        let lit = lit_pixels(&img, [10, 20, 30, 255]);
        assert!(lit.len() > 100, "only {} foreground pixels", lit.len());
        // Foreground is white; glyph stems are fully covered somewhere.
        assert!(img.pixels().any(|p| p.0[0] > 200 && p.0[1] > 200 && p.0[2] > 200));
    }

    #[test]
    fn wrapped_wide_glyphs_stay_inside_width_limit() {
        let dir = tempfile::tempdir().unwrap();
        let style = large_style();
        let r = CaptionRenderer::new(&style, dir.path());

        let text = vec!["WWWW"; 12].join(" ");
        let asset = r.render(&text, 1.0).unwrap();
        assert!(asset.lines().len() > 1);

        let img = image::open(asset.path()).unwrap().to_rgba8();
        let lit = lit_pixels(&img, [10, 20, 30, 255]);
        let right = lit.iter().map(|&(x, _)| x).max().unwrap();
        let limit = style.origin_x_px + style.max_text_width_px;
        assert!((right as f32) < limit, "ink reaches x={right}, limit {limit}");
    }

    #[test]
    fn unpremultiply_restores_straight_color() {
        let mut px = vec![64u8, 0, 0, 128];
        unpremultiply_rgba8_in_place(&mut px);
        assert_eq!(px, vec![128, 0, 0, 128]);
    }
}
