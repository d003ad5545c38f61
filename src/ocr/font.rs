use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{Face, GlyphId};
use usvg::fontdb;

use super::engine::TextMeasure;

static GLYPHLESS_FONT: &[u8] = include_bytes!("../../assets/GlyphLessFont.ttf");

// tried in order before the generic sans-serif family
const VISIBLE_FONT_FAMILIES: &[&str] = &["Noto Sans", "DejaVu Sans", "Liberation Sans", "Arial"];

/// A parsed TrueType face plus the raw bytes, so the same font can be both
/// measured and embedded into the PDF.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    name: Option<String>,
    glyphless: bool,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("name", &self.name)
            .field("units_per_em", &self.units_per_em)
            .field("ascender", &self.ascender)
            .field("descender", &self.descender)
            .finish()
    }
}

impl FontMetrics {
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        Self::from_face(data, 0)
    }

    /// `face_index` selects a face inside a TrueType collection.
    pub fn from_face(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|err| anyhow!("failed to parse font data ({})", err))?;
        let units_per_em = face.units_per_em().max(1);
        let (mut ascender, mut descender) = (face.ascender(), face.descender());
        if ascender == 0 && descender == 0 {
            let bbox = face.global_bounding_box();
            ascender = bbox.y_max;
            descender = bbox.y_min;
        }
        if ascender <= descender {
            return Err(anyhow!(
                "font has no vertical extent (ascender {}, descender {})",
                ascender,
                descender
            ));
        }
        let name = face
            .names()
            .into_iter()
            .find(|name| name.name_id == ttf_parser::name_id::FULL_NAME)
            .and_then(|name| name.to_string());
        let glyphless = data.as_slice() == GLYPHLESS_FONT;
        Ok(Self {
            data: Arc::new(data),
            face_index,
            units_per_em,
            ascender,
            descender,
            name,
            glyphless,
        })
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// True for the bundled font, whose glyphs draw nothing.
    pub fn is_glyphless(&self) -> bool {
        self.glyphless
    }

    /// Advance of `text` in font units. Characters the font does not map use
    /// the advance of glyph 0.
    fn advance_units(&self, text: &str) -> u32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return 0;
        };
        let fallback = face.glyph_hor_advance(GlyphId(0)).unwrap_or(0);
        text.chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .unwrap_or(fallback) as u32
            })
            .fold(0u32, u32::saturating_add)
    }
}

impl TextMeasure for FontMetrics {
    fn size_at_height(&self, height: f64) -> f64 {
        let extent = (self.ascender as f64) - (self.descender as f64);
        height * self.units_per_em as f64 / extent
    }

    fn width_of_text(&self, text: &str, size: f64) -> f64 {
        self.advance_units(text) as f64 * size / self.units_per_em as f64
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    FontMetrics::from_data(data).with_context(|| format!("failed to parse font: {}", path.display()))
}

/// The bundled font whose glyphs draw nothing. Each BMP character maps to its
/// own empty glyph, so the embedded text still extracts, and every glyph
/// advances one em.
pub fn glyphless_font() -> Result<FontMetrics> {
    FontMetrics::from_data(GLYPHLESS_FONT.to_vec())
}

/// A font that actually draws, for text rendered visibly. `path` wins;
/// otherwise the installed system fonts are searched.
pub fn resolve_visible_font(path: Option<&Path>) -> Result<FontMetrics> {
    if let Some(path) = path {
        let font = load_font_metrics(path)?;
        if font.is_glyphless() {
            return Err(anyhow!(
                "{} has no visible glyphs; pass a real font with --visible-font",
                path.display()
            ));
        }
        return Ok(font);
    }
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    system_visible_font(&db)
}

fn system_visible_font(db: &fontdb::Database) -> Result<FontMetrics> {
    let named = VISIBLE_FONT_FAMILIES
        .iter()
        .map(|family| fontdb::Family::Name(*family));
    for family in named.chain(std::iter::once(fontdb::Family::SansSerif)) {
        let query = fontdb::Query {
            families: &[family],
            ..Default::default()
        };
        let Some(id) = db.query(&query) else {
            continue;
        };
        let Some((data, index)) = db.with_face_data(id, |data, index| (data.to_vec(), index)) else {
            continue;
        };
        if let Ok(font) = FontMetrics::from_face(data, index) {
            return Ok(font);
        }
    }
    Err(anyhow!(
        "no visible font found for --debug-draw; pass --visible-font or set [fonts] visible"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyphless_font_advances_one_em_per_character() {
        let font = glyphless_font().unwrap();
        assert_eq!(font.units_per_em(), 2048);
        assert!((font.width_of_text("abc", 10.0) - 30.0).abs() < 1e-9);
        assert!((font.width_of_text("ünï", 10.0) - 30.0).abs() < 1e-9);
        assert_eq!(font.width_of_text("", 10.0), 0.0);
    }

    #[test]
    fn glyphless_font_maps_characters_to_distinct_glyphs() {
        let font = glyphless_font().unwrap();
        let face = Face::parse(font.data(), 0).unwrap();
        let ids = ['A', 'b', 'Ü', '世']
            .map(|ch| face.glyph_index(ch).map(|glyph| glyph.0).unwrap_or(0));
        assert!(ids.iter().all(|id| *id != 0), "{:?}", ids);
        assert_eq!(ids[0], 'A' as u16 - 0x20 + 1);
        assert!(ids.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn glyphless_font_size_spans_ascender_to_descender() {
        let font = glyphless_font().unwrap();
        let size = font.size_at_height(3969.0);
        assert!((size - 2048.0).abs() < 1e-9);
    }

    #[test]
    fn only_the_bundled_font_is_glyphless() {
        assert!(glyphless_font().unwrap().is_glyphless());
    }

    #[test]
    fn empty_font_database_names_the_flag() {
        let err = system_visible_font(&fontdb::Database::new()).unwrap_err();
        assert!(err.to_string().contains("--visible-font"), "{}", err);
    }

    #[test]
    fn glyphless_file_is_refused_as_visible_font() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GlyphLessFont.ttf");
        std::fs::write(&path, GLYPHLESS_FONT).unwrap();
        let err = resolve_visible_font(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("--visible-font"), "{}", err);
    }

    #[test]
    fn system_visible_font_is_never_glyphless() {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if let Ok(font) = system_visible_font(&db) {
            assert!(!font.is_glyphless());
        }
    }

    #[test]
    fn garbage_is_not_a_font() {
        assert!(FontMetrics::from_data(b"not a font".to_vec()).is_err());
    }
}
