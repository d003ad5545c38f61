use super::error::LayerError;
use super::model::{Page, PixelBox, Quad};

const OCR_SYSTEM: &str = "ocr-text-layer (google document ai)";
const OCR_CAPABILITIES: &str = "ocr_page ocr_line ocrx_word";

pub struct HocrPage<'a> {
    /// File name shown in the page title, usually the image's base name.
    pub image_name: &'a str,
    pub page: &'a Page,
}

/// Renders one hOCR document with a `div.ocr_page` per input page. Word
/// and line boxes are the rounded pixel bounds of the recognized quads.
pub fn render_hocr(pages: &[HocrPage<'_>]) -> Result<String, LayerError> {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<meta name=\"ocr-system\" content=\"{}\">\n",
        escape_xml(OCR_SYSTEM)
    ));
    html.push_str(&format!(
        "<meta name=\"ocr-capabilities\" content=\"{}\">\n",
        OCR_CAPABILITIES
    ));
    html.push_str("</head>\n<body>\n");
    for entry in pages {
        render_page(&mut html, entry)?;
    }
    html.push_str("</body>\n</html>\n");
    Ok(html)
}

fn render_page(html: &mut String, entry: &HocrPage<'_>) -> Result<(), LayerError> {
    let page = entry.page;
    page.ensure_sorted()?;
    let title = format!(
        "image \"{}\"; bbox 0 0 {} {};",
        entry.image_name,
        page.width(),
        page.height()
    );
    html.push_str(&format!(
        "<div class=\"ocr_page\" title=\"{}\">\n",
        escape_xml(&title)
    ));
    let text = page.text();
    for line in page.lines() {
        let words = page.tokens_in_line(line)?;
        html.push_str(&format!(
            "<span class=\"ocr_line\" title=\"{}\">",
            bbox_title(page, &line.quad)
        ));
        for word in words {
            html.push_str(&format!(
                "<span class=\"ocrx_word\" title=\"{}\">{}</span>",
                bbox_title(page, &word.quad),
                escape_xml(text.slice(word.segment))
            ));
        }
        html.push_str("</span>\n");
    }
    html.push_str("</div>\n");
    Ok(())
}

fn bbox_title(page: &Page, quad: &Quad) -> String {
    let PixelBox {
        xmin,
        ymin,
        xmax,
        ymax,
    } = quad.pixel_bounds(page.width(), page.height());
    format!("bbox {} {} {} {}", xmin, ymin, xmax, ymax)
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
