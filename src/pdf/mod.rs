//! Serializes [`PagePlan`]s into one multi-page PDF with `printpdf`.

mod source;

pub use source::{SourceImage, read_resolution};

use anyhow::{Context, Result, anyhow};
use printpdf::image_crate::DynamicImage;
use printpdf::{
    Color, Image, ImageRotation, ImageTransform, IndirectFontRef, Line as PdfLine, Mm,
    PdfDocument, PdfDocumentReference, PdfLayerReference, Point as PdfPoint, Pt, Px, Rgb,
    TextMatrix, TextRenderingMode,
};
use std::io::{BufWriter, Cursor};
use tracing::debug;

use crate::ocr::{DrawOp, FontMetrics, ImagePlacement, PagePlan, RenderMode, TextRun};

const CREATOR: &str = "ocr-text-layer";

/// Collects pages in the order they are added. The document is created
/// with the first page, so an assembler that never received a page has
/// nothing to write.
pub struct PdfAssembler {
    title: String,
    font: FontMetrics,
    document: Option<(PdfDocumentReference, IndirectFontRef)>,
    pages: usize,
}

impl PdfAssembler {
    /// `font` is embedded once and used for every word on every page.
    pub fn new(title: impl Into<String>, font: FontMetrics) -> Self {
        Self {
            title: title.into(),
            font,
            document: None,
            pages: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    pub fn add_page(&mut self, plan: &PagePlan, source: &SourceImage) -> Result<()> {
        let width = Mm(dots_to_mm(plan.width));
        let height = Mm(dots_to_mm(plan.height));
        let layer_name = format!("Page {}", self.pages + 1);
        let layer = match &self.document {
            Some((doc, _)) => {
                let (page, layer) = doc.add_page(width, height, layer_name);
                doc.get_page(page).get_layer(layer)
            }
            None => {
                let (doc, page, layer) = PdfDocument::new(&self.title, width, height, layer_name);
                let doc = doc.with_creator(CREATOR);
                let font = doc
                    .add_external_font(Cursor::new(self.font.data()))
                    .map_err(|err| anyhow!("failed to embed font: {:?}", err))?;
                let layer = doc.get_page(page).get_layer(layer);
                self.document = Some((doc, font));
                layer
            }
        };
        let font = match &self.document {
            Some((_, font)) => font.clone(),
            None => return Err(anyhow!("pdf document was not created")),
        };

        draw_image(&layer, &plan.image, source)?;
        for op in &plan.ops {
            match op {
                DrawOp::Outline(corners) => draw_outline(&layer, corners),
                DrawOp::Text(run) => draw_text(&layer, run, &font),
            }
        }
        self.pages += 1;
        debug!("added pdf page {} ({} draw ops)", self.pages, plan.ops.len());
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        let (doc, _) = self
            .document
            .ok_or_else(|| anyhow!("no pages to write"))?;
        let mut buffer = Vec::new();
        {
            let mut writer = BufWriter::new(&mut buffer);
            doc.save(&mut writer)
                .map_err(|err| anyhow!("{:?}", err))
                .with_context(|| "failed to write pdf")?;
        }
        Ok(buffer)
    }
}

fn draw_image(
    layer: &PdfLayerReference,
    placement: &ImagePlacement,
    source: &SourceImage,
) -> Result<()> {
    let decoded = printpdf::image_crate::load_from_memory(&source.bytes)
        .with_context(|| "failed to decode image for pdf")?;
    let decoded = if placement.opacity < 1.0 {
        fade_toward_white(decoded, placement.opacity)
    } else {
        decoded
    };
    let rotate = (placement.rotation != 0.0).then(|| ImageRotation {
        angle_ccw_degrees: placement.rotation.to_degrees() as f32,
        rotation_center_x: Px(0),
        rotation_center_y: Px(0),
    });
    // at 72 dpi one pixel is one dot, so the scale is dots per pixel
    let transform = ImageTransform {
        translate_x: Some(Mm(dots_to_mm(placement.x))),
        translate_y: Some(Mm(dots_to_mm(placement.y))),
        rotate,
        scale_x: Some((placement.width / source.width.max(1) as f64) as f32),
        scale_y: Some((placement.height / source.height.max(1) as f64) as f32),
        dpi: Some(72.0),
    };
    Image::from_dynamic_image(&decoded).add_to_layer(layer.clone(), transform);
    Ok(())
}

fn draw_outline(layer: &PdfLayerReference, corners: &[crate::ocr::Point; 4]) {
    layer.save_graphics_state();
    layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 1.0, 0.0, None)));
    layer.set_outline_thickness(1.0);
    layer.add_line(PdfLine {
        points: corners
            .iter()
            .map(|corner| {
                (
                    PdfPoint::new(Mm(dots_to_mm(corner.x)), Mm(dots_to_mm(corner.y))),
                    false,
                )
            })
            .collect(),
        is_closed: true,
    });
    layer.restore_graphics_state();
}

fn draw_text(layer: &PdfLayerReference, run: &TextRun, font: &IndirectFontRef) {
    layer.begin_text_section();
    layer.set_text_rendering_mode(match run.mode {
        RenderMode::Invisible => TextRenderingMode::Invisible,
        RenderMode::Fill => TextRenderingMode::Fill,
    });
    if run.mode == RenderMode::Fill {
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }
    layer.set_font(font, run.size as f32);
    layer.set_text_scaling(run.horizontal_scale as f32);
    layer.set_text_matrix(TextMatrix::TranslateRotate(
        Pt(run.x as f32),
        Pt(run.y as f32),
        run.angle.to_degrees() as f32,
    ));
    layer.write_text(run.text.clone(), font);
    layer.end_text_section();
}

/// Blends the image over white, which is what drawing it with `opacity`
/// onto a blank page looks like.
fn fade_toward_white(image: DynamicImage, opacity: f64) -> DynamicImage {
    let opacity = opacity.clamp(0.0, 1.0);
    let mut rgb = image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let ink = (255 - *channel) as f64 * opacity;
            *channel = 255 - ink.round() as u8;
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

fn dots_to_mm(dots: f64) -> f32 {
    (dots * 25.4 / 72.0) as f32
}
