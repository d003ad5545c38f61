use tracing::debug;

use super::engine::{FontFit, PageOrientation, TextMeasure, WordGeometry, pixels_to_dots};
use super::error::LayerError;
use super::model::{Page, Point};

#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    /// Draw word outlines and visible text over a faded image.
    pub debug: bool,
    pub debug_image_opacity: f64,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            debug: false,
            debug_image_opacity: 0.3,
        }
    }
}

/// The physical source image: pixel size before any page transform, and
/// its resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
}

/// Where the source image is drawn, in dots with the origin at the bottom
/// left of the page. The image rotates counter-clockwise about `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Invisible,
    Fill,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Counter-clockwise, radians.
    pub angle: f64,
    pub size: f64,
    pub horizontal_scale: f64,
    pub mode: RenderMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Closed polygon through the word's corners, in page dots.
    Outline([Point; 4]),
    Text(TextRun),
}

/// Everything needed to draw one PDF page, in drawing order.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub width: f64,
    pub height: f64,
    pub image: ImagePlacement,
    pub ops: Vec<DrawOp>,
}

pub fn compose_page<M: TextMeasure + ?Sized>(
    page: &Page,
    frame: &ImageFrame,
    measure: &M,
    options: &ComposeOptions,
) -> Result<PagePlan, LayerError> {
    let dots = |pixels: f64| pixels_to_dots(pixels, frame.dpi);
    let width = dots(page.width() as f64);
    let height = dots(page.height() as f64);

    let orientation = PageOrientation::resolve(page.transform(), frame.height);
    let image = ImagePlacement {
        x: dots(orientation.x),
        y: height - dots(orientation.y),
        width: dots(frame.width as f64),
        height: dots(frame.height as f64),
        rotation: orientation.rotation,
        opacity: if options.debug {
            options.debug_image_opacity
        } else {
            1.0
        },
    };
    let mode = if options.debug {
        RenderMode::Fill
    } else {
        RenderMode::Invisible
    };

    let text = page.text();
    let mut ops = Vec::new();
    for line in page.lines() {
        let words = page.tokens_in_line(line)?;
        for (idx, word) in words.iter().enumerate() {
            let mut raw = text.slice(word.segment);
            if idx + 1 == words.len() {
                raw = raw
                    .strip_suffix('\n')
                    .ok_or_else(|| LayerError::MissingLineBreak {
                        range: line.segment.label(),
                        text: raw.to_string(),
                    })?;
            }
            let corners = word.quad.corners();
            if options.debug {
                ops.push(DrawOp::Outline(
                    corners.map(|corner| Point::new(corner.x * width, height - corner.y * height)),
                ));
            }
            let geometry = WordGeometry::from_quad(&word.quad, width, height);
            let Some(fit) = FontFit::compute(measure, raw, &geometry) else {
                debug!("skipping word {:?} at {}: no measurable width", raw, word.segment.label());
                continue;
            };
            debug!(
                "word {:?}: angle {:.2}°, size {:.2}, scale {:.1}%",
                raw,
                geometry.angle.to_degrees(),
                fit.size,
                fit.horizontal_scale
            );
            let anchor = word.quad.bottom_left();
            ops.push(DrawOp::Text(TextRun {
                text: raw.to_string(),
                x: anchor.x * width,
                y: height - anchor.y * height,
                angle: geometry.angle,
                size: fit.size,
                horizontal_scale: fit.horizontal_scale,
                mode,
            }));
        }
    }

    Ok(PagePlan {
        width,
        height,
        image,
        ops,
    })
}

/// The recognized text exactly as the service returned it.
pub fn plain_text(page: &Page) -> &str {
    page.text().as_str()
}
