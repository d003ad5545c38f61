//! Everything between a recognition result and the bytes of a page: the
//! validated page model, the layout math, the PDF draw plan and hOCR.

mod engine;
mod error;
mod font;
mod hocr;
mod model;
mod render;

pub use engine::{
    FontFit, PageOrientation, TextMeasure, WordGeometry, page_from_response, pixels_to_dots,
};
pub use error::{ErrorKind, LayerError};
pub use font::{FontMetrics, glyphless_font, load_font_metrics, resolve_visible_font};
pub use hocr::{HocrPage, render_hocr};
pub use model::{DocumentText, Line, Page, PixelBox, Point, Quad, TextSegment, Token, Transform};
pub use render::{
    ComposeOptions, DrawOp, ImageFrame, ImagePlacement, PagePlan, RenderMode, TextRun,
    compose_page, plain_text,
};
