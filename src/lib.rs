use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pdf;
pub mod recognition;
pub mod settings;

use ocr::{
    ComposeOptions, FontMetrics, HocrPage, compose_page, page_from_response, plain_text, render_hocr,
};
use pdf::{PdfAssembler, SourceImage};
use recognition::{DocumentAiClient, RecognitionFuture, Recognizer, cache};
use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    /// One PDF with a page per input, in input order.
    pub write_pdf: Option<PathBuf>,
    /// `<image>.hocr` next to every input.
    pub write_hocr: bool,
    /// `<image>.ocr.txt` next to every input.
    pub write_txt: bool,
    pub debug_draw: bool,
    pub settings_path: Option<String>,
    pub font: Option<PathBuf>,
    pub visible_font: Option<PathBuf>,
}

/// Processes every input and returns the paths written, in order.
pub async fn run(config: Config) -> Result<Vec<PathBuf>> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let needs_service = config
        .inputs
        .iter()
        .any(|input| !paths::cache_path(input).exists());
    if needs_service {
        let client = DocumentAiClient::new(settings.recognition_config())?;
        run_with(&config, &settings, &client).await
    } else {
        run_with(&config, &settings, &CacheOnly).await
    }
}

pub async fn run_with<R: Recognizer + ?Sized>(
    config: &Config,
    settings: &Settings,
    recognizer: &R,
) -> Result<Vec<PathBuf>> {
    if config.inputs.is_empty() {
        return Err(anyhow!("no input images"));
    }
    if config.write_pdf.is_none() && !config.write_hocr && !config.write_txt {
        warn!("no output selected; only the recognition cache is updated");
    }

    let mut pdf = match &config.write_pdf {
        Some(path) => {
            let font = layer_font(config, settings)?;
            let title = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "ocr".to_string());
            Some((PdfAssembler::new(title, font.clone()), font))
        }
        None => None,
    };

    let mut written = Vec::new();
    for input in &config.inputs {
        let pdf = pdf
            .as_mut()
            .map(|(assembler, font)| (assembler, &*font));
        let outputs = process_image(input, config, settings, recognizer, pdf).await?;
        written.extend(outputs);
    }

    if let (Some(path), Some((assembler, _))) = (&config.write_pdf, pdf) {
        let pages = assembler.page_count();
        let bytes = assembler.finish()?;
        fs::write(path, bytes).with_context(|| format!("failed to write pdf: {}", path.display()))?;
        info!("wrote {} page pdf to {}", pages, path.display());
        written.push(path.clone());
    }
    Ok(written)
}

/// Recognizes (or loads from cache) one image and writes the per-image
/// outputs; the PDF page, if any, goes into `pdf`.
pub async fn process_image<R: Recognizer + ?Sized>(
    path: &Path,
    config: &Config,
    settings: &Settings,
    recognizer: &R,
    pdf: Option<(&mut PdfAssembler, &FontMetrics)>,
) -> Result<Vec<PathBuf>> {
    let source = SourceImage::load(path, settings.default_dpi)?;
    let response = cache::load_or_recognize(recognizer, path, &source.bytes, &source.mime).await?;
    let page = page_from_response(response)
        .with_context(|| format!("unusable recognition result for {}", path.display()))?;
    let mut written = Vec::new();

    if config.write_txt {
        let txt_path = paths::text_path(path);
        fs::write(&txt_path, plain_text(&page))
            .with_context(|| format!("failed to write text: {}", txt_path.display()))?;
        info!("wrote txt to {}", txt_path.display());
        written.push(txt_path);
    }

    if config.write_hocr {
        let image_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hocr = render_hocr(&[HocrPage {
            image_name: &image_name,
            page: &page,
        }])?;
        let hocr_path = paths::hocr_path(path);
        fs::write(&hocr_path, hocr)
            .with_context(|| format!("failed to write hocr: {}", hocr_path.display()))?;
        info!("wrote hocr to {}", hocr_path.display());
        written.push(hocr_path);
    }

    if let Some((assembler, font)) = pdf {
        let options = ComposeOptions {
            debug: config.debug_draw,
            debug_image_opacity: settings.debug_image_opacity,
        };
        let plan = compose_page(&page, &source.frame(), font, &options)
            .with_context(|| format!("failed to lay out {}", path.display()))?;
        assembler.add_page(&plan, &source)?;
    }

    info!("processed {}", path.display());
    Ok(written)
}

/// The font embedded for the text layer. `--debug-draw` draws the text
/// visibly and needs a font with real glyphs; otherwise the configured
/// invisible font or the bundled glyphless one.
fn layer_font(config: &Config, settings: &Settings) -> Result<FontMetrics> {
    let font = if config.debug_draw {
        let visible = config
            .visible_font
            .as_deref()
            .or(settings.visible_font.as_deref());
        ocr::resolve_visible_font(visible)?
    } else {
        match config.font.as_ref().or(settings.invisible_font.as_ref()) {
            Some(path) => ocr::load_font_metrics(path)?,
            None => ocr::glyphless_font()?,
        }
    };
    info!(
        "text layer font: {}",
        font.name().unwrap_or(if font.is_glyphless() { "glyphless" } else { "unnamed" })
    );
    Ok(font)
}

/// Used when every input already has a cached result, so no service
/// identity is required.
struct CacheOnly;

impl Recognizer for CacheOnly {
    fn recognize<'a>(&'a self, _image: &'a [u8], _mime: &'a str) -> RecognitionFuture<'a> {
        Box::pin(async {
            Err::<recognition::ProcessResponse, _>(anyhow!(
                "no cached recognition result and no service configured"
            ))
        })
    }
}
