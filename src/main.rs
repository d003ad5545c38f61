use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "ocr-text-layer",
    version,
    about = "Add a searchable text layer to scanned page images using Google Document AI"
)]
struct Cli {
    /// Page images, one PDF page each, in this order
    #[arg(required = true, value_name = "IMAGE")]
    inputs: Vec<PathBuf>,

    /// Write all pages into one PDF file
    #[arg(long = "write-pdf", value_name = "FILE")]
    write_pdf: Option<PathBuf>,

    /// Write an hOCR file per input image, named <image>.hocr
    #[arg(long = "write-hocr")]
    write_hocr: bool,

    /// Write the recognized text per input image, named <image>.ocr.txt
    #[arg(long = "write-txt")]
    write_txt: bool,

    /// Draw word outlines and visible text over a faded image
    #[arg(long = "debug-draw")]
    debug_draw: bool,

    /// TrueType font for the invisible text layer (default: bundled glyphless font)
    #[arg(long = "font", value_name = "TTF")]
    font: Option<PathBuf>,

    /// TrueType font used by --debug-draw
    #[arg(long = "visible-font", value_name = "TTF")]
    visible_font: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_text_layer::logging::init(cli.verbose)?;

    ocr_text_layer::run(ocr_text_layer::Config {
        inputs: cli.inputs,
        write_pdf: cli.write_pdf,
        write_hocr: cli.write_hocr,
        write_txt: cli.write_txt,
        debug_draw: cli.debug_draw,
        settings_path: cli.read_settings,
        font: cli.font,
        visible_font: cli.visible_font,
    })
    .await?;
    Ok(())
}
