use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ocr_text_layer::recognition::{ProcessResponse, RecognitionFuture, Recognizer};
use ocr_text_layer::settings::Settings;
use ocr_text_layer::{Config, run_with};

struct FixtureRecognizer {
    payload: &'static str,
    calls: AtomicUsize,
}

impl FixtureRecognizer {
    fn new(payload: &'static str) -> Self {
        Self {
            payload,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Recognizer for FixtureRecognizer {
    fn recognize<'a>(&'a self, image: &'a [u8], mime: &'a str) -> RecognitionFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            assert!(!image.is_empty());
            assert_eq!(mime, "image/jpeg");
            let response: ProcessResponse = serde_json::from_str(self.payload)?;
            Ok(response)
        })
    }
}

const FIXTURE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/process_response.json"
));

fn write_scan(dir: &Path, name: &str) -> PathBuf {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(100, 200, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            image::Rgb([250, 250, 250])
        } else {
            image::Rgb([30, 30, 30])
        }
    }));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[tokio::test]
async fn writes_every_requested_output() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_scan(dir.path(), "page-1.jpg");
    let second = write_scan(dir.path(), "page-2.jpg");
    let pdf_path = dir.path().join("out.pdf");
    let config = Config {
        inputs: vec![first.clone(), second.clone()],
        write_pdf: Some(pdf_path.clone()),
        write_hocr: true,
        write_txt: true,
        ..Config::default()
    };
    let recognizer = FixtureRecognizer::new(FIXTURE);

    let written = run_with(&config, &Settings::default(), &recognizer)
        .await
        .unwrap();

    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(written.len(), 5);
    assert_eq!(written.last(), Some(&pdf_path));

    let text = std::fs::read_to_string(dir.path().join("page-1.jpg.ocr.txt")).unwrap();
    assert_eq!(text, "Hello world\nfoo bar\n");

    let hocr = std::fs::read_to_string(dir.path().join("page-2.jpg.hocr")).unwrap();
    assert!(hocr.contains("title=\"image &quot;page-2.jpg&quot;; bbox 0 0 100 200;\""));
    assert!(hocr.contains(">Hello </span>"));

    let pdf = std::fs::read(&pdf_path).unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    assert!(dir.path().join("page-1.jpg.docai.json.gz").exists());
    assert!(dir.path().join("page-2.jpg.docai.json.gz").exists());
}

#[tokio::test]
async fn cached_results_skip_recognition() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path(), "scan.jpg");
    let config = Config {
        inputs: vec![scan],
        write_txt: true,
        ..Config::default()
    };
    let recognizer = FixtureRecognizer::new(FIXTURE);

    run_with(&config, &Settings::default(), &recognizer)
        .await
        .unwrap();
    run_with(&config, &Settings::default(), &recognizer)
        .await
        .unwrap();

    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn debug_drawing_still_produces_a_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path(), "scan.jpg");
    let pdf_path = dir.path().join("debug.pdf");
    let config = Config {
        inputs: vec![scan],
        write_pdf: Some(pdf_path.clone()),
        debug_draw: true,
        ..Config::default()
    };

    // without a configured visible font the run either finds a system font
    // or stops and asks for one; it never draws with the glyphless font
    match run_with(&config, &Settings::default(), &FixtureRecognizer::new(FIXTURE)).await {
        Ok(_) => {
            let pdf = std::fs::read(&pdf_path).unwrap();
            assert!(pdf.starts_with(b"%PDF"));
            assert!(contains(&pdf, b"0 Tr"));
            assert!(!contains(&pdf, b"3 Tr"));
        }
        Err(err) => {
            assert!(format!("{:#}", err).contains("--visible-font"), "{:#}", err);
            assert!(!pdf_path.exists());
        }
    }
}

#[tokio::test]
async fn glyphless_visible_font_is_refused_for_debug_drawing() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path(), "scan.jpg");
    let font_path = dir.path().join("GlyphLessFont.ttf");
    std::fs::write(
        &font_path,
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/GlyphLessFont.ttf")),
    )
    .unwrap();
    let config = Config {
        inputs: vec![scan],
        write_pdf: Some(dir.path().join("debug.pdf")),
        debug_draw: true,
        visible_font: Some(font_path),
        ..Config::default()
    };

    let err = run_with(&config, &Settings::default(), &FixtureRecognizer::new(FIXTURE))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("--visible-font"), "{:#}", err);
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[tokio::test]
async fn misaligned_result_aborts_before_any_pdf_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path(), "scan.jpg");
    let pdf_path = dir.path().join("out.pdf");
    // second line ends one character before its last token
    let broken: &'static str = Box::leak(
        FIXTURE
            .replacen(
                r#""startIndex": "12", "endIndex": "20""#,
                r#""startIndex": "12", "endIndex": "19""#,
                1,
            )
            .into_boxed_str(),
    );
    assert_ne!(broken, FIXTURE);
    let config = Config {
        inputs: vec![scan],
        write_pdf: Some(pdf_path.clone()),
        ..Config::default()
    };

    let err = run_with(&config, &Settings::default(), &FixtureRecognizer::new(broken))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("start or end not found exactly"));
    assert!(!pdf_path.exists());
}
