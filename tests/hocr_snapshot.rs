use ocr_text_layer::ocr::{HocrPage, page_from_response, render_hocr};
use ocr_text_layer::recognition::ProcessResponse;

#[test]
fn fixture_page_hocr() {
    let payload = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/process_response.json"
    ));
    let response: ProcessResponse = serde_json::from_str(payload).unwrap();
    let page = page_from_response(response).unwrap();
    let hocr = render_hocr(&[HocrPage {
        image_name: "scan.jpg",
        page: &page,
    }])
    .unwrap();
    insta::assert_snapshot!(hocr);
}
