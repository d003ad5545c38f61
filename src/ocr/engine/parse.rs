use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use byteorder::{ByteOrder, LittleEndian};

use crate::ocr::error::LayerError;
use crate::ocr::model::{DocumentText, Line, Page, Point, Quad, TextSegment, Token, Transform};
use crate::recognition::{
    ProcessResponse, WireBytes, WireElement, WireMatrix, WireOffset, WirePage, WireTextSegment,
};

// OpenCV element type for 64-bit floats
const CV_64F: i32 = 6;

/// Validates a recognition result and converts it into a [`Page`].
///
/// This is the only place wire-level optionality is resolved; everything
/// after it works on the typed model.
pub fn page_from_response(response: ProcessResponse) -> Result<Page, LayerError> {
    let document = response.document.ok_or(LayerError::PageCount(0))?;
    if document.pages.len() != 1 {
        return Err(LayerError::PageCount(document.pages.len()));
    }
    let text = document
        .text
        .filter(|text| !text.is_empty())
        .ok_or(LayerError::EmptyText)?;
    let Some(page) = document.pages.into_iter().next() else {
        return Err(LayerError::PageCount(0));
    };
    let text = DocumentText::new(text);

    let dimensions = page_dimensions(&page)?;
    let transform = match page.transforms.as_slice() {
        [] => None,
        [matrix] => Some(parse_transform(matrix)?),
        many => return Err(LayerError::TransformCount(many.len())),
    };

    let wire_lines = page.lines.ok_or(LayerError::MissingLines)?;
    let lines = wire_lines
        .iter()
        .enumerate()
        .map(|(idx, element)| {
            let what = format!("line {}", idx);
            Ok(Line {
                segment: parse_segment(&text, element, &what)?,
                quad: parse_quad(element, &what)?,
            })
        })
        .collect::<Result<Vec<_>, LayerError>>()?;
    let tokens = page
        .tokens
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(idx, element)| {
            let what = format!("token {}", idx);
            Ok(Token {
                segment: parse_segment(&text, element, &what)?,
                quad: parse_quad(element, &what)?,
            })
        })
        .collect::<Result<Vec<_>, LayerError>>()?;

    Page::new(text, lines, tokens, dimensions, transform)
}

fn page_dimensions(page: &WirePage) -> Result<(u32, u32), LayerError> {
    let from_image = page
        .image
        .as_ref()
        .and_then(|image| image.width.zip(image.height));
    let from_dimension = page
        .dimension
        .as_ref()
        .filter(|dimension| dimension.unit.as_deref().is_none_or(|unit| unit == "pixels"))
        .map(|dimension| (dimension.width.round() as u32, dimension.height.round() as u32));
    match from_image.or(from_dimension) {
        Some((width, height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(LayerError::MissingDimensions),
    }
}

fn parse_segment(
    text: &DocumentText,
    element: &WireElement,
    what: &str,
) -> Result<TextSegment, LayerError> {
    let segments = element
        .layout
        .as_ref()
        .and_then(|layout| layout.text_anchor.as_ref())
        .map(|anchor| anchor.text_segments.as_slice())
        .unwrap_or_default();
    let [segment] = segments else {
        return Err(LayerError::SegmentCount {
            what: what.to_string(),
            found: segments.len(),
        });
    };
    let WireTextSegment {
        start_index,
        end_index,
    } = segment;
    // proto3 JSON leaves out zero values, so a missing start is offset 0
    let start = match start_index {
        Some(offset) => parse_offset(offset, what)?,
        None => 0,
    };
    let end = match end_index {
        Some(offset) => parse_offset(offset, what)?,
        None => {
            return Err(LayerError::MissingOffset {
                what: what.to_string(),
                field: "endIndex",
            });
        }
    };
    let out_of_range = || LayerError::SegmentOutOfRange {
        what: what.to_string(),
        start,
        end,
        len: text.char_count(),
    };
    let byte_start = text.byte_offset(start).ok_or_else(out_of_range)?;
    let byte_end = text.byte_offset(end).ok_or_else(out_of_range)?;
    if byte_start > byte_end {
        return Err(out_of_range());
    }
    Ok(TextSegment::new(byte_start, byte_end))
}

fn parse_offset(offset: &WireOffset, what: &str) -> Result<usize, LayerError> {
    let invalid = |value: String| LayerError::InvalidOffset {
        what: what.to_string(),
        value,
    };
    match offset {
        WireOffset::Number(value) => usize::try_from(*value).map_err(|_| invalid(value.to_string())),
        WireOffset::Text(value) => value.trim().parse().map_err(|_| invalid(value.clone())),
    }
}

fn parse_quad(element: &WireElement, what: &str) -> Result<Quad, LayerError> {
    let vertices = element
        .layout
        .as_ref()
        .and_then(|layout| layout.bounding_poly.as_ref())
        .map(|poly| poly.normalized_vertices.as_slice())
        .filter(|vertices| !vertices.is_empty())
        .ok_or_else(|| LayerError::MissingQuad {
            what: what.to_string(),
        })?;
    let [tl, tr, br, bl] = vertices else {
        return Err(LayerError::QuadCorners {
            what: what.to_string(),
            found: vertices.len(),
        });
    };
    Ok(Quad::new(
        [tl, tr, br, bl].map(|vertex| Point::new(vertex.x, vertex.y)),
    ))
}

pub(crate) fn parse_transform(matrix: &WireMatrix) -> Result<Transform, LayerError> {
    if matrix.kind != Some(CV_64F) {
        return Err(LayerError::TransformType(matrix.kind));
    }
    if matrix.rows != Some(2) || matrix.cols != Some(3) {
        return Err(LayerError::TransformShape {
            rows: matrix.rows,
            cols: matrix.cols,
        });
    }
    let bytes = match &matrix.data {
        Some(WireBytes::Base64(encoded)) => BASE64
            .decode(encoded.trim())
            .map_err(|err| LayerError::TransformData(err.to_string()))?,
        Some(WireBytes::Buffer { data }) => data.clone(),
        None => return Err(LayerError::TransformData("no data".to_string())),
    };
    if bytes.len() != 6 * 8 {
        return Err(LayerError::TransformData(format!(
            "expected 48 bytes, found {}",
            bytes.len()
        )));
    }
    let mut values = [0f64; 6];
    LittleEndian::read_f64_into(&bytes, &mut values);
    Ok(Transform::from_row_major(values))
}
