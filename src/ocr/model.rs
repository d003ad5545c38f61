use serde::Serialize;

use super::engine::index::{ensure_sorted, tokens_in_line};
use super::error::LayerError;

/// Half-open byte range into a [`DocumentText`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    pub start: usize,
    pub end: usize,
}

impl TextSegment {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// The recognized text of a page. Lines and tokens only ever hold
/// [`TextSegment`]s into it; substrings are materialized at render time.
#[derive(Debug, Clone)]
pub struct DocumentText {
    text: String,
    // byte offset of every char, plus the total length; None for ASCII text
    char_offsets: Option<Vec<usize>>,
}

impl DocumentText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let char_offsets = if text.is_ascii() {
            None
        } else {
            let mut offsets = text.char_indices().map(|(idx, _)| idx).collect::<Vec<_>>();
            offsets.push(text.len());
            Some(offsets)
        };
        Self { text, char_offsets }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_count(&self) -> usize {
        match &self.char_offsets {
            Some(offsets) => offsets.len() - 1,
            None => self.text.len(),
        }
    }

    /// Converts a code-point index (as reported by the recognition service)
    /// into a byte offset. `char_count()` maps to the end of the text.
    pub fn byte_offset(&self, char_index: usize) -> Option<usize> {
        match &self.char_offsets {
            Some(offsets) => offsets.get(char_index).copied(),
            None => (char_index <= self.text.len()).then_some(char_index),
        }
    }

    pub fn slice(&self, segment: TextSegment) -> &str {
        self.text.get(segment.start..segment.end).unwrap_or_default()
    }

    pub(crate) fn check_segment(&self, segment: TextSegment, what: &str) -> Result<(), LayerError> {
        let fits = segment.start <= segment.end
            && segment.end <= self.text.len()
            && self.text.is_char_boundary(segment.start)
            && self.text.is_char_boundary(segment.end);
        if fits {
            Ok(())
        } else {
            Err(LayerError::SegmentOutOfRange {
                what: what.to_string(),
                start: segment.start,
                end: segment.end,
                len: self.char_count(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Axis-aligned pixel box as written into hOCR `bbox` properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

/// Four corners in normalized page coordinates, ordered top-left,
/// top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quad {
    corners: [Point; 4],
}

impl Quad {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[3]
    }

    pub fn scaled(&self, width: f64, height: f64) -> [Point; 4] {
        self.corners.map(|corner| Point::new(corner.x * width, corner.y * height))
    }

    pub fn pixel_bounds(&self, width: u32, height: u32) -> PixelBox {
        let xs = self.corners.map(|corner| (corner.x * width as f64).round() as i64);
        let ys = self.corners.map(|corner| (corner.y * height as f64).round() as i64);
        PixelBox {
            xmin: xs.iter().copied().min().unwrap_or(0),
            ymin: ys.iter().copied().min().unwrap_or(0),
            xmax: xs.iter().copied().max().unwrap_or(0),
            ymax: ys.iter().copied().max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub segment: TextSegment,
    pub quad: Quad,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub segment: TextSegment,
    pub quad: Quad,
}

/// Affine map from page coordinates into source image pixels,
/// `[[a, b, c], [d, e, f]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub matrix: [[f64; 3]; 2],
}

impl Transform {
    pub fn new(matrix: [[f64; 3]; 2]) -> Self {
        Self { matrix }
    }

    pub fn from_row_major(values: [f64; 6]) -> Self {
        Self::new([
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
        ])
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [[a, b, c], [d, e, f]] = self.matrix;
        (a * x + b * y + c, d * x + e * y + f)
    }

    pub fn rotation(&self) -> f64 {
        -(-self.matrix[0][1]).atan2(self.matrix[0][0])
    }
}

/// One recognized page: the validated form of a recognition result.
#[derive(Debug, Clone)]
pub struct Page {
    text: DocumentText,
    lines: Vec<Line>,
    tokens: Vec<Token>,
    width: u32,
    height: u32,
    transform: Option<Transform>,
}

impl Page {
    pub fn new(
        text: DocumentText,
        lines: Vec<Line>,
        tokens: Vec<Token>,
        (width, height): (u32, u32),
        transform: Option<Transform>,
    ) -> Result<Self, LayerError> {
        if text.is_empty() {
            return Err(LayerError::EmptyText);
        }
        if width == 0 || height == 0 {
            return Err(LayerError::MissingDimensions);
        }
        for (idx, line) in lines.iter().enumerate() {
            text.check_segment(line.segment, &format!("line {}", idx))?;
        }
        for (idx, token) in tokens.iter().enumerate() {
            text.check_segment(token.segment, &format!("token {}", idx))?;
        }
        let page = Self {
            text,
            lines,
            tokens,
            width,
            height,
            transform,
        };
        page.ensure_sorted()?;
        Ok(page)
    }

    pub fn text(&self) -> &DocumentText {
        &self.text
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn ensure_sorted(&self) -> Result<(), LayerError> {
        ensure_sorted(&self.lines, "lines", |line| line.segment.start)?;
        ensure_sorted(&self.tokens, "tokens", |token| token.segment.start)
    }

    pub fn tokens_in_line(&self, line: &Line) -> Result<&[Token], LayerError> {
        tokens_in_line(&self.text, line.segment, &self.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_offsets_follow_code_points() {
        let text = DocumentText::new("año x\n");
        assert_eq!(text.char_count(), 6);
        assert_eq!(text.byte_offset(2), Some(3));
        assert_eq!(text.byte_offset(6), Some(7));
        assert_eq!(text.byte_offset(7), None);
        assert_eq!(text.slice(TextSegment::new(0, 4)), "año");
    }

    #[test]
    fn segment_inside_a_character_is_rejected() {
        let text = DocumentText::new("año");
        let err = text
            .check_segment(TextSegment::new(0, 2), "token 0")
            .unwrap_err();
        assert_eq!(err.kind(), crate::ocr::ErrorKind::MalformedSegment);
    }

    #[test]
    fn pixel_bounds_round_the_axis_aligned_extent() {
        let quad = Quad::new([
            Point::new(0.104, 0.1),
            Point::new(0.5, 0.098),
            Point::new(0.506, 0.15),
            Point::new(0.1, 0.152),
        ]);
        let bounds = quad.pixel_bounds(100, 200);
        assert_eq!(
            bounds,
            PixelBox {
                xmin: 10,
                ymin: 20,
                xmax: 51,
                ymax: 30
            }
        );
    }

    #[test]
    fn transform_maps_points_and_reports_rotation() {
        let transform = Transform::from_row_major([0.0, -1.0, 200.0, 1.0, 0.0, 0.0]);
        assert_eq!(transform.apply(0.0, 100.0), (100.0, 0.0));
        assert!((transform.rotation() + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn zero_sized_page_is_rejected() {
        let err = Page::new(DocumentText::new("a\n"), vec![], vec![], (0, 10), None).unwrap_err();
        assert_eq!(err.kind(), crate::ocr::ErrorKind::Geometry);
    }
}
