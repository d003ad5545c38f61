use anyhow::{Context, Result, anyhow};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::ocr::{ImageFrame, LayerError};

const TAG_X_RESOLUTION: u16 = 0x011A;
const TAG_Y_RESOLUTION: u16 = 0x011B;
const TAG_RESOLUTION_UNIT: u16 = 0x0128;
const TIFF_SHORT: u16 = 3;
const TIFF_RATIONAL: u16 = 5;

/// A scanned page as read from disk: raw bytes for upload and embedding,
/// plus the pixel size and resolution the layout math needs.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
}

impl SourceImage {
    pub fn load(path: &Path, default_dpi: f64) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))?;
        Self::from_bytes(bytes, default_dpi)
            .with_context(|| format!("unsupported image: {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>, default_dpi: f64) -> Result<Self> {
        let mime = infer::get(&bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map(|kind| kind.mime_type().to_string())
            .ok_or_else(|| anyhow!("not a recognized image format"))?;
        let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .with_context(|| "failed to detect image format")?
            .into_dimensions()
            .with_context(|| "failed to read image dimensions")?;
        let dpi = match read_resolution(&bytes) {
            Some((x, y)) if (x - y).abs() > 1e-6 => {
                return Err(LayerError::NonSquareDpi { x, y }.into());
            }
            Some((x, _)) if x > 0.0 => x,
            _ => {
                debug!("no resolution in image metadata, assuming {} dpi", default_dpi);
                default_dpi
            }
        };
        Ok(Self {
            bytes,
            mime,
            width,
            height,
            dpi,
        })
    }

    pub fn frame(&self) -> ImageFrame {
        ImageFrame {
            width: self.width,
            height: self.height,
            dpi: self.dpi,
        }
    }
}

/// Horizontal and vertical resolution in dots per inch, from JPEG EXIF
/// (preferred) or JFIF headers, or a PNG `pHYs` chunk.
pub fn read_resolution(bytes: &[u8]) -> Option<(f64, f64)> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return jpeg_resolution(bytes);
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return png_resolution(bytes);
    }
    None
}

fn jpeg_resolution(bytes: &[u8]) -> Option<(f64, f64)> {
    let mut jfif = None;
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            break;
        }
        let marker = bytes[pos + 1];
        // start of scan: no more metadata segments
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        let len = BigEndian::read_u16(&bytes[pos + 2..pos + 4]) as usize;
        let Some(payload) = bytes.get(pos + 4..pos + 2 + len) else {
            break;
        };
        match marker {
            0xE1 if payload.starts_with(b"Exif\0\0") => {
                if let Some(found) = tiff_resolution(&payload[6..]) {
                    return Some(found);
                }
            }
            0xE0 if payload.starts_with(b"JFIF\0") && jfif.is_none() => {
                jfif = jfif_resolution(&payload[5..]);
            }
            _ => {}
        }
        pos += 2 + len;
    }
    jfif
}

fn jfif_resolution(payload: &[u8]) -> Option<(f64, f64)> {
    // version (2 bytes), units, x density, y density
    let header = payload.get(..7)?;
    let x = BigEndian::read_u16(&header[3..5]) as f64;
    let y = BigEndian::read_u16(&header[5..7]) as f64;
    match header[2] {
        1 => Some((x, y)),
        2 => Some((x * 2.54, y * 2.54)),
        _ => None,
    }
}

fn tiff_resolution(tiff: &[u8]) -> Option<(f64, f64)> {
    match tiff.get(..2)? {
        b"II" => ifd0_resolution::<LittleEndian>(tiff),
        b"MM" => ifd0_resolution::<BigEndian>(tiff),
        _ => None,
    }
}

fn ifd0_resolution<B: ByteOrder>(tiff: &[u8]) -> Option<(f64, f64)> {
    let ifd = B::read_u32(tiff.get(4..8)?) as usize;
    let count = B::read_u16(tiff.get(ifd..ifd + 2)?) as usize;
    let (mut x, mut y, mut unit) = (None, None, 2u16);
    for idx in 0..count {
        let start = ifd + 2 + idx * 12;
        let entry = tiff.get(start..start + 12)?;
        let tag = B::read_u16(&entry[0..2]);
        let kind = B::read_u16(&entry[2..4]);
        match (tag, kind) {
            (TAG_X_RESOLUTION | TAG_Y_RESOLUTION, TIFF_RATIONAL) => {
                let offset = B::read_u32(&entry[8..12]) as usize;
                let rational = tiff.get(offset..offset + 8)?;
                let numerator = B::read_u32(&rational[0..4]);
                let denominator = B::read_u32(&rational[4..8]);
                if denominator == 0 {
                    continue;
                }
                let value = numerator as f64 / denominator as f64;
                if tag == TAG_X_RESOLUTION {
                    x = Some(value);
                } else {
                    y = Some(value);
                }
            }
            (TAG_RESOLUTION_UNIT, TIFF_SHORT) => unit = B::read_u16(&entry[8..10]),
            _ => {}
        }
    }
    let scale = match unit {
        2 => 1.0,
        3 => 2.54,
        _ => return None,
    };
    Some((x? * scale, y? * scale))
}

fn png_resolution(bytes: &[u8]) -> Option<(f64, f64)> {
    let mut pos = 8;
    while pos + 8 <= bytes.len() {
        let len = BigEndian::read_u32(&bytes[pos..pos + 4]) as usize;
        let kind = &bytes[pos + 4..pos + 8];
        if kind == b"IDAT" {
            break;
        }
        if kind == b"pHYs" {
            let data = bytes.get(pos + 8..pos + 8 + len)?.get(..9)?;
            // unit 1 is pixels per metre
            if data[8] != 1 {
                return None;
            }
            let x = BigEndian::read_u32(&data[0..4]) as f64 * 0.0254;
            let y = BigEndian::read_u32(&data[4..8]) as f64 * 0.0254;
            return Some((x, y));
        }
        pos += 12 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use crate::ocr::ErrorKind;

    fn exif_segment<B: ByteOrder>(magic: &[u8; 2], x: (u32, u32), y: (u32, u32), unit: u16) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(magic);
        tiff.write_u16::<B>(42).unwrap();
        tiff.write_u32::<B>(8).unwrap();
        tiff.write_u16::<B>(3).unwrap();
        // three 12-byte entries, then next-IFD offset; rationals follow at 50
        let rationals = 8 + 2 + 3 * 12 + 4;
        for (tag, offset) in [(TAG_X_RESOLUTION, rationals), (TAG_Y_RESOLUTION, rationals + 8)] {
            tiff.write_u16::<B>(tag).unwrap();
            tiff.write_u16::<B>(TIFF_RATIONAL).unwrap();
            tiff.write_u32::<B>(1).unwrap();
            tiff.write_u32::<B>(offset as u32).unwrap();
        }
        tiff.write_u16::<B>(TAG_RESOLUTION_UNIT).unwrap();
        tiff.write_u16::<B>(TIFF_SHORT).unwrap();
        tiff.write_u32::<B>(1).unwrap();
        tiff.write_u16::<B>(unit).unwrap();
        tiff.write_u16::<B>(0).unwrap();
        tiff.write_u32::<B>(0).unwrap();
        for (num, den) in [x, y] {
            tiff.write_u32::<B>(num).unwrap();
            tiff.write_u32::<B>(den).unwrap();
        }

        let mut segment = vec![0xFF, 0xE1];
        segment
            .write_u16::<BigEndian>((2 + 6 + tiff.len()) as u16)
            .unwrap();
        segment.extend_from_slice(b"Exif\0\0");
        segment.extend_from_slice(&tiff);
        segment
    }

    fn jfif_segment(units: u8, x: u16, y: u16) -> Vec<u8> {
        let mut segment = vec![0xFF, 0xE0, 0x00, 0x10];
        segment.extend_from_slice(b"JFIF\0");
        segment.extend_from_slice(&[1, 2, units]);
        segment.write_u16::<BigEndian>(x).unwrap();
        segment.write_u16::<BigEndian>(y).unwrap();
        segment.extend_from_slice(&[0, 0]);
        segment
    }

    fn jpeg_with(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        for segment in segments {
            bytes.extend_from_slice(segment);
        }
        bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
        bytes
    }

    fn small_jpeg() -> Vec<u8> {
        let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            4,
            image::Rgb([200, 180, 160]),
        ));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .unwrap();
        // clear any JFIF density the encoder wrote
        if bytes[2..4] == [0xFF, 0xE0] && &bytes[6..11] == b"JFIF\0" {
            bytes[13] = 0;
        }
        bytes
    }

    #[test]
    fn exif_resolution_is_read_in_both_byte_orders() {
        let le = jpeg_with(&[exif_segment::<LittleEndian>(b"II", (600, 1), (600, 1), 2)]);
        let be = jpeg_with(&[exif_segment::<BigEndian>(b"MM", (3000, 10), (3000, 10), 2)]);
        assert_eq!(read_resolution(&le), Some((600.0, 600.0)));
        assert_eq!(read_resolution(&be), Some((300.0, 300.0)));
    }

    #[test]
    fn centimetre_units_are_converted() {
        let exif = jpeg_with(&[exif_segment::<LittleEndian>(b"II", (100, 1), (100, 1), 3)]);
        let (x, y) = read_resolution(&exif).unwrap();
        assert!((x - 254.0).abs() < 1e-9 && (y - 254.0).abs() < 1e-9);

        let jfif = jpeg_with(&[jfif_segment(2, 100, 100)]);
        assert_eq!(read_resolution(&jfif), Some((254.0, 254.0)));
    }

    #[test]
    fn exif_wins_over_jfif() {
        let bytes = jpeg_with(&[
            jfif_segment(1, 72, 72),
            exif_segment::<LittleEndian>(b"II", (400, 1), (400, 1), 2),
        ]);
        assert_eq!(read_resolution(&bytes), Some((400.0, 400.0)));
    }

    #[test]
    fn aspect_only_jfif_has_no_resolution() {
        assert_eq!(read_resolution(&jpeg_with(&[jfif_segment(0, 1, 1)])), None);
        assert_eq!(read_resolution(b"GIF89a"), None);
    }

    #[test]
    fn png_physical_size_is_read() {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.write_u32::<BigEndian>(9).unwrap();
        bytes.extend_from_slice(b"pHYs");
        // 11811 px/m is 300 dpi
        bytes.write_u32::<BigEndian>(11811).unwrap();
        bytes.write_u32::<BigEndian>(11811).unwrap();
        bytes.push(1);
        bytes.write_u32::<BigEndian>(0).unwrap();
        let (x, _) = read_resolution(&bytes).unwrap();
        assert!((x - 300.0).abs() < 0.01);
    }

    #[test]
    fn jpeg_without_metadata_uses_the_default_dpi() {
        let source = SourceImage::from_bytes(small_jpeg(), 300.0).unwrap();
        assert_eq!(source.mime, "image/jpeg");
        assert_eq!((source.width, source.height), (8, 4));
        assert_eq!(source.frame().dpi, 300.0);
    }

    #[test]
    fn exif_dpi_is_used_and_must_be_square() {
        let jpeg = small_jpeg();
        let splice = |segment: Vec<u8>| {
            let mut bytes = jpeg[..2].to_vec();
            bytes.extend_from_slice(&segment);
            bytes.extend_from_slice(&jpeg[2..]);
            bytes
        };

        let square = splice(exif_segment::<LittleEndian>(b"II", (150, 1), (150, 1), 2));
        assert_eq!(SourceImage::from_bytes(square, 300.0).unwrap().dpi, 150.0);

        let skewed = splice(exif_segment::<LittleEndian>(b"II", (300, 1), (150, 1), 2));
        let err = SourceImage::from_bytes(skewed, 300.0).unwrap_err();
        let layer = err.downcast_ref::<LayerError>().unwrap();
        assert_eq!(layer.kind(), ErrorKind::Geometry);
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(SourceImage::from_bytes(b"%PDF-1.4".to_vec(), 300.0).is_err());
    }
}
