use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use crate::ocr::model::{Quad, Transform};

pub fn pixels_to_dots(pixels: f64, dpi: f64) -> f64 {
    pixels / dpi * 72.0
}

/// Orientation and printed extent of one word, in dots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WordGeometry {
    /// Counter-clockwise text rotation in radians.
    pub angle: f64,
    pub length: f64,
    pub height: f64,
}

impl WordGeometry {
    /// `page_width`/`page_height` are the page size in dots; the quad is
    /// scaled in image orientation (y grows downwards).
    pub fn from_quad(quad: &Quad, page_width: f64, page_height: f64) -> Self {
        let [tl, tr, br, bl] = quad.scaled(page_width, page_height);
        let left = tl.midpoint(bl);
        let right = tr.midpoint(br);
        let (dx, dy) = (right.x - left.x, right.y - left.y);
        // arguments swapped on purpose: image y points down, PDF y points up
        let angle = dx.atan2(dy) - FRAC_PI_2;
        let length = dx.hypot(dy);
        let height = tl.midpoint(tr).distance(bl.midpoint(br));
        Self {
            angle,
            length,
            height,
        }
    }
}

/// Where the unrotated source image lands on the page, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageOrientation {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

impl PageOrientation {
    /// `image_height` is the height of the physical (unrotated) image.
    pub fn resolve(transform: Option<&Transform>, image_height: u32) -> Self {
        let image_height = image_height as f64;
        let Some(transform) = transform else {
            return Self {
                x: 0.0,
                y: image_height,
                rotation: 0.0,
            };
        };
        // bottom-left corner of the unrotated image, mapped into page space
        let (x, y) = transform.apply(0.0, image_height);
        Self {
            x,
            y,
            rotation: transform.rotation(),
        }
    }
}
