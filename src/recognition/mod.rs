//! Document AI `ProcessResponse` as it arrives on the wire, plus the
//! [`Recognizer`] seam the pipeline calls when no cached result exists.
//!
//! Field names follow the REST JSON mapping (camelCase). int64 values may be
//! numbers or strings, and zero-valued fields may be omitted entirely, so
//! everything here is optional; `ocr::page_from_response` decides what is
//! actually required.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub mod cache;
mod client;
mod retry;

pub use client::{DocumentAiClient, RecognitionConfig};

pub type RecognitionFuture<'a> = Pin<Box<dyn Future<Output = Result<ProcessResponse>> + Send + 'a>>;

pub trait Recognizer: Send + Sync {
    fn recognize<'a>(&'a self, image: &'a [u8], mime: &'a str) -> RecognitionFuture<'a>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<WireDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_meta: Option<RequestMeta>,
}

impl ProcessResponse {
    /// Drops the rendered page images the service echoes back; they are as
    /// large as the upload and nothing downstream reads them.
    pub fn without_image_content(self) -> Self {
        let document = self.document.map(|document| WireDocument {
            pages: document
                .pages
                .into_iter()
                .map(|page| WirePage {
                    image: page.image.map(|image| WireImage {
                        content: None,
                        ..image
                    }),
                    ..page
                })
                .collect(),
            ..document
        });
        Self {
            document,
            request_meta: self.request_meta,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub api_endpoint: String,
    pub processor_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub pages: Vec<WirePage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<WireImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<WireDimension>,
    #[serde(default)]
    pub transforms: Vec<WireMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<WireElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<WireElement>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<WireBytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDimension {
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// OpenCV-style matrix: `type` 6 is `CV_64F`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMatrix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<i32>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<WireBytes>,
}

/// `bytes` fields: base64 in REST JSON, or a serialized Node `Buffer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireBytes {
    Base64(String),
    Buffer { data: Vec<u8> },
}

/// A line or token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<WireLayout>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_anchor: Option<WireTextAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_poly: Option<WireBoundingPoly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTextAnchor {
    #[serde(default)]
    pub text_segments: Vec<WireTextSegment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTextSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<WireOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<WireOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireOffset {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBoundingPoly {
    #[serde(default)]
    pub vertices: Vec<WirePixelVertex>,
    #[serde(default)]
    pub normalized_vertices: Vec<WireVertex>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WirePixelVertex {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WireVertex {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}
