//! Recognition results are cached as gzip-compressed JSON next to each
//! image, so re-running on the same scans never calls the service again.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{ProcessResponse, Recognizer};
use crate::paths::cache_path;

/// Reads a cached response. A missing file is `Ok(None)`; a file that exists
/// but cannot be decoded is an error rather than a silent re-recognition.
pub fn load(path: &Path) -> Result<Option<ProcessResponse>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to open cache: {}", path.display()));
        }
    };
    let reader = BufReader::new(GzDecoder::new(file));
    let response = serde_json::from_reader(reader)
        .with_context(|| format!("failed to decode cache: {}", path.display()))?;
    Ok(Some(response))
}

/// Writes the response without its echoed page images. The file is written
/// to a temporary sibling first and renamed into place.
pub fn store(path: &Path, response: ProcessResponse) -> Result<ProcessResponse> {
    let response = response.without_image_content();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    {
        let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
        serde_json::to_writer(&mut encoder, &response)
            .with_context(|| "failed to serialize recognition result")?;
        encoder
            .finish()
            .and_then(|file| file.flush())
            .with_context(|| format!("failed to compress cache: {}", path.display()))?;
    }
    temp.persist(path)
        .with_context(|| format!("failed to write cache: {}", path.display()))?;
    Ok(response)
}

/// Returns the cached result for `image_path`, or recognizes `image` and
/// caches the result.
pub async fn load_or_recognize<R: Recognizer + ?Sized>(
    recognizer: &R,
    image_path: &Path,
    image: &[u8],
    mime: &str,
) -> Result<ProcessResponse> {
    let path = cache_path(image_path);
    if let Some(cached) = load(&path)? {
        debug!("using cached recognition {}", path.display());
        return Ok(cached);
    }
    let response = recognizer
        .recognize(image, mime)
        .await
        .with_context(|| format!("recognition failed for {}", image_path.display()))?;
    let response = store(&path, response)?;
    info!("wrote recognition cache to {}", path.display());
    Ok(response)
}
