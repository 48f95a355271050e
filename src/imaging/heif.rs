//! HEIC/HEIF decoding via the external `heif-convert` tool (libheif).

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;
use tracing::debug;

use crate::error::ReceiptError;

const HEIF_CONVERT: &str = "heif-convert";

/// Detect HEIC/HEIF content from magic bytes.
pub fn is_heif(bytes: &[u8]) -> bool {
    matches!(
        infer::get(bytes).map(|t| t.mime_type()),
        Some("image/heif") | Some("image/heic") | Some("image/heif-sequence")
    )
}

/// Locate the converter binary on PATH.
pub fn converter_path() -> Option<PathBuf> {
    which::which(HEIF_CONVERT).ok()
}

/// Convert HEIF bytes to PNG bytes.
pub fn convert_to_png(bytes: &[u8]) -> Result<Vec<u8>, ReceiptError> {
    let converter = converter_path().ok_or_else(|| {
        ReceiptError::ImageProcessing(format!(
            "{} not found (install libheif-examples or libheif)",
            HEIF_CONVERT
        ))
    })?;

    let temp_dir = TempDir::new().map_err(|e| ReceiptError::ImageProcessing(e.to_string()))?;
    let input = temp_dir.path().join("capture.heic");
    let output = temp_dir.path().join("capture.png");
    std::fs::write(&input, bytes).map_err(|e| ReceiptError::ImageProcessing(e.to_string()))?;

    debug!("Converting HEIF image with {}", converter.display());
    let result = Command::new(&converter).arg(&input).arg(&output).output();

    match result {
        Ok(out) if out.status.success() => {
            std::fs::read(&output).map_err(|e| ReceiptError::ImageProcessing(e.to_string()))
        }
        Ok(out) => Err(ReceiptError::ImageProcessing(format!(
            "{} failed: {}",
            HEIF_CONVERT,
            String::from_utf8_lossy(&out.stderr).trim()
        ))),
        Err(e) => Err(ReceiptError::ImageProcessing(format!(
            "failed to run {}: {}",
            HEIF_CONVERT, e
        ))),
    }
}
