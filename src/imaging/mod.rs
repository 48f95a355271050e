//! Image normalization.
//!
//! Every captured image is decoded, bounded to [`MAX_EDGE`] on its longest
//! side and re-encoded as JPEG at [`JPEG_QUALITY`], regardless of input
//! format. The result is what both the extraction service and the blob store
//! receive.

mod heif;

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use tracing::debug;

use crate::error::ReceiptError;

pub use heif::{converter_path as heif_converter_path, is_heif};

/// Longest allowed edge in pixels.
pub const MAX_EDGE: u32 = 2048;

/// JPEG quality factor (0-100).
pub const JPEG_QUALITY: u8 = 70;

/// A captured image as handed over by the caller.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    /// Where the bytes came from (file path or URI); for logging only.
    pub source: String,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, source: impl Into<String>) -> Self {
        Self {
            bytes,
            source: source.into(),
        }
    }

    /// Read an image from disk.
    pub async fn from_path(path: &Path) -> Result<Self, ReceiptError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ReceiptError::ImageProcessing(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::new(bytes, path.display().to_string()))
    }
}

/// A bounded, JPEG-encoded image. Lives for one ingestion attempt.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Target dimensions so the longest edge is at most [`MAX_EDGE`].
///
/// Landscape images are bounded by width, portrait and square by height.
/// Images already within bounds keep their size.
pub fn bounded_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width <= MAX_EDGE && height <= MAX_EDGE {
        return (width, height);
    }
    if width > height {
        let h = (height as f64 * MAX_EDGE as f64 / width as f64).round() as u32;
        (MAX_EDGE, h.max(1))
    } else {
        let w = (width as f64 * MAX_EDGE as f64 / height as f64).round() as u32;
        (w.max(1), MAX_EDGE)
    }
}

/// Decode, bound and re-encode an image. CPU bound; see [`normalize_async`].
pub fn normalize(raw: &RawImage) -> Result<NormalizedImage, ReceiptError> {
    normalize_with(raw, heif::convert_to_png)
}

/// [`normalize`] with the HEIF-to-PNG conversion step supplied by the caller.
pub fn normalize_with<F>(raw: &RawImage, heif_to_png: F) -> Result<NormalizedImage, ReceiptError>
where
    F: Fn(&[u8]) -> Result<Vec<u8>, ReceiptError>,
{
    let decoded = decode_with(&raw.bytes, heif_to_png)?;
    let (width, height) = decoded.dimensions();
    let (target_w, target_h) = bounded_dimensions(width, height);

    let img = if (target_w, target_h) != (width, height) {
        debug!(
            "Resizing {} from {}x{} to {}x{}",
            raw.source, width, height, target_w, target_h
        );
        decoded.resize_exact(target_w, target_h, FilterType::Lanczos3)
    } else {
        decoded
    };

    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ReceiptError::ImageProcessing(format!("JPEG encode failed: {}", e)))?;

    Ok(NormalizedImage {
        bytes: buf,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Run [`normalize`] on the blocking pool.
pub async fn normalize_async(raw: RawImage) -> Result<NormalizedImage, ReceiptError> {
    tokio::task::spawn_blocking(move || normalize(&raw))
        .await
        .map_err(|e| ReceiptError::ImageProcessing(format!("normalize task failed: {}", e)))?
}

fn decode_with<F>(bytes: &[u8], heif_to_png: F) -> Result<DynamicImage, ReceiptError>
where
    F: Fn(&[u8]) -> Result<Vec<u8>, ReceiptError>,
{
    if bytes.is_empty() {
        return Err(ReceiptError::ImageProcessing("image is empty".to_string()));
    }

    if heif::is_heif(bytes) {
        let png = heif_to_png(bytes)?;
        return decode_oriented(&png)
            .map_err(|e| ReceiptError::ImageProcessing(format!("HEIF decode failed: {}", e)));
    }

    decode_oriented(bytes)
        .map_err(|e| ReceiptError::ImageProcessing(format!("decode failed: {}", e)))
}

/// Decode and apply the EXIF orientation, so pixels come out upright.
fn decode_oriented(bytes: &[u8]) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    // Unreadable EXIF is treated as no rotation
    let orientation = decoder.orientation().ok();
    let mut img = DynamicImage::from_decoder(decoder)?;
    if let Some(orientation) = orientation {
        img.apply_orientation(orientation);
    }
    Ok(img)
}

/// Image extensions accepted by the CLI when expanding directories.
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            matches!(
                e.to_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "heic" | "heif" | "webp" | "gif" | "bmp" | "tif" | "tiff"
            )
        })
        .unwrap_or(false)
}

/// Expand directories into their supported image files, sorted by name.
pub fn collect_image_paths(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported_extension(p))
                .collect();
            entries.sort();
            paths.extend(entries);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    /// Insert an APP1 EXIF segment carrying `orientation` right after SOI.
    fn with_exif_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
        let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
        app1.extend_from_slice(b"Exif\0\0");
        // Big-endian TIFF header, IFD0 at offset 8
        app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
        // One entry: Orientation (0x0112), SHORT, count 1
        app1.extend_from_slice(&[0x00, 0x01]);
        app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        app1.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn heic_bytes() -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftypheic");
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(b"mif1heic");
        bytes
    }

    fn assert_jpeg(bytes: &[u8]) {
        assert_eq!(
            image::guess_format(bytes).unwrap(),
            ImageFormat::Jpeg,
            "output must be JPEG"
        );
    }

    #[test]
    fn test_bounded_dimensions_within_limit() {
        assert_eq!(bounded_dimensions(800, 600), (800, 600));
        assert_eq!(bounded_dimensions(2048, 2048), (2048, 2048));
    }

    #[test]
    fn test_bounded_dimensions_landscape_and_portrait() {
        assert_eq!(bounded_dimensions(4096, 3072), (2048, 1536));
        assert_eq!(bounded_dimensions(3000, 4000), (1536, 2048));
        assert_eq!(bounded_dimensions(3000, 3000), (2048, 2048));
    }

    #[test]
    fn test_bounded_dimensions_preserves_aspect_ratio() {
        let (w, h) = bounded_dimensions(4033, 3025);
        assert_eq!(w, 2048);
        let expected = 3025.0 * 2048.0 / 4033.0;
        assert!((h as f64 - expected).abs() <= 1.0);
    }

    #[test]
    fn test_normalize_small_png_keeps_size() {
        let raw = RawImage::new(encode(320, 480, ImageFormat::Png), "small.png");
        let out = normalize(&raw).unwrap();
        assert_eq!((out.width, out.height), (320, 480));
        assert_jpeg(&out.bytes);
    }

    #[test]
    fn test_normalize_large_jpeg_downscales() {
        let raw = RawImage::new(encode(2600, 1300, ImageFormat::Jpeg), "large.jpg");
        let out = normalize(&raw).unwrap();
        assert_eq!((out.width, out.height), (2048, 1024));
        assert_jpeg(&out.bytes);

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (2048, 1024));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let raw = RawImage::new(b"not an image".to_vec(), "garbage.bin");
        assert!(matches!(
            normalize(&raw),
            Err(ReceiptError::ImageProcessing(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_empty() {
        let raw = RawImage::new(Vec::new(), "empty.jpg");
        assert!(matches!(
            normalize(&raw),
            Err(ReceiptError::ImageProcessing(_))
        ));
    }

    #[test]
    fn test_normalize_applies_exif_rotation() {
        let jpeg = with_exif_orientation(&encode(300, 200, ImageFormat::Jpeg), 6);
        let raw = RawImage::new(jpeg, "portrait.jpg");
        let out = normalize(&raw).unwrap();
        assert_eq!((out.width, out.height), (200, 300));
        assert_jpeg(&out.bytes);
    }

    #[test]
    fn test_normalize_bounds_after_rotation() {
        let jpeg = with_exif_orientation(&encode(2600, 1300, ImageFormat::Jpeg), 8);
        let raw = RawImage::new(jpeg, "portrait-large.jpg");
        let out = normalize(&raw).unwrap();
        assert_eq!((out.width, out.height), (1024, 2048));
    }

    #[test]
    fn test_normalize_heif_through_converter() {
        let png = encode(640, 480, ImageFormat::Png);
        let raw = RawImage::new(heic_bytes(), "photo.heic");
        let out = normalize_with(&raw, |input| {
            assert!(is_heif(input));
            Ok(png.clone())
        })
        .unwrap();
        assert_eq!((out.width, out.height), (640, 480));
        assert_jpeg(&out.bytes);
    }

    #[test]
    fn test_heif_converter_failure_is_image_error() {
        let raw = RawImage::new(heic_bytes(), "photo.heic");
        let result = normalize_with(&raw, |_| {
            Err(ReceiptError::ImageProcessing("heif-convert failed: bad box".to_string()))
        });
        match result {
            Err(ReceiptError::ImageProcessing(msg)) => assert!(msg.contains("heif-convert")),
            other => panic!("expected ImageProcessing error, got {:?}", other),
        }
    }

    #[test]
    fn test_heif_without_converter_is_image_error() {
        if heif_converter_path().is_some() {
            return;
        }
        let raw = RawImage::new(heic_bytes(), "photo.heic");
        match normalize(&raw) {
            Err(ReceiptError::ImageProcessing(msg)) => assert!(msg.contains("heif-convert")),
            other => panic!("expected ImageProcessing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_normalize_async() {
        let raw = RawImage::new(encode(64, 64, ImageFormat::Png), "tiny.png");
        let out = normalize_async(raw).await.unwrap();
        assert_eq!((out.width, out.height), (64, 64));
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_extension(Path::new("a/b/IMG_0001.HEIC")));
        assert!(is_supported_extension(Path::new("scan.jpeg")));
        assert!(!is_supported_extension(Path::new("notes.txt")));
    }
}
