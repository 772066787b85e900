//! # Image Loading and Decoding
//!
//! Fetches the bytes behind an image [`Content`] (HTTP for remote URLs,
//! disk for local paths) and prepares them for two consumers:
//!
//! - the PDF writer: JPEG images pass through without re-encoding (the PDF
//!   spec supports DCTDecode natively); PNG, WebP, GIF and BMP are decoded
//!   to RGB pixels with a separate alpha channel for SMask transparency.
//! - the canvas: a decoded [`DynamicImage`] that fields resize for display.
//!
//! Remote bytes are cached per loader by URL. A batch builds its own loader,
//! so the cache lives exactly as long as the batch.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::DynamicImage;

use crate::content::{self, Content, ImageLocator};
use crate::error::PdsError;

/// Timeout for fetching a remote image.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// A fully decoded/loaded image ready for PDF embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
}

/// The pixel data in a format the PDF serializer can consume directly.
#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Raw JPEG bytes, embedded directly with DCTDecode.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    /// Decoded RGB pixels + optional alpha channel.
    Decoded {
        /// width * height * 3 bytes (RGB)
        rgb: Vec<u8>,
        /// width * height bytes (grayscale alpha). None if fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

/// JPEG color space for the PDF /ColorSpace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
    /// Four components. Adobe-written files store the channels inverted.
    DeviceCMYK { inverted: bool },
}

/// Source of remote image bytes.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, PdsError>;
}

/// Blocking HTTP fetcher with a short timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, PdsError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("pdsgen/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| PdsError::Image(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, PdsError> {
        let resp = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PdsError::Image(format!("Failed to fetch '{}': {}", url, e)))?;
        let bytes = resp
            .bytes()
            .map_err(|e| PdsError::Image(format!("Failed to read '{}': {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Fetcher used when no HTTP client could be built: every fetch fails, so
/// remote values render as text.
struct OfflineFetcher;

impl ImageFetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, PdsError> {
        Err(PdsError::Image(format!("no HTTP client available for '{}'", url)))
    }
}

/// Resolves field values to content and loads the images behind them.
pub struct ImageLoader {
    locator: ImageLocator,
    fetcher: Arc<dyn ImageFetcher>,
    remote_cache: Mutex<HashMap<String, Arc<Vec<u8>>>>,
}

impl ImageLoader {
    /// A loader resolving local names against `base_dir` and fetching remote
    /// images over HTTP.
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        let fetcher: Arc<dyn ImageFetcher> = match HttpFetcher::new() {
            Ok(f) => Arc::new(f),
            Err(e) => {
                log::warn!("{}; remote images will render as text", e);
                Arc::new(OfflineFetcher)
            }
        };
        Self::from_parts(base_dir, fetcher)
    }

    pub fn with_fetcher(base_dir: Option<PathBuf>, fetcher: impl ImageFetcher + 'static) -> Self {
        Self::from_parts(base_dir, Arc::new(fetcher))
    }

    fn from_parts(base_dir: Option<PathBuf>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            locator: ImageLocator::new(base_dir),
            fetcher,
            remote_cache: Mutex::new(HashMap::new()),
        }
    }

    /// A loader with the same fetcher and base directory but empty caches.
    /// Each batch starts from one of these.
    pub fn fresh(&self) -> Self {
        Self::from_parts(self.locator.base_dir().map(PathBuf::from), self.fetcher.clone())
    }

    /// Point local lookups at a new directory, dropping cached lookups.
    pub fn set_base_dir(&mut self, base_dir: Option<PathBuf>) {
        self.locator = ImageLocator::new(base_dir);
    }

    pub fn locator(&self) -> &ImageLocator {
        &self.locator
    }

    /// Classify a field value.
    pub fn resolve(&self, value: &str) -> Content {
        content::resolve(value, &self.locator)
    }

    /// Raw bytes behind an image content.
    pub fn bytes(&self, content: &Content) -> Result<Arc<Vec<u8>>, PdsError> {
        match content {
            Content::RemoteImage(url) => self.remote_bytes(url),
            Content::LocalImage(path) => std::fs::read(path).map(Arc::new).map_err(|e| {
                PdsError::Image(format!("Failed to read image file '{}': {}", path.display(), e))
            }),
            Content::Text(_) | Content::Missing => {
                Err(PdsError::Image("value is not an image".to_string()))
            }
        }
    }

    fn remote_bytes(&self, url: &str) -> Result<Arc<Vec<u8>>, PdsError> {
        if let Some(hit) = self.remote_cache.lock().ok().and_then(|c| c.get(url).cloned()) {
            return Ok(hit);
        }
        let bytes = Arc::new(self.fetcher.fetch(url)?);
        if let Ok(mut cache) = self.remote_cache.lock() {
            cache.insert(url.to_string(), bytes.clone());
        }
        Ok(bytes)
    }

    /// Load an image for PDF embedding.
    pub fn load_for_pdf(&self, content: &Content) -> Result<LoadedImage, PdsError> {
        let bytes = self.bytes(content)?;
        decode_image_bytes(&bytes)
    }

    /// Decode an image for on-screen display.
    pub fn load_for_display(&self, content: &Content) -> Result<Arc<DynamicImage>, PdsError> {
        let bytes = self.bytes(content)?;
        let img = image::io::Reader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| PdsError::Image(format!("Image format detection error: {}", e)))?
            .decode()
            .map_err(|e| PdsError::Image(format!("Failed to decode image: {}", e)))?;
        Ok(Arc::new(img))
    }
}

/// Detect image format from magic bytes and decode accordingly.
pub fn decode_image_bytes(data: &[u8]) -> Result<LoadedImage, PdsError> {
    if data.len() < 4 {
        return Err(PdsError::Image("Image data too short".to_string()));
    }

    if is_jpeg(data) {
        decode_jpeg(data)
    } else if is_png(data) || is_webp(data) || is_gif(data) || is_bmp(data) {
        decode_raster(data)
    } else {
        Err(PdsError::Image(
            "Unsupported image format (expected JPEG, PNG, WebP, GIF or BMP)".to_string(),
        ))
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47
}

fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

fn is_gif(data: &[u8]) -> bool {
    data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")
}

fn is_bmp(data: &[u8]) -> bool {
    data.len() >= 14 && data.starts_with(b"BM")
}

/// JPEG: read dimensions and color space without decoding pixels.
/// The raw JPEG bytes are passed through to the PDF (DCTDecode).
fn decode_jpeg(data: &[u8]) -> Result<LoadedImage, PdsError> {
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PdsError::Image(format!("JPEG format detection error: {}", e)))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| PdsError::Image(format!("Failed to read JPEG dimensions: {}", e)))?;

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space: detect_jpeg_color_space(data),
        },
        width_px: width,
        height_px: height,
    })
}

/// Scan JPEG markers to find the SOF (Start of Frame) segment and read
/// the number of components to determine color space. An APP14 "Adobe"
/// segment before it marks CMYK data as inverted.
fn detect_jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut adobe = false;
    let mut i = 2; // skip SOI marker (FF D8)
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        if marker == 0xEE && data.get(i + 4..i + 9) == Some(&b"Adobe"[..]) {
            adobe = true;
        }
        // SOF markers: C0-C3, C5-C7, C9-CB, CD-CF
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof && i + 9 < data.len() {
            // length(2) + precision(1) + height(2) + width(2) + num_components(1)
            return match data[i + 9] {
                1 => JpegColorSpace::DeviceGray,
                4 => JpegColorSpace::DeviceCMYK { inverted: adobe },
                _ => JpegColorSpace::DeviceRGB,
            };
        }
        if i + 3 < data.len() {
            let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + seg_len;
        } else {
            break;
        }
    }
    JpegColorSpace::DeviceRGB
}

/// PNG / WebP / GIF / BMP: decode to RGBA, split into RGB + alpha.
fn decode_raster(data: &[u8]) -> Result<LoadedImage, PdsError> {
    let img = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PdsError::Image(format!("Image format detection error: {}", e)))?
        .decode()
        .map_err(|e| PdsError::Image(format!("Failed to decode image: {}", e)))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_transparency = false;

    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
        has_transparency |= pixel[3] != 255;
    }

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: has_transparency.then_some(alpha),
        },
        width_px: width,
        height_px: height,
    })
}
