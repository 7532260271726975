//! Image decoding for the texture cache
//!
//! Turns fetched bytes into RGBA8 frames via the image crate. GIF, animated
//! PNG and animated WebP become animations; everything else is a still image.

use crate::error::TextureError;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, Frame, ImageFormat as ImgFormat, RgbaImage};
use std::io::Cursor;

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        if data.len() < 8 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }

    fn to_image_format(self) -> Option<ImgFormat> {
        match self {
            Self::Png => Some(ImgFormat::Png),
            Self::Jpeg => Some(ImgFormat::Jpeg),
            Self::Gif => Some(ImgFormat::Gif),
            Self::WebP => Some(ImgFormat::WebP),
            Self::Unknown => None,
        }
    }
}

/// RGBA8 pixels of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// Create from raw RGBA data
    pub fn from_rgba(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self { pixels, width, height }
    }

    /// Memory size in bytes
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }
}

/// One frame of an animation and how long it stays on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    pub image: DecodedImage,
    pub delay_ms: u64,
}

/// Result of a successful fetch and decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedTexture {
    Still(DecodedImage),
    Animation {
        width: u32,
        height: u32,
        frames: Vec<AnimationFrame>,
    },
}

impl DecodedTexture {
    pub fn frame_count(&self) -> usize {
        match self {
            Self::Still(_) => 1,
            Self::Animation { frames, .. } => frames.len(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Still(image) => (image.width, image.height),
            Self::Animation { width, height, .. } => (*width, *height),
        }
    }
}

/// Decoder limits, derived from [`crate::CacheConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub max_texture_size: u32,
    pub min_frame_delay_ms: u64,
    pub default_frame_delay_ms: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        crate::CacheConfig::default().decode_options()
    }
}

impl DecodeOptions {
    /// Delay actually used for a frame declaring `raw_ms`
    pub fn frame_delay(&self, raw_ms: u64) -> u64 {
        if raw_ms == 0 {
            self.default_frame_delay_ms
        } else {
            raw_ms.max(self.min_frame_delay_ms)
        }
    }
}

/// Decode fetched bytes into a still image or an animation
pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<DecodedTexture, TextureError> {
    let format = ImageFormat::from_bytes(data);

    match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(data))?;
            from_frames(decoder.into_frames().collect_frames()?, options)
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(data))?;
            if decoder.is_apng()? {
                from_frames(decoder.apng()?.into_frames().collect_frames()?, options)
            } else {
                decode_still(data, format, options)
            }
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(data))?;
            if decoder.has_animation() {
                from_frames(decoder.into_frames().collect_frames()?, options)
            } else {
                decode_still(data, format, options)
            }
        }
        ImageFormat::Jpeg => decode_still(data, format, options),
        ImageFormat::Unknown => Err(TextureError::UnsupportedFormat),
    }
}

fn decode_still(
    data: &[u8],
    format: ImageFormat,
    options: &DecodeOptions,
) -> Result<DecodedTexture, TextureError> {
    let img_format = format.to_image_format().ok_or(TextureError::UnsupportedFormat)?;
    let img = image::load(Cursor::new(data), img_format)?;

    Ok(DecodedTexture::Still(fit_within(img.into_rgba8(), options.max_texture_size)))
}

fn from_frames(frames: Vec<Frame>, options: &DecodeOptions) -> Result<DecodedTexture, TextureError> {
    let mut decoded: Vec<AnimationFrame> = frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let raw_ms = if denom == 0 { 0 } else { u64::from(numer / denom) };
            AnimationFrame {
                image: fit_within(frame.into_buffer(), options.max_texture_size),
                delay_ms: options.frame_delay(raw_ms),
            }
        })
        .collect();

    if decoded.len() > 1 {
        let (width, height) = (decoded[0].image.width, decoded[0].image.height);
        tracing::debug!("Decoded animation {}x{}, {} frames", width, height, decoded.len());
        return Ok(DecodedTexture::Animation { width, height, frames: decoded });
    }

    // A single-frame animation is just a picture
    decoded
        .pop()
        .map(|frame| DecodedTexture::Still(frame.image))
        .ok_or(TextureError::EmptyAnimation)
}

/// Downscale so neither side exceeds `max_size`, keeping the aspect ratio
fn fit_within(buffer: RgbaImage, max_size: u32) -> DecodedImage {
    let (width, height) = buffer.dimensions();
    let (target_w, target_h) = constrain_dimensions(width, height, max_size);

    let buffer = if (target_w, target_h) != (width, height) {
        image::imageops::resize(&buffer, target_w, target_h, FilterType::Triangle)
    } else {
        buffer
    };

    DecodedImage::from_rgba(buffer.into_raw(), target_w, target_h)
}

fn constrain_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width <= max_size && height <= max_size {
        return (width, height);
    }

    let scale = max_size as f64 / width.max(height) as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_size);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_size);
    (w, h)
}
