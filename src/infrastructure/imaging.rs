//! Image decoding, the three augmentation transforms and re-encoding.
//!
//! Everything here is CPU-bound and synchronous; callers on the async runtime
//! run it through `tokio::task::spawn_blocking`.

use std::borrow::Cow;
use std::io::Cursor;
use std::time::Instant;

use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

use crate::entities::image_task::{ImageStats, Variant};
use crate::errors::PipelineError;

/// A decoded upload together with what is needed to write variants back in
/// the same format.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
    pub byte_len: usize,
}

impl DecodedImage {
    pub fn stats(&self) -> ImageStats {
        let (width, height) = self.image.dimensions();
        ImageStats {
            width,
            height,
            size: self.byte_len as u64,
            processing_time: 0.0,
        }
    }
}

/// One encoded variant ready for upload.
pub struct RenderedVariant {
    pub variant: Variant,
    pub bytes: Vec<u8>,
    pub stats: ImageStats,
}

pub struct RenderedImages {
    pub format: ImageFormat,
    pub original: ImageStats,
    pub variants: Vec<RenderedVariant>,
}

/// Sniffs the format from the bytes and decodes.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, PipelineError> {
    let format = image::guess_format(bytes)
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

    Ok(DecodedImage {
        image,
        format,
        byte_len: bytes.len(),
    })
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Cursor::new(Vec::new());
    encodable_as(image, format)
        .write_to(&mut buffer, format)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Widens the pixel layout to one the `format` encoder accepts. Gray stays
/// gray in the pixels even when the container needs colour channels.
fn encodable_as(image: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    let color = image.color();
    let converted = match format {
        ImageFormat::Gif if !matches!(color, ColorType::Rgb8 | ColorType::Rgba8) => {
            DynamicImage::ImageRgba8(image.to_rgba8())
        }
        ImageFormat::Jpeg if !matches!(color, ColorType::L8 | ColorType::Rgb8) => {
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
        ImageFormat::Tiff if color == ColorType::La8 => DynamicImage::ImageRgba8(image.to_rgba8()),
        ImageFormat::Tiff if color == ColorType::La16 => DynamicImage::ImageRgba16(image.to_rgba16()),
        _ => return Cow::Borrowed(image),
    };
    Cow::Owned(converted)
}

/// Rotates counter-clockwise by `degrees`, growing the canvas so nothing is
/// cropped. Right angles are exact; other angles sample nearest-neighbour and
/// leave uncovered corners transparent (black for formats without alpha).
pub fn rotate(image: &DynamicImage, degrees: i32) -> DynamicImage {
    match degrees.rem_euclid(360) {
        0 => image.clone(),
        90 => image.rotate270(),
        180 => image.rotate180(),
        270 => image.rotate90(),
        other => with_color_of(rotate_expand(image, other as f64), image.color()),
    }
}

fn rotate_expand(image: &DynamicImage, degrees: f64) -> DynamicImage {
    let source = image.to_rgba8();
    let (width, height) = source.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();

    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    // Image y grows downwards, so a visual counter-clockwise turn is
    // x' = x cos + y sin, y' = -x sin + y cos.
    let corners = [(-cx, -cy), (cx, -cy), (cx, cy), (-cx, cy)];
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for (x, y) in corners {
        let rx = x * cos + y * sin;
        let ry = -x * sin + y * cos;
        min_x = min_x.min(rx);
        max_x = max_x.max(rx);
        min_y = min_y.min(ry);
        max_y = max_y.max(ry);
    }

    const EPS: f64 = 1e-9;
    let new_width = ((max_x - EPS).ceil() - (min_x + EPS).floor()).max(1.0) as u32;
    let new_height = ((max_y - EPS).ceil() - (min_y + EPS).floor()).max(1.0) as u32;
    let (ncx, ncy) = (new_width as f64 / 2.0, new_height as f64 / 2.0);

    let mut rotated = RgbaImage::from_pixel(new_width, new_height, Rgba([0, 0, 0, 0]));
    for (dx, dy, pixel) in rotated.enumerate_pixels_mut() {
        let rx = dx as f64 + 0.5 - ncx;
        let ry = dy as f64 + 0.5 - ncy;
        let sx = (rx * cos - ry * sin + cx).floor();
        let sy = (rx * sin + ry * cos + cy).floor();
        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < width && (sy as u32) < height {
            *pixel = *source.get_pixel(sx as u32, sy as u32);
        }
    }

    DynamicImage::ImageRgba8(rotated)
}

/// Converts back to the source's pixel layout so the encoder for the source
/// format accepts the result.
fn with_color_of(image: DynamicImage, color: ColorType) -> DynamicImage {
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
        ColorType::L16 => DynamicImage::ImageLuma16(image.to_luma16()),
        ColorType::La16 => DynamicImage::ImageLumaA16(image.to_luma_alpha16()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(image.to_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(image.to_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(image.to_rgb32f()),
        ColorType::Rgba32F => DynamicImage::ImageRgba32F(image.to_rgba32f()),
        _ => image,
    }
}

/// Single-channel 8-bit grayscale. Alpha is dropped.
pub fn grayscale(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(image.to_luma8())
}

/// Halves both dimensions with integer division.
pub fn downscale(image: &DynamicImage) -> Result<DynamicImage, PipelineError> {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = (width / 2, height / 2);
    if new_width == 0 || new_height == 0 {
        return Err(PipelineError::Transform(format!(
            "{}x{} is too small to downscale",
            width, height
        )));
    }
    Ok(image.resize_exact(new_width, new_height, FilterType::CatmullRom))
}

fn timed<T>(transform: impl FnOnce() -> T) -> (T, f64) {
    let start = Instant::now();
    let output = transform();
    (output, start.elapsed().as_secs_f64())
}

/// Decodes `bytes` and produces the rotated, gray and scaled variants, each
/// derived from the original independently and re-encoded in its format.
/// The recorded processing time covers the transform only, not encoding.
pub fn render_variants(bytes: &[u8], degrees: i32) -> Result<RenderedImages, PipelineError> {
    let decoded = decode(bytes)?;
    let original = decoded.stats();
    let source = &decoded.image;

    let (rotated, rotate_secs) = timed(|| rotate(source, degrees));
    let (gray, gray_secs) = timed(|| grayscale(source));
    let (scaled, scale_secs) = timed(|| downscale(source));
    let scaled = scaled?;

    let transformed = Variant::DERIVED.into_iter().zip([
        (rotated, rotate_secs),
        (gray, gray_secs),
        (scaled, scale_secs),
    ]);

    let mut variants = Vec::with_capacity(Variant::DERIVED.len());
    for (variant, (image, processing_time)) in transformed {
        let bytes = encode(&image, decoded.format)?;
        let (width, height) = image.dimensions();
        variants.push(RenderedVariant {
            variant,
            stats: ImageStats {
                width,
                height,
                size: bytes.len() as u64,
                processing_time,
            },
            bytes,
        });
    }

    Ok(RenderedImages {
        format: decoded.format,
        original,
        variants,
    })
}
