use crate::utils::KycError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GrayImage};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const THUMBNAIL_SIZE: (u32, u32) = (300, 300);
const THUMBNAIL_JPEG_QUALITY: u8 = 85;

pub struct ImageProcessor;

impl ImageProcessor {
    /// Decode an uploaded document image from disk.
    pub fn load(image_path: &Path) -> Result<DynamicImage, KycError> {
        let img = image::open(image_path)?;
        debug!(
            "Decoded {:?}: {}x{} {:?}",
            image_path,
            img.width(),
            img.height(),
            img.color()
        );
        Self::ensure_not_empty(img)
    }

    /// Decode an upload that is still in memory.
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage, KycError> {
        let img = image::load_from_memory(bytes)?;
        Self::ensure_not_empty(img)
    }

    fn ensure_not_empty(img: DynamicImage) -> Result<DynamicImage, KycError> {
        if img.width() == 0 || img.height() == 0 {
            return Err(KycError::ImageProcessing("Image has zero width or height".to_string()));
        }
        Ok(img)
    }

    pub fn grayscale(img: &DynamicImage) -> GrayImage {
        img.to_luma8()
    }

    /// Downscale for preview, preserving aspect ratio. Never enlarges.
    pub fn thumbnail(img: &DynamicImage, size: (u32, u32)) -> DynamicImage {
        if img.width() <= size.0 && img.height() <= size.1 {
            return img.clone();
        }
        img.resize(size.0, size.1, FilterType::Lanczos3)
    }

    pub fn generate_thumbnail(
        image_path: &Path,
        output_path: &Path,
        size: (u32, u32),
    ) -> Result<(), KycError> {
        let img = Self::load(image_path)?;
        let thumb = Self::thumbnail(&img, size);

        let mut writer = BufWriter::new(File::create(output_path)?);
        Self::encode_jpeg(&thumb, &mut writer)?;
        writer.flush()?;

        debug!(
            "Thumbnail {}x{} written to {:?}",
            thumb.width(),
            thumb.height(),
            output_path
        );
        Ok(())
    }

    /// Inline JPEG preview for the admin review screen.
    pub fn thumbnail_data_uri(img: &DynamicImage, size: (u32, u32)) -> Result<String, KycError> {
        let thumb = Self::thumbnail(img, size);
        let mut buffer = Vec::new();
        Self::encode_jpeg(&thumb, &mut buffer)?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buffer)))
    }

    fn encode_jpeg<W: Write>(img: &DynamicImage, writer: &mut W) -> Result<(), KycError> {
        let rgb = img.to_rgb8();
        let mut encoder = JpegEncoder::new_with_quality(writer, THUMBNAIL_JPEG_QUALITY);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        Ok(())
    }
}
