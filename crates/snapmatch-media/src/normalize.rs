//! Media normalization: decode, bound dimensions, re-encode as JPEG.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;
use thiserror::Error;

use snapmatch_core::config::NormalizeConfig;
use snapmatch_core::models::{NormalizedAsset, SourceFile};

use crate::format::{classify, FormatDescriptor};

#[derive(Debug, Error)]
pub enum MediaError {
    /// Decoding or re-encoding was impossible. Callers degrade to
    /// uploading the original bytes; this never blocks an upload.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// The input is not a recognized image format. Unlike conversion
    /// failures this is a validation error; callers reject the file.
    #[error("Unrecognized format: {0}")]
    Unrecognized(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Converts and compresses single files into web-safe JPEG assets.
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizeConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    /// Normalize one file into a web-safe JPEG.
    ///
    /// HEIC goes through the dedicated decoder without a resize step (the
    /// decoder already downsamples); everything else is decoded, bounded
    /// to the configured maximum dimension, and re-encoded at the
    /// configured quality.
    pub fn normalize(&self, file: &SourceFile) -> MediaResult<NormalizedAsset> {
        let descriptor = classify(&file.name, &file.content_type)
            .ok_or_else(|| MediaError::Unrecognized(file.name.clone()))?;

        let bytes = if descriptor.is_heic() {
            self.transcode_heic(file)?
        } else {
            self.transcode(file, descriptor)?
        };

        tracing::debug!(
            name = %file.name,
            in_bytes = file.bytes.len(),
            out_bytes = bytes.len(),
            "Normalized image"
        );

        Ok(NormalizedAsset {
            bytes,
            content_type: "image/jpeg".to_string(),
            source_name: file.name.clone(),
            normalized: true,
        })
    }

    fn transcode(&self, file: &SourceFile, _descriptor: &FormatDescriptor) -> MediaResult<Vec<u8>> {
        let reader = ImageReader::new(Cursor::new(&file.bytes))
            .with_guessed_format()
            .map_err(|e| MediaError::Conversion(e.to_string()))?;
        let img = reader
            .decode()
            .map_err(|e| MediaError::Conversion(e.to_string()))?;

        let (width, height) = img.dimensions();
        let max = self.config.max_dimension;
        let img = if width > max || height > max {
            img.resize(max, max, FilterType::Lanczos3)
        } else {
            img
        };

        self.encode_jpeg(&img)
    }

    /// HEIC/HEIF path via libheif. Decoder handles and planes are scoped to
    /// this function so native resources are released once encoding is done.
    #[cfg(feature = "heic")]
    fn transcode_heic(&self, file: &SourceFile) -> MediaResult<Vec<u8>> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let lib_heif = LibHeif::new();
        let context = HeifContext::read_from_bytes(&file.bytes)
            .map_err(|e| MediaError::Conversion(e.to_string()))?;
        let handle = context
            .primary_image_handle()
            .map_err(|e| MediaError::Conversion(e.to_string()))?;
        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| MediaError::Conversion(e.to_string()))?;

        let width = decoded.width();
        let height = decoded.height();
        let planes = decoded.planes();
        let interleaved = planes
            .interleaved
            .ok_or_else(|| MediaError::Conversion("no interleaved RGB plane".to_string()))?;

        let stride = interleaved.stride;
        let row_bytes = width as usize * 3;
        let mut rgb = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            rgb.extend_from_slice(&interleaved.data[start..start + row_bytes]);
        }

        let buffer = image::RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| MediaError::Conversion("decoded plane size mismatch".to_string()))?;

        self.encode_jpeg(&DynamicImage::ImageRgb8(buffer))
    }

    #[cfg(not(feature = "heic"))]
    fn transcode_heic(&self, file: &SourceFile) -> MediaResult<Vec<u8>> {
        Err(MediaError::Conversion(format!(
            "HEIC decoding not available in this build: {}",
            file.name
        )))
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> MediaResult<Vec<u8>> {
        // JPEG carries no alpha channel; flatten before encoding.
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut out = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            Cursor::new(&mut out),
            self.config.jpeg_quality,
        );
        rgb.write_with_encoder(encoder)
            .map_err(|e| MediaError::Conversion(e.to_string()))?;

        Ok(out)
    }
}
