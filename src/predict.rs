//! The prediction pipeline for a single uploaded image: decode, preprocess,
//! score, pick a label, and echo the image back as base 64

use crate::labels::LabelTable;
use crate::preprocess::preprocess_rgb;
use crate::torch::Classifier;
use anyhow::anyhow;
use base64::{engine::general_purpose, Engine as _};
use image::error::{LimitError, LimitErrorKind};
use image::io::{Limits, Reader};
use image::{ImageError, ImageOutputFormat, RgbImage};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// JPEG quality used when none is configured
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Largest accepted image, in pixels, when none is configured
pub const DEFAULT_MAX_PIXELS: u64 = 178_956_970;

/// Worst-case decoded bytes per pixel: four 16-bit channels
const MAX_BYTES_PER_PIXEL: u64 = 8;

/// What a prediction request returns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// The class name at the highest-scoring output position
    pub prediction: String,

    /// The uploaded image, re-encoded as JPEG, in base 64
    pub image: String,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    /// The upload is not an image we can decode
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("model returned no usable scores")]
    EmptyOutput,

    /// The model scored more classes than there are labels
    #[error("model predicted class {index} but only {labels} labels are configured")]
    LabelOutOfRange { index: usize, labels: usize },

    #[error("inference failed: {0}")]
    Inference(#[source] anyhow::Error),

    #[error("could not re-encode image: {0}")]
    Encode(#[source] image::ImageError),
}

impl PredictionError {
    /// Whether the caller, rather than the service, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictionError::Decode(_))
    }
}

/// Index of the largest score. NaNs are skipped and ties go to the lowest
/// index
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Runs the full pipeline against a shared classifier
#[derive(Debug, Clone)]
pub struct Predictor {
    model: Arc<dyn Classifier>,
    labels: LabelTable,
    jpeg_quality: u8,
    max_pixels: u64,
}

impl Predictor {
    pub fn new(model: Arc<dyn Classifier>, labels: LabelTable) -> Self {
        Predictor {
            model,
            labels,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Reject images whose width times height exceeds `max_pixels`
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Check that the model scores exactly as many classes as there are
    /// labels
    pub fn validate(&self) -> anyhow::Result<()> {
        let width = self.model.output_width()?;
        if width != self.labels.len() {
            return Err(anyhow!(
                "model outputs {width} classes but the label table has {} entries",
                self.labels.len()
            ));
        }
        Ok(())
    }

    /// Decode to 8-bit RGB, refusing images larger than `max_pixels` before
    /// any pixel data is allocated
    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, ImageError> {
        let reader = || Reader::new(Cursor::new(bytes)).with_guessed_format();

        let (width, height) = reader()?.into_dimensions()?;
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(ImageError::Limits(LimitError::from_kind(
                LimitErrorKind::DimensionError,
            )));
        }

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_pixels.saturating_mul(MAX_BYTES_PER_PIXEL));
        let mut reader = reader()?;
        reader.limits(limits);

        let image = reader.decode()?;
        debug!("decoded {width}x{height} {:?} image", image.color());
        Ok(image.into_rgb8())
    }

    /// Classify one encoded image
    #[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn predict(&self, bytes: &[u8]) -> Result<Prediction, PredictionError> {
        let image = self.decode(bytes).map_err(PredictionError::Decode)?;

        let input = preprocess_rgb(&image);
        let scores = self
            .model
            .scores(&input)
            .map_err(PredictionError::Inference)?;

        let index = argmax(&scores).ok_or(PredictionError::EmptyOutput)?;
        let label = self
            .labels
            .get(index)
            .ok_or(PredictionError::LabelOutOfRange {
                index,
                labels: self.labels.len(),
            })?;

        let image = encode_jpeg(&image, self.jpeg_quality)?;

        info!("predicted {label}");
        Ok(Prediction {
            prediction: label.to_string(),
            image,
        })
    }
}

/// Re-encode an RGB image as JPEG and return it as standard base 64
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<String, PredictionError> {
    let mut image_data: Vec<u8> = Vec::new();
    image.write_to(
        &mut Cursor::new(&mut image_data),
        ImageOutputFormat::Jpeg(quality),
    )
    .map_err(PredictionError::Encode)?;

    Ok(general_purpose::STANDARD.encode(image_data))
}
