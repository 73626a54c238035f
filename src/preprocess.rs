//! Turns a decoded image into the fixed-shape tensor the classifier expects

use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};

/// Side length, in pixels, of the square model input
pub const INPUT_SIZE: u32 = 224;

/// Color channels per pixel
pub const CHANNELS: usize = 3;

/// Input tensor shape: batch, height, width, channels
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, CHANNELS];

/// A single-image batch of `f32` values in `[0, 1]`, laid out row-major as
/// `INPUT_SHAPE` (NHWC)
#[derive(Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    /// An all-black input, used to probe a model's output width
    pub fn zeros() -> Self {
        InputTensor {
            data: vec![0.0; INPUT_SHAPE.iter().product()],
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        INPUT_SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl std::fmt::Debug for InputTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InputTensor {{ shape: {:?}, data: <f32> }}", self.shape())
    }
}

/// Resize to exactly `INPUT_SIZE` x `INPUT_SIZE` (aspect ratio is not
/// preserved) and scale every channel from `0..=255` to `[0, 1]`.
///
/// Any color mode is first converted to 8-bit RGB, so grayscale, palette and
/// alpha images all produce three channels.
pub fn preprocess(image: &DynamicImage) -> InputTensor {
    preprocess_rgb(&image.to_rgb8())
}

/// `preprocess` for an image that is already 8-bit RGB
pub fn preprocess_rgb(image: &RgbImage) -> InputTensor {
    let resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let data = resized
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();

    InputTensor { data }
}
