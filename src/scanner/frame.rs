use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GrayImage};

/// A grayscale bitmap handed to decoders.
#[derive(Debug, Clone)]
pub struct Frame {
    image: GrayImage,
}

impl Frame {
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_luma8())
    }

    /// Decode an encoded still (PNG, JPEG, ...) as delivered by a screenshot call.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("failed to decode still image")?;
        Ok(Self::from_dynamic(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn luma(&self) -> &GrayImage {
        &self.image
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Luma values of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let width = self.image.width() as usize;
        let start = y as usize * width;
        &self.image.as_raw()[start..start + width]
    }

    /// Downscale to fit `max_width`×`max_height`, keeping aspect ratio.
    /// Frames that already fit are returned as is.
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        if self.width() <= max_width && self.height() <= max_height {
            return self;
        }
        let resized = DynamicImage::ImageLuma8(self.image).resize(max_width, max_height, FilterType::Triangle);
        Self::from_dynamic(resized)
    }
}
