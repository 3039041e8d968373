use std::collections::HashMap;
use std::path::PathBuf;

use image::{imageops, DynamicImage, Rgba, RgbaImage};

use crate::error::LoadError;
use crate::math;

/// RGBA8 pixels, rows top-down as decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSource {
    image: RgbaImage,
}

impl PixelSource {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, pixels).map(Self::new)
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self::new(image.to_rgba8())
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn is_power_of_two(&self) -> bool {
        math::is_power_of_two(self.width()) && math::is_power_of_two(self.height())
    }

    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        Self::new(imageops::resize(
            &self.image,
            width,
            height,
            imageops::FilterType::Triangle,
        ))
    }
}

/// Resolves a locator (path, URL, key) to decoded pixels.
#[allow(async_fn_in_trait)]
pub trait ImageLoader {
    async fn load(&self, locator: &str) -> Result<PixelSource, LoadError>;
}

/// Reads and decodes image files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileImageLoader {
    root: PathBuf,
}

impl FileImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl ImageLoader for FileImageLoader {
    async fn load(&self, locator: &str) -> Result<PixelSource, LoadError> {
        let path = self.root.join(locator);
        let bytes = std::fs::read(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound {
                locator: locator.to_string(),
            },
            _ => LoadError::Io {
                locator: locator.to_string(),
                reason: format!("failed to read {}", path.display()),
                source,
            },
        })?;
        let decoded = image::load_from_memory(&bytes).map_err(|source| LoadError::Decode {
            locator: locator.to_string(),
            source,
        })?;
        tracing::debug!(
            locator,
            width = decoded.width(),
            height = decoded.height(),
            "decoded image"
        );
        Ok(PixelSource::from_image(decoded))
    }
}

/// In-memory sources keyed by locator.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageLoader {
    sources: HashMap<String, PixelSource>,
}

impl MemoryImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locator: impl Into<String>, source: PixelSource) {
        self.sources.insert(locator.into(), source);
    }

    pub fn with(mut self, locator: impl Into<String>, source: PixelSource) -> Self {
        self.insert(locator, source);
        self
    }
}

impl ImageLoader for MemoryImageLoader {
    async fn load(&self, locator: &str) -> Result<PixelSource, LoadError> {
        self.sources
            .get(locator)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                locator: locator.to_string(),
            })
    }
}
