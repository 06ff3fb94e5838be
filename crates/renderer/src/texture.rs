//! CPU-side pixel data destined for a sampled 2D texture.

use thiserror::Error;

use crate::handles::TextureHandle;

/// Storage format of a texture's texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Raw data such as normals, roughness, or RGBM-encoded environment maps.
    #[default]
    Rgba8Unorm,
    /// Colour data decoded from sRGB when sampled.
    Rgba8UnormSrgb,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        4
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureError {
    #[error("texture `{label}` has zero extent ({width}x{height})")]
    ZeroExtent {
        label: String,
        width: u32,
        height: u32,
    },
    #[error("texture `{label}` expects {expected} bytes of pixel data, got {found}")]
    PixelLength {
        label: String,
        expected: usize,
        found: usize,
    },
    #[error("texture `{0}` released its pixels and cannot be uploaded again")]
    CpuDataReleased(String),
}

/// Dimensions reported back by the context for an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Decoded RGBA8 pixels plus the device handle assigned on upload.
///
/// Arbitrary (non-power-of-two) dimensions are accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureResource {
    label: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    cpu_released: bool,
    handle: Option<TextureHandle>,
}

impl TextureResource {
    pub fn new(
        label: impl Into<String>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, TextureError> {
        let label = label.into();
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroExtent {
                label,
                width,
                height,
            });
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(TextureError::PixelLength {
                label,
                expected,
                found: pixels.len(),
            });
        }
        Ok(Self {
            label,
            width,
            height,
            format,
            pixels,
            cpu_released: false,
            handle: None,
        })
    }

    /// Single-colour texture, handy as a stand-in for missing assets.
    pub fn solid(label: impl Into<String>, rgba: [u8; 4], format: PixelFormat) -> Self {
        Self {
            label: label.into(),
            width: 1,
            height: 1,
            format,
            pixels: rgba.to_vec(),
            cpu_released: false,
            handle: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn info(&self) -> TextureInfo {
        TextureInfo {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: Option<TextureHandle>) {
        self.handle = handle;
    }

    pub fn has_cpu_data(&self) -> bool {
        !self.cpu_released
    }

    pub fn release_cpu_data(&mut self) {
        self.pixels = Vec::new();
        self.cpu_released = true;
    }
}
