/// Output color handling for the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Prefer an sRGB swapchain so linear shader output is encoded on store.
    #[default]
    Auto,
    /// Use a non-sRGB swapchain; shaders are expected to gamma-encode themselves.
    Gamma,
    /// Force an sRGB swapchain.
    Linear,
}

impl std::fmt::Display for ColorSpaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorSpaceMode::Auto => f.write_str("auto"),
            ColorSpaceMode::Gamma => f.write_str("gamma"),
            ColorSpaceMode::Linear => f.write_str("linear"),
        }
    }
}

/// Pixel dimensions of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, treating a collapsed surface as square.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rectangle of the surface that draw calls rasterise into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Viewport covering the whole surface.
    pub fn covering(size: SurfaceSize) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }

    /// Clamps the viewport so it lies inside a render target of `size`.
    ///
    /// Returns `None` when nothing of the viewport remains visible.
    pub fn clamped_to(&self, size: SurfaceSize) -> Option<Self> {
        let x = self.x.min(size.width);
        let y = self.y.min(size.height);
        let width = self.width.min(size.width - x);
        let height = self.height.min(size.height - y);
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self {
                x,
                y,
                width,
                height,
            })
        }
    }
}

/// Initial device state applied when a [`Context`](crate::Context) is created.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    /// RGBA colour used by [`Context::clear`](crate::Context::clear).
    pub clear_color: [f32; 4],
    /// Whether depth testing starts enabled.
    pub depth_test: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: false,
        }
    }
}
