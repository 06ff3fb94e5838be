//! The seam between [`Context`](crate::Context) bookkeeping and a concrete backend.
//!
//! The context owns validation, unit allocation, and redundant-state
//! elision; a device only executes already-resolved commands.

mod headless;

pub use headless::{CommandCounts, DeviceCommand, HeadlessDevice};

use crate::error::DeviceError;
use crate::geometry::GeometryResource;
use crate::handles::{GeometryHandle, ProgramHandle, TextureHandle};
use crate::program::ShaderProgram;
use crate::texture::TextureResource;
use crate::types::{SurfaceSize, Viewport};
use crate::uniforms::UniformWrite;

/// Texture units assumed when a backend reports no tighter limit.
pub const DEFAULT_TEXTURE_UNITS: u32 = 16;

/// A geometry attribute wired to a program input location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    pub name: String,
    pub location: u32,
    pub components: u32,
}

pub trait Device {
    fn surface_size(&self) -> SurfaceSize;
    fn max_texture_units(&self) -> u32;

    fn resize_surface(&mut self, size: SurfaceSize);
    fn set_viewport(&mut self, viewport: Viewport);
    fn set_depth_test(&mut self, enabled: bool);
    fn clear(&mut self, color: [f32; 4]) -> Result<(), DeviceError>;

    fn create_geometry(&mut self, handle: GeometryHandle, geometry: &GeometryResource) -> Result<(), DeviceError>;
    fn destroy_geometry(&mut self, handle: GeometryHandle);
    fn create_texture(&mut self, handle: TextureHandle, texture: &TextureResource) -> Result<(), DeviceError>;
    fn destroy_texture(&mut self, handle: TextureHandle);
    fn create_program(&mut self, handle: ProgramHandle, program: &ShaderProgram) -> Result<(), DeviceError>;
    fn destroy_program(&mut self, handle: ProgramHandle);

    fn bind_program(&mut self, handle: ProgramHandle);
    /// Wires the geometry's buffers in the order of `attributes`.
    fn bind_geometry(&mut self, handle: GeometryHandle, attributes: &[AttributeBinding]);
    fn write_uniform(&mut self, program: ProgramHandle, write: &UniformWrite);
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);
    /// Points a program's texture input at a texture unit.
    fn set_sampler_unit(&mut self, program: ProgramHandle, texture_input: &str, unit: u32);
    fn draw_indexed(&mut self, index_count: u32) -> Result<(), DeviceError>;
    fn present(&mut self) -> Result<(), DeviceError>;
}
