//! GPU resource and uniform-binding layer for the PBR sphere grid.
//!
//! Callers describe what to draw with plain data (geometry, textures, GLSL
//! sources, and a name-keyed [`UniformMap`]); the [`Context`] turns that into
//! device work. The flow for one draw is:
//!
//! ```text
//!   ShaderSource ──compile/link──▶ ShaderProgram (InputTable)
//!                                        │
//!   UniformMap ──resolve + encode──────▶ Context::draw ──▶ Device
//!                                        │                  ├─ WgpuDevice (window surface)
//!   GeometryResource / TextureResource ──┘ upload           └─ HeadlessDevice (command log)
//! ```
//!
//! Programs are parsed and validated with naga, so the input table is known
//! on the CPU before anything reaches the GPU. Every key in a uniform map is
//! checked against that table before the device sees a single command; a bad
//! key aborts the draw and leaves device state untouched.

mod compile;
mod context;
mod device;
mod error;
mod geometry;
mod gpu;
mod handles;
mod program;
mod reflect;
mod texture;
mod types;
mod uniforms;

pub use context::Context;
pub use device::{AttributeBinding, CommandCounts, Device, DeviceCommand, HeadlessDevice, DEFAULT_TEXTURE_UNITS};
pub use error::{BindError, CompileError, CompileStage, DeviceError, RenderError, TypeMismatchError};
pub use geometry::{
    GeometryBuilder, GeometryError, GeometryResource, VertexAttribute, ATTRIBUTE_NORMAL, ATTRIBUTE_POSITION,
    ATTRIBUTE_UV,
};
pub use gpu::WgpuDevice;
pub use handles::{GeometryHandle, ProgramHandle, TextureHandle};
pub use program::{ShaderProgram, ShaderSource};
pub use reflect::{
    AttributeSlot, DeclaredInput, InputBinding, InputKind, InputTable, ResourceSlot, TextureSlot, UniformBlock,
    UniformSlot, SAMPLER_SUFFIX,
};
pub use texture::{PixelFormat, TextureError, TextureInfo, TextureResource};
pub use types::{ColorSpaceMode, ContextOptions, SurfaceSize, Viewport};
pub use uniforms::{UniformMap, UniformValue, UniformWrite};
