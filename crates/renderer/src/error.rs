use std::fmt;

use thiserror::Error;

use crate::geometry::GeometryError;
use crate::reflect::InputKind;
use crate::texture::TextureError;

/// Pipeline stage a [`CompileError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    Vertex,
    Fragment,
    /// Cross-stage checks performed after both stages compiled.
    Link,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileStage::Vertex => f.write_str("vertex"),
            CompileStage::Fragment => f.write_str("fragment"),
            CompileStage::Link => f.write_str("link"),
        }
    }
}

/// Syntax, validation, or link failure. There is no fallback program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {log}")]
pub struct CompileError {
    pub stage: CompileStage,
    pub log: String,
}

impl CompileError {
    pub(crate) fn new(stage: CompileStage, log: impl Into<String>) -> Self {
        Self {
            stage,
            log: log.into(),
        }
    }

    pub(crate) fn link(log: impl Into<String>) -> Self {
        Self::new(CompileStage::Link, log)
    }
}

/// Geometry, program, or texture state that cannot satisfy a draw call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("program `{0}` is not registered with this context")]
    ProgramNotCompiled(String),
    #[error("geometry `{0}` has not been uploaded")]
    GeometryNotUploaded(String),
    #[error("geometry `{geometry}` lacks attribute `{attribute}` required by program `{program}`")]
    MissingAttribute {
        program: String,
        geometry: String,
        attribute: String,
    },
    #[error("attribute `{attribute}` has {found} components but the program expects {expected}")]
    AttributeLayout {
        attribute: String,
        expected: u32,
        found: u32,
    },
    #[error("texture bound to `{uniform}` has not been uploaded")]
    TextureNotUploaded { uniform: String },
    #[error("all {capacity} texture units are allocated")]
    TextureUnitsExhausted { capacity: u32 },
}

/// A uniform value whose kind disagrees with the declared input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("uniform `{name}` is declared as {expected} but was given {found}")]
pub struct TypeMismatchError {
    pub name: String,
    pub expected: InputKind,
    pub found: String,
}

/// Failures reported by a [`Device`](crate::Device) backend.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("unknown {kind} handle {raw}")]
    UnknownHandle { kind: &'static str, raw: u64 },
    #[error("{0}")]
    Backend(String),
}

/// Umbrella error returned by [`Context`](crate::Context) operations.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl RenderError {
    /// True for surface hiccups the caller should treat as a skipped frame.
    pub fn is_transient_surface_error(&self) -> bool {
        matches!(
            self,
            RenderError::Device(DeviceError::Surface(
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Timeout
            ))
        )
    }
}
