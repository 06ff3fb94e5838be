use std::collections::HashSet;

use super::{AttributeBinding, Device, DEFAULT_TEXTURE_UNITS};
use crate::error::DeviceError;
use crate::geometry::GeometryResource;
use crate::handles::{GeometryHandle, ProgramHandle, TextureHandle};
use crate::program::ShaderProgram;
use crate::texture::TextureResource;
use crate::types::{SurfaceSize, Viewport};
use crate::uniforms::UniformWrite;

/// Everything a [`HeadlessDevice`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    ResizeSurface(SurfaceSize),
    SetViewport(Viewport),
    SetDepthTest(bool),
    Clear([f32; 4]),
    CreateGeometry {
        handle: GeometryHandle,
        vertex_count: u32,
        index_count: u32,
    },
    DestroyGeometry(GeometryHandle),
    CreateTexture {
        handle: TextureHandle,
        width: u32,
        height: u32,
    },
    DestroyTexture(TextureHandle),
    CreateProgram {
        handle: ProgramHandle,
        label: String,
    },
    DestroyProgram(ProgramHandle),
    BindProgram(ProgramHandle),
    BindGeometry {
        handle: GeometryHandle,
        attributes: Vec<AttributeBinding>,
    },
    WriteUniform {
        program: ProgramHandle,
        name: String,
        block: usize,
        offset: u32,
        bytes: Vec<u8>,
    },
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    SetSamplerUnit {
        program: ProgramHandle,
        texture_input: String,
        unit: u32,
    },
    DrawIndexed {
        index_count: u32,
    },
    Present,
}

/// Running totals of the per-frame work a [`HeadlessDevice`] has seen.
///
/// Kept whether or not the command log is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandCounts {
    pub draws: usize,
    pub texture_binds: usize,
    pub uniform_writes: usize,
}

/// A device that records commands instead of talking to a GPU.
///
/// Used by `--headless` runs and by tests that assert on the exact sequence
/// of device work a draw produced. Long runs should disable the log with
/// [`HeadlessDevice::without_log`] and read [`HeadlessDevice::counts`].
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    size: SurfaceSize,
    texture_units: u32,
    commands: Vec<DeviceCommand>,
    keep_log: bool,
    counts: CommandCounts,
    geometries: HashSet<GeometryHandle>,
    textures: HashSet<TextureHandle>,
    programs: HashSet<ProgramHandle>,
    bound_program: Option<ProgramHandle>,
    bound_geometry: Option<GeometryHandle>,
    frames: u64,
}

impl HeadlessDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: SurfaceSize::new(width, height),
            texture_units: DEFAULT_TEXTURE_UNITS,
            commands: Vec::new(),
            keep_log: true,
            counts: CommandCounts::default(),
            geometries: HashSet::new(),
            textures: HashSet::new(),
            programs: HashSet::new(),
            bound_program: None,
            bound_geometry: None,
            frames: 0,
        }
    }

    pub fn with_texture_units(mut self, units: u32) -> Self {
        self.texture_units = units;
        self
    }

    /// Stops retaining commands; counts and frames are still tracked.
    pub fn without_log(mut self) -> Self {
        self.keep_log = false;
        self.commands = Vec::new();
        self
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drains the recorded log.
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Draws issued since creation, including any drained from the log.
    pub fn draw_count(&self) -> usize {
        self.counts.draws
    }

    pub fn counts(&self) -> CommandCounts {
        self.counts
    }

    /// Frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_geometries(&self) -> usize {
        self.geometries.len()
    }

    fn record(&mut self, command: DeviceCommand) {
        match &command {
            DeviceCommand::DrawIndexed { .. } => self.counts.draws += 1,
            DeviceCommand::BindTexture { .. } => self.counts.texture_binds += 1,
            DeviceCommand::WriteUniform { .. } => self.counts.uniform_writes += 1,
            _ => {}
        }
        tracing::trace!(?command, "headless device");
        if self.keep_log {
            self.commands.push(command);
        }
    }
}

impl Device for HeadlessDevice {
    fn surface_size(&self) -> SurfaceSize {
        self.size
    }

    fn max_texture_units(&self) -> u32 {
        self.texture_units
    }

    fn resize_surface(&mut self, size: SurfaceSize) {
        self.size = size;
        self.record(DeviceCommand::ResizeSurface(size));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(DeviceCommand::SetViewport(viewport));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.record(DeviceCommand::SetDepthTest(enabled));
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), DeviceError> {
        self.record(DeviceCommand::Clear(color));
        Ok(())
    }

    fn create_geometry(&mut self, handle: GeometryHandle, geometry: &GeometryResource) -> Result<(), DeviceError> {
        self.geometries.insert(handle);
        self.record(DeviceCommand::CreateGeometry {
            handle,
            vertex_count: geometry.vertex_count(),
            index_count: geometry.index_count(),
        });
        Ok(())
    }

    fn destroy_geometry(&mut self, handle: GeometryHandle) {
        self.geometries.remove(&handle);
        if self.bound_geometry == Some(handle) {
            self.bound_geometry = None;
        }
        self.record(DeviceCommand::DestroyGeometry(handle));
    }

    fn create_texture(&mut self, handle: TextureHandle, texture: &TextureResource) -> Result<(), DeviceError> {
        self.textures.insert(handle);
        self.record(DeviceCommand::CreateTexture {
            handle,
            width: texture.width(),
            height: texture.height(),
        });
        Ok(())
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(&handle);
        self.record(DeviceCommand::DestroyTexture(handle));
    }

    fn create_program(&mut self, handle: ProgramHandle, program: &ShaderProgram) -> Result<(), DeviceError> {
        self.programs.insert(handle);
        self.record(DeviceCommand::CreateProgram {
            handle,
            label: program.label().to_string(),
        });
        Ok(())
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        self.programs.remove(&handle);
        if self.bound_program == Some(handle) {
            self.bound_program = None;
        }
        self.record(DeviceCommand::DestroyProgram(handle));
    }

    fn bind_program(&mut self, handle: ProgramHandle) {
        self.bound_program = Some(handle);
        self.record(DeviceCommand::BindProgram(handle));
    }

    fn bind_geometry(&mut self, handle: GeometryHandle, attributes: &[AttributeBinding]) {
        self.bound_geometry = Some(handle);
        self.record(DeviceCommand::BindGeometry {
            handle,
            attributes: attributes.to_vec(),
        });
    }

    fn write_uniform(&mut self, program: ProgramHandle, write: &UniformWrite) {
        self.record(DeviceCommand::WriteUniform {
            program,
            name: write.name.clone(),
            block: write.block,
            offset: write.offset,
            bytes: write.bytes.clone(),
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.record(DeviceCommand::BindTexture { unit, texture });
    }

    fn set_sampler_unit(&mut self, program: ProgramHandle, texture_input: &str, unit: u32) {
        self.record(DeviceCommand::SetSamplerUnit {
            program,
            texture_input: texture_input.to_string(),
            unit,
        });
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), DeviceError> {
        let program = self
            .bound_program
            .ok_or_else(|| DeviceError::Backend("draw issued without a bound program".into()))?;
        if !self.programs.contains(&program) {
            return Err(DeviceError::UnknownHandle {
                kind: "program",
                raw: program.raw(),
            });
        }
        if self.bound_geometry.is_none() {
            return Err(DeviceError::Backend("draw issued without bound geometry".into()));
        }
        self.record(DeviceCommand::DrawIndexed { index_count });
        Ok(())
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        self.frames += 1;
        self.record(DeviceCommand::Present);
        Ok(())
    }
}
