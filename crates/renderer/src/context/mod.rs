//! The rendering context: resource registry, input binding, and draw submission.

mod units;

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::device::{AttributeBinding, Device};
use crate::error::{BindError, RenderError, TypeMismatchError};
use crate::geometry::{GeometryError, GeometryResource};
use crate::handles::{GeometryHandle, ProgramHandle, TextureHandle};
use crate::program::{ShaderProgram, ShaderSource};
use crate::reflect::InputBinding;
use crate::texture::{TextureError, TextureInfo, TextureResource};
use crate::types::{ContextOptions, SurfaceSize, Viewport};
use crate::uniforms::{encode, UniformMap, UniformValue, UniformWrite};

use units::TextureUnits;

#[derive(Debug)]
struct GeometryRecord {
    label: String,
    attributes: BTreeMap<String, u32>,
    index_count: u32,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    label: String,
    /// Texture input name to the unit its sampler currently points at.
    sampler_units: HashMap<String, u32>,
    /// Keys already reported as not declared by this program.
    ignored: HashSet<String>,
}

struct TextureBind {
    input: String,
    texture: TextureHandle,
    unit: u32,
    needs_bind: bool,
}

/// Owns a [`Device`] and everything registered with it.
///
/// A context is created in the ready state: construction requires a device,
/// which in turn requires a drawing surface. Resize notifications only record
/// the new surface size; [`resize`](Self::resize) applies it between frames.
pub struct Context<D: Device> {
    device: D,
    surface: SurfaceSize,
    viewport: Viewport,
    clear_color: [f32; 4],
    depth_test: bool,
    next_handle: u64,
    geometries: HashMap<GeometryHandle, GeometryRecord>,
    textures: HashMap<TextureHandle, TextureInfo>,
    programs: HashMap<ProgramHandle, ProgramRecord>,
    units: TextureUnits,
    current_program: Option<ProgramHandle>,
    bound_program: Option<ProgramHandle>,
    bound_geometry: Option<(GeometryHandle, ProgramHandle)>,
    frames: u64,
}

impl<D: Device> Context<D> {
    pub fn new(device: D) -> Self {
        Self::with_options(device, ContextOptions::default())
    }

    pub fn with_options(mut device: D, options: ContextOptions) -> Self {
        let surface = device.surface_size();
        let viewport = Viewport::covering(surface);
        device.set_viewport(viewport);
        device.set_depth_test(options.depth_test);
        let units = TextureUnits::new(device.max_texture_units());
        info!(
            width = surface.width,
            height = surface.height,
            texture_units = device.max_texture_units(),
            "render context ready"
        );
        Self {
            device,
            surface,
            viewport,
            clear_color: options.clear_color,
            depth_test: options.depth_test,
            next_handle: 1,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            units,
            current_program: None,
            bound_program: None,
            bound_geometry: None,
            frames: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn surface_size(&self) -> SurfaceSize {
        self.surface
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    fn allocate_handle(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }

    /// Records the latest drawing-surface size without touching the device.
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface = SurfaceSize::new(width, height);
    }

    /// Applies the recorded surface size: reconfigures the device surface and
    /// sets the viewport to cover it.
    pub fn resize(&mut self) {
        self.viewport = Viewport::covering(self.surface);
        self.device.resize_surface(self.surface);
        self.device.set_viewport(self.viewport);
        debug!(
            width = self.surface.width,
            height = self.surface.height,
            "viewport resized"
        );
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn clear(&mut self) -> Result<(), RenderError> {
        self.device.clear(self.clear_color)?;
        Ok(())
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        if self.depth_test != enabled {
            self.depth_test = enabled;
            self.device.set_depth_test(enabled);
        }
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    /// Transfers the geometry's vertex and index data to the device.
    ///
    /// Uploading an already-uploaded geometry replaces its device data and keeps the handle.
    pub fn upload_geometry(&mut self, geometry: &mut GeometryResource) -> Result<GeometryHandle, RenderError> {
        if !geometry.has_cpu_data() {
            return Err(GeometryError::CpuDataReleased(geometry.label().to_string()).into());
        }
        let handle = match geometry.handle() {
            Some(handle) if self.geometries.contains_key(&handle) => {
                self.device.destroy_geometry(handle);
                if matches!(self.bound_geometry, Some((bound, _)) if bound == handle) {
                    self.bound_geometry = None;
                }
                handle
            }
            _ => GeometryHandle::new(self.allocate_handle()),
        };

        if let Err(err) = self.device.create_geometry(handle, geometry) {
            self.geometries.remove(&handle);
            geometry.set_handle(None);
            return Err(err.into());
        }
        self.geometries.insert(
            handle,
            GeometryRecord {
                label: geometry.label().to_string(),
                attributes: geometry
                    .attribute_layout()
                    .map(|(name, components)| (name.to_string(), components))
                    .collect(),
                index_count: geometry.index_count(),
            },
        );
        geometry.set_handle(Some(handle));
        debug!(
            geometry = geometry.label(),
            %handle,
            vertices = geometry.vertex_count(),
            indices = geometry.index_count(),
            "uploaded geometry"
        );
        Ok(handle)
    }

    pub fn release_geometry(&mut self, geometry: &mut GeometryResource) {
        if let Some(handle) = geometry.handle() {
            if self.geometries.remove(&handle).is_some() {
                self.device.destroy_geometry(handle);
            }
            if matches!(self.bound_geometry, Some((bound, _)) if bound == handle) {
                self.bound_geometry = None;
            }
        }
        geometry.set_handle(None);
    }

    /// Transfers texels to a sampled device texture.
    ///
    /// Re-uploading keeps the handle and unit assignment but replaces the device texture.
    pub fn upload_texture(&mut self, texture: &mut TextureResource) -> Result<TextureHandle, RenderError> {
        if !texture.has_cpu_data() {
            return Err(TextureError::CpuDataReleased(texture.label().to_string()).into());
        }
        let handle = match texture.handle() {
            Some(handle) if self.textures.contains_key(&handle) => {
                self.device.destroy_texture(handle);
                self.units.invalidate(handle);
                handle
            }
            _ => TextureHandle::new(self.allocate_handle()),
        };

        if let Err(err) = self.device.create_texture(handle, texture) {
            self.textures.remove(&handle);
            self.units.release(handle);
            texture.set_handle(None);
            return Err(err.into());
        }
        self.textures.insert(handle, texture.info());
        texture.set_handle(Some(handle));
        debug!(
            texture = texture.label(),
            %handle,
            width = texture.width(),
            height = texture.height(),
            "uploaded texture"
        );
        Ok(handle)
    }

    pub fn release_texture(&mut self, texture: &mut TextureResource) {
        if let Some(handle) = texture.handle() {
            if self.textures.remove(&handle).is_some() {
                self.device.destroy_texture(handle);
            }
            self.units.release(handle);
        }
        texture.set_handle(None);
    }

    /// Width, height, and format of an uploaded texture.
    pub fn texture_info(&self, handle: TextureHandle) -> Option<TextureInfo> {
        self.textures.get(&handle).copied()
    }

    /// Compiles and links `source`, registers it with the device, and makes it
    /// the current program candidate.
    pub fn compile_program(&mut self, source: &ShaderSource) -> Result<ShaderProgram, RenderError> {
        let mut program = ShaderProgram::compile(source)?;
        self.register_program(&mut program)?;
        Ok(program)
    }

    /// Registers an already linked program with the device.
    pub fn register_program(&mut self, program: &mut ShaderProgram) -> Result<ProgramHandle, RenderError> {
        if let Some(handle) = program.handle() {
            if self.programs.contains_key(&handle) {
                return Ok(handle);
            }
        }
        let handle = ProgramHandle::new(self.allocate_handle());
        self.device.create_program(handle, program)?;
        self.programs.insert(
            handle,
            ProgramRecord {
                label: program.label().to_string(),
                ..ProgramRecord::default()
            },
        );
        program.set_handle(Some(handle));
        self.current_program = Some(handle);
        info!(
            program = program.label(),
            %handle,
            inputs = program.declared_inputs().len(),
            "registered shader program"
        );
        Ok(handle)
    }

    pub fn release_program(&mut self, program: &mut ShaderProgram) {
        if let Some(handle) = program.handle() {
            if self.programs.remove(&handle).is_some() {
                self.device.destroy_program(handle);
            }
            if self.current_program == Some(handle) {
                self.current_program = None;
            }
            if self.bound_program == Some(handle) {
                self.bound_program = None;
                self.bound_geometry = None;
            }
        }
        program.set_handle(None);
    }

    /// Most recently compiled program.
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    /// Binds `uniforms` to `program`'s declared inputs and issues one indexed draw.
    ///
    /// Every supplied key is resolved and encoded before the device sees any
    /// command, so a failing key leaves the device untouched and nothing is
    /// drawn. Keys the program does not declare are skipped.
    pub fn draw(
        &mut self,
        geometry: &GeometryResource,
        program: &ShaderProgram,
        uniforms: &UniformMap,
    ) -> Result<(), RenderError> {
        let program_handle = program
            .handle()
            .filter(|handle| self.programs.contains_key(handle))
            .ok_or_else(|| BindError::ProgramNotCompiled(program.label().to_string()))?;
        let geometry_handle = geometry
            .handle()
            .filter(|handle| self.geometries.contains_key(handle))
            .ok_or_else(|| BindError::GeometryNotUploaded(geometry.label().to_string()))?;

        let attributes = self.resolve_attributes(program, geometry_handle)?;
        let (writes, textures) = self.resolve_uniforms(program, program_handle, uniforms)?;
        let index_count = self
            .geometries
            .get(&geometry_handle)
            .map(|record| record.index_count)
            .unwrap_or(0);

        if self.bound_program != Some(program_handle) {
            self.device.bind_program(program_handle);
            self.bound_program = Some(program_handle);
        }
        if self.bound_geometry != Some((geometry_handle, program_handle)) {
            self.device.bind_geometry(geometry_handle, &attributes);
            self.bound_geometry = Some((geometry_handle, program_handle));
        }
        for write in &writes {
            self.device.write_uniform(program_handle, write);
        }
        for bind in textures {
            if bind.needs_bind {
                self.device.bind_texture(bind.unit, bind.texture);
                self.units.mark_bound(bind.unit, bind.texture);
            }
            let Some(record) = self.programs.get_mut(&program_handle) else {
                continue;
            };
            if record.sampler_units.get(&bind.input) != Some(&bind.unit) {
                self.device.set_sampler_unit(program_handle, &bind.input, bind.unit);
                record.sampler_units.insert(bind.input, bind.unit);
            }
        }
        self.device.draw_indexed(index_count)?;
        Ok(())
    }

    fn resolve_attributes(
        &self,
        program: &ShaderProgram,
        geometry: GeometryHandle,
    ) -> Result<Vec<AttributeBinding>, BindError> {
        let Some(record) = self.geometries.get(&geometry) else {
            return Err(BindError::GeometryNotUploaded(geometry.to_string()));
        };
        program
            .declared_inputs()
            .attributes()
            .into_iter()
            .map(|(input, slot)| {
                let found = record.attributes.get(&input.name).copied().ok_or_else(|| {
                    BindError::MissingAttribute {
                        program: program.label().to_string(),
                        geometry: record.label.clone(),
                        attribute: input.name.clone(),
                    }
                })?;
                if found != slot.components {
                    return Err(BindError::AttributeLayout {
                        attribute: input.name.clone(),
                        expected: slot.components,
                        found,
                    });
                }
                Ok(AttributeBinding {
                    name: input.name.clone(),
                    location: slot.location,
                    components: slot.components,
                })
            })
            .collect()
    }

    fn resolve_uniforms(
        &mut self,
        program: &ShaderProgram,
        handle: ProgramHandle,
        uniforms: &UniformMap,
    ) -> Result<(Vec<UniformWrite>, Vec<TextureBind>), RenderError> {
        let inputs = program.declared_inputs();
        let mut writes = Vec::new();
        let mut textures = Vec::new();

        for (key, value) in uniforms.iter() {
            let Some((input, start)) = inputs.resolve(key) else {
                self.note_ignored(handle, key);
                continue;
            };
            match (input.binding, value) {
                (InputBinding::Uniform(slot), _) => {
                    writes.push(encode(key, input, slot, start, value)?);
                }
                (InputBinding::Texture(_), UniformValue::Texture(texture)) => {
                    if !self.textures.contains_key(texture) {
                        return Err(BindError::TextureNotUploaded {
                            uniform: key.to_string(),
                        }
                        .into());
                    }
                    let assignment = self.units.assign(*texture)?;
                    textures.push(TextureBind {
                        input: input.name.clone(),
                        texture: *texture,
                        unit: assignment.unit,
                        needs_bind: assignment.needs_bind,
                    });
                }
                (InputBinding::Texture(_), other) => {
                    return Err(TypeMismatchError {
                        name: key.to_string(),
                        expected: input.kind,
                        found: other.describe(),
                    }
                    .into());
                }
                (InputBinding::Attribute(_), _) => {
                    self.note_ignored(handle, key);
                }
            }
        }

        // Two keys addressing the same texture input leave one unit change per draw.
        let mut seen = HashSet::new();
        textures.retain(|bind| seen.insert(bind.input.clone()));

        Ok((writes, textures))
    }

    fn note_ignored(&mut self, program: ProgramHandle, key: &str) {
        if let Some(record) = self.programs.get_mut(&program) {
            if record.ignored.insert(key.to_string()) {
                debug!(program = %record.label, key, "uniform not declared by program; ignoring");
            }
        }
    }

    /// Finishes the frame and hands it to the surface.
    pub fn present(&mut self) -> Result<(), RenderError> {
        self.device.present()?;
        self.frames += 1;
        Ok(())
    }

    /// Number of textures currently holding a unit.
    pub fn assigned_texture_units(&self) -> usize {
        self.units.len()
    }
}
