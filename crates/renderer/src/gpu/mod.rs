//! wgpu implementation of [`Device`].
//!
//! All draws of a frame are recorded into one command encoder. Each draw
//! copies its program's staged uniform blocks into the GPU buffers through a
//! fresh staging buffer on that encoder, so later draws cannot overwrite the
//! values an earlier draw was recorded with.

mod context;
mod pipeline;
mod textures;

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use wgpu::util::DeviceExt;

use crate::device::{AttributeBinding, Device};
use crate::error::DeviceError;
use crate::geometry::GeometryResource;
use crate::handles::{GeometryHandle, ProgramHandle, TextureHandle};
use crate::program::ShaderProgram;
use crate::texture::TextureResource;
use crate::types::{ColorSpaceMode, SurfaceSize, Viewport};
use crate::uniforms::UniformWrite;

use context::{DepthTarget, SurfaceContext};
use pipeline::{GpuProgram, PipelineCache};
use textures::GpuTexture;

struct GpuGeometry {
    buffers: BTreeMap<String, wgpu::Buffer>,
    index_buffer: wgpu::Buffer,
}

struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

/// Renders into a window surface through wgpu.
pub struct WgpuDevice {
    context: SurfaceContext,
    depth: DepthTarget,
    frame: Option<Frame>,
    viewport: Viewport,
    depth_test: bool,
    pending_clear: Option<[f32; 4]>,
    geometries: HashMap<GeometryHandle, GpuGeometry>,
    textures: HashMap<TextureHandle, GpuTexture>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    pipelines: PipelineCache,
    units: Vec<Option<TextureHandle>>,
    placeholder: GpuTexture,
    bound_program: Option<ProgramHandle>,
    bound_geometry: Option<(GeometryHandle, Vec<AttributeBinding>)>,
}

impl WgpuDevice {
    /// Acquires an adapter and device for `target` and configures its surface.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        size: SurfaceSize,
        color_space: ColorSpaceMode,
    ) -> Result<Self> {
        let context = SurfaceContext::new(target, size, color_space)?;
        let depth = DepthTarget::new(&context.device, context.size);
        let placeholder = textures::placeholder(&context.device, &context.queue);
        let units = vec![None; context.max_texture_units as usize];
        tracing::info!(
            format = ?context.surface_format,
            width = context.size.width,
            height = context.size.height,
            "wgpu device ready"
        );
        Ok(Self {
            viewport: Viewport::covering(context.size),
            context,
            depth,
            frame: None,
            depth_test: false,
            pending_clear: None,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            pipelines: PipelineCache::default(),
            units,
            placeholder,
            bound_program: None,
            bound_geometry: None,
        })
    }

    fn ensure_frame(&mut self) -> Result<(), DeviceError> {
        if self.frame.is_some() {
            return Ok(());
        }
        let surface_texture = match self.context.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                tracing::warn!(error = %err, "surface lost; reconfiguring");
                self.context.reconfigure();
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        self.frame = Some(Frame {
            surface_texture,
            view,
            encoder,
        });
        Ok(())
    }

    /// Load operations for the next pass, consuming any pending clear.
    fn take_load_ops(&mut self) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>) {
        match self.pending_clear.take() {
            Some([r, g, b, a]) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(r),
                    g: f64::from(g),
                    b: f64::from(b),
                    a: f64::from(a),
                }),
                wgpu::LoadOp::Clear(1.0),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        }
    }

    fn unknown(kind: &'static str, raw: u64) -> DeviceError {
        DeviceError::UnknownHandle { kind, raw }
    }
}

impl Device for WgpuDevice {
    fn surface_size(&self) -> SurfaceSize {
        self.context.size
    }

    fn max_texture_units(&self) -> u32 {
        self.context.max_texture_units
    }

    fn resize_surface(&mut self, size: SurfaceSize) {
        if size.is_empty() {
            tracing::debug!("ignoring resize to an empty surface");
            return;
        }
        if self.frame.take().is_some() {
            tracing::warn!("discarding in-flight frame for resize");
        }
        self.context.resize(size);
        if self.depth.size != size {
            self.depth = DepthTarget::new(&self.context.device, size);
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), DeviceError> {
        self.pending_clear = Some(color);
        Ok(())
    }

    fn create_geometry(&mut self, handle: GeometryHandle, geometry: &GeometryResource) -> Result<(), DeviceError> {
        let device = &self.context.device;
        let buffers = geometry
            .attribute_layout()
            .filter_map(|(name, _)| geometry.attribute(name).map(|attribute| (name, attribute)))
            .map(|(name, attribute)| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} {name}", geometry.label())),
                    contents: bytemuck::cast_slice(attribute.data()),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                (name.to_string(), buffer)
            })
            .collect();
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} indices", geometry.label())),
            contents: bytemuck::cast_slice(geometry.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.geometries.insert(
            handle,
            GpuGeometry {
                buffers,
                index_buffer,
            },
        );
        Ok(())
    }

    fn destroy_geometry(&mut self, handle: GeometryHandle) {
        self.geometries.remove(&handle);
        if matches!(&self.bound_geometry, Some((bound, _)) if *bound == handle) {
            self.bound_geometry = None;
        }
    }

    fn create_texture(&mut self, handle: TextureHandle, texture: &TextureResource) -> Result<(), DeviceError> {
        let gpu = textures::upload(&self.context.device, &self.context.queue, texture);
        self.textures.insert(handle, gpu);
        Ok(())
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(&handle);
        for unit in self.units.iter_mut().filter(|unit| **unit == Some(handle)) {
            *unit = None;
        }
    }

    fn create_program(&mut self, handle: ProgramHandle, program: &ShaderProgram) -> Result<(), DeviceError> {
        let gpu = GpuProgram::new(&self.context.device, program);
        self.programs.insert(handle, gpu);
        Ok(())
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        self.programs.remove(&handle);
        self.pipelines.evict(handle);
        if self.bound_program == Some(handle) {
            self.bound_program = None;
        }
    }

    fn bind_program(&mut self, handle: ProgramHandle) {
        self.bound_program = Some(handle);
    }

    fn bind_geometry(&mut self, handle: GeometryHandle, attributes: &[AttributeBinding]) {
        self.bound_geometry = Some((handle, attributes.to_vec()));
    }

    fn write_uniform(&mut self, program: ProgramHandle, write: &UniformWrite) {
        let Some(block) = self
            .programs
            .get_mut(&program)
            .and_then(|program| program.blocks.get_mut(write.block))
        else {
            tracing::warn!(uniform = %write.name, "uniform write for unknown block");
            return;
        };
        let start = write.offset as usize;
        let end = start + write.bytes.len();
        match block.staging.get_mut(start..end) {
            Some(target) => target.copy_from_slice(&write.bytes),
            None => tracing::warn!(
                uniform = %write.name,
                start,
                end,
                size = block.staging.len(),
                "uniform write outside its block"
            ),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        let index = unit as usize;
        if index >= self.units.len() {
            self.units.resize(index + 1, None);
        }
        self.units[index] = Some(texture);
    }

    fn set_sampler_unit(&mut self, program: ProgramHandle, texture_input: &str, unit: u32) {
        if let Some(input) = self
            .programs
            .get_mut(&program)
            .and_then(|program| program.textures.iter_mut().find(|input| input.name == texture_input))
        {
            input.unit = Some(unit);
        }
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), DeviceError> {
        let program_handle = self
            .bound_program
            .ok_or_else(|| DeviceError::Backend("draw issued without a bound program".into()))?;
        let (geometry_handle, attributes) = self
            .bound_geometry
            .clone()
            .ok_or_else(|| DeviceError::Backend("draw issued without bound geometry".into()))?;
        self.ensure_frame()?;
        let (color_load, depth_load) = self.take_load_ops();

        let device = &self.context.device;
        let program = self
            .programs
            .get(&program_handle)
            .ok_or_else(|| Self::unknown("program", program_handle.raw()))?;
        let geometry = self
            .geometries
            .get(&geometry_handle)
            .ok_or_else(|| Self::unknown("geometry", geometry_handle.raw()))?;
        let pipeline = self.pipelines.get_or_build(
            device,
            program_handle,
            program,
            self.context.surface_format,
            self.depth_test,
        );
        let bind_groups = program.bind_groups(device, &self.units, &self.textures, &self.placeholder);
        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| DeviceError::Backend("no frame in flight".into()))?;

        for block in &program.blocks {
            let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("uniform staging"),
                contents: &block.staging,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
            frame
                .encoder
                .copy_buffer_to_buffer(&staging, 0, &block.buffer, 0, block.staging.len() as u64);
        }

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("draw pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(viewport) = self.viewport.clamped_to(self.context.size) else {
            return Ok(());
        };
        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(&pipeline);
        for (group, bind_group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(group as u32, bind_group, &[]);
        }
        for (slot, attribute) in attributes.iter().enumerate() {
            let buffer = geometry
                .buffers
                .get(&attribute.name)
                .ok_or_else(|| DeviceError::Backend(format!("geometry lacks buffer `{}`", attribute.name)))?;
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..index_count, 0, 0..1);
        Ok(())
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        if self.frame.is_none() && self.pending_clear.is_some() {
            self.ensure_frame()?;
            let (color_load, depth_load) = self.take_load_ops();
            if let Some(frame) = self.frame.as_mut() {
                let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("clear pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &frame.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: color_load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
            }
        }

        let Some(frame) = self.frame.take() else {
            return Ok(());
        };
        self.context.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.surface_texture.present();
        Ok(())
    }
}
