use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::handles::{ProgramHandle, TextureHandle};
use crate::program::ShaderProgram;
use crate::reflect::{ResourceSlot, TextureSlot};

use super::context::DEPTH_FORMAT;
use super::textures::GpuTexture;

/// One std140 block: the GPU buffer plus the CPU image staged into it per draw.
pub(crate) struct GpuUniformBlock {
    pub slot: ResourceSlot,
    pub buffer: wgpu::Buffer,
    pub staging: Vec<u8>,
}

pub(crate) struct GpuTextureInput {
    pub name: String,
    pub slot: TextureSlot,
    pub unit: Option<u32>,
}

#[derive(Clone, Copy)]
pub(crate) struct GpuAttribute {
    pub location: u32,
    pub components: u32,
}

/// Device objects derived from a linked [`ShaderProgram`].
pub(crate) struct GpuProgram {
    pub label: String,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    pub blocks: Vec<GpuUniformBlock>,
    pub textures: Vec<GpuTextureInput>,
    attributes: Vec<GpuAttribute>,
}

impl GpuProgram {
    pub(crate) fn new(device: &wgpu::Device, program: &ShaderProgram) -> Self {
        let label = program.label().to_string();
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vertex")),
            source: wgpu::ShaderSource::Naga(Cow::Owned(program.vertex_module().clone())),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} fragment")),
            source: wgpu::ShaderSource::Naga(Cow::Owned(program.fragment_module().clone())),
        });

        let inputs = program.declared_inputs();
        let mut groups: BTreeMap<u32, Vec<wgpu::BindGroupLayoutEntry>> = BTreeMap::new();

        let blocks = inputs
            .uniform_blocks()
            .iter()
            .map(|block| {
                groups.entry(block.slot.group).or_default().push(wgpu::BindGroupLayoutEntry {
                    binding: block.slot.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                });
                GpuUniformBlock {
                    slot: block.slot,
                    buffer: device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(&format!("{label} {}", block.name)),
                        size: u64::from(block.size),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    }),
                    staging: vec![0; block.size as usize],
                }
            })
            .collect();

        let textures = inputs
            .textures()
            .map(|(input, slot)| {
                let entries = groups.entry(slot.texture.group).or_default();
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: slot.texture.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                });
                groups.entry(slot.sampler.group).or_default().push(wgpu::BindGroupLayoutEntry {
                    binding: slot.sampler.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
                GpuTextureInput {
                    name: input.name.clone(),
                    slot,
                    unit: None,
                }
            })
            .collect();

        // Bind group indices must be dense, so unused groups get empty layouts.
        let group_count = groups.keys().next_back().map(|last| last + 1).unwrap_or(0);
        let group_layouts: Vec<wgpu::BindGroupLayout> = (0..group_count)
            .map(|group| {
                let entries = groups.get(&group).map(Vec::as_slice).unwrap_or(&[]);
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{label} group {group}")),
                    entries,
                })
            })
            .collect();
        let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &[],
        });

        let attributes = inputs
            .attributes()
            .into_iter()
            .map(|(_, slot)| GpuAttribute {
                location: slot.location,
                components: slot.components,
            })
            .collect();

        Self {
            label,
            vertex_module,
            fragment_module,
            group_layouts,
            pipeline_layout,
            blocks,
            textures,
            attributes,
        }
    }

    /// Builds one bind group per layout group from the current unit contents.
    pub(crate) fn bind_groups(
        &self,
        device: &wgpu::Device,
        units: &[Option<TextureHandle>],
        textures: &HashMap<TextureHandle, GpuTexture>,
        placeholder: &GpuTexture,
    ) -> Vec<wgpu::BindGroup> {
        self.group_layouts
            .iter()
            .enumerate()
            .map(|(group, layout)| {
                let group = group as u32;
                let mut entries = Vec::new();
                for block in self.blocks.iter().filter(|block| block.slot.group == group) {
                    entries.push(wgpu::BindGroupEntry {
                        binding: block.slot.binding,
                        resource: block.buffer.as_entire_binding(),
                    });
                }
                for input in &self.textures {
                    let bound = input
                        .unit
                        .and_then(|unit| units.get(unit as usize).copied().flatten())
                        .and_then(|handle| textures.get(&handle))
                        .unwrap_or(placeholder);
                    if input.slot.texture.group == group {
                        entries.push(wgpu::BindGroupEntry {
                            binding: input.slot.texture.binding,
                            resource: wgpu::BindingResource::TextureView(&bound.view),
                        });
                    }
                    if input.slot.sampler.group == group {
                        entries.push(wgpu::BindGroupEntry {
                            binding: input.slot.sampler.binding,
                            resource: wgpu::BindingResource::Sampler(&bound.sampler),
                        });
                    }
                }
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{} group {group}", self.label)),
                    layout,
                    entries: &entries,
                })
            })
            .collect()
    }

    fn build_pipeline(
        &self,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        depth_test: bool,
    ) -> wgpu::RenderPipeline {
        let vertex_attributes: Vec<[wgpu::VertexAttribute; 1]> = self
            .attributes
            .iter()
            .map(|attribute| {
                [wgpu::VertexAttribute {
                    format: vertex_format(attribute.components),
                    offset: 0,
                    shader_location: attribute.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = self
            .attributes
            .iter()
            .zip(&vertex_attributes)
            .map(|(attribute, layout)| wgpu::VertexBufferLayout {
                array_stride: u64::from(attribute.components) * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: layout,
            })
            .collect();

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} pipeline (depth {depth_test})", self.label)),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex_module,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_test,
                depth_compare: if depth_test {
                    wgpu::CompareFunction::Less
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

/// Render pipelines keyed by program and depth-test state.
#[derive(Default)]
pub(crate) struct PipelineCache {
    pipelines: HashMap<(ProgramHandle, bool), wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub(crate) fn get_or_build(
        &mut self,
        device: &wgpu::Device,
        handle: ProgramHandle,
        program: &GpuProgram,
        surface_format: wgpu::TextureFormat,
        depth_test: bool,
    ) -> wgpu::RenderPipeline {
        self.pipelines
            .entry((handle, depth_test))
            .or_insert_with(|| {
                tracing::debug!(program = %program.label, depth_test, "building render pipeline");
                program.build_pipeline(device, surface_format, depth_test)
            })
            .clone()
    }

    pub(crate) fn evict(&mut self, handle: ProgramHandle) {
        self.pipelines.retain(|(program, _), _| *program != handle);
    }
}
