//! Builds the name-keyed input table of a linked program from naga IR.
//!
//! Naming follows the GL convention so callers can address any bindable
//! leaf through a dotted path:
//!
//! * block members are `block.member`, where `block` is the instance name
//!   of the uniform block (falling back to its type name);
//! * arrays of scalars, vectors, or matrices register once as `name[0]`
//!   with an element count;
//! * nested structs and arrays of structs expand to one entry per leaf,
//!   e.g. `lights.entries[1].color`;
//! * separate textures register under their own name and must pair with a
//!   sampler called `<texture>Sampler`;
//! * vertex inputs register under their declared variable name.

use std::collections::BTreeMap;
use std::fmt;

use wgpu::naga::{self, ArraySize, Binding, ScalarKind, ShaderStage, TypeInner, VectorSize};

use crate::error::CompileError;

/// Suffix a sampler must carry to pair with the texture it samples.
pub const SAMPLER_SUFFIX: &str = "Sampler";

/// Shape of a declared input as the binding layer understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Float,
    /// Signed or unsigned 32-bit integer. Booleans bind here as 0 or 1.
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Sampler,
    Unsupported,
}

impl InputKind {
    /// Number of 32-bit components in one element, for float-backed kinds.
    pub fn float_components(self) -> Option<u32> {
        match self {
            InputKind::Float => Some(1),
            InputKind::Vec2 => Some(2),
            InputKind::Vec3 => Some(3),
            InputKind::Vec4 => Some(4),
            InputKind::Mat4 => Some(16),
            InputKind::Int | InputKind::Sampler | InputKind::Unsupported => None,
        }
    }

    /// Bytes written for a single element.
    pub fn element_size(self) -> u32 {
        match self {
            InputKind::Int => 4,
            other => other.float_components().map(|c| c * 4).unwrap_or(0),
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InputKind::Float => "float",
            InputKind::Int => "int",
            InputKind::Vec2 => "vec2",
            InputKind::Vec3 => "vec3",
            InputKind::Vec4 => "vec4",
            InputKind::Mat4 => "mat4",
            InputKind::Sampler => "sampler",
            InputKind::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// A `(group, binding)` pair in the pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceSlot {
    pub group: u32,
    pub binding: u32,
}

impl fmt::Display for ResourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set {} binding {}", self.group, self.binding)
    }
}

/// Where a uniform leaf lives inside its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    /// Index into [`InputTable::uniform_blocks`].
    pub block: usize,
    pub offset: u32,
    /// Distance between consecutive array elements; equals the element size for non-arrays.
    pub stride: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub texture: ResourceSlot,
    pub sampler: ResourceSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSlot {
    pub location: u32,
    pub components: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBinding {
    Uniform(UniformSlot),
    Texture(TextureSlot),
    Attribute(AttributeSlot),
}

/// One named, bindable input of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredInput {
    pub name: String,
    pub kind: InputKind,
    /// Element count for arrays, `None` for single values.
    pub array_len: Option<u32>,
    pub binding: InputBinding,
}

impl DeclaredInput {
    pub fn is_attribute(&self) -> bool {
        matches!(self.binding, InputBinding::Attribute(_))
    }

    pub fn uniform_slot(&self) -> Option<UniformSlot> {
        match self.binding {
            InputBinding::Uniform(slot) => Some(slot),
            _ => None,
        }
    }
}

/// A std140 uniform block shared by the stages that declare it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub slot: ResourceSlot,
    pub size: u32,
}

/// Every input a linked program declares, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputTable {
    inputs: BTreeMap<String, DeclaredInput>,
    blocks: Vec<UniformBlock>,
}

impl InputTable {
    pub fn get(&self, name: &str) -> Option<&DeclaredInput> {
        self.inputs.get(name)
    }

    /// Resolves a caller key to a declared input and the first array element it addresses.
    ///
    /// `name[0]` entries may be addressed as `name` or `name[i]`.
    pub fn resolve(&self, key: &str) -> Option<(&DeclaredInput, u32)> {
        if let Some(input) = self.inputs.get(key) {
            return Some((input, 0));
        }
        if let Some((base, index)) = split_index(key) {
            let input = self.inputs.get(&format!("{base}[0]"))?;
            let len = input.array_len?;
            return (index < len).then_some((input, index));
        }
        let input = self.inputs.get(&format!("{key}[0]"))?;
        input.array_len.map(|_| (input, 0))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclaredInput> {
        self.inputs.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn uniform_blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    /// Vertex attributes ordered by shader location.
    pub fn attributes(&self) -> Vec<(&DeclaredInput, AttributeSlot)> {
        let mut attributes: Vec<_> = self
            .inputs
            .values()
            .filter_map(|input| match input.binding {
                InputBinding::Attribute(slot) => Some((input, slot)),
                _ => None,
            })
            .collect();
        attributes.sort_by_key(|(_, slot)| slot.location);
        attributes
    }

    pub fn textures(&self) -> impl Iterator<Item = (&DeclaredInput, TextureSlot)> {
        self.inputs.values().filter_map(|input| match input.binding {
            InputBinding::Texture(slot) => Some((input, slot)),
            _ => None,
        })
    }

    fn insert(&mut self, input: DeclaredInput) -> Result<(), CompileError> {
        match self.inputs.get(&input.name) {
            Some(existing) if *existing != input => Err(CompileError::link(format!(
                "`{}` is declared differently by the vertex and fragment stages",
                input.name
            ))),
            Some(_) => Ok(()),
            None => {
                self.inputs.insert(input.name.clone(), input);
                Ok(())
            }
        }
    }
}

fn split_index(key: &str) -> Option<(&str, u32)> {
    let body = key.strip_suffix(']')?;
    let open = body.rfind('[')?;
    let index = body[open + 1..].parse().ok()?;
    Some((&body[..open], index))
}

/// Reflects and links the two stage modules into an [`InputTable`].
pub(crate) fn link(vertex: &naga::Module, fragment: &naga::Module) -> Result<InputTable, CompileError> {
    let mut table = InputTable::default();
    let mut resources: BTreeMap<ResourceSlot, String> = BTreeMap::new();

    for module in [vertex, fragment] {
        reflect_uniform_blocks(module, &mut table, &mut resources)?;
        reflect_textures(module, &mut table, &mut resources)?;
    }
    reflect_attributes(vertex, &mut table)?;
    check_varyings(vertex, fragment)?;

    Ok(table)
}

fn claim_slot(
    resources: &mut BTreeMap<ResourceSlot, String>,
    slot: ResourceSlot,
    name: &str,
) -> Result<(), CompileError> {
    match resources.get(&slot) {
        Some(owner) if owner != name => Err(CompileError::link(format!(
            "`{name}` and `{owner}` both use {slot}"
        ))),
        Some(_) => Ok(()),
        None => {
            resources.insert(slot, name.to_string());
            Ok(())
        }
    }
}

fn binding_of(global: &naga::GlobalVariable, name: &str) -> Result<ResourceSlot, CompileError> {
    global
        .binding
        .as_ref()
        .map(|binding| ResourceSlot {
            group: binding.group,
            binding: binding.binding,
        })
        .ok_or_else(|| CompileError::link(format!("`{name}` has no set/binding layout qualifier")))
}

fn reflect_uniform_blocks(
    module: &naga::Module,
    table: &mut InputTable,
    resources: &mut BTreeMap<ResourceSlot, String>,
) -> Result<(), CompileError> {
    for (_, global) in module.global_variables.iter() {
        if global.space != naga::AddressSpace::Uniform {
            continue;
        }
        let ty = &module.types[global.ty];
        let TypeInner::Struct { span, .. } = ty.inner else {
            continue;
        };
        let Some(name) = global.name.clone().or_else(|| ty.name.clone()) else {
            return Err(CompileError::link("uniform block without a name"));
        };
        let slot = binding_of(global, &name)?;
        claim_slot(resources, slot, &name)?;

        let block = match table.blocks.iter().position(|block| block.name == name) {
            Some(index) => {
                let existing = &table.blocks[index];
                if existing.slot != slot || existing.size != span {
                    return Err(CompileError::link(format!(
                        "uniform block `{name}` has a different layout in each stage"
                    )));
                }
                index
            }
            None => {
                table.blocks.push(UniformBlock {
                    name: name.clone(),
                    slot,
                    size: span,
                });
                table.blocks.len() - 1
            }
        };

        flatten(module, global.ty, &name, 0, block, table)?;
    }
    Ok(())
}

fn flatten(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    path: &str,
    offset: u32,
    block: usize,
    table: &mut InputTable,
) -> Result<(), CompileError> {
    match module.types[ty].inner {
        TypeInner::Struct { ref members, .. } => {
            for (index, member) in members.iter().enumerate() {
                let child = match &member.name {
                    Some(name) => format!("{path}.{name}"),
                    None => format!("{path}._{index}"),
                };
                flatten(module, member.ty, &child, offset + member.offset, block, table)?;
            }
            Ok(())
        }
        TypeInner::Array { base, size, stride } => {
            let len = match size {
                ArraySize::Constant(len) => len.get(),
                _ => {
                    return table.insert(DeclaredInput {
                        name: format!("{path}[0]"),
                        kind: InputKind::Unsupported,
                        array_len: None,
                        binding: InputBinding::Uniform(UniformSlot {
                            block,
                            offset,
                            stride,
                        }),
                    })
                }
            };
            if matches!(module.types[base].inner, TypeInner::Struct { .. } | TypeInner::Array { .. }) {
                for element in 0..len {
                    flatten(
                        module,
                        base,
                        &format!("{path}[{element}]"),
                        offset + element * stride,
                        block,
                        table,
                    )?;
                }
                return Ok(());
            }
            table.insert(DeclaredInput {
                name: format!("{path}[0]"),
                kind: leaf_kind(&module.types[base].inner),
                array_len: Some(len),
                binding: InputBinding::Uniform(UniformSlot {
                    block,
                    offset,
                    stride,
                }),
            })
        }
        ref inner => {
            let kind = leaf_kind(inner);
            table.insert(DeclaredInput {
                name: path.to_string(),
                kind,
                array_len: None,
                binding: InputBinding::Uniform(UniformSlot {
                    block,
                    offset,
                    stride: kind.element_size(),
                }),
            })
        }
    }
}

fn leaf_kind(inner: &TypeInner) -> InputKind {
    match *inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Float => InputKind::Float,
            ScalarKind::Sint | ScalarKind::Uint => InputKind::Int,
            _ => InputKind::Unsupported,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            match size {
                VectorSize::Bi => InputKind::Vec2,
                VectorSize::Tri => InputKind::Vec3,
                VectorSize::Quad => InputKind::Vec4,
            }
        }
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.width == 4 => InputKind::Mat4,
        _ => InputKind::Unsupported,
    }
}

fn reflect_textures(
    module: &naga::Module,
    table: &mut InputTable,
    resources: &mut BTreeMap<ResourceSlot, String>,
) -> Result<(), CompileError> {
    let mut images = Vec::new();
    let mut samplers = BTreeMap::new();
    for (_, global) in module.global_variables.iter() {
        if global.space != naga::AddressSpace::Handle {
            continue;
        }
        let Some(name) = global.name.clone() else {
            continue;
        };
        match module.types[global.ty].inner {
            TypeInner::Image { .. } => {
                let slot = binding_of(global, &name)?;
                claim_slot(resources, slot, &name)?;
                images.push((name, slot));
            }
            TypeInner::Sampler { .. } => {
                let slot = binding_of(global, &name)?;
                claim_slot(resources, slot, &name)?;
                samplers.insert(name, slot);
            }
            _ => {}
        }
    }

    for (name, texture) in images {
        let sampler_name = format!("{name}{SAMPLER_SUFFIX}");
        let sampler = samplers.get(&sampler_name).copied().ok_or_else(|| {
            CompileError::link(format!("texture `{name}` has no sampler named `{sampler_name}`"))
        })?;
        table.insert(DeclaredInput {
            name,
            kind: InputKind::Sampler,
            array_len: None,
            binding: InputBinding::Texture(TextureSlot { texture, sampler }),
        })?;
    }
    Ok(())
}

fn entry_point(module: &naga::Module, stage: ShaderStage) -> Option<&naga::EntryPoint> {
    module.entry_points.iter().find(|entry| entry.stage == stage)
}

fn reflect_attributes(vertex: &naga::Module, table: &mut InputTable) -> Result<(), CompileError> {
    let Some(entry) = entry_point(vertex, ShaderStage::Vertex) else {
        return Err(CompileError::link("vertex stage has no entry point"));
    };
    for argument in &entry.function.arguments {
        let Some(Binding::Location { location, .. }) = argument.binding else {
            continue;
        };
        let name = argument
            .name
            .clone()
            .unwrap_or_else(|| format!("location{location}"));
        let kind = leaf_kind(&vertex.types[argument.ty].inner);
        let components = match kind {
            InputKind::Float | InputKind::Vec2 | InputKind::Vec3 | InputKind::Vec4 => {
                kind.float_components().unwrap_or(0)
            }
            _ => {
                return Err(CompileError::link(format!(
                    "vertex input `{name}` must be a float scalar or vector"
                )))
            }
        };
        table.insert(DeclaredInput {
            name,
            kind,
            array_len: None,
            binding: InputBinding::Attribute(AttributeSlot {
                location,
                components,
            }),
        })?;
    }
    Ok(())
}

fn output_locations(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<u32> {
    let Some(result) = &entry.function.result else {
        return Vec::new();
    };
    if let Some(Binding::Location { location, .. }) = result.binding {
        return vec![location];
    }
    match &module.types[result.ty].inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|member| match member.binding {
                Some(Binding::Location { location, .. }) => Some(location),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn check_varyings(vertex: &naga::Module, fragment: &naga::Module) -> Result<(), CompileError> {
    let Some(vertex_entry) = entry_point(vertex, ShaderStage::Vertex) else {
        return Err(CompileError::link("vertex stage has no entry point"));
    };
    let Some(fragment_entry) = entry_point(fragment, ShaderStage::Fragment) else {
        return Err(CompileError::link("fragment stage has no entry point"));
    };
    let written = output_locations(vertex, vertex_entry);
    for argument in &fragment_entry.function.arguments {
        if let Some(Binding::Location { location, .. }) = argument.binding {
            if !written.contains(&location) {
                let name = argument.name.as_deref().unwrap_or("<unnamed>");
                return Err(CompileError::link(format!(
                    "fragment input `{name}` at location {location} is not written by the vertex stage"
                )));
            }
        }
    }
    Ok(())
}
