//! Indexed triangle meshes with named per-vertex attributes.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::handles::GeometryHandle;

/// Conventional attribute name for vertex positions.
pub const ATTRIBUTE_POSITION: &str = "in_position";
/// Conventional attribute name for vertex normals.
pub const ATTRIBUTE_NORMAL: &str = "in_normal";
/// Conventional attribute name for texture coordinates.
pub const ATTRIBUTE_UV: &str = "in_uv";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("geometry `{0}` declares no vertex attributes")]
    NoAttributes(String),
    #[error("attribute `{name}` must have 1 to 4 components, got {components}")]
    InvalidComponents { name: String, components: u32 },
    #[error("attribute `{name}` holds {len} floats which is not a multiple of {components}")]
    RaggedAttribute {
        name: String,
        len: usize,
        components: u32,
    },
    #[error("attribute `{name}` has {found} vertices but `{reference}` has {expected}")]
    VertexCountMismatch {
        name: String,
        reference: String,
        expected: u32,
        found: u32,
    },
    #[error("index list of length {0} does not describe whole triangles")]
    IncompleteTriangle(usize),
    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: u32 },
    #[error("geometry `{0}` released its CPU data and cannot be uploaded again")]
    CpuDataReleased(String),
}

/// Tightly packed float data for one named attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    components: u32,
    data: Vec<f32>,
}

impl VertexAttribute {
    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// An indexed triangle list.
///
/// CPU-side arrays stay alive until [`release_cpu_data`](Self::release_cpu_data)
/// is called; the device handle is only set by a context upload.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryResource {
    label: String,
    attributes: BTreeMap<String, VertexAttribute>,
    indices: Vec<u32>,
    vertex_count: u32,
    index_count: u32,
    cpu_released: bool,
    handle: Option<GeometryHandle>,
}

impl GeometryResource {
    pub fn builder(label: impl Into<String>) -> GeometryBuilder {
        GeometryBuilder {
            label: label.into(),
            attributes: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.get(name)
    }

    /// Attribute names with their component counts, in name order.
    pub fn attribute_layout(&self) -> impl Iterator<Item = (&str, u32)> {
        self.attributes
            .iter()
            .map(|(name, attribute)| (name.as_str(), attribute.components))
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn primitive_count(&self) -> u32 {
        self.index_count / 3
    }

    pub fn handle(&self) -> Option<GeometryHandle> {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: Option<GeometryHandle>) {
        self.handle = handle;
    }

    pub fn has_cpu_data(&self) -> bool {
        !self.cpu_released
    }

    /// Drops the CPU copies of vertex and index data.
    ///
    /// Counts and attribute layouts are retained so the geometry can still be
    /// drawn through its existing handle.
    pub fn release_cpu_data(&mut self) {
        for attribute in self.attributes.values_mut() {
            attribute.data = Vec::new();
        }
        self.indices = Vec::new();
        self.cpu_released = true;
    }
}

/// Collects attributes and indices, validating them on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct GeometryBuilder {
    label: String,
    attributes: Vec<(String, u32, Vec<f32>)>,
    indices: Vec<u32>,
}

impl GeometryBuilder {
    pub fn attribute(mut self, name: impl Into<String>, components: u32, data: Vec<f32>) -> Self {
        self.attributes.push((name.into(), components, data));
        self
    }

    pub fn positions(self, data: Vec<f32>) -> Self {
        self.attribute(ATTRIBUTE_POSITION, 3, data)
    }

    pub fn normals(self, data: Vec<f32>) -> Self {
        self.attribute(ATTRIBUTE_NORMAL, 3, data)
    }

    pub fn uvs(self, data: Vec<f32>) -> Self {
        self.attribute(ATTRIBUTE_UV, 2, data)
    }

    pub fn indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = indices;
        self
    }

    pub fn build(self) -> Result<GeometryResource, GeometryError> {
        if self.attributes.is_empty() {
            return Err(GeometryError::NoAttributes(self.label));
        }

        let mut reference: Option<(String, u32)> = None;
        let mut attributes = BTreeMap::new();
        for (name, components, data) in self.attributes {
            if !(1..=4).contains(&components) {
                return Err(GeometryError::InvalidComponents { name, components });
            }
            if data.len() % components as usize != 0 {
                return Err(GeometryError::RaggedAttribute {
                    name,
                    len: data.len(),
                    components,
                });
            }
            let count = (data.len() / components as usize) as u32;
            match &reference {
                Some((reference, expected)) if *expected != count => {
                    return Err(GeometryError::VertexCountMismatch {
                        name,
                        reference: reference.clone(),
                        expected: *expected,
                        found: count,
                    });
                }
                Some(_) => {}
                None => reference = Some((name.clone(), count)),
            }
            attributes.insert(name, VertexAttribute { components, data });
        }
        let vertex_count = reference.map(|(_, count)| count).unwrap_or(0);

        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::IncompleteTriangle(self.indices.len()));
        }
        if let Some(&index) = self.indices.iter().find(|&&index| index >= vertex_count) {
            return Err(GeometryError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }

        Ok(GeometryResource {
            label: self.label,
            attributes,
            index_count: self.indices.len() as u32,
            indices: self.indices,
            vertex_count,
            cpu_released: false,
            handle: None,
        })
    }
}
