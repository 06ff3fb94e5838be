//! Caller-facing uniform values and their std140 encoding.

use std::collections::BTreeMap;

use crate::error::TypeMismatchError;
use crate::handles::TextureHandle;
use crate::reflect::{DeclaredInput, InputKind, UniformSlot};

/// A value bound to a named program input for one draw.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    /// Written as 0 or 1 into an integer slot.
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix.
    Mat4([f32; 16]),
    Texture(TextureHandle),
    /// Flat data for an array, or for a single value whose component count matches.
    FloatArray(Vec<f32>),
}

impl UniformValue {
    /// Short description used in mismatch reports.
    pub fn describe(&self) -> String {
        match self {
            UniformValue::Float(_) => "float".into(),
            UniformValue::Int(_) => "int".into(),
            UniformValue::Bool(_) => "bool".into(),
            UniformValue::Vec2(_) => "vec2".into(),
            UniformValue::Vec3(_) => "vec3".into(),
            UniformValue::Vec4(_) => "vec4".into(),
            UniformValue::Mat4(_) => "mat4".into(),
            UniformValue::Texture(_) => "texture".into(),
            UniformValue::FloatArray(values) => format!("float[{}]", values.len()),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<[f32; 16]> for UniformValue {
    fn from(value: [f32; 16]) -> Self {
        UniformValue::Mat4(value)
    }
}

impl From<glam::Vec2> for UniformValue {
    fn from(value: glam::Vec2) -> Self {
        UniformValue::Vec2(value.to_array())
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(value: glam::Vec3) -> Self {
        UniformValue::Vec3(value.to_array())
    }
}

impl From<glam::Vec4> for UniformValue {
    fn from(value: glam::Vec4) -> Self {
        UniformValue::Vec4(value.to_array())
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(value: glam::Mat4) -> Self {
        UniformValue::Mat4(value.to_cols_array())
    }
}

impl From<TextureHandle> for UniformValue {
    fn from(value: TextureHandle) -> Self {
        UniformValue::Texture(value)
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(value: Vec<f32>) -> Self {
        UniformValue::FloatArray(value)
    }
}

impl From<&[f32]> for UniformValue {
    fn from(value: &[f32]) -> Self {
        UniformValue::FloatArray(value.to_vec())
    }
}

/// Name-keyed values supplied to a single draw.
///
/// Keys that the target program does not declare are ignored at draw time,
/// so one map can serve programs with different input sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformMap {
    values: BTreeMap<String, UniformValue>,
}

impl UniformMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Option<UniformValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<UniformValue> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<K: Into<String>, V: Into<UniformValue>> FromIterator<(K, V)> for UniformMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = UniformMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<UniformValue>> Extend<(K, V)> for UniformMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

/// Bytes destined for one region of a program's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformWrite {
    pub name: String,
    /// Index into the program's uniform blocks.
    pub block: usize,
    pub offset: u32,
    pub bytes: Vec<u8>,
}

/// Encodes `value` for the uniform leaf `input`, starting at array element `start`.
///
/// Arrays are written as one strided span, so every key produces exactly one write.
pub(crate) fn encode(
    key: &str,
    input: &DeclaredInput,
    slot: UniformSlot,
    start: u32,
    value: &UniformValue,
) -> Result<UniformWrite, TypeMismatchError> {
    let mismatch = || TypeMismatchError {
        name: key.to_string(),
        expected: input.kind,
        found: value.describe(),
    };

    let element_size = input.kind.element_size() as usize;
    let capacity = input.array_len.unwrap_or(1).saturating_sub(start) as usize;
    let elements: Vec<[u8; 4]> = match (input.kind, value) {
        (InputKind::Float, UniformValue::Float(v)) => vec![v.to_ne_bytes()],
        (InputKind::Int, UniformValue::Int(v)) => vec![v.to_ne_bytes()],
        (InputKind::Int, UniformValue::Bool(v)) => vec![u32::from(*v).to_ne_bytes()],
        (InputKind::Vec2, UniformValue::Vec2(v)) => float_words(v),
        (InputKind::Vec3, UniformValue::Vec3(v)) => float_words(v),
        (InputKind::Vec4, UniformValue::Vec4(v)) => float_words(v),
        (InputKind::Mat4, UniformValue::Mat4(v)) => float_words(v),
        (kind, UniformValue::FloatArray(values)) => {
            let components = kind.float_components().ok_or_else(mismatch)? as usize;
            if values.is_empty() || values.len() % components != 0 {
                return Err(mismatch());
            }
            float_words(values)
        }
        _ => return Err(mismatch()),
    };

    let words_per_element = element_size / 4;
    let count = elements.len() / words_per_element;
    if count > capacity {
        return Err(mismatch());
    }

    let stride = slot.stride as usize;
    let mut bytes = vec![0u8; (count - 1) * stride + element_size];
    for (index, chunk) in elements.chunks(words_per_element).enumerate() {
        let base = index * stride;
        let flat: &[u8] = bytemuck::cast_slice(chunk);
        bytes[base..base + element_size].copy_from_slice(flat);
    }

    Ok(UniformWrite {
        name: key.to_string(),
        block: slot.block,
        offset: slot.offset + start * slot.stride,
        bytes,
    })
}

fn float_words(values: &[f32]) -> Vec<[u8; 4]> {
    values.iter().map(|value| value.to_ne_bytes()).collect()
}
