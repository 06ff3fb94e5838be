//! Linked vertex/fragment programs and their source description.

use std::collections::BTreeMap;

use wgpu::naga;

use crate::compile::compile_stage;
use crate::error::{CompileError, CompileStage};
use crate::handles::ProgramHandle;
use crate::reflect::{self, InputTable};

/// GLSL 450 sources for both stages plus preprocessor defines shared by them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
    pub defines: BTreeMap<String, String>,
}

impl ShaderSource {
    pub fn new(label: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            defines: BTreeMap::new(),
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.defines.insert(name.into(), value.to_string());
        self
    }
}

/// A compiled and linked program.
///
/// The input table is immutable once linking succeeds. The device handle is
/// assigned when the program is registered with a context.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    label: String,
    vertex: naga::Module,
    fragment: naga::Module,
    inputs: InputTable,
    handle: Option<ProgramHandle>,
}

impl ShaderProgram {
    /// Compiles both stages, links them, and introspects every declared input.
    pub fn compile(source: &ShaderSource) -> Result<Self, CompileError> {
        let vertex = compile_stage(CompileStage::Vertex, &source.vertex, &source.defines)?;
        let fragment = compile_stage(CompileStage::Fragment, &source.fragment, &source.defines)?;
        let inputs = reflect::link(&vertex, &fragment)?;

        tracing::debug!(
            program = %source.label,
            inputs = inputs.len(),
            blocks = inputs.uniform_blocks().len(),
            "linked shader program"
        );

        Ok(Self {
            label: source.label.clone(),
            vertex,
            fragment,
            inputs,
            handle: None,
        })
    }

    /// Shorthand for compiling an unlabeled pair of stages without defines.
    pub fn from_stages(vertex: &str, fragment: &str) -> Result<Self, CompileError> {
        Self::compile(&ShaderSource::new("program", vertex, fragment))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn declared_inputs(&self) -> &InputTable {
        &self.inputs
    }

    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: Option<ProgramHandle>) {
        self.handle = handle;
    }

    pub(crate) fn vertex_module(&self) -> &naga::Module {
        &self.vertex
    }

    pub(crate) fn fragment_module(&self) -> &naga::Module {
        &self.fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{InputBinding, InputKind};

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec3 in_position;
layout(location = 1) in vec2 in_uv;
layout(location = 0) out vec2 v_uv;

layout(std140, set = 0, binding = 0) uniform Model {
    mat4 localToProjection;
    vec3 cameraPosition;
    float exposure;
} uModel;

void main() {
    v_uv = in_uv;
    gl_Position = uModel.localToProjection * vec4(in_position, 1.0);
}
";

    const FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

struct Light {
    vec3 color;
    float intensity;
};

layout(std140, set = 0, binding = 0) uniform Model {
    mat4 localToProjection;
    vec3 cameraPosition;
    float exposure;
} uModel;

layout(std140, set = 0, binding = 1) uniform Lights {
    vec3 position[4];
    Light entries[2];
    int enabled;
} uLights;

layout(set = 1, binding = 0) uniform texture2D baseColorMap;
layout(set = 1, binding = 1) uniform sampler baseColorMapSampler;

void main() {
    vec3 color = texture(sampler2D(baseColorMap, baseColorMapSampler), v_uv).rgb;
    if (uLights.enabled != 0) {
        color *= uLights.entries[1].color * uLights.entries[0].intensity + uLights.position[3];
    }
    out_color = vec4(color * uModel.exposure, 1.0);
}
";

    fn program() -> ShaderProgram {
        ShaderProgram::from_stages(VERTEX, FRAGMENT).unwrap()
    }

    #[test]
    fn merges_blocks_shared_by_both_stages() {
        let program = program();
        let blocks = program.declared_inputs().uniform_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "uModel");
        assert_eq!(blocks[1].name, "uLights");
    }

    #[test]
    fn flattens_members_with_std140_offsets() {
        let program = program();
        let inputs = program.declared_inputs();

        let matrix = inputs.get("uModel.localToProjection").unwrap();
        assert_eq!(matrix.kind, InputKind::Mat4);

        let camera = inputs.get("uModel.cameraPosition").unwrap();
        assert_eq!(camera.uniform_slot().unwrap().offset, 64);
        let exposure = inputs.get("uModel.exposure").unwrap();
        assert_eq!(exposure.uniform_slot().unwrap().offset, 76);

        let positions = inputs.get("uLights.position[0]").unwrap();
        assert_eq!(positions.kind, InputKind::Vec3);
        assert_eq!(positions.array_len, Some(4));
        assert_eq!(positions.uniform_slot().unwrap().stride, 16);

        let color = inputs.get("uLights.entries[1].color").unwrap();
        assert_eq!(color.uniform_slot().unwrap().offset, 64 + 16);
        assert_eq!(inputs.get("uLights.enabled").unwrap().kind, InputKind::Int);
    }

    #[test]
    fn resolves_array_aliases() {
        let program = program();
        let inputs = program.declared_inputs();
        assert_eq!(inputs.resolve("uLights.position").unwrap().1, 0);
        assert_eq!(inputs.resolve("uLights.position[2]").unwrap().1, 2);
        assert!(inputs.resolve("uLights.position[4]").is_none());
        assert!(inputs.resolve("uLights.missing").is_none());
    }

    #[test]
    fn registers_textures_and_attributes() {
        let program = program();
        let inputs = program.declared_inputs();
        let texture = inputs.get("baseColorMap").unwrap();
        assert_eq!(texture.kind, InputKind::Sampler);
        assert!(matches!(texture.binding, InputBinding::Texture(_)));

        let attributes = inputs.attributes();
        let names: Vec<_> = attributes.iter().map(|(input, _)| input.name.as_str()).collect();
        assert_eq!(names, vec!["in_position", "in_uv"]);
        assert_eq!(attributes[1].1.components, 2);
    }

    #[test]
    fn unmatched_varying_fails_at_link() {
        let fragment = r"#version 450
layout(location = 3) in vec3 v_missing;
layout(location = 0) out vec4 out_color;
void main() { out_color = vec4(v_missing, 1.0); }
";
        let err = ShaderProgram::from_stages(VERTEX, fragment).unwrap_err();
        assert_eq!(err.stage, CompileStage::Link);
    }

    #[test]
    fn texture_without_sampler_fails_at_link() {
        let fragment = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;
layout(set = 1, binding = 0) uniform texture2D lonely;
layout(set = 1, binding = 1) uniform sampler shared_sampler;
void main() { out_color = texture(sampler2D(lonely, shared_sampler), v_uv); }
";
        let err = ShaderProgram::from_stages(VERTEX, fragment).unwrap_err();
        assert_eq!(err.stage, CompileStage::Link);
        assert!(err.log.contains("lonelySampler"));
    }

    #[test]
    fn vertex_syntax_error_reports_vertex_stage() {
        let err = ShaderProgram::from_stages("#version 450\nvoid main( {", FRAGMENT).unwrap_err();
        assert_eq!(err.stage, CompileStage::Vertex);
    }
}
