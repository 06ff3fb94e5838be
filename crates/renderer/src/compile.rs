use std::collections::BTreeMap;

use wgpu::naga::{
    self,
    front::glsl::{Frontend, Options},
    valid::{Capabilities, ValidationFlags, Validator},
    ShaderStage,
};

use crate::error::{CompileError, CompileStage};

fn naga_stage(stage: CompileStage) -> ShaderStage {
    match stage {
        CompileStage::Fragment => ShaderStage::Fragment,
        CompileStage::Vertex | CompileStage::Link => ShaderStage::Vertex,
    }
}

/// Parses and validates one GLSL 450 stage into naga IR.
///
/// `defines` are handed to the preprocessor, so structural constants such
/// as array lengths can be fixed before parsing.
pub(crate) fn compile_stage(
    stage: CompileStage,
    source: &str,
    defines: &BTreeMap<String, String>,
) -> Result<naga::Module, CompileError> {
    let mut options = Options::from(naga_stage(stage));
    options
        .defines
        .extend(defines.iter().map(|(key, value)| (key.clone(), value.clone())));

    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| CompileError::new(stage, errors.emit_to_string(source)))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::default());
    validator
        .validate(&module)
        .map_err(|error| CompileError::new(stage, error.emit_to_string(source)))?;

    tracing::trace!(%stage, globals = module.global_variables.len(), "compiled shader stage");
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec3 in_position;
void main() {
    gl_Position = vec4(in_position, 1.0);
}
";

    #[test]
    fn compiles_minimal_vertex_stage() {
        let module = compile_stage(CompileStage::Vertex, VERTEX, &BTreeMap::new()).unwrap();
        assert_eq!(module.entry_points.len(), 1);
    }

    #[test]
    fn syntax_error_reports_stage() {
        let err = compile_stage(
            CompileStage::Fragment,
            "#version 450\nvoid main() { this is not glsl }\n",
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.stage, CompileStage::Fragment);
        assert!(!err.log.is_empty());
    }

    #[test]
    fn defines_reach_the_preprocessor() {
        let source = r"#version 450
layout(location = 0) in vec3 in_position;
layout(std140, set = 0, binding = 0) uniform Lights { vec4 color[COUNT]; } uLights;
void main() {
    gl_Position = vec4(in_position, 1.0) + uLights.color[COUNT - 1];
}
";
        let mut defines = BTreeMap::new();
        defines.insert("COUNT".to_string(), "3".to_string());
        assert!(compile_stage(CompileStage::Vertex, source, &defines).is_ok());
        assert!(compile_stage(CompileStage::Vertex, source, &BTreeMap::new()).is_err());
    }
}
