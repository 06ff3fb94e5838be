use renderer::{ColorSpaceMode, ShaderSource};

const VERTEX: &str = include_str!("../shaders/pbr.vert");
const FRAGMENT: &str = include_str!("../shaders/pbr.frag");

/// The PBR program sized for `light_count` point lights.
///
/// Gamma surfaces have no hardware sRGB encode, so the fragment stage applies
/// the transfer curve itself.
pub fn pbr_source(light_count: usize, color_space: ColorSpaceMode) -> ShaderSource {
    let manual_gamma = matches!(color_space, ColorSpaceMode::Gamma);
    ShaderSource::new("pbr", VERTEX, FRAGMENT)
        .with_define("POINT_LIGHT_COUNT", light_count)
        .with_define("MANUAL_GAMMA", u8::from(manual_gamma))
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{InputKind, ShaderProgram};

    #[test]
    fn compiles_with_declared_inputs() {
        let program = ShaderProgram::compile(&pbr_source(4, ColorSpaceMode::Auto)).expect("compile pbr program");
        let inputs = program.declared_inputs();

        for name in [
            "uModel.localToProjection",
            "uModel.modelMatrix",
            "uModel.cameraPosition",
            "uMaterial.albedo",
            "uMaterial.roughness",
            "uMaterial.metalness",
            "uPointLights.position[0]",
            "uPointLights.color[0]",
            "uPointLights.intensity[0]",
            "uParameters.renderPointLights",
            "uParameters.renderTexture",
            "diffuseMap",
            "specularMap",
            "brdfPreInt",
            "baseColorMap",
            "metallicMap",
            "normalMap",
            "roughnessMap",
        ] {
            assert!(inputs.contains(name), "missing input {name}");
        }
        assert_eq!(inputs.get("uPointLights.position[0]").unwrap().array_len, Some(4));
        assert_eq!(inputs.get("uParameters.renderIBL").unwrap().kind, InputKind::Int);
        assert_eq!(inputs.attributes().len(), 3);
    }

    #[test]
    fn light_count_is_structural() {
        let program = ShaderProgram::compile(&pbr_source(1, ColorSpaceMode::Gamma)).unwrap();
        let intensity = program.declared_inputs().get("uPointLights.intensity[0]").unwrap();
        assert_eq!(intensity.array_len, Some(1));
    }
}
