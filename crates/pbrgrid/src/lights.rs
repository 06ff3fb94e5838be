use renderer::UniformMap;
use sceneconfig::LightConfig;

pub const LIGHT_POSITIONS: &str = "uPointLights.position[0]";
pub const LIGHT_COLORS: &str = "uPointLights.color[0]";
pub const LIGHT_INTENSITIES: &str = "uPointLights.intensity[0]";

/// Point lights flattened into the three parallel arrays the shader declares.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLightArrays {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
    pub intensities: Vec<f32>,
}

impl PointLightArrays {
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    pub fn apply(&self, uniforms: &mut UniformMap) {
        uniforms.set(LIGHT_POSITIONS, self.positions.clone());
        uniforms.set(LIGHT_COLORS, self.colors.clone());
        uniforms.set(LIGHT_INTENSITIES, self.intensities.clone());
    }
}

/// Packs light `i` at `positions[3i..3i+3]`, `colors[3i..3i+3]`, and `intensities[i]`.
pub fn pack_point_lights(lights: &[LightConfig]) -> PointLightArrays {
    let mut packed = PointLightArrays {
        positions: Vec::with_capacity(lights.len() * 3),
        colors: Vec::with_capacity(lights.len() * 3),
        intensities: Vec::with_capacity(lights.len()),
    };
    for light in lights {
        packed.positions.extend(light.position);
        packed.colors.extend(light.color.to_unit());
        packed.intensities.push(light.intensity);
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::UniformValue;
    use sceneconfig::{Color, SceneConfig};

    #[test]
    fn packs_builtin_lights() {
        let config = SceneConfig::builtin();
        let packed = pack_point_lights(&config.lights);
        assert_eq!(packed.len(), 4);
        assert_eq!(
            packed.positions,
            vec![-6.0, -6.0, 8.0, -6.0, 6.0, 8.0, 6.0, -6.0, 8.0, 6.0, 6.0, 8.0]
        );
        assert_eq!(packed.colors, vec![1.0; 12]);
        assert_eq!(packed.intensities, vec![1.0; 4]);
    }

    #[test]
    fn intensities_are_dense() {
        let lights: Vec<LightConfig> = (0..3)
            .map(|i| LightConfig {
                position: [i as f32, 0.0, 0.0],
                color: Color::new(255, 0, 0),
                intensity: (i + 1) as f32,
            })
            .collect();
        let packed = pack_point_lights(&lights);
        assert_eq!(packed.intensities, vec![1.0, 2.0, 3.0]);
        assert_eq!(&packed.colors[3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(&packed.positions[6..9], &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn applies_under_array_keys() {
        let packed = pack_point_lights(&[LightConfig::white([1.0, 2.0, 3.0])]);
        let mut uniforms = UniformMap::new();
        packed.apply(&mut uniforms);
        assert_eq!(uniforms.len(), 3);
        assert_eq!(
            uniforms.get(LIGHT_INTENSITIES),
            Some(&UniformValue::FloatArray(vec![1.0]))
        );
    }
}
