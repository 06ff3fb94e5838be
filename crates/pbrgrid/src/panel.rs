use std::fmt;

use renderer::UniformMap;
use sceneconfig::{Color, PanelConfig};

pub const ALBEDO: &str = "uMaterial.albedo";

const ALBEDO_STEP: u8 = 15;

/// The seven shading switches, in panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    PointLights,
    Ibl,
    PointLightsDiffuseOnly,
    PointLightsSpecularOnly,
    IblDiffuseOnly,
    IblSpecularOnly,
    Texture,
}

impl Toggle {
    pub const ALL: [Toggle; 7] = [
        Toggle::PointLights,
        Toggle::Ibl,
        Toggle::PointLightsDiffuseOnly,
        Toggle::PointLightsSpecularOnly,
        Toggle::IblDiffuseOnly,
        Toggle::IblSpecularOnly,
        Toggle::Texture,
    ];

    pub fn uniform_name(self) -> &'static str {
        match self {
            Toggle::PointLights => "uParameters.renderPointLights",
            Toggle::Ibl => "uParameters.renderIBL",
            Toggle::PointLightsDiffuseOnly => "uParameters.renderPointLightsDiffuseOnly",
            Toggle::PointLightsSpecularOnly => "uParameters.renderPointLightsSpecularOnly",
            Toggle::IblDiffuseOnly => "uParameters.renderIBLDiffuseOnly",
            Toggle::IblSpecularOnly => "uParameters.renderIBLSpecularOnly",
            Toggle::Texture => "uParameters.renderTexture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

/// One user action on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Toggle(Toggle),
    Albedo { channel: Channel, raise: bool },
}

impl PanelAction {
    /// Keys `1`-`7` flip the toggles and `T` flips texturing; `R`/`G`/`B`
    /// raise an albedo channel, lowered while Shift is held.
    pub fn from_key(key: &str, shift: bool) -> Option<Self> {
        let action = match key.to_ascii_lowercase().as_str() {
            "t" => PanelAction::Toggle(Toggle::Texture),
            "r" => PanelAction::Albedo {
                channel: Channel::Red,
                raise: !shift,
            },
            "g" => PanelAction::Albedo {
                channel: Channel::Green,
                raise: !shift,
            },
            "b" => PanelAction::Albedo {
                channel: Channel::Blue,
                raise: !shift,
            },
            digit => {
                let index: usize = digit.parse().ok()?;
                PanelAction::Toggle(*Toggle::ALL.get(index.checked_sub(1)?)?)
            }
        };
        Some(action)
    }
}

/// Live values of the debug panel, read by the application every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelState {
    pub albedo: Color,
    flags: [bool; 7],
}

impl From<&PanelConfig> for PanelState {
    fn from(config: &PanelConfig) -> Self {
        Self {
            albedo: config.albedo,
            flags: [
                config.point_lights,
                config.ibl,
                config.point_lights_diffuse_only,
                config.point_lights_specular_only,
                config.ibl_diffuse_only,
                config.ibl_specular_only,
                config.texture,
            ],
        }
    }
}

impl Default for PanelState {
    fn default() -> Self {
        Self::from(&PanelConfig::default())
    }
}

impl PanelState {
    pub fn is_enabled(&self, toggle: Toggle) -> bool {
        self.flags[toggle as usize]
    }

    pub fn set(&mut self, toggle: Toggle, enabled: bool) {
        self.flags[toggle as usize] = enabled;
    }

    /// Applies `action`; returns whether anything changed.
    pub fn apply_action(&mut self, action: PanelAction) -> bool {
        let before = self.clone();
        match action {
            PanelAction::Toggle(toggle) => {
                let enabled = self.is_enabled(toggle);
                self.set(toggle, !enabled);
            }
            PanelAction::Albedo { channel, raise } => {
                let value = match channel {
                    Channel::Red => &mut self.albedo.r,
                    Channel::Green => &mut self.albedo.g,
                    Channel::Blue => &mut self.albedo.b,
                };
                *value = if raise {
                    value.saturating_add(ALBEDO_STEP)
                } else {
                    value.saturating_sub(ALBEDO_STEP)
                };
            }
        }
        *self != before
    }

    /// Writes the albedo (scaled to `0..1`) and the seven toggles.
    pub fn write_uniforms(&self, uniforms: &mut UniformMap) {
        uniforms.set(ALBEDO, self.albedo.to_unit());
        for toggle in Toggle::ALL {
            uniforms.set(toggle.uniform_name(), self.is_enabled(toggle));
        }
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "albedo {}", self.albedo)?;
        for toggle in Toggle::ALL {
            if self.is_enabled(toggle) {
                write!(f, " +{toggle:?}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::UniformValue;

    #[test]
    fn defaults_enable_point_lights_only() {
        let panel = PanelState::default();
        assert_eq!(panel.albedo, Color::new(200, 200, 200));
        for toggle in Toggle::ALL {
            assert_eq!(panel.is_enabled(toggle), toggle == Toggle::PointLights, "{toggle:?}");
        }
    }

    #[test]
    fn writes_albedo_and_toggles() {
        let mut uniforms = UniformMap::new();
        PanelState::default().write_uniforms(&mut uniforms);
        assert_eq!(uniforms.len(), 8);
        let gray = 200.0 / 255.0;
        assert_eq!(uniforms.get(ALBEDO), Some(&UniformValue::Vec3([gray, gray, gray])));
        assert_eq!(
            uniforms.get("uParameters.renderPointLights"),
            Some(&UniformValue::Bool(true))
        );
        assert_eq!(uniforms.get("uParameters.renderIBL"), Some(&UniformValue::Bool(false)));
    }

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(
            PanelAction::from_key("2", false),
            Some(PanelAction::Toggle(Toggle::Ibl))
        );
        assert_eq!(
            PanelAction::from_key("T", false),
            Some(PanelAction::Toggle(Toggle::Texture))
        );
        assert_eq!(
            PanelAction::from_key("g", true),
            Some(PanelAction::Albedo {
                channel: Channel::Green,
                raise: false
            })
        );
        assert_eq!(PanelAction::from_key("0", false), None);
        assert_eq!(PanelAction::from_key("8", false), None);
        assert_eq!(PanelAction::from_key("x", false), None);
    }

    #[test]
    fn albedo_saturates() {
        let mut panel = PanelState::default();
        let raise_red = PanelAction::Albedo {
            channel: Channel::Red,
            raise: true,
        };
        assert!(panel.apply_action(raise_red));
        assert!(panel.apply_action(raise_red));
        assert!(panel.apply_action(raise_red));
        assert_eq!(panel.albedo.r, 245);
        assert!(panel.apply_action(raise_red));
        assert_eq!(panel.albedo.r, 255);
        assert!(!panel.apply_action(raise_red));
    }

    #[test]
    fn toggles_flip() {
        let mut panel = PanelState::default();
        assert!(panel.apply_action(PanelAction::Toggle(Toggle::PointLights)));
        assert!(!panel.is_enabled(Toggle::PointLights));
        assert_eq!(panel.to_string(), "albedo #c8c8c8");
    }
}
