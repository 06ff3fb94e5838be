//! Scene description for the PBR sphere grid: panel toggles, point lights,
//! grid layout, asset files, camera, and surface settings.
//!
//! Every section is optional in TOML; missing values fall back to the
//! built-in scene (a 5×5 grid lit by four white lights).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::{self, Deserializer, SeqAccess};
use serde::{Deserialize, Serialize, Serializer};

/// Upper bound on configured point lights; matches the largest light array
/// the shaders are compiled with.
pub const MAX_POINT_LIGHTS: usize = 16;

/// Fewest segments a sphere can be tessellated with in either direction.
pub const MIN_SPHERE_SEGMENTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// An 8-bit RGB colour, written as `[r, g, b]` or `"#rrggbb"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels scaled to `0.0..=1.0`.
    pub fn to_unit(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }

    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    fn from_hex(raw: &str) -> Result<Self, String> {
        let digits = raw
            .strip_prefix('#')
            .ok_or_else(|| format!("colour '{raw}' must start with '#'"))?;
        if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(format!("colour '{raw}' must have the form #rrggbb"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|err| format!("colour '{raw}': {err}"))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    fn from_channels(values: &[i64]) -> Result<Self, String> {
        let [r, g, b] = values else {
            return Err(format!("colour needs 3 channels, found {}", values.len()));
        };
        let channel = |value: i64| {
            u8::try_from(value).map_err(|_| format!("colour channel {value} is outside 0-255"))
        };
        Ok(Self::new(channel(*r)?, channel(*g)?, channel(*b)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Accepts `#rrggbb` or a comma separated `r,g,b` triple.
impl FromStr for Color {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.starts_with('#') {
            return Self::from_hex(raw);
        }
        let values = raw
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<i64>()
                    .map_err(|err| format!("invalid colour channel '{}': {err}", part.trim()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_channels(&values)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.channels().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl<'de> de::Visitor<'de> for Visitor {
            type Value = Color;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a colour as [r, g, b] with 0-255 channels or \"#rrggbb\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Color::from_hex(v.trim()).map_err(E::custom)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values = Vec::with_capacity(3);
                while let Some(value) = seq.next_element::<i64>()? {
                    values.push(value);
                }
                Color::from_channels(&values).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceSetting {
    #[default]
    Auto,
    Gamma,
    Linear,
}

impl FromStr for ColorSpaceSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gamma" | "srgb" => Ok(Self::Gamma),
            "linear" => Ok(Self::Linear),
            other => Err(format!("invalid colour space '{other}'; expected auto, gamma, or linear")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default = "default_lights")]
    pub lights: Vec<LightConfig>,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

/// Initial values of the debug panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub albedo: Color,
    pub point_lights: bool,
    pub ibl: bool,
    pub point_lights_diffuse_only: bool,
    pub point_lights_specular_only: bool,
    pub ibl_diffuse_only: bool,
    pub ibl_specular_only: bool,
    pub texture: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            albedo: Color::new(200, 200, 200),
            point_lights: true,
            ibl: false,
            point_lights_diffuse_only: false,
            point_lights_specular_only: false,
            ibl_diffuse_only: false,
            ibl_specular_only: false,
            texture: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub position: [f32; 3],
    #[serde(default = "default_light_color")]
    pub color: Color,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

impl LightConfig {
    pub fn white(position: [f32; 3]) -> Self {
        Self {
            position,
            color: Color::WHITE,
            intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: u32,
    pub columns: u32,
    pub spacing: f32,
    pub roughness_start: f32,
    pub roughness_step: f32,
    pub metalness_start: f32,
    pub metalness_step: f32,
    pub sphere_radius: f32,
    pub sphere_width_segments: u32,
    pub sphere_height_segments: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 5,
            columns: 5,
            spacing: 1.0 / 3.0,
            roughness_start: 0.05,
            roughness_step: 0.232,
            metalness_start: 0.0,
            metalness_step: 0.24,
            sphere_radius: 0.12,
            sphere_width_segments: 24,
            sphere_height_segments: 24,
        }
    }
}

impl GridConfig {
    /// Roughness varies along columns.
    pub fn roughness(&self, column: u32) -> f32 {
        self.roughness_start + column as f32 * self.roughness_step
    }

    /// Metalness varies along rows.
    pub fn metalness(&self, row: u32) -> f32 {
        self.metalness_start + row as f32 * self.metalness_step
    }

    /// Centre of the sphere at (`column`, `row`), with the grid centred on the origin.
    pub fn position(&self, column: u32, row: u32) -> [f32; 3] {
        let centre_x = (self.columns.saturating_sub(1)) as f32 / 2.0;
        let centre_y = (self.rows.saturating_sub(1)) as f32 / 2.0;
        [
            (column as f32 - centre_x) * self.spacing,
            (row as f32 - centre_y) * self.spacing,
            0.0,
        ]
    }

    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }
}

/// Texture files, relative to `root` unless absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub root: PathBuf,
    pub diffuse: PathBuf,
    pub specular: PathBuf,
    pub brdf: PathBuf,
    pub base_color: PathBuf,
    pub metallic: PathBuf,
    pub normal: PathBuf,
    pub roughness: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            diffuse: PathBuf::from("env/Alexs_Apt_2k-diffuse-RGBM.png"),
            specular: PathBuf::from("env/Alexs_Apt_2k-specular-RGBM.png"),
            brdf: PathBuf::from("ggx-brdf-integrated.png"),
            base_color: PathBuf::from("env/rustediron2/rustediron2_basecolor.png"),
            metallic: PathBuf::from("env/rustediron2/rustediron2_metallic.png"),
            normal: PathBuf::from("env/rustediron2/rustediron2_normal.png"),
            roughness: PathBuf::from("env/rustediron2/rustediron2_roughness.png"),
        }
    }
}

impl AssetConfig {
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.root.join(file)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 2.0],
            target: [0.0, 0.0, 0.0],
            fov_y_degrees: 45.0,
            near: 0.01,
            far: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
    pub color_space: ColorSpaceSetting,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: Color::BLACK,
            color_space: ColorSpaceSetting::Auto,
        }
    }
}

fn default_light_color() -> Color {
    Color::WHITE
}

fn default_intensity() -> f32 {
    1.0
}

fn default_lights() -> Vec<LightConfig> {
    [[-6.0, -6.0], [-6.0, 6.0], [6.0, -6.0], [6.0, 6.0]]
        .into_iter()
        .map(|[x, y]| LightConfig::white([x, y, 8.0]))
        .collect()
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            panel: PanelConfig::default(),
            lights: default_lights(),
            grid: GridConfig::default(),
            assets: AssetConfig::default(),
            camera: CameraConfig::default(),
            surface: SurfaceConfig::default(),
        }
    }
}

impl SceneConfig {
    /// The built-in scene.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Trims the light list to `count`, or repeats it cyclically to reach `count`.
    pub fn with_light_count(mut self, count: usize) -> Result<Self, ConfigError> {
        if count == 0 || count > MAX_POINT_LIGHTS {
            return Err(ConfigError::Invalid(format!(
                "light count must be between 1 and {MAX_POINT_LIGHTS}, got {count}"
            )));
        }
        if self.lights.is_empty() {
            return Err(ConfigError::Invalid("no lights to repeat".into()));
        }
        self.lights = self.lights.iter().cycle().take(count).cloned().collect();
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must have at least one row and column, got {}x{}",
                self.grid.columns, self.grid.rows
            )));
        }

        if self.lights.is_empty() {
            return Err(ConfigError::Invalid("config must define at least one light".into()));
        }

        if self.lights.len() > MAX_POINT_LIGHTS {
            return Err(ConfigError::Invalid(format!(
                "config defines {} lights; at most {MAX_POINT_LIGHTS} are supported",
                self.lights.len()
            )));
        }

        for (index, light) in self.lights.iter().enumerate() {
            if light.intensity.is_nan() || light.intensity < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "light {index} intensity must be >= 0, got {}",
                    light.intensity
                )));
            }
        }

        if self.grid.sphere_width_segments < MIN_SPHERE_SEGMENTS
            || self.grid.sphere_height_segments < MIN_SPHERE_SEGMENTS
        {
            return Err(ConfigError::Invalid(format!(
                "sphere needs at least {MIN_SPHERE_SEGMENTS} segments each way, got {}x{}",
                self.grid.sphere_width_segments, self.grid.sphere_height_segments
            )));
        }

        if self.grid.sphere_radius.is_nan() || self.grid.sphere_radius <= 0.0 {
            return Err(ConfigError::Invalid("grid.sphere_radius must be > 0".into()));
        }

        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera clip planes must satisfy 0 < near < far, got near {} far {}",
                camera.near, camera.far
            )));
        }
        if !(camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.fov_y_degrees must be inside (0, 180), got {}",
                camera.fov_y_degrees
            )));
        }

        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(ConfigError::Invalid("surface size must be non-zero".into()));
        }

        Ok(())
    }
}
