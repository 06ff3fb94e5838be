//! Texture files for the seven material and environment slots.

use std::path::{Path, PathBuf};

use image::imageops::flip_vertical_in_place;
use renderer::{PixelFormat, TextureError, TextureResource};
use sceneconfig::AssetConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("texture file {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Texture(#[from] TextureError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Specular,
    Brdf,
    BaseColor,
    Metallic,
    Normal,
    Roughness,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 7] = [
        TextureSlot::Diffuse,
        TextureSlot::Specular,
        TextureSlot::Brdf,
        TextureSlot::BaseColor,
        TextureSlot::Metallic,
        TextureSlot::Normal,
        TextureSlot::Roughness,
    ];

    /// Name of the sampler input this slot binds to.
    pub fn uniform_name(self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuseMap",
            TextureSlot::Specular => "specularMap",
            TextureSlot::Brdf => "brdfPreInt",
            TextureSlot::BaseColor => "baseColorMap",
            TextureSlot::Metallic => "metallicMap",
            TextureSlot::Normal => "normalMap",
            TextureSlot::Roughness => "roughnessMap",
        }
    }

    pub fn file(self, assets: &AssetConfig) -> &Path {
        match self {
            TextureSlot::Diffuse => &assets.diffuse,
            TextureSlot::Specular => &assets.specular,
            TextureSlot::Brdf => &assets.brdf,
            TextureSlot::BaseColor => &assets.base_color,
            TextureSlot::Metallic => &assets.metallic,
            TextureSlot::Normal => &assets.normal,
            TextureSlot::Roughness => &assets.roughness,
        }
    }

    /// Base colour is authored in sRGB; every other slot holds data.
    pub fn format(self) -> PixelFormat {
        match self {
            TextureSlot::BaseColor => PixelFormat::Rgba8UnormSrgb,
            _ => PixelFormat::Rgba8Unorm,
        }
    }
}

/// Decodes `path` into RGBA8 with the first row at the bottom.
pub fn load_texture(path: &Path, label: &str, format: PixelFormat) -> Result<TextureResource, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }
    let image = image::open(path).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rgba = image.to_rgba8();
    flip_vertical_in_place(&mut rgba);
    let (width, height) = rgba.dimensions();
    Ok(TextureResource::new(label, width, height, format, rgba.into_raw())?)
}

/// One optional texture per slot; a slot stays empty when its file fails to load.
#[derive(Debug, Default)]
pub struct LoadedTextures {
    slots: [Option<TextureResource>; 7],
}

impl LoadedTextures {
    pub fn load(assets: &AssetConfig) -> Self {
        let mut loaded = Self::default();
        for slot in TextureSlot::ALL {
            let path = assets.resolve(slot.file(assets));
            match load_texture(&path, slot.uniform_name(), slot.format()) {
                Ok(texture) => {
                    tracing::debug!(
                        slot = slot.uniform_name(),
                        path = %path.display(),
                        width = texture.width(),
                        height = texture.height(),
                        "loaded texture"
                    );
                    loaded.insert(slot, texture);
                }
                Err(err) => {
                    tracing::warn!(slot = slot.uniform_name(), error = %err, "texture unavailable; slot left empty");
                }
            }
        }
        loaded
    }

    pub fn insert(&mut self, slot: TextureSlot, texture: TextureResource) {
        self.slots[slot as usize] = Some(texture);
    }

    pub fn get(&self, slot: TextureSlot) -> Option<&TextureResource> {
        self.slots[slot as usize].as_ref()
    }

    pub fn take(&mut self, slot: TextureSlot) -> Option<TextureResource> {
        self.slots[slot as usize].take()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}
