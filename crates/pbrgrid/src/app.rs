use anyhow::{Context as _, Result};
use renderer::{
    ColorSpaceMode, Context, ContextOptions, Device, GeometryResource, ShaderProgram, TextureHandle, UniformMap,
};
use sceneconfig::SceneConfig;
use tracing::{debug, info};

use crate::assets::{LoadedTextures, TextureSlot};
use crate::camera::Camera;
use crate::lights::pack_point_lights;
use crate::panel::{PanelAction, PanelState};
use crate::shader::pbr_source;
use crate::sphere::uv_sphere;
use crate::transform::Transform;

pub const LOCAL_TO_PROJECTION: &str = "uModel.localToProjection";
pub const MODEL_MATRIX: &str = "uModel.modelMatrix";
pub const CAMERA_POSITION: &str = "uModel.cameraPosition";
pub const ROUGHNESS: &str = "uMaterial.roughness";
pub const METALNESS: &str = "uMaterial.metalness";

/// Work done by one call to [`Application::render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draws: usize,
}

/// Owns the scene and drives the render context once per frame.
pub struct Application<D: Device> {
    context: Context<D>,
    config: SceneConfig,
    program: ShaderProgram,
    sphere: GeometryResource,
    textures: Vec<(TextureSlot, TextureHandle)>,
    camera: Camera,
    panel: PanelState,
    uniforms: UniformMap,
    resize_pending: bool,
}

impl<D: Device> Application<D> {
    /// Compiles the program, uploads the sphere, and uploads every loaded
    /// texture into its own slot.
    pub fn new(device: D, config: SceneConfig, color_space: ColorSpaceMode, mut loaded: LoadedTextures) -> Result<Self> {
        let surface = &config.surface;
        let clear = surface.clear_color.to_unit();
        let mut context = Context::with_options(
            device,
            ContextOptions {
                clear_color: [clear[0], clear[1], clear[2], 1.0],
                depth_test: false,
            },
        );

        let program = context
            .compile_program(&pbr_source(config.lights.len(), color_space))
            .context("failed to compile PBR program")?;

        let grid = &config.grid;
        let mut sphere = uv_sphere(grid.sphere_radius, grid.sphere_width_segments, grid.sphere_height_segments)
            .context("failed to build sphere geometry")?;
        context.upload_geometry(&mut sphere).context("failed to upload sphere")?;
        sphere.release_cpu_data();

        let mut textures = Vec::new();
        for slot in TextureSlot::ALL {
            let Some(mut texture) = loaded.take(slot) else {
                continue;
            };
            let handle = context
                .upload_texture(&mut texture)
                .with_context(|| format!("failed to upload {}", slot.uniform_name()))?;
            textures.push((slot, handle));
        }

        let mut uniforms = UniformMap::new();
        pack_point_lights(&config.lights).apply(&mut uniforms);
        for (slot, handle) in &textures {
            uniforms.set(slot.uniform_name(), *handle);
        }

        info!(
            lights = config.lights.len(),
            columns = grid.columns,
            rows = grid.rows,
            textures = textures.len(),
            "scene ready"
        );

        Ok(Self {
            camera: Camera::from_config(&config.camera),
            panel: PanelState::from(&config.panel),
            context,
            config,
            program,
            sphere,
            textures,
            uniforms,
            resize_pending: false,
        })
    }

    pub fn context(&self) -> &Context<D> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context<D> {
        &mut self.context
    }

    pub fn panel(&self) -> &PanelState {
        &self.panel
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Texture slots that hold an uploaded texture.
    pub fn bound_slots(&self) -> impl Iterator<Item = TextureSlot> + '_ {
        self.textures.iter().map(|(slot, _)| *slot)
    }

    pub fn apply_panel_action(&mut self, action: PanelAction) {
        if self.panel.apply_action(action) {
            info!(panel = %self.panel, "panel changed");
        }
    }

    /// Records a new drawing-surface size; applied before the next frame.
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        self.context.set_surface_size(width, height);
        self.resize_pending = true;
    }

    pub fn resize(&mut self) {
        self.context.resize();
        self.resize_pending = false;
    }

    /// Clears, draws every sphere in the grid, and presents.
    pub fn render(&mut self) -> Result<FrameStats> {
        if self.resize_pending {
            self.resize();
        }
        if self.context.surface_size().is_empty() {
            debug!("surface has no area; skipping frame");
            return Ok(FrameStats::default());
        }

        self.context.clear()?;
        self.context.set_depth_test(true);

        self.camera.set_aspect(self.context.surface_size().aspect());
        self.panel.write_uniforms(&mut self.uniforms);
        self.uniforms.set(LOCAL_TO_PROJECTION, self.camera.local_to_projection());
        self.uniforms.set(CAMERA_POSITION, self.camera.position);

        let grid = &self.config.grid;
        let mut stats = FrameStats::default();
        for column in 0..grid.columns {
            for row in 0..grid.rows {
                let model = Transform::at(grid.position(column, row)).combine();
                self.uniforms.set(MODEL_MATRIX, model);
                self.uniforms.set(ROUGHNESS, grid.roughness(column));
                self.uniforms.set(METALNESS, grid.metalness(row));
                self.context
                    .draw(&self.sphere, &self.program, &self.uniforms)
                    .with_context(|| format!("failed to draw sphere ({column}, {row})"))?;
                stats.draws += 1;
            }
        }

        self.context.present()?;
        debug!(draws = stats.draws, frame = self.context.frames_presented(), "frame presented");
        Ok(stats)
    }
}
