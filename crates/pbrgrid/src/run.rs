use anyhow::{Context, Result};
use renderer::{ColorSpaceMode, HeadlessDevice};
use sceneconfig::{ColorSpaceSetting, SceneConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::app::Application;
use crate::assets::LoadedTextures;
use crate::cli::{Cli, Command, RunArgs};
use crate::paths::{load_scene, user_config_file, ConfigOrigin};
use crate::window;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let (config, origin) = effective_config(&cli.run)?;
    match &origin {
        ConfigOrigin::Explicit(path) | ConfigOrigin::UserDefault(path) => {
            tracing::info!(path = %path.display(), "loaded scene configuration");
        }
        ConfigOrigin::Builtin => tracing::info!("using built-in scene"),
    }

    if let Some(Command::DumpConfig) = cli.command {
        let rendered = config.to_toml().context("failed to render configuration")?;
        print!("{rendered}");
        return Ok(());
    }

    let color_space = color_space_mode(config.surface.color_space);
    if cli.run.headless {
        let frames = cli.run.frames.unwrap_or(1);
        let summary = run_headless(config, color_space, frames)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to serialise run summary")?
        );
        Ok(())
    } else {
        window::run_window(config, color_space, cli.run.frames)
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the scene and layers the command-line overrides on top.
pub fn effective_config(args: &RunArgs) -> Result<(SceneConfig, ConfigOrigin)> {
    let (mut config, origin) = load_scene(args.config.as_deref(), user_config_file())?;

    if let Some((width, height)) = args.size {
        config.surface.width = width;
        config.surface.height = height;
    }
    if let Some(root) = &args.assets {
        config.assets.root = root.clone();
    }
    if let Some(albedo) = args.albedo {
        config.panel.albedo = albedo;
    }
    if let Some(color_space) = args.color_space {
        config.surface.color_space = color_space;
    }
    if let Some(count) = args.lights {
        config = config.with_light_count(count).context("invalid --lights override")?;
    }
    config.validate().context("invalid scene configuration")?;
    Ok((config, origin))
}

pub fn color_space_mode(setting: ColorSpaceSetting) -> ColorSpaceMode {
    match setting {
        ColorSpaceSetting::Auto => ColorSpaceMode::Auto,
        ColorSpaceSetting::Gamma => ColorSpaceMode::Gamma,
        ColorSpaceSetting::Linear => ColorSpaceMode::Linear,
    }
}

/// What a headless run did, printed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadlessSummary {
    pub frames: u64,
    pub draws: usize,
    pub lights: usize,
    pub grid: [u32; 2],
    pub surface: [u32; 2],
    pub textures_loaded: usize,
    pub texture_binds: usize,
    pub uniform_writes: usize,
}

pub fn run_headless(config: SceneConfig, color_space: ColorSpaceMode, frames: u64) -> Result<HeadlessSummary> {
    let loaded = LoadedTextures::load(&config.assets);
    let textures_loaded = loaded.loaded_count();
    let device = HeadlessDevice::new(config.surface.width, config.surface.height).without_log();
    let lights = config.lights.len();
    let grid = [config.grid.columns, config.grid.rows];
    let surface = [config.surface.width, config.surface.height];

    let mut app = Application::new(device, config, color_space, loaded)?;
    for frame in 0..frames {
        app.render().with_context(|| format!("headless frame {frame} failed"))?;
    }

    let device = app.context().device();
    let counts = device.counts();
    let summary = HeadlessSummary {
        frames: device.frames(),
        draws: counts.draws,
        lights,
        grid,
        surface,
        textures_loaded,
        texture_binds: counts.texture_binds,
        uniform_writes: counts.uniform_writes,
    };
    tracing::info!(frames = summary.frames, draws = summary.draws, "headless run complete");
    Ok(summary)
}
