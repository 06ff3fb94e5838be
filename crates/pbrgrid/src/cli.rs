use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sceneconfig::{Color, ColorSpaceSetting};

use crate::paths::ENV_CONFIG;

#[derive(Parser, Debug)]
#[command(
    name = "pbrgrid",
    author,
    version,
    about = "Grid of PBR spheres sweeping roughness and metalness"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Scene configuration TOML file.
    #[arg(long, value_name = "PATH", env = ENV_CONFIG, global = true)]
    pub config: Option<PathBuf>,

    /// Initial surface size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size, global = true)]
    pub size: Option<(u32, u32)>,

    /// Directory the texture files are resolved against.
    #[arg(long, value_name = "DIR", global = true)]
    pub assets: Option<PathBuf>,

    /// Sphere albedo as `R,G,B` (0-255) or `#rrggbb`.
    #[arg(long, value_name = "COLOR", value_parser = parse_color, global = true)]
    pub albedo: Option<Color>,

    /// Number of point lights; the configured lights are trimmed or repeated.
    #[arg(long, value_name = "N", global = true)]
    pub lights: Option<usize>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space, global = true)]
    pub color_space: Option<ColorSpaceSetting>,

    /// Render without a window or GPU and print a JSON summary.
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many frames (headless runs default to one).
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the effective scene configuration as TOML.
    DumpConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, e.g. 1280x720, got '{value}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}'", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}'", height.trim()))?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_color(value: &str) -> Result<Color, String> {
    value.parse()
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceSetting, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_surface_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_surface_size(" 64 X 32 "), Ok((64, 32)));
        assert!(parse_surface_size("0x10").is_err());
        assert!(parse_surface_size("1280").is_err());
        assert!(parse_surface_size("axb").is_err());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "pbrgrid",
            "--headless",
            "--frames",
            "3",
            "--albedo",
            "255,0,10",
            "--color-space",
            "gamma",
            "--lights",
            "2",
        ])
        .unwrap();
        assert!(cli.run.headless);
        assert_eq!(cli.run.frames, Some(3));
        assert_eq!(cli.run.albedo, Some(Color::new(255, 0, 10)));
        assert_eq!(cli.run.color_space, Some(ColorSpaceSetting::Gamma));
        assert_eq!(cli.run.lights, Some(2));
        assert!(cli.command.is_none());
    }

    #[test]
    fn dump_config_subcommand() {
        let cli = Cli::try_parse_from(["pbrgrid", "dump-config", "--lights", "1"]).unwrap();
        assert!(matches!(cli.command, Some(Command::DumpConfig)));
        assert_eq!(cli.run.lights, Some(1));
    }

    #[test]
    fn rejects_bad_albedo() {
        assert!(Cli::try_parse_from(["pbrgrid", "--albedo", "1,2"]).is_err());
    }
}
