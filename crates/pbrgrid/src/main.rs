mod app;
mod assets;
mod camera;
mod cli;
mod lights;
mod panel;
mod paths;
mod run;
mod shader;
mod sphere;
mod transform;
mod window;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::run(cli)
}
