use anyhow::Result;

mod asset_loader;
mod camera;
mod config;
mod demo;
mod environment;
mod math;
mod model;
mod overlay;
mod placement;
mod render_loop;
mod rendering;
mod scene_graph;
mod session;
mod window;
mod xr;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = config::AppConfig::from_env();
    pollster::block_on(window::run(config))?;

    Ok(())
}
