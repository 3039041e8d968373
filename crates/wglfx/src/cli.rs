use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "wglfx",
    author,
    version,
    about = "Headless runner for wave-effect image scenes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render every target of a scene to PNG files.
    Render(RenderArgs),
    /// Compile and link a program, then print its reflected interface.
    Inspect(InspectArgs),
    /// Print the resolved configuration directory and default scene file.
    Where,
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Scene TOML file; defaults to `scene.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the rendered `<target>.png` files are written to.
    #[arg(long, value_name = "DIR", default_value = "out")]
    pub out: PathBuf,

    /// Number of display refreshes to simulate (overrides `loop.frames`).
    #[arg(long, value_name = "N", value_parser = parse_frames)]
    pub frames: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Vertex shader source file.
    #[arg(long, value_name = "FILE")]
    pub vertex: PathBuf,

    /// Fragment shader source file.
    #[arg(long, value_name = "FILE")]
    pub fragment: PathBuf,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Reflect against a WebGL 1 context instead of WebGL 2.
    #[arg(long)]
    pub webgl1: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_frames(value: &str) -> Result<u32, String> {
    let frames: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame count '{value}'"))?;
    if frames == 0 {
        return Err("frame count must be greater than zero".into());
    }
    Ok(frames)
}
