mod cli;
mod inspect;
mod paths;
mod render;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = cli::parse();
    initialise_tracing();

    match cli.command {
        Command::Render(args) => render::run(args),
        Command::Inspect(args) => inspect::run(args),
        Command::Where => print_paths(),
    }
}

// Logs go to stderr so `inspect --json` output stays machine readable.
fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_paths() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("Config directory: {}", paths.config_dir().display());
    println!("Scene file: {}", paths.scene_file().display());
    Ok(())
}
