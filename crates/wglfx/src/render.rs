use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use canvas::{install_kernels, ImageScene, NoiseSource, TargetState, WaveSettings};
use sceneconfig::{ResolvedTarget, SceneConfig};
use scheduler::{FrameScheduler, ManualHost};
use wgl::{FileImageLoader, HeadlessConfig, HeadlessGl};

use crate::cli::RenderArgs;
use crate::paths::AppPaths;

#[derive(Debug, Default)]
pub struct RenderReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub frames: u64,
}

pub fn run(args: RenderArgs) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => AppPaths::discover()?.scene_file(),
    };
    let config = SceneConfig::load(&config_path)
        .with_context(|| format!("failed to load scene {}", config_path.display()))?;
    let root = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let frames = args.frames.unwrap_or(config.render_loop.frames);

    let report = render_scene(&config, &root, frames, &args.out)?;
    for path in &report.written {
        println!("wrote {}", path.display());
    }
    for name in &report.skipped {
        println!("skipped {name}");
    }
    Ok(())
}

/// Loads every target, drives `frames` refreshes through the scheduler and
/// writes each ready target's surface to `<out>/<name>.png`.
pub fn render_scene(
    config: &SceneConfig,
    asset_root: &Path,
    frames: u32,
    out: &Path,
) -> Result<RenderReport> {
    let mut gl = HeadlessGl::new(HeadlessConfig {
        webgl2: config.context.webgl2,
        max_texture_size: config.context.max_texture_size,
        surface_size: (config.context.width, config.context.height),
        ..HeadlessConfig::default()
    });
    install_kernels(&mut gl);
    let scene = Rc::new(RefCell::new(ImageScene::new(gl)));
    let loader = FileImageLoader::new(asset_root);

    let mut report = RenderReport::default();
    for (index, target) in config.resolved_targets().into_iter().enumerate() {
        if let Err(err) = load_target(&mut scene.borrow_mut(), &loader, &target, index as u64) {
            tracing::warn!(name = %target.name, error = %err, "target skipped");
            report.skipped.push(target.name.clone());
        }
    }
    if report.skipped.len() == config.targets.len() {
        bail!("no target in {} could be loaded", asset_root.display());
    }

    let mut scheduler = FrameScheduler::new(ManualHost::new());
    ImageScene::schedule(&scene, &mut scheduler);
    let start = Instant::now();
    for frame in 0..frames {
        let Some(now) = config
            .render_loop
            .frame_interval
            .checked_mul(frame)
            .and_then(|offset| start.checked_add(offset))
        else {
            tracing::warn!(frame, "frame time out of range; render loop stopped");
            break;
        };
        if scheduler.tick(now) == 0 {
            tracing::warn!(frame, "render loop stopped early");
            break;
        }
    }
    scheduler.reset();

    fs::create_dir_all(out)
        .with_context(|| format!("failed to create output directory {}", out.display()))?;
    let scene = scene.borrow();
    report.frames = scene.frames();
    for (name, target) in scene.targets() {
        if target.state() != TargetState::Ready {
            continue;
        }
        let path = out.join(format!("{name}.png"));
        target
            .surface()
            .image()
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(name, path = %path.display(), "surface exported");
        report.written.push(path);
    }
    Ok(report)
}

fn load_target(
    scene: &mut ImageScene<HeadlessGl>,
    loader: &FileImageLoader,
    target: &ResolvedTarget,
    seed: u64,
) -> Result<()> {
    let render_target = scene.add_target(target.name.clone());
    render_target.set_wave(WaveSettings {
        intensity: target.wave_intensity,
        scale: target.wave_scale,
    });
    let noise = match &target.noise {
        Some(locator) => NoiseSource::Asset(locator.clone()),
        None => NoiseSource::Generated { seed },
    };
    let Some((render_target, ctx)) = scene.target_with_context(&target.name) else {
        bail!("target '{}' vanished while loading", target.name);
    };
    pollster::block_on(render_target.load_image(ctx, loader, &target.image, &noise))?;
    render_target.set_size(ctx, target.width, target.height);
    scene.set_visible(&target.name, target.active);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn scene_with_asset(root: &Path) -> SceneConfig {
        RgbaImage::from_pixel(2, 2, Rgba([0, 200, 0, 255]))
            .save(root.join("green.png"))
            .unwrap();
        SceneConfig::from_toml_str(
            "version = 1\n\n[[targets]]\nname = \"green\"\nimage = \"green.png\"\nwidth = 4\nheight = 4\n",
        )
        .unwrap()
    }

    #[test]
    fn renders_each_requested_frame() {
        let root = TempDir::new().unwrap();
        let config = scene_with_asset(root.path());
        let out = root.path().join("out");
        let report = render_scene(&config, root.path(), 3, &out).unwrap();
        assert_eq!(report.frames, 3);
        assert_eq!(report.written, vec![out.join("green.png")]);
    }

    #[test]
    fn out_of_range_frame_times_stop_the_loop() {
        let root = TempDir::new().unwrap();
        let mut config = scene_with_asset(root.path());
        config.render_loop.frame_interval = Duration::MAX;
        let report = render_scene(&config, root.path(), 4, &root.path().join("out")).unwrap();
        assert_eq!(report.frames, 1);
        assert_eq!(report.written.len(), 1);
    }
}
