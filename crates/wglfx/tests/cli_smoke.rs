use std::fs;
use std::path::Path;
use std::process::Command;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

const VERTEX: &str = "attribute vec2 position;\nattribute vec2 uv;\nvarying vec2 v_uv;\nvoid main() { v_uv = uv; gl_Position = vec4(position, 0.0, 1.0); }\n";

fn write_scene(root: &Path) {
    fs::create_dir_all(root.join("assets")).unwrap();
    RgbaImage::from_pixel(4, 4, Rgba([220, 30, 30, 255]))
        .save(root.join("assets/hero.png"))
        .unwrap();
    fs::write(
        root.join("scene.toml"),
        r#"
version = 1

[loop]
frames = 2
frame_interval = "16ms"

[[targets]]
name = "hero"
image = "assets/hero.png"
width = 8
height = 8

[[targets]]
name = "missing"
image = "assets/missing.png"
width = 8
height = 8
"#,
    )
    .unwrap();
}

#[test]
fn render_writes_ready_targets() {
    let root = TempDir::new().unwrap();
    write_scene(root.path());
    let out = root.path().join("out");

    let output = Command::new(env!("CARGO_BIN_EXE_wglfx"))
        .env("WGLFX_CONFIG_DIR", root.path())
        .args(["render", "--out"])
        .arg(&out)
        .output()
        .expect("failed to run wglfx render");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skipped missing"), "{stdout}");

    let rendered = image::open(out.join("hero.png")).unwrap().to_rgba8();
    assert_eq!(rendered.dimensions(), (8, 8));
    assert!(!out.join("missing.png").exists());
}

#[test]
fn render_fails_when_no_target_loads() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("scene.toml"),
        "version = 1\n\n[[targets]]\nname = \"gone\"\nimage = \"nowhere.png\"\nwidth = 4\nheight = 4\n",
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_wglfx"))
        .args(["render", "--config"])
        .arg(root.path().join("scene.toml"))
        .arg("--out")
        .arg(root.path().join("out"))
        .status()
        .expect("failed to run wglfx render");

    assert!(!status.success());
}

#[test]
fn inspect_prints_json_interface() {
    let root = TempDir::new().unwrap();
    let vertex = root.path().join("effect.vert");
    let fragment = root.path().join("effect.frag");
    fs::write(&vertex, VERTEX).unwrap();
    fs::write(
        &fragment,
        "precision mediump float;\nuniform sampler2D u_tImage;\nuniform vec2 u_scale;\nvarying vec2 v_uv;\nvoid main() { gl_FragColor = texture2D(u_tImage, v_uv * u_scale); }\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_wglfx"))
        .args(["inspect", "--json", "--vertex"])
        .arg(&vertex)
        .arg("--fragment")
        .arg(&fragment)
        .output()
        .expect("failed to run wglfx inspect");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let uniforms: Vec<&str> = report["uniforms"]
        .as_array()
        .unwrap()
        .iter()
        .map(|uniform| uniform["name"].as_str().unwrap())
        .collect();
    assert_eq!(uniforms, vec!["u_scale", "u_tImage"]);
    assert_eq!(report["attributes"][1]["name"], "uv");
}

#[test]
fn inspect_reports_compile_errors() {
    let root = TempDir::new().unwrap();
    let vertex = root.path().join("effect.vert");
    let fragment = root.path().join("broken.frag");
    fs::write(&vertex, VERTEX).unwrap();
    fs::write(&fragment, "void main() {\n#error nope\n}\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_wglfx"))
        .args(["inspect", "--vertex"])
        .arg(&vertex)
        .arg("--fragment")
        .arg(&fragment)
        .output()
        .expect("failed to run wglfx inspect");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(">   2: #error nope"), "{stderr}");
}
