use std::fs;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use wgl::uniforms::NameParts;
use wgl::{create_program, Gl, GlContext, HeadlessConfig, HeadlessGl, UniformType, WglError};

use crate::cli::InspectArgs;

#[derive(Debug, Serialize)]
pub struct ProgramReport {
    pub webgl2: bool,
    pub uniforms: Vec<UniformReport>,
    pub attributes: Vec<AttributeReport>,
}

#[derive(Debug, Serialize)]
pub struct UniformReport {
    pub name: String,
    #[serde(rename = "type")]
    pub glsl_type: &'static str,
    pub size: i32,
    pub struct_name: Option<String>,
    pub struct_index: i32,
    pub property_name: String,
    pub property_index: i32,
    /// Whether the program's uniform map resolves the property name to
    /// this uniform. Struct array members share a key and the last wins.
    pub mapped: bool,
}

#[derive(Debug, Serialize)]
pub struct AttributeReport {
    pub name: String,
    pub location: i32,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let vertex = fs::read_to_string(&args.vertex)
        .with_context(|| format!("failed to read vertex shader {}", args.vertex.display()))?;
    let fragment = fs::read_to_string(&args.fragment)
        .with_context(|| format!("failed to read fragment shader {}", args.fragment.display()))?;

    let report = match inspect_program(&vertex, &fragment, !args.webgl1) {
        Ok(report) => report,
        Err(WglError::Compile { kind, log, excerpt }) => {
            if let Some(excerpt) = excerpt {
                eprintln!("{excerpt}");
            }
            bail!("{kind} shader failed to compile: {}", log.trim());
        }
        Err(err) => return Err(err.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Links the sources against a fresh headless context and collects the
/// reflected interface, sorted by name.
pub fn inspect_program(vertex: &str, fragment: &str, webgl2: bool) -> Result<ProgramReport, WglError> {
    let mut ctx = GlContext::new(HeadlessGl::new(HeadlessConfig {
        webgl2,
        ..HeadlessConfig::default()
    }));
    let program = create_program(&mut ctx, vertex, fragment)?;

    let mut uniforms = Vec::new();
    if let Some(id) = program.id() {
        let gl = ctx.gl();
        for index in 0..gl.active_uniform_count(id) {
            let Some(info) = gl.active_uniform(id, index) else {
                continue;
            };
            let Some(ty) = UniformType::from_gl(info.gl_type) else {
                tracing::warn!(uniform = %info.name, gl_type = info.gl_type, "unsupported uniform type");
                continue;
            };
            let parts = NameParts::parse(&info.name);
            let mapped = program
                .uniforms
                .get_active(&parts.property_name)
                .is_some_and(|uniform| uniform.name() == info.name);
            uniforms.push(UniformReport {
                glsl_type: ty.glsl_name(),
                size: info.size,
                struct_name: parts.struct_name,
                struct_index: parts.struct_index,
                property_name: parts.property_name,
                property_index: parts.property_index,
                mapped,
                name: info.name,
            });
        }
    }
    uniforms.sort_by(|a, b| a.name.cmp(&b.name));

    let mut attributes: Vec<AttributeReport> = program
        .attributes
        .names()
        .filter_map(|name| program.attributes.get(name))
        .map(|attribute| AttributeReport {
            name: attribute.name().to_string(),
            location: attribute.location(),
        })
        .collect();
    attributes.sort_by_key(|attribute| attribute.location);

    Ok(ProgramReport {
        webgl2,
        uniforms,
        attributes,
    })
}

fn print_report(report: &ProgramReport) {
    println!(
        "Context: {}",
        if report.webgl2 { "webgl2" } else { "webgl1" }
    );
    println!("Uniforms:");
    for uniform in &report.uniforms {
        let array = if uniform.size > 1 {
            format!("[{}]", uniform.size)
        } else {
            String::new()
        };
        let shadowed = if uniform.mapped { "" } else { "  (shadowed)" };
        println!("  {:<8} {}{array}{shadowed}", uniform.glsl_type, uniform.name);
    }
    println!("Attributes:");
    for attribute in &report.attributes {
        println!("  {:>2}  {}", attribute.location, attribute.name);
    }
}
