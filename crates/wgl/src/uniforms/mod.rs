//! Program reflection and the uniform layer.
//!
//! Reflection builds one [`ProgramUniform`] per active uniform. Lookups by a
//! name the driver stripped get a [`StubUniform`] instead, so callers can
//! assign every uniform they expect without checking whether it survived
//! compilation.

mod flatten;
mod name;
mod proxy;
mod setter;
mod value;

use std::collections::HashMap;
use std::fmt;

use crate::attributes::{AttributeTable, ProgramAttribute};
use crate::context::GlContext;
use crate::gl::{Gl, ProgramId};

pub use flatten::{flatten, ComponentSource};
pub use name::NameParts;
pub use proxy::{ProgramUniform, StubUniform, Uniform};
pub use setter::{SetterCache, SetterKind, UniformSetter};
pub use value::{UniformInput, UniformType, UniformValue};

type StubHook = Box<dyn FnMut(&str)>;

/// Uniforms of one program, keyed by property name.
#[derive(Default)]
pub struct UniformMap {
    entries: Vec<Uniform>,
    index: HashMap<String, usize>,
    stubs: Vec<String>,
    on_stub: Option<StubHook>,
}

impl fmt::Debug for UniformMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformMap")
            .field("entries", &self.entries)
            .field("stubs", &self.stubs)
            .finish()
    }
}

impl UniformMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active uniform. A later uniform under the same key
    /// replaces the earlier one.
    pub fn insert(&mut self, key: String, uniform: ProgramUniform) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot] = Uniform::Active(uniform),
            None => {
                self.entries.push(Uniform::Active(uniform));
                self.index.insert(key, self.entries.len() - 1);
            }
        }
    }

    /// Returns the uniform registered under `name`, allocating a stub the
    /// first time an unknown name is asked for.
    pub fn get(&mut self, name: &str) -> &mut Uniform {
        let slot = match self.index.get(name) {
            Some(&slot) => slot,
            None => {
                tracing::warn!(uniform = %name, "uniform is not active; serving a stub");
                if let Some(hook) = self.on_stub.as_mut() {
                    hook(name);
                }
                self.stubs.push(name.to_string());
                self.entries.push(Uniform::Stub(StubUniform::new(name)));
                let slot = self.entries.len() - 1;
                self.index.insert(name.to_string(), slot);
                slot
            }
        };
        &mut self.entries[slot]
    }

    /// Looks a name up without allocating a stub.
    pub fn peek(&self, name: &str) -> Option<&Uniform> {
        self.index.get(name).map(|&slot| &self.entries[slot])
    }

    pub fn get_active(&self, name: &str) -> Option<&ProgramUniform> {
        self.peek(name).and_then(Uniform::as_active)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_active(name).is_some()
    }

    /// Active uniforms in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProgramUniform> {
        self.entries.iter().filter_map(Uniform::as_active)
    }

    pub fn active_len(&self) -> usize {
        self.iter().count()
    }

    /// Names served by a stub, in the order they were first requested.
    pub fn stubs(&self) -> &[String] {
        &self.stubs
    }

    /// Called once per name the first time a stub is served for it.
    pub fn on_stub(&mut self, hook: impl FnMut(&str) + 'static) {
        self.on_stub = Some(Box::new(hook));
    }

    /// Pushes every pending change. Returns how many uniforms were uploaded.
    pub fn update_all<G: Gl>(&mut self, ctx: &mut GlContext<G>) -> usize {
        self.entries
            .iter_mut()
            .filter(|uniform| uniform.needs_update())
            .map(|uniform| uniform.update(ctx))
            .filter(|uploaded| *uploaded)
            .count()
    }
}

/// Builds the uniform map of a linked program. A lost context yields an
/// empty map.
pub fn reflect_uniforms<G: Gl + ?Sized>(gl: &G, program: ProgramId) -> UniformMap {
    let mut map = UniformMap::new();
    for index in 0..gl.active_uniform_count(program) {
        let Some(info) = gl.active_uniform(program, index) else {
            continue;
        };
        let Some(ty) = UniformType::from_gl(info.gl_type) else {
            tracing::warn!(uniform = %info.name, gl_type = info.gl_type, "unsupported uniform type");
            continue;
        };
        let location = gl.uniform_location(program, &info.name);
        let uniform = ProgramUniform::new(program, &info, ty, location);
        let key = uniform.parts().property_name.clone();
        map.insert(key, uniform);
    }
    map
}

/// Builds the attribute table of a linked program, allocating one buffer
/// per active attribute.
pub fn reflect_attributes<G: Gl>(ctx: &mut GlContext<G>, program: ProgramId) -> AttributeTable {
    let mut table = AttributeTable::new();
    let count = ctx.gl().active_attribute_count(program);
    for index in 0..count {
        let Some(info) = ctx.gl().active_attribute(program, index) else {
            continue;
        };
        let location = ctx.gl().attrib_location(program, &info.name);
        let buffer = ctx.gl_mut().create_buffer();
        table.insert(ProgramAttribute::new(&info.name, location, buffer));
    }
    table
}

pub fn reflect<G: Gl>(ctx: &mut GlContext<G>, program: ProgramId) -> (UniformMap, AttributeTable) {
    let uniforms = reflect_uniforms(ctx.gl(), program);
    let attributes = reflect_attributes(ctx, program);
    (uniforms, attributes)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::headless::{HeadlessConfig, HeadlessGl};
    use crate::program::create_program;

    const VERTEX: &str = r"
attribute vec2 position;
attribute vec2 uv;
varying vec2 v_uv;
void main() {
    v_uv = uv;
    gl_Position = vec4(position, 0.0, 1.0);
}
";

    const FRAGMENT: &str = r"
precision mediump float;
struct Light { vec3 color; float intensity; };
uniform Light lights[2];
uniform vec2 u_scale;
uniform float u_time;
uniform float u_weights[3];
uniform mat3 u_transform;
uniform bool u_enabled;
uniform sampler2D u_tImage;
uniform float u_dead;
varying vec2 v_uv;
void main() {
    vec3 p = u_transform * vec3(v_uv * u_scale, u_time);
    float w = u_weights[0] + lights[1].intensity;
    gl_FragColor = u_enabled ? texture2D(u_tImage, p.xy) * w : vec4(lights[0].color, 1.0);
}
";

    fn context() -> GlContext<HeadlessGl> {
        GlContext::new(HeadlessGl::new(HeadlessConfig::default()))
    }

    #[test]
    fn reflection_keys_by_property_name() {
        let mut ctx = context();
        let program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        let uniforms = &program.uniforms;
        assert!(uniforms.contains("u_scale"));
        assert!(uniforms.contains("u_weights"));
        assert!(!uniforms.contains("u_dead"));

        // lights[0].intensity and lights[1].intensity share a key; the later wins.
        let intensity = uniforms.get_active("intensity").unwrap();
        assert_eq!(intensity.name(), "lights[1].intensity");
        assert_eq!(intensity.parts().struct_index, 1);

        let weights = uniforms.get_active("u_weights").unwrap();
        assert_eq!(weights.size(), 3);
        assert_eq!(weights.value(), &UniformValue::Floats(vec![0.0; 3]));
        assert_eq!(
            uniforms.get_active("u_transform").unwrap().value(),
            &UniformValue::Floats(vec![0.0; 9])
        );
        assert_eq!(
            uniforms.get_active("u_enabled").unwrap().value(),
            &UniformValue::Bool(false)
        );
        assert_eq!(
            uniforms.get_active("u_tImage").unwrap().value(),
            &UniformValue::Int(0)
        );
        assert_eq!(program.attributes.len(), 2);
    }

    #[test]
    fn setting_the_current_value_issues_nothing() {
        let mut ctx = context();
        let mut program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        ctx.gl_mut().reset_calls();

        let scale = program.uniforms.get("u_scale");
        assert_eq!(scale.set(&mut ctx, [0.0f32, 0.0]), Ok(false));
        assert_eq!(ctx.gl().calls().uniform_uploads(), 0);

        assert_eq!(scale.set(&mut ctx, [1.0f32, 2.0]), Ok(true));
        assert_eq!(ctx.gl().calls().count("uniform2fv"), 1);
        assert_eq!(scale.set(&mut ctx, [1.0f32, 2.0]), Ok(false));
        assert_eq!(ctx.gl().calls().count("uniform2fv"), 1);
        assert_eq!(scale.value(), &UniformValue::Floats(vec![1.0, 2.0]));

        let id = program.id().unwrap();
        assert_eq!(
            ctx.gl().uniform_value(id, "u_scale"),
            Some(&crate::headless::StoredUniform::Floats(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn deferred_updates_wait_for_update() {
        let mut ctx = context();
        let mut program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        ctx.gl_mut().reset_calls();

        let time = program.uniforms.get("u_time");
        time.set_auto_update(false);
        assert_eq!(time.set(&mut ctx, 0.5f32), Ok(true));
        assert!(time.needs_update());
        assert_eq!(ctx.gl().calls().count("uniform1f"), 0);

        assert_eq!(program.uniforms.update_all(&mut ctx), 1);
        assert_eq!(ctx.gl().calls().count("uniform1f"), 1);
        assert!(!program.uniforms.get("u_time").needs_update());
        assert_eq!(program.uniforms.update_all(&mut ctx), 0);
    }

    #[test]
    fn array_uniforms_accept_element_lists() {
        let mut ctx = context();
        let mut program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        let weights = program.uniforms.get("u_weights");
        weights.set(&mut ctx, [1.0f32, 2.0, 3.0]).unwrap();
        // A shorter list only overwrites the leading slots.
        weights.set(&mut ctx, &[9.0f32][..]).unwrap();
        assert_eq!(weights.value(), &UniformValue::Floats(vec![9.0, 2.0, 3.0]));

        // One entry per array element: a whole matrix.
        let identity: [[f32; 9]; 1] = [[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]];
        let transform = program.uniforms.get("u_transform");
        transform.set(&mut ctx, &identity[..]).unwrap();
        assert_eq!(
            transform.value(),
            &UniformValue::Floats(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
        );
        assert_eq!(ctx.gl().calls().count("uniformMatrix3fv"), 1);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let mut ctx = context();
        let mut program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        let err = program
            .uniforms
            .get("u_scale")
            .set(&mut ctx, true)
            .unwrap_err();
        assert_eq!(
            err,
            crate::error::UniformError::ShapeMismatch {
                name: "u_scale".into(),
                expected: "vec2",
                given: "bool",
            }
        );
        // Booleans coerce from integers.
        assert_eq!(program.uniforms.get("u_enabled").set(&mut ctx, 1), Ok(true));
    }

    #[test]
    fn stubs_are_isolated_and_reported_once() {
        let mut ctx = context();
        let mut program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        let served = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&served);
        program
            .uniforms
            .on_stub(move |name| sink.borrow_mut().push(name.to_string()));
        ctx.gl_mut().reset_calls();

        let dead = program.uniforms.get("u_dead");
        assert!(dead.is_stub());
        assert_eq!(dead.value(), &UniformValue::Bool(false));
        dead.set(&mut ctx, [1.0f32, 2.0, 3.0]).unwrap();
        program.uniforms.get("u_dead").set(&mut ctx, 4.0f32).unwrap();
        assert_eq!(program.uniforms.get("u_dead").value(), &UniformValue::Float(4.0));

        assert_eq!(ctx.gl().calls().total(), 0);
        assert_eq!(*served.borrow(), vec!["u_dead".to_string()]);
        assert_eq!(program.uniforms.stubs(), &["u_dead".to_string()]);
        assert_eq!(program.uniforms.update_all(&mut ctx), 0);
    }

    #[test]
    fn setters_are_resolved_once_per_shape() {
        let mut ctx = context();
        let mut program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        for step in 1..=5 {
            program
                .uniforms
                .get("u_time")
                .set(&mut ctx, step as f32)
                .unwrap();
        }
        assert_eq!(ctx.gl().calls().count("uniform1f"), 5);
        assert_eq!(ctx.setters().resolutions(), 1);
    }

    #[test]
    fn lost_context_reflects_nothing() {
        let mut ctx = context();
        ctx.gl_mut().lose_context();
        let program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        assert!(!program.is_usable());
        assert_eq!(program.uniforms.active_len(), 0);
        assert!(program.attributes.is_empty());
    }
}
