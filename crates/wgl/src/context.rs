use std::cell::OnceCell;

use crate::capabilities::Capabilities;
use crate::error::ShaderKind;
use crate::gl::{BufferId, BufferSource, Gl, ProgramId, UniformLocation};
use crate::state::{StateCache, StateChange};
use crate::uniforms::{SetterCache, UniformType, UniformValue};

/// Observable record of something that went wrong without failing a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    CompileFailed { kind: ShaderKind, log: String },
    LinkFailed { log: String },
    UnboundBufferData { target: u32 },
}

/// A backend together with its state cache, uniform setter cache and
/// capabilities. Create exactly one per underlying context.
pub struct GlContext<G: Gl> {
    gl: G,
    state: StateCache,
    setters: SetterCache,
    capabilities: OnceCell<Capabilities>,
    diagnostics: Vec<Diagnostic>,
}

impl<G: Gl> GlContext<G> {
    pub fn new(gl: G) -> Self {
        Self {
            gl,
            state: StateCache::new(),
            setters: SetterCache::new(),
            capabilities: OnceCell::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    /// Direct backend access. State the cache tracks (program, viewport,
    /// clear colour, buffer bindings) must still go through the methods
    /// below.
    pub fn gl_mut(&mut self) -> &mut G {
        &mut self.gl
    }

    pub fn into_inner(self) -> G {
        self.gl
    }

    pub fn is_lost(&self) -> bool {
        self.gl.is_context_lost()
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.capabilities
            .get_or_init(|| Capabilities::query(&self.gl))
    }

    pub fn state(&self) -> &StateCache {
        &self.state
    }

    pub fn setters(&self) -> &SetterCache {
        &self.setters
    }

    pub fn use_program(&mut self, program: Option<ProgramId>) -> StateChange {
        self.state.use_program(&mut self.gl, program)
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> StateChange {
        self.state.set_viewport(&mut self.gl, x, y, width, height)
    }

    pub fn set_clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) -> StateChange {
        self.state.set_clear_color(&mut self.gl, r, g, b, a)
    }

    pub fn bind_buffer(&mut self, target: u32, buffer: Option<BufferId>) -> StateChange {
        self.state.bind_buffer(&mut self.gl, target, buffer)
    }

    pub fn buffer_data(&mut self, target: u32, data: BufferSource<'_>, usage: u32) -> bool {
        if self.state.buffer_data(&mut self.gl, target, data, usage) {
            return true;
        }
        if !self.is_lost() {
            self.diagnostics.push(Diagnostic::UnboundBufferData { target });
        }
        false
    }

    /// Forgets every cached value. Call after the backend restored a lost
    /// context; all objects created before the loss must be rebuilt.
    pub fn reset_state(&mut self) {
        self.state.reset();
        self.setters.clear();
        self.capabilities = OnceCell::new();
        tracing::debug!("context caches reset");
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn apply_uniform(
        &mut self,
        ty: UniformType,
        size: i32,
        location: UniformLocation,
        value: &UniformValue,
    ) {
        let setter = self.setters.get(ty, size);
        setter.apply(&mut self.gl, location, value);
    }
}
