use crate::gl::{constants, BufferId, BufferSource, Gl, ProgramId};

/// Outcome of a cached state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Applied,
    Unchanged,
    ContextLost,
}

impl StateChange {
    pub fn applied(self) -> bool {
        matches!(self, StateChange::Applied)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateCache {
    program: Option<ProgramId>,
    viewport: [i32; 4],
    clear_color: [f32; 4],
    array_buffer: Option<BufferId>,
    element_buffer: Option<BufferId>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn viewport(&self) -> [i32; 4] {
        self.viewport
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn bound_buffer(&self, target: u32) -> Option<BufferId> {
        match target {
            constants::ELEMENT_ARRAY_BUFFER => self.element_buffer,
            _ => self.array_buffer,
        }
    }

    pub fn use_program<G: Gl + ?Sized>(
        &mut self,
        gl: &mut G,
        program: Option<ProgramId>,
    ) -> StateChange {
        if gl.is_context_lost() {
            return StateChange::ContextLost;
        }
        if self.program == program {
            return StateChange::Unchanged;
        }
        gl.use_program(program);
        self.program = program;
        StateChange::Applied
    }

    pub fn set_viewport<G: Gl + ?Sized>(
        &mut self,
        gl: &mut G,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> StateChange {
        if gl.is_context_lost() {
            return StateChange::ContextLost;
        }
        let next = [x, y, width, height];
        if self.viewport == next {
            return StateChange::Unchanged;
        }
        gl.viewport(x, y, width, height);
        self.viewport = next;
        tracing::trace!(x, y, width, height, "viewport changed");
        StateChange::Applied
    }

    pub fn set_clear_color<G: Gl + ?Sized>(
        &mut self,
        gl: &mut G,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> StateChange {
        if gl.is_context_lost() {
            return StateChange::ContextLost;
        }
        let next = [r, g, b, a];
        if self.clear_color == next {
            return StateChange::Unchanged;
        }
        gl.clear_color(r, g, b, a);
        self.clear_color = next;
        tracing::trace!(r, g, b, a, "clear color changed");
        StateChange::Applied
    }

    pub fn bind_buffer<G: Gl + ?Sized>(
        &mut self,
        gl: &mut G,
        target: u32,
        buffer: Option<BufferId>,
    ) -> StateChange {
        if gl.is_context_lost() {
            return StateChange::ContextLost;
        }
        let slot = match target {
            constants::ELEMENT_ARRAY_BUFFER => &mut self.element_buffer,
            _ => &mut self.array_buffer,
        };
        if *slot == buffer {
            return StateChange::Unchanged;
        }
        gl.bind_buffer(target, buffer);
        *slot = buffer;
        StateChange::Applied
    }

    /// Uploads into the buffer currently bound to `target`.
    ///
    /// Returns `false` without touching the backend when nothing is bound or
    /// the context is lost.
    pub fn buffer_data<G: Gl + ?Sized>(
        &mut self,
        gl: &mut G,
        target: u32,
        data: BufferSource<'_>,
        usage: u32,
    ) -> bool {
        if gl.is_context_lost() {
            return false;
        }
        if self.bound_buffer(target).is_none() {
            tracing::warn!(target, "bufferData ignored: no buffer bound");
            return false;
        }
        gl.buffer_data(target, data, usage);
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessConfig, HeadlessGl};

    #[test]
    fn repeated_viewport_is_issued_once() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let mut cache = StateCache::new();
        assert_eq!(
            cache.set_viewport(&mut gl, 0, 0, 100, 100),
            StateChange::Applied
        );
        assert_eq!(
            cache.set_viewport(&mut gl, 0, 0, 100, 100),
            StateChange::Unchanged
        );
        assert_eq!(gl.calls().count("viewport"), 1);
    }

    #[test]
    fn changing_any_viewport_component_reissues() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let mut cache = StateCache::new();
        cache.set_viewport(&mut gl, 0, 0, 100, 100);
        cache.set_viewport(&mut gl, 1, 0, 100, 100);
        cache.set_viewport(&mut gl, 1, 1, 100, 100);
        cache.set_viewport(&mut gl, 1, 1, 101, 100);
        cache.set_viewport(&mut gl, 1, 1, 101, 101);
        assert_eq!(gl.calls().count("viewport"), 5);
        assert_eq!(cache.viewport(), [1, 1, 101, 101]);
    }

    #[test]
    fn clear_color_and_program_are_deduplicated() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let mut cache = StateCache::new();
        // The cache starts at transparent black, like a fresh context.
        assert_eq!(
            cache.set_clear_color(&mut gl, 0.0, 0.0, 0.0, 0.0),
            StateChange::Unchanged
        );
        cache.set_clear_color(&mut gl, 1.0, 0.0, 0.0, 1.0);
        cache.set_clear_color(&mut gl, 1.0, 0.0, 0.0, 1.0);
        assert_eq!(gl.calls().count("clearColor"), 1);

        let program = gl.create_program();
        assert!(cache.use_program(&mut gl, program).applied());
        assert!(!cache.use_program(&mut gl, program).applied());
        assert_eq!(gl.calls().count("useProgram"), 1);
    }

    #[test]
    fn buffer_binding_is_tracked_per_target() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let mut cache = StateCache::new();
        let buffer = gl.create_buffer();
        cache.bind_buffer(&mut gl, constants::ARRAY_BUFFER, buffer);
        cache.bind_buffer(&mut gl, constants::ARRAY_BUFFER, buffer);
        cache.bind_buffer(&mut gl, constants::ELEMENT_ARRAY_BUFFER, buffer);
        assert_eq!(gl.calls().count("bindBuffer"), 2);
        assert_eq!(cache.bound_buffer(constants::ARRAY_BUFFER), buffer);
    }

    #[test]
    fn buffer_data_requires_a_bound_buffer() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let mut cache = StateCache::new();
        let data = [0.0f32, 1.0, 2.0];
        assert!(!cache.buffer_data(
            &mut gl,
            constants::ARRAY_BUFFER,
            BufferSource::F32(&data),
            constants::STATIC_DRAW
        ));
        assert_eq!(gl.calls().count("bufferData"), 0);

        let buffer = gl.create_buffer();
        cache.bind_buffer(&mut gl, constants::ARRAY_BUFFER, buffer);
        assert!(cache.buffer_data(
            &mut gl,
            constants::ARRAY_BUFFER,
            BufferSource::F32(&data),
            constants::STATIC_DRAW
        ));
        assert_eq!(gl.calls().count("bufferData"), 1);
    }

    #[test]
    fn lost_context_neither_issues_nor_tracks() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let mut cache = StateCache::new();
        gl.lose_context();
        assert_eq!(
            cache.set_viewport(&mut gl, 0, 0, 10, 10),
            StateChange::ContextLost
        );
        assert_eq!(cache.viewport(), [0, 0, 0, 0]);
        gl.restore_context();
        assert!(cache.set_viewport(&mut gl, 0, 0, 10, 10).applied());
    }
}
