use std::collections::HashMap;

use crate::context::GlContext;
use crate::gl::{constants, BufferId, BufferSource, Gl};
use crate::state::StateChange;

/// Layout handed to `vertexAttribPointer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribPointer {
    pub size: i32,
    pub normalized: bool,
    pub stride: i32,
    pub offset: i32,
}

impl AttribPointer {
    pub fn new(size: i32) -> Self {
        Self {
            size,
            normalized: false,
            stride: 0,
            offset: 0,
        }
    }
}

/// One active attribute and the buffer that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAttribute {
    name: String,
    location: i32,
    buffer: Option<BufferId>,
    data_type: u32,
}

impl ProgramAttribute {
    pub fn new(name: &str, location: i32, buffer: Option<BufferId>) -> Self {
        Self {
            name: name.to_string(),
            location,
            buffer,
            data_type: constants::FLOAT,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> i32 {
        self.location
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    pub fn data_type(&self) -> u32 {
        self.data_type
    }

    pub fn bind_buffer<G: Gl>(&self, ctx: &mut GlContext<G>, target: u32) -> StateChange {
        ctx.bind_buffer(target, self.buffer)
    }

    /// Binds this attribute's buffer and uploads `data` with `STATIC_DRAW`,
    /// remembering its scalar type for [`set_attrib_pointer`](Self::set_attrib_pointer).
    pub fn buffer_data<'a, G: Gl>(
        &mut self,
        ctx: &mut GlContext<G>,
        data: impl Into<BufferSource<'a>>,
        target: u32,
    ) -> bool {
        let data = data.into();
        self.bind_buffer(ctx, target);
        self.data_type = data.gl_type();
        ctx.buffer_data(target, data, constants::STATIC_DRAW)
    }

    pub fn set_attrib_pointer<G: Gl>(&self, ctx: &mut GlContext<G>, pointer: AttribPointer) {
        let Ok(index) = u32::try_from(self.location) else {
            return;
        };
        // The pointer captures whatever ARRAY_BUFFER is bound.
        self.bind_buffer(ctx, constants::ARRAY_BUFFER);
        ctx.gl_mut().vertex_attrib_pointer(
            index,
            pointer.size,
            self.data_type,
            pointer.normalized,
            pointer.stride,
            pointer.offset,
        );
    }

    pub fn enable_attribute_array<G: Gl>(&self, ctx: &mut GlContext<G>) {
        if let Ok(index) = u32::try_from(self.location) {
            ctx.gl_mut().enable_vertex_attrib_array(index);
        }
    }
}

/// Active attributes keyed by full name.
#[derive(Debug, Default, Clone)]
pub struct AttributeTable {
    attributes: HashMap<String, ProgramAttribute>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: ProgramAttribute) {
        self.attributes.insert(attribute.name.clone(), attribute);
    }

    pub fn get(&self, name: &str) -> Option<&ProgramAttribute> {
        self.attributes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ProgramAttribute> {
        self.attributes.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessConfig, HeadlessGl};
    use crate::program::create_program;

    const VERTEX: &str = "attribute vec2 position;\nattribute vec4 color;\nvarying vec4 v_color;\nvoid main() { v_color = color; gl_Position = vec4(position, 0.0, 1.0); }";
    const FRAGMENT: &str = "precision mediump float;\nvarying vec4 v_color;\nvoid main() { gl_FragColor = v_color; }";

    #[test]
    fn upload_infers_type_and_binds_once() {
        let mut ctx = GlContext::new(HeadlessGl::new(HeadlessConfig::default()));
        let mut program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        ctx.gl_mut().reset_calls();

        let position = program.attribute("position").unwrap();
        assert_eq!(position.data_type(), constants::FLOAT);
        let quad = [0u16, 1, 2, 3];
        assert!(position.buffer_data(&mut ctx, &quad[..], constants::ARRAY_BUFFER));
        assert_eq!(position.data_type(), constants::UNSIGNED_SHORT);
        let points = [0.0f32, 0.0, 1.0, 0.0];
        position.buffer_data(&mut ctx, &points[..], constants::ARRAY_BUFFER);
        assert_eq!(position.data_type(), constants::FLOAT);
        position.set_attrib_pointer(&mut ctx, AttribPointer::new(2));
        position.enable_attribute_array(&mut ctx);

        assert_eq!(ctx.gl().calls().count("bindBuffer"), 1);
        assert_eq!(ctx.gl().calls().count("bufferData"), 2);
        assert_eq!(ctx.gl().calls().count("vertexAttribPointer"), 1);
        assert_eq!(ctx.gl().calls().count("enableVertexAttribArray"), 1);

        let buffer = position.buffer().unwrap();
        assert_eq!(ctx.gl().buffer_contents(buffer).map(<[u8]>::len), Some(16));
    }

    #[test]
    fn each_attribute_owns_a_buffer() {
        let mut ctx = GlContext::new(HeadlessGl::new(HeadlessConfig::default()));
        let program = create_program(&mut ctx, VERTEX, FRAGMENT).unwrap();
        let position = program.attributes.get("position").unwrap();
        let color = program.attributes.get("color").unwrap();
        assert_ne!(position.buffer(), color.buffer());
        assert_eq!(position.location(), 0);
        assert_eq!(color.location(), 1);
        let mut names: Vec<&str> = program.attributes.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["color", "position"]);
    }
}
