use crate::context::GlContext;
use crate::gl::{constants, FramebufferId, Gl};
use crate::texture::{Texture2D, TextureOptions};

pub const FRAMEBUFFER_TEXTURE_UNIT: u32 = 3;

#[derive(Debug)]
pub struct FrameBuffer {
    handle: Option<FramebufferId>,
    texture: Texture2D,
    width: u32,
    height: u32,
    allocated: Option<(u32, u32)>,
}

impl FrameBuffer {
    pub fn new<G: Gl>(ctx: &mut GlContext<G>, width: u32, height: u32) -> Self {
        let options = TextureOptions::default().with_flip_y(false);
        let texture = Texture2D::new(ctx, FRAMEBUFFER_TEXTURE_UNIT, options);
        Self {
            handle: ctx.gl_mut().create_framebuffer(),
            texture,
            width,
            height,
            allocated: None,
        }
    }

    pub fn handle(&self) -> Option<FramebufferId> {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Makes this framebuffer the render target, reallocating the colour
    /// texture only when the size changed since the last bind.
    pub fn bind<G: Gl>(&mut self, ctx: &mut GlContext<G>) {
        if ctx.is_lost() {
            return;
        }
        let size = (self.width, self.height);
        if self.allocated != Some(size) {
            self.texture.allocate(ctx, self.width, self.height);
            self.allocated = Some(size);
            tracing::debug!(width = self.width, height = self.height, "framebuffer storage allocated");
        }
        let gl = ctx.gl_mut();
        gl.bind_framebuffer(constants::FRAMEBUFFER, self.handle);
        gl.framebuffer_texture_2d(
            constants::FRAMEBUFFER,
            constants::COLOR_ATTACHMENT0,
            constants::TEXTURE_2D,
            self.texture.handle(),
            0,
        );
    }

    pub fn unbind<G: Gl>(&self, ctx: &mut GlContext<G>) {
        ctx.gl_mut().bind_framebuffer(constants::FRAMEBUFFER, None);
    }

    pub fn texture(&self) -> &Texture2D {
        &self.texture
    }
}
