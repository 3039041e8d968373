use crate::capabilities::Capabilities;
use crate::context::GlContext;
use crate::error::LoadError;
use crate::gl::{constants, Gl, TextureId};
use crate::image::{ImageLoader, PixelSource};
use crate::math;

/// Upload and sampling parameters, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureOptions {
    pub format: u32,
    pub internal_format: u32,
    pub data_type: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
    pub min_filter: u32,
    pub mag_filter: u32,
    pub flip_y: bool,
    pub mipmaps: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            format: constants::RGBA,
            internal_format: constants::RGBA,
            data_type: constants::UNSIGNED_BYTE,
            wrap_s: constants::CLAMP_TO_EDGE,
            wrap_t: constants::CLAMP_TO_EDGE,
            min_filter: constants::LINEAR,
            mag_filter: constants::LINEAR,
            flip_y: true,
            mipmaps: false,
        }
    }
}

impl TextureOptions {
    pub fn with_wrap(mut self, wrap_s: u32, wrap_t: u32) -> Self {
        self.wrap_s = wrap_s;
        self.wrap_t = wrap_t;
        self
    }

    pub fn with_filter(mut self, min_filter: u32, mag_filter: u32) -> Self {
        self.min_filter = min_filter;
        self.mag_filter = mag_filter;
        self
    }

    pub fn with_flip_y(mut self, flip_y: bool) -> Self {
        self.flip_y = flip_y;
        self
    }

    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    /// True when this configuration is only legal for power-of-two sizes
    /// on WebGL 1.
    pub fn requires_power_of_two(&self) -> bool {
        self.wrap_s != constants::CLAMP_TO_EDGE
            || self.wrap_t != constants::CLAMP_TO_EDGE
            || !matches!(self.min_filter, constants::NEAREST | constants::LINEAR)
    }
}

#[derive(Debug)]
pub struct Texture2D {
    handle: Option<TextureId>,
    options: TextureOptions,
    source: Option<PixelSource>,
    loaded: bool,
    pub unit_id: u32,
}

impl Texture2D {
    pub fn new<G: Gl>(ctx: &mut GlContext<G>, unit_id: u32, options: TextureOptions) -> Self {
        Self {
            handle: ctx.gl_mut().create_texture(),
            options,
            source: None,
            loaded: false,
            unit_id,
        }
    }

    pub fn handle(&self) -> Option<TextureId> {
        self.handle
    }

    pub fn options(&self) -> &TextureOptions {
        &self.options
    }

    pub fn source(&self) -> Option<&PixelSource> {
        self.source.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn width(&self) -> u32 {
        self.source.as_ref().map_or(0, PixelSource::width)
    }

    pub fn height(&self) -> u32 {
        self.source.as_ref().map_or(0, PixelSource::height)
    }

    pub fn is_power_of_two(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(PixelSource::is_power_of_two)
    }

    pub fn needs_power_of_two(&self, capabilities: &Capabilities) -> bool {
        match &self.source {
            Some(source) => needs_power_of_two(&self.options, source, capabilities.webgl2),
            None => false,
        }
    }

    /// Resolves `locator` through `loader` and uploads the result. On error
    /// the texture stays unloaded.
    pub async fn load<G, L>(
        &mut self,
        ctx: &mut GlContext<G>,
        loader: &L,
        locator: &str,
    ) -> Result<(), LoadError>
    where
        G: Gl,
        L: ImageLoader + ?Sized,
    {
        let source = loader.load(locator).await?;
        tracing::debug!(locator, width = source.width(), height = source.height(), "texture source loaded");
        self.set_source(ctx, source);
        Ok(())
    }

    /// Stores a source (resized when the context requires it), marks the
    /// texture loaded and uploads it.
    pub fn set_source<G: Gl>(&mut self, ctx: &mut GlContext<G>, source: PixelSource) {
        let capabilities = ctx.capabilities();
        let webgl2 = capabilities.webgl2;
        let max_size = capabilities.limits.max_texture_size.max(1);
        let source = if needs_power_of_two(&self.options, &source, webgl2) {
            let width = math::ceil_power_of_two(source.width()).min(math::floor_power_of_two(max_size));
            let height = math::ceil_power_of_two(source.height()).min(math::floor_power_of_two(max_size));
            tracing::debug!(
                from_width = source.width(),
                from_height = source.height(),
                width,
                height,
                "resizing texture source to a power of two"
            );
            source.resized(width, height)
        } else if source.width() > max_size || source.height() > max_size {
            let [width, height] = math::size_to_contain(
                source.width() as f32,
                source.height() as f32,
                max_size as f32,
                max_size as f32,
            );
            source.resized((width as u32).max(1), (height as u32).max(1))
        } else {
            source
        };
        self.source = Some(source);
        self.loaded = true;
        self.update(ctx);
    }

    /// Binds to `unit_id`, applies parameters and uploads the source.
    /// Returns `false` when there is nothing to upload or the context is lost.
    pub fn update<G: Gl>(&self, ctx: &mut GlContext<G>) -> bool {
        let (Some(handle), Some(source)) = (self.handle, self.source.as_ref()) else {
            return false;
        };
        if ctx.is_lost() {
            return false;
        }
        self.apply_parameters(ctx, handle);
        let gl = ctx.gl_mut();
        gl.pixel_store_i(constants::UNPACK_FLIP_Y_WEBGL, i32::from(self.options.flip_y));
        gl.tex_image_2d(
            constants::TEXTURE_2D,
            0,
            self.options.internal_format,
            source.width(),
            source.height(),
            self.options.format,
            self.options.data_type,
            Some(source.as_bytes()),
        );
        if self.options.mipmaps {
            gl.generate_mipmap(constants::TEXTURE_2D);
        }
        true
    }

    pub(crate) fn allocate<G: Gl>(&self, ctx: &mut GlContext<G>, width: u32, height: u32) {
        let Some(handle) = self.handle else {
            return;
        };
        self.apply_parameters(ctx, handle);
        ctx.gl_mut().tex_image_2d(
            constants::TEXTURE_2D,
            0,
            self.options.internal_format,
            width,
            height,
            self.options.format,
            self.options.data_type,
            None,
        );
    }

    pub fn bind<G: Gl>(&self, ctx: &mut GlContext<G>) {
        let gl = ctx.gl_mut();
        gl.active_texture(constants::TEXTURE0 + self.unit_id);
        gl.bind_texture(constants::TEXTURE_2D, self.handle);
    }

    fn apply_parameters<G: Gl>(&self, ctx: &mut GlContext<G>, handle: TextureId) {
        let gl = ctx.gl_mut();
        gl.active_texture(constants::TEXTURE0 + self.unit_id);
        gl.bind_texture(constants::TEXTURE_2D, Some(handle));
        let options = &self.options;
        for (pname, value) in [
            (constants::TEXTURE_WRAP_S, options.wrap_s),
            (constants::TEXTURE_WRAP_T, options.wrap_t),
            (constants::TEXTURE_MIN_FILTER, options.min_filter),
            (constants::TEXTURE_MAG_FILTER, options.mag_filter),
        ] {
            gl.tex_parameter_i(constants::TEXTURE_2D, pname, value as i32);
        }
    }
}

/// Non-power-of-two sources need resizing only on WebGL 1, and only for
/// wrap or filter modes WebGL 1 forbids at those sizes.
pub fn needs_power_of_two(options: &TextureOptions, source: &PixelSource, webgl2: bool) -> bool {
    !webgl2 && !source.is_power_of_two() && options.requires_power_of_two()
}
