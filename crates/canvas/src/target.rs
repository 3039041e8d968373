use std::time::{Duration, Instant};

use image::RgbaImage;
use scheduler::{Clock, Easing, Tween};
use wgl::attributes::AttribPointer;
use wgl::{
    constants, create_program, math, FrameBuffer, Gl, GlContext, ImageLoader, LoadError, Program,
    Texture2D, TextureOptions, UniformInput,
};

use crate::effect::{FRAGMENT_SHADER, VERTEX_SHADER};
use crate::noise::{noise_source, NOISE_SIZE};

pub const CONTENT_UNIT: u32 = 0;
pub const NOISE_UNIT: u32 = 1;

const POSITIONS: [f32; 6] = [-1.0, -1.0, 3.0, -1.0, -1.0, 3.0];
const UVS: [f32; 6] = [0.0, 0.0, 2.0, 0.0, 0.0, 2.0];

const WAVE_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoiseSource {
    Asset(String),
    Generated { seed: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveSettings {
    pub intensity: f32,
    pub scale: f32,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            scale: 1.0,
        }
    }
}

/// The 2D surface a target's pixels are copied into for compositing.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentSurface {
    image: RgbaImage,
    opacity: f32,
}

impl PresentSurface {
    fn new() -> Self {
        Self {
            image: RgbaImage::new(0, 0),
            opacity: 0.0,
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.image = RgbaImage::new(width, height);
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }
}

#[derive(Debug)]
struct Wave {
    intensity: Tween,
    scale: Tween,
}

#[derive(Debug)]
pub struct RenderTarget {
    program: Program,
    content: Texture2D,
    noise: Texture2D,
    framebuffer: FrameBuffer,
    surface: PresentSurface,
    clock: Clock,
    width: u32,
    height: u32,
    active: bool,
    loaded: bool,
    source_size: Option<(u32, u32)>,
    wave: WaveSettings,
    tweens: Option<Wave>,
    time: f32,
}

impl RenderTarget {
    /// Compiles the effect program and uploads the triangle. A program that
    /// fails to link is logged and leaves the target [`TargetState::Uninitialized`].
    pub fn new<G: Gl>(ctx: &mut GlContext<G>) -> Self {
        let program = match create_program(ctx, VERTEX_SHADER, FRAGMENT_SHADER) {
            Ok(program) => program,
            Err(err) => {
                tracing::error!(error = %err, "wave program unavailable");
                Program::detached()
            }
        };
        let content = Texture2D::new(
            ctx,
            CONTENT_UNIT,
            TextureOptions::default().with_flip_y(false),
        );
        let noise = Texture2D::new(
            ctx,
            NOISE_UNIT,
            TextureOptions::default().with_wrap(constants::REPEAT, constants::REPEAT),
        );
        let framebuffer = FrameBuffer::new(ctx, 0, 0);
        let mut target = Self {
            program,
            content,
            noise,
            framebuffer,
            surface: PresentSurface::new(),
            clock: Clock::default(),
            width: 0,
            height: 0,
            active: false,
            loaded: false,
            source_size: None,
            wave: WaveSettings::default(),
            tweens: None,
            time: 0.0,
        };
        target.init_attributes(ctx);
        target
    }

    pub fn state(&self) -> TargetState {
        if !self.program.is_usable() {
            TargetState::Uninitialized
        } else if self.loaded {
            TargetState::Ready
        } else {
            TargetState::Loading
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn surface(&self) -> &PresentSurface {
        &self.surface
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn wave(&self) -> WaveSettings {
        self.wave
    }

    pub fn set_wave(&mut self, wave: WaveSettings) {
        self.wave = wave;
    }

    /// Loads the image and noise textures. The target becomes ready only
    /// when both succeed.
    pub async fn load_image<G, L>(
        &mut self,
        ctx: &mut GlContext<G>,
        loader: &L,
        src: &str,
        noise: &NoiseSource,
    ) -> Result<(), LoadError>
    where
        G: Gl,
        L: ImageLoader + ?Sized,
    {
        self.content.load(ctx, loader, src).await?;
        match noise {
            NoiseSource::Asset(locator) => self.noise.load(ctx, loader, locator).await?,
            NoiseSource::Generated { seed } => {
                self.noise
                    .set_source(ctx, noise_source(*seed, NOISE_SIZE, NOISE_SIZE));
            }
        }
        self.set_uniform(ctx, "u_tImage", CONTENT_UNIT as i32);
        self.set_uniform(ctx, "u_tNoise", NOISE_UNIT as i32);
        self.source_size = Some((self.content.width(), self.content.height()));
        self.loaded = true;
        tracing::debug!(src, width = self.content.width(), height = self.content.height(), "target ready");
        self.update_cover(ctx);
        Ok(())
    }

    /// Resizes the target. Unchanged dimensions are ignored so the
    /// framebuffer storage is not reallocated.
    pub fn set_size<G: Gl>(&mut self, ctx: &mut GlContext<G>, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.framebuffer.set_size(width, height);
        self.surface.resize(width, height);
        self.update_cover(ctx);
        true
    }

    /// Starts the wave animation: intensity eases in while the noise scale
    /// settles back to its resting value.
    pub fn make_wave(&mut self, now: Instant) {
        let mut intensity = Tween::new(0.01, self.wave.intensity, WAVE_DURATION)
            .with_easing(Easing::QuinticInOut);
        let mut scale = Tween::new(self.wave.scale * 2.5, self.wave.scale, WAVE_DURATION);
        intensity.start(now);
        scale.start(now);
        self.tweens = Some(Wave { intensity, scale });
    }

    pub fn is_waving(&self) -> bool {
        self.tweens.is_some()
    }

    /// Renders one frame into the presentation surface. Returns `true` when
    /// GPU work was issued.
    pub fn render_target<G: Gl>(&mut self, ctx: &mut GlContext<G>, now: Instant) -> bool {
        self.surface.opacity = if self.active { 1.0 } else { 0.0 };
        if !self.program.is_usable() || ctx.is_lost() {
            return false;
        }
        let (intensity, scale) = self.advance(now);
        if !(self.active && self.loaded) || self.width == 0 || self.height == 0 {
            return false;
        }

        self.program.use_program(ctx);
        self.set_uniform(ctx, "u_time", self.time);
        self.set_uniform(ctx, "u_waveIntensity", intensity);
        self.set_uniform(ctx, "u_waveScale", scale);

        self.content.bind(ctx);
        self.noise.bind(ctx);
        self.bind_geometry(ctx);
        self.framebuffer.bind(ctx);
        ctx.set_viewport(0, 0, self.width as i32, self.height as i32);
        ctx.set_clear_color(0.0, 0.0, 0.0, 0.0);
        let gl = ctx.gl_mut();
        gl.clear(constants::COLOR_BUFFER_BIT);
        gl.draw_arrays(constants::TRIANGLES, 0, 3);
        gl.read_pixels(0, 0, self.width, self.height, &mut *self.surface.image);
        self.framebuffer.unbind(ctx);
        true
    }

    fn init_attributes<G: Gl>(&mut self, ctx: &mut GlContext<G>) {
        for (name, data) in [("position", &POSITIONS), ("uv", &UVS)] {
            let Some(attribute) = self.program.attribute(name) else {
                continue;
            };
            attribute.buffer_data(ctx, &data[..], constants::ARRAY_BUFFER);
            attribute.set_attrib_pointer(ctx, AttribPointer::new(2));
            attribute.enable_attribute_array(ctx);
        }
    }

    // Attribute pointers are context-wide state.
    fn bind_geometry<G: Gl>(&self, ctx: &mut GlContext<G>) {
        for name in ["position", "uv"] {
            if let Some(attribute) = self.program.attributes.get(name) {
                attribute.set_attrib_pointer(ctx, AttribPointer::new(2));
                attribute.enable_attribute_array(ctx);
            }
        }
    }

    fn advance(&mut self, now: Instant) -> (f32, f32) {
        self.time += self.clock.delta(now);
        match self.tweens.as_mut() {
            Some(wave) => {
                let (intensity, intensity_done) = wave.intensity.sample(now);
                let (scale, scale_done) = wave.scale.sample(now);
                if intensity_done && scale_done {
                    self.tweens = None;
                }
                (intensity, scale)
            }
            None => (self.wave.intensity, self.wave.scale),
        }
    }

    fn update_cover<G: Gl>(&mut self, ctx: &mut GlContext<G>) {
        let Some((source_width, source_height)) = self.source_size else {
            return;
        };
        if self.width == 0 || self.height == 0 || source_width == 0 || source_height == 0 {
            return;
        }
        let (width, height) = (self.width as f32, self.height as f32);
        let scale = math::size_to_cover(
            source_width as f32 / width,
            source_height as f32 / height,
            1.0,
            1.0,
        );
        let ratio_max = width.max(height);
        self.set_uniform(ctx, "u_scale", scale);
        self.set_uniform(ctx, "u_offset", [0.0f32, 0.0]);
        self.set_uniform(ctx, "u_origin", [0.5f32, 0.5]);
        self.set_uniform(ctx, "u_ratio", [width / ratio_max, height / ratio_max]);
    }

    fn set_uniform<'a, G: Gl>(
        &mut self,
        ctx: &mut GlContext<G>,
        name: &str,
        value: impl Into<UniformInput<'a>>,
    ) {
        if let Err(err) = self.program.uniform(name).set(ctx, value) {
            tracing::warn!(name, error = %err, "uniform write rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgl::{HeadlessConfig, HeadlessGl, MemoryImageLoader, PixelSource, UniformValue};

    use crate::effect::install_kernels;

    fn context() -> GlContext<HeadlessGl> {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        install_kernels(&mut gl);
        GlContext::new(gl)
    }

    fn loader() -> MemoryImageLoader {
        MemoryImageLoader::new()
            .with("red", PixelSource::solid(2, 2, [255, 0, 0, 255]))
            .with("gray", PixelSource::solid(2, 2, [128, 128, 128, 255]))
            .with("wide", PixelSource::solid(4, 2, [0, 0, 255, 255]))
    }

    fn load(target: &mut RenderTarget, ctx: &mut GlContext<HeadlessGl>, src: &str) {
        let noise = NoiseSource::Asset("gray".into());
        pollster::block_on(target.load_image(ctx, &loader(), src, &noise)).unwrap();
    }

    fn floats(target: &RenderTarget, name: &str) -> Vec<f32> {
        match target.program().uniforms.peek(name).map(|u| u.value()) {
            Some(UniformValue::Floats(values)) => values.clone(),
            other => panic!("unexpected value for {name}: {other:?}"),
        }
    }

    #[test]
    fn renders_solid_red_through_the_cover_fit() {
        let mut ctx = context();
        let mut target = RenderTarget::new(&mut ctx);
        assert_eq!(target.state(), TargetState::Loading);
        load(&mut target, &mut ctx, "red");
        assert_eq!(target.state(), TargetState::Ready);
        target.set_size(&mut ctx, 4, 4);
        target.set_active(true);

        assert!(target.render_target(&mut ctx, Instant::now()));
        assert_eq!(floats(&target, "u_scale"), vec![1.0, 1.0]);
        assert_eq!(floats(&target, "u_offset"), vec![0.0, 0.0]);
        let surface = target.surface();
        assert_eq!((surface.width(), surface.height()), (4, 4));
        assert_eq!(surface.opacity(), 1.0);
        for px in surface.pixels().chunks_exact(4) {
            assert!(px[0] >= 250, "{px:?}");
            assert!(px[1] <= 5 && px[2] <= 5, "{px:?}");
            assert_eq!(px[3], 255);
        }
        assert_eq!(ctx.gl().calls().count("drawArrays"), 1);
        assert!(ctx.gl().errors().is_empty(), "{:?}", ctx.gl().errors());
    }

    #[test]
    fn inactive_or_unloaded_targets_do_no_gpu_work() {
        let mut ctx = context();
        let mut target = RenderTarget::new(&mut ctx);
        target.set_size(&mut ctx, 4, 4);
        target.set_active(true);
        assert!(!target.render_target(&mut ctx, Instant::now()));

        load(&mut target, &mut ctx, "red");
        target.set_active(false);
        ctx.gl_mut().reset_calls();
        let start = Instant::now();
        for frame in 0..5 {
            assert!(!target.render_target(&mut ctx, start + Duration::from_millis(16 * frame)));
        }
        assert_eq!(target.surface().opacity(), 0.0);
        assert_eq!(ctx.gl().calls().total(), 0);
    }

    #[test]
    fn unchanged_size_keeps_the_framebuffer_storage() {
        let mut ctx = context();
        let mut target = RenderTarget::new(&mut ctx);
        load(&mut target, &mut ctx, "red");
        target.set_active(true);
        assert!(target.set_size(&mut ctx, 4, 4));
        assert!(!target.set_size(&mut ctx, 4, 4));
        let now = Instant::now();
        target.render_target(&mut ctx, now);
        let uploads = ctx.gl().calls().count("texImage2D");
        target.render_target(&mut ctx, now + Duration::from_millis(16));
        assert_eq!(ctx.gl().calls().count("texImage2D"), uploads);
        assert_eq!(ctx.gl().calls().count("viewport"), 1);
    }

    #[test]
    fn wide_source_overflows_horizontally() {
        let mut ctx = context();
        let mut target = RenderTarget::new(&mut ctx);
        load(&mut target, &mut ctx, "wide");
        target.set_size(&mut ctx, 4, 4);
        assert_eq!(floats(&target, "u_scale"), vec![2.0, 1.0]);
        assert_eq!(floats(&target, "u_ratio"), vec![1.0, 1.0]);
    }

    #[test]
    fn failed_load_never_becomes_ready() {
        let mut ctx = context();
        let mut target = RenderTarget::new(&mut ctx);
        let noise = NoiseSource::Generated { seed: 1 };
        let err = pollster::block_on(target.load_image(&mut ctx, &loader(), "missing", &noise))
            .unwrap_err();
        assert_eq!(err.locator(), "missing");
        assert_eq!(target.state(), TargetState::Loading);
    }

    #[test]
    fn wave_tweens_settle_back_to_rest() {
        let mut ctx = context();
        let mut target = RenderTarget::new(&mut ctx);
        load(&mut target, &mut ctx, "red");
        target.set_size(&mut ctx, 4, 4);
        target.set_active(true);
        let start = Instant::now();
        target.make_wave(start);
        target.render_target(&mut ctx, start + Duration::from_millis(500));
        assert!(target.is_waving());
        target.render_target(&mut ctx, start + Duration::from_secs(2));
        assert!(!target.is_waving());
        let scale = target.program().uniforms.peek("u_waveScale").map(|u| u.value().clone());
        assert_eq!(scale, Some(UniformValue::Float(1.0)));
    }

    #[test]
    fn empty_source_leaves_the_cover_fit_alone() {
        let mut ctx = context();
        let mut target = RenderTarget::new(&mut ctx);
        load(&mut target, &mut ctx, "red");
        target.source_size = Some((0, 2));
        target.set_size(&mut ctx, 4, 4);
        assert!(floats(&target, "u_scale").iter().all(|v| v.is_finite()));
        assert!(floats(&target, "u_ratio").iter().all(|v| v.is_finite()));
    }

    #[test]
    fn lost_context_target_is_uninitialized() {
        let mut ctx = context();
        ctx.gl_mut().lose_context();
        let mut target = RenderTarget::new(&mut ctx);
        assert_eq!(target.state(), TargetState::Uninitialized);
        target.set_active(true);
        assert!(!target.render_target(&mut ctx, Instant::now()));
    }
}
