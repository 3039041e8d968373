//! Image targets rendered through the wave effect.
//!
//! ```text
//!   ImageScene ── GlContext (shared) ──▶ RenderTarget::render_target
//!        │                                   │ bind textures, FBO, viewport
//!        │                                   │ clear + one triangle
//!        ▼                                   ▼
//!   FrameScheduler tick              PresentSurface (RGBA, opacity)
//! ```

mod effect;
mod noise;
mod scene;
mod target;

pub use effect::{install_kernels, WaveKernel, FRAGMENT_SHADER, VERTEX_SHADER};
pub use noise::{noise_source, NOISE_SIZE};
pub use scene::ImageScene;
pub use target::{
    NoiseSource, PresentSurface, RenderTarget, TargetState, WaveSettings, CONTENT_UNIT,
    NOISE_UNIT,
};
