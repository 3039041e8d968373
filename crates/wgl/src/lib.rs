//! Typed resource layer over a WebGL-style graphics context.
//!
//! Everything funnels through a [`GlContext`], which owns the backend plus the
//! per-context caches (bound state, resolved uniform setters, capabilities):
//!
//! ```text
//!   create_program ──▶ Program { UniformMap, AttributeTable }
//!          │                 │                 │
//!          │                 ▼                 ▼
//!          │         Uniform::set/update   buffer_data / attrib pointer
//!          ▼                 │                 │
//!      GlContext ◀───────────┴─────────────────┘
//!     (StateCache, SetterCache, Capabilities) ──▶ impl Gl
//! ```
//!
//! [`HeadlessGl`] is a software implementation of [`Gl`] that records calls and
//! rasterises triangles through registered [`ShaderKernel`]s, so programs,
//! textures and framebuffers can be exercised without a browser.

pub mod attributes;
pub mod capabilities;
pub mod context;
pub mod error;
pub mod framebuffer;
pub mod gl;
pub mod headless;
pub mod image;
pub mod math;
pub mod program;
pub mod state;
pub mod texture;
pub mod uniforms;

pub use crate::attributes::{AttribPointer, AttributeTable, ProgramAttribute};
pub use crate::capabilities::{Capabilities, Limits};
pub use crate::context::{Diagnostic, GlContext};
pub use crate::error::{LoadError, ShaderKind, UniformError, WglError};
pub use crate::framebuffer::FrameBuffer;
pub use crate::gl::{constants, BufferSource, Gl, ProgramId, TextureId};
pub use crate::headless::{HeadlessConfig, HeadlessGl, ShaderKernel};
pub use crate::image::{FileImageLoader, ImageLoader, MemoryImageLoader, PixelSource};
pub use crate::program::{create_program, Program};
pub use crate::state::{StateCache, StateChange};
pub use crate::texture::{Texture2D, TextureOptions};
pub use crate::uniforms::{Uniform, UniformInput, UniformMap, UniformType, UniformValue};
