//! The immediate-mode graphics API the toolkit drives.
//!
//! `Gl` mirrors the subset of `WebGLRenderingContext` that the resource and
//! uniform layer needs. Object handles are plain integer newtypes so that a
//! backend can map them onto whatever its platform hands out; creation calls
//! return `None` when the context is lost.

use std::fmt;

/// GL enum values used across the toolkit (WebGL 1 / OpenGL ES 2.0 numbering).
pub mod constants {
    pub const COLOR_BUFFER_BIT: u32 = 0x0000_4000;

    pub const TRIANGLES: u32 = 0x0004;

    pub const ARRAY_BUFFER: u32 = 0x8892;
    pub const ELEMENT_ARRAY_BUFFER: u32 = 0x8893;
    pub const STATIC_DRAW: u32 = 0x88E4;

    pub const BYTE: u32 = 0x1400;
    pub const UNSIGNED_BYTE: u32 = 0x1401;
    pub const SHORT: u32 = 0x1402;
    pub const UNSIGNED_SHORT: u32 = 0x1403;
    pub const INT: u32 = 0x1404;
    pub const UNSIGNED_INT: u32 = 0x1405;
    pub const FLOAT: u32 = 0x1406;

    pub const FLOAT_VEC2: u32 = 0x8B50;
    pub const FLOAT_VEC3: u32 = 0x8B51;
    pub const FLOAT_VEC4: u32 = 0x8B52;
    pub const INT_VEC2: u32 = 0x8B53;
    pub const INT_VEC3: u32 = 0x8B54;
    pub const INT_VEC4: u32 = 0x8B55;
    pub const BOOL: u32 = 0x8B56;
    pub const BOOL_VEC2: u32 = 0x8B57;
    pub const BOOL_VEC3: u32 = 0x8B58;
    pub const BOOL_VEC4: u32 = 0x8B59;
    pub const FLOAT_MAT2: u32 = 0x8B5A;
    pub const FLOAT_MAT3: u32 = 0x8B5B;
    pub const FLOAT_MAT4: u32 = 0x8B5C;
    pub const SAMPLER_2D: u32 = 0x8B5E;
    pub const SAMPLER_CUBE: u32 = 0x8B60;

    pub const VERTEX_SHADER: u32 = 0x8B31;
    pub const FRAGMENT_SHADER: u32 = 0x8B30;

    pub const TEXTURE_2D: u32 = 0x0DE1;
    pub const TEXTURE0: u32 = 0x84C0;
    pub const TEXTURE_MAG_FILTER: u32 = 0x2800;
    pub const TEXTURE_MIN_FILTER: u32 = 0x2801;
    pub const TEXTURE_WRAP_S: u32 = 0x2802;
    pub const TEXTURE_WRAP_T: u32 = 0x2803;
    pub const NEAREST: u32 = 0x2600;
    pub const LINEAR: u32 = 0x2601;
    pub const NEAREST_MIPMAP_NEAREST: u32 = 0x2700;
    pub const LINEAR_MIPMAP_NEAREST: u32 = 0x2701;
    pub const NEAREST_MIPMAP_LINEAR: u32 = 0x2702;
    pub const LINEAR_MIPMAP_LINEAR: u32 = 0x2703;
    pub const REPEAT: u32 = 0x2901;
    pub const CLAMP_TO_EDGE: u32 = 0x812F;
    pub const MIRRORED_REPEAT: u32 = 0x8370;
    pub const RGBA: u32 = 0x1908;
    pub const UNPACK_FLIP_Y_WEBGL: u32 = 0x9240;

    pub const FRAMEBUFFER: u32 = 0x8D40;
    pub const COLOR_ATTACHMENT0: u32 = 0x8CE0;

    pub const MAX_TEXTURE_SIZE: u32 = 0x0D33;
    pub const MAX_TEXTURE_IMAGE_UNITS: u32 = 0x8872;
    pub const MAX_COMBINED_TEXTURE_IMAGE_UNITS: u32 = 0x8B4D;
    pub const MAX_VERTEX_ATTRIBS: u32 = 0x8869;
    pub const MAX_TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FF;
}

macro_rules! gl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

gl_handle!(
    /// Linked (or linkable) shader program.
    ProgramId
);
gl_handle!(
    /// Single vertex or fragment shader object.
    ShaderId
);
gl_handle!(
    /// Vertex data buffer.
    BufferId
);
gl_handle!(
    /// 2D texture object.
    TextureId
);
gl_handle!(
    /// Off-screen framebuffer object.
    FramebufferId
);
gl_handle!(
    /// Location of an active uniform inside a linked program.
    UniformLocation
);

/// Reflection record reported for an active uniform or attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInfo {
    pub name: String,
    /// Declared array length (1 for non-arrays).
    pub size: i32,
    /// GL type enum (`FLOAT_VEC2`, `SAMPLER_2D`, ...).
    pub gl_type: u32,
}

/// Typed vertex data handed to `bufferData`.
///
/// The variant doubles as the element type inference the attribute wrapper
/// relies on when it later configures the vertex pointer.
#[derive(Debug, Clone, Copy)]
pub enum BufferSource<'a> {
    F32(&'a [f32]),
    U32(&'a [u32]),
    I32(&'a [i32]),
    U16(&'a [u16]),
    I16(&'a [i16]),
    U8(&'a [u8]),
    I8(&'a [i8]),
}

impl<'a> BufferSource<'a> {
    /// GL scalar type matching the concrete slice representation.
    pub fn gl_type(&self) -> u32 {
        match self {
            BufferSource::F32(_) => constants::FLOAT,
            BufferSource::U32(_) => constants::UNSIGNED_INT,
            BufferSource::I32(_) => constants::INT,
            BufferSource::U16(_) => constants::UNSIGNED_SHORT,
            BufferSource::I16(_) => constants::SHORT,
            BufferSource::U8(_) => constants::UNSIGNED_BYTE,
            BufferSource::I8(_) => constants::BYTE,
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            BufferSource::F32(data) => bytemuck::cast_slice(data),
            BufferSource::U32(data) => bytemuck::cast_slice(data),
            BufferSource::I32(data) => bytemuck::cast_slice(data),
            BufferSource::U16(data) => bytemuck::cast_slice(data),
            BufferSource::I16(data) => bytemuck::cast_slice(data),
            BufferSource::U8(data) => data,
            BufferSource::I8(data) => bytemuck::cast_slice(data),
        }
    }

    /// Number of scalar elements (not bytes).
    pub fn len(&self) -> usize {
        match self {
            BufferSource::F32(data) => data.len(),
            BufferSource::U32(data) => data.len(),
            BufferSource::I32(data) => data.len(),
            BufferSource::U16(data) => data.len(),
            BufferSource::I16(data) => data.len(),
            BufferSource::U8(data) => data.len(),
            BufferSource::I8(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a [f32]> for BufferSource<'a> {
    fn from(value: &'a [f32]) -> Self {
        BufferSource::F32(value)
    }
}

impl<'a> From<&'a [u16]> for BufferSource<'a> {
    fn from(value: &'a [u16]) -> Self {
        BufferSource::U16(value)
    }
}

impl<'a> From<&'a [u32]> for BufferSource<'a> {
    fn from(value: &'a [u32]) -> Self {
        BufferSource::U32(value)
    }
}

impl<'a> From<&'a [i32]> for BufferSource<'a> {
    fn from(value: &'a [i32]) -> Self {
        BufferSource::I32(value)
    }
}

impl<'a> From<&'a [i16]> for BufferSource<'a> {
    fn from(value: &'a [i16]) -> Self {
        BufferSource::I16(value)
    }
}

impl<'a> From<&'a [u8]> for BufferSource<'a> {
    fn from(value: &'a [u8]) -> Self {
        BufferSource::U8(value)
    }
}

impl<'a> From<&'a [i8]> for BufferSource<'a> {
    fn from(value: &'a [i8]) -> Self {
        BufferSource::I8(value)
    }
}

/// Size in bytes of one scalar of the given GL type.
pub fn type_size(gl_type: u32) -> usize {
    match gl_type {
        constants::BYTE | constants::UNSIGNED_BYTE => 1,
        constants::SHORT | constants::UNSIGNED_SHORT => 2,
        _ => 4,
    }
}

/// Immediate-mode graphics backend.
///
/// Every method is expected to be a silent no-op (returning a default) while
/// the context is lost; callers never branch on loss per call.
pub trait Gl {
    fn is_context_lost(&self) -> bool;
    fn is_webgl2(&self) -> bool;
    fn get_parameter_i32(&self, pname: u32) -> i32;
    fn supported_extensions(&self) -> Vec<String>;

    fn create_shader(&mut self, kind: u32) -> Option<ShaderId>;
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    fn compile_shader(&mut self, shader: ShaderId);
    fn shader_compile_status(&self, shader: ShaderId) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> Option<ProgramId>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn link_program(&mut self, program: ProgramId);
    fn program_link_status(&self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>);

    fn active_uniform_count(&self, program: ProgramId) -> u32;
    fn active_uniform(&self, program: ProgramId, index: u32) -> Option<ActiveInfo>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn active_attribute_count(&self, program: ProgramId) -> u32;
    fn active_attribute(&self, program: ProgramId, index: u32) -> Option<ActiveInfo>;
    /// Returns -1 when the attribute is not active.
    fn attrib_location(&self, program: ProgramId, name: &str) -> i32;

    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    fn uniform_1f(&mut self, location: UniformLocation, value: f32);
    /// `uniform{components}iv`.
    fn uniform_iv(&mut self, location: UniformLocation, components: usize, values: &[i32]);
    /// `uniform{components}fv`.
    fn uniform_fv(&mut self, location: UniformLocation, components: usize, values: &[f32]);
    /// `uniformMatrix{dimension}fv`.
    fn uniform_matrix_fv(
        &mut self,
        location: UniformLocation,
        dimension: usize,
        transpose: bool,
        values: &[f32],
    );

    fn create_buffer(&mut self) -> Option<BufferId>;
    fn bind_buffer(&mut self, target: u32, buffer: Option<BufferId>);
    fn buffer_data(&mut self, target: u32, data: BufferSource<'_>, usage: u32);
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn enable_vertex_attrib_array(&mut self, index: u32);

    fn create_texture(&mut self) -> Option<TextureId>;
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: u32, texture: Option<TextureId>);
    fn tex_parameter_i(&mut self, target: u32, pname: u32, param: i32);
    fn pixel_store_i(&mut self, pname: u32, param: i32);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: u32,
        height: u32,
        format: u32,
        data_type: u32,
        pixels: Option<&[u8]>,
    );
    fn generate_mipmap(&mut self, target: u32);

    fn create_framebuffer(&mut self) -> Option<FramebufferId>;
    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<FramebufferId>);
    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<TextureId>,
        level: i32,
    );

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&mut self, mask: u32);
    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32);
    /// Reads RGBA8 pixels, rows bottom-up, into `out`.
    fn read_pixels(&mut self, x: i32, y: i32, width: u32, height: u32, out: &mut [u8]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_source_infers_gl_type() {
        let floats = [0.0f32, 1.0];
        let shorts = [1u16, 2, 3];
        assert_eq!(BufferSource::from(&floats[..]).gl_type(), constants::FLOAT);
        assert_eq!(
            BufferSource::from(&shorts[..]).gl_type(),
            constants::UNSIGNED_SHORT
        );
        assert_eq!(BufferSource::I8(&[1, 2]).gl_type(), constants::BYTE);
    }

    #[test]
    fn buffer_source_exposes_raw_bytes() {
        let floats = [1.0f32, 2.0, 3.0];
        let source = BufferSource::F32(&floats);
        assert_eq!(source.len(), 3);
        assert_eq!(source.as_bytes().len(), 12);
        assert_eq!(type_size(source.gl_type()), 4);
    }
}
