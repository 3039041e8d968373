//! Software implementation of [`Gl`].
//!
//! `HeadlessGl` keeps every object the API can create in plain maps, counts
//! each call that reaches it and can simulate context loss. It reflects
//! uniforms and attributes from GLSL declarations (dropping uniforms the
//! shader bodies never reference, as drivers do) and rasterises triangles
//! through [`ShaderKernel`]s registered per fragment source.

mod glsl;
mod raster;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::gl::{
    constants, ActiveInfo, BufferId, BufferSource, FramebufferId, Gl, ProgramId, ShaderId,
    TextureId, UniformLocation,
};

pub use raster::{FragmentInput, ShaderKernel, VertexInput, VertexOutput};

use raster::{RasterTarget, ShadingEnv};

const TEXTURE_UNITS: usize = 16;

#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub webgl2: bool,
    pub max_texture_size: u32,
    /// Extension names as the browser reports them.
    pub extensions: Vec<String>,
    /// Size of the default drawing buffer.
    pub surface_size: (u32, u32),
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            webgl2: true,
            max_texture_size: 4096,
            extensions: vec![
                "EXT_texture_filter_anisotropic".to_string(),
                "OES_texture_float".to_string(),
                "WEBGL_lose_context".to_string(),
            ],
            surface_size: (300, 150),
        }
    }
}

/// Per-entry-point call counters.
#[derive(Debug, Default, Clone)]
pub struct CallLog {
    counts: BTreeMap<&'static str, usize>,
    total: usize,
}

impl CallLog {
    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Sum of every `uniform*` entry point.
    pub fn uniform_uploads(&self) -> usize {
        self.counts
            .iter()
            .filter(|(name, _)| name.starts_with("uniform"))
            .map(|(_, count)| count)
            .sum()
    }

    fn record(&mut self, name: &'static str) {
        *self.counts.entry(name).or_default() += 1;
        self.total += 1;
    }
}

/// Value stored GPU-side for a uniform location.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredUniform {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
}

#[derive(Debug)]
struct ShaderObject {
    kind: u32,
    source: String,
    compiled: bool,
    info_log: String,
}

#[derive(Default)]
struct ProgramObject {
    shaders: Vec<ShaderId>,
    linked: bool,
    info_log: String,
    uniforms: Vec<ActiveInfo>,
    uniform_locations: Vec<(String, UniformLocation)>,
    attributes: Vec<ActiveInfo>,
    kernel: Option<Rc<dyn ShaderKernel>>,
}

#[derive(Debug, Clone)]
pub(crate) struct TextureObject {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub wrap_s: u32,
    pub wrap_t: u32,
    pub min_filter: u32,
    pub mag_filter: u32,
    pub mipmapped: bool,
}

impl Default for TextureObject {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            wrap_s: constants::REPEAT,
            wrap_t: constants::REPEAT,
            min_filter: constants::NEAREST_MIPMAP_LINEAR,
            mag_filter: constants::LINEAR,
            mipmapped: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AttribPointer {
    buffer: Option<BufferId>,
    size: i32,
    data_type: u32,
    normalized: bool,
    stride: i32,
    offset: i32,
}

pub struct HeadlessGl {
    config: HeadlessConfig,
    lost: bool,
    calls: CallLog,
    errors: Vec<String>,
    next_id: u32,

    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,
    buffers: HashMap<BufferId, Vec<u8>>,
    textures: HashMap<TextureId, TextureObject>,
    framebuffers: HashMap<FramebufferId, Option<TextureId>>,
    uniform_values: HashMap<UniformLocation, StoredUniform>,
    uniform_owner: HashMap<UniformLocation, ProgramId>,
    kernels: HashMap<String, Rc<dyn ShaderKernel>>,

    current_program: Option<ProgramId>,
    array_buffer: Option<BufferId>,
    element_buffer: Option<BufferId>,
    attrib_pointers: HashMap<u32, AttribPointer>,
    enabled_attribs: HashSet<u32>,
    active_unit: usize,
    units: Vec<Option<TextureId>>,
    framebuffer: Option<FramebufferId>,
    flip_y: bool,
    viewport: [i32; 4],
    clear_color: [f32; 4],
    surface: Vec<u8>,
    surface_size: (u32, u32),
}

impl HeadlessGl {
    pub fn new(config: HeadlessConfig) -> Self {
        let surface_size = config.surface_size;
        Self {
            config,
            lost: false,
            calls: CallLog::default(),
            errors: Vec::new(),
            next_id: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            uniform_values: HashMap::new(),
            uniform_owner: HashMap::new(),
            kernels: HashMap::new(),
            current_program: None,
            array_buffer: None,
            element_buffer: None,
            attrib_pointers: HashMap::new(),
            enabled_attribs: HashSet::new(),
            active_unit: 0,
            units: vec![None; TEXTURE_UNITS],
            framebuffer: None,
            flip_y: false,
            viewport: [0, 0, surface_size.0 as i32, surface_size.1 as i32],
            clear_color: [0.0; 4],
            surface: vec![0; (surface_size.0 * surface_size.1 * 4) as usize],
            surface_size,
        }
    }

    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    pub fn reset_calls(&mut self) {
        self.calls = CallLog::default();
    }

    /// GL errors raised so far (`INVALID_OPERATION` and friends), oldest first.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Simulates `WEBGL_lose_context.loseContext()`.
    pub fn lose_context(&mut self) {
        tracing::debug!("headless context lost");
        self.lost = true;
    }

    /// Simulates a restore. Every object from before the loss is gone.
    pub fn restore_context(&mut self) {
        let fresh = Self::new(self.config.clone());
        let kernels = std::mem::take(&mut self.kernels);
        let calls = std::mem::take(&mut self.calls);
        *self = fresh;
        self.kernels = kernels;
        self.calls = calls;
        tracing::debug!("headless context restored");
    }

    /// Registers the CPU kernel that runs for programs linked with this
    /// fragment shader source.
    pub fn register_kernel(&mut self, fragment_source: &str, kernel: Rc<dyn ShaderKernel>) {
        self.kernels.insert(fragment_source.trim().to_string(), kernel);
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface_size = (width, height);
        self.surface = vec![0; (width * height * 4) as usize];
    }

    /// Default drawing buffer, RGBA8 rows bottom-up.
    pub fn surface_pixels(&self) -> &[u8] {
        &self.surface
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    /// Current contents of a texture: `(width, height, rgba bytes)`.
    pub fn texture_data(&self, texture: TextureId) -> Option<(u32, u32, &[u8])> {
        self.textures
            .get(&texture)
            .map(|object| (object.width, object.height, object.pixels.as_slice()))
    }

    /// `(wrap_s, wrap_t, min_filter, mag_filter)` of a texture.
    pub fn texture_parameters(&self, texture: TextureId) -> Option<(u32, u32, u32, u32)> {
        self.textures.get(&texture).map(|object| {
            (
                object.wrap_s,
                object.wrap_t,
                object.min_filter,
                object.mag_filter,
            )
        })
    }

    pub fn texture_is_mipmapped(&self, texture: TextureId) -> bool {
        self.textures
            .get(&texture)
            .map(|object| object.mipmapped)
            .unwrap_or(false)
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Value last uploaded to a program's uniform, looked up by reported name.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<&StoredUniform> {
        let object = self.programs.get(&program)?;
        let (_, location) = object
            .uniform_locations
            .iter()
            .find(|(uniform, _)| uniform == name)?;
        self.uniform_values.get(location)
    }

    pub fn bound_texture(&self, unit: usize) -> Option<TextureId> {
        self.units.get(unit).copied().flatten()
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    fn next_handle(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn error(&mut self, message: String) {
        tracing::debug!(%message, "headless gl error");
        self.errors.push(message);
    }

    fn active(&mut self, name: &'static str) -> bool {
        if self.lost {
            return false;
        }
        self.calls.record(name);
        true
    }

    fn bound_texture_mut(&mut self) -> Option<&mut TextureObject> {
        let id = self.units.get(self.active_unit).copied().flatten()?;
        self.textures.get_mut(&id)
    }

    fn link(&mut self, program: ProgramId) -> Result<(), String> {
        let Some(object) = self.programs.get(&program) else {
            return Err("invalid program".to_string());
        };
        let mut vertex = None;
        let mut fragment = None;
        for id in &object.shaders {
            if let Some(shader) = self.shaders.get(id) {
                match shader.kind {
                    constants::VERTEX_SHADER => vertex = Some(shader),
                    _ => fragment = Some(shader),
                }
            }
        }
        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            return Err("program requires a vertex and a fragment shader".to_string());
        };
        if !vertex.compiled || !fragment.compiled {
            return Err("attached shaders are not compiled".to_string());
        }

        let vertex_decls = glsl::parse(&vertex.source, constants::VERTEX_SHADER);
        let fragment_decls = glsl::parse(&fragment.source, constants::FRAGMENT_SHADER);
        let kernel = self.kernels.get(fragment.source.trim()).cloned();

        let mut referenced = vertex_decls.referenced.clone();
        referenced.extend(fragment_decls.referenced.iter().cloned());
        let mut structs = vertex_decls.structs.clone();
        structs.extend(fragment_decls.structs.clone());

        let mut seen = HashSet::new();
        let mut uniforms = Vec::new();
        for decl in vertex_decls
            .uniforms
            .iter()
            .chain(fragment_decls.uniforms.iter())
        {
            if !seen.insert(decl.name.clone()) || !referenced.contains(&decl.name) {
                continue;
            }
            expand_uniform(decl, &structs, &mut uniforms);
        }

        let attributes: Vec<ActiveInfo> = vertex_decls
            .attributes
            .iter()
            .filter(|decl| vertex_decls.referenced.contains(&decl.name))
            .filter_map(|decl| {
                glsl::gl_type_for(&decl.type_name).map(|gl_type| ActiveInfo {
                    name: decl.name.clone(),
                    size: 1,
                    gl_type,
                })
            })
            .collect();

        let mut locations = Vec::with_capacity(uniforms.len());
        for info in &uniforms {
            let location = UniformLocation(self.next_handle());
            let len = glsl::components(info.gl_type) * info.size.max(1) as usize;
            let stored = if glsl::is_integer(info.gl_type) {
                StoredUniform::Ints(vec![0; len])
            } else {
                StoredUniform::Floats(vec![0.0; len])
            };
            self.uniform_values.insert(location, stored);
            self.uniform_owner.insert(location, program);
            locations.push((info.name.clone(), location));
        }

        if let Some(object) = self.programs.get_mut(&program) {
            object.uniforms = uniforms;
            object.uniform_locations = locations;
            object.attributes = attributes;
            object.kernel = kernel;
        }
        Ok(())
    }

    fn store_uniform(&mut self, location: UniformLocation, name: &'static str, values: Stored<'_>) {
        if !self.active(name) {
            return;
        }
        if self.uniform_owner.get(&location) != self.current_program.as_ref() {
            self.error(format!("{name}: location {location} does not belong to the current program"));
            return;
        }
        let Some(slot) = self.uniform_values.get_mut(&location) else {
            return;
        };
        match (slot, values) {
            (StoredUniform::Ints(dst), Stored::Ints(src)) => copy_prefix(dst, src),
            (StoredUniform::Floats(dst), Stored::Floats(src)) => copy_prefix(dst, src),
            (StoredUniform::Floats(dst), Stored::Ints(src)) => {
                let src: Vec<f32> = src.iter().map(|v| *v as f32).collect();
                copy_prefix(dst, &src);
            }
            (StoredUniform::Ints(dst), Stored::Floats(src)) => {
                // Boolean uniforms may be set through the float entry points.
                let src: Vec<i32> = src.iter().map(|v| i32::from(*v != 0.0)).collect();
                copy_prefix(dst, &src);
            }
        }
    }

    /// Detaches the current colour buffer so it can be written while the
    /// rest of the state is borrowed for shading.
    fn take_target(&mut self) -> Option<(Vec<u8>, u32, u32)> {
        match self.framebuffer {
            None => Some((
                std::mem::take(&mut self.surface),
                self.surface_size.0,
                self.surface_size.1,
            )),
            Some(framebuffer) => {
                let texture = self.framebuffers.get(&framebuffer).copied().flatten()?;
                let object = self.textures.get_mut(&texture)?;
                Some((std::mem::take(&mut object.pixels), object.width, object.height))
            }
        }
    }

    fn restore_target(&mut self, pixels: Vec<u8>) {
        match self.framebuffer {
            None => self.surface = pixels,
            Some(framebuffer) => {
                let texture = self.framebuffers.get(&framebuffer).copied().flatten();
                if let Some(object) = texture.and_then(|id| self.textures.get_mut(&id)) {
                    object.pixels = pixels;
                }
            }
        }
    }

    fn fetch_vertex(&self, attributes: &[(String, u32)], vertex: usize) -> Vec<(String, [f32; 4])> {
        attributes
            .iter()
            .map(|(name, location)| {
                let mut value = [0.0, 0.0, 0.0, 1.0];
                if !self.enabled_attribs.contains(location) {
                    return (name.clone(), value);
                }
                let Some(pointer) = self.attrib_pointers.get(location) else {
                    return (name.clone(), value);
                };
                let Some(bytes) = pointer.buffer.and_then(|id| self.buffers.get(&id)) else {
                    return (name.clone(), value);
                };
                let scalar = crate::gl::type_size(pointer.data_type);
                let stride = if pointer.stride > 0 {
                    pointer.stride as usize
                } else {
                    scalar * pointer.size as usize
                };
                let base = pointer.offset as usize + vertex * stride;
                for (component, slot) in value.iter_mut().take(pointer.size as usize).enumerate() {
                    let start = base + component * scalar;
                    if let Some(raw) = bytes.get(start..start + scalar) {
                        *slot = decode_scalar(raw, pointer.data_type, pointer.normalized);
                    }
                }
                (name.clone(), value)
            })
            .collect()
    }
}

enum Stored<'a> {
    Ints(&'a [i32]),
    Floats(&'a [f32]),
}

fn copy_prefix<T: Copy>(dst: &mut [T], src: &[T]) {
    let len = dst.len().min(src.len());
    dst[..len].copy_from_slice(&src[..len]);
}

fn decode_scalar(raw: &[u8], data_type: u32, normalized: bool) -> f32 {
    let (value, max) = match data_type {
        constants::FLOAT => return f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        constants::BYTE => (raw[0] as i8 as f32, i8::MAX as f32),
        constants::UNSIGNED_BYTE => (raw[0] as f32, u8::MAX as f32),
        constants::SHORT => (i16::from_le_bytes([raw[0], raw[1]]) as f32, i16::MAX as f32),
        constants::UNSIGNED_SHORT => (u16::from_le_bytes([raw[0], raw[1]]) as f32, u16::MAX as f32),
        constants::INT => (
            i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32,
            i32::MAX as f32,
        ),
        _ => (
            u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32,
            u32::MAX as f32,
        ),
    };
    if normalized {
        value / max
    } else {
        value
    }
}

/// Reports a declared uniform the way `getActiveUniform` enumerates it:
/// arrays as `name[0]`, struct members flattened to `name[i].field`.
fn expand_uniform(
    decl: &glsl::Declaration,
    structs: &HashMap<String, Vec<glsl::Declaration>>,
    out: &mut Vec<ActiveInfo>,
) {
    if let Some(gl_type) = glsl::gl_type_for(&decl.type_name) {
        let name = match decl.array_len {
            Some(_) => format!("{}[0]", decl.name),
            None => decl.name.clone(),
        };
        out.push(ActiveInfo {
            name,
            size: decl.array_len.unwrap_or(1) as i32,
            gl_type,
        });
        return;
    }
    let Some(members) = structs.get(&decl.type_name) else {
        tracing::debug!(uniform = %decl.name, ty = %decl.type_name, "unknown uniform type");
        return;
    };
    let prefixes: Vec<String> = match decl.array_len {
        Some(len) => (0..len).map(|i| format!("{}[{i}]", decl.name)).collect(),
        None => vec![decl.name.clone()],
    };
    for prefix in prefixes {
        for member in members {
            let nested = glsl::Declaration {
                type_name: member.type_name.clone(),
                name: format!("{prefix}.{}", member.name),
                array_len: member.array_len,
            };
            expand_uniform(&nested, structs, out);
        }
    }
}

fn uniform_iv_name(components: usize) -> &'static str {
    match components {
        1 => "uniform1iv",
        2 => "uniform2iv",
        3 => "uniform3iv",
        _ => "uniform4iv",
    }
}

fn uniform_fv_name(components: usize) -> &'static str {
    match components {
        1 => "uniform1fv",
        2 => "uniform2fv",
        3 => "uniform3fv",
        _ => "uniform4fv",
    }
}

fn uniform_matrix_name(dimension: usize) -> &'static str {
    match dimension {
        2 => "uniformMatrix2fv",
        3 => "uniformMatrix3fv",
        _ => "uniformMatrix4fv",
    }
}

impl Gl for HeadlessGl {
    fn is_context_lost(&self) -> bool {
        self.lost
    }

    fn is_webgl2(&self) -> bool {
        self.config.webgl2
    }

    fn get_parameter_i32(&self, pname: u32) -> i32 {
        if self.lost {
            return 0;
        }
        match pname {
            constants::MAX_TEXTURE_SIZE => self.config.max_texture_size as i32,
            constants::MAX_TEXTURE_IMAGE_UNITS => TEXTURE_UNITS as i32,
            constants::MAX_COMBINED_TEXTURE_IMAGE_UNITS => 32,
            constants::MAX_VERTEX_ATTRIBS => 16,
            constants::MAX_TEXTURE_MAX_ANISOTROPY_EXT => {
                let supported = self
                    .config
                    .extensions
                    .iter()
                    .any(|ext| ext.ends_with("texture_filter_anisotropic"));
                if supported {
                    16
                } else {
                    0
                }
            }
            _ => 0,
        }
    }

    fn supported_extensions(&self) -> Vec<String> {
        if self.lost {
            return Vec::new();
        }
        self.config.extensions.clone()
    }

    fn create_shader(&mut self, kind: u32) -> Option<ShaderId> {
        if !self.active("createShader") {
            return None;
        }
        let id = ShaderId(self.next_handle());
        self.shaders.insert(
            id,
            ShaderObject {
                kind,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
            },
        );
        Some(id)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        if !self.active("shaderSource") {
            return;
        }
        if let Some(object) = self.shaders.get_mut(&shader) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        if !self.active("compileShader") {
            return;
        }
        if let Some(object) = self.shaders.get_mut(&shader) {
            match glsl::check_compile(&object.source) {
                Ok(()) => {
                    object.compiled = true;
                    object.info_log.clear();
                }
                Err(log) => {
                    object.compiled = false;
                    object.info_log = log;
                }
            }
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        !self.lost && self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        if self.lost {
            return String::new();
        }
        self.shaders
            .get(&shader)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if !self.active("deleteShader") {
            return;
        }
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> Option<ProgramId> {
        if !self.active("createProgram") {
            return None;
        }
        let id = ProgramId(self.next_handle());
        self.programs.insert(id, ProgramObject::default());
        Some(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if !self.active("attachShader") {
            return;
        }
        if let Some(object) = self.programs.get_mut(&program) {
            object.shaders.push(shader);
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        if !self.active("linkProgram") {
            return;
        }
        let result = self.link(program);
        if let Some(object) = self.programs.get_mut(&program) {
            match result {
                Ok(()) => {
                    object.linked = true;
                    object.info_log.clear();
                }
                Err(log) => {
                    object.linked = false;
                    object.info_log = log;
                }
            }
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        !self.lost && self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        if self.lost {
            return String::new();
        }
        self.programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        if !self.active("deleteProgram") {
            return;
        }
        self.programs.remove(&program);
        self.uniform_owner.retain(|location, owner| {
            let keep = *owner != program;
            if !keep {
                self.uniform_values.remove(location);
            }
            keep
        });
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if !self.active("useProgram") {
            return;
        }
        if let Some(id) = program {
            if !self.programs.get(&id).is_some_and(|p| p.linked) {
                self.error(format!("useProgram: {id} is not linked"));
                return;
            }
        }
        self.current_program = program;
    }

    fn active_uniform_count(&self, program: ProgramId) -> u32 {
        if self.lost {
            return 0;
        }
        self.programs
            .get(&program)
            .map(|p| p.uniforms.len() as u32)
            .unwrap_or(0)
    }

    fn active_uniform(&self, program: ProgramId, index: u32) -> Option<ActiveInfo> {
        if self.lost {
            return None;
        }
        self.programs.get(&program)?.uniforms.get(index as usize).cloned()
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if self.lost {
            return None;
        }
        self.programs
            .get(&program)?
            .uniform_locations
            .iter()
            .find(|(uniform, _)| uniform == name || uniform.strip_suffix("[0]") == Some(name))
            .map(|(_, location)| *location)
    }

    fn active_attribute_count(&self, program: ProgramId) -> u32 {
        if self.lost {
            return 0;
        }
        self.programs
            .get(&program)
            .map(|p| p.attributes.len() as u32)
            .unwrap_or(0)
    }

    fn active_attribute(&self, program: ProgramId, index: u32) -> Option<ActiveInfo> {
        if self.lost {
            return None;
        }
        self.programs
            .get(&program)?
            .attributes
            .get(index as usize)
            .cloned()
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> i32 {
        if self.lost {
            return -1;
        }
        self.programs
            .get(&program)
            .and_then(|p| p.attributes.iter().position(|a| a.name == name))
            .map(|index| index as i32)
            .unwrap_or(-1)
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.store_uniform(location, "uniform1i", Stored::Ints(&[value]));
    }

    fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
        self.store_uniform(location, "uniform1f", Stored::Floats(&[value]));
    }

    fn uniform_iv(&mut self, location: UniformLocation, components: usize, values: &[i32]) {
        self.store_uniform(location, uniform_iv_name(components), Stored::Ints(values));
    }

    fn uniform_fv(&mut self, location: UniformLocation, components: usize, values: &[f32]) {
        self.store_uniform(location, uniform_fv_name(components), Stored::Floats(values));
    }

    fn uniform_matrix_fv(
        &mut self,
        location: UniformLocation,
        dimension: usize,
        transpose: bool,
        values: &[f32],
    ) {
        if transpose {
            // WebGL 1 rejects transposed uploads.
            if self.active(uniform_matrix_name(dimension)) {
                self.error("uniformMatrix*fv: transpose must be false".to_string());
            }
            return;
        }
        self.store_uniform(location, uniform_matrix_name(dimension), Stored::Floats(values));
    }

    fn create_buffer(&mut self) -> Option<BufferId> {
        if !self.active("createBuffer") {
            return None;
        }
        let id = BufferId(self.next_handle());
        self.buffers.insert(id, Vec::new());
        Some(id)
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<BufferId>) {
        if !self.active("bindBuffer") {
            return;
        }
        match target {
            constants::ELEMENT_ARRAY_BUFFER => self.element_buffer = buffer,
            _ => self.array_buffer = buffer,
        }
    }

    fn buffer_data(&mut self, target: u32, data: BufferSource<'_>, _usage: u32) {
        if !self.active("bufferData") {
            return;
        }
        let bound = match target {
            constants::ELEMENT_ARRAY_BUFFER => self.element_buffer,
            _ => self.array_buffer,
        };
        match bound.and_then(|id| self.buffers.get_mut(&id)) {
            Some(storage) => *storage = data.as_bytes().to_vec(),
            None => self.error("bufferData: no buffer bound".to_string()),
        }
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        if !self.active("vertexAttribPointer") {
            return;
        }
        if self.array_buffer.is_none() {
            self.error("vertexAttribPointer: no ARRAY_BUFFER bound".to_string());
            return;
        }
        self.attrib_pointers.insert(
            index,
            AttribPointer {
                buffer: self.array_buffer,
                size,
                data_type,
                normalized,
                stride,
                offset,
            },
        );
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        if !self.active("enableVertexAttribArray") {
            return;
        }
        self.enabled_attribs.insert(index);
    }

    fn create_texture(&mut self) -> Option<TextureId> {
        if !self.active("createTexture") {
            return None;
        }
        let id = TextureId(self.next_handle());
        self.textures.insert(id, TextureObject::default());
        Some(id)
    }

    fn active_texture(&mut self, unit: u32) {
        if !self.active("activeTexture") {
            return;
        }
        let index = unit.wrapping_sub(constants::TEXTURE0) as usize;
        if index >= self.units.len() {
            self.error(format!("activeTexture: unit {index} out of range"));
            return;
        }
        self.active_unit = index;
    }

    fn bind_texture(&mut self, _target: u32, texture: Option<TextureId>) {
        if !self.active("bindTexture") {
            return;
        }
        self.units[self.active_unit] = texture;
    }

    fn tex_parameter_i(&mut self, _target: u32, pname: u32, param: i32) {
        if !self.active("texParameteri") {
            return;
        }
        let Some(texture) = self.bound_texture_mut() else {
            self.error("texParameteri: no texture bound".to_string());
            return;
        };
        let param = param as u32;
        match pname {
            constants::TEXTURE_WRAP_S => texture.wrap_s = param,
            constants::TEXTURE_WRAP_T => texture.wrap_t = param,
            constants::TEXTURE_MIN_FILTER => texture.min_filter = param,
            constants::TEXTURE_MAG_FILTER => texture.mag_filter = param,
            _ => {}
        }
    }

    fn pixel_store_i(&mut self, pname: u32, param: i32) {
        if !self.active("pixelStorei") {
            return;
        }
        if pname == constants::UNPACK_FLIP_Y_WEBGL {
            self.flip_y = param != 0;
        }
    }

    fn tex_image_2d(
        &mut self,
        _target: u32,
        _level: i32,
        _internal_format: u32,
        width: u32,
        height: u32,
        format: u32,
        data_type: u32,
        pixels: Option<&[u8]>,
    ) {
        if !self.active("texImage2D") {
            return;
        }
        if width > self.config.max_texture_size || height > self.config.max_texture_size {
            self.error(format!("texImage2D: {width}x{height} exceeds MAX_TEXTURE_SIZE"));
            return;
        }
        let len = (width * height * 4) as usize;
        let mut data = vec![0u8; len];
        match pixels {
            Some(src) if format == constants::RGBA && data_type == constants::UNSIGNED_BYTE => {
                if src.len() < len {
                    self.error("texImage2D: pixel data too short".to_string());
                    return;
                }
                let row = (width * 4) as usize;
                for y in 0..height as usize {
                    // Row 0 is t = 0. Without the flip the first uploaded row lands there.
                    let src_row = if self.flip_y {
                        height as usize - 1 - y
                    } else {
                        y
                    };
                    data[y * row..(y + 1) * row]
                        .copy_from_slice(&src[src_row * row..(src_row + 1) * row]);
                }
            }
            Some(_) => tracing::debug!(format, data_type, "unsupported upload format; zero-filled"),
            None => {}
        }
        let Some(texture) = self.bound_texture_mut() else {
            self.error("texImage2D: no texture bound".to_string());
            return;
        };
        texture.width = width;
        texture.height = height;
        texture.pixels = data;
        texture.mipmapped = false;
    }

    fn generate_mipmap(&mut self, _target: u32) {
        if !self.active("generateMipmap") {
            return;
        }
        let webgl2 = self.config.webgl2;
        let Some(texture) = self.bound_texture_mut() else {
            return;
        };
        let pot = crate::math::is_power_of_two(texture.width)
            && crate::math::is_power_of_two(texture.height);
        if !webgl2 && !pot {
            self.error("generateMipmap: texture is not power-of-two".to_string());
            return;
        }
        texture.mipmapped = true;
    }

    fn create_framebuffer(&mut self) -> Option<FramebufferId> {
        if !self.active("createFramebuffer") {
            return None;
        }
        let id = FramebufferId(self.next_handle());
        self.framebuffers.insert(id, None);
        Some(id)
    }

    fn bind_framebuffer(&mut self, _target: u32, framebuffer: Option<FramebufferId>) {
        if !self.active("bindFramebuffer") {
            return;
        }
        self.framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(
        &mut self,
        _target: u32,
        _attachment: u32,
        _texture_target: u32,
        texture: Option<TextureId>,
        _level: i32,
    ) {
        if !self.active("framebufferTexture2D") {
            return;
        }
        match self.framebuffer.and_then(|id| self.framebuffers.get_mut(&id)) {
            Some(slot) => *slot = texture,
            None => self.error("framebufferTexture2D: default framebuffer bound".to_string()),
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if !self.active("viewport") {
            return;
        }
        self.viewport = [x, y, width, height];
    }

    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        if !self.active("clearColor") {
            return;
        }
        self.clear_color = [r, g, b, a];
    }

    fn clear(&mut self, mask: u32) {
        if !self.active("clear") || mask & constants::COLOR_BUFFER_BIT == 0 {
            return;
        }
        let color = self.clear_color.map(raster::to_byte);
        let Some((mut pixels, _, _)) = self.take_target() else {
            self.error("clear: framebuffer incomplete".to_string());
            return;
        };
        for px in pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
        self.restore_target(pixels);
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        if !self.active("drawArrays") {
            return;
        }
        if mode != constants::TRIANGLES {
            tracing::debug!(mode, "only TRIANGLES is rasterised");
            return;
        }
        let Some(program_id) = self.current_program else {
            self.error("drawArrays: no program in use".to_string());
            return;
        };
        let Some(program) = self.programs.get(&program_id) else {
            return;
        };
        let Some(kernel) = program.kernel.clone() else {
            tracing::debug!(program = %program_id, "no kernel registered; draw skipped");
            return;
        };
        let attributes: Vec<(String, u32)> = program
            .attributes
            .iter()
            .enumerate()
            .map(|(location, info)| (info.name.clone(), location as u32))
            .collect();

        let first = first.max(0) as usize;
        let outputs: Vec<VertexOutput> = (first..first + count.max(0) as usize)
            .map(|vertex| {
                let fetched = self.fetch_vertex(&attributes, vertex);
                kernel.vertex(&VertexInput {
                    attributes: &fetched,
                })
            })
            .collect();

        let Some((mut pixels, width, height)) = self.take_target() else {
            self.error("drawArrays: framebuffer incomplete".to_string());
            return;
        };
        if let Some(program) = self.programs.get(&program_id) {
            let env = ShadingEnv {
                uniforms: &program.uniform_locations,
                values: &self.uniform_values,
                textures: &self.textures,
                units: &self.units,
            };
            let mut target = RasterTarget {
                pixels: &mut pixels,
                width,
                height,
            };
            for triangle in outputs.chunks_exact(3) {
                raster::rasterize_triangle(&mut target, self.viewport, triangle, &env, kernel.as_ref());
            }
        }
        self.restore_target(pixels);
    }

    fn read_pixels(&mut self, x: i32, y: i32, width: u32, height: u32, out: &mut [u8]) {
        if !self.active("readPixels") {
            return;
        }
        if out.len() < (width * height * 4) as usize {
            self.error("readPixels: destination too small".to_string());
            return;
        }
        let (source, source_width, source_height) = match self.framebuffer {
            None => (&self.surface, self.surface_size.0, self.surface_size.1),
            Some(framebuffer) => {
                let texture = self
                    .framebuffers
                    .get(&framebuffer)
                    .copied()
                    .flatten()
                    .and_then(|id| self.textures.get(&id));
                match texture {
                    Some(texture) => (&texture.pixels, texture.width, texture.height),
                    None => {
                        self.error("readPixels: framebuffer incomplete".to_string());
                        return;
                    }
                }
            }
        };
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                let (sx, sy) = (x + col, y + row);
                let dst = ((row as u32 * width + col as u32) * 4) as usize;
                let inside = sx >= 0
                    && sy >= 0
                    && (sx as u32) < source_width
                    && (sy as u32) < source_height;
                let px = if inside {
                    let src = ((sy as u32 * source_width + sx as u32) * 4) as usize;
                    source.get(src..src + 4)
                } else {
                    None
                };
                match px {
                    Some(px) => out[dst..dst + 4].copy_from_slice(px),
                    None => out[dst..dst + 4].fill(0),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "attribute vec2 position;\nvoid main() { gl_Position = vec4(position, 0.0, 1.0); }";
    const FRAGMENT: &str = "precision mediump float;\nuniform vec4 u_color;\nuniform float u_unused;\nvoid main() { gl_FragColor = u_color; }";

    struct Flat;

    impl ShaderKernel for Flat {
        fn vertex(&self, input: &VertexInput<'_>) -> VertexOutput {
            let [x, y, _, _] = input.attribute("position");
            VertexOutput {
                position: [x, y, 0.0, 1.0],
                varyings: Vec::new(),
            }
        }

        fn fragment(&self, input: &FragmentInput<'_>) -> [f32; 4] {
            let [r, g] = input.uniform_vec2("u_color");
            [r, g, 0.0, 1.0]
        }
    }

    fn link(gl: &mut HeadlessGl, vertex: &str, fragment: &str) -> ProgramId {
        let program = gl.create_program().unwrap();
        for (kind, source) in [
            (constants::VERTEX_SHADER, vertex),
            (constants::FRAGMENT_SHADER, fragment),
        ] {
            let shader = gl.create_shader(kind).unwrap();
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            assert!(gl.shader_compile_status(shader), "{}", gl.shader_info_log(shader));
            gl.attach_shader(program, shader);
        }
        gl.link_program(program);
        assert!(gl.program_link_status(program));
        program
    }

    #[test]
    fn unreferenced_uniforms_are_not_active() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let program = link(&mut gl, VERTEX, FRAGMENT);
        assert_eq!(gl.active_uniform_count(program), 1);
        let info = gl.active_uniform(program, 0).unwrap();
        assert_eq!(info.name, "u_color");
        assert_eq!(info.gl_type, constants::FLOAT_VEC4);
        assert_eq!(gl.attrib_location(program, "position"), 0);
        assert_eq!(gl.attrib_location(program, "missing"), -1);
    }

    #[test]
    fn struct_arrays_are_flattened() {
        let fragment = "struct Light { vec3 color; float intensity; };\nuniform Light lights[2];\nuniform float weights[3];\nvoid main() { gl_FragColor = vec4(lights[1].color * weights[0], 1.0); }";
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let program = link(&mut gl, VERTEX, fragment);
        let names: Vec<String> = (0..gl.active_uniform_count(program))
            .filter_map(|i| gl.active_uniform(program, i))
            .map(|info| info.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "lights[0].color",
                "lights[0].intensity",
                "lights[1].color",
                "lights[1].intensity",
                "weights[0]",
            ]
        );
        let weights = gl.active_uniform(program, 4).unwrap();
        assert_eq!(weights.size, 3);
    }

    #[test]
    fn uniform_writes_require_the_owning_program() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let program = link(&mut gl, VERTEX, FRAGMENT);
        let location = gl.uniform_location(program, "u_color").unwrap();
        gl.uniform_fv(location, 4, &[1.0, 0.5, 0.0, 1.0]);
        assert_eq!(gl.errors().len(), 1);

        gl.use_program(Some(program));
        gl.uniform_fv(location, 4, &[1.0, 0.5, 0.0, 1.0]);
        assert_eq!(
            gl.uniform_value(program, "u_color"),
            Some(&StoredUniform::Floats(vec![1.0, 0.5, 0.0, 1.0]))
        );
        assert_eq!(gl.calls().count("uniform4fv"), 2);
    }

    #[test]
    fn lost_context_swallows_calls() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        gl.lose_context();
        assert!(gl.create_texture().is_none());
        assert_eq!(gl.get_parameter_i32(constants::MAX_TEXTURE_SIZE), 0);
        assert_eq!(gl.calls().total(), 0);
        gl.restore_context();
        assert!(gl.create_texture().is_some());
    }

    #[test]
    fn upload_honours_flip_y() {
        let mut gl = HeadlessGl::new(HeadlessConfig::default());
        let texture = gl.create_texture();
        gl.bind_texture(constants::TEXTURE_2D, texture);
        let top_then_bottom = [255, 0, 0, 255, 0, 0, 255, 255];
        gl.pixel_store_i(constants::UNPACK_FLIP_Y_WEBGL, 1);
        gl.tex_image_2d(
            constants::TEXTURE_2D,
            0,
            constants::RGBA,
            1,
            2,
            constants::RGBA,
            constants::UNSIGNED_BYTE,
            Some(&top_then_bottom),
        );
        let (_, _, pixels) = gl.texture_data(texture.unwrap()).unwrap();
        // Row 0 is the bottom row: the flipped upload puts blue there.
        assert_eq!(&pixels[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn draws_through_registered_kernel() {
        let mut gl = HeadlessGl::new(HeadlessConfig {
            surface_size: (4, 4),
            ..HeadlessConfig::default()
        });
        gl.register_kernel(FRAGMENT, Rc::new(Flat));
        let program = link(&mut gl, VERTEX, FRAGMENT);
        gl.use_program(Some(program));
        let location = gl.uniform_location(program, "u_color").unwrap();
        gl.uniform_fv(location, 4, &[1.0, 1.0, 0.0, 1.0]);

        let buffer = gl.create_buffer();
        gl.bind_buffer(constants::ARRAY_BUFFER, buffer);
        let positions = [-1.0f32, -1.0, 3.0, -1.0, -1.0, 3.0];
        gl.buffer_data(
            constants::ARRAY_BUFFER,
            BufferSource::F32(&positions),
            constants::STATIC_DRAW,
        );
        gl.vertex_attrib_pointer(0, 2, constants::FLOAT, false, 0, 0);
        gl.enable_vertex_attrib_array(0);
        gl.viewport(0, 0, 4, 4);
        gl.draw_arrays(constants::TRIANGLES, 0, 3);

        let mut out = vec![0u8; 4 * 4 * 4];
        gl.read_pixels(0, 0, 4, 4, &mut out);
        assert!(out.chunks_exact(4).all(|px| px == [255, 255, 0, 255]));
    }
}
