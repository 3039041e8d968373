use crate::context::GlContext;
use crate::error::UniformError;
use crate::gl::{ActiveInfo, Gl, ProgramId, UniformLocation};

use super::flatten::flatten;
use super::name::NameParts;
use super::value::{UniformInput, UniformType, UniformValue};

/// Client-side mirror of one active uniform.
///
/// Whenever `needs_update()` is false the GPU holds `value()`.
#[derive(Debug, Clone)]
pub struct ProgramUniform {
    name: String,
    parts: NameParts,
    ty: UniformType,
    size: i32,
    program: ProgramId,
    location: Option<UniformLocation>,
    current: UniformValue,
    scratch: UniformValue,
    flat: Vec<f32>,
    needs_update: bool,
    pub auto_update: bool,
}

impl ProgramUniform {
    pub fn new(
        program: ProgramId,
        info: &ActiveInfo,
        ty: UniformType,
        location: Option<UniformLocation>,
    ) -> Self {
        let current = UniformValue::default_for(ty, info.size);
        Self {
            name: info.name.clone(),
            parts: NameParts::parse(&info.name),
            ty,
            size: info.size,
            program,
            location,
            scratch: current.clone(),
            current,
            flat: Vec::new(),
            // A freshly linked program already holds zeros.
            needs_update: false,
            auto_update: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &NameParts {
        &self.parts
    }

    pub fn uniform_type(&self) -> UniformType {
        self.ty
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn location(&self) -> Option<UniformLocation> {
        self.location
    }

    pub fn value(&self) -> &UniformValue {
        &self.current
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Assigns a new value. Returns `Ok(false)` when it equals the current
    /// one, in which case nothing is marked dirty or uploaded.
    pub fn set<'a, G: Gl>(
        &mut self,
        ctx: &mut GlContext<G>,
        value: impl Into<UniformInput<'a>>,
    ) -> Result<bool, UniformError> {
        self.stage(value.into())?;
        if self.scratch == self.current {
            return Ok(false);
        }
        self.current.assign_from(&self.scratch);
        self.needs_update = true;
        if self.auto_update {
            self.update(ctx);
        }
        Ok(true)
    }

    /// Pushes a pending change. Binds the owning program through the state
    /// cache first, since uniform uploads target the current program.
    pub fn update<G: Gl>(&mut self, ctx: &mut GlContext<G>) -> bool {
        if !self.needs_update || ctx.is_lost() {
            return false;
        }
        let Some(location) = self.location else {
            self.needs_update = false;
            return false;
        };
        ctx.use_program(Some(self.program));
        ctx.apply_uniform(self.ty, self.size, location, &self.current);
        self.needs_update = false;
        true
    }

    /// Conforms `input` to this uniform's shape in the scratch value. Array
    /// slots the input does not cover keep their current contents.
    fn stage(&mut self, input: UniformInput<'_>) -> Result<(), UniformError> {
        self.scratch.assign_from(&self.current);
        let stride = self.ty.components();
        match (&mut self.scratch, input) {
            (UniformValue::Bool(slot), UniformInput::Bool(v)) => *slot = v,
            (UniformValue::Bool(slot), UniformInput::Int(v)) => *slot = v != 0,
            (UniformValue::Bool(slot), UniformInput::Float(v)) => *slot = v != 0.0,
            (UniformValue::Int(slot), UniformInput::Int(v)) => *slot = v,
            (UniformValue::Int(slot), UniformInput::Bool(v)) => *slot = i32::from(v),
            (UniformValue::Float(slot), UniformInput::Float(v)) => *slot = v,
            (UniformValue::Float(slot), UniformInput::Int(v)) => *slot = v as f32,
            (UniformValue::Floats(slot), UniformInput::Floats(v)) => copy_prefix(slot, &v),
            (UniformValue::Floats(slot), UniformInput::Ints(v)) => {
                for (dst, src) in slot.iter_mut().zip(v.iter()) {
                    *dst = *src as f32;
                }
            }
            (UniformValue::Floats(slot), UniformInput::Elements(entries)) => {
                flatten(&entries, stride, slot);
            }
            (UniformValue::Ints(slot), UniformInput::Ints(v)) => copy_prefix(slot, &v),
            (UniformValue::Ints(slot), UniformInput::Elements(entries)) => {
                self.flat.clear();
                self.flat.extend(slot.iter().map(|v| *v as f32));
                flatten(&entries, stride, &mut self.flat);
                for (dst, src) in slot.iter_mut().zip(&self.flat) {
                    *dst = src.round() as i32;
                }
            }
            (UniformValue::Bools(slot), UniformInput::Bools(v)) => copy_prefix(slot, &v),
            (UniformValue::Bools(slot), UniformInput::Ints(v)) => {
                for (dst, src) in slot.iter_mut().zip(v.iter()) {
                    *dst = *src != 0;
                }
            }
            (UniformValue::Bools(slot), UniformInput::Elements(entries)) => {
                self.flat.clear();
                self.flat
                    .extend(slot.iter().map(|v| if *v { 1.0 } else { 0.0 }));
                flatten(&entries, stride, &mut self.flat);
                for (dst, src) in slot.iter_mut().zip(&self.flat) {
                    *dst = *src != 0.0;
                }
            }
            (_, input) => {
                return Err(UniformError::ShapeMismatch {
                    name: self.name.clone(),
                    expected: self.ty.glsl_name(),
                    given: input.shape_name(),
                })
            }
        }
        Ok(())
    }
}

fn copy_prefix<T: Copy>(dst: &mut [T], src: &[T]) {
    let len = dst.len().min(src.len());
    dst[..len].copy_from_slice(&src[..len]);
}

/// Placeholder for a uniform name the program does not have.
///
/// Accepts any shape, keeps the last value written and never touches the GPU.
#[derive(Debug, Clone)]
pub struct StubUniform {
    name: String,
    current: UniformValue,
}

impl StubUniform {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current: UniformValue::default_for(UniformType::Bool, 1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &UniformValue {
        &self.current
    }

    pub fn set<'a>(&mut self, value: impl Into<UniformInput<'a>>) -> bool {
        let next = value.into().into_value();
        if next == self.current {
            return false;
        }
        self.current = next;
        true
    }
}

/// What [`UniformMap::get`](super::UniformMap::get) hands out.
#[derive(Debug, Clone)]
pub enum Uniform {
    Active(ProgramUniform),
    Stub(StubUniform),
}

impl Uniform {
    pub fn name(&self) -> &str {
        match self {
            Uniform::Active(uniform) => uniform.name(),
            Uniform::Stub(stub) => stub.name(),
        }
    }

    pub fn value(&self) -> &UniformValue {
        match self {
            Uniform::Active(uniform) => uniform.value(),
            Uniform::Stub(stub) => stub.value(),
        }
    }

    pub fn set<'a, G: Gl>(
        &mut self,
        ctx: &mut GlContext<G>,
        value: impl Into<UniformInput<'a>>,
    ) -> Result<bool, UniformError> {
        match self {
            Uniform::Active(uniform) => uniform.set(ctx, value),
            Uniform::Stub(stub) => Ok(stub.set(value)),
        }
    }

    pub fn update<G: Gl>(&mut self, ctx: &mut GlContext<G>) -> bool {
        match self {
            Uniform::Active(uniform) => uniform.update(ctx),
            Uniform::Stub(_) => false,
        }
    }

    pub fn needs_update(&self) -> bool {
        match self {
            Uniform::Active(uniform) => uniform.needs_update(),
            Uniform::Stub(_) => false,
        }
    }

    pub fn set_auto_update(&mut self, auto_update: bool) {
        if let Uniform::Active(uniform) = self {
            uniform.auto_update = auto_update;
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, Uniform::Stub(_))
    }

    pub fn as_active(&self) -> Option<&ProgramUniform> {
        match self {
            Uniform::Active(uniform) => Some(uniform),
            Uniform::Stub(_) => None,
        }
    }
}
