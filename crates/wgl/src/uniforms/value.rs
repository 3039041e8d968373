use std::borrow::Cow;

use crate::gl::constants;

use super::flatten::ComponentSource;

/// GLSL type of an active uniform, fixed at reflection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Bool,
    BoolVec2,
    BoolVec3,
    BoolVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    FloatMat2,
    FloatMat3,
    FloatMat4,
    Sampler2D,
    SamplerCube,
}

impl UniformType {
    pub fn from_gl(gl_type: u32) -> Option<Self> {
        let ty = match gl_type {
            constants::BOOL => UniformType::Bool,
            constants::BOOL_VEC2 => UniformType::BoolVec2,
            constants::BOOL_VEC3 => UniformType::BoolVec3,
            constants::BOOL_VEC4 => UniformType::BoolVec4,
            constants::INT => UniformType::Int,
            constants::INT_VEC2 => UniformType::IntVec2,
            constants::INT_VEC3 => UniformType::IntVec3,
            constants::INT_VEC4 => UniformType::IntVec4,
            constants::FLOAT => UniformType::Float,
            constants::FLOAT_VEC2 => UniformType::FloatVec2,
            constants::FLOAT_VEC3 => UniformType::FloatVec3,
            constants::FLOAT_VEC4 => UniformType::FloatVec4,
            constants::FLOAT_MAT2 => UniformType::FloatMat2,
            constants::FLOAT_MAT3 => UniformType::FloatMat3,
            constants::FLOAT_MAT4 => UniformType::FloatMat4,
            constants::SAMPLER_2D => UniformType::Sampler2D,
            constants::SAMPLER_CUBE => UniformType::SamplerCube,
            _ => return None,
        };
        Some(ty)
    }

    /// Scalars per element: 1-4 for scalars and vectors, 4/9/16 for matrices.
    pub fn components(self) -> usize {
        match self {
            UniformType::Bool
            | UniformType::Int
            | UniformType::Float
            | UniformType::Sampler2D
            | UniformType::SamplerCube => 1,
            UniformType::BoolVec2 | UniformType::IntVec2 | UniformType::FloatVec2 => 2,
            UniformType::BoolVec3 | UniformType::IntVec3 | UniformType::FloatVec3 => 3,
            UniformType::BoolVec4 | UniformType::IntVec4 | UniformType::FloatVec4 => 4,
            UniformType::FloatMat2 => 4,
            UniformType::FloatMat3 => 9,
            UniformType::FloatMat4 => 16,
        }
    }

    /// Suffix of the `uniform*` entry point used for a single element.
    pub fn setter_suffix(self) -> &'static str {
        match self {
            UniformType::Float => "1f",
            UniformType::FloatVec2 => "2fv",
            UniformType::FloatVec3 => "3fv",
            UniformType::FloatVec4 => "4fv",
            UniformType::Bool
            | UniformType::Int
            | UniformType::Sampler2D
            | UniformType::SamplerCube => "1i",
            UniformType::BoolVec2 | UniformType::IntVec2 => "2iv",
            UniformType::BoolVec3 | UniformType::IntVec3 => "3iv",
            UniformType::BoolVec4 | UniformType::IntVec4 => "4iv",
            UniformType::FloatMat2 => "Matrix2fv",
            UniformType::FloatMat3 => "Matrix3fv",
            UniformType::FloatMat4 => "Matrix4fv",
        }
    }

    pub fn is_matrix(self) -> bool {
        matches!(
            self,
            UniformType::FloatMat2 | UniformType::FloatMat3 | UniformType::FloatMat4
        )
    }

    pub fn is_bool(self) -> bool {
        matches!(
            self,
            UniformType::Bool | UniformType::BoolVec2 | UniformType::BoolVec3 | UniformType::BoolVec4
        )
    }

    /// True for types uploaded through the integer entry points.
    pub fn is_integer(self) -> bool {
        self.is_bool()
            || matches!(
                self,
                UniformType::Int
                    | UniformType::IntVec2
                    | UniformType::IntVec3
                    | UniformType::IntVec4
                    | UniformType::Sampler2D
                    | UniformType::SamplerCube
            )
    }

    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Bool => "bool",
            UniformType::BoolVec2 => "bvec2",
            UniformType::BoolVec3 => "bvec3",
            UniformType::BoolVec4 => "bvec4",
            UniformType::Int => "int",
            UniformType::IntVec2 => "ivec2",
            UniformType::IntVec3 => "ivec3",
            UniformType::IntVec4 => "ivec4",
            UniformType::Float => "float",
            UniformType::FloatVec2 => "vec2",
            UniformType::FloatVec3 => "vec3",
            UniformType::FloatVec4 => "vec4",
            UniformType::FloatMat2 => "mat2",
            UniformType::FloatMat3 => "mat3",
            UniformType::FloatMat4 => "mat4",
            UniformType::Sampler2D => "sampler2D",
            UniformType::SamplerCube => "samplerCube",
        }
    }
}

/// Client-side value of a uniform. The variant is fixed by the uniform's
/// type and array size.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Bools(Vec<bool>),
    Ints(Vec<i32>),
    Floats(Vec<f32>),
}

impl UniformValue {
    /// Zero value matching what GL initialises a freshly linked uniform to.
    pub fn default_for(ty: UniformType, size: i32) -> Self {
        let scalar = size <= 1;
        let len = ty.components() * size.max(1) as usize;
        match ty {
            UniformType::Bool if scalar => UniformValue::Bool(false),
            UniformType::Int | UniformType::Sampler2D | UniformType::SamplerCube if scalar => {
                UniformValue::Int(0)
            }
            UniformType::Float if scalar => UniformValue::Float(0.0),
            _ if ty.is_bool() => UniformValue::Bools(vec![false; len]),
            _ if ty.is_integer() => UniformValue::Ints(vec![0; len]),
            _ => UniformValue::Floats(vec![0.0; len]),
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            UniformValue::Bool(_) => "bool",
            UniformValue::Int(_) => "int",
            UniformValue::Float(_) => "float",
            UniformValue::Bools(_) => "bool array",
            UniformValue::Ints(_) => "int array",
            UniformValue::Floats(_) => "float array",
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            UniformValue::Float(value) => Some(*value),
            UniformValue::Int(value) => Some(*value as f32),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            UniformValue::Floats(values) => Some(values),
            _ => None,
        }
    }

    /// Copies `other` into `self`, reusing the existing allocation when the
    /// shapes agree.
    pub(crate) fn assign_from(&mut self, other: &UniformValue) {
        match (self, other) {
            (UniformValue::Floats(dst), UniformValue::Floats(src)) if dst.len() == src.len() => {
                dst.copy_from_slice(src)
            }
            (UniformValue::Ints(dst), UniformValue::Ints(src)) if dst.len() == src.len() => {
                dst.copy_from_slice(src)
            }
            (UniformValue::Bools(dst), UniformValue::Bools(src)) if dst.len() == src.len() => {
                dst.copy_from_slice(src)
            }
            (dst, src) => *dst = src.clone(),
        }
    }
}

/// Anything a caller may assign to a uniform.
pub enum UniformInput<'a> {
    Bool(bool),
    Int(i32),
    Float(f32),
    Bools(Cow<'a, [bool]>),
    Ints(Cow<'a, [i32]>),
    Floats(Cow<'a, [f32]>),
    /// Vector-like entries, one per array element.
    Elements(Vec<&'a dyn ComponentSource>),
}

impl UniformInput<'_> {
    pub fn shape_name(&self) -> &'static str {
        match self {
            UniformInput::Bool(_) => "bool",
            UniformInput::Int(_) => "int",
            UniformInput::Float(_) => "float",
            UniformInput::Bools(_) => "bool array",
            UniformInput::Ints(_) => "int array",
            UniformInput::Floats(_) => "float array",
            UniformInput::Elements(_) => "element list",
        }
    }

    /// Stores the input as-is, without a declared shape to conform to.
    pub(crate) fn into_value(self) -> UniformValue {
        match self {
            UniformInput::Bool(value) => UniformValue::Bool(value),
            UniformInput::Int(value) => UniformValue::Int(value),
            UniformInput::Float(value) => UniformValue::Float(value),
            UniformInput::Bools(values) => UniformValue::Bools(values.into_owned()),
            UniformInput::Ints(values) => UniformValue::Ints(values.into_owned()),
            UniformInput::Floats(values) => UniformValue::Floats(values.into_owned()),
            UniformInput::Elements(entries) => {
                let mut out = Vec::new();
                for entry in entries {
                    let offset = out.len();
                    out.resize(offset + entry.component_count(), 0.0);
                    entry.write_into(&mut out, offset);
                }
                UniformValue::Floats(out)
            }
        }
    }
}

impl From<bool> for UniformInput<'_> {
    fn from(value: bool) -> Self {
        UniformInput::Bool(value)
    }
}

impl From<i32> for UniformInput<'_> {
    fn from(value: i32) -> Self {
        UniformInput::Int(value)
    }
}

impl From<f32> for UniformInput<'_> {
    fn from(value: f32) -> Self {
        UniformInput::Float(value)
    }
}

impl<'a> From<&'a [f32]> for UniformInput<'a> {
    fn from(value: &'a [f32]) -> Self {
        UniformInput::Floats(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a [i32]> for UniformInput<'a> {
    fn from(value: &'a [i32]) -> Self {
        UniformInput::Ints(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a [bool]> for UniformInput<'a> {
    fn from(value: &'a [bool]) -> Self {
        UniformInput::Bools(Cow::Borrowed(value))
    }
}

impl From<Vec<f32>> for UniformInput<'_> {
    fn from(value: Vec<f32>) -> Self {
        UniformInput::Floats(Cow::Owned(value))
    }
}

impl<const N: usize> From<[f32; N]> for UniformInput<'_> {
    fn from(value: [f32; N]) -> Self {
        UniformInput::Floats(Cow::Owned(value.to_vec()))
    }
}

impl<const N: usize> From<[i32; N]> for UniformInput<'_> {
    fn from(value: [i32; N]) -> Self {
        UniformInput::Ints(Cow::Owned(value.to_vec()))
    }
}

impl<const N: usize> From<[bool; N]> for UniformInput<'_> {
    fn from(value: [bool; N]) -> Self {
        UniformInput::Bools(Cow::Owned(value.to_vec()))
    }
}

impl<'a, const N: usize> From<&'a [[f32; N]]> for UniformInput<'a> {
    fn from(value: &'a [[f32; N]]) -> Self {
        UniformInput::Elements(
            value
                .iter()
                .map(|entry| entry as &dyn ComponentSource)
                .collect(),
        )
    }
}

impl<'a> From<Vec<&'a dyn ComponentSource>> for UniformInput<'a> {
    fn from(value: Vec<&'a dyn ComponentSource>) -> Self {
        UniformInput::Elements(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_type_and_size() {
        assert_eq!(
            UniformValue::default_for(UniformType::Bool, 1),
            UniformValue::Bool(false)
        );
        assert_eq!(
            UniformValue::default_for(UniformType::Sampler2D, 1),
            UniformValue::Int(0)
        );
        assert_eq!(
            UniformValue::default_for(UniformType::Float, 1),
            UniformValue::Float(0.0)
        );
        assert_eq!(
            UniformValue::default_for(UniformType::FloatVec3, 2),
            UniformValue::Floats(vec![0.0; 6])
        );
        assert_eq!(
            UniformValue::default_for(UniformType::FloatMat3, 1),
            UniformValue::Floats(vec![0.0; 9])
        );
        assert_eq!(
            UniformValue::default_for(UniformType::BoolVec2, 1),
            UniformValue::Bools(vec![false; 2])
        );
        assert_eq!(
            UniformValue::default_for(UniformType::Int, 4),
            UniformValue::Ints(vec![0; 4])
        );
    }

    #[test]
    fn setter_suffixes() {
        assert_eq!(UniformType::FloatVec2.setter_suffix(), "2fv");
        assert_eq!(UniformType::BoolVec4.setter_suffix(), "4iv");
        assert_eq!(UniformType::Sampler2D.setter_suffix(), "1i");
        assert_eq!(UniformType::FloatMat4.setter_suffix(), "Matrix4fv");
        assert!(UniformType::FloatMat2.is_matrix());
        assert_eq!(
            UniformType::from_gl(constants::FLOAT_VEC4),
            Some(UniformType::FloatVec4)
        );
        assert_eq!(UniformType::from_gl(0), None);
    }

    #[test]
    fn assign_from_reuses_storage() {
        let mut value = UniformValue::Floats(vec![0.0; 4]);
        let before = value.as_floats().map(|v| v.as_ptr());
        value.assign_from(&UniformValue::Floats(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(value.as_floats(), Some(&[1.0, 2.0, 3.0, 4.0][..]));
        assert_eq!(value.as_floats().map(|v| v.as_ptr()), before);
    }
}
