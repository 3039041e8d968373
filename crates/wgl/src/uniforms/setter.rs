use std::collections::HashMap;

use crate::gl::{Gl, UniformLocation};

use super::value::{UniformType, UniformValue};

/// Which backend entry point family uploads a uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetterKind {
    Int,
    Float,
    IntVector(usize),
    FloatVector(usize),
    Matrix(usize),
}

/// Resolved upload routine for one `(type, array size)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSetter {
    pub name: String,
    pub kind: SetterKind,
}

impl UniformSetter {
    pub fn resolve(ty: UniformType, size: i32) -> Self {
        let suffix = match ty.setter_suffix() {
            "1i" if size > 1 => "1iv",
            "1f" if size > 1 => "1fv",
            suffix => suffix,
        };
        let kind = if ty.is_matrix() {
            let dimension = match ty {
                UniformType::FloatMat2 => 2,
                UniformType::FloatMat3 => 3,
                _ => 4,
            };
            SetterKind::Matrix(dimension)
        } else if suffix.ends_with('v') {
            if ty.is_integer() {
                SetterKind::IntVector(ty.components())
            } else {
                SetterKind::FloatVector(ty.components())
            }
        } else if ty.is_integer() {
            SetterKind::Int
        } else {
            SetterKind::Float
        };
        Self {
            name: format!("uniform{suffix}"),
            kind,
        }
    }

    pub fn apply<G: Gl + ?Sized>(
        &self,
        gl: &mut G,
        location: UniformLocation,
        value: &UniformValue,
    ) {
        match (self.kind, value) {
            (SetterKind::Int, UniformValue::Bool(v)) => gl.uniform_1i(location, i32::from(*v)),
            (SetterKind::Int, UniformValue::Int(v)) => gl.uniform_1i(location, *v),
            (SetterKind::Float, UniformValue::Float(v)) => gl.uniform_1f(location, *v),
            (SetterKind::IntVector(n), UniformValue::Ints(values)) => {
                gl.uniform_iv(location, n, values)
            }
            (SetterKind::IntVector(n), UniformValue::Bools(values)) => {
                let values: Vec<i32> = values.iter().map(|v| i32::from(*v)).collect();
                gl.uniform_iv(location, n, &values);
            }
            (SetterKind::FloatVector(n), UniformValue::Floats(values)) => {
                gl.uniform_fv(location, n, values)
            }
            (SetterKind::Matrix(n), UniformValue::Floats(values)) => {
                gl.uniform_matrix_fv(location, n, false, values)
            }
            (kind, value) => tracing::warn!(
                setter = %self.name,
                ?kind,
                shape = value.shape_name(),
                "uniform value does not match its setter"
            ),
        }
    }
}

/// Setter resolutions for one context.
#[derive(Debug, Default)]
pub struct SetterCache {
    setters: HashMap<(UniformType, i32), UniformSetter>,
    resolutions: usize,
}

impl SetterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, ty: UniformType, size: i32) -> &UniformSetter {
        let resolutions = &mut self.resolutions;
        self.setters.entry((ty, size)).or_insert_with(|| {
            *resolutions += 1;
            UniformSetter::resolve(ty, size)
        })
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions
    }

    pub fn clear(&mut self) {
        self.setters.clear();
    }
}
