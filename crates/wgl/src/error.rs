use std::fmt;

use thiserror::Error;

/// Which pipeline stage a shader belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    pub fn gl_enum(self) -> u32 {
        match self {
            ShaderKind::Vertex => crate::gl::constants::VERTEX_SHADER,
            ShaderKind::Fragment => crate::gl::constants::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("vertex"),
            ShaderKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failures raised while building GPU programs.
#[derive(Debug, Error)]
pub enum WglError {
    #[error("{kind} shader failed to compile: {log}")]
    Compile {
        kind: ShaderKind,
        log: String,
        /// Annotated source lines around the failing line, when the log names one.
        excerpt: Option<String>,
    },
    #[error("program failed to link: {log}")]
    Link { log: String },
}

/// Failures raised while resolving pixel sources.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("while loading url:{locator}: {reason}")]
    Io {
        locator: String,
        reason: String,
        #[source]
        source: std::io::Error,
    },
    #[error("while loading url:{locator}: {source}")]
    Decode {
        locator: String,
        #[source]
        source: image::ImageError,
    },
    #[error("while loading url:{locator}: not found")]
    NotFound { locator: String },
}

impl LoadError {
    pub fn locator(&self) -> &str {
        match self {
            LoadError::Io { locator, .. }
            | LoadError::Decode { locator, .. }
            | LoadError::NotFound { locator } => locator,
        }
    }
}

/// Value assignments a uniform cannot accept.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UniformError {
    #[error("uniform '{name}' of type {expected} cannot accept a {given} value")]
    ShapeMismatch {
        name: String,
        expected: &'static str,
        given: &'static str,
    },
}
