use std::collections::BTreeSet;

use crate::gl::{constants, Gl};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limits {
    pub max_texture_size: u32,
    pub max_texture_image_units: u32,
    pub max_combined_texture_image_units: u32,
    pub max_vertex_attribs: u32,
    pub max_anisotropy: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub webgl2: bool,
    pub limits: Limits,
    pub extensions: BTreeSet<String>,
}

impl Capabilities {
    pub fn query<G: Gl + ?Sized>(gl: &G) -> Self {
        let extensions: BTreeSet<String> = gl
            .supported_extensions()
            .iter()
            .map(|name| to_camel_case(name))
            .collect();
        let param = |pname| u32::try_from(gl.get_parameter_i32(pname)).unwrap_or(0);
        let max_anisotropy = if extensions.contains("extTextureFilterAnisotropic") {
            param(constants::MAX_TEXTURE_MAX_ANISOTROPY_EXT)
        } else {
            0
        };
        let capabilities = Self {
            webgl2: gl.is_webgl2(),
            limits: Limits {
                max_texture_size: param(constants::MAX_TEXTURE_SIZE),
                max_texture_image_units: param(constants::MAX_TEXTURE_IMAGE_UNITS),
                max_combined_texture_image_units: param(
                    constants::MAX_COMBINED_TEXTURE_IMAGE_UNITS,
                ),
                max_vertex_attribs: param(constants::MAX_VERTEX_ATTRIBS),
                max_anisotropy,
            },
            extensions,
        };
        tracing::debug!(
            webgl2 = capabilities.webgl2,
            max_texture_size = capabilities.limits.max_texture_size,
            extensions = capabilities.extensions.len(),
            "queried context capabilities"
        );
        capabilities
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name) || self.extensions.contains(&to_camel_case(name))
    }
}

pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (index, part) in name.split('_').filter(|part| !part.is_empty()).enumerate() {
        let lower = part.to_ascii_lowercase();
        if index == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    out
}
