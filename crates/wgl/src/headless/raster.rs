use std::collections::HashMap;

use crate::gl::{constants, TextureId, UniformLocation};

use super::{StoredUniform, TextureObject};

pub trait ShaderKernel {
    fn vertex(&self, input: &VertexInput<'_>) -> VertexOutput;
    fn fragment(&self, input: &FragmentInput<'_>) -> [f32; 4];
}

pub struct VertexInput<'a> {
    pub(crate) attributes: &'a [(String, [f32; 4])],
}

impl VertexInput<'_> {
    pub fn attribute(&self, name: &str) -> [f32; 4] {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, value)| *value)
            .unwrap_or([0.0, 0.0, 0.0, 1.0])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexOutput {
    pub position: [f32; 4],
    pub varyings: Vec<f32>,
}

pub struct FragmentInput<'a> {
    pub frag_coord: [f32; 2],
    pub varyings: &'a [f32],
    pub(crate) env: &'a ShadingEnv<'a>,
}

impl FragmentInput<'_> {
    pub fn uniform_f32(&self, name: &str) -> f32 {
        self.env.component(name, 0)
    }

    pub fn uniform_vec2(&self, name: &str) -> [f32; 2] {
        [self.env.component(name, 0), self.env.component(name, 1)]
    }

    pub fn uniform_i32(&self, name: &str) -> i32 {
        self.env.component(name, 0) as i32
    }

    pub fn sample(&self, sampler: &str, uv: [f32; 2]) -> [f32; 4] {
        let unit = self.uniform_i32(sampler);
        let texture = usize::try_from(unit)
            .ok()
            .and_then(|unit| self.env.units.get(unit).copied().flatten())
            .and_then(|id| self.env.textures.get(&id));
        match texture {
            Some(texture) => sample_texture(texture, uv),
            None => [0.0, 0.0, 0.0, 1.0],
        }
    }
}

pub(crate) struct ShadingEnv<'a> {
    pub uniforms: &'a [(String, UniformLocation)],
    pub values: &'a HashMap<UniformLocation, StoredUniform>,
    pub textures: &'a HashMap<TextureId, TextureObject>,
    pub units: &'a [Option<TextureId>],
}

impl ShadingEnv<'_> {
    fn component(&self, name: &str, index: usize) -> f32 {
        let location = self
            .uniforms
            .iter()
            .find(|(uniform, _)| uniform == name || uniform.strip_suffix("[0]") == Some(name))
            .map(|(_, location)| *location);
        match location.and_then(|location| self.values.get(&location)) {
            Some(StoredUniform::Floats(values)) => values.get(index).copied().unwrap_or(0.0),
            Some(StoredUniform::Ints(values)) => values.get(index).copied().unwrap_or(0) as f32,
            None => 0.0,
        }
    }
}

pub(crate) struct RasterTarget<'a> {
    pub pixels: &'a mut [u8],
    pub width: u32,
    pub height: u32,
}

pub(crate) fn rasterize_triangle(
    target: &mut RasterTarget<'_>,
    viewport: [i32; 4],
    vertices: &[VertexOutput],
    env: &ShadingEnv<'_>,
    kernel: &dyn ShaderKernel,
) {
    let [vx, vy, vw, vh] = viewport;
    let window: Vec<[f32; 2]> = vertices
        .iter()
        .map(|vertex| {
            let w = if vertex.position[3] == 0.0 {
                1.0
            } else {
                vertex.position[3]
            };
            let ndc_x = vertex.position[0] / w;
            let ndc_y = vertex.position[1] / w;
            [
                (ndc_x + 1.0) * 0.5 * vw as f32 + vx as f32,
                (ndc_y + 1.0) * 0.5 * vh as f32 + vy as f32,
            ]
        })
        .collect();
    let (a, b, c) = (window[0], window[1], window[2]);
    let area = edge(a, b, c);
    if area == 0.0 {
        return;
    }

    let min_x = vx.max(0).max(a[0].min(b[0]).min(c[0]).floor() as i32);
    let max_x = (vx + vw)
        .min(target.width as i32)
        .min(a[0].max(b[0]).max(c[0]).ceil() as i32);
    let min_y = vy.max(0).max(a[1].min(b[1]).min(c[1]).floor() as i32);
    let max_y = (vy + vh)
        .min(target.height as i32)
        .min(a[1].max(b[1]).max(c[1]).ceil() as i32);

    let varying_count = vertices
        .iter()
        .map(|vertex| vertex.varyings.len())
        .min()
        .unwrap_or(0);
    let mut varyings = vec![0.0f32; varying_count];

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            for (index, slot) in varyings.iter_mut().enumerate() {
                *slot = w0 * vertices[0].varyings[index]
                    + w1 * vertices[1].varyings[index]
                    + w2 * vertices[2].varyings[index];
            }
            let color = kernel.fragment(&FragmentInput {
                frag_coord: p,
                varyings: &varyings,
                env,
            });
            let offset = ((y as u32 * target.width + x as u32) * 4) as usize;
            for (channel, value) in color.iter().enumerate() {
                target.pixels[offset + channel] = to_byte(*value);
            }
        }
    }
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

pub(crate) fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub(crate) fn sample_texture(texture: &TextureObject, uv: [f32; 2]) -> [f32; 4] {
    if texture.width == 0 || texture.height == 0 {
        return [0.0, 0.0, 0.0, 1.0];
    }
    let x = uv[0] * texture.width as f32 - 0.5;
    let y = uv[1] * texture.height as f32 - 0.5;
    if texture.mag_filter == constants::NEAREST {
        return texel(texture, x.round() as i64, y.round() as i64);
    }
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);
    let c00 = texel(texture, x0, y0);
    let c10 = texel(texture, x0 + 1, y0);
    let c01 = texel(texture, x0, y0 + 1);
    let c11 = texel(texture, x0 + 1, y0 + 1);
    let mut out = [0.0; 4];
    for channel in 0..4 {
        let top = c00[channel] * (1.0 - fx) + c10[channel] * fx;
        let bottom = c01[channel] * (1.0 - fx) + c11[channel] * fx;
        out[channel] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

fn texel(texture: &TextureObject, x: i64, y: i64) -> [f32; 4] {
    let x = wrap(x, texture.width as i64, texture.wrap_s);
    let y = wrap(y, texture.height as i64, texture.wrap_t);
    let offset = ((y * texture.width as i64 + x) * 4) as usize;
    match texture.pixels.get(offset..offset + 4) {
        Some(px) => [
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
            px[3] as f32 / 255.0,
        ],
        None => [0.0, 0.0, 0.0, 1.0],
    }
}

fn wrap(coord: i64, size: i64, mode: u32) -> i64 {
    match mode {
        constants::REPEAT => coord.rem_euclid(size),
        constants::MIRRORED_REPEAT => {
            let period = coord.rem_euclid(size * 2);
            if period < size {
                period
            } else {
                size * 2 - 1 - period
            }
        }
        _ => coord.clamp(0, size - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> TextureObject {
        TextureObject {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 255, 0, 0, 255, 255],
            ..TextureObject::default()
        }
    }

    #[test]
    fn wrap_modes() {
        assert_eq!(wrap(-1, 4, constants::REPEAT), 3);
        assert_eq!(wrap(5, 4, constants::REPEAT), 1);
        assert_eq!(wrap(-1, 4, constants::CLAMP_TO_EDGE), 0);
        assert_eq!(wrap(9, 4, constants::CLAMP_TO_EDGE), 3);
        assert_eq!(wrap(4, 4, constants::MIRRORED_REPEAT), 3);
        assert_eq!(wrap(-1, 4, constants::MIRRORED_REPEAT), 0);
    }

    #[test]
    fn nearest_and_linear_sampling() {
        let mut texture = checker();
        texture.mag_filter = constants::NEAREST;
        assert_eq!(sample_texture(&texture, [0.25, 0.5]), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(sample_texture(&texture, [0.75, 0.5]), [0.0, 0.0, 1.0, 1.0]);

        texture.mag_filter = constants::LINEAR;
        let mid = sample_texture(&texture, [0.5, 0.5]);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert!((mid[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_texture_samples_opaque_black() {
        let texture = TextureObject::default();
        assert_eq!(sample_texture(&texture, [0.5, 0.5]), [0.0, 0.0, 0.0, 1.0]);
    }
}
