use std::rc::Rc;

use wgl::headless::{FragmentInput, HeadlessGl, ShaderKernel, VertexInput, VertexOutput};

pub const VERTEX_SHADER: &str = r#"
attribute vec2 position;
attribute vec2 uv;
varying vec2 v_uv;

void main() {
    v_uv = uv;
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

pub const FRAGMENT_SHADER: &str = r#"
precision mediump float;

uniform sampler2D u_tImage;
uniform sampler2D u_tNoise;
uniform float u_time;
uniform float u_waveIntensity;
uniform float u_waveScale;
uniform vec2 u_scale;
uniform vec2 u_offset;
uniform vec2 u_origin;
uniform vec2 u_ratio;
varying vec2 v_uv;

void main() {
    vec2 coord = (v_uv - u_origin) / u_scale + u_origin + u_offset;
    vec2 noiseCoord = v_uv * u_ratio * u_waveScale + vec2(0.0, u_time * 0.05);
    vec4 noise = texture2D(u_tNoise, noiseCoord);
    vec2 displacement = (noise.rg - 0.5) * 0.02 * u_waveIntensity;
    gl_FragColor = texture2D(u_tImage, coord + displacement);
}
"#;

const NOISE_SPEED: f32 = 0.05;
const DISPLACEMENT: f32 = 0.02;

/// Mirrors [`FRAGMENT_SHADER`] for the headless backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaveKernel;

impl ShaderKernel for WaveKernel {
    fn vertex(&self, input: &VertexInput<'_>) -> VertexOutput {
        let [x, y, ..] = input.attribute("position");
        let [u, v, ..] = input.attribute("uv");
        VertexOutput {
            position: [x, y, 0.0, 1.0],
            varyings: vec![u, v],
        }
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> [f32; 4] {
        let uv = [input.varyings[0], input.varyings[1]];
        let scale = input.uniform_vec2("u_scale");
        let offset = input.uniform_vec2("u_offset");
        let origin = input.uniform_vec2("u_origin");
        let ratio = input.uniform_vec2("u_ratio");
        let time = input.uniform_f32("u_time");
        let intensity = input.uniform_f32("u_waveIntensity");
        let wave_scale = input.uniform_f32("u_waveScale");

        let coord = [0, 1].map(|i| {
            let scale = if scale[i] == 0.0 { 1.0 } else { scale[i] };
            (uv[i] - origin[i]) / scale + origin[i] + offset[i]
        });
        let noise_coord = [
            uv[0] * ratio[0] * wave_scale,
            uv[1] * ratio[1] * wave_scale + time * NOISE_SPEED,
        ];
        let noise = input.sample("u_tNoise", noise_coord);
        let displaced = [
            coord[0] + (noise[0] - 0.5) * DISPLACEMENT * intensity,
            coord[1] + (noise[1] - 0.5) * DISPLACEMENT * intensity,
        ];
        input.sample("u_tImage", displaced)
    }
}

pub fn install_kernels(gl: &mut HeadlessGl) {
    gl.register_kernel(FRAGMENT_SHADER, Rc::new(WaveKernel));
}
