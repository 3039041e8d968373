use rand::prelude::*;
use wgl::PixelSource;

/// Side of the generated noise tile. A power of two, so it can repeat on
/// WebGL 1 without a resize.
pub const NOISE_SIZE: u32 = 64;

pub fn noise_source(seed: u64, width: u32, height: u32) -> PixelSource {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        pixels.extend_from_slice(&[rng.gen(), rng.gen(), rng.gen(), u8::MAX]);
    }
    match PixelSource::from_rgba(width, height, pixels) {
        Some(source) => source,
        None => PixelSource::solid(width, height, [128, 128, 128, 255]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic_per_seed() {
        let a = noise_source(7, 8, 8);
        let b = noise_source(7, 8, 8);
        let c = noise_source(8, 8, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_bytes().chunks_exact(4).all(|px| px[3] == 255));
    }
}
