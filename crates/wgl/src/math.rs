pub fn is_power_of_two(value: u32) -> bool {
    value & value.wrapping_sub(1) == 0
}

pub fn floor_power_of_two(value: u32) -> u32 {
    if value == 0 {
        return 1;
    }
    1 << (31 - value.leading_zeros())
}

pub fn ceil_power_of_two(value: u32) -> u32 {
    if value <= 1 {
        return 1;
    }
    value.checked_next_power_of_two().unwrap_or(1 << 31)
}

pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn map_to_range(x: f32, a1: f32, a2: f32, b1: f32, b2: f32) -> f32 {
    b1 + (x - a1) * (b2 - b1) / (a2 - a1)
}

/// Scales `(width, height)` so it fully covers `(max_width, max_height)`,
/// preserving aspect ratio. The overflow is expected to be cropped.
pub fn size_to_cover(width: f32, height: f32, max_width: f32, max_height: f32) -> [f32; 2] {
    let ratio = (max_width / width).max(max_height / height);
    [width * ratio, height * ratio]
}

pub fn size_to_contain(width: f32, height: f32, max_width: f32, max_height: f32) -> [f32; 2] {
    let ratio = (max_width / width).min(max_height / height);
    [width * ratio, height * ratio]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_helpers() {
        assert!(is_power_of_two(0));
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(256));
        assert!(!is_power_of_two(100));
        assert_eq!(ceil_power_of_two(100), 128);
        assert_eq!(ceil_power_of_two(150), 256);
        assert_eq!(ceil_power_of_two(128), 128);
        assert_eq!(floor_power_of_two(150), 128);
        assert_eq!(floor_power_of_two(4096), 4096);
        assert_eq!(floor_power_of_two(0), 1);
    }

    #[test]
    fn cover_fits_square_source_into_square_target() {
        // 2x2 source relative to a 4x4 target.
        let [w, h] = size_to_cover(2.0 / 4.0, 2.0 / 4.0, 1.0, 1.0);
        assert!((w - 1.0).abs() < 1e-6);
        assert!((h - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cover_overflows_on_the_long_axis() {
        let [w, h] = size_to_cover(2.0, 1.0, 1.0, 1.0);
        assert!((w - 2.0).abs() < 1e-6);
        assert!((h - 1.0).abs() < 1e-6);
        let [w, h] = size_to_contain(2.0, 1.0, 1.0, 1.0);
        assert!((w - 1.0).abs() < 1e-6);
        assert!((h - 0.5).abs() < 1e-6);
    }

    #[test]
    fn map_to_range_is_linear() {
        assert!((map_to_range(5.0, 0.0, 10.0, 0.0, 1.0) - 0.5).abs() < 1e-6);
        assert!((lerp(2.0, 4.0, 0.25) - 2.5).abs() < 1e-6);
        assert_eq!(clamp(3.0, 0.0, 1.0), 1.0);
    }
}
