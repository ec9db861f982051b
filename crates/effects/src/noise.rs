//! Deterministic 2D value noise.
//!
//! The same field is evaluated on the CPU (idle wander paths, tests) and in
//! GLSL (beam displacement, dither grain), so both sides use the identical
//! sin-dot-fract corner hash and smoothstep-weighted bilinear blend. The
//! contract is visual smoothness and referential transparency per input, not
//! bit-exact agreement between CPU and GPU.

/// GLSL source for the noise pair, exported as a composable shader fragment.
pub const NOISE_GLSL: &str = r"float vnoise_hash(vec2 at) {
    return fract(sin(dot(at, vec2(12.9898, 78.233))) * 43758.5453123);
}

float vnoise(vec2 at) {
    vec2 cell = floor(at);
    vec2 part = fract(at);
    float a = vnoise_hash(cell);
    float b = vnoise_hash(cell + vec2(1.0, 0.0));
    float c = vnoise_hash(cell + vec2(0.0, 1.0));
    float d = vnoise_hash(cell + vec2(1.0, 1.0));
    vec2 u = part * part * (3.0 - 2.0 * part);
    return mix(a, b, u.x) + (c - a) * u.y * (1.0 - u.x) + (d - b) * u.x * u.y;
}
";

/// GLSL `fract`: always non-negative, unlike `f32::fract`.
fn fract(value: f32) -> f32 {
    value - value.floor()
}

/// Pseudo-random corner hash, identical to the GLSL `vnoise_hash`.
pub fn hash(x: f32, y: f32) -> f32 {
    fract((x * 12.9898 + y * 78.233).sin() * 43758.5453123)
}

/// Smoothly interpolated value noise over the integer lattice, in `[0, 1)`.
pub fn value_noise(x: f32, y: f32) -> f32 {
    let cell_x = x.floor();
    let cell_y = y.floor();
    let fx = x - cell_x;
    let fy = y - cell_y;

    let a = hash(cell_x, cell_y);
    let b = hash(cell_x + 1.0, cell_y);
    let c = hash(cell_x, cell_y + 1.0);
    let d = hash(cell_x + 1.0, cell_y + 1.0);

    let ux = fx * fx * (3.0 - 2.0 * fx);
    let uy = fy * fy * (3.0 - 2.0 * fy);

    mix(a, b, ux) + (c - a) * uy * (1.0 - ux) + (d - b) * ux * uy
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_repeat_stable() {
        for &(x, y) in &[(0.0, 0.0), (1.5, 2.25), (-3.7, 11.1), (100.0, -42.5)] {
            assert_eq!(value_noise(x, y), value_noise(x, y));
        }
    }

    #[test]
    fn lattice_points_equal_their_corner_hash() {
        for i in -3..4 {
            for j in -3..4 {
                let x = i as f32;
                let y = j as f32;
                assert!((value_noise(x, y) - hash(x, y)).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut at = -7.3f32;
        for _ in 0..500 {
            let sample = value_noise(at, at * 1.37 + 0.2);
            assert!((0.0..1.0).contains(&sample), "sample {sample} at {at}");
            at += 0.173;
        }
    }

    #[test]
    fn neighbouring_samples_vary_smoothly() {
        let step = 0.01;
        let mut previous = value_noise(0.0, 0.5);
        for index in 1..100 {
            let sample = value_noise(index as f32 * step, 0.5);
            assert!((sample - previous).abs() < 0.1);
            previous = sample;
        }
    }
}
