//! Lightmap seam stitching
//!
//! Both sides of a seam are walked in lockstep, two samples per texel of seam length.
//! Every pass pulls the texels at each sample `blend_factor` of the way toward their
//! common mean, so the gap across a seam shrinks by `1 - blend_factor` per pass.

use crate::config::LightmapStitchingSettings;
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::geometry_buffer::{nearest_texel, LightmapSeam};

fn seam_samples(seam: &LightmapSeam, lightmap_size: u32) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    let [a0, a1] = seam.positions;
    let [b0, b1] = seam.other_positions;
    let length = (a1 - a0).norm().max((b1 - b0).norm()) * lightmap_size as f32;
    let num_samples = ((length * 2.0).ceil() as usize).max(2);

    (0..num_samples).map(move |sample| {
        let t = (sample as f32 + 0.5) / num_samples as f32;
        (a0.lerp(&a1, t), b0.lerp(&b1, t))
    })
}

/// Blend lightmap texels across seams into `output`.
///
/// Texels not touched by any seam keep their value, and zero iterations copy the input.
pub fn stitch_lightmap_seams(
    input: &[Vec3],
    output: &mut Vec<Vec3>,
    lightmap_size: u32,
    seams: &[LightmapSeam],
    settings: &LightmapStitchingSettings,
) {
    output.clear();
    output.extend_from_slice(input);
    if seams.is_empty() {
        return;
    }

    let blend_factor = settings.blend_factor.clamp(0.0, 1.0);
    let mut targets = vec![Vec4::zeros(); input.len()];
    for _ in 0..settings.num_iterations {
        targets.iter_mut().for_each(|target| *target = Vec4::zeros());

        for seam in seams {
            for (uv, other_uv) in seam_samples(seam, lightmap_size) {
                let (index, other_index) = (nearest_texel(lightmap_size, &uv), nearest_texel(lightmap_size, &other_uv));
                if index == other_index {
                    continue;
                }

                let (value, other_value) = (output[index], output[other_index]);
                let mean = (value + other_value) * 0.5;
                let target = value + (mean - value) * blend_factor;
                let other_target = other_value + (mean - other_value) * blend_factor;
                targets[index] += Vec4::new(target.x, target.y, target.z, 1.0);
                targets[other_index] += Vec4::new(other_target.x, other_target.y, other_target.z, 1.0);
            }
        }

        for (value, target) in output.iter_mut().zip(&targets) {
            if target.w > 0.0 {
                *value = target.xyz() / target.w;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SIZE: u32 = 8;

    fn column_seam(column: f32, other_column: f32) -> LightmapSeam {
        let size = SIZE as f32;
        let segment = |x: f32| [Vec2::new((x + 0.5) / size, 0.5 / size), Vec2::new((x + 0.5) / size, 7.5 / size)];
        LightmapSeam { positions: segment(column), other_positions: segment(other_column) }
    }

    fn split_chart() -> Vec<Vec3> {
        (0..SIZE * SIZE)
            .map(|index| if index % SIZE < 4 { Vec3::new(1.0, 1.0, 1.0) } else { Vec3::zeros() })
            .collect()
    }

    #[test]
    fn test_seam_converges_between_sides() {
        let input = split_chart();
        let mut output = Vec::new();
        let settings = LightmapStitchingSettings { num_iterations: 4, blend_factor: 0.5 };
        stitch_lightmap_seams(&input, &mut output, SIZE, &[column_seam(1.0, 6.0)], &settings);

        // Gap of 1 halved by each of the 4 passes
        let expected_gap = 0.5_f32.powi(4);
        for row in 0..SIZE as usize {
            let left = output[row * SIZE as usize + 1];
            let right = output[row * SIZE as usize + 6];
            assert!((left.x - right.x).abs() <= expected_gap + 1e-5);
            assert_relative_eq!(left.x + right.x, 1.0, epsilon = 1e-5);
            assert!(left.x > right.x && right.x > 0.0 && left.x < 1.0);

            assert_eq!(output[row * SIZE as usize], Vec3::new(1.0, 1.0, 1.0));
            assert_eq!(output[row * SIZE as usize + 3], Vec3::new(1.0, 1.0, 1.0));
            assert_eq!(output[row * SIZE as usize + 7], Vec3::zeros());
        }
    }

    #[test]
    fn test_more_passes_close_the_gap() {
        let input = split_chart();
        let gap = |num_iterations: u32| {
            let mut output = Vec::new();
            let settings = LightmapStitchingSettings { num_iterations, blend_factor: 0.5 };
            stitch_lightmap_seams(&input, &mut output, SIZE, &[column_seam(1.0, 6.0)], &settings);
            output[1].x - output[6].x
        };
        assert!(gap(2) > gap(8));
        assert!(gap(16) < 1e-4);

        let mut output = Vec::new();
        let settings = LightmapStitchingSettings { num_iterations: 1, blend_factor: 1.0 };
        stitch_lightmap_seams(&input, &mut output, SIZE, &[column_seam(1.0, 6.0)], &settings);
        assert_relative_eq!(output[1].x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(output[6].x, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_partial_blend_moves_toward_mean() {
        let input = split_chart();
        let mut output = Vec::new();
        let settings = LightmapStitchingSettings { num_iterations: 1, blend_factor: 0.25 };
        stitch_lightmap_seams(&input, &mut output, SIZE, &[column_seam(1.0, 6.0)], &settings);

        assert_relative_eq!(output[1].x, 0.875, epsilon = 1e-5);
        assert_relative_eq!(output[6].x, 0.125, epsilon = 1e-5);
    }

    #[test]
    fn test_no_iterations_copies() {
        let input = split_chart();
        let mut output = Vec::new();
        let settings = LightmapStitchingSettings { num_iterations: 0, blend_factor: 0.5 };
        stitch_lightmap_seams(&input, &mut output, SIZE, &[column_seam(1.0, 6.0)], &settings);
        assert_eq!(output, input);
    }
}
