//! Edge-stopping lightmap filter
//!
//! Neighbour texels are blended with a small binomial kernel. Each weight falls off with
//! luminance difference, distance in world space and normal divergence, so light does
//! not bleed across edges that merely touch in UV space.

use std::ops::{AddAssign, Div, Mul};

use crate::config::{LightmapFilterSettings, MAX_FILTER_KERNEL_RADIUS};
use crate::foundation::math::{utils, Vec3, Vec4};
use crate::foundation::parallel::parallel_map;
use crate::geometry_buffer::LightmapChartGeometryBuffer;
use crate::light_tracer::{LightmapChartBakedDirect, LightmapChartBakedIndirect};

/// Texel value the filter can blend
pub trait LightValue:
    Copy + Send + Sync + AddAssign + Mul<f32, Output = Self> + Div<f32, Output = Self>
{
    /// Zero light
    fn zero() -> Self;

    /// Perceived brightness
    fn luminance(&self) -> f32;
}

impl LightValue for Vec3 {
    fn zero() -> Self {
        Vec3::zeros()
    }

    fn luminance(&self) -> f32 {
        utils::luminance(self)
    }
}

impl LightValue for Vec4 {
    fn zero() -> Self {
        Vec4::zeros()
    }

    fn luminance(&self) -> f32 {
        utils::luminance(&self.xyz())
    }
}

/// 1D weights for offsets `0..=radius`: the center half of binomial row `2 * radius`
pub fn kernel_weights(radius: u32) -> Vec<f32> {
    let radius = radius.min(MAX_FILTER_KERNEL_RADIUS) as usize;
    let row = 2 * radius;
    let mut coefficients = vec![1.0f32; row + 1];
    for k in 1..=row {
        coefficients[k] = coefficients[k - 1] * (row + 1 - k) as f32 / k as f32;
    }
    coefficients[radius..].to_vec()
}

fn filter_texel<T: LightValue>(
    input: &[T],
    buffer: &LightmapChartGeometryBuffer,
    kernel: &[f32],
    settings: &LightmapFilterSettings,
    index: usize,
) -> T {
    let center = input[index];
    if buffer.is_empty_texel(index) {
        return center;
    }

    let size = buffer.size as i64;
    let radius = (kernel.len() - 1) as i64;
    let (x, y) = (index as i64 % size, index as i64 / size);
    let center_luminance = center.luminance();
    let center_position = buffer.positions[index];
    let center_normal = buffer.smooth_normals[index];

    let mut light_sum = T::zero();
    let mut weight_sum = 0.0;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= size || ny >= size {
                continue;
            }
            let other = (ny * size + nx) as usize;
            if buffer.is_empty_texel(other) {
                continue;
            }

            let value = input[other];
            let kernel_weight = kernel[dx.unsigned_abs() as usize] * kernel[dy.unsigned_abs() as usize];
            let color_weight = (center_luminance - value.luminance()).abs() / settings.luminance_sigma;
            let position_weight = if dx == 0 && dy == 0 {
                0.0
            } else {
                let offset_length = ((dx * dx + dy * dy) as f32).sqrt();
                (center_position - buffer.positions[other]).norm_squared() / (settings.position_sigma * offset_length)
            };
            let normal_weight = center_normal
                .dot(&buffer.smooth_normals[other])
                .max(0.0)
                .powf(settings.normal_power);

            let weight = kernel_weight * (-color_weight - position_weight).exp() * normal_weight;
            light_sum += value * weight;
            weight_sum += weight;
        }
    }

    if weight_sum > 0.0 {
        light_sum / weight_sum
    } else {
        center
    }
}

/// Filter a light buffer laid out like `buffer` into `output`.
///
/// Empty texels pass through, and a zero kernel radius copies the input.
pub fn filter_light<T: LightValue>(
    input: &[T],
    output: &mut Vec<T>,
    buffer: &LightmapChartGeometryBuffer,
    settings: &LightmapFilterSettings,
    num_tasks: usize,
) {
    output.clear();
    if settings.kernel_radius == 0 {
        output.extend_from_slice(input);
        return;
    }

    let kernel = kernel_weights(settings.kernel_radius);
    *output = parallel_map(input.len(), num_tasks, |index| {
        filter_texel(input, buffer, &kernel, settings, index)
    });
}

/// Filter the lightmap channel of direct light
pub fn filter_direct_light(
    baked: &LightmapChartBakedDirect,
    output: &mut Vec<Vec3>,
    buffer: &LightmapChartGeometryBuffer,
    settings: &LightmapFilterSettings,
    num_tasks: usize,
) {
    filter_light(&baked.direct_light, output, buffer, settings, num_tasks);
}

/// Filter normalized indirect light
pub fn filter_indirect_light(
    baked: &LightmapChartBakedIndirect,
    output: &mut Vec<Vec4>,
    buffer: &LightmapChartGeometryBuffer,
    settings: &LightmapFilterSettings,
    num_tasks: usize,
) {
    filter_light(&baked.light, output, buffer, settings, num_tasks);
}
