//! Backface correction of geometry buffer positions
//!
//! Texels near a wall that crosses the surface may end up behind it, where every ray sees
//! the back of the wall and the texel turns black. Four short rays along the surface
//! detect such walls, and the texel position is moved in front of the closest one.

use crate::config::GeometryBufferPreprocessSettings;
use crate::foundation::math::{utils, Vec3};
use crate::foundation::parallel::parallel_map;
use crate::raytracing::{GeometryMask, RayIntersectionService, RayQuery};

use super::LightmapChartGeometryBuffer;

fn corrected_position(
    buffer: &LightmapChartGeometryBuffer,
    index: usize,
    scene: &dyn RayIntersectionService,
    geometry_buffer_to_raytracer: &[u32],
    settings: &GeometryBufferPreprocessSettings,
) -> Option<Vec3> {
    if buffer.is_empty_texel(index) {
        return None;
    }
    let raytracer_id = *geometry_buffer_to_raytracer.get(buffer.geometry_ids[index] as usize)?;
    let current_geometry = scene.geometries().get(raytracer_id as usize)?;

    let position = buffer.positions[index];
    let face_normal = buffer.face_normals[index];
    let texel_radius = buffer.texel_radiuses[index];
    if texel_radius <= 0.0 {
        return None;
    }

    let bias_scale = utils::bias_scale(&position);
    let bias = bias_scale * settings.scaled_backface_bias + settings.constant_backface_bias;

    let basis = utils::rotation_between(&utils::forward(), &face_normal);
    let directions = [-Vec3::x(), Vec3::x(), Vec3::y(), -Vec3::y()].map(|axis| basis * axis);

    let mut closest: Option<(f32, Vec3, Vec3)> = None;
    for direction in directions {
        let query = RayQuery::new(position - direction * bias, direction * (1.0 + bias), texel_radius, GeometryMask::ALL);
        let hit = scene.intersect(&query, &mut |_, geometry| !current_geometry.is_unwanted_lod(geometry));
        let Some(hit) = hit else {
            continue;
        };

        let is_backface = hit.geometric_normal.dot(&query.direction) >= 0.0;
        if is_backface && closest.map_or(true, |(t, _, _)| hit.t < t) {
            closest = Some((hit.t, query.origin, query.direction));
        }
    }

    closest.map(|(t, origin, direction)| {
        origin + direction * (t + settings.constant_backface_bias + settings.scaled_backface_bias * bias_scale)
    })
}

/// Move texels that are behind nearby backfaces in front of them.
///
/// `geometry_buffer_to_raytracer` maps buffer geometry ids to ray geometry ids.
pub fn preprocess_geometry_buffer(
    buffer: &mut LightmapChartGeometryBuffer,
    scene: &dyn RayIntersectionService,
    geometry_buffer_to_raytracer: &[u32],
    settings: &GeometryBufferPreprocessSettings,
) {
    let corrected = {
        let buffer = &*buffer;
        parallel_map(buffer.num_texels(), settings.num_tasks, |index| {
            corrected_position(buffer, index, scene, geometry_buffer_to_raytracer, settings)
        })
    };

    for (position, corrected) in buffer.positions.iter_mut().zip(corrected) {
        if let Some(corrected) = corrected {
            *position = corrected;
        }
    }
}
