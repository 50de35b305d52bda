//! Emission and direct light

use rand::Rng;

use crate::config::{DirectLightTracingSettings, EmissionLightTracingSettings, SceneBakingProperties};
use crate::foundation::math::{constants, utils, Vec3};
use crate::foundation::parallel::{parallel_for_each, parallel_map};
use crate::foundation::random::random_disk_offset;
use crate::foundation::spherical_harmonics::{SphericalHarmonicsColor9, SphericalHarmonicsDot9};
use crate::geometry_buffer::LightmapChartGeometryBuffer;
use crate::raytracing::{GeometryMask, RayHit, RayIntersectionService, RayQuery, RaytracerGeometry, VertexAttribute};
use crate::scene::{BakedLight, LightProbeCollection, LightType};

use super::{LightProbeCollectionBakedData, LightmapChartBakedDirect, RandomStream};

/// One shadow ray toward a light
#[derive(Debug, Clone, Copy)]
struct LightSample {
    /// From the light sample point to the receiver
    offset: Vec3,
    /// Light reaching the receiver without occluders
    intensity: Vec3,
    /// Unit direction toward the light
    incoming: Vec3,
}

fn num_samples(light: &BakedLight, settings: &DirectLightTracingSettings) -> u32 {
    let size = match light.light_type {
        LightType::Directional => light.angle,
        LightType::Point | LightType::Spot => light.radius,
    };
    if size < constants::LARGE_EPSILON {
        1
    } else {
        settings.max_samples.max(1)
    }
}

fn point_attenuation(light: &BakedLight, distance: f32) -> f32 {
    let range = (light.distance - light.radius).max(constants::EPSILON);
    (1.0 - (distance - light.radius) / range).max(0.0).powi(2)
}

fn sample_light<R: Rng + ?Sized>(light: &BakedLight, position: &Vec3, max_distance: f32, rng: &mut R) -> Option<LightSample> {
    let disk = random_disk_offset(rng);
    match light.light_type {
        LightType::Directional => {
            let disk_offset = light.rotation * Vec3::new(disk.x, disk.y, 0.0) * (max_distance * light.half_angle_tan);
            Some(LightSample {
                offset: light.direction * max_distance + disk_offset,
                intensity: light.color,
                incoming: -light.direction,
            })
        }
        LightType::Point | LightType::Spot => {
            let to_receiver = position - light.position;
            let disk_rotation = if light.light_type == LightType::Spot {
                light.rotation
            } else {
                utils::rotation_between(&utils::forward(), &to_receiver)
            };
            let offset = to_receiver + disk_rotation * Vec3::new(disk.x, disk.y, 0.0) * light.radius;
            let distance = offset.norm();
            if distance < constants::EPSILON {
                return None;
            }

            let attenuation = point_attenuation(light, distance);
            if attenuation <= constants::LARGE_EPSILON {
                return None;
            }

            let mut intensity = light.color * attenuation;
            if light.light_type == LightType::Spot {
                let cosine = light.direction.dot(&(offset / distance));
                let spot_factor = ((cosine - light.cutoff) / (1.0 - light.cutoff).max(constants::EPSILON)).clamp(0.0, 1.0);
                if spot_factor <= constants::LARGE_EPSILON {
                    return None;
                }
                intensity *= spot_factor;
            }

            Some(LightSample {
                offset,
                intensity,
                incoming: (light.position - position).try_normalize(0.0).unwrap_or_else(Vec3::zeros),
            })
        }
    }
}

/// Light let through a semi-transparent surface
fn transmittance(scene: &dyn RayIntersectionService, hit: &RayHit, geometry: &RaytracerGeometry) -> Vec3 {
    let material = &geometry.material;
    let texture = material.sample_texture(&scene.interpolate(hit, VertexAttribute::Uv).xy());
    let alpha = material.alpha * texture.w;
    let color = material.diffuse_color.component_mul(&texture.xyz());
    let transparency = (1.0 - alpha).clamp(0.0, 1.0);
    utils::lerp_vec3(&Vec3::repeat(1.0), &color, 1.0 - transparency) * transparency
}

/// Trace a shadow ray, returns the light reaching the receiver unless it is occluded
fn trace_shadow_ray(
    scene: &dyn RayIntersectionService,
    sample: &LightSample,
    position: &Vec3,
    mask: GeometryMask,
    is_ignored: impl Fn(&RaytracerGeometry) -> bool,
) -> Option<Vec3> {
    let query = RayQuery::new(position - sample.offset, sample.offset, 1.0, mask);
    let mut intensity = sample.intensity;
    let hit = scene.intersect(&query, &mut |hit, geometry| {
        if is_ignored(geometry) {
            return false;
        }
        if geometry.material.opaque {
            return true;
        }
        intensity = intensity.component_mul(&transmittance(scene, hit, geometry));
        false
    });
    hit.is_none().then_some(intensity)
}

/// Add emission to direct and surface light, and copy albedo
pub fn bake_emission_light(
    baked: &mut LightmapChartBakedDirect,
    buffer: &LightmapChartGeometryBuffer,
    settings: &EmissionLightTracingSettings,
    properties: &SceneBakingProperties,
) {
    parallel_for_each(&mut baked.direct_light, settings.num_tasks, |index, direct| {
        if !buffer.is_empty_texel(index) {
            *direct += buffer.emission[index];
        }
    });
    parallel_for_each(&mut baked.surface_light, settings.num_tasks, |index, surface| {
        if !buffer.is_empty_texel(index) {
            *surface += buffer.emission[index] * properties.emission_brightness;
        }
    });
    parallel_for_each(&mut baked.albedo, settings.num_tasks, |index, albedo| {
        *albedo = buffer.albedo[index];
    });
}

/// Trace one light for every texel of a chart.
///
/// Surface light always receives the light scaled by albedo and indirect brightness.
/// Direct light only receives it when the light is fully baked.
pub fn bake_direct_light_for_charts(
    baked: &mut LightmapChartBakedDirect,
    buffer: &LightmapChartGeometryBuffer,
    scene: &dyn RayIntersectionService,
    geometry_buffer_to_raytracer: &[u32],
    light: &BakedLight,
    settings: &DirectLightTracingSettings,
    random: RandomStream,
) {
    let num_samples = num_samples(light, settings);
    let max_distance = scene.max_distance();

    let contributions = parallel_map(buffer.num_texels(), settings.num_tasks, |index| {
        if buffer.is_empty_texel(index) || buffer.light_masks[index] & light.light_mask == 0 {
            return None;
        }
        let raytracer_id = *geometry_buffer_to_raytracer.get(buffer.geometry_ids[index] as usize)?;
        let current_geometry = scene.geometries().get(raytracer_id as usize)?;

        let position = buffer.positions[index];
        let normal = buffer.smooth_normals[index];
        let mut rng = random.rng(index);
        let mut light_sum = Vec3::zeros();
        for _ in 0..num_samples {
            let Some(sample) = sample_light(light, &position, max_distance, &mut rng) else {
                continue;
            };
            let visible = trace_shadow_ray(scene, &sample, &position, GeometryMask::ALL, |geometry| {
                current_geometry.is_unwanted_lod(geometry)
            });
            if let Some(intensity) = visible {
                light_sum += intensity * normal.dot(&sample.incoming).max(0.0);
            }
        }
        Some(light_sum / num_samples as f32)
    });

    for (index, contribution) in contributions.into_iter().enumerate() {
        let Some(direct) = contribution else {
            continue;
        };
        if light.is_baked() {
            baked.direct_light[index] += direct;
        }
        baked.surface_light[index] += buffer.albedo[index].component_mul(&direct) * light.indirect_brightness;
    }
}

/// Trace one light for every probe. Only fully baked lights are stored.
pub fn bake_direct_light_for_light_probes(
    baked: &mut LightProbeCollectionBakedData,
    collection: &LightProbeCollection,
    scene: &dyn RayIntersectionService,
    light: &BakedLight,
    settings: &DirectLightTracingSettings,
    random: RandomStream,
) {
    if !light.is_baked() {
        return;
    }

    let num_samples = num_samples(light, settings);
    let max_distance = scene.max_distance();

    let contributions = parallel_map(collection.num_probes(), settings.num_tasks, |index| {
        if collection.light_masks[index] & light.light_mask == 0 {
            return None;
        }

        let position = collection.world_positions[index];
        let mut rng = random.rng(index);
        let mut light_sum = SphericalHarmonicsColor9::default();
        for _ in 0..num_samples {
            let Some(sample) = sample_light(light, &position, max_distance, &mut rng) else {
                continue;
            };
            let visible = trace_shadow_ray(scene, &sample, &position, GeometryMask::PRIMARY_LOD, |geometry| {
                geometry.lod_index != 0
            });
            if let Some(intensity) = visible {
                light_sum += SphericalHarmonicsColor9::from_direction(&sample.incoming, &intensity);
            }
        }
        Some(SphericalHarmonicsDot9::from(light_sum * (constants::PI / num_samples as f32)))
    });

    for (sh, contribution) in baked.spherical_harmonics.iter_mut().zip(contributions) {
        if let Some(contribution) = contribution {
            *sh += contribution;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec2};
    use crate::geometry_buffer::EMPTY_GEOMETRY_ID;
    use crate::light_tracer::tests::chart_fixture;
    use crate::light_tracer::TracingPass;
    use crate::scene::{procedural, LightMode, LightProbeGroup, Material};
    use approx::assert_relative_eq;

    fn floor() -> crate::scene::StaticGeometry {
        procedural::quad_geometry("floor", Mat4::new_scaling(2.0), Material::diffuse(Vec3::new(0.5, 0.5, 0.5)))
    }

    fn stream() -> RandomStream {
        RandomStream::new(3, TracingPass::DirectCharts, 0, 0)
    }

    /// Texel away from the quad diagonal, where both triangles meet
    fn interior_texel(baked: &LightmapChartBakedDirect) -> usize {
        baked.nearest_location(&Vec2::new(0.3, 0.6))
    }

    #[test]
    fn test_point_light_above_floor() {
        let fixture = chart_fixture(vec![floor()], 8);
        let buffer = &fixture.buffers[0];
        let mut baked = LightmapChartBakedDirect::new(8);
        bake_emission_light(&mut baked, buffer, &Default::default(), &Default::default());

        let light = BakedLight::point(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 1.0, 1.0), 10.0);
        let settings = DirectLightTracingSettings::new(4);
        bake_direct_light_for_charts(&mut baked, buffer, &fixture.scene, &fixture.mapping, &light, &settings, stream());

        let index = interior_texel(&baked);
        let to_light = light.position - buffer.positions[index];
        let expected = point_attenuation(&light, to_light.norm()) * to_light.normalize().z;
        assert!(expected > 0.5);
        assert_relative_eq!(baked.direct_light[index].x, expected, epsilon = 1e-4);
        assert_relative_eq!(baked.surface_light[index].x, expected * 0.5, epsilon = 1e-4);

        // Light falls off toward the far corner, and empty texels stay black
        let near = baked.nearest_location(&Vec2::new(0.4375, 0.5625));
        let corner = baked.nearest_location(&Vec2::new(0.0625, 0.9375));
        assert_ne!(buffer.geometry_ids[corner], EMPTY_GEOMETRY_ID);
        assert!(baked.direct_light[corner].x > 0.0);
        assert!(baked.direct_light[near].x > baked.direct_light[corner].x);
        for (texel, geometry_id) in baked.direct_light.iter().zip(&buffer.geometry_ids) {
            if *geometry_id == EMPTY_GEOMETRY_ID {
                assert_eq!(*texel, Vec3::zeros());
            }
        }
    }

    #[test]
    fn test_light_mask_mismatch_contributes_nothing() {
        let fixture = chart_fixture(vec![floor().with_light_mask(0b01)], 8);
        let mut baked = LightmapChartBakedDirect::new(8);
        let light = BakedLight::directional(-Vec3::z(), Vec3::new(1.0, 1.0, 1.0)).with_light_mask(0b10);
        bake_direct_light_for_charts(
            &mut baked,
            &fixture.buffers[0],
            &fixture.scene,
            &fixture.mapping,
            &light,
            &DirectLightTracingSettings::default(),
            stream(),
        );
        assert!(baked.direct_light.iter().all(|texel| *texel == Vec3::zeros()));
        assert!(baked.surface_light.iter().all(|texel| *texel == Vec3::zeros()));
    }

    #[test]
    fn test_mixed_light_only_reaches_surface_light() {
        let fixture = chart_fixture(vec![floor()], 8);
        let mut baked = LightmapChartBakedDirect::new(8);
        bake_emission_light(&mut baked, &fixture.buffers[0], &Default::default(), &Default::default());
        let light = BakedLight::directional(-Vec3::z(), Vec3::new(1.0, 1.0, 1.0)).with_mode(LightMode::Mixed);
        bake_direct_light_for_charts(
            &mut baked,
            &fixture.buffers[0],
            &fixture.scene,
            &fixture.mapping,
            &light,
            &DirectLightTracingSettings::default(),
            stream(),
        );
        let index = interior_texel(&baked);
        assert_eq!(baked.direct_light[index], Vec3::zeros());
        assert_relative_eq!(baked.surface_light[index], Vec3::new(0.5, 0.5, 0.5), epsilon = 1e-4);
    }

    #[test]
    fn test_occluder_casts_shadow_and_glass_tints_it() {
        let blocker = procedural::quad_geometry(
            "blocker",
            Mat4::new_translation(&Vec3::new(0.0, 0.0, 1.0)) * Mat4::new_scaling(4.0),
            Material::default(),
        )
        .with_bake_lightmap(false);
        let glass = procedural::quad_geometry(
            "glass",
            Mat4::new_translation(&Vec3::new(0.0, 0.0, 1.0)) * Mat4::new_scaling(4.0),
            Material::diffuse(Vec3::new(1.0, 0.0, 0.0)).with_alpha(0.5),
        )
        .with_bake_lightmap(false);
        let light = BakedLight::directional(-Vec3::z(), Vec3::new(1.0, 1.0, 1.0));

        let shadowed = chart_fixture(vec![floor(), blocker], 8);
        let mut baked = LightmapChartBakedDirect::new(8);
        let settings = DirectLightTracingSettings::default();
        bake_direct_light_for_charts(&mut baked, &shadowed.buffers[0], &shadowed.scene, &shadowed.mapping, &light, &settings, stream());
        assert_eq!(baked.direct_light[interior_texel(&baked)], Vec3::zeros());

        let tinted = chart_fixture(vec![floor(), glass], 8);
        let mut baked = LightmapChartBakedDirect::new(8);
        bake_direct_light_for_charts(&mut baked, &tinted.buffers[0], &tinted.scene, &tinted.mapping, &light, &settings, stream());
        // Half transparent, half way between white and red
        assert_relative_eq!(baked.direct_light[interior_texel(&baked)], Vec3::new(0.5, 0.25, 0.25), epsilon = 1e-4);
    }

    #[test]
    fn test_emission_is_added_to_both_channels() {
        let emissive = procedural::quad_geometry(
            "lamp",
            Mat4::identity(),
            Material::diffuse(Vec3::new(0.2, 0.2, 0.2)).with_emission(Vec3::new(1.0, 2.0, 3.0)),
        );
        let fixture = chart_fixture(vec![emissive], 4);
        let mut baked = LightmapChartBakedDirect::new(4);
        let properties = SceneBakingProperties { emission_brightness: 2.0 };
        bake_emission_light(&mut baked, &fixture.buffers[0], &Default::default(), &properties);

        let index = interior_texel(&baked);
        assert_eq!(baked.direct_light[index], Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(baked.surface_light[index], Vec3::new(2.0, 4.0, 6.0));
        assert_relative_eq!(baked.albedo[index], Vec3::new(0.2, 0.2, 0.2), epsilon = 1e-6);
    }

    #[test]
    fn test_probe_direct_light() {
        let fixture = chart_fixture(vec![floor()], 4);
        let mut collection = LightProbeCollection::default();
        collection.add_group(&LightProbeGroup::new("probes", Mat4::identity(), vec![Vec3::new(0.0, 0.0, 1.0)]));
        let mut baked = LightProbeCollectionBakedData::new(1);

        let light = BakedLight::directional(-Vec3::z(), Vec3::new(1.0, 1.0, 1.0));
        let settings = DirectLightTracingSettings::default();
        let random = RandomStream::new(3, TracingPass::DirectProbes, 0, 0);
        bake_direct_light_for_light_probes(&mut baked, &collection, &fixture.scene, &light, &settings, random);

        let sh = baked.spherical_harmonics[0];
        assert!(sh.evaluate(&Vec3::z()).x > 0.5);
        assert!(sh.evaluate(&Vec3::z()).x > sh.evaluate(&-Vec3::z()).x);

        let realtime = light.clone().with_mode(LightMode::Realtime);
        let mut untouched = LightProbeCollectionBakedData::new(1);
        bake_direct_light_for_light_probes(&mut untouched, &collection, &fixture.scene, &realtime, &settings, random);
        assert_eq!(untouched.spherical_harmonics[0], SphericalHarmonicsDot9::default());
    }
}
