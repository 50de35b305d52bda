//! Indirect light
//!
//! Paths start at a texel or probe and bounce through the scene. Every surface a path
//! hits contributes its cached surface light, attenuated by the albedo of the surfaces
//! hit before it. Paths leaving the scene pick up the background.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;

use crate::config::IndirectLightTracingSettings;
use crate::foundation::math::{constants, utils, Vec3, Vec4};
use crate::foundation::parallel::parallel_map;
use crate::foundation::random::{random_direction, random_hemisphere_direction};
use crate::foundation::spherical_harmonics::{SphericalHarmonicsColor9, SphericalHarmonicsDot9};
use crate::geometry_buffer::LightmapChartGeometryBuffer;
use crate::raytracing::{GeometryMask, RayHit, RayIntersectionService, RayQuery, RaytracerGeometry, VertexAttribute};
use crate::scene::LightProbeCollection;
use crate::spatial::TetrahedralMesh;

use super::{LightProbeCollectionBakedData, LightmapChartBakedDirect, LightmapChartBakedIndirect, RandomStream};

/// Scene data read by indirect passes
#[derive(Clone, Copy)]
pub struct IndirectLightSources<'a> {
    /// Ray scene of the chunk vicinity
    pub scene: &'a dyn RayIntersectionService,
    /// Direct light of every lightmap the ray scene references
    pub direct_lights: &'a HashMap<u32, Arc<LightmapChartBakedDirect>>,
    /// Tetrahedral mesh over the vicinity probes
    pub light_probe_mesh: &'a TetrahedralMesh,
    /// Light of the vicinity probes
    pub light_probes: &'a LightProbeCollectionBakedData,
}

/// Stochastic alpha test: semi-transparent surfaces are hit with probability equal to alpha
fn passes_alpha_test<R: Rng + ?Sized>(
    scene: &dyn RayIntersectionService,
    hit: &RayHit,
    geometry: &RaytracerGeometry,
    rng: &mut R,
) -> bool {
    let material = &geometry.material;
    if material.opaque {
        return true;
    }

    let threshold: f32 = rng.gen();
    if material.alpha < threshold {
        return false;
    }
    let texture = material.sample_texture(&scene.interpolate(hit, VertexAttribute::Uv).xy());
    material.alpha * texture.w >= threshold
}

fn trace_path<R: Rng + ?Sized>(
    sources: &IndirectLightSources<'_>,
    origin: Vec3,
    direction: Vec3,
    background_id: u32,
    settings: &IndirectLightTracingSettings,
    rng: &mut R,
) -> Vec3 {
    let scene = sources.scene;
    let (mut position, mut direction) = (origin, direction);
    let mut incoming_factor = Vec3::repeat(1.0);
    let mut light = Vec3::zeros();

    for bounce in 0..settings.max_bounces {
        let query = RayQuery::new(position, direction, scene.max_distance(), GeometryMask::PRIMARY_LOD);
        let hit = scene.intersect(&query, &mut |hit, geometry| passes_alpha_test(scene, hit, geometry, rng));

        let Some(hit) = hit else {
            light += incoming_factor.component_mul(&scene.sample_background(background_id, &direction));
            break;
        };
        if direction.dot(&hit.geometric_normal) > 0.0 {
            break;
        }

        let geometry = &scene.geometries()[hit.geometry_id as usize];
        let Some(direct) = geometry.lightmap_index.and_then(|index| sources.direct_lights.get(&index)) else {
            break;
        };
        let location = direct.nearest_location(&scene.interpolate(&hit, VertexAttribute::LightmapUv).xy());
        light += incoming_factor.component_mul(&direct.surface_light[location]);

        if bounce + 1 < settings.max_bounces {
            incoming_factor = incoming_factor.component_mul(&direct.albedo[location]);

            let hit_position = query.origin + query.direction * hit.t;
            let normal = hit.geometric_normal.normalize();
            position = hit_position
                + utils::sign(&normal) * (settings.scaled_position_bounce_bias * utils::bias_scale(&hit_position))
                + normal * settings.constant_position_bounce_bias;
            direction = random_hemisphere_direction(rng, &normal);
        }
    }
    light
}

/// Accumulate indirect light into a chart.
///
/// Texels of geometry with several LODs take their light from the probe mesh instead,
/// since their surface may differ from what other texels see. Does nothing when
/// bounces are disabled.
pub fn bake_indirect_light_for_charts(
    baked: &mut LightmapChartBakedIndirect,
    buffer: &LightmapChartGeometryBuffer,
    sources: &IndirectLightSources<'_>,
    geometry_buffer_to_raytracer: &[u32],
    settings: &IndirectLightTracingSettings,
    random: RandomStream,
) {
    if settings.max_bounces == 0 {
        return;
    }

    let scene = sources.scene;
    let contributions = parallel_map(buffer.num_texels(), settings.num_tasks, |index| {
        if buffer.is_empty_texel(index) {
            return None;
        }
        let raytracer_id = *geometry_buffer_to_raytracer.get(buffer.geometry_ids[index] as usize)?;
        let current_geometry = scene.geometries().get(raytracer_id as usize)?;

        let position = buffer.positions[index];
        if current_geometry.num_lods > 1 {
            let mut hint = 0;
            let sh = sources
                .light_probe_mesh
                .sample(&sources.light_probes.spherical_harmonics, &position, &mut hint);
            let light = utils::max_zero(&sh.evaluate(&buffer.smooth_normals[index]));
            return Some(Vec4::new(light.x, light.y, light.z, 1.0));
        }

        let face_normal = buffer.face_normals[index];
        let mut rng = random.rng(index);
        let mut light_sum = Vec3::zeros();
        for _ in 0..settings.max_samples {
            let direction = random_hemisphere_direction(&mut rng, &face_normal);
            light_sum += trace_path(sources, position, direction, buffer.background_ids[index], settings, &mut rng);
        }
        Some(Vec4::new(light_sum.x, light_sum.y, light_sum.z, settings.max_samples as f32))
    });

    for (texel, contribution) in baked.light.iter_mut().zip(contributions) {
        if let Some(contribution) = contribution {
            *texel += contribution;
        }
    }
}

/// Add indirect light to every probe. Does nothing when bounces are disabled.
pub fn bake_indirect_light_for_light_probes(
    baked: &mut LightProbeCollectionBakedData,
    collection: &LightProbeCollection,
    sources: &IndirectLightSources<'_>,
    settings: &IndirectLightTracingSettings,
    random: RandomStream,
) {
    if settings.max_bounces == 0 || settings.max_samples == 0 {
        return;
    }

    let contributions = parallel_map(collection.num_probes(), settings.num_tasks, |index| {
        let position = collection.world_positions[index];
        let mut rng = random.rng(index);
        let mut light_sum = SphericalHarmonicsColor9::default();
        for _ in 0..settings.max_samples {
            let direction = random_direction(&mut rng);
            let light = trace_path(sources, position, direction, collection.background_ids[index], settings, &mut rng);
            light_sum += SphericalHarmonicsColor9::from_direction(&direction, &light);
        }
        SphericalHarmonicsDot9::from(light_sum * (4.0 * constants::PI / settings.max_samples as f32))
    });

    for (sh, contribution) in baked.spherical_harmonics.iter_mut().zip(contributions) {
        *sh += contribution;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectLightTracingSettings, EmissionLightTracingSettings, SceneBakingProperties};
    use crate::foundation::math::{Mat4, Vec2};
    use crate::light_tracer::tests::{chart_fixture, ChartFixture};
    use crate::light_tracer::{bake_direct_light_for_charts, bake_emission_light, TracingPass};
    use crate::raytracing::{create_raytracer_scene, RaytracingGeometrySource};
    use crate::scene::{procedural, BakedLight, BakedSceneBackground, GeometryPart, LightProbeGroup, Material, StaticGeometry};
    use approx::assert_relative_eq;

    fn direct_lights(fixture: &ChartFixture, lights: &[BakedLight]) -> HashMap<u32, Arc<LightmapChartBakedDirect>> {
        fixture
            .buffers
            .iter()
            .map(|buffer| {
                let mut direct = LightmapChartBakedDirect::new(buffer.size);
                bake_emission_light(&mut direct, buffer, &EmissionLightTracingSettings::default(), &SceneBakingProperties::default());
                for (light_index, light) in lights.iter().enumerate() {
                    let random = RandomStream::new(1, TracingPass::DirectCharts, u64::from(buffer.index), light_index as u64);
                    bake_direct_light_for_charts(
                        &mut direct,
                        buffer,
                        &fixture.scene,
                        &fixture.mapping,
                        light,
                        &DirectLightTracingSettings::default(),
                        random,
                    );
                }
                (buffer.index, Arc::new(direct))
            })
            .collect()
    }

    fn bake_chart(
        fixture: &ChartFixture,
        chart: usize,
        direct: &HashMap<u32, Arc<LightmapChartBakedDirect>>,
        settings: &IndirectLightTracingSettings,
    ) -> LightmapChartBakedIndirect {
        let mesh = TetrahedralMesh::default();
        let probes = LightProbeCollectionBakedData::default();
        let sources = IndirectLightSources {
            scene: &fixture.scene,
            direct_lights: direct,
            light_probe_mesh: &mesh,
            light_probes: &probes,
        };
        let buffer = &fixture.buffers[chart];
        let mut indirect = LightmapChartBakedIndirect::new(buffer.size);
        let random = RandomStream::new(1, TracingPass::IndirectCharts, u64::from(buffer.index), 0);
        bake_indirect_light_for_charts(&mut indirect, buffer, &sources, &fixture.mapping, settings, random);
        assert!(indirect.normalize_light());
        indirect
    }

    fn texel_luminance(indirect: &LightmapChartBakedIndirect, uv: Vec2) -> f32 {
        let index = crate::geometry_buffer::nearest_texel(indirect.lightmap_size, &uv);
        utils::luminance(&indirect.light[index].xyz())
    }

    #[test]
    fn test_emissive_ceiling_lights_the_floor() {
        let fixture = chart_fixture(procedural::box_room(4.0, Vec3::new(4.0, 4.0, 4.0)), 8);
        assert_eq!(fixture.geometries[0].name, "floor");
        let direct = direct_lights(&fixture, &[]);

        let settings = IndirectLightTracingSettings::new(16, 1);
        let floor = bake_chart(&fixture, 0, &direct, &settings);
        assert!(texel_luminance(&floor, Vec2::new(0.3, 0.6)) > 0.0);
        assert!(floor.light.iter().all(|texel| texel.xyz().iter().all(|c| c.is_finite() && *c >= 0.0)));
    }

    #[test]
    fn test_dark_scene_stays_dark() {
        let fixture = chart_fixture(procedural::box_room(4.0, Vec3::zeros()), 8);
        let direct = direct_lights(&fixture, &[]);
        assert!(direct.values().all(|chart| chart.direct_light.iter().all(|texel| *texel == Vec3::zeros())));

        let floor = bake_chart(&fixture, 0, &direct, &IndirectLightTracingSettings::new(8, 3));
        assert!(floor.light.iter().all(|texel| texel.xyz() == Vec3::zeros()));
    }

    #[test]
    fn test_zero_bounces_is_a_no_op() {
        let fixture = chart_fixture(procedural::box_room(4.0, Vec3::new(4.0, 4.0, 4.0)), 8);
        let direct = direct_lights(&fixture, &[]);
        let floor = bake_chart(&fixture, 0, &direct, &IndirectLightTracingSettings::new(8, 0));
        assert!(floor.light.iter().all(|texel| *texel == Vec4::zeros()));
    }

    #[test]
    fn test_open_sky_sees_background() {
        let quad = procedural::quad_geometry("ground", Mat4::new_scaling(2.0), Material::default());
        let mut fixture = chart_fixture(vec![quad], 8);
        let sources: Vec<_> = fixture
            .geometries
            .iter()
            .map(|geometry| RaytracingGeometrySource { geometry, direct_shadow_only: false })
            .collect();
        fixture.scene = create_raytracer_scene(&sources, vec![BakedSceneBackground::Solid(Vec3::new(0.5, 0.5, 0.5))]);

        let direct = direct_lights(&fixture, &[]);
        let ground = bake_chart(&fixture, 0, &direct, &IndirectLightTracingSettings::new(4, 2));
        let index = crate::geometry_buffer::nearest_texel(8, &Vec2::new(0.3, 0.6));
        assert_relative_eq!(ground.light[index].xyz(), Vec3::new(0.5, 0.5, 0.5), epsilon = 1e-5);
    }

    #[test]
    fn test_multi_lod_texels_read_probes() {
        let lod = procedural::quad_lod(Vec3::new(-0.5, -0.5, 0.0), Vec3::x(), Vec3::y());
        let geometry = StaticGeometry::new("lods", Mat4::identity())
            .with_part(GeometryPart::new(lod.clone(), Material::default()).with_lod(lod));
        let fixture = chart_fixture(vec![geometry], 4);
        let direct = direct_lights(&fixture, &[]);

        let corners = vec![
            Vec3::new(-3.0, -3.0, -1.0),
            Vec3::new(3.0, -3.0, -1.0),
            Vec3::new(0.0, 3.0, -1.0),
            Vec3::new(0.0, 0.0, 3.0),
        ];
        let mut collection = LightProbeCollection::default();
        collection.add_group(&LightProbeGroup::new("probes", Mat4::identity(), corners));
        let mesh = TetrahedralMesh::new(&collection.world_positions);
        let mut probes = LightProbeCollectionBakedData::new(collection.num_probes());
        for sh in &mut probes.spherical_harmonics {
            sh.coefficients[0] = Vec3::new(1.0, 2.0, 3.0);
        }

        let sources = IndirectLightSources {
            scene: &fixture.scene,
            direct_lights: &direct,
            light_probe_mesh: &mesh,
            light_probes: &probes,
        };
        let buffer = &fixture.buffers[0];
        let mut indirect = LightmapChartBakedIndirect::new(buffer.size);
        let random = RandomStream::new(1, TracingPass::IndirectCharts, 0, 0);
        let settings = IndirectLightTracingSettings::new(4, 2);
        bake_indirect_light_for_charts(&mut indirect, buffer, &sources, &fixture.mapping, &settings, random);

        let index = crate::geometry_buffer::nearest_texel(4, &Vec2::new(0.3, 0.6));
        let expected = probes.spherical_harmonics[0].evaluate(&Vec3::z());
        assert_relative_eq!(indirect.light[index], Vec4::new(expected.x, expected.y, expected.z, 1.0), epsilon = 1e-3);
    }

    #[test]
    fn test_probe_inside_lit_room() {
        let fixture = chart_fixture(procedural::box_room(4.0, Vec3::new(4.0, 4.0, 4.0)), 8);
        let direct = direct_lights(&fixture, &[]);
        let mut collection = LightProbeCollection::default();
        collection.add_group(&LightProbeGroup::new("probes", Mat4::identity(), vec![Vec3::new(0.1, -0.2, 0.3)]));

        let mesh = TetrahedralMesh::default();
        let empty = LightProbeCollectionBakedData::default();
        let sources = IndirectLightSources {
            scene: &fixture.scene,
            direct_lights: &direct,
            light_probe_mesh: &mesh,
            light_probes: &empty,
        };
        let mut probes = LightProbeCollectionBakedData::new(1);
        let random = RandomStream::new(1, TracingPass::IndirectProbes, 0, 0);
        bake_indirect_light_for_light_probes(&mut probes, &collection, &sources, &IndirectLightTracingSettings::new(64, 1), random);

        // Ceiling is at +Y
        let sh = probes.spherical_harmonics[0];
        assert!(sh.evaluate(&Vec3::y()).x > sh.evaluate(&-Vec3::y()).x);
        assert!(sh.ambient().x > 0.0);
    }
}
