//! Lightmap seams
//!
//! A seam is a mesh edge that appears twice in lightmap UV space: both copies share
//! positions and normals in 3D but were unwrapped to different places in the chart.
//! Texels along both copies must end up with matching light.

use std::collections::HashMap;

use crate::foundation::math::{constants, IntVec3, Vec2, Vec3, Vec4};
use crate::scene::{GeometryLod, StaticGeometry};
use crate::spatial::AABB;

/// Pair of UV segments that must match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightmapSeam {
    /// Segment on one side
    pub positions: [Vec2; 2],
    /// Segment on the other side
    pub other_positions: [Vec2; 2],
}

impl LightmapSeam {
    /// Seam with both segments mapped by an `xy` scale, `zw` offset transform
    pub fn transformed(&self, scale_offset: &Vec4) -> Self {
        let map = |uv: &Vec2| Vec2::new(uv.x * scale_offset.x + scale_offset.z, uv.y * scale_offset.y + scale_offset.w);
        Self {
            positions: [map(&self.positions[0]), map(&self.positions[1])],
            other_positions: [map(&self.other_positions[0]), map(&self.other_positions[1])],
        }
    }
}

fn ordered_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

/// Seams of every part of an object, in object lightmap UV space.
///
/// When the object declares shared lightmap UVs only the first LOD of each part is scanned.
pub fn collect_geometry_seams(geometry: &StaticGeometry) -> Vec<LightmapSeam> {
    let mut bounds = AABB::empty();
    for lod in geometry.parts.iter().flat_map(|part| part.lods.iter()) {
        for vertex in &lod.vertices {
            bounds.merge_point(&vertex.position);
        }
    }
    if !bounds.is_valid() {
        return Vec::new();
    }

    let mut seams = Vec::new();
    for part in &geometry.parts {
        for lod in &part.lods {
            collect_lod_seams(lod, &bounds, &mut seams);
            if geometry.shared_lightmap_uv {
                break;
            }
        }
    }
    seams
}

fn collect_lod_seams(lod: &GeometryLod, bounds: &AABB, seams: &mut Vec<LightmapSeam>) {
    let epsilon_squared = constants::LARGE_EPSILON * constants::LARGE_EPSILON;
    let vertices = &lod.vertices;

    let hash_step = (bounds.size() / constants::LARGE_VALUE).map(|step| step.max(constants::LARGE_EPSILON));
    let compute_hash = |position: &Vec3| {
        let cell = (position - bounds.min).component_div(&hash_step);
        IntVec3::new(cell.x.floor() as i32, cell.y.floor() as i32, cell.z.floor() as i32)
    };

    let mut edges: Vec<(u32, u32)> = lod
        .indices
        .chunks_exact(3)
        .flat_map(|face| {
            [
                ordered_edge(face[0], face[1]),
                ordered_edge(face[1], face[2]),
                ordered_edge(face[2], face[0]),
            ]
        })
        .collect();
    edges.sort_unstable();
    edges.dedup();

    let mut edges_hash: HashMap<IntVec3, Vec<(u32, u32)>> = HashMap::new();
    for edge in &edges {
        for index in [edge.0, edge.1] {
            let hash = compute_hash(&vertices[index as usize].position);
            edges_hash.entry(hash).or_default().push(*edge);
        }
    }

    let mut candidates = Vec::new();
    for edge in &edges {
        candidates.clear();
        for index in [edge.0, edge.1] {
            let hash = compute_hash(&vertices[index as usize].position);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(cell) = edges_hash.get(&(hash + IntVec3::new(dx, dy, dz))) {
                            candidates.extend_from_slice(cell);
                        }
                    }
                }
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        let e0 = &vertices[edge.0 as usize];
        let e1 = &vertices[edge.1 as usize];

        for &candidate in &candidates {
            if candidate == *edge {
                continue;
            }

            let (mut c0, mut c1) = (&vertices[candidate.0 as usize], &vertices[candidate.1 as usize]);
            if (c0.position - e1.position).norm_squared() < epsilon_squared {
                std::mem::swap(&mut c0, &mut c1);
            }

            let same_geometry = (e0.position - c0.position).norm_squared() < epsilon_squared
                && (e1.position - c1.position).norm_squared() < epsilon_squared
                && (e0.normal - c0.normal).norm_squared() < epsilon_squared
                && (e1.normal - c1.normal).norm_squared() < epsilon_squared;
            if !same_geometry {
                continue;
            }

            let same_uv0 = (e0.lightmap_uv - c0.lightmap_uv).norm_squared() < epsilon_squared;
            let same_uv1 = (e1.lightmap_uv - c1.lightmap_uv).norm_squared() < epsilon_squared;
            if same_uv0 && same_uv1 {
                continue;
            }

            // Both candidate ends on the line through the edge
            let cross = |a: Vec2, b: Vec2| a.x * b.y - a.y * b.x;
            let edge_delta = e1.lightmap_uv - e0.lightmap_uv;
            let collinear0 = cross(edge_delta, c0.lightmap_uv - e0.lightmap_uv).powi(2) < epsilon_squared;
            let collinear1 = cross(edge_delta, c1.lightmap_uv - e0.lightmap_uv).powi(2) < epsilon_squared;
            if collinear0 && collinear1 {
                continue;
            }

            seams.push(LightmapSeam {
                positions: [e0.lightmap_uv, e1.lightmap_uv],
                other_positions: [c0.lightmap_uv, c1.lightmap_uv],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::scene::{GeometryPart, Material, ModelVertex};

    /// Two triangles sharing an edge in 3D, unwrapped to separate UV islands
    fn split_quad() -> GeometryLod {
        let normal = Vec3::z();
        let vertex = |x: f32, y: f32, u: f32, v: f32| ModelVertex::new(Vec3::new(x, y, 0.0), normal, Vec2::zeros(), Vec2::new(u, v));
        GeometryLod::new(
            vec![
                vertex(0.0, 0.0, 0.0, 0.0),
                vertex(1.0, 0.0, 0.4, 0.0),
                vertex(1.0, 1.0, 0.4, 0.4),
                vertex(0.0, 0.0, 0.6, 0.0),
                vertex(1.0, 1.0, 1.0, 0.4),
                vertex(0.0, 1.0, 0.6, 0.4),
            ],
            vec![0, 1, 2, 3, 4, 5],
        )
    }

    #[test]
    fn test_split_edge_is_a_seam() {
        let geometry = StaticGeometry::new("quad", Mat4::identity()).with_part(GeometryPart::new(split_quad(), Material::default()));
        let seams = collect_geometry_seams(&geometry);

        // The diagonal is found once from each side
        assert_eq!(seams.len(), 2);
        let seam = seams
            .iter()
            .find(|seam| seam.positions[0] == Vec2::new(0.0, 0.0))
            .unwrap();
        assert_eq!(seam.positions[1], Vec2::new(0.4, 0.4));
        assert_eq!(seam.other_positions, [Vec2::new(0.6, 0.0), Vec2::new(1.0, 0.4)]);
    }

    #[test]
    fn test_welded_quad_has_no_seams() {
        let lod = crate::scene::procedural::quad_lod(Vec3::zeros(), Vec3::x(), Vec3::y());
        let geometry = StaticGeometry::new("quad", Mat4::identity()).with_part(GeometryPart::new(lod, Material::default()));
        assert!(collect_geometry_seams(&geometry).is_empty());
    }

    #[test]
    fn test_shared_uv_scans_first_lod_only() {
        let part = GeometryPart::new(split_quad(), Material::default()).with_lod(split_quad());
        let mut geometry = StaticGeometry::new("quad", Mat4::identity()).with_part(part);
        assert_eq!(collect_geometry_seams(&geometry).len(), 4);
        geometry.shared_lightmap_uv = true;
        assert_eq!(collect_geometry_seams(&geometry).len(), 2);
    }

    #[test]
    fn test_transformed_seam() {
        let seam = LightmapSeam {
            positions: [Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)],
            other_positions: [Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
        };
        let transformed = seam.transformed(&Vec4::new(0.5, 0.25, 0.5, 0.0));
        assert_eq!(transformed.positions[1], Vec2::new(1.0, 0.25));
        assert_eq!(transformed.other_positions[0], Vec2::new(1.0, 0.0));
    }
}
