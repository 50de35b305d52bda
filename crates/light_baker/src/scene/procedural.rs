//! Procedural scene content
//!
//! Quads and a closed box room, used by the demo application and by tests.

use crate::foundation::math::{Mat4, Vec2, Vec3};

use super::{GeometryLod, GeometryPart, Material, ModelVertex, StaticGeometry};

/// Quad spanned by `u` and `v` from `origin`, facing `u × v`.
///
/// Lightmap and material UVs both cover the unit square.
pub fn quad_lod(origin: Vec3, u: Vec3, v: Vec3) -> GeometryLod {
    let normal = u.cross(&v).normalize();
    let corners = [
        (origin, Vec2::new(0.0, 0.0)),
        (origin + u, Vec2::new(1.0, 0.0)),
        (origin + u + v, Vec2::new(1.0, 1.0)),
        (origin + v, Vec2::new(0.0, 1.0)),
    ];
    let vertices = corners
        .iter()
        .map(|(position, uv)| ModelVertex::new(*position, normal, *uv, *uv))
        .collect();
    GeometryLod::new(vertices, vec![0, 1, 2, 0, 2, 3])
}

/// Unit quad in the XY plane centered at the origin, facing +Z
pub fn quad_geometry(name: &str, transform: Mat4, material: Material) -> StaticGeometry {
    let lod = quad_lod(Vec3::new(-0.5, -0.5, 0.0), Vec3::x(), Vec3::y());
    StaticGeometry::new(name, transform).with_part(GeometryPart::new(lod, material))
}

/// Closed cube room of edge `size` centered at the origin with walls facing inward.
///
/// The ceiling emits `ceiling_emission`. The left wall is red, the right wall green and
/// the rest white.
pub fn box_room(size: f32, ceiling_emission: Vec3) -> Vec<StaticGeometry> {
    let h = size * 0.5;
    let (x, y, z) = (Vec3::x() * size, Vec3::y() * size, Vec3::z() * size);
    let white = Material::diffuse(Vec3::new(0.75, 0.75, 0.75));

    let walls = [
        ("floor", Vec3::new(-h, -h, -h), z, x, white.clone()),
        ("ceiling", Vec3::new(-h, h, -h), x, z, white.clone().with_emission(ceiling_emission)),
        ("left", Vec3::new(-h, -h, -h), y, z, Material::diffuse(Vec3::new(0.75, 0.1, 0.1))),
        ("right", Vec3::new(h, -h, -h), z, y, Material::diffuse(Vec3::new(0.1, 0.75, 0.1))),
        ("back", Vec3::new(-h, -h, -h), x, y, white.clone()),
        ("front", Vec3::new(-h, -h, h), y, x, white),
    ];

    walls
        .into_iter()
        .map(|(name, origin, u, v, material)| {
            StaticGeometry::new(name, Mat4::identity()).with_part(GeometryPart::new(quad_lod(origin, u, v), material))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quad_winding_matches_normal() {
        let lod = quad_lod(Vec3::zeros(), Vec3::z(), Vec3::x());
        let [i0, i1, i2] = lod.triangle(1);
        let (p0, p1, p2) = (lod.vertices[i0].position, lod.vertices[i1].position, lod.vertices[i2].position);
        let face_normal = (p1 - p0).cross(&(p2 - p0)).normalize();
        assert_relative_eq!(face_normal, Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(lod.vertices[0].normal, Vec3::y(), epsilon = 1e-6);
    }

    #[test]
    fn test_box_room_walls_face_inward() {
        let room = box_room(2.0, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(room.len(), 6);
        for wall in &room {
            let vertex = wall.parts[0].lods[0].vertices[0];
            let center = wall.world_bounding_box().center();
            // Inward normals point back toward the room center
            assert!(vertex.normal.dot(&-center) > 0.0, "{} faces outward", wall.name);
        }
    }
}
