//! Tetrahedral mesh over light probe positions
//!
//! The probe positions are tetrahedralized with incremental Bowyer-Watson insertion
//! inside an enclosing super-mesh. The convex hull of the result is then extruded
//! outward along smoothed vertex normals into infinite "outer" cells, so every point in
//! space falls into exactly one cell and can be interpolated from at most four probes.

use serde::{Deserialize, Serialize};

use crate::foundation::logging::{error, warn};
use crate::foundation::math::{constants, DVec3, Mat3, Mat3x4, Vec3, Vec4};
use crate::foundation::spherical_harmonics::SphericalHarmonicsDot9;

use super::AABB;

/// Missing neighbor or index
pub const NONE: u32 = u32::MAX;

/// Fourth index of an outer cell whose extrusion equation is cubic
pub const INFINITY3: u32 = u32::MAX;

/// Fourth index of an outer cell whose extrusion equation degenerates to quadratic
pub const INFINITY2: u32 = u32::MAX - 1;

const NUM_SUPER_MESH_VERTICES: u32 = 8;

/// Tetrahedron or outer cell of the mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tetrahedron {
    /// Vertex indices. Outer cells store an infinity marker in the last slot.
    pub indices: [u32; 4],
    /// Neighbor across the face opposite to each vertex
    pub neighbors: [u32; 4],
    /// Inner cells: inverse edge matrix. Outer cells: extrusion polynomial coefficients.
    pub matrix: Mat3x4,
}

impl Default for Tetrahedron {
    fn default() -> Self {
        Self {
            indices: [0; 4],
            neighbors: [NONE; 4],
            matrix: Mat3x4::zeros(),
        }
    }
}

impl Tetrahedron {
    fn calculate_inner_matrix(&mut self, vertices: &[Vec3]) {
        let p0 = vertices[self.indices[0] as usize];
        let edges = Mat3::from_columns(&[
            vertices[self.indices[1] as usize] - p0,
            vertices[self.indices[2] as usize] - p0,
            vertices[self.indices[3] as usize] - p0,
        ]);
        let inverse = edges.try_inverse().unwrap_or_else(Mat3::zeros);
        self.matrix = Mat3x4::from_columns(&[
            inverse.column(0).into_owned(),
            inverse.column(1).into_owned(),
            inverse.column(2).into_owned(),
            Vec3::zeros(),
        ]);
    }

    fn transform(&self, value: &Vec3, w: f32) -> Vec3 {
        self.matrix * Vec4::new(value.x, value.y, value.z, w)
    }

    fn neighbor_face_index(&self, tet_index: u32) -> Option<usize> {
        self.neighbors.iter().position(|neighbor| *neighbor == tet_index)
    }

    fn triangle_face(&self, face_index: usize, tet_index: u32, tet_face: u32) -> SurfaceTriangle {
        let mut indices = [0; 3];
        let mut next = 0;
        for (i, index) in self.indices.iter().enumerate() {
            if i != face_index {
                indices[next] = *index;
                next += 1;
            }
        }
        SurfaceTriangle {
            indices,
            unused_index: self.indices[face_index],
            tet_index,
            tet_face,
            neighbors: [NONE; 3],
        }
    }
}

/// Triangle of a closed surface made of tetrahedron faces
#[derive(Debug, Clone, Copy)]
struct SurfaceTriangle {
    indices: [u32; 3],
    /// Vertex of the source tetrahedron not on this face
    unused_index: u32,
    /// Tetrahedron on the other side of the face
    tet_index: u32,
    /// Face index within `tet_index`
    tet_face: u32,
    /// Adjacent triangle across the edge opposite to each vertex
    neighbors: [u32; 3],
}

impl SurfaceTriangle {
    /// Orient the triangle so its normal points away from the unused vertex
    fn normalize(&mut self, vertices: &[Vec3]) {
        let p0 = vertices[self.indices[0] as usize];
        let p1 = vertices[self.indices[1] as usize];
        let p2 = vertices[self.indices[2] as usize];
        let unused = vertices[self.unused_index as usize];
        let normal = (p1 - p0).cross(&(p2 - p0));
        if normal.dot(&(unused - p0)) > 0.0 {
            self.indices.swap(1, 2);
            self.neighbors.swap(1, 2);
        }
    }

    /// Ratio of the longest side to the shortest one
    fn silver_score(&self, vertices: &[Vec3]) -> f32 {
        let p = self.indices.map(|index| vertices[index as usize]);
        let sides = [(p[1] - p[0]).norm(), (p[2] - p[1]).norm(), (p[0] - p[2]).norm()];
        let longest = sides.iter().copied().fold(0.0f32, f32::max);
        let shortest = sides.iter().copied().fold(f32::INFINITY, f32::min);
        if shortest > constants::EPSILON { longest / shortest } else { constants::LARGE_VALUE }
    }
}

#[derive(Debug, Clone, Copy)]
struct SurfaceEdge {
    indices: [u32; 2],
    face_index: u32,
    edge_index: u32,
}

#[derive(Debug, Default)]
struct Surface {
    faces: Vec<SurfaceTriangle>,
}

impl Surface {
    fn clear(&mut self) {
        self.faces.clear();
    }

    /// Link every triangle edge with its twin, fails unless each edge has exactly one twin
    fn calculate_adjacency(&mut self) -> bool {
        let mut edges = Vec::with_capacity(self.faces.len() * 3);
        for (face_index, face) in self.faces.iter().enumerate() {
            for edge_index in 0..3 {
                let i0 = face.indices[(edge_index + 1) % 3];
                let i1 = face.indices[(edge_index + 2) % 3];
                edges.push(SurfaceEdge {
                    indices: [i0.min(i1), i0.max(i1)],
                    face_index: face_index as u32,
                    edge_index: edge_index as u32,
                });
            }
        }

        edges.sort_by_key(|edge| edge.indices);
        if edges.len() % 2 != 0 {
            return false;
        }

        for pair in edges.chunks_exact(2) {
            let (first, second) = (pair[0], pair[1]);
            if first.indices != second.indices {
                return false;
            }

            let first_link = self.faces[first.face_index as usize].neighbors[first.edge_index as usize];
            let second_link = self.faces[second.face_index as usize].neighbors[second.edge_index as usize];
            if first_link != NONE || second_link != NONE {
                return false;
            }

            self.faces[first.face_index as usize].neighbors[first.edge_index as usize] = second.face_index;
            self.faces[second.face_index as usize].neighbors[second.edge_index as usize] = first.face_index;
        }
        true
    }

    fn is_closed(&self) -> bool {
        self.faces.iter().all(|face| face.neighbors.iter().all(|neighbor| *neighbor != NONE))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Sphere {
    center: DVec3,
    radius: f64,
}

/// Transient state of the Delaunay insertion
struct DelaunayContext {
    circumspheres: Vec<Sphere>,
    removed: Vec<bool>,
}

impl DelaunayContext {
    fn is_inside_circumsphere(&self, tet_index: u32, position: &Vec3) -> bool {
        let sphere = &self.circumspheres[tet_index as usize];
        (sphere.center - position.cast::<f64>()).norm() - sphere.radius < f64::from(constants::LARGE_EPSILON)
    }
}

/// Edge of the mesh surface with the worst score of the faces it belongs to
#[derive(Debug, Clone, Copy)]
struct ScoredEdge {
    indices: [u32; 2],
    silver_score: f32,
    tet_index: u32,
    cardinality: u32,
}

fn smallest_weight_index(weights: &Vec4) -> usize {
    if weights.x < weights.y && weights.x < weights.z && weights.x < weights.w {
        0
    } else if weights.y < weights.z && weights.y < weights.w {
        1
    } else if weights.z < weights.w {
        2
    } else {
        3
    }
}

fn all_non_negative(weights: &Vec4) -> bool {
    weights.iter().all(|weight| *weight >= 0.0)
}

/// Tetrahedralization of probe positions with outer hull cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetrahedralMesh {
    /// Probe positions followed by the eight super-mesh corners
    pub vertices: Vec<Vec3>,
    /// Inner tetrahedrons followed by outer cells
    pub tetrahedrons: Vec<Tetrahedron>,
    /// Outward hull normal per vertex, zero for interior vertices
    pub hull_normals: Vec<Vec3>,
    /// Number of inner tetrahedrons
    pub num_inner_tetrahedrons: usize,
    /// Positions that could not be inserted
    pub ignored_vertices: Vec<u32>,
}

impl TetrahedralMesh {
    /// Build the mesh for a set of positions
    pub fn new(positions: &[Vec3]) -> Self {
        let mut mesh = Self::default();
        mesh.define(positions);
        mesh
    }

    /// Rebuild the mesh for a set of positions
    pub fn define(&mut self, positions: &[Vec3]) {
        *self = Self::default();
        if positions.is_empty() {
            return;
        }

        let bounds = AABB::from_points(positions).padded(1.0);
        self.initialize_super_mesh(&bounds);
        self.build_tetrahedrons(positions);
    }

    /// Whether the mesh has no cells
    pub fn is_empty(&self) -> bool {
        self.tetrahedrons.is_empty()
    }

    /// Interpolate baked probe data at a position.
    ///
    /// `hint` is the cell to start the search from and receives the cell found, so
    /// coherent queries stay cheap.
    pub fn sample(&self, data: &[SphericalHarmonicsDot9], position: &Vec3, hint: &mut usize) -> SphericalHarmonicsDot9 {
        let weights = self.interpolation_factors(position, hint);
        let mut result = SphericalHarmonicsDot9::default();
        let Some(tetrahedron) = self.tetrahedrons.get(*hint) else {
            return result;
        };

        for (index, weight) in tetrahedron.indices.iter().zip(weights.iter()) {
            if *weight != 0.0 {
                if let Some(value) = data.get(*index as usize) {
                    result += *value * *weight;
                }
            }
        }
        result
    }

    /// Barycentric weights of a position within the cell that contains it
    pub fn interpolation_factors(&self, position: &Vec3, hint: &mut usize) -> Vec4 {
        if self.tetrahedrons.is_empty() {
            return Vec4::zeros();
        }

        let max_iterations = self.tetrahedrons.len();
        if *hint >= max_iterations {
            *hint = 0;
        }

        for _ in 0..max_iterations {
            let weights = self.barycentric_coords(*hint, position);
            if all_non_negative(&weights) {
                return weights;
            }

            let next = self.tetrahedrons[*hint].neighbors[smallest_weight_index(&weights)];
            if next == NONE {
                return weights;
            }
            *hint = next as usize;
        }
        self.barycentric_coords(*hint, position)
    }

    fn barycentric_coords(&self, tet_index: usize, position: &Vec3) -> Vec4 {
        if tet_index < self.num_inner_tetrahedrons {
            self.inner_barycentric_coords(tet_index, position)
        } else {
            self.outer_barycentric_coords(tet_index, position)
        }
    }

    fn inner_barycentric_coords(&self, tet_index: usize, position: &Vec3) -> Vec4 {
        let tetrahedron = &self.tetrahedrons[tet_index];
        let base = self.vertices[tetrahedron.indices[0] as usize];
        let coords = tetrahedron.transform(&(position - base), 0.0);
        Vec4::new(1.0 - coords.x - coords.y - coords.z, coords.x, coords.y, coords.z)
    }

    fn outer_barycentric_coords(&self, tet_index: usize, position: &Vec3) -> Vec4 {
        let tetrahedron = &self.tetrahedrons[tet_index];
        let [i1, i2, i3, marker] = tetrahedron.indices;
        let p1 = self.vertices[i1 as usize];
        let p2 = self.vertices[i2 as usize];
        let p3 = self.vertices[i3 as usize];
        let normal = (p2 - p1).cross(&(p3 - p1));

        // Inside the hull, point back at the inner neighbor
        if normal.dot(&(position - p1)) < 0.0 {
            return Vec4::new(0.0, 0.0, 0.0, -1.0);
        }

        let poly = tetrahedron.transform(position, 1.0);
        let t = if marker == INFINITY3 { solve_cubic(&poly) } else { solve_quadratic(&poly) };

        let t1 = p1 + self.hull_normals[i1 as usize] * t;
        let t2 = p2 + self.hull_normals[i2 as usize] * t;
        let t3 = p3 + self.hull_normals[i3 as usize] * t;
        let coords = triangle_barycentric_coords(position, &t1, &t2, &t3);
        Vec4::new(coords.x, coords.y, coords.z, 0.0)
    }

    fn initialize_super_mesh(&mut self, bounds: &AABB) {
        const OFFSETS: [[f32; 3]; 8] = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        // Four corner tetrahedrons around a central one
        const INDICES: [[u32; 4]; 5] = [
            [0, 1, 2, 4],
            [3, 1, 2, 7],
            [5, 1, 4, 7],
            [6, 2, 4, 7],
            [1, 2, 4, 7],
        ];
        const NEIGHBORS: [[u32; 4]; 5] = [
            [4, NONE, NONE, NONE],
            [4, NONE, NONE, NONE],
            [4, NONE, NONE, NONE],
            [4, NONE, NONE, NONE],
            [3, 2, 1, 0],
        ];

        let size = bounds.size();
        self.vertices = OFFSETS
            .iter()
            .map(|offset| bounds.min + size.component_mul(&Vec3::new(offset[0], offset[1], offset[2])))
            .collect();

        self.tetrahedrons = INDICES
            .iter()
            .zip(NEIGHBORS.iter())
            .map(|(indices, neighbors)| {
                let mut tetrahedron = Tetrahedron { indices: *indices, neighbors: *neighbors, ..Default::default() };
                tetrahedron.calculate_inner_matrix(&self.vertices);
                tetrahedron
            })
            .collect();
    }

    fn build_tetrahedrons(&mut self, positions: &[Vec3]) {
        let mut ctx = DelaunayContext {
            circumspheres: (0..self.tetrahedrons.len()).map(|index| self.circumsphere(index)).collect(),
            removed: vec![false; self.tetrahedrons.len()],
        };

        let start_vertex = self.vertices.len() as u32;
        self.vertices.extend_from_slice(positions);
        let mut queue: Vec<u32> = (start_vertex..self.vertices.len() as u32).collect();

        let mut hole = Surface::default();
        let mut removed_tetrahedrons = Vec::new();
        let mut postponed = Vec::new();
        while !queue.is_empty() {
            postponed.clear();
            for &vertex_index in &queue {
                let position = self.vertices[vertex_index as usize];
                if !self.find_and_remove_intersected(&mut ctx, &position, &mut hole, &mut removed_tetrahedrons) {
                    postponed.push(vertex_index);
                    continue;
                }

                self.disconnect_removed_tetrahedrons(&removed_tetrahedrons);

                // Reuse carved slots, allocate the rest
                while removed_tetrahedrons.len() < hole.faces.len() {
                    removed_tetrahedrons.push(self.tetrahedrons.len() as u32);
                    self.tetrahedrons.push(Tetrahedron::default());
                    ctx.circumspheres.push(Sphere::default());
                    ctx.removed.push(true);
                }

                self.fill_star_shaped_hole(&mut ctx, &removed_tetrahedrons, &hole, vertex_index);
            }

            std::mem::swap(&mut postponed, &mut queue);
            if postponed.len() == queue.len() {
                warn!(
                    "{} vertices are excluded from triangulation due to numeric precision",
                    queue.len()
                );
                break;
            }
        }

        self.disconnect_super_mesh_tetrahedrons(&mut ctx.removed);
        self.filter_mesh_surface(&mut ctx.removed);
        self.ensure_mesh_connectivity(&mut ctx.removed);
        self.remove_marked_tetrahedrons(&ctx.removed);
        self.remove_super_mesh_vertices();
        self.update_ignored_vertices();

        self.num_inner_tetrahedrons = self.tetrahedrons.len();

        if self.ignored_vertices.len() > queue.len() {
            warn!(
                "Triangulation is incomplete because vertices are too sparse, {} vertices are ignored",
                self.ignored_vertices.len()
            );
        }

        let mut hull = Surface::default();
        if !self.build_hull_surface(&mut hull) {
            warn!("Hull of tetrahedral mesh is not closed, outer cells are skipped");
            self.hull_normals = vec![Vec3::zeros(); self.vertices.len()];
            return;
        }
        self.calculate_hull_normals(&hull);
        self.build_outer_tetrahedrons(&hull);
        self.calculate_outer_matrices();
    }

    fn circumsphere(&self, tet_index: usize) -> Sphere {
        let tetrahedron = &self.tetrahedrons[tet_index];
        let p = tetrahedron.indices.map(|index| self.vertices[index as usize].cast::<f64>());
        let u1 = p[1] - p[0];
        let u2 = p[2] - p[0];
        let u3 = p[3] - p[0];

        let u2u3 = u2.cross(&u3);
        let u3u1 = u3.cross(&u1);
        let u1u2 = u1.cross(&u2);

        let numerator = u2u3 * u1.norm_squared() + u3u1 * u2.norm_squared() + u1u2 * u3.norm_squared();
        let denominator = 2.0 * u1.dot(&u2u3);

        let epsilon = f64::from(constants::EPSILON);
        if denominator.abs() < epsilon * epsilon {
            warn!("Degenerate tetrahedron in tetrahedral mesh");
            let large = f64::from(constants::LARGE_VALUE);
            return Sphere { center: DVec3::zeros(), radius: large * large };
        }

        let center = p[0] + numerator / denominator;
        let radius_squared = p
            .iter()
            .map(|vertex| (vertex - center).norm_squared())
            .fold(f64::INFINITY, f64::min);
        Sphere { center, radius: radius_squared.sqrt() }
    }

    fn find_tetrahedron(&self, position: &Vec3, removed: &[bool]) -> Option<u32> {
        let mut tet_index = removed.iter().position(|removed| !removed)? as u32;
        for _ in 0..self.tetrahedrons.len() {
            let weights = self.inner_barycentric_coords(tet_index as usize, position);
            if all_non_negative(&weights) {
                break;
            }
            tet_index = self.tetrahedrons[tet_index as usize].neighbors[smallest_weight_index(&weights)];
            if tet_index == NONE {
                return None;
            }
        }
        Some(tet_index)
    }

    fn find_and_remove_intersected(
        &self,
        ctx: &mut DelaunayContext,
        position: &Vec3,
        hole: &mut Surface,
        removed_tetrahedrons: &mut Vec<u32>,
    ) -> bool {
        hole.clear();
        removed_tetrahedrons.clear();

        let first = match self.find_tetrahedron(position, &ctx.removed) {
            Some(first) if ctx.is_inside_circumsphere(first, position) => first,
            _ => {
                warn!("Cannot find tetrahedron to insert vertex at {:?}", position);
                return false;
            }
        };

        removed_tetrahedrons.push(first);
        ctx.removed[first as usize] = true;

        // Breadth-first search over tetrahedrons whose circumsphere contains the point
        let mut next = 0;
        while next < removed_tetrahedrons.len() {
            let tetrahedron = &self.tetrahedrons[removed_tetrahedrons[next] as usize];
            next += 1;
            for &neighbor in &tetrahedron.neighbors {
                if neighbor == NONE || ctx.removed[neighbor as usize] {
                    continue;
                }
                if ctx.is_inside_circumsphere(neighbor, position) {
                    removed_tetrahedrons.push(neighbor);
                    ctx.removed[neighbor as usize] = true;
                }
            }
        }

        // Collect the boundary of the carved region
        for &tet_index in removed_tetrahedrons.iter() {
            let tetrahedron = &self.tetrahedrons[tet_index as usize];
            for (face_index, &neighbor) in tetrahedron.neighbors.iter().enumerate() {
                if neighbor == NONE {
                    hole.faces.push(tetrahedron.triangle_face(face_index, NONE, NONE));
                    continue;
                }
                if ctx.removed[neighbor as usize] {
                    continue;
                }
                let neighbor_tetrahedron = &self.tetrahedrons[neighbor as usize];
                if let Some(neighbor_face) = neighbor_tetrahedron.neighbor_face_index(tet_index) {
                    hole.faces.push(neighbor_tetrahedron.triangle_face(neighbor_face, neighbor, neighbor_face as u32));
                }
            }
        }

        // The new vertex must see every boundary face from the inside
        let mut valid = true;
        let p0 = position.cast::<f64>();
        for triangle in &mut hole.faces {
            if triangle.tet_index == NONE {
                continue;
            }
            triangle.normalize(&self.vertices);

            let p1 = self.vertices[triangle.indices[0] as usize].cast::<f64>();
            let p2 = self.vertices[triangle.indices[1] as usize].cast::<f64>();
            let p3 = self.vertices[triangle.indices[2] as usize].cast::<f64>();
            let normal = (p2 - p1).cross(&(p3 - p1));
            if (p0 - p1).dot(&normal) < f64::from(constants::LARGE_EPSILON) {
                valid = false;
                break;
            }
        }

        if valid && !hole.calculate_adjacency() {
            valid = false;
        }
        if valid && !hole.is_closed() {
            error!("Surface of the carved hole in tetrahedral mesh is incomplete for vertex at {:?}", position);
            valid = false;
        }

        if !valid {
            for &tet_index in removed_tetrahedrons.iter() {
                ctx.removed[tet_index as usize] = false;
            }
            removed_tetrahedrons.clear();
            hole.clear();
        }
        valid
    }

    fn disconnect_removed_tetrahedrons(&mut self, removed_tetrahedrons: &[u32]) {
        for &tet_index in removed_tetrahedrons {
            for face_index in 0..4 {
                let neighbor = self.tetrahedrons[tet_index as usize].neighbors[face_index];
                if neighbor == NONE {
                    continue;
                }
                if let Some(neighbor_face) = self.tetrahedrons[neighbor as usize].neighbor_face_index(tet_index) {
                    self.tetrahedrons[neighbor as usize].neighbors[neighbor_face] = NONE;
                }
                self.tetrahedrons[tet_index as usize].neighbors[face_index] = NONE;
            }
        }
    }

    fn disconnect_tetrahedron(&mut self, tet_index: u32) {
        for face_index in 0..4 {
            let neighbor = self.tetrahedrons[tet_index as usize].neighbors[face_index];
            if neighbor == NONE {
                continue;
            }
            if let Some(neighbor_face) = self.tetrahedrons[neighbor as usize].neighbor_face_index(tet_index) {
                self.tetrahedrons[neighbor as usize].neighbors[neighbor_face] = NONE;
            }
        }
    }

    fn fill_star_shaped_hole(&mut self, ctx: &mut DelaunayContext, output: &[u32], hole: &Surface, center_index: u32) {
        for (face, &new_index) in hole.faces.iter().zip(output) {
            let mut tetrahedron = Tetrahedron::default();
            for j in 0..3 {
                tetrahedron.indices[j] = face.indices[j];
                tetrahedron.neighbors[j] = output[face.neighbors[j] as usize];
            }

            tetrahedron.indices[3] = center_index;
            tetrahedron.neighbors[3] = face.tet_index;
            if face.tet_index != NONE {
                self.tetrahedrons[face.tet_index as usize].neighbors[face.tet_face as usize] = new_index;
            }

            tetrahedron.calculate_inner_matrix(&self.vertices);
            self.tetrahedrons[new_index as usize] = tetrahedron;

            ctx.removed[new_index as usize] = false;
            ctx.circumspheres[new_index as usize] = self.circumsphere(new_index as usize);
        }
    }

    fn disconnect_super_mesh_tetrahedrons(&mut self, removed: &mut [bool]) {
        for tet_index in 0..self.tetrahedrons.len() {
            if self.tetrahedrons[tet_index].indices.iter().any(|index| *index < NUM_SUPER_MESH_VERTICES) {
                removed[tet_index] = true;
            }
            if removed[tet_index] {
                self.disconnect_tetrahedron(tet_index as u32);
            }
        }
    }

    /// Remove tetrahedrons that make surface edges non-manifold, worst shaped first
    fn filter_mesh_surface(&mut self, removed: &mut [bool]) {
        const MAX_CARDINALITY: u32 = 2;

        let mut surface_edges: Vec<ScoredEdge> = Vec::new();
        for (tet_index, tetrahedron) in self.tetrahedrons.iter().enumerate() {
            if removed[tet_index] {
                continue;
            }

            let start_index = surface_edges.len();
            for face_index in 0..4 {
                if tetrahedron.neighbors[face_index] != NONE {
                    continue;
                }

                let triangle = tetrahedron.triangle_face(face_index, tet_index as u32, face_index as u32);
                let score = triangle.silver_score(&self.vertices);
                for (a, b) in [(0, 1), (1, 2), (2, 0)] {
                    let (i0, i1) = (triangle.indices[a], triangle.indices[b]);
                    let edge = ScoredEdge {
                        indices: [i0.min(i1), i0.max(i1)],
                        silver_score: score,
                        tet_index: tet_index as u32,
                        cardinality: 1,
                    };

                    match surface_edges[start_index..].iter_mut().find(|existing| existing.indices == edge.indices) {
                        Some(existing) => {
                            existing.cardinality += 1;
                            existing.silver_score = existing.silver_score.max(edge.silver_score);
                        }
                        None => surface_edges.push(edge),
                    }
                }
            }
        }

        surface_edges.sort_by(|lhs, rhs| {
            lhs.indices
                .cmp(&rhs.indices)
                .then(lhs.silver_score.total_cmp(&rhs.silver_score))
        });

        let mut removed_tetrahedrons = Vec::new();
        let mut first = 0;
        while first < surface_edges.len() {
            let indices = surface_edges[first].indices;
            let last = surface_edges[first..]
                .iter()
                .position(|edge| edge.indices != indices)
                .map_or(surface_edges.len(), |offset| first + offset);

            let total_cardinality: u32 = surface_edges[first..last]
                .iter()
                .filter(|edge| !removed[edge.tet_index as usize])
                .map(|edge| edge.cardinality)
                .sum();

            if total_cardinality > MAX_CARDINALITY {
                let mut remaining = total_cardinality;
                for edge in surface_edges[first + 1..last].iter().rev() {
                    if removed[edge.tet_index as usize] {
                        continue;
                    }
                    removed[edge.tet_index as usize] = true;
                    removed_tetrahedrons.push(edge.tet_index);

                    remaining -= edge.cardinality;
                    if remaining <= MAX_CARDINALITY {
                        break;
                    }
                }
            }

            first = last;
        }

        for tet_index in removed_tetrahedrons {
            self.disconnect_tetrahedron(tet_index);
        }
    }

    /// Keep only the component connected to the first remaining tetrahedron
    fn ensure_mesh_connectivity(&self, removed: &mut [bool]) {
        let Some(first) = removed.iter().position(|removed| !removed) else {
            return;
        };

        let mut visited = vec![false; self.tetrahedrons.len()];
        let mut queue = vec![first];
        visited[first] = true;

        let mut next = 0;
        while next < queue.len() {
            let tetrahedron = &self.tetrahedrons[queue[next]];
            next += 1;
            for &neighbor in &tetrahedron.neighbors {
                if neighbor == NONE {
                    continue;
                }
                let neighbor = neighbor as usize;
                if removed[neighbor] || visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;
                queue.push(neighbor);
            }
        }

        for (removed, visited) in removed.iter_mut().zip(visited) {
            if !visited {
                *removed = true;
            }
        }
    }

    fn remove_marked_tetrahedrons(&mut self, removed: &[bool]) {
        let old = std::mem::take(&mut self.tetrahedrons);
        let mut old_to_new = vec![NONE; old.len()];

        for (old_index, tetrahedron) in old.into_iter().enumerate() {
            if removed[old_index] {
                continue;
            }
            old_to_new[old_index] = self.tetrahedrons.len() as u32;
            self.tetrahedrons.push(tetrahedron);
        }

        for tetrahedron in &mut self.tetrahedrons {
            for neighbor in &mut tetrahedron.neighbors {
                if *neighbor != NONE {
                    *neighbor = old_to_new[*neighbor as usize];
                }
            }
        }
    }

    fn remove_super_mesh_vertices(&mut self) {
        self.vertices.rotate_left(NUM_SUPER_MESH_VERTICES as usize);
        for tetrahedron in &mut self.tetrahedrons {
            for index in &mut tetrahedron.indices {
                *index -= NUM_SUPER_MESH_VERTICES;
            }
        }
    }

    fn update_ignored_vertices(&mut self) {
        let mut ignored = vec![true; self.vertices.len()];
        for tetrahedron in &self.tetrahedrons {
            for index in tetrahedron.indices {
                ignored[index as usize] = false;
            }
        }

        let num_positions = self.vertices.len() - NUM_SUPER_MESH_VERTICES as usize;
        self.ignored_vertices = (0..num_positions as u32)
            .filter(|index| ignored[*index as usize])
            .collect();
    }

    fn build_hull_surface(&self, hull: &mut Surface) -> bool {
        hull.clear();
        for (tet_index, tetrahedron) in self.tetrahedrons.iter().enumerate() {
            for (face_index, &neighbor) in tetrahedron.neighbors.iter().enumerate() {
                if neighbor == NONE {
                    hull.faces.push(tetrahedron.triangle_face(face_index, tet_index as u32, face_index as u32));
                }
            }
        }

        if !hull.calculate_adjacency() || !hull.is_closed() {
            return false;
        }

        for triangle in &mut hull.faces {
            triangle.normalize(&self.vertices);
        }
        true
    }

    fn calculate_hull_normals(&mut self, hull: &Surface) {
        self.hull_normals = vec![Vec3::zeros(); self.vertices.len()];
        for triangle in &hull.faces {
            let p = triangle.indices.map(|index| self.vertices[index as usize]);
            let normal = (p[1] - p[0]).cross(&(p[2] - p[0]));
            for index in triangle.indices {
                self.hull_normals[index as usize] += normal;
            }
        }

        for normal in &mut self.hull_normals {
            if *normal != Vec3::zeros() {
                normal.normalize_mut();
            }
        }
    }

    fn build_outer_tetrahedrons(&mut self, hull: &Surface) {
        let num_inner = self.num_inner_tetrahedrons as u32;
        for (hull_index, triangle) in hull.faces.iter().enumerate() {
            let tet_index = num_inner + hull_index as u32;
            let mut tetrahedron = Tetrahedron::default();
            for face_index in 0..3 {
                tetrahedron.indices[face_index] = triangle.indices[face_index];
                tetrahedron.neighbors[face_index] = num_inner + triangle.neighbors[face_index];
            }
            tetrahedron.indices[3] = INFINITY3;
            tetrahedron.neighbors[3] = triangle.tet_index;

            self.tetrahedrons[triangle.tet_index as usize].neighbors[triangle.tet_face as usize] = tet_index;
            self.tetrahedrons.push(tetrahedron);
        }
    }

    /// Precompute the polynomial in `t` whose root places a point on the extruded triangle
    fn calculate_outer_matrices(&mut self) {
        for tet_index in self.num_inner_tetrahedrons..self.tetrahedrons.len() {
            let indices = self.tetrahedrons[tet_index].indices;
            let positions = [0, 1, 2].map(|i| self.vertices[indices[i] as usize]);
            let normals = [0, 1, 2].map(|i| self.hull_normals[indices[i] as usize]);

            let a = positions[0] - positions[2];
            let ap = normals[0] - normals[2];
            let b = positions[1] - positions[2];
            let bp = normals[1] - normals[2];
            let p2 = positions[2];
            let cp = -normals[2];

            let mut m = Mat3x4::zeros();

            // Coefficients of t^2
            m[(0, 0)] = ap.y * bp.z - ap.z * bp.y;
            m[(0, 1)] = -ap.x * bp.z + ap.z * bp.x;
            m[(0, 2)] = ap.x * bp.y - ap.y * bp.x;
            m[(0, 3)] = a.x * bp.y * cp.z - a.y * bp.x * cp.z + ap.x * b.y * cp.z - ap.y * b.x * cp.z
                + a.z * bp.x * cp.y - a.z * bp.y * cp.x + ap.z * b.x * cp.y - ap.z * b.y * cp.x
                - a.x * bp.z * cp.y + a.y * bp.z * cp.x - ap.x * b.z * cp.y + ap.y * b.z * cp.x;
            m[(0, 3)] -= p2.x * m[(0, 0)] + p2.y * m[(0, 1)] + p2.z * m[(0, 2)];

            // Coefficients of t
            m[(1, 0)] = ap.y * b.z + a.y * bp.z - ap.z * b.y - a.z * bp.y;
            m[(1, 1)] = -a.x * bp.z - ap.x * b.z + a.z * bp.x + ap.z * b.x;
            m[(1, 2)] = a.x * bp.y - a.y * bp.x + ap.x * b.y - ap.y * b.x;
            m[(1, 3)] = a.x * b.y * cp.z - a.y * b.x * cp.z - a.x * b.z * cp.y
                + a.y * b.z * cp.x + a.z * b.x * cp.y - a.z * b.y * cp.x;
            m[(1, 3)] -= p2.x * m[(1, 0)] + p2.y * m[(1, 1)] + p2.z * m[(1, 2)];

            // Constant coefficients
            m[(2, 0)] = -a.z * b.y + a.y * b.z;
            m[(2, 1)] = -a.x * b.z + a.z * b.x;
            m[(2, 2)] = a.x * b.y - a.y * b.x;
            m[(2, 3)] = -(p2.x * m[(2, 0)] + p2.y * m[(2, 1)] + p2.z * m[(2, 2)]);

            // Coefficient of t^3
            let cubic = ap.x * bp.y * cp.z - ap.y * bp.x * cp.z + ap.z * bp.x * cp.y
                - ap.z * bp.y * cp.x + ap.y * bp.z * cp.x - ap.x * bp.z * cp.y;

            let tetrahedron = &mut self.tetrahedrons[tet_index];
            if cubic.abs() > constants::LARGE_EPSILON {
                // Monic form t^3 + p t^2 + q t + r
                tetrahedron.matrix = m * (1.0 / cubic);
            } else {
                tetrahedron.matrix = m;
                tetrahedron.indices[3] = INFINITY2;
            }
        }
    }
}

/// Real roots of `x^3 + a x^2 + b x + c`
fn solve_cubic_equation(a: f64, b: f64, c: f64, eps: f64) -> Vec<f64> {
    let a2 = a * a;
    let q = (a2 - 3.0 * b) / 9.0;
    let r = (a * (2.0 * a2 - 9.0 * b) + 27.0 * c) / 54.0;
    let r2 = r * r;
    let q3 = q * q * q;

    if r2 <= q3 + eps {
        let t = (r / q3.sqrt()).clamp(-1.0, 1.0).acos();
        let a = a / 3.0;
        let q = -2.0 * q.sqrt();
        let tau = std::f64::consts::TAU;
        vec![
            q * (t / 3.0).cos() - a,
            q * ((t + tau) / 3.0).cos() - a,
            q * ((t - tau) / 3.0).cos() - a,
        ]
    } else {
        let mut big_a = -(r.abs() + (r2 - q3).sqrt()).cbrt();
        if r < 0.0 {
            big_a = -big_a;
        }
        let big_b = if big_a == 0.0 { 0.0 } else { q / big_a };

        let a = a / 3.0;
        let first = (big_a + big_b) - a;
        let second = -0.5 * (big_a + big_b) - a;
        let imaginary = 0.5 * 3.0f64.sqrt() * (big_a - big_b);
        if imaginary.abs() < eps {
            vec![first, second]
        } else {
            vec![first]
        }
    }
}

fn smallest_positive_root(roots: &[f64]) -> f64 {
    let threshold = -f64::from(constants::LARGE_EPSILON);
    roots
        .iter()
        .copied()
        .filter(|root| *root > threshold)
        .fold(f64::from(constants::LARGE_VALUE), f64::min)
        .max(0.0)
}

fn solve_cubic(abc: &Vec3) -> f32 {
    let roots = solve_cubic_equation(
        f64::from(abc.x),
        f64::from(abc.y),
        f64::from(abc.z),
        f64::from(constants::EPSILON),
    );
    smallest_positive_root(&roots) as f32
}

fn solve_quadratic(abc: &Vec3) -> f32 {
    let (a, b, c) = (f64::from(abc.x), f64::from(abc.y), f64::from(abc.z));
    if a.abs() < f64::from(constants::EPSILON) {
        return (-c / b) as f32;
    }

    let discriminant = (b * b - 4.0 * a * c).max(0.0).sqrt();
    let inv_a = 1.0 / (2.0 * a);
    smallest_positive_root(&[(-b + discriminant) * inv_a, (-b - discriminant) * inv_a]) as f32
}

fn triangle_barycentric_coords(position: &Vec3, p1: &Vec3, p2: &Vec3, p3: &Vec3) -> Vec3 {
    let v12 = p2 - p1;
    let v13 = p3 - p1;
    let v0 = position - p1;
    let d00 = v12.dot(&v12);
    let d01 = v12.dot(&v13);
    let d11 = v13.dot(&v13);
    let d20 = v0.dot(&v12);
    let d21 = v0.dot(&v13);
    let denom = d00 * d11 - d01 * d01;
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Vec3::new(1.0 - v - w, v, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::random::element_rng;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn random_positions(count: usize) -> Vec<Vec3> {
        let mut rng = element_rng(3, 0, 0);
        (0..count)
            .map(|_| Vec3::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0)))
            .collect()
    }

    fn linear_field(position: &Vec3) -> f32 {
        position.x + 2.0 * position.y - 0.5 * position.z + 1.0
    }

    fn field_data(positions: &[Vec3], field: impl Fn(&Vec3) -> f32) -> Vec<SphericalHarmonicsDot9> {
        positions
            .iter()
            .map(|position| {
                let mut sh = SphericalHarmonicsDot9::default();
                sh.coefficients[0] = Vec3::repeat(field(position));
                sh
            })
            .collect()
    }

    fn centroid(mesh: &TetrahedralMesh, tet_index: usize) -> Vec3 {
        let indices = mesh.tetrahedrons[tet_index].indices;
        indices.iter().map(|index| mesh.vertices[*index as usize]).sum::<Vec3>() * 0.25
    }

    #[test]
    fn test_empty_mesh_samples_zero() {
        let mesh = TetrahedralMesh::new(&[]);
        let mut hint = 0;
        assert!(mesh.is_empty());
        assert_eq!(mesh.sample(&[], &Vec3::zeros(), &mut hint), SphericalHarmonicsDot9::default());
        assert_eq!(mesh.interpolation_factors(&Vec3::zeros(), &mut hint), Vec4::zeros());
    }

    #[test]
    fn test_super_mesh_is_consistent() {
        let mut mesh = TetrahedralMesh::default();
        mesh.initialize_super_mesh(&AABB::new(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0)));
        // Center of the box lies in the central tetrahedron
        let weights = mesh.inner_barycentric_coords(4, &Vec3::new(1.0, 1.0, 1.0));
        assert!(all_non_negative(&weights));
        assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_inner_cells_interpolate_linear_fields() {
        let positions = random_positions(40);
        let mesh = TetrahedralMesh::new(&positions);
        assert!(mesh.num_inner_tetrahedrons > 0);
        assert!(mesh.tetrahedrons.len() > mesh.num_inner_tetrahedrons);

        let data = field_data(&positions, linear_field);
        for target in [0, mesh.num_inner_tetrahedrons / 2, mesh.num_inner_tetrahedrons - 1] {
            let point = centroid(&mesh, target);
            let mut hint = 0;
            let sample = mesh.sample(&data, &point, &mut hint);
            assert!(hint < mesh.num_inner_tetrahedrons);
            assert_relative_eq!(sample.coefficients[0].x, linear_field(&point), epsilon = 1e-2);
        }
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let mesh = TetrahedralMesh::new(&random_positions(25));
        for (tet_index, tetrahedron) in mesh.tetrahedrons.iter().enumerate() {
            for neighbor in tetrahedron.neighbors {
                assert_ne!(neighbor, NONE);
                assert!(mesh.tetrahedrons[neighbor as usize].neighbors.contains(&(tet_index as u32)));
            }
        }
    }

    #[test]
    fn test_outer_cells_preserve_constants() {
        let positions = random_positions(30);
        let mesh = TetrahedralMesh::new(&positions);
        let data = field_data(&positions, |_| 2.5);

        let mut hint = 0;
        let sample = mesh.sample(&data, &Vec3::new(30.0, 5.0, 5.0), &mut hint);
        assert!(hint >= mesh.num_inner_tetrahedrons);
        assert_relative_eq!(sample.coefficients[0].x, 2.5, epsilon = 1e-3);
    }

    #[test]
    fn test_cubic_solver() {
        // (t - 1)(t - 2)(t - 3)
        let mut roots = solve_cubic_equation(-6.0, 11.0, -6.0, 1e-6);
        roots.sort_by(f64::total_cmp);
        assert_eq!(roots.len(), 3);
        assert_relative_eq!(roots[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(roots[2], 3.0, epsilon = 1e-6);
        assert_relative_eq!(smallest_positive_root(&roots), 1.0, epsilon = 1e-6);
        assert_relative_eq!(solve_quadratic(&Vec3::new(1.0, -3.0, 2.0)), 1.0, epsilon = 1e-5);
    }
}
