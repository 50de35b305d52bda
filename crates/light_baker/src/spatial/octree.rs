//! Octree over triangle primitives
//!
//! Divides the scene bounds into hierarchical regions so that ray queries only visit
//! triangles near the ray. Each primitive is stored once, in the deepest node that
//! contains its centroid, together with its bounding radius. Every node also keeps the
//! bounds of the item spheres in its subtree, which is what rays are tested against.

use crate::foundation::math::Vec3;

use super::AABB;

/// Configuration for octree behavior
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    /// Maximum primitives per node before subdivision
    pub max_items_per_node: usize,

    /// Maximum subdivision depth
    pub max_depth: u32,

    /// Minimum node half-size (prevents excessive subdivision)
    pub min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_items_per_node: 8,
            max_depth: 8,
            min_node_size: 0.05,
        }
    }
}

/// Primitive stored in the octree
#[derive(Debug, Clone, Copy)]
pub struct OctreeItem {
    /// Primitive index
    pub id: u32,
    /// Centroid
    pub position: Vec3,
    /// Bounding sphere radius around the centroid
    pub radius: f32,
}

/// Octant index (0-7) of a position relative to a center.
///
/// Bit 0 is +X, bit 1 is +Y and bit 2 is +Z.
impl OctreeItem {
    fn sphere_bounds(&self) -> AABB {
        AABB::from_center_extents(self.position, Vec3::repeat(self.radius))
    }
}

fn octant_index(center: &Vec3, position: &Vec3) -> usize {
    let x_bit = usize::from(position.x >= center.x);
    let y_bit = usize::from(position.y >= center.y);
    let z_bit = usize::from(position.z >= center.z);
    (z_bit << 2) | (y_bit << 1) | x_bit
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone)]
pub struct OctreeNode {
    /// World-space bounds of this node
    pub bounds: AABB,

    /// Items contained in this node
    pub items: Vec<OctreeItem>,

    /// Child nodes (8 octants), None if this is a leaf
    pub children: Option<Box<[OctreeNode; 8]>>,

    /// Depth in the tree (0 = root)
    pub depth: u32,

    /// Bounds of every item sphere in this subtree, invalid while the subtree is empty
    pub content_bounds: AABB,
}

impl OctreeNode {
    /// Create a new leaf node
    pub fn new(bounds: AABB, depth: u32) -> Self {
        Self {
            bounds,
            items: Vec::new(),
            children: None,
            depth,
            content_bounds: AABB::empty(),
        }
    }

    /// Check if this node is a leaf (has no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }

        let center = self.bounds.center();
        let quarter_extents = self.bounds.extents() * 0.5;

        let children: [OctreeNode; 8] = std::array::from_fn(|octant| {
            let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
            let child_center = Vec3::new(
                center.x + quarter_extents.x * sign(1),
                center.y + quarter_extents.y * sign(2),
                center.z + quarter_extents.z * sign(4),
            );
            OctreeNode::new(AABB::from_center_extents(child_center, quarter_extents), self.depth + 1)
        });
        let mut children = Box::new(children);

        // Redistribute existing items to children
        for item in std::mem::take(&mut self.items) {
            let child = &mut children[octant_index(&center, &item.position)];
            child.content_bounds.merge(&item.sphere_bounds());
            child.items.push(item);
        }
        self.children = Some(children);
    }

    /// Insert an item into this node
    pub fn insert(&mut self, item: OctreeItem, config: &OctreeConfig) -> bool {
        if !self.bounds.contains_point(item.position) {
            return false;
        }
        self.content_bounds.merge(&item.sphere_bounds());

        if self.is_leaf() {
            let should_subdivide = self.items.len() >= config.max_items_per_node
                && self.depth < config.max_depth
                && self.bounds.extents().x > config.min_node_size;

            if !should_subdivide {
                self.items.push(item);
                return true;
            }
            self.subdivide();
        }

        let center = self.bounds.center();
        match self.children {
            Some(ref mut children) => children[octant_index(&center, &item.position)].insert(item, config),
            None => false,
        }
    }

    /// Collect items whose subtree bounds the ray passes through.
    ///
    /// Items may extend past the node that stores their centroid, so nodes are tested
    /// against `content_bounds` rather than their cell bounds. Items of a visited node
    /// are still filtered by their own sphere box.
    pub fn query_ray(&self, ray_origin: Vec3, ray_dir: Vec3, results: &mut Vec<OctreeItem>) {
        if !self.content_bounds.is_valid() || self.content_bounds.intersect_ray(ray_origin, ray_dir).is_none() {
            return;
        }

        results.extend(
            self.items
                .iter()
                .filter(|item| item.sphere_bounds().intersect_ray(ray_origin, ray_dir).is_some()),
        );

        if let Some(ref children) = self.children {
            for child in children.iter() {
                child.query_ray(ray_origin, ray_dir, results);
            }
        }
    }

    /// Count total items in this node and all children
    pub fn count_items(&self) -> usize {
        let mut count = self.items.len();
        if let Some(ref children) = self.children {
            for child in children.iter() {
                count += child.count_items();
            }
        }
        count
    }
}

/// Octree spatial partitioning structure
#[derive(Debug, Clone)]
pub struct Octree {
    /// Root node containing the entire scene
    pub root: OctreeNode,

    config: OctreeConfig,
}

impl Octree {
    /// Create a new octree with given world bounds
    pub fn new(world_bounds: AABB, config: OctreeConfig) -> Self {
        Self {
            root: OctreeNode::new(world_bounds, 0),
            config,
        }
    }

    /// Insert an item, returns false if its centroid is outside the root bounds
    pub fn insert(&mut self, id: u32, position: Vec3, radius: f32) -> bool {
        self.root.insert(OctreeItem { id, position, radius }, &self.config)
    }

    /// Candidate items for a ray, to be tested individually by the caller
    pub fn query_ray(&self, ray_origin: Vec3, ray_dir: Vec3) -> Vec<OctreeItem> {
        let mut results = Vec::new();
        self.root.query_ray(ray_origin, ray_dir, &mut results);
        results
    }

    /// Get total item count
    pub fn item_count(&self) -> usize {
        self.root.count_items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octree_basic_insertion() {
        let bounds = AABB::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0));
        let mut octree = Octree::new(bounds, OctreeConfig::default());

        assert!(octree.insert(0, Vec3::new(0.0, 0.0, 0.0), 1.0));
        assert!(!octree.insert(1, Vec3::new(500.0, 0.0, 0.0), 1.0));
        assert_eq!(octree.item_count(), 1);
    }

    #[test]
    fn test_octree_subdivision() {
        let bounds = AABB::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0));
        let config = OctreeConfig {
            max_items_per_node: 4,
            max_depth: 3,
            min_node_size: 1.0,
        };
        let mut octree = Octree::new(bounds, config);

        for id in 0..10 {
            octree.insert(id, Vec3::new(id as f32, 0.0, 0.0), 0.5);
        }

        assert_eq!(octree.item_count(), 10);
        assert!(octree.root.children.is_some());
    }

    #[test]
    fn test_octree_ray_query_skips_distant_nodes() {
        let bounds = AABB::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0));
        let config = OctreeConfig {
            max_items_per_node: 1,
            max_depth: 4,
            min_node_size: 1.0,
        };
        let mut octree = Octree::new(bounds, config);
        octree.insert(0, Vec3::new(50.0, 50.0, 50.0), 0.5);
        octree.insert(1, Vec3::new(-50.0, -50.0, -50.0), 0.5);
        octree.insert(2, Vec3::new(50.0, -50.0, 50.0), 0.5);

        let results = octree.query_ray(Vec3::new(50.0, 50.0, -99.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(results.iter().any(|item| item.id == 0));
        assert!(!results.iter().any(|item| item.id == 1));
    }

    #[test]
    fn test_large_item_does_not_widen_other_nodes() {
        let bounds = AABB::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0));
        let config = OctreeConfig {
            max_items_per_node: 1,
            max_depth: 4,
            min_node_size: 1.0,
        };
        let mut octree = Octree::new(bounds, config);
        octree.insert(0, Vec3::new(-50.0, -50.0, -50.0), 90.0);
        octree.insert(1, Vec3::new(60.0, 60.0, 60.0), 0.5);
        octree.insert(2, Vec3::new(60.0, -60.0, 60.0), 0.5);

        // Passes far from both small items but through the large one
        let results = octree.query_ray(Vec3::new(-20.0, 20.0, -99.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(results.iter().any(|item| item.id == 0));
        assert!(!results.iter().any(|item| item.id == 1));
        assert!(!results.iter().any(|item| item.id == 2));

        // A ray through a small item still finds it
        let results = octree.query_ray(Vec3::new(60.0, 60.0, -99.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(results.iter().any(|item| item.id == 1));
    }

    #[test]
    fn test_content_bounds_cover_redistributed_items() {
        let bounds = AABB::new(Vec3::new(-10.0, -10.0, -10.0), Vec3::new(10.0, 10.0, 10.0));
        let config = OctreeConfig {
            max_items_per_node: 1,
            max_depth: 3,
            min_node_size: 0.5,
        };
        let mut octree = Octree::new(bounds, config);
        octree.insert(0, Vec3::new(1.0, 1.0, 1.0), 3.0);
        octree.insert(1, Vec3::new(-5.0, -5.0, -5.0), 0.1);

        // Item 0 moved into a child on subdivision, its sphere crosses the cell border
        let results = octree.query_ray(Vec3::new(-1.5, 1.0, -9.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(results.iter().any(|item| item.id == 0));
        assert!(!results.iter().any(|item| item.id == 1));
    }
}
