//! Lightmap charting
//!
//! Every bakeable object gets a square region of a lightmap chart. Region size follows
//! the object's world surface area, and regions are packed into fixed-size square
//! charts with a guillotine allocator. A new chart is opened whenever a region fits no
//! existing chart.

use crate::config::ChartingSettings;
use crate::foundation::logging::debug;
use crate::foundation::math::Vec4;
use crate::scene::{GeometryKey, SceneCollector, StaticGeometry};

/// Rectangle of texels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelRect {
    /// Left column
    pub x: u32,
    /// Top row
    pub y: u32,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
}

impl TexelRect {
    /// Create a rectangle
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether two rectangles share at least one texel
    pub fn overlaps(&self, other: &TexelRect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Rectangle grown by `padding` texels on every side
    pub fn padded(&self, padding: u32) -> Self {
        Self::new(
            self.x.saturating_sub(padding),
            self.y.saturating_sub(padding),
            self.width + 2 * padding,
            self.height + 2 * padding,
        )
    }

    fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Guillotine rectangle allocator with best-short-side-fit placement
#[derive(Debug, Clone)]
pub struct RectAllocator {
    free_rects: Vec<TexelRect>,
}

impl RectAllocator {
    /// Allocator over an empty square of `size` texels
    pub fn new(size: u32) -> Self {
        Self { free_rects: vec![TexelRect::new(0, 0, size, size)] }
    }

    /// Allocate a region, returns `None` when it fits nowhere
    pub fn allocate(&mut self, width: u32, height: u32) -> Option<TexelRect> {
        let (best_index, _) = self
            .free_rects
            .iter()
            .enumerate()
            .filter(|(_, free)| free.width >= width && free.height >= height)
            .map(|(index, free)| {
                let leftover_x = free.width - width;
                let leftover_y = free.height - height;
                (index, (leftover_x.min(leftover_y), leftover_x.max(leftover_y)))
            })
            .min_by_key(|(_, score)| *score)?;

        let free = self.free_rects.swap_remove(best_index);
        let placed = TexelRect::new(free.x, free.y, width, height);

        // Split the leftover along the shorter axis
        let leftover_x = free.width - width;
        let leftover_y = free.height - height;
        let (right, bottom) = if leftover_x <= leftover_y {
            (
                TexelRect::new(free.x + width, free.y, leftover_x, height),
                TexelRect::new(free.x, free.y + height, free.width, leftover_y),
            )
        } else {
            (
                TexelRect::new(free.x + width, free.y, leftover_x, free.height),
                TexelRect::new(free.x, free.y + height, width, leftover_y),
            )
        };
        self.free_rects.extend([right, bottom].into_iter().filter(|rect| rect.area() > 0));

        Some(placed)
    }
}

/// Placement of one object inside a chart
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapChartElement {
    /// Object
    pub object: GeometryKey,
    /// Texel region, padding excluded
    pub rect: TexelRect,
    /// Mapping of object lightmap UVs into the chart: `xy` scale, `zw` offset
    pub scale_offset: Vec4,
}

/// One square lightmap atlas
#[derive(Debug, Clone)]
pub struct LightmapChart {
    /// Global lightmap index
    pub index: u32,
    /// Width and height in texels
    pub size: u32,
    /// Placed objects
    pub elements: Vec<LightmapChartElement>,
    allocator: RectAllocator,
}

impl LightmapChart {
    fn new(index: u32, size: u32) -> Self {
        Self {
            index,
            size,
            elements: Vec::new(),
            allocator: RectAllocator::new(size),
        }
    }

    fn try_insert(&mut self, object: GeometryKey, side: u32, padding: u32) -> bool {
        let padded_side = side + 2 * padding;
        let Some(region) = self.allocator.allocate(padded_side, padded_side) else {
            return false;
        };

        let rect = TexelRect::new(region.x + padding, region.y + padding, side, side);
        let size = self.size as f32;
        self.elements.push(LightmapChartElement {
            object,
            rect,
            scale_offset: Vec4::new(
                rect.width as f32 / size,
                rect.height as f32 / size,
                rect.x as f32 / size,
                rect.y as f32 / size,
            ),
        });
        true
    }
}

/// Side of the square region requested by an object
pub fn requested_region_size(geometry: &StaticGeometry, settings: &ChartingSettings) -> u32 {
    let scale = geometry.scale_in_lightmap.max(settings.min_object_scale);
    let side = (geometry.world_surface_area().sqrt() * settings.texel_density * scale).ceil();
    let max_side = settings.lightmap_size.saturating_sub(2 * settings.padding).max(1);
    if side.is_finite() {
        (side.max(1.0) as u32).min(max_side)
    } else {
        max_side
    }
}

/// Pack bakeable objects into charts numbered from `base_index`.
///
/// Objects are placed in input order, each into the first chart it fits.
pub fn generate_lightmap_charts(
    geometries: &[(GeometryKey, &StaticGeometry)],
    settings: &ChartingSettings,
    base_index: u32,
) -> Vec<LightmapChart> {
    let mut charts: Vec<LightmapChart> = Vec::new();

    for (key, geometry) in geometries.iter().filter(|(_, geometry)| geometry.bake_lightmap) {
        let side = requested_region_size(geometry, settings);
        let placed = charts
            .iter_mut()
            .any(|chart| chart.try_insert(*key, side, settings.padding));
        if placed {
            continue;
        }

        let mut chart = LightmapChart::new(base_index + charts.len() as u32, settings.lightmap_size);
        if chart.try_insert(*key, side, settings.padding) {
            charts.push(chart);
        }
    }

    debug!(
        "{} objects packed into {} lightmap charts starting at {}",
        charts.iter().map(|chart| chart.elements.len()).sum::<usize>(),
        charts.len(),
        base_index
    );
    charts
}

/// Write chart placements back to the scene
pub fn apply_lightmap_charts(collector: &mut dyn SceneCollector, charts: &[LightmapChart]) {
    for chart in charts {
        for element in &chart.elements {
            collector.set_lightmap_placement(element.object, chart.index, element.scale_offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::scene::{procedural, Material, StaticSceneCollector};

    fn scene_with_quads(scales: &[f32]) -> (StaticSceneCollector, Vec<GeometryKey>) {
        let mut collector = StaticSceneCollector::new();
        let keys = scales
            .iter()
            .enumerate()
            .map(|(index, scale)| {
                let transform = Mat4::new_translation(&Vec3::new(index as f32 * 20.0, 0.0, 0.0)) * Mat4::new_scaling(*scale);
                collector.add_geometry(procedural::quad_geometry("quad", transform, Material::default()))
            })
            .collect();
        (collector, keys)
    }

    fn chart(collector: &StaticSceneCollector, keys: &[GeometryKey], settings: &ChartingSettings) -> Vec<LightmapChart> {
        let geometries: Vec<(GeometryKey, &StaticGeometry)> =
            keys.iter().map(|key| (*key, collector.geometry(*key).unwrap())).collect();
        generate_lightmap_charts(&geometries, settings, 10)
    }

    #[test]
    fn test_requested_size_is_clamped() {
        let settings = ChartingSettings::new(64).with_padding(2).with_texel_density(4.0);
        let small = procedural::quad_geometry("small", Mat4::new_scaling(0.01), Material::default());
        let huge = procedural::quad_geometry("huge", Mat4::new_scaling(1000.0), Material::default());
        let medium = procedural::quad_geometry("medium", Mat4::new_scaling(3.0), Material::default());
        assert_eq!(requested_region_size(&small, &settings), 1);
        assert_eq!(requested_region_size(&huge, &settings), 60);
        assert_eq!(requested_region_size(&medium, &settings), 12);
    }

    #[test]
    fn test_regions_never_overlap_and_objects_appear_once() {
        let scales = [3.0, 5.0, 1.0, 7.0, 2.0, 8.0, 4.0, 6.0, 1.5, 9.0, 2.5, 3.5];
        let (collector, keys) = scene_with_quads(&scales);
        let settings = ChartingSettings::new(64).with_padding(2).with_texel_density(4.0);
        let charts = chart(&collector, &keys, &settings);

        assert!(charts.len() > 1);
        for (offset, chart) in charts.iter().enumerate() {
            assert_eq!(chart.index, 10 + offset as u32);
            for (i, a) in chart.elements.iter().enumerate() {
                let padded = a.rect.padded(settings.padding);
                assert!(padded.x + padded.width <= chart.size);
                assert!(padded.y + padded.height <= chart.size);
                for b in &chart.elements[i + 1..] {
                    assert!(!padded.overlaps(&b.rect.padded(settings.padding)));
                }
            }
        }

        for key in &keys {
            let count = charts
                .iter()
                .flat_map(|chart| chart.elements.iter())
                .filter(|element| element.object == *key)
                .count();
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn test_charting_is_deterministic() {
        let (collector, keys) = scene_with_quads(&[3.0, 5.0, 1.0, 7.0, 2.0]);
        let settings = ChartingSettings::new(32).with_padding(1).with_texel_density(2.0);
        let a = chart(&collector, &keys, &settings);
        let b = chart(&collector, &keys, &settings);
        assert_eq!(a.len(), b.len());
        for (a, b) in a.iter().zip(&b) {
            assert_eq!(a.elements, b.elements);
        }
    }

    #[test]
    fn test_scale_offset_matches_rect() {
        let (collector, keys) = scene_with_quads(&[4.0]);
        let settings = ChartingSettings::new(64).with_padding(1).with_texel_density(4.0);
        let charts = chart(&collector, &keys, &settings);
        let element = &charts[0].elements[0];
        assert_eq!(element.rect, TexelRect::new(1, 1, 16, 16));
        assert_eq!(element.scale_offset, Vec4::new(0.25, 0.25, 1.0 / 64.0, 1.0 / 64.0));
    }

    #[test]
    fn test_non_bakeable_objects_are_skipped() {
        let mut collector = StaticSceneCollector::new();
        let key = collector.add_geometry(
            procedural::quad_geometry("occluder", Mat4::identity(), Material::default()).with_bake_lightmap(false),
        );
        let charts = chart(&collector, &[key], &ChartingSettings::default());
        assert!(charts.is_empty());
    }
}
