//! Containers of traced light

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::foundation::logging::warn;
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::foundation::spherical_harmonics::SphericalHarmonicsDot9;
use crate::geometry_buffer::nearest_texel;
use crate::scene::LightProbeGroupBakedData;

/// Direct light of one lightmap chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightmapChartBakedDirect {
    /// Width and height in texels
    pub lightmap_size: u32,
    /// Light stored in the lightmap: emission and fully baked lights
    pub direct_light: Vec<Vec3>,
    /// Light leaving the surface, seen by bounced rays: emission and every light
    pub surface_light: Vec<Vec3>,
    /// Surface albedo, used to attenuate bounces
    pub albedo: Vec<Vec3>,
}

impl LightmapChartBakedDirect {
    /// Black chart
    pub fn new(lightmap_size: u32) -> Self {
        let num_texels = (lightmap_size as usize) * (lightmap_size as usize);
        Self {
            lightmap_size,
            direct_light: vec![Vec3::zeros(); num_texels],
            surface_light: vec![Vec3::zeros(); num_texels],
            albedo: vec![Vec3::zeros(); num_texels],
        }
    }

    /// Index of the texel containing a chart UV
    pub fn nearest_location(&self, uv: &Vec2) -> usize {
        nearest_texel(self.lightmap_size, uv)
    }
}

/// Indirect light of one lightmap chart.
///
/// Texels accumulate the sum of samples in `xyz` and the sample count in `w` until
/// [`normalize_light`](Self::normalize_light) divides them out.
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapChartBakedIndirect {
    /// Width and height in texels
    pub lightmap_size: u32,
    /// Accumulated or normalized light
    pub light: Vec<Vec4>,
    normalized: bool,
}

impl LightmapChartBakedIndirect {
    /// Empty accumulator
    pub fn new(lightmap_size: u32) -> Self {
        let num_texels = (lightmap_size as usize) * (lightmap_size as usize);
        Self {
            lightmap_size,
            light: vec![Vec4::zeros(); num_texels],
            normalized: false,
        }
    }

    /// Clear the accumulator for another pass
    pub fn reset(&mut self) {
        self.light.iter_mut().for_each(|texel| *texel = Vec4::zeros());
        self.normalized = false;
    }

    /// Whether samples were already divided out
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Divide accumulated light by sample count. Returns `false` when already normalized.
    pub fn normalize_light(&mut self) -> bool {
        if self.normalized {
            warn!("Indirect light is already normalized");
            return false;
        }

        for texel in &mut self.light {
            if texel.w > 0.0 {
                *texel /= texel.w;
            }
        }
        self.normalized = true;
        true
    }
}

/// Light of every probe of a [`LightProbeCollection`](crate::scene::LightProbeCollection)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightProbeCollectionBakedData {
    /// Irradiance per probe
    pub spherical_harmonics: Vec<SphericalHarmonicsDot9>,
}

impl LightProbeCollectionBakedData {
    /// Black probes
    pub fn new(num_probes: usize) -> Self {
        Self { spherical_harmonics: vec![SphericalHarmonicsDot9::default(); num_probes] }
    }

    /// Number of probes
    pub fn len(&self) -> usize {
        self.spherical_harmonics.len()
    }

    /// Whether there are no probes
    pub fn is_empty(&self) -> bool {
        self.spherical_harmonics.is_empty()
    }

    /// Data of one group, with ambient computed
    pub fn group_data(&self, range: Range<usize>) -> LightProbeGroupBakedData {
        LightProbeGroupBakedData::from_spherical_harmonics(self.spherical_harmonics[range].to_vec())
    }
}

/// Final light of a lightmap chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedLightmap {
    /// Width and height in texels
    pub lightmap_size: u32,
    /// Linear light per texel
    pub lighting: Vec<Vec3>,
}

impl BakedLightmap {
    /// Black lightmap
    pub fn new(lightmap_size: u32) -> Self {
        Self {
            lightmap_size,
            lighting: vec![Vec3::zeros(); (lightmap_size as usize) * (lightmap_size as usize)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_happens_once() {
        let mut indirect = LightmapChartBakedIndirect::new(2);
        indirect.light[0] = Vec4::new(2.0, 4.0, 6.0, 2.0);
        indirect.light[1] = Vec4::new(1.0, 1.0, 1.0, 0.0);

        assert!(indirect.normalize_light());
        assert_relative_eq!(indirect.light[0], Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(indirect.light[1], Vec4::new(1.0, 1.0, 1.0, 0.0));

        assert!(!indirect.normalize_light());
        assert_relative_eq!(indirect.light[0], Vec4::new(1.0, 2.0, 3.0, 1.0));

        indirect.reset();
        assert!(!indirect.is_normalized());
        assert!(indirect.light.iter().all(|texel| *texel == Vec4::zeros()));
        assert!(indirect.normalize_light());
    }

    #[test]
    fn test_group_data_slices_probes() {
        let mut data = LightProbeCollectionBakedData::new(3);
        data.spherical_harmonics[2].coefficients[0] = Vec3::new(1.0, 0.0, 0.0);
        let group = data.group_data(1..3);
        assert_eq!(group.len(), 2);
        assert!(group.ambient[1].x > 0.0);
        assert_eq!(group.ambient[0], Vec3::zeros());
    }
}
