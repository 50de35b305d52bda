//! Light probe groups and their baked data

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Vec3};
use crate::foundation::spherical_harmonics::SphericalHarmonicsDot9;
use crate::spatial::AABB;

/// Errors when persisting probe data
#[derive(thiserror::Error, Debug)]
pub enum LightProbeSaveError {
    /// File could not be opened or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

/// Baked lighting of every probe in a group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightProbeGroupBakedData {
    /// Irradiance per probe
    pub spherical_harmonics: Vec<SphericalHarmonicsDot9>,
    /// Average irradiance per probe
    pub ambient: Vec<Vec3>,
}

impl LightProbeGroupBakedData {
    /// Wrap per-probe SH, deriving the ambient term
    pub fn from_spherical_harmonics(spherical_harmonics: Vec<SphericalHarmonicsDot9>) -> Self {
        let ambient = spherical_harmonics.iter().map(SphericalHarmonicsDot9::ambient).collect();
        Self { spherical_harmonics, ambient }
    }

    /// Number of probes
    pub fn len(&self) -> usize {
        self.spherical_harmonics.len()
    }

    /// Whether there is no probe
    pub fn is_empty(&self) -> bool {
        self.spherical_harmonics.is_empty()
    }

    /// Write as bincode
    pub fn save_to_file(&self, path: &Path) -> Result<(), LightProbeSaveError> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Read a file written by [`Self::save_to_file`]
    pub fn load_from_file(path: &Path) -> Result<Self, LightProbeSaveError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

/// Set of probes placed together
#[derive(Debug, Clone)]
pub struct LightProbeGroup {
    /// Name used in diagnostics
    pub name: String,
    /// Group to world transform
    pub transform: Mat4,
    /// Probe positions in group space
    pub probes: Vec<Vec3>,
    /// Bit mask matched against light masks
    pub light_mask: u32,
    /// Background seen by rays leaving the probes
    pub background_id: u32,
    /// File the baked data is stored in, assigned during charting
    pub baked_data_file: Option<String>,
    /// Baked data, assigned when the bake is committed
    pub baked_data: Option<LightProbeGroupBakedData>,
}

impl LightProbeGroup {
    /// Create a group
    pub fn new(name: impl Into<String>, transform: Mat4, probes: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            transform,
            probes,
            light_mask: u32::MAX,
            background_id: 0,
            baked_data_file: None,
            baked_data: None,
        }
    }

    /// Probe positions in world space
    pub fn world_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.probes
            .iter()
            .map(|probe| self.transform.transform_point(&(*probe).into()).coords)
    }

    /// World bounds of the probes
    pub fn world_bounding_box(&self) -> AABB {
        let positions: Vec<Vec3> = self.world_positions().collect();
        AABB::from_points(&positions)
    }
}

/// Probes of several groups flattened into parallel arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightProbeCollection {
    /// World position per probe
    pub world_positions: Vec<Vec3>,
    /// Light mask per probe
    pub light_masks: Vec<u32>,
    /// Background per probe
    pub background_ids: Vec<u32>,
    /// Name per group
    pub names: Vec<String>,
    /// First probe per group
    pub offsets: Vec<usize>,
    /// Probe count per group
    pub counts: Vec<usize>,
    /// Groups owned by the chunk, stored before any other group
    pub num_unique_groups: usize,
}

impl LightProbeCollection {
    /// Append every probe of a group
    pub fn add_group(&mut self, group: &LightProbeGroup) {
        self.names.push(group.name.clone());
        self.offsets.push(self.world_positions.len());
        self.counts.push(group.probes.len());
        for position in group.world_positions() {
            self.world_positions.push(position);
            self.light_masks.push(group.light_mask);
            self.background_ids.push(group.background_id);
        }
    }

    /// Total number of probes
    pub fn num_probes(&self) -> usize {
        self.world_positions.len()
    }

    /// Number of groups
    pub fn num_groups(&self) -> usize {
        self.offsets.len()
    }

    /// Probe range of a group
    pub fn group_range(&self, group: usize) -> Range<usize> {
        self.offsets[group]..self.offsets[group] + self.counts[group]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::spherical_harmonics::SphericalHarmonicsColor9;

    #[test]
    fn test_collection_layout() {
        let mut collection = LightProbeCollection::default();
        let a = LightProbeGroup::new("a", Mat4::identity(), vec![Vec3::zeros(), Vec3::x()]);
        let b = LightProbeGroup::new("b", Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0)), vec![Vec3::zeros()]);
        collection.add_group(&a);
        collection.add_group(&b);

        assert_eq!(collection.num_probes(), 3);
        assert_eq!(collection.num_groups(), 2);
        assert_eq!(collection.group_range(1), 2..3);
        assert_eq!(collection.world_positions[2], Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_baked_data_file_round_trip() {
        let sh = SphericalHarmonicsDot9::from(SphericalHarmonicsColor9::from_direction(&Vec3::y(), &Vec3::new(1.0, 0.5, 0.0)));
        let data = LightProbeGroupBakedData::from_spherical_harmonics(vec![sh, SphericalHarmonicsDot9::default()]);
        assert_eq!(data.ambient[0], sh.ambient());

        let path = std::env::temp_dir().join(format!("light_baker_probes_{}.bin", std::process::id()));
        data.save_to_file(&path).unwrap();
        let loaded = LightProbeGroupBakedData::load_from_file(&path).unwrap();
        assert_eq!(loaded, data);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let path = std::env::temp_dir().join("light_baker_missing_dir").join("nested").join("probes.bin");
        let result = LightProbeGroupBakedData::default().save_to_file(&path);
        assert!(matches!(result, Err(LightProbeSaveError::Io(_))));
    }
}
