//! Third-order spherical harmonics for light probes
//!
//! [`SphericalHarmonicsColor9`] accumulates radiance samples. [`SphericalHarmonicsDot9`] is
//! the same signal convolved with the clamped cosine lobe, so evaluating it in a direction
//! yields irradiance for a surface facing that direction.

use std::ops::{Add, AddAssign, Mul};

use serde::{Deserialize, Serialize};

use super::math::Vec3;

/// Number of coefficients in a third-order basis
pub const NUM_COEFFICIENTS: usize = 9;

const BAND0: f32 = 0.282_095;
const BAND1: f32 = 0.488_603;
const BAND2_XY: f32 = 1.092_548;
const BAND2_ZZ: f32 = 0.315_392;
const BAND2_XX_YY: f32 = 0.546_274;

/// Cosine lobe convolution factors per band, divided by pi
const COSINE_LOBE: [f32; 3] = [1.0, 2.0 / 3.0, 0.25];

/// Evaluate the nine real basis functions in a unit direction
pub fn evaluate_basis(direction: &Vec3) -> [f32; NUM_COEFFICIENTS] {
    let (x, y, z) = (direction.x, direction.y, direction.z);
    [
        BAND0,
        BAND1 * y,
        BAND1 * z,
        BAND1 * x,
        BAND2_XY * x * y,
        BAND2_XY * y * z,
        BAND2_ZZ * (3.0 * z * z - 1.0),
        BAND2_XY * x * z,
        BAND2_XX_YY * (x * x - y * y),
    ]
}

fn band_of(index: usize) -> usize {
    match index {
        0 => 0,
        1..=3 => 1,
        _ => 2,
    }
}

/// Radiance projected onto the SH basis, one RGB triple per coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalHarmonicsColor9 {
    /// Coefficients in basis order
    pub coefficients: [Vec3; NUM_COEFFICIENTS],
}

impl Default for SphericalHarmonicsColor9 {
    fn default() -> Self {
        Self { coefficients: [Vec3::zeros(); NUM_COEFFICIENTS] }
    }
}

impl SphericalHarmonicsColor9 {
    /// Project light arriving from a single direction
    pub fn from_direction(direction: &Vec3, color: &Vec3) -> Self {
        let basis = evaluate_basis(direction);
        let mut result = Self::default();
        for (coefficient, weight) in result.coefficients.iter_mut().zip(basis) {
            *coefficient = color * weight;
        }
        result
    }
}

impl AddAssign for SphericalHarmonicsColor9 {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.coefficients.iter_mut().zip(rhs.coefficients) {
            *lhs += rhs;
        }
    }
}

impl Mul<f32> for SphericalHarmonicsColor9 {
    type Output = Self;

    fn mul(mut self, rhs: f32) -> Self {
        for coefficient in &mut self.coefficients {
            *coefficient *= rhs;
        }
        self
    }
}

/// Irradiance in SH form, ready to be evaluated with a surface normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalHarmonicsDot9 {
    /// Convolved coefficients in basis order
    pub coefficients: [Vec3; NUM_COEFFICIENTS],
}

impl Default for SphericalHarmonicsDot9 {
    fn default() -> Self {
        Self { coefficients: [Vec3::zeros(); NUM_COEFFICIENTS] }
    }
}

impl From<SphericalHarmonicsColor9> for SphericalHarmonicsDot9 {
    fn from(sh: SphericalHarmonicsColor9) -> Self {
        let mut result = Self::default();
        for (index, coefficient) in sh.coefficients.iter().enumerate() {
            result.coefficients[index] = coefficient * COSINE_LOBE[band_of(index)];
        }
        result
    }
}

impl SphericalHarmonicsDot9 {
    /// Irradiance for a surface facing `normal`
    pub fn evaluate(&self, normal: &Vec3) -> Vec3 {
        let basis = evaluate_basis(normal);
        self.coefficients
            .iter()
            .zip(basis)
            .fold(Vec3::zeros(), |sum, (coefficient, weight)| sum + coefficient * weight)
    }

    /// Direction-independent part of the irradiance
    pub fn ambient(&self) -> Vec3 {
        self.coefficients[0] * BAND0
    }
}

impl Add for SphericalHarmonicsDot9 {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for SphericalHarmonicsDot9 {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.coefficients.iter_mut().zip(rhs.coefficients) {
            *lhs += rhs;
        }
    }
}

impl Mul<f32> for SphericalHarmonicsDot9 {
    type Output = Self;

    fn mul(mut self, rhs: f32) -> Self {
        for coefficient in &mut self.coefficients {
            *coefficient *= rhs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::PI;
    use crate::foundation::random::{element_rng, random_direction};
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_environment_gives_constant_irradiance() {
        // Integrate a white environment over the sphere with Monte-Carlo weights
        let mut rng = element_rng(11, 0, 0);
        let num_samples = 20_000;
        let mut accumulated = SphericalHarmonicsColor9::default();
        for _ in 0..num_samples {
            let direction = random_direction(&mut rng);
            accumulated += SphericalHarmonicsColor9::from_direction(&direction, &Vec3::new(1.0, 1.0, 1.0));
        }
        let sh = SphericalHarmonicsDot9::from(accumulated * (4.0 * PI / num_samples as f32));

        // Irradiance from a unit white sky is pi, SH dot form divides by pi
        let up = sh.evaluate(&Vec3::new(0.0, 1.0, 0.0));
        let down = sh.evaluate(&Vec3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(up.x, 1.0, epsilon = 0.05);
        assert_relative_eq!(down.x, 1.0, epsilon = 0.05);
        assert_relative_eq!(sh.ambient().x, 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_single_direction_is_brightest_along_itself() {
        let direction = Vec3::new(0.0, 0.0, 1.0);
        let sh = SphericalHarmonicsDot9::from(SphericalHarmonicsColor9::from_direction(
            &direction,
            &Vec3::new(1.0, 0.5, 0.25),
        ));
        let facing = sh.evaluate(&direction);
        let away = sh.evaluate(&-direction);
        assert!(facing.x > away.x);
        assert!(facing.x > 0.0);
    }
}
