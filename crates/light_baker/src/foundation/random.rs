//! Monte-Carlo sampling helpers
//!
//! Every baking kernel draws from an RNG seeded per element (texel or probe),
//! so results do not depend on how work is split across threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::math::{constants, utils, Vec2, Vec3};

/// Deterministic generator for one element of one pass
pub fn element_rng(seed: u64, stream: u64, element: usize) -> StdRng {
    let mut state = seed
        ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (element as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    // splitmix64 finalizer
    state = (state ^ (state >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    state = (state ^ (state >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    state ^= state >> 31;
    StdRng::seed_from_u64(state)
}

/// Uniformly distributed unit vector
pub fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let length_squared = candidate.norm_squared();
        if length_squared > constants::EPSILON && length_squared <= 1.0 {
            return candidate / length_squared.sqrt();
        }
    }
}

/// Uniformly distributed point inside the unit disk
pub fn random_disk_offset<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    loop {
        let candidate = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        if candidate.norm_squared() <= 1.0 {
            return candidate;
        }
    }
}

/// Cosine-weighted direction over the hemisphere around `normal`
pub fn random_hemisphere_direction<R: Rng + ?Sized>(rng: &mut R, normal: &Vec3) -> Vec3 {
    let (e1, e2) = utils::orthonormal_basis(normal);
    let phi = rng.gen::<f32>() * constants::TAU;
    let sin_theta = rng.gen::<f32>().sqrt();
    let cos_theta = (1.0 - sin_theta * sin_theta).max(0.0).sqrt();
    e1 * (phi.cos() * sin_theta) + e2 * (phi.sin() * sin_theta) + normal * cos_theta
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_element_rng_is_deterministic() {
        let a: f32 = element_rng(7, 3, 42).gen();
        let b: f32 = element_rng(7, 3, 42).gen();
        let c: f32 = element_rng(7, 3, 43).gen();
        assert_eq!(a.to_bits(), b.to_bits());
        assert_ne!(a.to_bits(), c.to_bits());
    }

    #[test]
    fn test_directions_are_unit_length() {
        let mut rng = element_rng(1, 0, 0);
        for _ in 0..100 {
            assert_relative_eq!(random_direction(&mut rng).norm(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_hemisphere_direction_faces_normal() {
        let mut rng = element_rng(2, 0, 0);
        let normal = Vec3::new(0.0, 1.0, 0.0);
        for _ in 0..100 {
            let direction = random_hemisphere_direction(&mut rng, &normal);
            assert!(direction.dot(&normal) >= -1e-5);
            assert_relative_eq!(direction.norm(), 1.0, epsilon = 1e-4);
        }
    }
}
