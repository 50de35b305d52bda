//! Scene chunks and their processing order

use crate::foundation::math::{utils, IntVec3, Vec3};

use super::AABB;

/// Integer index of a chunk cell
pub type ChunkIndex = IntVec3;

const NUM_COMPONENTS: u32 = 3;
const BITS_PER_COMPONENT: u32 = u64::BITS / NUM_COMPONENTS;

/// Interleave the bits of `index - base` into a Morton code.
///
/// Bit `i` of component `j` lands at bit `i * 3 + j`, so chunks close in space get
/// close codes. Components must not be smaller than the base.
pub fn swizzle(index: &ChunkIndex, base: &ChunkIndex) -> u64 {
    let xyz = [
        (index.x - base.x) as u32,
        (index.y - base.y) as u32,
        (index.z - base.z) as u32,
    ];

    let mut result = 0u64;
    for (j, component) in xyz.iter().enumerate() {
        for i in 0..BITS_PER_COMPONENT {
            let bit = u64::from((component >> i) & 1);
            result |= bit << (i * NUM_COMPONENTS + j as u32);
        }
    }
    result
}

/// Sort chunks along the Morton curve relative to the minimum chunk index
pub fn sort_chunks(chunks: &mut [ChunkIndex]) {
    let Some(first) = chunks.first() else {
        return;
    };
    let base = chunks.iter().fold(*first, |acc, chunk| utils::min_int_vec3(&acc, chunk));
    chunks.sort_by_key(|chunk| swizzle(chunk, &base));
}

/// Chunk containing a world position
pub fn chunk_of_position(position: &Vec3, chunk_size: &Vec3) -> ChunkIndex {
    let scaled = position.component_div(chunk_size);
    IntVec3::new(scaled.x.floor() as i32, scaled.y.floor() as i32, scaled.z.floor() as i32)
}

/// World-space bounds of a chunk
pub fn chunk_bounding_box(chunk: &ChunkIndex, chunk_size: &Vec3) -> AABB {
    let min = chunk.cast::<f32>().component_mul(chunk_size);
    AABB::new(min, min + chunk_size)
}
