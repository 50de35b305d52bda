//! # Light Baker
//!
//! Incremental lightmap and light probe baker for static scenes.
//!
//! ## Features
//!
//! - **Chunked Baking**: The scene is split into chunks processed one at a time, each with
//!   only its neighbourhood in memory
//! - **Lightmaps**: Direct, emissive and multi-bounce indirect light per texel, filtered
//!   and stitched across UV seams
//! - **Light Probes**: Spherical harmonics probes, interpolated through a tetrahedral mesh
//! - **Restartable**: Baking state is plain data and can be checkpointed and resumed
//! - **Deterministic**: Every traced element draws from its own seeded generator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use light_baker::prelude::*;
//!
//! let mut collector = StaticSceneCollector::new().with_scene_file_name("room.scene");
//! for wall in light_baker::scene::procedural::box_room(4.0, Vec3::new(2.0, 2.0, 2.0)) {
//!     collector.add_geometry(wall);
//! }
//!
//! let mut baker = IncrementalLightBaker::initialize(
//!     LightBakingSettings::new(),
//!     &mut collector,
//!     Arc::new(BakedLightMemoryCache::new()),
//!     Arc::new(SoftwareGeometryBufferBaker::new()),
//! )?;
//! baker.process_scene(&mut collector);
//! if baker.bake(&StopToken::new()) {
//!     baker.commit_scene(&mut collector);
//! }
//! # Ok::<(), light_baker::baker::BakeError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod spatial;
pub mod scene;
pub mod raytracing;
pub mod charting;
pub mod geometry_buffer;
pub mod light_tracer;
pub mod filter;
pub mod stitcher;
pub mod cache;
pub mod baker;

/// Common imports for baker users
pub mod prelude {
    pub use crate::{
        baker::{BakeError, BakerCheckpoint, BakerPhase, BakerStatus, BakingState, IncrementalLightBaker, StopToken},
        cache::{BakedLightCache, BakedLightDiskCache, BakedLightMemoryCache},
        config::{Config, LightBakingSettings},
        foundation::math::{Mat4, Vec2, Vec3},
        geometry_buffer::{GeometryBufferBaker, SoftwareGeometryBufferBaker},
        scene::{
            BakedLight, BakedSceneBackground, GeometryPart, LightProbeGroup, Material, SceneCollector,
            StaticGeometry, StaticSceneCollector,
        },
    };
}
