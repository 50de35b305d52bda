//! Scene description consumed by the baker
//!
//! Static geometry, lights, light probe groups and backgrounds, the [`SceneCollector`]
//! interface the baker queries them through, and an in-memory implementation of it.

mod background;
mod collector;
pub(crate) mod geometry;
mod light;
mod light_probe;
pub mod procedural;
mod static_collector;

pub use background::BakedSceneBackground;
pub use collector::{GeometryKey, LightKey, LightProbeGroupKey, SceneCollector};
pub use geometry::{GeometryLod, GeometryPart, Material, ModelVertex, StaticGeometry};
pub use light::{BakedLight, LightMode, LightType};
pub use light_probe::{LightProbeCollection, LightProbeGroup, LightProbeGroupBakedData, LightProbeSaveError};
pub use static_collector::StaticSceneCollector;
