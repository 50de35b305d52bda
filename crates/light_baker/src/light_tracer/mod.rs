//! Light tracing passes
//!
//! Direct passes trace shadow rays from texels and probes toward lights. Indirect
//! passes trace paths that pick up the surface light cached by the direct passes.
//! Every element draws from its own seeded generator, see [`element_rng`].
//!
//! [`element_rng`]: crate::foundation::random::element_rng

mod baked_light;
mod direct;
mod indirect;

pub use baked_light::{BakedLightmap, LightProbeCollectionBakedData, LightmapChartBakedDirect, LightmapChartBakedIndirect};
pub use direct::{bake_direct_light_for_charts, bake_direct_light_for_light_probes, bake_emission_light};
pub use indirect::{bake_indirect_light_for_charts, bake_indirect_light_for_light_probes, IndirectLightSources};

use rand::rngs::StdRng;

use crate::foundation::random::element_rng;

/// Monte-Carlo pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingPass {
    /// Shadow rays from lightmap texels
    DirectCharts,
    /// Shadow rays from probes
    DirectProbes,
    /// Paths from lightmap texels
    IndirectCharts,
    /// Paths from probes
    IndirectProbes,
}

/// Random numbers of one pass over one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomStream {
    seed: u64,
    stream: u64,
}

impl RandomStream {
    /// Stream of `pass` over a lightmap or chunk `target`, optionally for one `light`
    pub fn new(seed: u64, pass: TracingPass, target: u64, light: u64) -> Self {
        let pass = match pass {
            TracingPass::DirectCharts => 1u64,
            TracingPass::DirectProbes => 2,
            TracingPass::IndirectCharts => 3,
            TracingPass::IndirectProbes => 4,
        };
        Self { seed, stream: (pass << 56) ^ (target << 24) ^ light }
    }

    /// Generator of one texel or probe
    pub fn rng(&self, element: usize) -> StdRng {
        element_rng(self.seed, self.stream, element)
    }
}
