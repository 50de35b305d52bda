//! Progress reporting and cancellation

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Stage of a bake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakerPhase {
    /// Baking has not started
    NotStarted,
    /// Direct light of lightmaps
    BakingDirectLighting,
    /// Indirect light, filtering and output
    BakingIndirectLighting,
    /// Results are being committed
    Finalizing,
}

impl BakerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::BakingDirectLighting,
            2 => Self::BakingIndirectLighting,
            3 => Self::Finalizing,
            _ => Self::NotStarted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::BakingDirectLighting => 1,
            Self::BakingIndirectLighting => 2,
            Self::Finalizing => 3,
        }
    }
}

/// Bake progress readable from any thread
#[derive(Debug, Default)]
pub struct BakerStatus {
    phase: AtomicU8,
    processed_lightmaps: AtomicUsize,
    total_lightmaps: AtomicUsize,
}

impl BakerStatus {
    /// Current phase
    pub fn phase(&self) -> BakerPhase {
        BakerPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    /// Lightmaps processed in the current phase
    pub fn processed_lightmaps(&self) -> usize {
        self.processed_lightmaps.load(Ordering::Relaxed)
    }

    /// Lightmaps to process in the current phase
    pub fn total_lightmaps(&self) -> usize {
        self.total_lightmaps.load(Ordering::Relaxed)
    }

    pub(crate) fn begin_phase(&self, phase: BakerPhase, total_lightmaps: usize) {
        self.phase.store(phase.as_u8(), Ordering::Relaxed);
        self.processed_lightmaps.store(0, Ordering::Relaxed);
        self.total_lightmaps.store(total_lightmaps, Ordering::Relaxed);
    }

    pub(crate) fn set_phase(&self, phase: BakerPhase) {
        self.phase.store(phase.as_u8(), Ordering::Relaxed);
    }

    pub(crate) fn set_processed_lightmaps(&self, processed_lightmaps: usize) {
        self.processed_lightmaps.store(processed_lightmaps, Ordering::Relaxed);
    }

    pub(crate) fn lightmap_processed(&self) {
        self.processed_lightmaps.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for BakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (current, total) = (self.processed_lightmaps(), self.total_lightmaps());
        match self.phase() {
            BakerPhase::NotStarted => write!(f, "Not started."),
            BakerPhase::BakingDirectLighting => write!(f, "Baking direct lighting: {current}/{total} lightmaps..."),
            BakerPhase::BakingIndirectLighting => write!(f, "Baking indirect lighting: {current}/{total} lightmaps..."),
            BakerPhase::Finalizing => write!(f, "Finalizing..."),
        }
    }
}

/// Cancellation flag shared between the baking thread and its owner
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Create a token that is not stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the bake to stop at the next lightmap or chunk boundary
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
