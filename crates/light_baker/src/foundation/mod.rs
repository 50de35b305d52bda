//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the baker:
//! - Math types and operations
//! - Monte-Carlo sampling helpers
//! - Data-parallel loops
//! - Spherical harmonics
//! - Logging utilities

pub mod math;
pub mod random;
pub mod parallel;
pub mod spherical_harmonics;
pub mod logging;
