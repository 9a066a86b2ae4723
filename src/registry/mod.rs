//! Reassembly registry.
//!
//! This module provides:
//! - [`Registry`]: tracks incomplete groups, merges complete ones, evicts stale ones
//! - [`SharedRegistry`]: the same registry behind a single mutex
//! - [`spawn_evictor`]: periodic eviction task for tokio hosts

mod config;
mod consumer;
mod group;
mod reassembly;
mod shared;
mod stats;

pub use config::{RegistryConfig, RegistryConfigError, DEFAULT_TIMEOUT};
pub use consumer::Consumer;
pub use reassembly::{AcceptOutcome, ReassemblyError, Registry};
pub use shared::{spawn_evictor, SharedRegistry};
pub use stats::RegistryStats;
