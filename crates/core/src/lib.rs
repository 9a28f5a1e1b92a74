//! `filaforge-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, the entity trait and engine configuration.

pub mod config;
pub mod entity;
pub mod error;
pub mod id;

pub use config::{ConfigError, EngineConfig};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{FilamentId, JobId, LotId, MachineId, OrderId};

/// Comparison tolerance for gram and minute quantities.
pub const EPSILON: f64 = 1e-6;
