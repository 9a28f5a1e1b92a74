//! Shop-wide planning: combined state, alerts, available-to-promise and the
//! snapshot read model.
//!
//! Everything here is derived on demand from a [`ShopState`]; nothing is cached.

pub mod alerts;
pub mod atp;
pub mod shop;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_support;

pub use alerts::{Alert, AlertKind, derive_alerts};
pub use atp::{AtpResult, Bottleneck, calculate_atp};
pub use shop::ShopState;
pub use snapshot::{FilamentView, JobView, MachineView, Snapshot};
