//! Filament ledger and reservation manager.
//!
//! This crate contains the material-side business rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod filament;
pub mod ledger;
pub mod reservation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use filament::{Filament, FilamentTotals, Lot, NewFilament, NewLot};
pub use ledger::{Ledger, ReserveOutcome};
pub use reservation::{Allocation, Reservation, ReservationItem};
