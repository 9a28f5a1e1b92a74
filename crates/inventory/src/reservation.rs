//! Order-scoped material claims and the FIFO allocation planner.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filaforge_core::{DomainError, DomainResult, EPSILON, FilamentId, LotId, OrderId};

use crate::filament::Filament;

/// One requested line of a reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationItem {
    pub sku: String,
    pub qty: u32,
    /// Per-order weight override; falls back to the filament's `gramsPerUnit`.
    pub grams_per_unit: Option<f64>,
}

impl ReservationItem {
    pub fn new(sku: impl Into<String>, qty: u32) -> Self {
        Self {
            sku: sku.into(),
            qty,
            grams_per_unit: None,
        }
    }

    pub fn with_grams_per_unit(mut self, grams: f64) -> Self {
        self.grams_per_unit = Some(grams);
        self
    }

    fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("item sku is required"));
        }
        if self.qty == 0 {
            return Err(DomainError::validation(format!(
                "qty for {} must be positive",
                self.sku
            )));
        }
        if let Some(g) = self.grams_per_unit {
            if !g.is_finite() || g <= 0.0 {
                return Err(DomainError::validation(format!(
                    "gramsPerUnit override for {} must be positive",
                    self.sku
                )));
            }
        }
        Ok(())
    }

    /// Grams this line needs given the filament it resolves to.
    pub fn grams_needed(&self, filament: &Filament) -> f64 {
        self.grams_per_unit.unwrap_or(filament.grams_per_unit) * f64::from(self.qty)
    }
}

/// Grams claimed from one lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub filament_id: FilamentId,
    pub lot_id: LotId,
    pub grams: f64,
}

/// A provisional claim held for one order until consumed or released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub order_id: OrderId,
    pub allocations: Vec<Allocation>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn total_grams(&self) -> f64 {
        self.allocations.iter().map(|a| a.grams).sum()
    }
}

/// Validate a reserve request before touching any state.
pub fn validate_items(items: &[ReservationItem]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation("reservation needs at least one item"));
    }
    items.iter().try_for_each(ReservationItem::validate)
}

/// Plan FIFO allocations for every item without mutating anything.
///
/// Grams claimed by earlier items of the same request are tracked in a scratch
/// map, so a SKU listed twice cannot be promised the same grams twice. Either
/// every item is satisfied and the full plan is returned, or nothing is.
pub fn plan_allocations(
    filaments: &[Filament],
    items: &[ReservationItem],
) -> DomainResult<Vec<Allocation>> {
    let mut claimed: HashMap<(usize, usize), f64> = HashMap::new();
    let mut plan: Vec<Allocation> = Vec::new();

    for item in items {
        let (fi, filament) = filaments
            .iter()
            .enumerate()
            .find(|(_, f)| f.sku == item.sku.trim())
            .ok_or_else(|| DomainError::not_found(format!("filament with sku {}", item.sku)))?;

        let lot_free = |li: usize, free: f64, claimed: &HashMap<(usize, usize), f64>| {
            (free - claimed.get(&(fi, li)).copied().unwrap_or(0.0)).max(0.0)
        };

        let needed = item.grams_needed(filament);
        let free: f64 = filament
            .lots
            .iter()
            .enumerate()
            .map(|(li, lot)| lot_free(li, lot.free(), &claimed))
            .sum();
        if free + EPSILON < needed {
            return Err(DomainError::insufficient_stock(&filament.sku, needed, free));
        }

        let mut remaining = needed;
        for (li, lot) in filament.lots.iter().enumerate() {
            if remaining <= EPSILON {
                break;
            }
            let available = lot_free(li, lot.free(), &claimed);
            if available <= EPSILON {
                continue;
            }
            let take = available.min(remaining);
            *claimed.entry((fi, li)).or_insert(0.0) += take;
            remaining -= take;

            match plan
                .iter_mut()
                .find(|a| a.filament_id == filament.id && a.lot_id == lot.id)
            {
                Some(existing) => existing.grams += take,
                None => plan.push(Allocation {
                    filament_id: filament.id.clone(),
                    lot_id: lot.id.clone(),
                    grams: take,
                }),
            }
        }
    }

    Ok(plan)
}

/// Claim planned grams on their lots.
pub(crate) fn apply_claims(filaments: &mut [Filament], allocations: &[Allocation]) {
    for a in allocations {
        let lot = filaforge_core::entity::find_mut(filaments, &a.filament_id)
            .and_then(|f| f.lot_mut(&a.lot_id));
        if let Some(lot) = lot {
            lot.reserved = (lot.reserved + a.grams).min(lot.grams);
        }
    }
}

/// Return claimed grams to the free pool.
pub(crate) fn release_claims(filaments: &mut [Filament], allocations: &[Allocation]) {
    for a in allocations {
        let lot = filaforge_core::entity::find_mut(filaments, &a.filament_id)
            .and_then(|f| f.lot_mut(&a.lot_id));
        if let Some(lot) = lot {
            lot.unclaim(a.grams);
        }
    }
}

/// Turn claimed grams into physical consumption.
pub(crate) fn consume_claims(filaments: &mut [Filament], allocations: &[Allocation]) {
    for a in allocations {
        let lot = filaforge_core::entity::find_mut(filaments, &a.filament_id)
            .and_then(|f| f.lot_mut(&a.lot_id));
        if let Some(lot) = lot {
            lot.consume(a.grams);
        }
    }
}
