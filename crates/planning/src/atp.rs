//! Available-to-promise: how many units of a SKU can be both supplied with
//! material and printed in the near term.

use serde::{Deserialize, Serialize};

use filaforge_core::{DomainError, DomainResult};
use filaforge_production::{WINDOW_24H_MINUTES, WINDOW_72H_MINUTES};

use crate::shop::ShopState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bottleneck {
    Material,
    Machines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtpResult {
    pub sku: String,
    pub atp_now: u64,
    pub units_by_materials: u64,
    pub units_by_machines_24h: u64,
    pub units_by_machines_72h: u64,
    pub bottleneck: Bottleneck,
}

fn whole_units(amount: f64, per_unit: f64) -> u64 {
    if per_unit <= 0.0 || !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount / per_unit).floor() as u64
}

pub fn calculate_atp(state: &ShopState, sku: &str) -> DomainResult<AtpResult> {
    let sku = sku.trim();
    let mut records = state.ledger.filaments_by_sku(sku);
    let first = records
        .next()
        .ok_or_else(|| DomainError::not_found(format!("sku {sku}")))?;

    let free_grams: f64 =
        first.free_grams() + records.map(|f| f.free_grams()).sum::<f64>();
    let units_by_materials = whole_units(free_grams, first.grams_per_unit);

    let free_within = |window: f64| -> f64 {
        state
            .fleet
            .capable_of(&first.material)
            .map(|m| m.free_minutes(window))
            .sum()
    };
    let units_by_machines_24h =
        whole_units(free_within(WINDOW_24H_MINUTES), first.est_print_min_per_unit);
    let units_by_machines_72h =
        whole_units(free_within(WINDOW_72H_MINUTES), first.est_print_min_per_unit);

    let bottleneck = if units_by_materials <= units_by_machines_24h {
        Bottleneck::Material
    } else {
        Bottleneck::Machines
    };

    Ok(AtpResult {
        sku: sku.to_string(),
        atp_now: units_by_materials.min(units_by_machines_24h),
        units_by_materials,
        units_by_machines_24h,
        units_by_machines_72h,
        bottleneck,
    })
}
