use filaforge_inventory::Ledger;
use filaforge_production::Fleet;

pub(crate) use filaforge_inventory::test_utils::{pla_verde, t0};
pub(crate) use filaforge_production::test_utils::printer;

use crate::shop::ShopState;

/// One filament with 1800g free and one idle PLA-capable printer.
pub(crate) fn scenario_state() -> ShopState {
    ShopState::new(
        Ledger::from_parts(vec![pla_verde()], vec![]),
        Fleet::from_machines(vec![printer("m1")]),
    )
}
