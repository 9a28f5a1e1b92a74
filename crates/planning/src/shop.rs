use filaforge_inventory::Ledger;
use filaforge_production::Fleet;

/// Complete mutable state of the shop: material ledger plus machine fleet.
///
/// Cloned as a unit by the engine so that a mutation can be applied to a
/// working copy and published only once it has succeeded and been persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShopState {
    pub ledger: Ledger,
    pub fleet: Fleet,
}

impl ShopState {
    pub fn new(ledger: Ledger, fleet: Fleet) -> Self {
        Self { ledger, fleet }
    }
}
