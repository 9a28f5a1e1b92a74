use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filaforge_core::{DomainError, DomainResult, EPSILON, EngineConfig, Entity, FilamentId, LotId};

/// Default filament diameter in millimetres.
pub const DEFAULT_DIAMETER_MM: f64 = 1.75;

/// A discrete, timestamped batch of material.
///
/// Invariant: `0 <= reserved <= grams`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: LotId,
    /// Physical mass on the shelf.
    pub grams: f64,
    /// Mass claimed by open reservations but not yet consumed.
    pub reserved: f64,
    pub received_at: DateTime<Utc>,
}

impl Lot {
    pub fn new(id: LotId, grams: f64, received_at: DateTime<Utc>) -> Self {
        Self {
            id,
            grams,
            reserved: 0.0,
            received_at,
        }
    }

    /// Unclaimed mass in this lot.
    pub fn free(&self) -> f64 {
        (self.grams - self.reserved).max(0.0)
    }

    pub fn is_fully_claimed(&self) -> bool {
        self.free() <= EPSILON
    }

    /// Drop `grams` of claim (floored at zero).
    pub(crate) fn unclaim(&mut self, grams: f64) {
        self.reserved = (self.reserved - grams).max(0.0);
    }

    /// Remove `grams` of claim and the same physical mass (floored at zero).
    pub(crate) fn consume(&mut self, grams: f64) {
        self.unclaim(grams);
        self.grams = (self.grams - grams).max(0.0);
        self.reserved = self.reserved.min(self.grams);
    }
}

impl Entity for Lot {
    type Id = LotId;

    fn id(&self) -> &LotId {
        &self.id
    }
}

/// Aggregated mass figures for one filament.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilamentTotals {
    pub grams_available: f64,
    pub grams_reserved: f64,
    pub free_grams: f64,
}

/// A raw-material SKU and the lots that hold it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filament {
    pub id: FilamentId,
    pub sku: String,
    pub material: String,
    pub color: String,
    pub diameter: f64,
    pub grams_per_unit: f64,
    pub est_print_min_per_unit: f64,
    pub reorder_point_grams: f64,
    /// Ordered oldest-received first.
    pub lots: Vec<Lot>,
}

/// Payload: create a filament.
///
/// Text fields default to empty so that a missing field surfaces as a
/// validation error rather than a decoding error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFilament {
    pub id: Option<String>,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub color: String,
    pub diameter: Option<f64>,
    pub grams_per_unit: Option<f64>,
    pub est_print_min_per_unit: Option<f64>,
    pub reorder_point_grams: Option<f64>,
    #[serde(default)]
    pub lots: Vec<NewLot>,
}

/// Payload: an initial or newly received lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLot {
    pub id: Option<String>,
    pub grams: f64,
    pub received_at: Option<DateTime<Utc>>,
}

fn required_text(value: &str, field: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn lot_grams(grams: f64) -> DomainResult<f64> {
    if !grams.is_finite() || grams <= 0.0 {
        return Err(DomainError::validation("lot grams must be positive"));
    }
    Ok(grams)
}

fn positive_or(value: Option<f64>, default: f64, field: &str) -> DomainResult<f64> {
    let v = value.unwrap_or(default);
    if !v.is_finite() || v <= 0.0 {
        return Err(DomainError::validation(format!("{field} must be positive")));
    }
    Ok(v)
}

impl Filament {
    /// Validate a create payload and build the filament.
    ///
    /// Uniqueness of id and SKU is checked by the ledger, not here.
    pub fn create(
        payload: &NewFilament,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sku = required_text(&payload.sku, "sku")?;
        let material = required_text(&payload.material, "material")?;
        let color = required_text(&payload.color, "color")?;

        let id = match &payload.id {
            Some(raw) => FilamentId::parse(raw.as_str())?,
            None => FilamentId::generate(),
        };

        let diameter = positive_or(payload.diameter, DEFAULT_DIAMETER_MM, "diameter")?;
        let grams_per_unit =
            positive_or(payload.grams_per_unit, config.default_grams_per_unit, "gramsPerUnit")?;
        let est_print_min_per_unit = positive_or(
            payload.est_print_min_per_unit,
            config.default_est_print_min_per_unit,
            "estPrintMinPerUnit",
        )?;

        let mut filament = Self {
            id,
            sku,
            material,
            color,
            diameter,
            grams_per_unit,
            est_print_min_per_unit,
            reorder_point_grams: 0.0,
            lots: Vec::new(),
        };
        filament.set_reorder_point(payload.reorder_point_grams.unwrap_or(0.0));

        for lot in &payload.lots {
            let grams = lot_grams(lot.grams)?;
            let lot_id = match &lot.id {
                Some(raw) => LotId::parse(raw.as_str())?,
                None => LotId::generate(),
            };
            if filament.lots.iter().any(|l| l.id == lot_id) {
                return Err(DomainError::conflict(format!("duplicate lot id {lot_id}")));
            }
            filament.insert_lot(Lot::new(lot_id, grams, lot.received_at.unwrap_or(now)));
        }

        Ok(filament)
    }

    pub fn totals(&self) -> FilamentTotals {
        let grams_available: f64 = self.lots.iter().map(|l| l.grams).sum();
        let grams_reserved: f64 = self.lots.iter().map(|l| l.reserved).sum();
        FilamentTotals {
            grams_available,
            grams_reserved,
            free_grams: (grams_available - grams_reserved).max(0.0),
        }
    }

    pub fn free_grams(&self) -> f64 {
        self.totals().free_grams
    }

    pub fn is_below_reorder_point(&self) -> bool {
        self.free_grams() <= self.reorder_point_grams
    }

    pub fn lot(&self, lot_id: &LotId) -> Option<&Lot> {
        filaforge_core::entity::find(&self.lots, lot_id)
    }

    pub(crate) fn lot_mut(&mut self, lot_id: &LotId) -> Option<&mut Lot> {
        filaforge_core::entity::find_mut(&mut self.lots, lot_id)
    }

    /// Insert keeping lots ordered by `received_at`; ties keep arrival order.
    fn insert_lot(&mut self, lot: Lot) {
        let idx = self.lots.partition_point(|l| l.received_at <= lot.received_at);
        self.lots.insert(idx, lot);
    }

    /// Restore oldest-first order (used after loading from storage).
    pub fn sort_lots(&mut self) {
        self.lots.sort_by_key(|l| l.received_at);
    }

    /// Clamp to `>= 0`; non-finite input resets to zero.
    pub fn set_reorder_point(&mut self, grams: f64) {
        self.reorder_point_grams = if grams.is_finite() { grams.max(0.0) } else { 0.0 };
    }

    /// Formally receive a new lot.
    pub fn receive_lot(
        &mut self,
        lot_id: Option<LotId>,
        grams: f64,
        received_at: DateTime<Utc>,
    ) -> DomainResult<LotId> {
        let grams = lot_grams(grams)?;
        let lot_id = lot_id.unwrap_or_else(LotId::generate);
        if self.lot(&lot_id).is_some() {
            return Err(DomainError::conflict(format!("lot {lot_id} already exists")));
        }
        self.insert_lot(Lot::new(lot_id.clone(), grams, received_at));
        Ok(lot_id)
    }

    /// Apply an out-of-band mass correction (waste, untracked receipt).
    ///
    /// Positive deltas land on the oldest lot. Negative deltas draw unreserved
    /// mass oldest-first so no lot ends up with `reserved > grams`. A zero delta
    /// changes nothing.
    pub fn adjust_grams(&mut self, delta: f64, now: DateTime<Utc>) -> DomainResult<()> {
        if !delta.is_finite() {
            return Err(DomainError::validation("delta must be a finite number"));
        }
        if delta == 0.0 {
            return Ok(());
        }

        let totals = self.totals();
        let resulting = totals.grams_available + delta;
        if resulting + EPSILON < totals.grams_reserved {
            return Err(DomainError::state(format!(
                "adjustment would leave {resulting}g available below {}g reserved",
                totals.grams_reserved
            )));
        }

        if delta > 0.0 {
            match self.lots.first_mut() {
                Some(oldest) => oldest.grams += delta,
                None => self.insert_lot(Lot::new(LotId::generate(), delta, now)),
            }
            return Ok(());
        }

        let mut remaining = -delta;
        for lot in self.lots.iter_mut() {
            if remaining <= EPSILON {
                break;
            }
            let take = lot.free().min(remaining);
            if take <= 0.0 {
                continue;
            }
            lot.grams -= take;
            remaining -= take;
        }
        Ok(())
    }
}

impl Entity for Filament {
    type Id = FilamentId;

    fn id(&self) -> &FilamentId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pla_verde, t0};
    use chrono::Duration;

    fn payload() -> NewFilament {
        NewFilament {
            sku: "PETG-NEGRO-175".to_string(),
            material: "PETG".to_string(),
            color: "negro".to_string(),
            ..NewFilament::default()
        }
    }

    #[test]
    fn totals_aggregate_over_lots() {
        let f = pla_verde();
        let totals = f.totals();
        assert_eq!(totals.grams_available, 2000.0);
        assert_eq!(totals.grams_reserved, 200.0);
        assert_eq!(totals.free_grams, 1800.0);
        assert!(!f.is_below_reorder_point());
    }

    #[test]
    fn negative_adjust_draws_unreserved_mass_oldest_first() {
        let mut f = pla_verde();
        f.adjust_grams(-1300.0, t0()).unwrap();

        assert_eq!(f.lots[0].grams, 200.0);
        assert_eq!(f.lots[0].reserved, 200.0);
        assert_eq!(f.lots[1].grams, 500.0);
        assert_eq!(f.free_grams(), 500.0);
        assert!(f.is_below_reorder_point());
    }

    #[test]
    fn adjust_below_reserved_is_a_state_error_without_side_effects() {
        let mut f = pla_verde();
        let before = f.clone();
        let err = f.adjust_grams(-1801.0, t0()).unwrap_err();
        assert!(matches!(err, DomainError::State(_)));
        assert_eq!(f, before);
    }

    #[test]
    fn adjust_down_to_exactly_reserved_is_allowed() {
        let mut f = pla_verde();
        f.adjust_grams(-1800.0, t0()).unwrap();
        assert_eq!(f.totals().grams_available, 200.0);
        assert_eq!(f.free_grams(), 0.0);
    }

    #[test]
    fn positive_adjust_lands_on_oldest_lot() {
        let mut f = pla_verde();
        f.adjust_grams(250.0, t0()).unwrap();
        assert_eq!(f.lots[0].grams, 1450.0);
        assert_eq!(f.lots[1].grams, 800.0);
    }

    #[test]
    fn positive_adjust_without_lots_opens_one() {
        let mut f = pla_verde();
        f.lots.clear();
        f.adjust_grams(500.0, t0()).unwrap();
        assert_eq!(f.lots.len(), 1);
        assert_eq!(f.lots[0].grams, 500.0);
        assert_eq!(f.lots[0].received_at, t0());
    }

    #[test]
    fn non_finite_delta_is_rejected() {
        let mut f = pla_verde();
        assert!(matches!(f.adjust_grams(f64::NAN, t0()), Err(DomainError::Validation(_))));
        assert!(matches!(
            f.adjust_grams(f64::NEG_INFINITY, t0()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn zero_delta_leaves_the_filament_untouched() {
        let mut f = pla_verde();
        let before = f.clone();
        f.adjust_grams(0.0, t0()).unwrap();
        assert_eq!(f, before);

        f.lots.clear();
        f.adjust_grams(0.0, t0()).unwrap();
        assert!(f.lots.is_empty());
    }

    #[test]
    fn reorder_point_is_clamped() {
        let mut f = pla_verde();
        f.set_reorder_point(-5.0);
        assert_eq!(f.reorder_point_grams, 0.0);
        f.set_reorder_point(f64::INFINITY);
        assert_eq!(f.reorder_point_grams, 0.0);
        f.set_reorder_point(750.0);
        assert_eq!(f.reorder_point_grams, 750.0);
    }

    #[test]
    fn received_lots_stay_ordered_by_received_at() {
        let mut f = pla_verde();
        let early = f
            .receive_lot(Some(LotId::from("L0")), 300.0, t0() - Duration::days(1))
            .unwrap();
        f.receive_lot(Some(LotId::from("L3")), 100.0, t0() + Duration::days(3))
            .unwrap();

        let order: Vec<&str> = f.lots.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(order, vec!["L0", "L1", "L2", "L3"]);
        assert_eq!(early.as_str(), "L0");
    }

    #[test]
    fn receive_lot_rejects_non_positive_mass_and_duplicates() {
        let mut f = pla_verde();
        assert!(matches!(
            f.receive_lot(None, 0.0, t0()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            f.receive_lot(Some(LotId::from("L1")), 10.0, t0()),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn create_applies_config_defaults() {
        let config = EngineConfig::default();
        let f = Filament::create(&payload(), &config, t0()).unwrap();
        assert_eq!(f.grams_per_unit, 80.0);
        assert_eq!(f.est_print_min_per_unit, 30.0);
        assert_eq!(f.diameter, DEFAULT_DIAMETER_MM);
        assert_eq!(f.reorder_point_grams, 0.0);
        assert!(f.lots.is_empty());
    }

    #[test]
    fn create_requires_sku_material_and_color() {
        let config = EngineConfig::default();
        for field in ["sku", "material", "color"] {
            let mut p = payload();
            match field {
                "sku" => p.sku = "  ".to_string(),
                "material" => p.material = String::new(),
                _ => p.color = String::new(),
            }
            let err = Filament::create(&p, &config, t0()).unwrap_err();
            assert_eq!(err, DomainError::validation(format!("{field} is required")));
        }
    }

    #[test]
    fn create_rejects_non_positive_per_unit_figures() {
        let config = EngineConfig::default();
        let mut p = payload();
        p.grams_per_unit = Some(0.0);
        assert!(matches!(
            Filament::create(&p, &config, t0()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn create_orders_initial_lots() {
        let config = EngineConfig::default();
        let mut p = payload();
        p.lots = vec![
            NewLot {
                id: Some("late".to_string()),
                grams: 100.0,
                received_at: Some(t0() + Duration::hours(1)),
            },
            NewLot {
                id: Some("early".to_string()),
                grams: 200.0,
                received_at: Some(t0()),
            },
        ];
        let f = Filament::create(&p, &config, t0()).unwrap();
        assert_eq!(f.lots[0].id.as_str(), "early");
        assert_eq!(f.totals().grams_available, 300.0);
    }

    #[test]
    fn initial_and_received_lots_share_the_mass_rule() {
        let config = EngineConfig::default();
        for grams in [0.0, -5.0, f64::NAN] {
            let mut p = payload();
            p.lots = vec![NewLot {
                id: None,
                grams,
                received_at: None,
            }];
            let created = Filament::create(&p, &config, t0()).unwrap_err();
            let received = pla_verde().receive_lot(None, grams, t0()).unwrap_err();
            assert_eq!(created, received);
            assert_eq!(created, DomainError::validation("lot grams must be positive"));
        }
    }

    #[test]
    fn payload_with_missing_text_fields_still_decodes() {
        let p: NewFilament = serde_json::from_str(r#"{"material":"PLA"}"#).unwrap();
        assert_eq!(p.sku, "");
        assert_eq!(p.material, "PLA");
    }
}
