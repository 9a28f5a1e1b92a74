//! Filament ledger: every filament, its lots and the open reservations.
//!
//! All operations are pure state transitions. Each one validates first and only
//! mutates once it knows it will succeed, so an `Err` always leaves the ledger
//! exactly as it was.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use filaforge_core::{DomainError, DomainResult, EPSILON, EngineConfig, FilamentId, LotId, OrderId};

use crate::filament::{Filament, FilamentTotals, NewFilament};
use crate::reservation::{self, Reservation, ReservationItem};

/// Outcome of [`Ledger::reserve`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReserveOutcome {
    /// A new reservation was created and lots were claimed.
    Created(Reservation),
    /// A reservation already existed for the order; nothing changed.
    Existing {
        reservation: Reservation,
        /// True when the repeated request asked for a different gram total.
        differs: bool,
    },
}

impl ReserveOutcome {
    pub fn reservation(&self) -> &Reservation {
        match self {
            ReserveOutcome::Created(r) => r,
            ReserveOutcome::Existing { reservation, .. } => reservation,
        }
    }

    pub fn into_reservation(self) -> Reservation {
        match self {
            ReserveOutcome::Created(r) => r,
            ReserveOutcome::Existing { reservation, .. } => reservation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    filaments: Vec<Filament>,
    reservations: BTreeMap<OrderId, Reservation>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts; lots are re-sorted oldest-first.
    pub fn from_parts(mut filaments: Vec<Filament>, reservations: Vec<Reservation>) -> Self {
        for f in &mut filaments {
            f.sort_lots();
        }
        Self {
            filaments,
            reservations: reservations
                .into_iter()
                .map(|r| (r.order_id.clone(), r))
                .collect(),
        }
    }

    pub fn filaments(&self) -> &[Filament] {
        &self.filaments
    }

    pub fn filament(&self, id: &FilamentId) -> DomainResult<&Filament> {
        filaforge_core::entity::find(&self.filaments, id)
            .ok_or_else(|| DomainError::not_found(format!("filament {id}")))
    }

    fn filament_mut(&mut self, id: &FilamentId) -> DomainResult<&mut Filament> {
        filaforge_core::entity::find_mut(&mut self.filaments, id)
            .ok_or_else(|| DomainError::not_found(format!("filament {id}")))
    }

    /// Every filament record carrying `sku` (normally at most one).
    pub fn filaments_by_sku<'a>(&'a self, sku: &'a str) -> impl Iterator<Item = &'a Filament> + 'a {
        self.filaments.iter().filter(move |f| f.sku == sku)
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }

    pub fn reservation(&self, order_id: &OrderId) -> Option<&Reservation> {
        self.reservations.get(order_id)
    }

    pub fn totals(&self, id: &FilamentId) -> DomainResult<FilamentTotals> {
        self.filament(id).map(Filament::totals)
    }

    pub fn create_filament(
        &mut self,
        payload: &NewFilament,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> DomainResult<&Filament> {
        let filament = Filament::create(payload, config, now)?;

        if self.filaments.iter().any(|f| f.id == filament.id) {
            return Err(DomainError::conflict(format!(
                "filament id {} already exists",
                filament.id
            )));
        }
        if self.filaments.iter().any(|f| f.sku == filament.sku) {
            return Err(DomainError::conflict(format!(
                "sku {} already exists",
                filament.sku
            )));
        }

        self.filaments.push(filament);
        Ok(&self.filaments[self.filaments.len() - 1])
    }

    pub fn adjust_grams(
        &mut self,
        id: &FilamentId,
        delta: f64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.filament_mut(id)?.adjust_grams(delta, now)
    }

    pub fn update_reorder_point(&mut self, id: &FilamentId, grams: f64) -> DomainResult<()> {
        self.filament_mut(id)?.set_reorder_point(grams);
        Ok(())
    }

    pub fn receive_lot(
        &mut self,
        id: &FilamentId,
        lot_id: Option<LotId>,
        grams: f64,
        received_at: DateTime<Utc>,
    ) -> DomainResult<LotId> {
        self.filament_mut(id)?.receive_lot(lot_id, grams, received_at)
    }

    /// Atomically claim material for every item of an order.
    ///
    /// Idempotent per order id: an existing reservation is returned untouched.
    pub fn reserve(
        &mut self,
        order_id: &OrderId,
        items: &[ReservationItem],
        now: DateTime<Utc>,
    ) -> DomainResult<ReserveOutcome> {
        if let Some(existing) = self.reservations.get(order_id) {
            let requested: Option<f64> = items
                .iter()
                .map(|item| {
                    self.filaments_by_sku(item.sku.trim())
                        .next()
                        .map(|f| item.grams_needed(f))
                })
                .sum();
            let differs = requested.is_none_or(|g| (g - existing.total_grams()).abs() > EPSILON);
            return Ok(ReserveOutcome::Existing {
                reservation: existing.clone(),
                differs,
            });
        }

        reservation::validate_items(items)?;
        let allocations = reservation::plan_allocations(&self.filaments, items)?;
        reservation::apply_claims(&mut self.filaments, &allocations);

        let created = Reservation {
            order_id: order_id.clone(),
            allocations,
            created_at: now,
        };
        self.reservations.insert(order_id.clone(), created.clone());
        Ok(ReserveOutcome::Created(created))
    }

    /// Convert an order's claim into physical consumption. `None` if absent.
    pub fn consume(&mut self, order_id: &OrderId) -> Option<Reservation> {
        let reservation = self.reservations.remove(order_id)?;
        reservation::consume_claims(&mut self.filaments, &reservation.allocations);
        Some(reservation)
    }

    /// Return an order's claim to the free pool. `None` if absent.
    pub fn release(&mut self, order_id: &OrderId) -> Option<Reservation> {
        let reservation = self.reservations.remove(order_id)?;
        reservation::release_claims(&mut self.filaments, &reservation.allocations);
        Some(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pla_verde, t0};
    use crate::filament::{Lot, NewLot};

    fn ledger() -> Ledger {
        Ledger::from_parts(vec![pla_verde()], vec![])
    }

    fn pla_id() -> FilamentId {
        FilamentId::from("fil-pla-verde")
    }

    fn order(id: &str) -> OrderId {
        OrderId::from(id)
    }

    fn petg() -> NewFilament {
        NewFilament {
            id: Some("fil-petg".to_string()),
            sku: "PETG-NEGRO-175".to_string(),
            material: "PETG".to_string(),
            color: "negro".to_string(),
            grams_per_unit: Some(50.0),
            lots: vec![NewLot {
                id: Some("P1".to_string()),
                grams: 300.0,
                received_at: Some(t0()),
            }],
            ..NewFilament::default()
        }
    }

    fn lot<'a>(l: &'a Ledger, id: &str) -> &'a Lot {
        l.filament(&pla_id())
            .unwrap()
            .lot(&LotId::from(id))
            .unwrap()
    }

    #[test]
    fn reserve_claims_fifo_and_leaves_200_free() {
        let mut l = ledger();
        let items = vec![ReservationItem::new("PLA-VERDE-175", 20).with_grams_per_unit(80.0)];

        let outcome = l.reserve(&order("O1"), &items, t0()).unwrap();
        assert!(matches!(outcome, ReserveOutcome::Created(_)));

        assert_eq!(lot(&l, "L1").reserved, 1200.0);
        assert_eq!(lot(&l, "L2").reserved, 600.0);
        assert_eq!(l.totals(&pla_id()).unwrap().free_grams, 200.0);
    }

    #[test]
    fn reserve_is_idempotent_per_order() {
        let mut l = ledger();
        let items = vec![ReservationItem::new("PLA-VERDE-175", 5)];
        let first = l.reserve(&order("O1"), &items, t0()).unwrap().into_reservation();
        let totals_after_first = l.totals(&pla_id()).unwrap();

        let second = l.reserve(&order("O1"), &items, t0()).unwrap();
        match &second {
            ReserveOutcome::Existing { reservation, differs } => {
                assert_eq!(reservation, &first);
                assert!(!differs);
            }
            other => panic!("expected Existing, got {other:?}"),
        }
        assert_eq!(l.totals(&pla_id()).unwrap(), totals_after_first);
    }

    #[test]
    fn repeat_with_different_override_keeps_first_reservation() {
        let mut l = ledger();
        let first = l
            .reserve(&order("O1"), &[ReservationItem::new("PLA-VERDE-175", 5)], t0())
            .unwrap()
            .into_reservation();

        let second = l
            .reserve(
                &order("O1"),
                &[ReservationItem::new("PLA-VERDE-175", 5).with_grams_per_unit(10.0)],
                t0(),
            )
            .unwrap();
        assert!(matches!(second, ReserveOutcome::Existing { differs: true, .. }));
        assert_eq!(second.reservation(), &first);
    }

    #[test]
    fn failing_second_item_rolls_back_the_first() {
        let mut l = ledger();
        l.create_filament(&petg(), &EngineConfig::default(), t0()).unwrap();
        let before = l.clone();

        let items = vec![
            ReservationItem::new("PLA-VERDE-175", 10),
            ReservationItem::new("PETG-NEGRO-175", 7),
        ];
        let err = l.reserve(&order("O2"), &items, t0()).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(l, before);
        assert!(l.reservation(&order("O2")).is_none());
    }

    #[test]
    fn reserve_then_release_restores_free_grams() {
        let mut l = ledger();
        let before = l.totals(&pla_id()).unwrap().free_grams;
        l.reserve(&order("O1"), &[ReservationItem::new("PLA-VERDE-175", 7)], t0())
            .unwrap();
        assert!(l.release(&order("O1")).is_some());
        assert_eq!(l.totals(&pla_id()).unwrap().free_grams, before);
        assert!(l.reservation(&order("O1")).is_none());
    }

    #[test]
    fn reserve_then_consume_removes_reserved_mass() {
        let mut l = ledger();
        let before = l.totals(&pla_id()).unwrap();
        l.reserve(&order("O1"), &[ReservationItem::new("PLA-VERDE-175", 7)], t0())
            .unwrap();
        l.consume(&order("O1")).unwrap();

        let after = l.totals(&pla_id()).unwrap();
        assert_eq!(after.grams_available, before.grams_available - 560.0);
        assert_eq!(after.grams_reserved, before.grams_reserved);
        assert!(l.reservation(&order("O1")).is_none());
    }

    #[test]
    fn consume_and_release_of_unknown_order_are_noops() {
        let mut l = ledger();
        let before = l.clone();
        assert!(l.consume(&order("nope")).is_none());
        assert!(l.release(&order("nope")).is_none());
        assert_eq!(l, before);
    }

    #[test]
    fn create_rejects_duplicate_sku_and_id() {
        let mut l = ledger();
        let config = EngineConfig::default();
        l.create_filament(&petg(), &config, t0()).unwrap();

        let mut dup_id = petg();
        dup_id.sku = "OTHER".to_string();
        assert!(matches!(
            l.create_filament(&dup_id, &config, t0()),
            Err(DomainError::Conflict(_))
        ));

        let mut dup_sku = petg();
        dup_sku.id = None;
        assert!(matches!(
            l.create_filament(&dup_sku, &config, t0()),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn unknown_filament_is_not_found() {
        let mut l = ledger();
        let missing = FilamentId::from("missing");
        assert!(matches!(l.totals(&missing), Err(DomainError::NotFound(_))));
        assert!(matches!(
            l.adjust_grams(&missing, 1.0, t0()),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            l.update_reorder_point(&missing, 1.0),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn adjust_cannot_eat_into_an_open_reservation() {
        let mut l = ledger();
        l.reserve(&order("O1"), &[ReservationItem::new("PLA-VERDE-175", 20)], t0())
            .unwrap();
        let err = l.adjust_grams(&pla_id(), -300.0, t0()).unwrap_err();
        assert!(matches!(err, DomainError::State(_)));
        l.adjust_grams(&pla_id(), -200.0, t0()).unwrap();
        assert_eq!(l.totals(&pla_id()).unwrap().free_grams, 0.0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Reserve { order: u8, qty: u32 },
            Consume { order: u8 },
            Release { order: u8 },
            Adjust { delta: i32 },
            Receive { grams: u32 },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..6, 1u32..30).prop_map(|(order, qty)| Op::Reserve { order, qty }),
                (0u8..6).prop_map(|order| Op::Consume { order }),
                (0u8..6).prop_map(|order| Op::Release { order }),
                (-2000i32..2000).prop_map(|delta| Op::Adjust { delta }),
                (1u32..1500).prop_map(|grams| Op::Receive { grams }),
            ]
        }

        fn assert_invariants(l: &Ledger) {
            for f in l.filaments() {
                for lot in &f.lots {
                    assert!(lot.reserved >= 0.0, "negative reserved on {}", lot.id);
                    assert!(lot.grams >= 0.0, "negative grams on {}", lot.id);
                    assert!(
                        lot.reserved <= lot.grams + EPSILON,
                        "reserved {} exceeds grams {} on {}",
                        lot.reserved,
                        lot.grams,
                        lot.id
                    );
                }
                let t = f.totals();
                assert!(t.free_grams >= 0.0);
                assert_eq!(t.free_grams, (t.grams_available - t.grams_reserved).max(0.0));
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: lot invariants hold after any sequence of ledger operations.
            #[test]
            fn lot_invariants_hold_under_any_sequence(ops in prop::collection::vec(op(), 1..40)) {
                let mut l = ledger();
                let id = pla_id();
                for (step, op) in ops.into_iter().enumerate() {
                    let at = t0() + chrono::Duration::minutes(step as i64);
                    match op {
                        Op::Reserve { order: o, qty } => {
                            let _ = l.reserve(
                                &order(&format!("O{o}")),
                                &[ReservationItem::new("PLA-VERDE-175", qty)],
                                at,
                            );
                        }
                        Op::Consume { order: o } => {
                            l.consume(&order(&format!("O{o}")));
                        }
                        Op::Release { order: o } => {
                            l.release(&order(&format!("O{o}")));
                        }
                        Op::Adjust { delta } => {
                            let _ = l.adjust_grams(&id, f64::from(delta), at);
                        }
                        Op::Receive { grams } => {
                            l.receive_lot(&id, None, f64::from(grams), at).unwrap();
                        }
                    }
                    assert_invariants(&l);
                }
            }

            /// Property: a failed reservation never changes the ledger.
            #[test]
            fn failed_reserve_has_no_side_effects(qty_a in 1u32..40, qty_b in 1u32..40) {
                let mut l = ledger();
                let before = l.clone();
                let items = vec![
                    ReservationItem::new("PLA-VERDE-175", qty_a),
                    ReservationItem::new("PLA-VERDE-175", qty_b),
                ];
                match l.reserve(&order("X"), &items, t0()) {
                    Ok(_) => {
                        let reserved: f64 = l.reservation(&order("X")).unwrap().total_grams();
                        prop_assert_eq!(reserved, f64::from(qty_a + qty_b) * 80.0);
                    }
                    Err(_) => prop_assert_eq!(l, before),
                }
            }
        }
    }
}
