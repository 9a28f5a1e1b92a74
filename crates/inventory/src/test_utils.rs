//! Shared fixtures for this crate's tests and for downstream crates that
//! enable the `test-utils` feature.

use chrono::{DateTime, Duration, TimeZone, Utc};

use filaforge_core::{FilamentId, LotId};

use crate::filament::{Filament, Lot};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

/// `PLA-VERDE-175`: lots L1 {1200g, 200 reserved} and L2 {800g}, reorder point 600.
pub fn pla_verde() -> Filament {
    Filament {
        id: FilamentId::from("fil-pla-verde"),
        sku: "PLA-VERDE-175".to_string(),
        material: "PLA".to_string(),
        color: "verde".to_string(),
        diameter: 1.75,
        grams_per_unit: 80.0,
        est_print_min_per_unit: 35.0,
        reorder_point_grams: 600.0,
        lots: vec![
            Lot {
                id: LotId::from("L1"),
                grams: 1200.0,
                reserved: 200.0,
                received_at: t0(),
            },
            Lot {
                id: LotId::from("L2"),
                grams: 800.0,
                reserved: 0.0,
                received_at: t0() + Duration::days(3),
            },
        ],
    }
}
