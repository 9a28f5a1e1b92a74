//! Low-stock, maintenance-due and queue-saturation warnings.
//!
//! Alerts are never stored; they are derived from one consistent state on every
//! read.

use serde::{Deserialize, Serialize};

use filaforge_core::EngineConfig;
use filaforge_production::WINDOW_24H_MINUTES;

use crate::shop::ShopState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    LowStock,
    MaintenanceDue,
    QueueSaturated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    /// Filament id for stock alerts, machine id otherwise.
    pub subject_id: String,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

pub fn derive_alerts(state: &ShopState, config: &EngineConfig) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for f in state.ledger.filaments() {
        let free = f.free_grams();
        if free <= f.reorder_point_grams {
            alerts.push(Alert {
                kind: AlertKind::LowStock,
                subject_id: f.id.to_string(),
                value: free,
                threshold: f.reorder_point_grams,
                message: format!(
                    "{} ({} {}) has {free:.0}g free, at or below reorder point {:.0}g",
                    f.sku, f.material, f.color, f.reorder_point_grams
                ),
            });
        }
    }

    for m in state.fleet.machines() {
        let ratio = m.maintenance_ratio();
        if ratio >= config.maintenance_threshold_pct {
            alerts.push(Alert {
                kind: AlertKind::MaintenanceDue,
                subject_id: m.id.to_string(),
                value: ratio,
                threshold: config.maintenance_threshold_pct,
                message: format!(
                    "{} has used {:.0} of {:.0} hours since last maintenance",
                    m.name, m.maintenance_hours_used, m.maintenance_every_hours
                ),
            });
        }

        if m.is_online() {
            let free = m.free_minutes(WINDOW_24H_MINUTES);
            if free < config.free_minutes_warn_24h {
                alerts.push(Alert {
                    kind: AlertKind::QueueSaturated,
                    subject_id: m.id.to_string(),
                    value: free,
                    threshold: config.free_minutes_warn_24h,
                    message: format!(
                        "{} has only {free:.0} free minutes in the next 24h",
                        m.name
                    ),
                });
            }
        }
    }

    alerts
}
