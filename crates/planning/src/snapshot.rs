//! Read-side views assembled from a single state value.

use chrono::{DateTime, Utc};
use serde::Serialize;

use filaforge_core::{EngineConfig, MachineId};
use filaforge_inventory::{Filament, FilamentTotals, Reservation};
use filaforge_production::{Job, Machine, MachineStatus, WINDOW_24H_MINUTES};

use crate::alerts::{Alert, derive_alerts};
use crate::shop::ShopState;

/// A filament with its lots and aggregated totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilamentView {
    #[serde(flatten)]
    pub filament: Filament,
    pub totals: FilamentTotals,
    pub below_reorder_point: bool,
}

impl From<&Filament> for FilamentView {
    fn from(f: &Filament) -> Self {
        Self {
            filament: f.clone(),
            totals: f.totals(),
            below_reorder_point: f.is_below_reorder_point(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    /// Zero-based index in the machine queue.
    pub position: usize,
    #[serde(flatten)]
    pub job: Job,
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineView {
    pub id: MachineId,
    pub name: String,
    pub model: String,
    pub status: MachineStatus,
    pub nozzle: String,
    pub avg_speed_factor: f64,
    pub maintenance_every_hours: f64,
    pub maintenance_hours_used: f64,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    pub compatible_materials: Vec<String>,
    pub queue: Vec<JobView>,
    pub queue_minutes_24h: f64,
    pub free_minutes_24h: f64,
    pub maintenance_ratio: f64,
}

impl From<&Machine> for MachineView {
    fn from(m: &Machine) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            model: m.model.clone(),
            status: m.status,
            nozzle: m.nozzle.clone(),
            avg_speed_factor: m.avg_speed_factor,
            maintenance_every_hours: m.maintenance_every_hours,
            maintenance_hours_used: m.maintenance_hours_used,
            last_maintenance_at: m.last_maintenance_at,
            compatible_materials: m.compatible_materials.clone(),
            queue: m
                .queue
                .jobs()
                .iter()
                .enumerate()
                .map(|(position, job)| JobView {
                    position,
                    minutes: job.minutes(),
                    job: job.clone(),
                })
                .collect(),
            queue_minutes_24h: m.queue_minutes(WINDOW_24H_MINUTES),
            free_minutes_24h: m.free_minutes(WINDOW_24H_MINUTES),
            maintenance_ratio: m.maintenance_ratio(),
        }
    }
}

/// Full read model: everything a dashboard needs in one consistent payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub filaments: Vec<FilamentView>,
    pub machines: Vec<MachineView>,
    pub reservations: Vec<Reservation>,
    pub alerts: Vec<Alert>,
    pub config: EngineConfig,
}

impl Snapshot {
    pub fn assemble(state: &ShopState, config: &EngineConfig) -> Self {
        Self {
            filaments: state.ledger.filaments().iter().map(FilamentView::from).collect(),
            machines: state.fleet.machines().iter().map(MachineView::from).collect(),
            reservations: state.ledger.reservations().cloned().collect(),
            alerts: derive_alerts(state, config),
            config: config.clone(),
        }
    }
}
