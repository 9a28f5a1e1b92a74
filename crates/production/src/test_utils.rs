//! Machine fixtures shared with downstream crates through the `test-utils`
//! feature.

use filaforge_core::MachineId;

use crate::machine::{Machine, MachineStatus};
use crate::queue::JobQueue;

/// Idle, online PLA/PETG printer with a 200h maintenance interval.
pub fn printer(id: &str) -> Machine {
    Machine {
        id: MachineId::from(id),
        name: format!("Printer {id}"),
        model: "MK4".to_string(),
        status: MachineStatus::Online,
        nozzle: "0.4".to_string(),
        avg_speed_factor: 1.0,
        maintenance_every_hours: 200.0,
        maintenance_hours_used: 0.0,
        last_maintenance_at: None,
        compatible_materials: vec!["PLA".to_string(), "PETG".to_string()],
        queue: JobQueue::new(),
    }
}
