use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filaforge_core::{DomainError, DomainResult, EngineConfig, Entity, MachineId};

use crate::queue::{Job, JobQueue, NewJob};

/// Default service interval for machines created without one.
pub const DEFAULT_MAINTENANCE_EVERY_HOURS: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    #[default]
    Online,
    Maintenance,
    Offline,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Online => "online",
            MachineStatus::Maintenance => "maintenance",
            MachineStatus::Offline => "offline",
        }
    }
}

impl core::str::FromStr for MachineStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(MachineStatus::Online),
            "maintenance" => Ok(MachineStatus::Maintenance),
            "offline" => Ok(MachineStatus::Offline),
            other => Err(DomainError::validation(format!("unknown machine status {other:?}"))),
        }
    }
}

/// A printer and its queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub model: String,
    pub status: MachineStatus,
    pub nozzle: String,
    /// >1 prints faster than the nominal estimate, <1 slower.
    pub avg_speed_factor: f64,
    pub maintenance_every_hours: f64,
    pub maintenance_hours_used: f64,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    pub compatible_materials: Vec<String>,
    pub queue: JobQueue,
}

/// Payload: register a machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMachine {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: String,
    pub status: Option<MachineStatus>,
    #[serde(default)]
    pub nozzle: String,
    pub avg_speed_factor: Option<f64>,
    pub maintenance_every_hours: Option<f64>,
    pub maintenance_hours_used: Option<f64>,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compatible_materials: Vec<String>,
    #[serde(default)]
    pub queue: Vec<NewJob>,
}

/// Payload: partial machine update. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinePatch {
    pub name: Option<String>,
    pub model: Option<String>,
    pub status: Option<MachineStatus>,
    pub nozzle: Option<String>,
    pub avg_speed_factor: Option<f64>,
    pub maintenance_every_hours: Option<f64>,
    pub maintenance_hours_used: Option<f64>,
    pub compatible_materials: Option<Vec<String>>,
}

/// Trim, drop empties, dedupe (first occurrence wins, case-insensitive).
pub fn normalize_materials<I, S>(materials: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for m in materials {
        let m = m.as_ref().trim();
        if m.is_empty() || out.iter().any(|seen| seen.eq_ignore_ascii_case(m)) {
            continue;
        }
        out.push(m.to_string());
    }
    out
}

impl Machine {
    pub fn create(payload: &NewMachine, config: &EngineConfig) -> DomainResult<Self> {
        let id = match &payload.id {
            Some(raw) => MachineId::parse(raw.as_str())?,
            None => MachineId::generate(),
        };

        let mut queue = JobQueue::new();
        for job in &payload.queue {
            queue.push(Job::create(job, config.default_est_print_min_per_unit)?)?;
        }

        let machine = Self {
            id,
            name: payload.name.trim().to_string(),
            model: payload.model.trim().to_string(),
            status: payload.status.unwrap_or_default(),
            nozzle: payload.nozzle.trim().to_string(),
            avg_speed_factor: payload.avg_speed_factor.unwrap_or(1.0),
            maintenance_every_hours: payload
                .maintenance_every_hours
                .unwrap_or(DEFAULT_MAINTENANCE_EVERY_HOURS),
            maintenance_hours_used: payload.maintenance_hours_used.unwrap_or(0.0),
            last_maintenance_at: payload.last_maintenance_at,
            compatible_materials: normalize_materials(&payload.compatible_materials),
            queue,
        };
        machine.validate()?;
        Ok(machine)
    }

    fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty() {
            return Err(DomainError::validation("machine name is required"));
        }
        if !self.avg_speed_factor.is_finite() || self.avg_speed_factor <= 0.0 {
            return Err(DomainError::validation("avgSpeedFactor must be positive"));
        }
        if !self.maintenance_every_hours.is_finite() || self.maintenance_every_hours <= 0.0 {
            return Err(DomainError::validation("maintenanceEveryHours must be positive"));
        }
        if !self.maintenance_hours_used.is_finite() || self.maintenance_hours_used < 0.0 {
            return Err(DomainError::validation("maintenanceHoursUsed must not be negative"));
        }
        Ok(())
    }

    /// Apply a patch; on error the machine is left untouched.
    pub fn apply_patch(&mut self, patch: &MachinePatch) -> DomainResult<()> {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(model) = &patch.model {
            next.model = model.trim().to_string();
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(nozzle) = &patch.nozzle {
            next.nozzle = nozzle.trim().to_string();
        }
        if let Some(v) = patch.avg_speed_factor {
            next.avg_speed_factor = v;
        }
        if let Some(v) = patch.maintenance_every_hours {
            next.maintenance_every_hours = v;
        }
        if let Some(v) = patch.maintenance_hours_used {
            next.maintenance_hours_used = v;
        }
        if let Some(materials) = &patch.compatible_materials {
            next.compatible_materials = normalize_materials(materials);
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn is_online(&self) -> bool {
        self.status == MachineStatus::Online
    }

    pub fn is_compatible_with(&self, material: &str) -> bool {
        let material = material.trim();
        self.compatible_materials
            .iter()
            .any(|m| m.eq_ignore_ascii_case(material))
    }

    /// Queued minutes adjusted for speed, capped at `window`.
    pub fn queue_minutes(&self, window: f64) -> f64 {
        (self.queue.total_minutes() / self.avg_speed_factor).min(window)
    }

    /// Minutes still unbooked within `window`.
    pub fn free_minutes(&self, window: f64) -> f64 {
        (window - self.queue_minutes(window)).max(0.0)
    }

    /// Hours used since last service divided by the service interval.
    pub fn maintenance_ratio(&self) -> f64 {
        if self.maintenance_every_hours <= 0.0 {
            return 0.0;
        }
        self.maintenance_hours_used / self.maintenance_every_hours
    }

    pub fn complete_maintenance(&mut self, now: DateTime<Utc>) {
        self.maintenance_hours_used = 0.0;
        self.status = MachineStatus::Online;
        self.last_maintenance_at = Some(now);
    }

    pub fn record_hours(&mut self, hours: f64) -> DomainResult<()> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(DomainError::validation("hours must be positive"));
        }
        self.maintenance_hours_used += hours;
        Ok(())
    }
}

impl Entity for Machine {
    type Id = MachineId;

    fn id(&self) -> &MachineId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::tests::job;
    use crate::test_utils::printer;
    use chrono::TimeZone;

    #[test]
    fn materials_are_trimmed_deduped_and_non_empty() {
        let out = normalize_materials([" PLA ", "", "pla", "PETG", "   ", "TPU"]);
        assert_eq!(out, vec!["PLA", "PETG", "TPU"]);
    }

    #[test]
    fn create_applies_defaults_and_validates() {
        let config = EngineConfig::default();
        let m = Machine::create(
            &NewMachine {
                id: Some("m1".to_string()),
                name: "Left bench".to_string(),
                compatible_materials: vec!["PLA".to_string(), "PLA".to_string()],
                ..NewMachine::default()
            },
            &config,
        )
        .unwrap();
        assert_eq!(m.status, MachineStatus::Online);
        assert_eq!(m.avg_speed_factor, 1.0);
        assert_eq!(m.maintenance_every_hours, DEFAULT_MAINTENANCE_EVERY_HOURS);
        assert_eq!(m.compatible_materials, vec!["PLA"]);

        let err = Machine::create(&NewMachine::default(), &config).unwrap_err();
        assert_eq!(err, DomainError::validation("machine name is required"));

        let err = Machine::create(
            &NewMachine {
                name: "x".to_string(),
                avg_speed_factor: Some(0.0),
                ..NewMachine::default()
            },
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn queue_minutes_apply_speed_factor_and_window_cap() {
        let mut m = printer("m1");
        m.queue.push(job("a", 2, 30.0)).unwrap();
        m.queue.push(job("b", 1, 60.0)).unwrap();
        assert_eq!(m.queue_minutes(1440.0), 120.0);

        m.avg_speed_factor = 2.0;
        assert_eq!(m.queue_minutes(1440.0), 60.0);
        assert_eq!(m.free_minutes(1440.0), 1380.0);

        m.avg_speed_factor = 0.05;
        assert_eq!(m.queue_minutes(1440.0), 1440.0);
        assert_eq!(m.free_minutes(1440.0), 0.0);
    }

    #[test]
    fn failed_patch_leaves_machine_untouched() {
        let mut m = printer("m1");
        let before = m.clone();
        let err = m
            .apply_patch(&MachinePatch {
                name: Some("renamed".to_string()),
                maintenance_every_hours: Some(-1.0),
                ..MachinePatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(m, before);
    }

    #[test]
    fn patch_normalizes_materials() {
        let mut m = printer("m1");
        m.apply_patch(&MachinePatch {
            status: Some(MachineStatus::Offline),
            compatible_materials: Some(vec![" ABS".to_string(), "abs".to_string()]),
            ..MachinePatch::default()
        })
        .unwrap();
        assert_eq!(m.status, MachineStatus::Offline);
        assert_eq!(m.compatible_materials, vec!["ABS"]);
        assert!(m.is_compatible_with("abs"));
        assert!(!m.is_compatible_with("PLA"));
    }

    #[test]
    fn complete_maintenance_resets_counters() {
        let mut m = printer("m1");
        m.status = MachineStatus::Maintenance;
        m.record_hours(190.0).unwrap();
        assert_eq!(m.maintenance_ratio(), 0.95);

        let at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap();
        m.complete_maintenance(at);
        assert_eq!(m.maintenance_hours_used, 0.0);
        assert_eq!(m.status, MachineStatus::Online);
        assert_eq!(m.last_maintenance_at, Some(at));
    }

    #[test]
    fn record_hours_rejects_non_positive() {
        let mut m = printer("m1");
        assert!(m.record_hours(0.0).is_err());
        assert!(m.record_hours(-2.0).is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [MachineStatus::Online, MachineStatus::Maintenance, MachineStatus::Offline] {
            assert_eq!(s.as_str().parse::<MachineStatus>().unwrap(), s);
        }
        assert_eq!(serde_json::to_string(&MachineStatus::Maintenance).unwrap(), "\"maintenance\"");
    }
}
