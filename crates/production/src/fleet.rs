//! The set of machines and the queue operations addressed by machine id.

use chrono::{DateTime, Utc};

use filaforge_core::{DomainError, DomainResult, EngineConfig, JobId, MachineId};

use crate::machine::{Machine, MachinePatch, NewMachine};
use crate::queue::{Direction, Job, NewJob};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fleet {
    machines: Vec<Machine>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_machines(machines: Vec<Machine>) -> Self {
        Self { machines }
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine(&self, id: &MachineId) -> DomainResult<&Machine> {
        filaforge_core::entity::find(&self.machines, id)
            .ok_or_else(|| DomainError::not_found(format!("machine {id}")))
    }

    fn machine_mut(&mut self, id: &MachineId) -> DomainResult<&mut Machine> {
        filaforge_core::entity::find_mut(&mut self.machines, id)
            .ok_or_else(|| DomainError::not_found(format!("machine {id}")))
    }

    /// Online machines able to print `material`.
    pub fn capable_of<'a>(&'a self, material: &'a str) -> impl Iterator<Item = &'a Machine> + 'a {
        self.machines
            .iter()
            .filter(move |m| m.is_online() && m.is_compatible_with(material))
    }

    pub fn add(&mut self, payload: &NewMachine, config: &EngineConfig) -> DomainResult<&Machine> {
        let machine = Machine::create(payload, config)?;
        if self.machines.iter().any(|m| m.id == machine.id) {
            return Err(DomainError::conflict(format!(
                "machine {} already exists",
                machine.id
            )));
        }
        self.machines.push(machine);
        Ok(&self.machines[self.machines.len() - 1])
    }

    pub fn update(&mut self, id: &MachineId, patch: &MachinePatch) -> DomainResult<()> {
        self.machine_mut(id)?.apply_patch(patch)
    }

    pub fn remove(&mut self, id: &MachineId) -> DomainResult<Machine> {
        let idx = filaforge_core::entity::position_of(&self.machines, id)
            .ok_or_else(|| DomainError::not_found(format!("machine {id}")))?;
        Ok(self.machines.remove(idx))
    }

    pub fn complete_maintenance(&mut self, id: &MachineId, now: DateTime<Utc>) -> DomainResult<()> {
        self.machine_mut(id)?.complete_maintenance(now);
        Ok(())
    }

    pub fn record_hours(&mut self, id: &MachineId, hours: f64) -> DomainResult<()> {
        self.machine_mut(id)?.record_hours(hours)
    }

    pub fn enqueue(
        &mut self,
        id: &MachineId,
        payload: &NewJob,
        config: &EngineConfig,
    ) -> DomainResult<JobId> {
        let machine = self.machine_mut(id)?;
        let job = Job::create(payload, config.default_est_print_min_per_unit)?;
        let job_id = job.id.clone();
        machine.queue.push(job)?;
        Ok(job_id)
    }

    pub fn remove_job(&mut self, id: &MachineId, job_id: &JobId) -> DomainResult<Job> {
        self.machine_mut(id)?.queue.remove(job_id)
    }

    pub fn move_job(
        &mut self,
        id: &MachineId,
        job_id: &JobId,
        direction: Direction,
    ) -> DomainResult<bool> {
        self.machine_mut(id)?.queue.move_job(job_id, direction)
    }

    pub fn set_job_position(
        &mut self,
        id: &MachineId,
        job_id: &JobId,
        position: i64,
    ) -> DomainResult<bool> {
        self.machine_mut(id)?.queue.set_position(job_id, position)
    }
}
