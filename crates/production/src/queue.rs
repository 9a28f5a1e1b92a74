//! Per-machine ordered job queue.
//!
//! The queue is a plain ordered sequence; a job's position is its index. An
//! explicit position number only appears at the view/storage boundary.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use filaforge_core::{DomainError, DomainResult, Entity, JobId};

/// A queued print job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub sku: String,
    pub qty: u32,
    pub est_minutes_per_unit: f64,
    /// Minutes left on a job already in progress; `None` means not started.
    pub remaining_minutes: Option<f64>,
}

impl Job {
    /// Nominal machine-minutes this job still needs (before speed factor).
    pub fn minutes(&self) -> f64 {
        self.remaining_minutes
            .unwrap_or(self.est_minutes_per_unit * f64::from(self.qty))
    }

    pub fn create(payload: &NewJob, default_est_minutes: f64) -> DomainResult<Self> {
        let sku = payload.sku.trim();
        if sku.is_empty() {
            return Err(DomainError::validation("job sku is required"));
        }
        if payload.qty == 0 {
            return Err(DomainError::validation("job qty must be positive"));
        }
        let est = payload.est_minutes_per_unit.unwrap_or(default_est_minutes);
        if !est.is_finite() || est <= 0.0 {
            return Err(DomainError::validation("estMinutesPerUnit must be positive"));
        }
        if let Some(r) = payload.remaining_minutes {
            if !r.is_finite() || r < 0.0 {
                return Err(DomainError::validation("remainingMinutes must not be negative"));
            }
        }
        let id = match &payload.id {
            Some(raw) => JobId::parse(raw.as_str())?,
            None => JobId::generate(),
        };
        Ok(Self {
            id,
            sku: sku.to_string(),
            qty: payload.qty,
            est_minutes_per_unit: est,
            remaining_minutes: payload.remaining_minutes,
        })
    }
}

impl Entity for Job {
    type Id = JobId;

    fn id(&self) -> &JobId {
        &self.id
    }
}

/// Payload: enqueue a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub id: Option<String>,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub qty: u32,
    pub est_minutes_per_unit: Option<f64>,
    pub remaining_minutes: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(DomainError::validation(format!(
                "direction must be \"up\" or \"down\", got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobQueue(Vec<Job>);

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, job_id: &JobId) -> Option<usize> {
        filaforge_core::entity::position_of(&self.0, job_id)
    }

    fn require_position(&self, job_id: &JobId) -> DomainResult<usize> {
        self.position(job_id)
            .ok_or_else(|| DomainError::not_found(format!("job {job_id}")))
    }

    /// Nominal minutes across all jobs.
    pub fn total_minutes(&self) -> f64 {
        self.0.iter().map(Job::minutes).sum()
    }

    /// Append at the tail.
    pub fn push(&mut self, job: Job) -> DomainResult<()> {
        if self.position(&job.id).is_some() {
            return Err(DomainError::conflict(format!("job {} already queued", job.id)));
        }
        self.0.push(job);
        Ok(())
    }

    pub fn remove(&mut self, job_id: &JobId) -> DomainResult<Job> {
        let idx = self.require_position(job_id)?;
        Ok(self.0.remove(idx))
    }

    /// Swap with the neighbour in `direction`. Returns `false` at a boundary.
    pub fn move_job(&mut self, job_id: &JobId, direction: Direction) -> DomainResult<bool> {
        let idx = self.require_position(job_id)?;
        let target = match direction {
            Direction::Up if idx > 0 => idx - 1,
            Direction::Down if idx + 1 < self.0.len() => idx + 1,
            _ => return Ok(false),
        };
        self.0.swap(idx, target);
        Ok(true)
    }

    /// Reinsert at `target`, clamped to `[0, len-1]`. Returns `false` if unchanged.
    pub fn set_position(&mut self, job_id: &JobId, target: i64) -> DomainResult<bool> {
        let idx = self.require_position(job_id)?;
        let last = self.0.len() - 1;
        let target = usize::try_from(target.max(0)).unwrap_or(usize::MAX).min(last);
        if target == idx {
            return Ok(false);
        }
        let job = self.0.remove(idx);
        self.0.insert(target, job);
        Ok(true)
    }
}

impl From<Vec<Job>> for JobQueue {
    fn from(jobs: Vec<Job>) -> Self {
        Self(jobs)
    }
}
